use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use campushub::{
    config::Config,
    db,
    service::{
        log::{init_logger, LoggerMiddleware},
        mail::{LogMailer, Mailer, ResendMailer},
    },
    AppState,
};
use dotenv::dotenv;
use log::{error, info, warn};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    init_logger();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("configuration error: {}", err);
            std::process::exit(1);
        }
    };
    let store = match db::connect(&config).await {
        Ok(store) => store,
        Err(err) => {
            error!("failed to open the store: {}", err);
            std::process::exit(1);
        }
    };
    let mailer: Arc<dyn Mailer> = match &config.resend_api_key {
        Some(key) => Arc::new(ResendMailer::new(key.clone(), config.mail_from.clone())),
        None => {
            warn!("RESEND_API_KEY is not set, verification codes will only be logged");
            Arc::new(LogMailer)
        }
    };
    tokio::fs::create_dir_all(&config.upload_dir).await?;

    let bind = (config.host.clone(), config.port);
    let state = web::Data::new(AppState {
        store: store.clone(),
        mailer,
        config,
    });

    info!("listening on {}:{}", bind.0, bind.1);
    let result = HttpServer::new(move || {
        App::new()
            .wrap(LoggerMiddleware)
            .configure(campushub::routes(state.clone()))
    })
    .bind(bind)?
    .run()
    .await;

    store.close().await;
    info!("store closed, bye");
    result
}
