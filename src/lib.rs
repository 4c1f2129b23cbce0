pub mod config;
pub mod db;
pub mod dto;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod service;

use std::sync::Arc;

use actix_files::Files;
use actix_web::web;

use crate::{
    config::Config,
    db::Store,
    errors::ApiError,
    service::{auth::SessionMiddleware, mail::Mailer, upload::PUBLIC_PREFIX},
};

/// Shared by every worker through `web::Data`.
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub mailer: Arc<dyn Mailer>,
    pub config: Config,
}

/// Registers the whole HTTP surface: `/api/*` plus the uploaded files.
pub fn routes(state: web::Data<AppState>) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        let store = state.store.clone();
        let admin_secret = state.config.admin_token_secret.clone();
        let upload_dir = state.config.upload_dir.clone();

        cfg.app_data(state)
            .app_data(web::JsonConfig::default().error_handler(|err, _| {
                log::warn!("rejected JSON body: {}", err);
                ApiError::bad_request("Invalid request body").into()
            }))
            .app_data(
                web::PathConfig::default()
                    .error_handler(|_, _| ApiError::not_found("Not found").into()),
            )
            .service(Files::new(PUBLIC_PREFIX, upload_dir))
            .service(
                web::scope("/api")
                    .wrap(SessionMiddleware { store })
                    .service(web::scope("/auth").configure(handlers::auth::init_routes))
                    .service(web::scope("/user").configure(handlers::user::init_routes))
                    .service(web::scope("/events").configure(handlers::event::init_routes))
                    .service(web::scope("/admin").configure(handlers::admin::init_routes(admin_secret)))
                    .service(web::scope("/upload").configure(handlers::upload::init_routes)),
            );
    }
}
