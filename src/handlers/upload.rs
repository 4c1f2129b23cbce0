use actix_multipart::Multipart;
use actix_web::{post, web, HttpRequest, HttpResponse};
use serde_json::json;

use crate::{
    errors::ApiError,
    service::{self, admin, auth::AuthUser},
    AppState,
};

#[post("")]
pub async fn upload(
    req: HttpRequest,
    user: Option<AuthUser>,
    payload: Multipart,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    if user.is_none() && !admin::is_admin(&req, &state.config.admin_token_secret) {
        return Err(ApiError::unauthorized());
    }
    let url = service::upload::save_image(payload, &state.config.upload_dir).await?;
    Ok(HttpResponse::Ok().json(json!({ "url": url })))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(upload);
}
