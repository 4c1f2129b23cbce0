use actix_web::{get, post, put, web, HttpResponse};
use serde_json::json;

use crate::{
    dto::{DeleteAccountDto, UpdateProfileDto},
    errors::ApiError,
    service::{
        self,
        auth::{self, AuthUser},
    },
    AppState,
};

#[put("/update")]
pub async fn update(
    AuthUser(user): AuthUser,
    dto: web::Json<UpdateProfileDto>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    service::user::update_profile(&state, &user, dto.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

#[post("/delete")]
pub async fn delete(
    AuthUser(user): AuthUser,
    dto: web::Json<DeleteAccountDto>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    service::user::delete_account(&state, &user, dto.into_inner()).await?;
    Ok(HttpResponse::Ok()
        .cookie(auth::removal_cookie(auth::SESSION_COOKIE))
        .json(json!({ "success": true })))
}

#[get("/stats")]
pub async fn stats(
    AuthUser(user): AuthUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let stats = service::user::stats(&state, &user).await?;
    Ok(HttpResponse::Ok().json(json!({ "stats": stats })))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(update).service(delete).service(stats);
}
