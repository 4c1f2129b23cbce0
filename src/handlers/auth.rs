use actix_web::{get, post, web, HttpRequest, HttpResponse};
use serde_json::json;

use crate::{
    dto::{SigninDto, SignupDto, UserView, VerifyDto},
    errors::ApiError,
    service::{
        self,
        auth::{self, AuthUser},
    },
    AppState,
};

#[post("/signup")]
pub async fn signup(
    dto: web::Json<SignupDto>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let user_id = service::user::signup(&state, dto.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "userId": user_id,
        "message": "Verification code sent to your email",
    })))
}

#[post("/verify")]
pub async fn verify(
    dto: web::Json<VerifyDto>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let token = service::user::verify(&state, dto.into_inner()).await?;
    Ok(HttpResponse::Ok()
        .cookie(auth::session_cookie(token, state.config.secure_cookies))
        .json(json!({ "success": true })))
}

#[post("/signin")]
pub async fn signin(
    dto: web::Json<SigninDto>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let (user, token) = service::user::signin(&state, dto.into_inner()).await?;
    Ok(HttpResponse::Ok()
        .cookie(auth::session_cookie(token, state.config.secure_cookies))
        .json(json!({ "success": true, "user": UserView::from(&user) })))
}

#[post("/signout")]
pub async fn signout(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let token = auth::session_token(&req);
    auth::destroy_session(state.store.as_ref(), token.as_deref()).await?;
    Ok(HttpResponse::Ok()
        .cookie(auth::removal_cookie(auth::SESSION_COOKIE))
        .json(json!({ "success": true })))
}

#[get("/me")]
pub async fn me(user: Option<AuthUser>) -> Result<HttpResponse, ApiError> {
    match user {
        Some(AuthUser(user)) => Ok(HttpResponse::Ok().json(json!({ "user": UserView::from(&user) }))),
        None => Err(ApiError::Unauthorized("Not authenticated".to_string())),
    }
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(signup)
        .service(verify)
        .service(signin)
        .service(signout)
        .service(me);
}
