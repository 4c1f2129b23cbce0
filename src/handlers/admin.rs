use actix_web::{delete, get, post, put, web, HttpRequest, HttpResponse};
use log::info;
use serde_json::json;
use uuid::Uuid;

use crate::{
    dto::{AdminLoginDto, EventInputDto},
    errors::ApiError,
    service::{
        self,
        admin::{self, AdminGuard, ADMIN_COOKIE},
        auth,
    },
    AppState,
};

#[post("/auth")]
pub async fn login(
    dto: web::Json<AdminLoginDto>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let token = admin::login(&state, dto.into_inner())?;
    Ok(HttpResponse::Ok()
        .cookie(admin::admin_cookie(token, state.config.secure_cookies))
        .json(json!({ "success": true })))
}

#[get("/auth")]
pub async fn status(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    if admin::is_admin(&req, &state.config.admin_token_secret) {
        HttpResponse::Ok().json(json!({ "authenticated": true }))
    } else {
        HttpResponse::Unauthorized().json(json!({ "authenticated": false }))
    }
}

#[delete("/auth")]
pub async fn logout() -> HttpResponse {
    info!("admin signed out");
    HttpResponse::Ok()
        .cookie(auth::removal_cookie(ADMIN_COOKIE))
        .json(json!({ "success": true }))
}

#[get("")]
pub async fn list_events(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let (events, totals) = admin::list_events(&state).await?;
    Ok(HttpResponse::Ok().json(json!({ "events": events, "totals": totals })))
}

#[post("")]
pub async fn create_event(
    dto: web::Json<EventInputDto>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let event_id = service::event::create(&state, dto.into_inner(), None).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "eventId": event_id })))
}

#[get("/{id}")]
pub async fn get_event(
    id: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let event = admin::event_detail(&state, id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "event": event })))
}

#[put("/{id}")]
pub async fn update_event(
    id: web::Path<Uuid>,
    dto: web::Json<EventInputDto>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    service::event::update(&state, id.into_inner(), dto.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

#[delete("/{id}")]
pub async fn delete_event(
    id: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    service::event::delete(&state, id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

/// The event routes sit behind [`AdminGuard`]; `/auth` stays open.
pub fn init_routes(token_secret: String) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        cfg.service(login).service(status).service(logout).service(
            web::scope("/events")
                .wrap(AdminGuard {
                    secret: token_secret,
                })
                .service(list_events)
                .service(create_event)
                .service(get_event)
                .service(update_event)
                .service(delete_event),
        );
    }
}
