use actix_web::{delete, get, post, put, web, HttpResponse};
use serde_json::json;
use uuid::Uuid;

use crate::{
    dto::{CommentDto, EventInputDto, ListEventsQuery, ReactDto},
    errors::ApiError,
    models::Vote,
    service::{self, auth::AuthUser},
    AppState,
};

#[get("")]
pub async fn get_all(
    viewer: Option<AuthUser>,
    query: web::Query<ListEventsQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let viewer = viewer.map(|AuthUser(user)| user.id);
    let events = service::event::list(&state, query.into_inner(), viewer).await?;
    Ok(HttpResponse::Ok().json(json!({ "events": events })))
}

#[post("")]
pub async fn create(
    AuthUser(user): AuthUser,
    dto: web::Json<EventInputDto>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let event_id = service::event::create(&state, dto.into_inner(), Some(user.id)).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "eventId": event_id })))
}

#[get("/{id}")]
pub async fn get_by_id(
    id: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let event = service::event::get(&state, id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "event": event })))
}

#[put("/{id}")]
pub async fn update(
    _user: AuthUser,
    id: web::Path<Uuid>,
    dto: web::Json<EventInputDto>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    service::event::update(&state, id.into_inner(), dto.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

#[delete("/{id}")]
pub async fn remove(
    _user: AuthUser,
    id: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    service::event::delete(&state, id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

#[post("/{id}/like")]
pub async fn like(
    AuthUser(user): AuthUser,
    id: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let liked = service::event::vote(&state, id.into_inner(), user.id, Vote::Like).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "liked": liked })))
}

#[post("/{id}/dislike")]
pub async fn dislike(
    AuthUser(user): AuthUser,
    id: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let disliked = service::event::vote(&state, id.into_inner(), user.id, Vote::Dislike).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "disliked": disliked })))
}

#[post("/{id}/react")]
pub async fn react(
    AuthUser(user): AuthUser,
    id: web::Path<Uuid>,
    dto: web::Json<ReactDto>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let change = service::event::react(&state, id.into_inner(), user.id, dto.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "reaction": change })))
}

#[post("/{id}/comment")]
pub async fn comment(
    AuthUser(user): AuthUser,
    id: web::Path<Uuid>,
    dto: web::Json<CommentDto>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let comment = service::event::comment(&state, id.into_inner(), &user, dto.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "comment": comment })))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(get_all)
        .service(create)
        .service(get_by_id)
        .service(update)
        .service(remove)
        .service(like)
        .service(dislike)
        .service(react)
        .service(comment);
}
