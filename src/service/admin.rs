use std::{
    collections::HashMap,
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    cookie::{time, Cookie},
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    HttpRequest,
};
use chrono::{Duration, Utc};
use futures_util::future::LocalBoxFuture;
use jsonwebtoken::{decode, encode, errors::Error, DecodingKey, EncodingKey, Header, Validation};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    db::{EventQuery, EventSort},
    dto::{AdminEventDetail, AdminLoginDto, AdminTotals, EventDetail, EventSummary},
    errors::ApiError,
    models::Event,
    service::{auth, crypto},
    AppState,
};

pub const ADMIN_COOKIE: &str = "admin_session";
const ADMIN_SUBJECT: &str = "admin";
const ADMIN_TOKEN_TTL_HOURS: i64 = 24;
const UNKNOWN_USER: &str = "Unknown";

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminClaims {
    pub sub: String,
    pub exp: usize,
}

pub fn issue_token(secret: &str) -> Result<String, Error> {
    let exp = (Utc::now() + Duration::hours(ADMIN_TOKEN_TTL_HOURS)).timestamp() as usize;
    let claims = AdminClaims {
        sub: ADMIN_SUBJECT.to_string(),
        exp,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// HS256 signature, expiry and subject must all check out.
pub fn verify_token(secret: &str, token: &str) -> bool {
    match decode::<AdminClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    ) {
        Ok(data) => data.claims.sub == ADMIN_SUBJECT,
        Err(err) => {
            warn!("rejected admin token: {}", err);
            false
        }
    }
}

pub fn is_admin(req: &HttpRequest, secret: &str) -> bool {
    req.cookie(ADMIN_COOKIE)
        .is_some_and(|c| verify_token(secret, c.value()))
}

pub fn admin_cookie(token: String, secure: bool) -> Cookie<'static> {
    auth::build_cookie(
        ADMIN_COOKIE,
        token,
        time::Duration::hours(ADMIN_TOKEN_TTL_HOURS),
        secure,
    )
}

/// Compares fixed-length digests with no early exit.
fn password_matches(expected: &str, candidate: &str) -> bool {
    let expected = crypto::get_sha3_256_hash(expected);
    let candidate = crypto::get_sha3_256_hash(candidate);
    expected
        .bytes()
        .zip(candidate.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

/// Checks the shared password and returns a fresh admin token.
pub fn login(state: &AppState, dto: AdminLoginDto) -> Result<String, ApiError> {
    let invalid = || ApiError::Unauthorized("Invalid password".to_string());
    let Some(expected) = state.config.admin_password.as_deref() else {
        warn!("admin login attempted but ADMIN_PASSWORD is not configured");
        return Err(invalid());
    };
    if !password_matches(expected, dto.password.as_deref().unwrap_or_default()) {
        warn!("admin login with wrong password");
        return Err(invalid());
    }
    let token = issue_token(&state.config.admin_token_secret).map_err(|err| {
        log::error!("[{} : {}] ADMIN TOKEN ERROR: {:?}", file!(), line!(), err);
        ApiError::internal()
    })?;
    info!("admin signed in");
    Ok(token)
}

pub fn totals(events: &[Event]) -> AdminTotals {
    events.iter().fold(
        AdminTotals {
            total_events: events.len(),
            ..Default::default()
        },
        |mut acc, e| {
            acc.total_likes += e.likes.len();
            acc.total_dislikes += e.dislikes.len();
            acc.total_comments += e.comments.len();
            acc
        },
    )
}

/// Every event regardless of date, newest created first.
pub async fn list_events(state: &AppState) -> Result<(Vec<EventSummary>, AdminTotals), ApiError> {
    let query = EventQuery {
        sort: EventSort::Newest,
        ..Default::default()
    };
    let events = state.store.list_events(&query).await?;
    let summaries = events.iter().map(|e| EventSummary::new(e, None)).collect();
    Ok((summaries, totals(&events)))
}

fn usernames(ids: &[Uuid], names: &HashMap<Uuid, String>) -> Vec<String> {
    ids.iter()
        .map(|id| names.get(id).cloned().unwrap_or_else(|| UNKNOWN_USER.to_string()))
        .collect()
}

pub async fn event_detail(state: &AppState, id: Uuid) -> Result<AdminEventDetail, ApiError> {
    let event = state
        .store
        .find_event(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Event not found"))?;

    let ids: Vec<Uuid> = event.likes.iter().chain(&event.dislikes).copied().collect();
    let names: HashMap<Uuid, String> = state
        .store
        .find_users(&ids)
        .await?
        .into_iter()
        .map(|u| (u.id, u.username))
        .collect();

    Ok(AdminEventDetail {
        liked_by: usernames(&event.likes, &names),
        disliked_by: usernames(&event.dislikes, &names),
        event: EventDetail::from(event),
    })
}

/// Rejects requests without a valid admin cookie.
pub struct AdminGuard {
    pub secret: String,
}

impl<S, B> Transform<S, ServiceRequest> for AdminGuard
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type Transform = AdminGuardService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AdminGuardService {
            service: Rc::new(service),
            secret: Rc::from(self.secret.as_str()),
        }))
    }
}

pub struct AdminGuardService<S> {
    service: Rc<S>,
    secret: Rc<str>,
}

impl<S, B> Service<ServiceRequest> for AdminGuardService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if !is_admin(req.request(), &self.secret) {
            return Box::pin(async { Err(ApiError::unauthorized().into()) });
        }
        let service = Rc::clone(&self.service);
        Box::pin(async move { service.call(req).await })
    }
}
