use std::{
    future::{ready, Ready},
    rc::Rc,
    sync::Arc,
};

use actix_web::{
    cookie::{time, Cookie, SameSite},
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    FromRequest, HttpMessage, HttpRequest,
};
use chrono::Utc;
use futures_util::future::LocalBoxFuture;
use uuid::Uuid;

use crate::{
    db::Store,
    errors::ApiError,
    models::{Session, User, SESSION_TTL_DAYS},
    service::crypto,
};

pub const SESSION_COOKIE: &str = "session";

/// The signed-in user, resolved from the session cookie by [`SessionMiddleware`].
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl FromRequest for AuthUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthUser>()
                .cloned()
                .ok_or_else(ApiError::unauthorized),
        )
    }
}

/// Persists a new session and returns the raw token for the cookie. Other
/// sessions of the same user stay valid.
pub async fn create_session(store: &dyn Store, user_id: Uuid) -> Result<String, ApiError> {
    let token = crypto::generate_token();
    let session = Session::new(crypto::get_sha3_256_hash(&token), user_id, Utc::now());
    store.insert_session(&session).await?;
    Ok(token)
}

/// Unknown and expired tokens resolve to `None`. Expiry is never extended.
pub async fn resolve_session(store: &dyn Store, token: &str) -> Result<Option<User>, ApiError> {
    let token_hash = crypto::get_sha3_256_hash(token);
    let session = match store.find_session(&token_hash).await? {
        Some(session) if session.is_active(Utc::now()) => session,
        _ => return Ok(None),
    };
    Ok(store.find_user(session.user_id).await?)
}

pub async fn destroy_session(store: &dyn Store, token: Option<&str>) -> Result<(), ApiError> {
    if let Some(token) = token {
        store
            .delete_session(&crypto::get_sha3_256_hash(token))
            .await?;
    }
    Ok(())
}

pub fn session_token(req: &HttpRequest) -> Option<String> {
    req.cookie(SESSION_COOKIE).map(|c| c.value().to_string())
}

pub fn build_cookie(
    name: &'static str,
    value: String,
    max_age: time::Duration,
    secure: bool,
) -> Cookie<'static> {
    Cookie::build(name, value)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(max_age)
        .finish()
}

pub fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    build_cookie(SESSION_COOKIE, token, time::Duration::days(SESSION_TTL_DAYS), secure)
}

pub fn removal_cookie(name: &'static str) -> Cookie<'static> {
    let mut cookie = Cookie::build(name, "").path("/").finish();
    cookie.make_removal();
    cookie
}

pub struct SessionMiddleware {
    pub store: Arc<dyn Store>,
}

impl<S, B> Transform<S, ServiceRequest> for SessionMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type Transform = SessionMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SessionMiddlewareService {
            service: Rc::new(service),
            store: self.store.clone(),
        }))
    }
}

pub struct SessionMiddlewareService<S> {
    service: Rc<S>,
    store: Arc<dyn Store>,
}

impl<S, B> Service<ServiceRequest> for SessionMiddlewareService<S>
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
        let service = Rc::clone(&self.service);
        let store = self.store.clone();
        let token = req.cookie(SESSION_COOKIE).map(|c| c.value().to_string());

        Box::pin(async move {
            if let Some(token) = token {
                if let Some(user) = resolve_session(store.as_ref(), &token).await? {
                    req.extensions_mut().insert(AuthUser(user));
                }
            }
            service.call(req).await
        })
    }
}
