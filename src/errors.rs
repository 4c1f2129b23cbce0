use actix_web::{error, http::StatusCode, HttpResponse};
use derive_more::Display;
use log::{error, warn};

use crate::db::StoreError;

#[derive(Debug, Display, PartialEq, Eq)]
pub enum ApiError {
    #[display(fmt = "{}", _0)]
    BadRequest(String),

    #[display(fmt = "{}", _0)]
    Unauthorized(String),

    #[display(fmt = "{}", _0)]
    NotFound(String),

    #[display(fmt = "{}", _0)]
    Internal(String),
}

impl std::error::Error for ApiError {}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError::BadRequest(msg.into())
    }

    pub fn unauthorized() -> Self {
        ApiError::Unauthorized("Unauthorized".to_string())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ApiError::NotFound(msg.into())
    }

    pub fn internal() -> Self {
        ApiError::Internal("Something went wrong".to_string())
    }

    pub fn missing_fields() -> Self {
        ApiError::bad_request("Missing required fields")
    }
}

impl error::ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .json(serde_json::json!({ "error": self.to_string() }))
    }

    fn status_code(&self) -> StatusCode {
        match *self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(key) => {
                warn!("write rejected by unique constraint {}", key);
                ApiError::bad_request("Value already in use")
            }
            StoreError::Database(err) => {
                error!("[{} : {}] DATABASE ERROR: {:?}", file!(), line!(), err);
                ApiError::internal()
            }
        }
    }
}

impl From<actix_web::error::BlockingError> for ApiError {
    fn from(err: actix_web::error::BlockingError) -> Self {
        error!("[{} : {}] BLOCKING POOL ERROR: {:?}", file!(), line!(), err);
        ApiError::internal()
    }
}
