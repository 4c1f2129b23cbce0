use actix_web::web;
use rand::{distributions::Alphanumeric, Rng};
use sha3::{Digest, Sha3_256};

use crate::errors::ApiError;

const TOKEN_LEN: usize = 64;

/// Session tokens are stored by digest only; the raw value lives in the cookie.
pub fn get_sha3_256_hash(data: &str) -> String {
    let mut hasher = Sha3_256::default();
    hasher.update(data.as_bytes());
    format!("{:X}", hasher.finalize())
}

pub fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

pub fn generate_verification_code() -> String {
    rand::thread_rng().gen_range(100_000..1_000_000).to_string()
}

/// bcrypt on the blocking pool.
pub async fn hash_password(password: String, cost: u32) -> Result<String, ApiError> {
    web::block(move || bcrypt::hash(password, cost))
        .await?
        .map_err(|err| {
            log::error!("[{} : {}] PASSWORD HASH ERROR: {:?}", file!(), line!(), err);
            ApiError::internal()
        })
}

/// A malformed stored hash verifies as false.
pub async fn verify_password(password: String, hash: String) -> Result<bool, ApiError> {
    let verified = web::block(move || bcrypt::verify(password, &hash).unwrap_or(false)).await?;
    Ok(verified)
}
