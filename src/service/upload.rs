use std::path::Path;

use actix_multipart::Multipart;
use chrono::Utc;
use futures_util::TryStreamExt;
use log::info;
use rand::Rng;

use crate::errors::ApiError;

pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
pub const UPLOAD_FIELD: &str = "file";
pub const PUBLIC_PREFIX: &str = "/uploads";

pub fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

/// `<unix millis>-<random>.<ext>`
pub fn generate_file_name(extension: &str) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    format!("{}-{}.{}", Utc::now().timestamp_millis(), suffix, extension)
}

fn malformed(err: actix_multipart::MultipartError) -> ApiError {
    log::warn!("malformed multipart body: {}", err);
    ApiError::bad_request("No file uploaded")
}

/// Stores the `file` field of the form under `dir` and returns its public URL.
/// Other fields are drained and ignored.
pub async fn save_image(mut payload: Multipart, dir: &Path) -> Result<String, ApiError> {
    while let Some(mut field) = payload.try_next().await.map_err(malformed)? {
        if field.name() != Some(UPLOAD_FIELD) {
            while field.try_next().await.map_err(malformed)?.is_some() {}
            continue;
        }

        let extension = field
            .content_type()
            .and_then(|mime| extension_for(mime.essence_str()))
            .ok_or_else(|| ApiError::bad_request("Invalid file type"))?;

        let mut bytes = Vec::new();
        while let Some(chunk) = field.try_next().await.map_err(malformed)? {
            if bytes.len() + chunk.len() > MAX_UPLOAD_BYTES {
                return Err(ApiError::bad_request("File too large"));
            }
            bytes.extend_from_slice(&chunk);
        }
        if bytes.is_empty() {
            return Err(ApiError::bad_request("No file uploaded"));
        }

        let name = generate_file_name(extension);
        tokio::fs::create_dir_all(dir).await.map_err(io_error)?;
        tokio::fs::write(dir.join(&name), &bytes)
            .await
            .map_err(io_error)?;
        info!("stored upload {} ({} bytes)", name, bytes.len());
        return Ok(format!("{}/{}", PUBLIC_PREFIX, name));
    }
    Err(ApiError::bad_request("No file uploaded"))
}

fn io_error(err: std::io::Error) -> ApiError {
    log::error!("[{} : {}] UPLOAD IO ERROR: {}", file!(), line!(), err);
    ApiError::internal()
}
