pub mod admin;
pub mod auth;
pub mod crypto;
pub mod event;
pub mod log;
pub mod mail;
pub mod upload;
pub mod user;
