pub mod admin;
pub mod auth;
pub mod event;
pub mod upload;
pub mod user;
