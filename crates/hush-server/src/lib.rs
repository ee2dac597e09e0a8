pub mod auth;
pub mod dirs;
pub mod handlers;
pub mod secrets;
pub mod server;
pub mod store;
pub mod token;

/// Shared application state threaded through axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub secrets: secrets::Secrets,
    /// API key for the admin routes. Admin routes are disabled when unset.
    pub api_key: Option<String>,
}

pub use secrets::{CreateError, Policy, RevealError, Secrets, ValidationError};
pub use server::{resolve_data_dir, router, run, ServerConfig};
pub use store::generate_salt;
pub use token::{decode_token, encode_token, TokenError};
