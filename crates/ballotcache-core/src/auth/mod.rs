//! Admin accounts, sessions and the FEC API key.
//!
//! - `AdminAuth`: register/login/logout with argon2 password hashes and a
//!   24 hour session, sealed with ChaCha20-Poly1305 in the shared store
//! - `ApiKeyStore`: the FEC API key in the OS keychain

pub mod admin;
pub mod credentials;
pub mod crypto;
pub mod session;

use thiserror::Error;

use crate::store::StoreError;

pub use admin::{AdminAuth, CurrentUser, DEFAULT_ROLE};
pub use credentials::{mask_api_key, ApiKeyStore};
pub use session::AdminSession;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("User {0} already exists")]
    UserExists(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Password hashing failed: {0}")]
    Hash(String),

    #[error("Stored auth data could not be decrypted")]
    Crypto,

    #[error("Stored auth data is malformed: {0}")]
    Format(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}
