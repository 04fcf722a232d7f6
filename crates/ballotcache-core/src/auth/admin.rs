use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::store::{Namespace, Store};

use super::crypto::Sealer;
use super::session::AdminSession;
use super::AuthError;

const USERS_KEY: &str = "users";
const TOKEN_KEY: &str = "token";

pub const DEFAULT_ROLE: &str = "admin";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredUser {
    email: String,
    /// PHC string, salt and parameters included.
    password_hash: String,
    role: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub email: String,
    pub role: String,
}

/// Admin accounts and the active admin session, sealed in the `admin_`
/// namespace of the shared store.
pub struct AdminAuth {
    space: Namespace,
    sealer: Sealer,
    argon: Argon2<'static>,
    default_admin: Option<(String, String)>,
}

impl AdminAuth {
    pub fn new(store: &Store, secret: &str) -> Result<Self, AuthError> {
        Self::with_params(store, secret, Params::default())
    }

    pub fn with_params(store: &Store, secret: &str, params: Params) -> Result<Self, AuthError> {
        let argon = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        Ok(Self {
            space: store.auth(),
            sealer: Sealer::derive(secret, &argon)?,
            argon,
            default_admin: None,
        })
    }

    /// Account to create on the first login attempt when no users exist.
    pub fn with_default_admin(mut self, email: impl Into<String>, password: impl Into<String>) -> Self {
        self.default_admin = Some((email.into(), password.into()));
        self
    }

    pub fn register(&self, email: &str, password: &str, role: &str) -> Result<(), AuthError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }
        let mut users = self.load_users()?;
        if users.iter().any(|u| u.email == email) {
            return Err(AuthError::UserExists(email.to_string()));
        }
        users.push(StoredUser {
            email: email.to_string(),
            password_hash: self.hash(password)?,
            role: role.to_string(),
        });
        self.save_users(&users)?;
        info!(email, role, "Admin user registered");
        Ok(())
    }

    pub fn login(&self, email: &str, password: &str) -> Result<AdminSession, AuthError> {
        self.seed_default_admin()?;
        let users = self.load_users()?;
        let user = users
            .iter()
            .find(|u| u.email == email)
            .ok_or(AuthError::InvalidCredentials)?;
        if !self.verify(password, &user.password_hash) {
            warn!(email, "Admin login rejected");
            return Err(AuthError::InvalidCredentials);
        }

        let session = AdminSession::issue(&user.email, &user.role);
        let sealed = self.sealer.seal(&serde_json::to_vec(&session)?)?;
        self.space.set_raw(TOKEN_KEY, &sealed)?;
        info!(email, "Admin logged in");
        Ok(session)
    }

    pub fn logout(&self) -> Result<(), AuthError> {
        self.space.remove(TOKEN_KEY)?;
        Ok(())
    }

    /// The stored session if it decrypts and has not expired.
    pub fn session(&self) -> Option<AdminSession> {
        let sealed = self.space.get_raw(TOKEN_KEY).ok().flatten()?;
        let session: AdminSession = match self
            .sealer
            .open(&sealed)
            .and_then(|bytes| serde_json::from_slice::<AdminSession>(&bytes).map_err(AuthError::from))
        {
            Ok(session) => session,
            Err(e) => {
                debug!(error = %e, "Stored admin session unreadable");
                return None;
            }
        };
        (!session.is_expired()).then_some(session)
    }

    pub fn is_authenticated(&self) -> bool {
        self.session().is_some()
    }

    pub fn current_user(&self) -> Option<CurrentUser> {
        self.session().map(|s| CurrentUser {
            email: s.email,
            role: s.role,
        })
    }

    pub fn change_password(&self, email: &str, old_password: &str, new_password: &str) -> Result<(), AuthError> {
        if new_password.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }
        let mut users = self.load_users()?;
        let user = users
            .iter_mut()
            .find(|u| u.email == email)
            .ok_or(AuthError::InvalidCredentials)?;
        if !self.verify(old_password, &user.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }
        user.password_hash = self.hash(new_password)?;
        self.save_users(&users)?;
        info!(email, "Admin password changed");
        Ok(())
    }

    fn seed_default_admin(&self) -> Result<(), AuthError> {
        let Some((email, password)) = &self.default_admin else {
            return Ok(());
        };
        if self.load_users()?.is_empty() {
            info!(email = %email, "Seeding default admin account");
            self.register(email, password, DEFAULT_ROLE)?;
        }
        Ok(())
    }

    fn hash(&self, password: &str) -> Result<String, AuthError> {
        let salt_bytes: [u8; 16] = rand::random();
        let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| AuthError::Hash(e.to_string()))?;
        self.argon
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| AuthError::Hash(e.to_string()))
    }

    fn verify(&self, password: &str, phc: &str) -> bool {
        match PasswordHash::new(phc) {
            Ok(parsed) => self.argon.verify_password(password.as_bytes(), &parsed).is_ok(),
            Err(e) => {
                warn!(error = %e, "Stored password hash is malformed");
                false
            }
        }
    }

    fn load_users(&self) -> Result<Vec<StoredUser>, AuthError> {
        match self.space.get_raw(USERS_KEY)? {
            Some(sealed) => Ok(serde_json::from_slice(&self.sealer.open(&sealed)?)?),
            None => Ok(Vec::new()),
        }
    }

    fn save_users(&self, users: &[StoredUser]) -> Result<(), AuthError> {
        let sealed = self.sealer.seal(&serde_json::to_vec(users)?)?;
        self.space.set_raw(USERS_KEY, &sealed)?;
        Ok(())
    }
}
