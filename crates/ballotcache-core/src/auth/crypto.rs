use argon2::Argon2;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};

use super::AuthError;

/// Fixed salt for deriving the storage key from the configured secret.
const KEY_SALT: &[u8] = b"ballotcache.admin.v1";

const NONCE_LEN: usize = 12;

/// Encrypts auth records before they reach the shared store.
///
/// Sealed values are hex strings of `nonce || ciphertext`.
pub struct Sealer {
    cipher: ChaCha20Poly1305,
}

impl Sealer {
    pub fn derive(secret: &str, argon: &Argon2<'_>) -> Result<Self, AuthError> {
        let mut key = [0u8; 32];
        argon
            .hash_password_into(secret.as_bytes(), KEY_SALT, &mut key)
            .map_err(|e| AuthError::Hash(e.to_string()))?;
        Ok(Self {
            cipher: ChaCha20Poly1305::new(Key::from_slice(&key)),
        })
    }

    pub fn seal(&self, plaintext: &[u8]) -> Result<String, AuthError> {
        let nonce_bytes: [u8; NONCE_LEN] = rand::random();
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|_| AuthError::Crypto)?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(hex::encode(out))
    }

    pub fn open(&self, sealed: &str) -> Result<Vec<u8>, AuthError> {
        let bytes = hex::decode(sealed).map_err(|_| AuthError::Crypto)?;
        if bytes.len() < NONCE_LEN {
            return Err(AuthError::Crypto);
        }
        let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| AuthError::Crypto)
    }
}
