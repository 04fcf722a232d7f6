use anyhow::{Context, Result};
use keyring::Entry;

const SERVICE_NAME: &str = "ballotcache";
const API_KEY_ACCOUNT: &str = "fec-api-key";

/// The FEC API key in the OS keychain.
pub struct ApiKeyStore;

impl ApiKeyStore {
    fn entry() -> Result<Entry> {
        Entry::new(SERVICE_NAME, API_KEY_ACCOUNT).context("Failed to create keyring entry")
    }

    pub fn store(api_key: &str) -> Result<()> {
        Self::entry()?
            .set_password(api_key)
            .context("Failed to store API key in keychain")
    }

    /// The stored key, or `None` when there is no entry.
    pub fn get() -> Result<Option<String>> {
        match Self::entry()?.get_password() {
            Ok(key) => Ok(Some(key)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve API key from keychain"),
        }
    }

    pub fn delete() -> Result<()> {
        match Self::entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete API key from keychain"),
        }
    }
}

/// Last four characters only, for display.
pub fn mask_api_key(api_key: &str) -> String {
    let chars: Vec<char> = api_key.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(chars.len() - 4), tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_api_key() {
        assert_eq!(mask_api_key("abcdefgh"), "****efgh");
        assert_eq!(mask_api_key("abc"), "***");
        assert_eq!(mask_api_key(""), "");
    }
}
