use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Admin sessions last a day from login.
const SESSION_EXPIRY_HOURS: i64 = 24;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminSession {
    pub token: String,
    pub email: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl AdminSession {
    pub fn issue(email: &str, role: &str) -> Self {
        let token: [u8; 32] = rand::random();
        Self {
            token: hex::encode(token),
            email: email.to_string(),
            role: role.to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at + Duration::hours(SESSION_EXPIRY_HOURS)
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at()
    }

    /// Minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> i64 {
        (self.expires_at() - Utc::now()).num_minutes().max(0)
    }
}
