use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// How long a confirmation token stays consumable after it is issued.
pub const TOKEN_TTL_DAYS: i64 = 7;

pub fn token_ttl() -> Duration {
    Duration::days(TOKEN_TTL_DAYS)
}

#[derive(Clone, FromRow, Serialize, Deserialize)]
pub struct WhitelistToken {
    pub whitelist_id: i64,
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub expired_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

impl WhitelistToken {
    pub fn is_consumable(&self, now: DateTime<Utc>) -> bool {
        self.used_at.is_none() && now < self.expired_at
    }
}

// The token is a bearer secret, keep it out of logs.
impl std::fmt::Debug for WhitelistToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhitelistToken")
            .field("whitelist_id", &self.whitelist_id)
            .field("token", &"<redacted>")
            .field("created_at", &self.created_at)
            .field("expired_at", &self.expired_at)
            .field("used_at", &self.used_at)
            .finish()
    }
}
