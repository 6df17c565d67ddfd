use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// An uploaded identity photo stored on disk.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Photo {
    pub id: i64,
    pub path: String,
    pub extension: String,
    pub created_at: DateTime<Utc>,
}
