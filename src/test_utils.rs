pub mod test_helpers {
    use crate::config::AppConfig;
    use crate::random;
    use crate::services::{EmailError, EmailService};
    use crate::AppState;
    use async_trait::async_trait;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use chrono::{Duration, Utc};
    use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use tempfile::{NamedTempFile, TempDir};

    pub const TEST_ADMIN_LOGIN: &str = "admin";
    pub const TEST_ADMIN_PASSWORD: &str = "admin-password";

    /// Create a new in-memory SQLite database for testing
    pub async fn create_test_db() -> Result<SqlitePool, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await?;

        // Run migrations
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(pool)
    }

    /// Create a temporary file-based SQLite database for testing
    /// Useful when several connections must see the same data, e.g. to race
    /// requests against each other
    pub async fn create_test_db_file(
        max_connections: u32,
    ) -> Result<(SqlitePool, NamedTempFile), sqlx::Error> {
        let temp_file = NamedTempFile::new().map_err(sqlx::Error::Io)?;
        let db_path = temp_file
            .path()
            .to_str()
            .ok_or_else(|| sqlx::Error::Configuration("Invalid database path".into()))?;
        let database_url = format!("sqlite://{}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(&database_url)
            .await?;

        // Run migrations
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok((pool, temp_file))
    }

    /// Insert a photo row without writing a file
    pub async fn insert_test_photo(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        let path = format!("/nonexistent/{}.png", random::storage_name());
        let result = sqlx::query("INSERT INTO photos (path, extension, created_at) VALUES (?, ?, ?)")
            .bind(path)
            .bind("png")
            .bind(Utc::now())
            .execute(pool)
            .await?;

        Ok(result.last_insert_rowid())
    }

    /// Move a token's expiry into the past
    pub async fn expire_token(pool: &SqlitePool, token: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE whitelist_tokens SET expired_at = ? WHERE token = ?")
            .bind(Utc::now() - Duration::seconds(1))
            .bind(token)
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn count_rows(pool: &SqlitePool, table: &str) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(pool)
            .await
    }

    /// Email service that keeps every (recipient, token) pair it was asked to send
    #[derive(Default)]
    pub struct RecordingEmailService {
        sent: Mutex<Vec<(String, String)>>,
    }

    impl RecordingEmailService {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
        }

        pub fn last_token_for(&self, email: &str) -> Option<String> {
            self.sent()
                .into_iter()
                .rev()
                .find(|(to, _)| to == email)
                .map(|(_, token)| token)
        }
    }

    #[async_trait]
    impl EmailService for RecordingEmailService {
        async fn send_confirmation_email(
            &self,
            to_email: &str,
            token: &str,
        ) -> Result<(), EmailError> {
            if let Ok(mut sent) = self.sent.lock() {
                sent.push((to_email.to_string(), token.to_string()));
            }
            Ok(())
        }
    }

    /// Email service whose transport is always down
    pub struct FailingEmailService;

    #[async_trait]
    impl EmailService for FailingEmailService {
        async fn send_confirmation_email(&self, _: &str, _: &str) -> Result<(), EmailError> {
            Err(EmailError::SendFailed("connection refused".to_string()))
        }
    }

    /// Configuration pointing uploads at `uploads_dir`, with test admin credentials
    pub fn test_config(uploads_dir: &std::path::Path) -> AppConfig {
        let mut values = HashMap::new();
        values.insert("DATABASE_URL", "sqlite::memory:".to_string());
        values.insert("BASE_URL", "http://localhost:8080".to_string());
        values.insert("UPLOADS_DIR", uploads_dir.to_string_lossy().to_string());
        values.insert("MAX_FILE_UPLOAD_SIZE_MB", "1".to_string());
        values.insert("ADMIN_LOGIN", TEST_ADMIN_LOGIN.to_string());
        values.insert("ADMIN_PASSWORD", TEST_ADMIN_PASSWORD.to_string());
        values.insert("SUPPORT_EMAIL", "support@example.org".to_string());

        AppConfig::from_lookup(|key| values.get(key).cloned())
            .unwrap_or_else(|e| panic!("test configuration is invalid: {}", e))
    }

    /// Full application state over `pool`, with uploads in a fresh temp dir.
    /// Keep the returned `TempDir` alive for the duration of the test.
    pub fn create_test_state(
        pool: SqlitePool,
        email_service: Arc<dyn EmailService>,
    ) -> std::io::Result<(AppState, TempDir)> {
        let uploads = tempfile::tempdir()?;
        let config = test_config(uploads.path());
        Ok((AppState::new(pool, config, email_service), uploads))
    }

    pub fn basic_auth_header(login: &str, password: &str) -> String {
        format!("Basic {}", STANDARD.encode(format!("{}:{}", login, password)))
    }

    pub fn admin_auth_header() -> String {
        basic_auth_header(TEST_ADMIN_LOGIN, TEST_ADMIN_PASSWORD)
    }

    /// Minimal multipart/form-data encoder for handler tests
    pub struct MultipartBody {
        boundary: String,
        body: Vec<u8>,
    }

    impl Default for MultipartBody {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MultipartBody {
        pub fn new() -> Self {
            Self {
                boundary: format!("----whitelist{}", random::storage_name()),
                body: Vec::new(),
            }
        }

        pub fn text(mut self, name: &str, value: &str) -> Self {
            self.body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                    self.boundary, name, value
                )
                .as_bytes(),
            );
            self
        }

        pub fn file(mut self, name: &str, filename: &str, content: &[u8]) -> Self {
            self.body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n",
                    self.boundary, name, filename
                )
                .as_bytes(),
            );
            self.body.extend_from_slice(content);
            self.body.extend_from_slice(b"\r\n");
            self
        }

        pub fn content_type(&self) -> String {
            format!("multipart/form-data; boundary={}", self.boundary)
        }

        pub fn finish(mut self) -> (String, Vec<u8>) {
            self.body
                .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
            (self.content_type(), self.body)
        }
    }

    /// A valid registration for `email` with a small passport image
    pub fn registration_body(email: &str) -> (String, Vec<u8>) {
        MultipartBody::new()
            .text("name", "Alice")
            .text("email", email)
            .text("phone", "+1 555 0100")
            .text("country", "Canada")
            .text("birthday", "1990-01-01")
            .file("passport", "passport.png", b"\x89PNG\r\n\x1a\nfake")
            .finish()
    }
}
