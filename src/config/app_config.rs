use std::env;
use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Basic-auth credentials guarding the admin routes.
#[derive(Clone)]
pub struct AdminCredentials {
    pub login: String,
    pub password: String,
}

impl fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Addresses used on outgoing mail.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub no_reply_email: String,
    pub reply_email: Option<String>,
    pub support_email: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: IpAddr,
    pub port: u16,
    pub debug: bool,
    /// Public origin used to build confirmation links.
    pub base_url: String,
    pub uploads_dir: PathBuf,
    pub max_upload_size_mb: u64,
    pub admin: Option<AdminCredentials>,
    pub mail: MailConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let host = parse_or(&get, "HOST", IpAddr::from([127, 0, 0, 1]))?;
        let port = parse_or(&get, "PORT", 8080u16)?;
        let max_upload_size_mb = parse_or(&get, "MAX_FILE_UPLOAD_SIZE_MB", 10u64)?;
        if max_upload_size_mb == 0 {
            return Err(ConfigError::Invalid {
                key: "MAX_FILE_UPLOAD_SIZE_MB",
                value: "0".to_string(),
            });
        }

        let debug = get("DEBUG").map(|v| flag_enabled(&v)).unwrap_or(false);
        let base_url = get("BASE_URL")
            .unwrap_or_else(|| format!("http://localhost:{}", port))
            .trim_end_matches('/')
            .to_string();
        let uploads_dir = get("UPLOADS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./uploads"));

        let admin = match (get("ADMIN_LOGIN"), get("ADMIN_PASSWORD")) {
            (Some(login), Some(password)) => Some(AdminCredentials { login, password }),
            _ => {
                warn!("ADMIN_LOGIN/ADMIN_PASSWORD not set; admin routes will reject every request");
                None
            }
        };

        let mail = MailConfig {
            no_reply_email: get("NO_REPLY_EMAIL")
                .unwrap_or_else(|| "no-reply@localhost".to_string()),
            reply_email: get("REPLY_EMAIL"),
            support_email: get("SUPPORT_EMAIL").unwrap_or_default(),
        };

        Ok(Self {
            database_url,
            host,
            port,
            debug,
            base_url,
            uploads_dir,
            max_upload_size_mb,
            admin,
            mail,
        })
    }

    pub fn max_upload_size_bytes(&self) -> usize {
        usize::try_from(self.max_upload_size_mb << 20).unwrap_or(usize::MAX)
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

fn flag_enabled(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "True")
}
