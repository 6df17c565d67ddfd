pub mod app_config;

pub use app_config::{AdminCredentials, AppConfig, ConfigError, MailConfig};
