pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod random;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod validation;

// Make test_utils available for both unit tests and integration tests
pub mod test_utils;

use config::AppConfig;
use repositories::{SqlitePhotoRepository, SqliteWhitelistRepository, WhitelistRepository};
use services::{ConfirmationService, EmailService, ListingService, PhotoStore, RegistrationService};
use sqlx::SqlitePool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub registration_service: Arc<RegistrationService>,
    pub confirmation_service: Arc<ConfirmationService>,
    pub listing_service: Arc<ListingService>,
    pub photo_store: Arc<PhotoStore>,
    pub email_service: Arc<dyn EmailService>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Wires the SQLite repositories into every service.
    pub fn new(pool: SqlitePool, config: AppConfig, email_service: Arc<dyn EmailService>) -> Self {
        let whitelist_repository: Arc<dyn WhitelistRepository> =
            Arc::new(SqliteWhitelistRepository::new(pool.clone()));
        let photo_repository = Arc::new(SqlitePhotoRepository::new(pool));

        Self {
            registration_service: Arc::new(RegistrationService::new(whitelist_repository.clone())),
            confirmation_service: Arc::new(ConfirmationService::new(whitelist_repository.clone())),
            listing_service: Arc::new(ListingService::new(whitelist_repository)),
            photo_store: Arc::new(PhotoStore::new(
                photo_repository,
                config.uploads_dir.clone(),
            )),
            email_service,
            config: Arc::new(config),
        }
    }
}
