use crate::models::{token_ttl, NewWhitelist, Whitelist};
use crate::repositories::{RepositoryError, WhitelistRepository};
use chrono::{Duration, Utc};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum RegistrationServiceError {
    #[error("Email already registered")]
    DuplicateEmail,
    #[error("Repository error: {0}")]
    RepositoryError(#[from] RepositoryError),
}

/// A freshly stored application and the plaintext token issued for it.
///
/// The token is only ever returned here; delivering it is the caller's job.
pub struct RegisteredApplication {
    pub whitelist: Whitelist,
    pub token: String,
}

pub struct RegistrationService {
    repository: Arc<dyn WhitelistRepository>,
    token_ttl: Duration,
}

impl RegistrationService {
    pub fn new(repository: Arc<dyn WhitelistRepository>) -> Self {
        Self {
            repository,
            token_ttl: token_ttl(),
        }
    }

    /// Cheap duplicate check, used before any photo is written to disk.
    ///
    /// This is advisory only: the UNIQUE constraint on `whitelists.email`
    /// decides in `register`.
    pub async fn ensure_email_available(&self, email: &str) -> Result<(), RegistrationServiceError> {
        if self.repository.email_exists(email).await? {
            return Err(RegistrationServiceError::DuplicateEmail);
        }
        Ok(())
    }

    pub async fn register(
        &self,
        application: NewWhitelist,
    ) -> Result<RegisteredApplication, RegistrationServiceError> {
        self.ensure_email_available(&application.email).await?;

        match self
            .repository
            .create_with_token(&application, Utc::now(), self.token_ttl)
            .await
        {
            Ok((whitelist, token)) => {
                tracing::info!(
                    "Registered whitelist application {} (expires {})",
                    whitelist.id,
                    token.expired_at
                );
                Ok(RegisteredApplication {
                    whitelist,
                    token: token.token,
                })
            }
            Err(RepositoryError::AlreadyExists) => {
                tracing::info!("Lost registration race for an already registered email");
                Err(RegistrationServiceError::DuplicateEmail)
            }
            Err(e) => Err(RegistrationServiceError::RepositoryError(e)),
        }
    }
}
