use crate::models::{ModerationAction, Whitelist};
use crate::repositories::{RepositoryError, WhitelistRepository};
use crate::validation;
use chrono::Utc;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum ConfirmationServiceError {
    #[error("Malformed confirmation token")]
    MalformedToken,
    #[error("Invalid or expired confirmation token")]
    InvalidOrExpiredToken,
    #[error("Whitelist application not found")]
    NotFound,
    #[error("Cannot {action} an application in stage {current}")]
    InvalidStageTransition {
        action: ModerationAction,
        current: crate::models::VerificationStage,
    },
    #[error("Repository error: {0}")]
    RepositoryError(#[from] RepositoryError),
}

/// Moves applications between verification stages: the applicant's email
/// confirmation and the admin's accept/decline/question decisions.
pub struct ConfirmationService {
    repository: Arc<dyn WhitelistRepository>,
}

impl ConfirmationService {
    pub fn new(repository: Arc<dyn WhitelistRepository>) -> Self {
        Self { repository }
    }

    /// Consumes `token` and returns the confirmed application's email.
    pub async fn confirm_email(&self, token: &str) -> Result<String, ConfirmationServiceError> {
        if !validation::is_valid_token_shape(token) {
            return Err(ConfirmationServiceError::MalformedToken);
        }

        match self.repository.consume_token(token, Utc::now()).await? {
            Some(whitelist) => {
                tracing::info!(
                    "Email confirmed for whitelist application {} (stage {})",
                    whitelist.id,
                    whitelist.verification_stage
                );
                Ok(whitelist.email)
            }
            None => {
                tracing::debug!("Rejected unknown, used or expired confirmation token");
                Err(ConfirmationServiceError::InvalidOrExpiredToken)
            }
        }
    }

    pub async fn moderate(
        &self,
        id: i64,
        action: ModerationAction,
    ) -> Result<Whitelist, ConfirmationServiceError> {
        if id <= 0 {
            return Err(ConfirmationServiceError::NotFound);
        }

        let changed = self
            .repository
            .update_stage(id, action.target(), action.required_below(), Utc::now())
            .await?;

        let current = self
            .repository
            .find_by_id(id)
            .await?
            .ok_or(ConfirmationServiceError::NotFound)?;

        if changed == 0 {
            tracing::warn!(
                "Refused to {} whitelist application {} in stage {}",
                action,
                id,
                current.verification_stage
            );
            return Err(ConfirmationServiceError::InvalidStageTransition {
                action,
                current: current.verification_stage,
            });
        }

        tracing::info!(
            "Whitelist application {} moved to {}",
            id,
            current.verification_stage
        );
        Ok(current)
    }

    pub async fn accept(&self, id: i64) -> Result<Whitelist, ConfirmationServiceError> {
        self.moderate(id, ModerationAction::Accept).await
    }

    pub async fn decline(&self, id: i64) -> Result<Whitelist, ConfirmationServiceError> {
        self.moderate(id, ModerationAction::Decline).await
    }

    pub async fn question(&self, id: i64) -> Result<Whitelist, ConfirmationServiceError> {
        self.moderate(id, ModerationAction::Question).await
    }
}
