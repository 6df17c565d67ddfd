use crate::models::{ListQuery, SortBy, VerificationStage, WhitelistListRow};
use crate::repositories::{RepositoryError, WhitelistRepository};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum ListingServiceError {
    #[error("Repository error: {0}")]
    RepositoryError(#[from] RepositoryError),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassportPreview {
    pub id: i64,
    pub extension: String,
    /// `data:image/{ext};base64,...`, or `None` when the file is unreadable.
    pub src: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WhitelistSummary {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub birthday: String,
    pub country: String,
    pub verification_stage: VerificationStage,
    pub passport: PassportPreview,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub descending: bool,
    pub page: i64,
    pub rows_per_page: i64,
    pub rows_number: i64,
    pub sort_by: SortBy,
}

#[derive(Debug, Clone, Serialize)]
pub struct WhitelistPage {
    pub data: Vec<WhitelistSummary>,
    pub pagination: Pagination,
}

pub struct ListingService {
    repository: Arc<dyn WhitelistRepository>,
}

impl ListingService {
    pub fn new(repository: Arc<dyn WhitelistRepository>) -> Self {
        Self { repository }
    }

    pub async fn list(&self, query: ListQuery) -> Result<WhitelistPage, ListingServiceError> {
        let (rows, total) = self.repository.list(&query).await?;

        let mut data = Vec::with_capacity(rows.len());
        for row in rows {
            data.push(summarize(row).await);
        }

        Ok(WhitelistPage {
            data,
            pagination: Pagination {
                descending: query.descending,
                page: query.page.max(1),
                rows_per_page: query.rows_per_page,
                rows_number: total,
                sort_by: query.sort_by,
            },
        })
    }
}

async fn summarize(row: WhitelistListRow) -> WhitelistSummary {
    let src = match tokio::fs::read(&row.passport_path).await {
        Ok(bytes) => Some(data_uri(&row.passport_extension, &bytes)),
        Err(e) => {
            tracing::warn!(
                "Can't read passport photo {} for whitelist {}: {}",
                row.passport_id,
                row.id,
                e
            );
            None
        }
    };

    WhitelistSummary {
        id: row.id,
        name: row.name,
        email: row.email,
        birthday: row.birthday,
        country: row.country,
        verification_stage: row.verification_stage,
        passport: PassportPreview {
            id: row.passport_id,
            extension: row.passport_extension,
            src,
        },
    }
}

pub fn data_uri(extension: &str, bytes: &[u8]) -> String {
    format!("data:image/{};base64,{}", extension, STANDARD.encode(bytes))
}
