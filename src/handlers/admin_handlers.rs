use crate::error::{AppError, Result};
use crate::models::{ListQuery, ModerationAction, SortBy, StageFilter};
use crate::services::WhitelistPage;
use crate::validation::{FieldErrors, MSG_INVALID_FORMAT};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;

/// Raw list parameters. Kept as strings so bad values become 422 field
/// errors instead of a generic extractor rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub descending: Option<String>,
    pub page: Option<String>,
    pub rows_per_page: Option<String>,
    pub sort_by: Option<String>,
    pub search: Option<String>,
    pub stage: Option<String>,
}

impl ListParams {
    pub fn into_query(self) -> std::result::Result<ListQuery, FieldErrors> {
        let mut errors = FieldErrors::new();

        let sort_by = match non_empty(self.sort_by.as_deref()) {
            None => SortBy::default(),
            Some(value) => match serde_json::from_value::<SortBy>(serde_json::Value::from(value)) {
                Ok(sort_by) => sort_by,
                Err(_) => {
                    errors.add("sortBy", MSG_INVALID_FORMAT);
                    SortBy::default()
                }
            },
        };

        let stage = match non_empty(self.stage.as_deref()) {
            None => StageFilter::All,
            Some(value) => value.parse().unwrap_or_else(|_| {
                errors.add("stage", MSG_INVALID_FORMAT);
                StageFilter::All
            }),
        };

        let descending = non_empty(self.descending.as_deref())
            .map(|value| matches!(value, "1" | "true" | "TRUE" | "True"))
            .unwrap_or(false);

        let page = parse_number(&mut errors, "page", self.page.as_deref(), 1).max(1);
        let rows_per_page =
            parse_number(&mut errors, "rowsPerPage", self.rows_per_page.as_deref(), 0).max(0);

        let query = ListQuery {
            sort_by,
            descending,
            stage,
            search: non_empty(self.search.as_deref()).map(str::to_string),
            rows_per_page,
            page,
        };
        if !query.offset_in_range() {
            errors.add("page", MSG_INVALID_FORMAT);
        }

        errors.into_result()?;
        Ok(query)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_number(errors: &mut FieldErrors, field: &str, value: Option<&str>, default: i64) -> i64 {
    match non_empty(value) {
        None => default,
        Some(value) => value.parse().unwrap_or_else(|_| {
            errors.add(field, MSG_INVALID_FORMAT);
            default
        }),
    }
}

/// Lets the admin frontend check its stored credentials; the auth layer
/// does the actual work.
pub async fn basic_auth_check() -> StatusCode {
    StatusCode::OK
}

pub async fn list_whitelists(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<WhitelistPage>> {
    let query = params.into_query().map_err(AppError::Validation)?;
    let page = state.listing_service.list(query).await?;
    Ok(Json(page))
}

async fn moderate(state: &AppState, id: &str, action: ModerationAction) -> Result<StatusCode> {
    // Non-numeric ids cannot name an application
    let id: i64 = id.parse().map_err(|_| AppError::NotFound)?;
    state.confirmation_service.moderate(id, action).await?;
    Ok(StatusCode::OK)
}

pub async fn accept_whitelist(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    moderate(&state, &id, ModerationAction::Accept).await
}

pub async fn decline_whitelist(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    moderate(&state, &id, ModerationAction::Decline).await
}

pub async fn question_whitelist(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    moderate(&state, &id, ModerationAction::Question).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VerificationStage;

    #[test]
    fn test_defaults() {
        let query = ListParams::default().into_query().unwrap();
        assert_eq!(query.sort_by, SortBy::Id);
        assert_eq!(query.stage, StageFilter::All);
        assert_eq!(query.page, 1);
        assert_eq!(query.rows_per_page, 0);
        assert!(!query.descending);
        assert!(query.search.is_none());
    }

    #[test]
    fn test_parses_frontend_params() {
        let params = ListParams {
            descending: Some("true".to_string()),
            page: Some("3".to_string()),
            rows_per_page: Some("25".to_string()),
            sort_by: Some("birthday".to_string()),
            search: Some(" ali ".to_string()),
            stage: Some("declined".to_string()),
        };
        let query = params.into_query().unwrap();
        assert_eq!(query.sort_by, SortBy::Birthday);
        assert_eq!(query.stage, StageFilter::Only(VerificationStage::Declined));
        assert_eq!(query.page, 3);
        assert_eq!(query.rows_per_page, 25);
        assert!(query.descending);
        assert_eq!(query.search.as_deref(), Some("ali"));
    }

    #[test]
    fn test_rejects_unknown_sort_and_stage() {
        let params = ListParams {
            sort_by: Some("email; DROP TABLE whitelists".to_string()),
            stage: Some("everything".to_string()),
            ..ListParams::default()
        };
        let errors = params.into_query().unwrap_err();
        assert!(errors.contains("sortBy"));
        assert!(errors.contains("stage"));
    }

    #[test]
    fn test_rejects_page_beyond_range() {
        let params = ListParams {
            page: Some(i64::MAX.to_string()),
            rows_per_page: Some("2".to_string()),
            ..ListParams::default()
        };
        let errors = params.into_query().unwrap_err();
        assert!(errors.contains("page"));

        // Without paging the page number is irrelevant
        let params = ListParams {
            page: Some(i64::MAX.to_string()),
            ..ListParams::default()
        };
        assert!(params.into_query().is_ok());
    }
}
