use crate::validation::{self, FieldErrors};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

/// Progress of an application through email confirmation and admin review.
///
/// Variants are declared in review order and the derived `Ord` is the single
/// source of truth for "earlier/later" comparisons. The discriminants are the
/// values stored in `whitelists.verification_stage`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[repr(i64)]
pub enum VerificationStage {
    #[serde(rename = "unconfirmed")]
    EmailNotConfirmed = 0,
    #[serde(rename = "confirmed")]
    EmailConfirmed = 1,
    #[serde(rename = "declined")]
    Declined = 2,
    #[serde(rename = "question")]
    Question = 3,
    #[serde(rename = "accepted")]
    Accepted = 4,
}

impl VerificationStage {
    pub const ALL: [VerificationStage; 5] = [
        VerificationStage::EmailNotConfirmed,
        VerificationStage::EmailConfirmed,
        VerificationStage::Declined,
        VerificationStage::Question,
        VerificationStage::Accepted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStage::EmailNotConfirmed => "unconfirmed",
            VerificationStage::EmailConfirmed => "confirmed",
            VerificationStage::Declined => "declined",
            VerificationStage::Question => "question",
            VerificationStage::Accepted => "accepted",
        }
    }
}

impl fmt::Display for VerificationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown verification stage: {0}")]
pub struct UnknownStage(pub String);

impl FromStr for VerificationStage {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VerificationStage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| UnknownStage(s.to_string()))
    }
}

/// An admin decision on an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationAction {
    Accept,
    Decline,
    Question,
}

impl ModerationAction {
    pub fn target(&self) -> VerificationStage {
        match self {
            ModerationAction::Accept => VerificationStage::Accepted,
            ModerationAction::Decline => VerificationStage::Declined,
            ModerationAction::Question => VerificationStage::Question,
        }
    }

    /// Exclusive upper bound the current stage must be below for the action
    /// to apply. `None` means the action is unconditional.
    pub fn required_below(&self) -> Option<VerificationStage> {
        match self {
            ModerationAction::Accept => None,
            ModerationAction::Decline | ModerationAction::Question => {
                Some(VerificationStage::Accepted)
            }
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            ModerationAction::Accept => "accept",
            ModerationAction::Decline => "decline",
            ModerationAction::Question => "question",
        }
    }
}

impl fmt::Display for ModerationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Whitelist {
    pub id: i64,
    pub passport_id: i64,
    pub selfie_id: Option<i64>,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub birthday: String,
    pub country: String,
    pub verification_stage: VerificationStage,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A validated application ready to be written, with its photos already stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewWhitelist {
    pub passport_id: i64,
    pub selfie_id: Option<i64>,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub birthday: String,
    pub country: String,
}

/// Applicant-provided fields as submitted, before photos are stored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WhitelistForm {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub birthday: String,
    pub country: String,
}

impl WhitelistForm {
    /// Trims surrounding whitespace from every field.
    pub fn normalized(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: self.phone.trim().to_string(),
            birthday: self.birthday.trim().to_string(),
            country: self.country.trim().to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        validation::check_name(&mut errors, "name", &self.name);
        validation::check_email(&mut errors, "email", &self.email);
        validation::check_phone(&mut errors, "phone", &self.phone);
        validation::check_date(&mut errors, "birthday", &self.birthday);
        validation::check_name(&mut errors, "country", &self.country);
        errors.into_result()
    }

    pub fn into_new_whitelist(self, passport_id: i64, selfie_id: Option<i64>) -> NewWhitelist {
        NewWhitelist {
            passport_id,
            selfie_id,
            name: self.name,
            email: self.email,
            phone: self.phone,
            birthday: self.birthday,
            country: self.country,
        }
    }
}

/// Column the admin list can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Id,
    Name,
    Country,
    Birthday,
}

impl SortBy {
    pub fn column(&self) -> &'static str {
        match self {
            SortBy::Id => "w.id",
            SortBy::Name => "w.name",
            SortBy::Country => "w.country",
            SortBy::Birthday => "w.birthday",
        }
    }
}

/// Which stages the admin list shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StageFilter {
    /// Every application whose email has been confirmed.
    #[default]
    All,
    Only(VerificationStage),
}

impl FromStr for StageFilter {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            Ok(StageFilter::All)
        } else {
            s.parse().map(StageFilter::Only)
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub sort_by: SortBy,
    pub descending: bool,
    pub stage: StageFilter,
    pub search: Option<String>,
    /// Zero disables paging.
    pub rows_per_page: i64,
    pub page: i64,
}

impl ListQuery {
    /// Rows skipped before the requested page. Saturates, so a page far past
    /// the end yields an empty result.
    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1).saturating_mul(self.rows_per_page.max(0))
    }

    /// Whether the offset fits in an i64 without saturating.
    pub fn offset_in_range(&self) -> bool {
        (self.page.max(1) - 1)
            .checked_mul(self.rows_per_page.max(0))
            .is_some()
    }
}

/// Row of the admin list: the application joined with its passport photo.
#[derive(Debug, Clone, FromRow)]
pub struct WhitelistListRow {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub birthday: String,
    pub country: String,
    pub verification_stage: VerificationStage,
    pub passport_id: i64,
    pub passport_path: String,
    pub passport_extension: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        assert!(VerificationStage::EmailNotConfirmed < VerificationStage::EmailConfirmed);
        assert!(VerificationStage::EmailConfirmed < VerificationStage::Declined);
        assert!(VerificationStage::Declined < VerificationStage::Question);
        assert!(VerificationStage::Question < VerificationStage::Accepted);
        assert_eq!(VerificationStage::Accepted as i64, 4);
    }

    #[test]
    fn test_stage_round_trips_through_names() {
        for stage in VerificationStage::ALL {
            assert_eq!(stage.as_str().parse::<VerificationStage>().unwrap(), stage);
        }
        assert!("approved".parse::<VerificationStage>().is_err());
        assert_eq!(
            serde_json::to_value(VerificationStage::EmailConfirmed).unwrap(),
            "confirmed"
        );
    }

    #[test]
    fn test_moderation_guards() {
        assert_eq!(ModerationAction::Accept.required_below(), None);
        for action in [ModerationAction::Decline, ModerationAction::Question] {
            let ceiling = action.required_below().unwrap();
            assert_eq!(ceiling, VerificationStage::Accepted);
            assert!(VerificationStage::Declined < ceiling);
            assert!(VerificationStage::Question < ceiling);
        }
        assert_eq!(
            ModerationAction::Question.target(),
            VerificationStage::Question
        );
        assert_eq!(
            ModerationAction::Decline.target(),
            VerificationStage::Declined
        );
    }

    #[test]
    fn test_list_offset_saturates() {
        let query = ListQuery {
            page: 3,
            rows_per_page: 25,
            ..ListQuery::default()
        };
        assert_eq!(query.offset(), 50);
        assert!(query.offset_in_range());

        let query = ListQuery {
            page: i64::MAX,
            rows_per_page: 2,
            ..ListQuery::default()
        };
        assert_eq!(query.offset(), i64::MAX);
        assert!(!query.offset_in_range());

        assert_eq!(ListQuery::default().offset(), 0);
    }

    #[test]
    fn test_stage_filter_parsing() {
        assert_eq!("all".parse::<StageFilter>().unwrap(), StageFilter::All);
        assert_eq!(
            "question".parse::<StageFilter>().unwrap(),
            StageFilter::Only(VerificationStage::Question)
        );
        assert!("everything".parse::<StageFilter>().is_err());
    }

    #[test]
    fn test_form_validation_collects_all_fields() {
        let form = WhitelistForm {
            name: String::new(),
            email: "not-an-email".to_string(),
            phone: String::new(),
            birthday: "1990-02-30".to_string(),
            country: "Neverland".to_string(),
        };
        let errors = form.validate().unwrap_err();
        assert!(errors.contains("name"));
        assert!(errors.contains("email"));
        assert!(errors.contains("birthday"));
        assert!(!errors.contains("country"));
        assert!(!errors.contains("phone"));
    }

    #[test]
    fn test_form_normalization() {
        let form = WhitelistForm {
            name: "  Alice ".to_string(),
            email: " alice@x.com\n".to_string(),
            phone: String::new(),
            birthday: "1990-01-01".to_string(),
            country: "Canada".to_string(),
        }
        .normalized();
        assert!(form.validate().is_ok());

        let new = form.into_new_whitelist(7, None);
        assert_eq!(new.email, "alice@x.com");
        assert_eq!(new.name, "Alice");
        assert_eq!(new.passport_id, 7);
    }
}
