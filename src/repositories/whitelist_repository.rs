use crate::models::{
    ListQuery, NewWhitelist, StageFilter, VerificationStage, Whitelist, WhitelistListRow,
    WhitelistToken,
};
use crate::random;
use crate::repositories::{is_unique_violation, RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

const WHITELIST_COLUMNS: &str = "id, passport_id, selfie_id, name, email, phone, birthday, \
     country, verification_stage, created_at, updated_at";

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait WhitelistRepository: Send + Sync {
    async fn email_exists(&self, email: &str) -> RepositoryResult<bool>;

    /// Inserts the application and its first confirmation token in one
    /// transaction. Fails with `AlreadyExists` when the email is taken.
    async fn create_with_token(
        &self,
        application: &NewWhitelist,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> RepositoryResult<(Whitelist, WhitelistToken)>;

    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Whitelist>>;
    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<Whitelist>>;
    async fn find_tokens(&self, whitelist_id: i64) -> RepositoryResult<Vec<WhitelistToken>>;

    /// Marks a consumable token used and advances its application to
    /// `EmailConfirmed`, atomically. Returns `None` when no unused,
    /// unexpired token matches.
    async fn consume_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Option<Whitelist>>;

    /// Sets the stage with a single predicated UPDATE and returns the number
    /// of rows changed. With `required_below`, rows whose stage is not
    /// strictly below it are left untouched.
    async fn update_stage(
        &self,
        id: i64,
        stage: VerificationStage,
        required_below: Option<VerificationStage>,
        now: DateTime<Utc>,
    ) -> RepositoryResult<u64>;

    /// Page of applications plus the total number matching the filters.
    async fn list(&self, query: &ListQuery) -> RepositoryResult<(Vec<WhitelistListRow>, i64)>;
}

pub struct SqliteWhitelistRepository {
    pool: SqlitePool,
}

impl SqliteWhitelistRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn push_list_filters(builder: &mut QueryBuilder<'_, Sqlite>, query: &ListQuery) {
    match query.stage {
        StageFilter::All => {
            builder
                .push(" WHERE w.verification_stage >= ")
                .push_bind(VerificationStage::EmailConfirmed);
        }
        StageFilter::Only(stage) => {
            builder.push(" WHERE w.verification_stage = ").push_bind(stage);
        }
    }

    if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
        builder
            .push(" AND w.name LIKE ")
            .push_bind(format!("%{}%", escape_like(search)))
            .push(" ESCAPE '\\'");
    }
}

#[async_trait]
impl WhitelistRepository for SqliteWhitelistRepository {
    async fn email_exists(&self, email: &str) -> RepositoryResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM whitelists WHERE email = ?")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;

        Ok(count > 0)
    }

    async fn create_with_token(
        &self,
        application: &NewWhitelist,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> RepositoryResult<(Whitelist, WhitelistToken)> {
        // Dropping the transaction on any early return rolls both inserts back
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO whitelists
                (passport_id, selfie_id, name, email, phone, birthday, country,
                 verification_stage, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(application.passport_id)
        .bind(application.selfie_id)
        .bind(&application.name)
        .bind(&application.email)
        .bind(&application.phone)
        .bind(&application.birthday)
        .bind(&application.country)
        .bind(VerificationStage::EmailNotConfirmed)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await;

        let whitelist_id = match inserted {
            Ok(result) => result.last_insert_rowid(),
            Err(e) if is_unique_violation(&e, "whitelists.email") => {
                return Err(RepositoryError::AlreadyExists)
            }
            Err(e) => return Err(RepositoryError::Database(e)),
        };

        let token = loop {
            let candidate = random::confirmation_token();
            let taken: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM whitelist_tokens WHERE token = ?")
                    .bind(&candidate)
                    .fetch_one(&mut *tx)
                    .await?;
            if taken == 0 {
                break candidate;
            }
            tracing::warn!(
                "Confirmation token collision for whitelist {}, regenerating",
                whitelist_id
            );
        };

        let confirmation = WhitelistToken {
            whitelist_id,
            token,
            created_at: now,
            expired_at: now + ttl,
            used_at: None,
        };

        sqlx::query(
            r#"
            INSERT INTO whitelist_tokens (whitelist_id, token, created_at, expired_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(confirmation.whitelist_id)
        .bind(&confirmation.token)
        .bind(confirmation.created_at)
        .bind(confirmation.expired_at)
        .execute(&mut *tx)
        .await?;

        let whitelist = sqlx::query_as::<_, Whitelist>(&format!(
            "SELECT {} FROM whitelists WHERE id = ?",
            WHITELIST_COLUMNS
        ))
        .bind(whitelist_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok((whitelist, confirmation))
    }

    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Whitelist>> {
        let whitelist = sqlx::query_as::<_, Whitelist>(&format!(
            "SELECT {} FROM whitelists WHERE id = ?",
            WHITELIST_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(whitelist)
    }

    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<Whitelist>> {
        let whitelist = sqlx::query_as::<_, Whitelist>(&format!(
            "SELECT {} FROM whitelists WHERE email = ?",
            WHITELIST_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(whitelist)
    }

    async fn find_tokens(&self, whitelist_id: i64) -> RepositoryResult<Vec<WhitelistToken>> {
        let tokens = sqlx::query_as::<_, WhitelistToken>(
            r#"
            SELECT whitelist_id, token, created_at, expired_at, used_at
            FROM whitelist_tokens
            WHERE whitelist_id = ?
            ORDER BY created_at
            "#,
        )
        .bind(whitelist_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(tokens)
    }

    async fn consume_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Option<Whitelist>> {
        let mut tx = self.pool.begin().await?;

        // Claiming the token is a single predicated write, so of two
        // concurrent confirmations only one sees a row come back.
        let claimed: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE whitelist_tokens
            SET used_at = ?
            WHERE token = ? AND used_at IS NULL AND expired_at > ?
            RETURNING whitelist_id
            "#,
        )
        .bind(now)
        .bind(token)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(whitelist_id) = claimed else {
            return Ok(None);
        };

        // Never move an application backwards, e.g. one an admin already
        // accepted before the applicant clicked the link.
        let advanced = sqlx::query(
            r#"
            UPDATE whitelists
            SET verification_stage = CASE
                    WHEN verification_stage < ? THEN ?
                    ELSE verification_stage
                END,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(VerificationStage::EmailConfirmed)
        .bind(VerificationStage::EmailConfirmed)
        .bind(now)
        .bind(whitelist_id)
        .execute(&mut *tx)
        .await?;

        if advanced.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        let whitelist = sqlx::query_as::<_, Whitelist>(&format!(
            "SELECT {} FROM whitelists WHERE id = ?",
            WHITELIST_COLUMNS
        ))
        .bind(whitelist_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(whitelist))
    }

    async fn update_stage(
        &self,
        id: i64,
        stage: VerificationStage,
        required_below: Option<VerificationStage>,
        now: DateTime<Utc>,
    ) -> RepositoryResult<u64> {
        let query = match required_below {
            Some(ceiling) => sqlx::query(
                r#"
                UPDATE whitelists
                SET verification_stage = ?, updated_at = ?
                WHERE id = ? AND verification_stage < ?
                "#,
            )
            .bind(stage)
            .bind(now)
            .bind(id)
            .bind(ceiling),
            None => sqlx::query(
                "UPDATE whitelists SET verification_stage = ?, updated_at = ? WHERE id = ?",
            )
            .bind(stage)
            .bind(now)
            .bind(id),
        };

        let result = query.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn list(&self, query: &ListQuery) -> RepositoryResult<(Vec<WhitelistListRow>, i64)> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM whitelists w");
        push_list_filters(&mut count, query);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT w.id, w.name, w.email, w.birthday, w.country, w.verification_stage,
                   w.passport_id, p.path AS passport_path, p.extension AS passport_extension
            FROM whitelists w
            INNER JOIN photos p ON p.id = w.passport_id
            "#,
        );
        push_list_filters(&mut select, query);

        // Column names come from the SortBy enum, never from user input
        select
            .push(" ORDER BY ")
            .push(query.sort_by.column())
            .push(if query.descending { " DESC" } else { " ASC" })
            .push(", w.id ASC");

        if query.rows_per_page > 0 {
            select
                .push(" LIMIT ")
                .push_bind(query.rows_per_page)
                .push(" OFFSET ")
                .push_bind(query.offset());
        }

        let rows = select
            .build_query_as::<WhitelistListRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok((rows, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{token_ttl, SortBy};
    use crate::test_utils::test_helpers;

    fn application(email: &str, passport_id: i64) -> NewWhitelist {
        NewWhitelist {
            passport_id,
            selfie_id: None,
            name: "Alice".to_string(),
            email: email.to_string(),
            phone: String::new(),
            birthday: "1990-01-01".to_string(),
            country: "Canada".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_with_token_persists_pair() {
        let pool = test_helpers::create_test_db().await.unwrap();
        let passport = test_helpers::insert_test_photo(&pool).await.unwrap();
        let repo = SqliteWhitelistRepository::new(pool);

        let now = Utc::now();
        let (whitelist, token) = repo
            .create_with_token(&application("alice@x.com", passport), now, token_ttl())
            .await
            .unwrap();

        assert_eq!(whitelist.verification_stage, VerificationStage::EmailNotConfirmed);
        assert_eq!(token.whitelist_id, whitelist.id);
        assert_eq!(token.expired_at - token.created_at, Duration::days(7));

        let stored = repo.find_tokens(whitelist.id).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].token, token.token);
        assert!(stored[0].used_at.is_none());
    }

    #[tokio::test]
    async fn test_email_uniqueness_ignores_case() {
        let pool = test_helpers::create_test_db().await.unwrap();
        let first = test_helpers::insert_test_photo(&pool).await.unwrap();
        let second = test_helpers::insert_test_photo(&pool).await.unwrap();
        let repo = SqliteWhitelistRepository::new(pool);

        repo.create_with_token(&application("alice@x.com", first), Utc::now(), token_ttl())
            .await
            .unwrap();

        assert!(repo.email_exists("ALICE@x.com").await.unwrap());
        let duplicate = repo
            .create_with_token(&application("Alice@X.com", second), Utc::now(), token_ttl())
            .await;
        assert!(matches!(duplicate, Err(RepositoryError::AlreadyExists)));
    }

    #[tokio::test]
    async fn test_update_stage_respects_ceiling() {
        let pool = test_helpers::create_test_db().await.unwrap();
        let passport = test_helpers::insert_test_photo(&pool).await.unwrap();
        let repo = SqliteWhitelistRepository::new(pool);
        let (whitelist, _) = repo
            .create_with_token(&application("bob@x.com", passport), Utc::now(), token_ttl())
            .await
            .unwrap();

        let changed = repo
            .update_stage(whitelist.id, VerificationStage::Accepted, None, Utc::now())
            .await
            .unwrap();
        assert_eq!(changed, 1);

        let changed = repo
            .update_stage(
                whitelist.id,
                VerificationStage::Declined,
                Some(VerificationStage::Accepted),
                Utc::now(),
            )
            .await
            .unwrap();
        assert_eq!(changed, 0);

        let stored = repo.find_by_id(whitelist.id).await.unwrap().unwrap();
        assert_eq!(stored.verification_stage, VerificationStage::Accepted);
    }

    #[tokio::test]
    async fn test_list_search_escapes_wildcards() {
        let pool = test_helpers::create_test_db().await.unwrap();
        let passport = test_helpers::insert_test_photo(&pool).await.unwrap();
        let repo = SqliteWhitelistRepository::new(pool);
        let (whitelist, _) = repo
            .create_with_token(&application("carol@x.com", passport), Utc::now(), token_ttl())
            .await
            .unwrap();
        repo.update_stage(
            whitelist.id,
            VerificationStage::EmailConfirmed,
            None,
            Utc::now(),
        )
        .await
        .unwrap();

        let mut query = ListQuery {
            sort_by: SortBy::Name,
            search: Some("lic".to_string()),
            ..ListQuery::default()
        };
        let (rows, total) = repo.list(&query).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].email, "carol@x.com");

        query.search = Some("%".to_string());
        let (rows, total) = repo.list(&query).await.unwrap();
        assert_eq!(total, 0);
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_list_page_past_end_is_empty() {
        let pool = test_helpers::create_test_db().await.unwrap();
        let passport = test_helpers::insert_test_photo(&pool).await.unwrap();
        let repo = SqliteWhitelistRepository::new(pool);
        let (whitelist, _) = repo
            .create_with_token(&application("dave@x.com", passport), Utc::now(), token_ttl())
            .await
            .unwrap();
        repo.update_stage(
            whitelist.id,
            VerificationStage::EmailConfirmed,
            None,
            Utc::now(),
        )
        .await
        .unwrap();

        let query = ListQuery {
            rows_per_page: 2,
            page: i64::MAX,
            ..ListQuery::default()
        };
        let (rows, total) = repo.list(&query).await.unwrap();
        assert_eq!(total, 1);
        assert!(rows.is_empty());
    }
}
