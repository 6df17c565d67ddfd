use crate::models::Photo;
use crate::repositories::{is_unique_violation, RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait PhotoRepository: Send + Sync {
    async fn create(&self, path: &str, extension: &str) -> RepositoryResult<Photo>;
    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Photo>>;
}

pub struct SqlitePhotoRepository {
    pool: SqlitePool,
}

impl SqlitePhotoRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PhotoRepository for SqlitePhotoRepository {
    async fn create(&self, path: &str, extension: &str) -> RepositoryResult<Photo> {
        let now = Utc::now();
        let result = sqlx::query("INSERT INTO photos (path, extension, created_at) VALUES (?, ?, ?)")
            .bind(path)
            .bind(extension)
            .bind(now)
            .execute(&self.pool)
            .await;

        match result {
            Ok(res) => Ok(Photo {
                id: res.last_insert_rowid(),
                path: path.to_string(),
                extension: extension.to_string(),
                created_at: now,
            }),
            Err(e) if is_unique_violation(&e, "photos.path") => Err(RepositoryError::AlreadyExists),
            Err(e) => Err(RepositoryError::Database(e)),
        }
    }

    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Photo>> {
        let photo = sqlx::query_as::<_, Photo>(
            "SELECT id, path, extension, created_at FROM photos WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(photo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_helpers;

    #[tokio::test]
    async fn test_create_and_find_photo() {
        let pool = test_helpers::create_test_db().await.unwrap();
        let repo = SqlitePhotoRepository::new(pool);

        let photo = repo.create("uploads/abc/def/abcdef.png", "png").await.unwrap();
        assert!(photo.id > 0);

        let found = repo.find_by_id(photo.id).await.unwrap().unwrap();
        assert_eq!(found.path, "uploads/abc/def/abcdef.png");
        assert_eq!(found.extension, "png");

        assert!(repo.find_by_id(photo.id + 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_path_is_rejected() {
        let pool = test_helpers::create_test_db().await.unwrap();
        let repo = SqlitePhotoRepository::new(pool);

        repo.create("uploads/a.jpg", "jpg").await.unwrap();
        let second = repo.create("uploads/a.jpg", "jpg").await;
        assert!(matches!(second, Err(RepositoryError::AlreadyExists)));
    }
}
