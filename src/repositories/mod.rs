pub mod photo_repository;
pub mod whitelist_repository;

pub use photo_repository::{PhotoRepository, SqlitePhotoRepository};
pub use whitelist_repository::{SqliteWhitelistRepository, WhitelistRepository};

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Record not found")]
    NotFound,
    #[error("Record already exists")]
    AlreadyExists,
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// True when `err` is a UNIQUE constraint failure on `column`
/// (SQLite reports it as `table.column`).
pub(crate) fn is_unique_violation(err: &sqlx::Error, column: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.is_unique_violation() && db_err.message().contains(column)
        }
        _ => false,
    }
}
