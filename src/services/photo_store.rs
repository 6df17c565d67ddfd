use crate::models::Photo;
use crate::random;
use crate::repositories::{PhotoRepository, RepositoryError};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

const MAX_EXTENSION_LENGTH: usize = 5;
const MAX_NAME_ATTEMPTS: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum PhotoStoreError {
    #[error("Invalid file extension")]
    InvalidExtension,
    #[error("Uploaded file is empty")]
    EmptyFile,
    #[error("Could not allocate a unique file name")]
    NameExhausted,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Repository error: {0}")]
    RepositoryError(#[from] RepositoryError),
}

/// Writes uploaded photos under the uploads root and records them in `photos`.
pub struct PhotoStore {
    repository: Arc<dyn PhotoRepository>,
    root: PathBuf,
}

impl PhotoStore {
    pub fn new(repository: Arc<dyn PhotoRepository>, root: impl Into<PathBuf>) -> Self {
        Self {
            repository,
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lower-cased extension of `filename`, if it is 1-5 ASCII alphanumerics.
    pub fn extension_of(filename: &str) -> Option<String> {
        let (stem, ext) = filename.rsplit_once('.')?;
        if stem.is_empty()
            || ext.is_empty()
            || ext.len() > MAX_EXTENSION_LENGTH
            || !ext.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }

    /// `{root}/{n[0..3]}/{n[3..6]}/{n}.{ext}`
    pub fn path_for(&self, name: &str, extension: &str) -> PathBuf {
        self.root
            .join(&name[..3])
            .join(&name[3..6])
            .join(format!("{}.{}", name, extension))
    }

    pub async fn store(&self, filename: &str, bytes: &[u8]) -> Result<Photo, PhotoStoreError> {
        let extension = Self::extension_of(filename).ok_or(PhotoStoreError::InvalidExtension)?;
        if bytes.is_empty() {
            return Err(PhotoStoreError::EmptyFile);
        }

        let path = self.write_new_file(&extension, bytes).await?;
        let path_str = path.to_string_lossy().to_string();

        match self.repository.create(&path_str, &extension).await {
            Ok(photo) => {
                tracing::debug!("Stored photo {} at {}", photo.id, path_str);
                Ok(photo)
            }
            Err(e) => {
                if let Err(remove_err) = fs::remove_file(&path).await {
                    tracing::warn!("Failed to remove orphaned photo {}: {}", path_str, remove_err);
                }
                Err(e.into())
            }
        }
    }

    async fn write_new_file(&self, extension: &str, bytes: &[u8]) -> Result<PathBuf, PhotoStoreError> {
        for _ in 0..MAX_NAME_ATTEMPTS {
            let path = self.path_for(&random::storage_name(), extension);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await?;
            }

            let mut file = match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    tracing::warn!("Photo name collision at {}, regenerating", path.display());
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            file.write_all(bytes).await?;
            file.flush().await?;
            return Ok(path);
        }

        Err(PhotoStoreError::NameExhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::photo_repository::MockPhotoRepository;
    use chrono::Utc;

    #[test]
    fn test_extension_of() {
        assert_eq!(PhotoStore::extension_of("passport.JPG").as_deref(), Some("jpg"));
        assert_eq!(PhotoStore::extension_of("scan.final.jpeg").as_deref(), Some("jpeg"));
        assert_eq!(PhotoStore::extension_of("noext"), None);
        assert_eq!(PhotoStore::extension_of(".png"), None);
        assert_eq!(PhotoStore::extension_of("a.toolong"), None);
        assert_eq!(PhotoStore::extension_of("a.p/g"), None);
        assert_eq!(PhotoStore::extension_of("a."), None);
    }

    #[test]
    fn test_path_layout() {
        let store = PhotoStore::new(Arc::new(MockPhotoRepository::new()), "/srv/uploads");
        let name = "abcdefghij";
        assert_eq!(
            store.path_for(name, "png"),
            PathBuf::from("/srv/uploads/abc/def/abcdefghij.png")
        );
    }

    #[tokio::test]
    async fn test_store_writes_file_and_records_row() {
        let dir = tempfile::tempdir().unwrap();
        let mut mock_repo = MockPhotoRepository::new();
        mock_repo
            .expect_create()
            .withf(|_, ext| ext == "png")
            .times(1)
            .returning(|path, ext| {
                let photo = Photo {
                    id: 1,
                    path: path.to_string(),
                    extension: ext.to_string(),
                    created_at: Utc::now(),
                };
                Box::pin(async move { Ok(photo) })
            });

        let store = PhotoStore::new(Arc::new(mock_repo), dir.path());
        let photo = store.store("passport.PNG", b"\x89PNG").await.unwrap();

        let written = tokio::fs::read(&photo.path).await.unwrap();
        assert_eq!(written, b"\x89PNG");
        assert!(photo.path.ends_with(".png"));
    }

    #[tokio::test]
    async fn test_failed_insert_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut mock_repo = MockPhotoRepository::new();
        mock_repo
            .expect_create()
            .returning(|_, _| Box::pin(async { Err(RepositoryError::AlreadyExists) }));

        let store = PhotoStore::new(Arc::new(mock_repo), dir.path());
        let result = store.store("selfie.jpg", b"data").await;
        assert!(matches!(result, Err(PhotoStoreError::RepositoryError(_))));

        let entries = walk(dir.path());
        assert!(entries.is_empty(), "left files behind: {:?}", entries);
    }

    #[tokio::test]
    async fn test_rejects_bad_input_without_touching_storage() {
        let mut mock_repo = MockPhotoRepository::new();
        mock_repo.expect_create().never();
        let dir = tempfile::tempdir().unwrap();
        let store = PhotoStore::new(Arc::new(mock_repo), dir.path());

        assert!(matches!(
            store.store("passport", b"data").await,
            Err(PhotoStoreError::InvalidExtension)
        ));
        assert!(matches!(
            store.store("passport.png", b"").await,
            Err(PhotoStoreError::EmptyFile)
        ));
    }

    fn walk(dir: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                files.extend(walk(&path));
            } else {
                files.push(path);
            }
        }
        files
    }
}
