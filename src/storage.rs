//! Object storage for uploaded documents.
//!
//! Objects are addressed by relative paths of the form
//! `{user_id}/{document_type}_{member_index}_{timestamp}.{extension}`
//! inside a named bucket.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid object path: {0}")]
    InvalidPath(String),

    #[error("object exceeds size limit ({actual} > {limit} bytes)")]
    SizeLimitExceeded { actual: u64, limit: u64 },

    #[error("storage IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Kinds of uploaded documents, used as the file name prefix.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    IdProof,
    InstitutionId,
    Submission,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::IdProof => "id_proof",
            DocumentType::InstitutionId => "institution_id",
            DocumentType::Submission => "submission",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "id_proof" => Some(DocumentType::IdProof),
            "institution_id" => Some(DocumentType::InstitutionId),
            "submission" => Some(DocumentType::Submission),
            _ => None,
        }
    }
}

/// Builds the bucket-relative object path for an uploaded document.
pub fn document_path(
    user_id: Uuid,
    document_type: DocumentType,
    member_index: usize,
    uploaded_at: DateTime<Utc>,
    extension: &str,
) -> String {
    format!(
        "{}/{}_{}_{}.{}",
        user_id,
        document_type.as_str(),
        member_index,
        uploaded_at.timestamp_millis(),
        extension
    )
}

/// Picks a safe file extension from the client file name, falling back to the
/// content type and finally to `bin`.
pub fn file_extension(file_name: Option<&str>, content_type: Option<&str>) -> String {
    let from_name = file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 10)
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()));

    if let Some(ext) = from_name {
        return ext;
    }

    content_type
        .and_then(mime_guess::get_mime_extensions_str)
        .and_then(|exts| exts.first())
        .map(|ext| ext.to_string())
        .unwrap_or_else(|| "bin".to_string())
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Stores `data` at `path` and returns the stored path. An existing
    /// object is never replaced.
    async fn put(&self, path: &str, data: Vec<u8>) -> Result<String, StorageError>;

    /// Returns `true` if the object was deleted, `false` if it did not exist.
    async fn delete(&self, path: &str) -> Result<bool, StorageError>;
}

/// Filesystem-backed bucket: `{root}/{bucket}/{path}`.
pub struct FilesystemStorage {
    bucket_root: PathBuf,
    max_size: u64,
}

impl FilesystemStorage {
    pub async fn new(root: PathBuf, bucket: &str, max_size: u64) -> Result<Self, StorageError> {
        let bucket_root = root.join(bucket);
        fs::create_dir_all(&bucket_root).await?;
        fs::create_dir_all(bucket_root.join(".tmp")).await?;
        Ok(Self {
            bucket_root,
            max_size,
        })
    }

    fn object_path(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path);
        let safe = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(part) if part != ".tmp"));
        if !safe {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        Ok(self.bucket_root.join(relative))
    }

    fn temp_path(&self) -> PathBuf {
        self.bucket_root
            .join(".tmp")
            .join(Uuid::new_v4().to_string())
    }
}

#[async_trait]
impl ObjectStorage for FilesystemStorage {
    async fn put(&self, path: &str, data: Vec<u8>) -> Result<String, StorageError> {
        if data.len() as u64 > self.max_size {
            return Err(StorageError::SizeLimitExceeded {
                actual: data.len() as u64,
                limit: self.max_size,
            });
        }

        let target = self.object_path(path)?;
        let temp_path = self.temp_path();
        if let Err(e) = fs::write(&temp_path, &data).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }

        // a hard link publishes the object atomically and fails if the name is taken
        let published = fs::hard_link(&temp_path, &target).await;
        let _ = fs::remove_file(&temp_path).await;
        match published {
            Ok(()) => Ok(path.to_string()),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(StorageError::AlreadyExists(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, path: &str) -> Result<bool, StorageError> {
        let target = self.object_path(path)?;
        match fs::remove_file(&target).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    async fn temp_storage(max_size: u64) -> (FilesystemStorage, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let storage = FilesystemStorage::new(dir.path().to_path_buf(), "documents", max_size)
            .await
            .unwrap();
        (storage, dir)
    }

    #[test]
    fn document_path_follows_convention() {
        let user = Uuid::parse_str("6f1c2d4e-0000-4000-8000-000000000001").unwrap();
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let path = document_path(user, DocumentType::IdProof, 2, at, "pdf");
        assert_eq!(
            path,
            "6f1c2d4e-0000-4000-8000-000000000001/id_proof_2_1700000000123.pdf"
        );
    }

    #[test]
    fn extension_prefers_file_name_then_content_type() {
        assert_eq!(file_extension(Some("Scan.PDF"), Some("image/png")), "pdf");
        assert_eq!(file_extension(Some("noext"), Some("image/png")), "png");
        assert_eq!(file_extension(Some("weird.p-d-f"), None), "bin");
        assert_eq!(file_extension(None, None), "bin");
    }

    #[tokio::test]
    async fn stored_objects_land_in_the_bucket_and_can_be_deleted() {
        let (storage, dir) = temp_storage(1024).await;
        let path = storage.put("user/doc_0_1.pdf", b"scan".to_vec()).await.unwrap();
        assert_eq!(path, "user/doc_0_1.pdf");
        let on_disk = dir.path().join("documents").join(&path);
        assert_eq!(fs::read(&on_disk).await.unwrap(), b"scan");

        assert!(storage.delete(&path).await.unwrap());
        assert!(!storage.delete(&path).await.unwrap());
        assert!(!fs::try_exists(&on_disk).await.unwrap());
    }

    #[tokio::test]
    async fn existing_objects_are_never_overwritten() {
        let (storage, dir) = temp_storage(1024).await;
        storage.put("user/doc_0_1.pdf", b"first".to_vec()).await.unwrap();

        let second = storage.put("user/doc_0_1.pdf", b"second".to_vec()).await;
        assert!(matches!(second, Err(StorageError::AlreadyExists(_))));

        let bucket = dir.path().join("documents");
        assert_eq!(fs::read(bucket.join("user/doc_0_1.pdf")).await.unwrap(), b"first");
        let mut leftovers = fs::read_dir(bucket.join(".tmp")).await.unwrap();
        assert!(leftovers.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rejects_paths_escaping_the_bucket() {
        let (storage, _dir) = temp_storage(1024).await;
        for bad in ["../outside.pdf", "/abs.pdf", "", ".tmp/x", "a/../../b"] {
            assert!(
                matches!(
                    storage.put(bad, b"x".to_vec()).await,
                    Err(StorageError::InvalidPath(_))
                ),
                "accepted {bad}"
            );
        }
    }

    #[tokio::test]
    async fn rejects_oversized_objects() {
        let (storage, _dir) = temp_storage(4).await;
        let result = storage.put("u/big_0_1.bin", vec![0u8; 5]).await;
        assert!(matches!(
            result,
            Err(StorageError::SizeLimitExceeded {
                actual: 5,
                limit: 4
            })
        ));
    }
}
