use async_trait::async_trait;
use futures_util::future::try_join_all;
use thiserror::Error;

use super::models::{BlobEntry, ListOptions, ListPage, StoredObject};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage path: {0}")]
    InvalidPath(String),

    #[error("Invalid list cursor: {0}")]
    InvalidCursor(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Remote object storage the uploader writes to. Backends own transport,
/// retries and timeouts; callers only see request/response semantics.
#[async_trait]
pub trait StorageGateway: Send + Sync {
    async fn store(&self, path: &str, data: Vec<u8>, content_type: &str) -> Result<StoredObject, StorageError>;
    async fn delete(&self, url: &str) -> Result<(), StorageError>;
    async fn list(&self, options: &ListOptions) -> Result<ListPage, StorageError>;
    async fn head(&self, url: &str) -> Result<Option<BlobEntry>, StorageError>;

    /// Deletes every url concurrently; the first failure fails the whole call.
    async fn delete_many(&self, urls: &[String]) -> Result<(), StorageError> {
        try_join_all(urls.iter().map(|url| self.delete(url))).await?;
        Ok(())
    }
}

/// Splits a storage path into its components, refusing anything that could escape the root.
pub fn checked_components(path: &str) -> Result<Vec<&str>, StorageError> {
    if path.is_empty() || path.starts_with('/') || path.contains('\\') || path.contains('\0') {
        return Err(StorageError::InvalidPath(path.to_string()));
    }

    let components: Vec<&str> = path.split('/').collect();
    if components
        .iter()
        .any(|part| part.is_empty() || *part == "." || *part == "..")
    {
        return Err(StorageError::InvalidPath(path.to_string()));
    }

    Ok(components)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_components() {
        assert_eq!(checked_components("a.txt").unwrap(), vec!["a.txt"]);
        assert_eq!(checked_components("images/1-a.png").unwrap(), vec!["images", "1-a.png"]);

        for bad in ["", "/etc/passwd", "../x", "images/../x", "a//b", "a/", "a\\b", "./a"] {
            assert!(
                matches!(checked_components(bad), Err(StorageError::InvalidPath(_))),
                "{bad:?} should be rejected"
            );
        }
    }
}
