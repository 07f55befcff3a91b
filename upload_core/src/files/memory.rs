use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use super::gateway::{checked_components, StorageError, StorageGateway};
use super::models::{BlobEntry, ListOptions, ListPage, StoredObject};

pub const DEFAULT_LIST_LIMIT: usize = 1000;

#[derive(Debug, Clone)]
struct StoredBlob {
    data: Vec<u8>,
    content_type: String,
    uploaded_at: DateTime<Utc>,
}

/// Process-local gateway; contents vanish with the process.
#[derive(Clone)]
pub struct MemoryStorageGateway {
    base_url: String,
    blobs: Arc<RwLock<BTreeMap<String, StoredBlob>>>,
}

impl Default for MemoryStorageGateway {
    fn default() -> Self {
        Self::new("memory://blobs")
    }
}

impl MemoryStorageGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            blobs: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }

    pub fn contents(&self, path: &str) -> Option<Vec<u8>> {
        self.blobs.read().get(path).map(|blob| blob.data.clone())
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn path_for<'a>(&self, url: &'a str) -> Result<&'a str, StorageError> {
        url.strip_prefix(&self.base_url)
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| StorageError::NotFound(url.to_string()))
    }

    fn entry(&self, path: &str, blob: &StoredBlob) -> BlobEntry {
        BlobEntry {
            url: self.url_for(path),
            path: path.to_string(),
            size_bytes: blob.data.len() as u64,
            uploaded_at: blob.uploaded_at,
            content_type: Some(blob.content_type.clone()),
        }
    }
}

#[async_trait]
impl StorageGateway for MemoryStorageGateway {
    async fn store(&self, path: &str, data: Vec<u8>, content_type: &str) -> Result<StoredObject, StorageError> {
        checked_components(path)?;

        self.blobs.write().insert(
            path.to_string(),
            StoredBlob {
                data,
                content_type: content_type.to_string(),
                uploaded_at: Utc::now(),
            },
        );

        tracing::debug!("Stored {} in memory", path);
        Ok(StoredObject {
            url: self.url_for(path),
            path: path.to_string(),
        })
    }

    async fn delete(&self, url: &str) -> Result<(), StorageError> {
        let path = self.path_for(url)?;
        match self.blobs.write().remove(path) {
            Some(_) => Ok(()),
            None => Err(StorageError::NotFound(url.to_string())),
        }
    }

    async fn list(&self, options: &ListOptions) -> Result<ListPage, StorageError> {
        let limit = options.limit.unwrap_or(DEFAULT_LIST_LIMIT).max(1);
        let prefix = options.prefix.as_deref().unwrap_or("");
        let lower = match options.cursor.as_deref() {
            Some(cursor) => Bound::Excluded(cursor.to_string()),
            None => Bound::Unbounded,
        };

        let blobs = self.blobs.read();
        let mut matching = blobs
            .range((lower, Bound::Unbounded))
            .filter(|(path, _)| path.starts_with(prefix));

        let entries: Vec<BlobEntry> = matching
            .by_ref()
            .take(limit)
            .map(|(path, blob)| self.entry(path, blob))
            .collect();

        let next_cursor = match matching.next() {
            Some(_) => entries.last().map(|entry| entry.path.clone()),
            None => None,
        };

        Ok(ListPage { entries, next_cursor })
    }

    async fn head(&self, url: &str) -> Result<Option<BlobEntry>, StorageError> {
        let path = match self.path_for(url) {
            Ok(path) => path,
            Err(_) => return Ok(None),
        };

        Ok(self.blobs.read().get(path).map(|blob| self.entry(path, blob)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_head_delete() {
        let gateway = MemoryStorageGateway::default();

        let stored = gateway.store("docs/a.txt", b"abc".to_vec(), "text/plain").await.unwrap();
        assert_eq!(stored.url, "memory://blobs/docs/a.txt");
        assert_eq!(stored.path, "docs/a.txt");
        assert_eq!(gateway.contents("docs/a.txt").unwrap(), b"abc");

        let entry = gateway.head(&stored.url).await.unwrap().unwrap();
        assert_eq!(entry.size_bytes, 3);
        assert_eq!(entry.content_type.as_deref(), Some("text/plain"));

        gateway.delete(&stored.url).await.unwrap();
        assert!(gateway.head(&stored.url).await.unwrap().is_none());
        assert!(matches!(
            gateway.delete(&stored.url).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_escaping_paths() {
        let gateway = MemoryStorageGateway::default();
        let result = gateway.store("../secret", vec![1], "text/plain").await;
        assert!(matches!(result, Err(StorageError::InvalidPath(_))));
        assert!(gateway.is_empty());
    }

    #[tokio::test]
    async fn test_list_pages_with_prefix() {
        let gateway = MemoryStorageGateway::default();
        for name in ["images/a.png", "images/b.png", "images/c.png", "documents/d.pdf"] {
            gateway.store(name, vec![0; 4], "application/octet-stream").await.unwrap();
        }

        let options = ListOptions {
            prefix: Some("images/".to_string()),
            limit: Some(2),
            cursor: None,
        };
        let first = gateway.list(&options).await.unwrap();
        let paths: Vec<_> = first.entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["images/a.png", "images/b.png"]);
        assert!(first.next_cursor.is_some());

        let second = gateway
            .list(&ListOptions {
                cursor: first.next_cursor.clone(),
                ..options
            })
            .await
            .unwrap();
        assert_eq!(second.entries.len(), 1);
        assert_eq!(second.entries[0].path, "images/c.png");
        assert!(second.next_cursor.is_none());

        let all = gateway.list(&ListOptions::default()).await.unwrap();
        assert_eq!(all.entries.len(), 4);
    }

    #[tokio::test]
    async fn test_delete_many_fails_on_missing() {
        let gateway = MemoryStorageGateway::default();
        let a = gateway.store("a", vec![1], "text/plain").await.unwrap();
        let b = gateway.store("b", vec![1], "text/plain").await.unwrap();

        gateway.delete_many(&[a.url.clone(), b.url.clone()]).await.unwrap();
        assert!(gateway.is_empty());

        let result = gateway.delete_many(&[a.url]).await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }
}
