use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs as async_fs;
use tokio::io::AsyncWriteExt;

use super::gateway::{checked_components, StorageError, StorageGateway};
use super::memory::DEFAULT_LIST_LIMIT;
use super::models::{BlobEntry, ListOptions, ListPage, StoredObject};

/// Gateway backed by a directory on local disk, served under `public_base_url`.
#[derive(Debug, Clone)]
pub struct LocalStorageGateway {
    root: PathBuf,
    public_base_url: String,
}

impl LocalStorageGateway {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn initialize(&self) -> Result<(), StorageError> {
        if !self.root.exists() {
            async_fs::create_dir_all(&self.root).await?;
        }
        Ok(())
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let mut resolved = self.root.clone();
        for component in checked_components(path)? {
            resolved.push(component);
        }
        Ok(resolved)
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.public_base_url, path)
    }

    fn path_for<'a>(&self, url: &'a str) -> Option<&'a str> {
        url.strip_prefix(&self.public_base_url)
            .and_then(|rest| rest.strip_prefix('/'))
    }

    fn entry(&self, path: &str, metadata: &std::fs::Metadata) -> BlobEntry {
        let uploaded_at = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        BlobEntry {
            url: self.url_for(path),
            path: path.to_string(),
            size_bytes: metadata.len(),
            uploaded_at,
            content_type: mime_guess::from_path(path)
                .first()
                .map(|mime| mime.essence_str().to_string()),
        }
    }

    async fn walk(&self) -> Result<Vec<(String, std::fs::Metadata)>, StorageError> {
        let mut files = Vec::new();
        if !self.root.exists() {
            return Ok(files);
        }

        let mut pending = vec![(self.root.clone(), String::new())];
        while let Some((dir, prefix)) = pending.pop() {
            let mut entries = async_fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name().to_string_lossy().to_string();
                let relative = if prefix.is_empty() {
                    name
                } else {
                    format!("{}/{}", prefix, name)
                };

                let metadata = entry.metadata().await?;
                if metadata.is_dir() {
                    pending.push((entry.path(), relative));
                } else {
                    files.push((relative, metadata));
                }
            }
        }

        files.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(files)
    }
}

#[async_trait]
impl StorageGateway for LocalStorageGateway {
    async fn store(&self, path: &str, data: Vec<u8>, content_type: &str) -> Result<StoredObject, StorageError> {
        let file_path = self.resolve(path)?;

        if let Some(parent) = file_path.parent() {
            async_fs::create_dir_all(parent).await?;
        }

        let mut file = async_fs::File::create(&file_path).await?;
        file.write_all(&data).await?;
        file.sync_all().await?;

        tracing::debug!("Stored {} ({}) at {}", path, content_type, file_path.display());
        Ok(StoredObject {
            url: self.url_for(path),
            path: path.to_string(),
        })
    }

    async fn delete(&self, url: &str) -> Result<(), StorageError> {
        let path = self
            .path_for(url)
            .ok_or_else(|| StorageError::NotFound(url.to_string()))?;
        let file_path = self.resolve(path)?;

        if !file_path.is_file() {
            return Err(StorageError::NotFound(url.to_string()));
        }

        async_fs::remove_file(&file_path).await?;
        tracing::debug!("Deleted {}", file_path.display());
        Ok(())
    }

    async fn list(&self, options: &ListOptions) -> Result<ListPage, StorageError> {
        let limit = options.limit.unwrap_or(DEFAULT_LIST_LIMIT).max(1);
        let offset = match options.cursor.as_deref() {
            Some(cursor) => cursor
                .parse::<usize>()
                .map_err(|_| StorageError::InvalidCursor(cursor.to_string()))?,
            None => 0,
        };
        let prefix = options.prefix.as_deref().unwrap_or("");

        let matching: Vec<_> = self
            .walk()
            .await?
            .into_iter()
            .filter(|(path, _)| path.starts_with(prefix))
            .collect();

        let entries: Vec<BlobEntry> = matching
            .iter()
            .skip(offset)
            .take(limit)
            .map(|(path, metadata)| self.entry(path, metadata))
            .collect();

        let consumed = offset + entries.len();
        let next_cursor = (consumed < matching.len()).then(|| consumed.to_string());

        Ok(ListPage { entries, next_cursor })
    }

    async fn head(&self, url: &str) -> Result<Option<BlobEntry>, StorageError> {
        let Some(path) = self.path_for(url) else {
            return Ok(None);
        };
        let file_path = self.resolve(path)?;

        match async_fs::metadata(&file_path).await {
            Ok(metadata) if metadata.is_file() => Ok(Some(self.entry(path, &metadata))),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
