use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::gateway::StorageError;
use super::models::{BlobEntry, ListOptions, UploadRequest, UploadResult};
use super::uploader::{UploadError, Uploader};

pub const LIBRARY_PAGE_SIZE: usize = 100;

/// Filter offered by the file manager.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    #[default]
    All,
    Images,
    Documents,
    Videos,
}

impl FileCategory {
    pub fn matches(&self, content_type: Option<&str>) -> bool {
        let Some(content_type) = content_type else {
            return *self == FileCategory::All;
        };

        match self {
            FileCategory::All => true,
            FileCategory::Images => content_type.starts_with("image/"),
            FileCategory::Videos => content_type.starts_with("video/"),
            FileCategory::Documents => is_document(content_type),
        }
    }
}

fn is_document(content_type: &str) -> bool {
    content_type.contains("pdf") || content_type.contains("document") || content_type.contains("text")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Image,
    Video,
    Document,
    Archive,
    Other,
}

impl FileKind {
    pub fn of(content_type: Option<&str>) -> Self {
        match content_type {
            Some(ct) if ct.starts_with("image/") => FileKind::Image,
            Some(ct) if ct.starts_with("video/") => FileKind::Video,
            Some(ct) if is_document(ct) => FileKind::Document,
            Some(ct) if ct.contains("zip") || ct.contains("rar") => FileKind::Archive,
            _ => FileKind::Other,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibraryStats {
    pub file_count: usize,
    pub total_bytes: u64,
    pub by_kind: BTreeMap<FileKind, usize>,
}

/// Cached listing of what the gateway holds, kept in step with uploads and deletes.
#[derive(Clone)]
pub struct FileLibrary {
    uploader: Arc<Uploader>,
    files: Arc<RwLock<Vec<BlobEntry>>>,
}

impl FileLibrary {
    pub fn new(uploader: Arc<Uploader>) -> Self {
        Self {
            uploader,
            files: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn uploader(&self) -> &Arc<Uploader> {
        &self.uploader
    }

    pub fn files(&self) -> Vec<BlobEntry> {
        self.files.read().clone()
    }

    pub async fn refresh(&self, prefix: Option<&str>) -> Result<usize, StorageError> {
        let options = ListOptions {
            prefix: prefix.map(str::to_string),
            limit: Some(LIBRARY_PAGE_SIZE),
            cursor: None,
        };
        let page = self.uploader.gateway().list(&options).await?;
        let count = page.entries.len();

        *self.files.write() = page.entries;
        tracing::debug!("File library refreshed with {} entries", count);
        Ok(count)
    }

    pub async fn upload(&self, file: UploadRequest) -> Result<UploadResult, UploadError> {
        let size_bytes = file.size_bytes;
        let content_type = file.mime_type.clone();
        let result = self.uploader.upload_auto(file).await?;

        self.record(&result, size_bytes, &content_type);
        Ok(result)
    }

    /// Puts a freshly stored file at the head of the cached listing.
    pub fn record(&self, result: &UploadResult, size_bytes: u64, content_type: &str) {
        self.files.write().insert(
            0,
            BlobEntry {
                url: result.remote_url.clone(),
                path: result.stored_path.clone(),
                size_bytes,
                uploaded_at: Utc::now(),
                content_type: Some(content_type.to_string()),
            },
        );
    }

    pub async fn delete(&self, url: &str) -> Result<(), StorageError> {
        self.uploader.gateway().delete(url).await?;
        self.files.write().retain(|entry| entry.url != url);
        Ok(())
    }

    /// On a partial failure, entries the gateway no longer holds are still dropped.
    pub async fn delete_selected(&self, urls: &[String]) -> Result<(), StorageError> {
        let gateway = self.uploader.gateway();

        if let Err(e) = gateway.delete_many(urls).await {
            let mut gone = Vec::new();
            for url in urls {
                if let Ok(None) = gateway.head(url).await {
                    gone.push(url.as_str());
                }
            }
            tracing::warn!("Deleted {} of {} selected files: {}", gone.len(), urls.len(), e);
            self.files.write().retain(|entry| !gone.contains(&entry.url.as_str()));
            return Err(e);
        }

        self.files.write().retain(|entry| !urls.contains(&entry.url));
        Ok(())
    }

    /// Case-insensitive match on the stored path, narrowed by category.
    pub fn search(&self, term: &str, category: FileCategory) -> Vec<BlobEntry> {
        let needle = term.to_lowercase();
        self.files
            .read()
            .iter()
            .filter(|entry| entry.path.to_lowercase().contains(&needle))
            .filter(|entry| category.matches(entry.content_type.as_deref()))
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> LibraryStats {
        let files = self.files.read();
        let mut stats = LibraryStats::default();

        for entry in files.iter() {
            stats.file_count += 1;
            stats.total_bytes += entry.size_bytes;
            *stats
                .by_kind
                .entry(FileKind::of(entry.content_type.as_deref()))
                .or_insert(0) += 1;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::gateway::StorageGateway;
    use crate::files::memory::MemoryStorageGateway;

    async fn create_test_library() -> (FileLibrary, MemoryStorageGateway) {
        let gateway = MemoryStorageGateway::default();
        gateway.store("images/1-cat.png", vec![0; 10], "image/png").await.unwrap();
        gateway.store("documents/2-Report.pdf", vec![0; 20], "application/pdf").await.unwrap();
        gateway.store("videos/3-intro.mp4", vec![0; 30], "video/mp4").await.unwrap();
        gateway.store("misc/4-backup.zip", vec![0; 40], "application/zip").await.unwrap();

        let library = FileLibrary::new(Arc::new(Uploader::new(Arc::new(gateway.clone()))));
        library.refresh(None).await.unwrap();
        (library, gateway)
    }

    #[test]
    fn test_category_matching() {
        assert!(FileCategory::Images.matches(Some("image/png")));
        assert!(FileCategory::Documents.matches(Some("text/plain")));
        assert!(FileCategory::Documents.matches(Some(
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        )));
        assert!(!FileCategory::Videos.matches(Some("image/png")));
        assert!(FileCategory::All.matches(None));
        assert!(!FileCategory::Images.matches(None));
    }

    #[tokio::test]
    async fn test_refresh_and_search() {
        let (library, _gateway) = create_test_library().await;
        assert_eq!(library.files().len(), 4);

        let reports = library.search("report", FileCategory::All);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].path, "documents/2-Report.pdf");

        assert_eq!(library.search("", FileCategory::Images).len(), 1);
        assert_eq!(library.search("", FileCategory::Videos).len(), 1);
        assert!(library.search("cat", FileCategory::Documents).is_empty());

        library.refresh(Some("images/")).await.unwrap();
        assert_eq!(library.files().len(), 1);
    }

    #[tokio::test]
    async fn test_upload_prepends_and_delete_removes() {
        let (library, gateway) = create_test_library().await;

        let result = library
            .upload(UploadRequest::new("new.png", "image/png", vec![1, 2]))
            .await
            .unwrap();
        let files = library.files();
        assert_eq!(files.len(), 5);
        assert_eq!(files[0].url, result.remote_url);
        assert_eq!(files[0].size_bytes, 2);

        library.delete(&result.remote_url).await.unwrap();
        assert_eq!(library.files().len(), 4);
        assert_eq!(gateway.len(), 4);

        let urls: Vec<String> = library.files().iter().take(2).map(|e| e.url.clone()).collect();
        library.delete_selected(&urls).await.unwrap();
        assert_eq!(library.files().len(), 2);
        assert_eq!(gateway.len(), 2);
    }

    #[tokio::test]
    async fn test_partial_delete_drops_removed_entries() {
        let (library, gateway) = create_test_library().await;
        let kept = library.files();
        let report = kept.iter().find(|e| e.path.ends_with("Report.pdf")).unwrap().url.clone();

        let urls = vec![report.clone(), "memory://blobs/never-stored.png".to_string()];
        let result = library.delete_selected(&urls).await;

        assert!(matches!(result, Err(StorageError::NotFound(_))));
        assert_eq!(gateway.len(), 3);
        assert_eq!(library.files().len(), 3);
        assert!(library.files().iter().all(|entry| entry.url != report));
    }

    #[tokio::test]
    async fn test_stats_by_kind() {
        let (library, _gateway) = create_test_library().await;
        let stats = library.stats();

        assert_eq!(stats.file_count, 4);
        assert_eq!(stats.total_bytes, 100);
        assert_eq!(stats.by_kind.get(&FileKind::Image), Some(&1));
        assert_eq!(stats.by_kind.get(&FileKind::Document), Some(&1));
        assert_eq!(stats.by_kind.get(&FileKind::Video), Some(&1));
        assert_eq!(stats.by_kind.get(&FileKind::Archive), Some(&1));
    }
}
