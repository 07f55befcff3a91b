use chrono::Utc;
use futures_util::future::join_all;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::gateway::{StorageError, StorageGateway};
use super::models::{UploadRequest, UploadResult};
use super::presets::{document_constraints, image_constraints, ImageCategory};
use super::progress::{ProgressListener, ProgressSettings, UploadProgress};
use super::validation::{validate, UploadConstraints, ValidationError};

#[derive(Error, Debug)]
pub enum UploadError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Failed to store {path}: {source}")]
    Gateway {
        path: String,
        #[source]
        source: StorageError,
    },

    #[error("Batch upload of {files} files failed: {source}")]
    Batch {
        files: usize,
        #[source]
        source: StorageError,
    },
}

impl UploadError {
    pub fn is_gateway_failure(&self) -> bool {
        matches!(self, UploadError::Gateway { .. } | UploadError::Batch { .. })
    }
}

pub type SuccessCallback = Arc<dyn Fn(&UploadResult) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&UploadError) + Send + Sync>;

/// Builds `[folder/]{millis}-{file name}` paths. The timestamp is strictly
/// increasing within a process so two uploads never share a path.
#[derive(Debug, Default)]
pub struct StoredPathGenerator {
    last: AtomicI64,
}

impl StoredPathGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_timestamp(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let previous = self
            .last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| Some(now.max(last + 1)))
            .unwrap_or_else(|last| last);
        now.max(previous + 1)
    }

    pub fn stored_path(&self, folder: Option<&str>, file_name: &str) -> String {
        let timestamp = self.next_timestamp();
        match folder.map(|f| f.trim_matches('/')).filter(|f| !f.is_empty()) {
            Some(folder) => format!("{}/{}-{}", folder, timestamp, file_name),
            None => format!("{}-{}", timestamp, file_name),
        }
    }
}

/// Validates files, pushes the survivors to a storage gateway and reports
/// outcomes through optional callbacks. Progress is observed per call via the
/// `*_with_progress` variants, so concurrent uploads never share a listener.
#[derive(Clone)]
pub struct Uploader {
    gateway: Arc<dyn StorageGateway>,
    constraints: UploadConstraints,
    image_constraints: UploadConstraints,
    document_constraints: UploadConstraints,
    progress: ProgressSettings,
    paths: Arc<StoredPathGenerator>,
    on_success: Option<SuccessCallback>,
    on_error: Option<ErrorCallback>,
}

impl Uploader {
    pub fn new(gateway: Arc<dyn StorageGateway>) -> Self {
        Self {
            gateway,
            constraints: UploadConstraints::default(),
            image_constraints: image_constraints(),
            document_constraints: document_constraints(),
            progress: ProgressSettings::default(),
            paths: Arc::new(StoredPathGenerator::new()),
            on_success: None,
            on_error: None,
        }
    }

    pub fn with_constraints(mut self, constraints: UploadConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn with_image_constraints(mut self, constraints: UploadConstraints) -> Self {
        self.image_constraints = constraints;
        self
    }

    pub fn with_document_constraints(mut self, constraints: UploadConstraints) -> Self {
        self.document_constraints = constraints;
        self
    }

    pub fn with_progress_settings(mut self, settings: ProgressSettings) -> Self {
        self.progress = settings;
        self
    }

    pub fn on_success(mut self, callback: impl Fn(&UploadResult) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(callback));
        self
    }

    pub fn on_error(mut self, callback: impl Fn(&UploadError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }

    pub fn gateway(&self) -> &Arc<dyn StorageGateway> {
        &self.gateway
    }

    pub fn constraints(&self) -> &UploadConstraints {
        &self.constraints
    }

    pub fn image_constraints(&self) -> &UploadConstraints {
        &self.image_constraints
    }

    pub fn document_constraints(&self) -> &UploadConstraints {
        &self.document_constraints
    }

    pub async fn upload_one(&self, file: UploadRequest) -> Result<UploadResult, UploadError> {
        self.run_upload(file, &self.constraints, None).await
    }

    /// Like `upload_one`, reporting this call's progress to `listener`.
    pub async fn upload_one_with_progress(
        &self,
        file: UploadRequest,
        listener: impl Fn(u8) + Send + Sync + 'static,
    ) -> Result<UploadResult, UploadError> {
        self.run_upload(file, &self.constraints, Some(Arc::new(listener))).await
    }

    pub async fn upload_image(&self, file: UploadRequest) -> Result<UploadResult, UploadError> {
        self.upload_with(file, &self.image_constraints).await
    }

    pub async fn upload_image_in(
        &self,
        category: ImageCategory,
        file: UploadRequest,
    ) -> Result<UploadResult, UploadError> {
        let constraints = self.image_constraints.clone().with_folder(category.folder());
        self.upload_with(file, &constraints).await
    }

    pub async fn upload_document(&self, file: UploadRequest) -> Result<UploadResult, UploadError> {
        self.upload_with(file, &self.document_constraints).await
    }

    /// Images go through the image preset, everything else through the document preset.
    pub async fn upload_auto(&self, file: UploadRequest) -> Result<UploadResult, UploadError> {
        if file.is_image() {
            self.upload_image(file).await
        } else {
            self.upload_document(file).await
        }
    }

    pub async fn upload_with(
        &self,
        file: UploadRequest,
        constraints: &UploadConstraints,
    ) -> Result<UploadResult, UploadError> {
        self.run_upload(file, constraints, None).await
    }

    pub async fn upload_with_progress(
        &self,
        file: UploadRequest,
        constraints: &UploadConstraints,
        listener: impl Fn(u8) + Send + Sync + 'static,
    ) -> Result<UploadResult, UploadError> {
        self.run_upload(file, constraints, Some(Arc::new(listener))).await
    }

    async fn run_upload(
        &self,
        file: UploadRequest,
        constraints: &UploadConstraints,
        listener: Option<ProgressListener>,
    ) -> Result<UploadResult, UploadError> {
        if let Err(e) = validate(&file, constraints) {
            warn!(file = %file.file_name, "Rejected upload: {}", e);
            return Err(e.into());
        }

        let folder = file
            .destination_folder
            .as_deref()
            .or(constraints.destination_folder.as_deref());
        let path = self.paths.stored_path(folder, &file.file_name);

        let progress = self.new_progress(listener);
        let heartbeat = progress.start_heartbeat();

        let UploadRequest {
            file_name,
            mime_type,
            data,
            ..
        } = file;
        let outcome = self.gateway.store(&path, data, &mime_type).await;
        heartbeat.stop().await;

        let result = match outcome {
            Ok(stored) => {
                progress.complete();
                let result = UploadResult {
                    remote_url: stored.url,
                    stored_path: stored.path,
                    original_file_name: file_name,
                };
                info!(path = %result.stored_path, "Uploaded {}", result.original_file_name);

                if let Some(callback) = &self.on_success {
                    callback(&result);
                }
                Ok(result)
            }
            Err(source) => {
                error!(path = %path, "Upload failed: {}", source);
                let err = UploadError::Gateway { path, source };

                if let Some(callback) = &self.on_error {
                    callback(&err);
                }
                progress.reset();
                Err(err)
            }
        };

        progress.schedule_reset();
        result
    }

    /// Uploads every file that passes the default constraints. Rejected files
    /// are dropped, the rest are stored concurrently and the batch fails as a
    /// whole if any store fails. Results keep input order. The success
    /// callback is not invoked for batches.
    pub async fn upload_many(&self, files: Vec<UploadRequest>) -> Result<Vec<UploadResult>, UploadError> {
        self.run_batch(files, None).await
    }

    /// Like `upload_many`, reporting the batch's progress to `listener`.
    pub async fn upload_many_with_progress(
        &self,
        files: Vec<UploadRequest>,
        listener: impl Fn(u8) + Send + Sync + 'static,
    ) -> Result<Vec<UploadResult>, UploadError> {
        self.run_batch(files, Some(Arc::new(listener))).await
    }

    async fn run_batch(
        &self,
        files: Vec<UploadRequest>,
        listener: Option<ProgressListener>,
    ) -> Result<Vec<UploadResult>, UploadError> {
        let submitted = files.len();
        let accepted: Vec<UploadRequest> = files
            .into_iter()
            .filter(|file| match validate(file, &self.constraints) {
                Ok(()) => true,
                Err(e) => {
                    debug!(file = %file.file_name, "Skipping file in batch: {}", e);
                    false
                }
            })
            .collect();

        if accepted.is_empty() {
            debug!("No valid files among {} submitted", submitted);
            return Ok(Vec::new());
        }

        let count = accepted.len();
        let progress = self.new_progress(listener);
        let heartbeat = progress.start_heartbeat();

        let planned: Vec<(String, UploadRequest)> = accepted
            .into_iter()
            .map(|file| {
                let folder = file
                    .destination_folder
                    .as_deref()
                    .or(self.constraints.destination_folder.as_deref());
                (self.paths.stored_path(folder, &file.file_name), file)
            })
            .collect();

        let stores = planned.into_iter().map(|(path, file)| async move {
            let stored = self.gateway.store(&path, file.data, &file.mime_type).await?;
            Ok::<_, StorageError>(UploadResult {
                remote_url: stored.url,
                stored_path: stored.path,
                original_file_name: file.file_name,
            })
        });

        let outcome: Result<Vec<UploadResult>, StorageError> =
            join_all(stores).await.into_iter().collect();
        heartbeat.stop().await;

        let result = match outcome {
            Ok(results) => {
                progress.complete();
                info!("Uploaded {} of {} submitted files", results.len(), submitted);
                Ok(results)
            }
            Err(source) => {
                error!("Batch upload of {} files failed: {}", count, source);
                let err = UploadError::Batch { files: count, source };

                if let Some(callback) = &self.on_error {
                    callback(&err);
                }
                progress.reset();
                Err(err)
            }
        };

        progress.schedule_reset();
        result
    }

    fn new_progress(&self, listener: Option<ProgressListener>) -> UploadProgress {
        UploadProgress::new(self.progress.clone()).with_listener(listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::memory::MemoryStorageGateway;
    use crate::files::validation::MIB;
    use parking_lot::Mutex;

    fn uploader() -> (Uploader, MemoryStorageGateway) {
        let gateway = MemoryStorageGateway::default();
        let uploader = Uploader::new(Arc::new(gateway.clone()))
            .with_constraints(UploadConstraints::new(MIB, ["image/*", "application/pdf"]));
        (uploader, gateway)
    }

    #[test]
    fn test_stored_paths_are_unique() {
        let paths = StoredPathGenerator::new();

        let first = paths.stored_path(Some("images"), "a.png");
        let second = paths.stored_path(Some("images"), "a.png");
        assert_ne!(first, second);
        assert!(first.starts_with("images/"));
        assert!(first.ends_with("-a.png"));

        let bare = paths.stored_path(None, "a.png");
        assert!(!bare.contains('/'));

        let trimmed = paths.stored_path(Some("/blog/"), "a.png");
        assert!(trimmed.starts_with("blog/"));
        assert!(!trimmed.starts_with("blog//"));
    }

    #[test]
    fn test_timestamps_strictly_increase() {
        let paths = StoredPathGenerator::new();
        let mut previous = paths.next_timestamp();
        for _ in 0..1000 {
            let next = paths.next_timestamp();
            assert!(next > previous);
            previous = next;
        }
    }

    #[tokio::test]
    async fn test_upload_one_uses_folder_precedence() {
        let (uploader, gateway) = uploader();
        let uploader = uploader.with_constraints(
            UploadConstraints::new(MIB, ["image/*"]).with_folder("defaults"),
        );

        let result = uploader
            .upload_one(UploadRequest::new("a.png", "image/png", vec![1, 2, 3]))
            .await
            .unwrap();
        assert!(result.stored_path.starts_with("defaults/"));

        let result = uploader
            .upload_one(UploadRequest::new("b.png", "image/png", vec![1]).with_folder("blog"))
            .await
            .unwrap();
        assert!(result.stored_path.starts_with("blog/"));
        assert!(result.stored_path.ends_with("-b.png"));
        assert_eq!(result.original_file_name, "b.png");
        assert_eq!(gateway.contents(&result.stored_path).unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_validation_failure_skips_callbacks() {
        let (uploader, gateway) = uploader();
        let errors = Arc::new(Mutex::new(0));
        let counter = errors.clone();
        let uploader = uploader.on_error(move |_| *counter.lock() += 1);

        let result = uploader
            .upload_one(UploadRequest::new("a.txt", "text/plain", vec![1]))
            .await;

        assert!(matches!(
            result,
            Err(UploadError::Validation(ValidationError::UnsupportedType { .. }))
        ));
        assert!(gateway.is_empty());
        assert_eq!(*errors.lock(), 0);
    }

    #[tokio::test]
    async fn test_presets_pick_folder_and_limits() {
        let (uploader, _gateway) = uploader();

        let image = uploader
            .upload_auto(UploadRequest::new("p.png", "image/png", vec![0; 16]))
            .await
            .unwrap();
        assert!(image.stored_path.starts_with("images/"));

        let document = uploader
            .upload_auto(UploadRequest::new("r.pdf", "application/pdf", vec![0; 16]))
            .await
            .unwrap();
        assert!(document.stored_path.starts_with("documents/"));

        let profile = uploader
            .upload_image_in(ImageCategory::Profile, UploadRequest::new("me.jpg", "image/jpeg", vec![0]))
            .await
            .unwrap();
        assert!(profile.stored_path.starts_with("profiles/"));

        let too_big = UploadRequest::new("huge.png", "image/png", vec![0; (5 * MIB + 1) as usize]);
        assert!(matches!(
            uploader.upload_image(too_big).await,
            Err(UploadError::Validation(ValidationError::SizeExceeded { .. }))
        ));

        let html = UploadRequest::new("page.html", "text/html", vec![0]);
        assert!(matches!(
            uploader.upload_document(html).await,
            Err(UploadError::Validation(ValidationError::UnsupportedType { .. }))
        ));
    }

    #[tokio::test]
    async fn test_upload_many_keeps_input_order() {
        let (uploader, gateway) = uploader();
        let successes = Arc::new(Mutex::new(0));
        let counter = successes.clone();
        let uploader = uploader.on_success(move |_| *counter.lock() += 1);

        let files = vec![
            UploadRequest::new("1.png", "image/png", vec![1]),
            UploadRequest::new("skip.exe", "application/x-msdownload", vec![1]),
            UploadRequest::new("2.pdf", "application/pdf", vec![2]),
            UploadRequest::new("3.gif", "image/gif", vec![3]),
        ];

        let results = uploader.upload_many(files).await.unwrap();
        let names: Vec<_> = results.iter().map(|r| r.original_file_name.as_str()).collect();
        assert_eq!(names, vec!["1.png", "2.pdf", "3.gif"]);
        assert_eq!(gateway.len(), 3);
        assert_eq!(*successes.lock(), 0);
    }

    #[tokio::test]
    async fn test_upload_many_with_nothing_valid() {
        let (uploader, gateway) = uploader();
        let results = uploader
            .upload_many(vec![UploadRequest::new("a.txt", "text/plain", vec![1])])
            .await
            .unwrap();

        assert!(results.is_empty());
        assert!(gateway.is_empty());
    }
}
