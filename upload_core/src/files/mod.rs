pub mod gateway;
pub mod library;
pub mod local;
pub mod memory;
pub mod models;
pub mod presets;
pub mod progress;
pub mod uploader;
pub mod validation;

pub use gateway::{StorageError, StorageGateway};
pub use library::{FileCategory, FileKind, FileLibrary, LibraryStats};
pub use local::LocalStorageGateway;
pub use memory::MemoryStorageGateway;
pub use models::{format_file_size, BlobEntry, ListOptions, ListPage, StoredObject, UploadRequest, UploadResult};
pub use presets::ImageCategory;
pub use progress::{ProgressSettings, UploadProgress};
pub use uploader::{StoredPathGenerator, UploadError, Uploader};
pub use validation::{mime_matches, parse_accept, validate, UploadConstraints, ValidationError};
