use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A candidate file handed to the uploader. Built per call and never persisted.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file_name: String,
    pub size_bytes: u64,
    pub mime_type: String,
    pub destination_folder: Option<String>,
    pub data: Vec<u8>,
}

impl UploadRequest {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            size_bytes: data.len() as u64,
            mime_type: mime_type.into(),
            destination_folder: None,
            data,
        }
    }

    pub fn with_folder(mut self, folder: impl Into<String>) -> Self {
        self.destination_folder = Some(folder.into());
        self
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    pub remote_url: String,
    pub stored_path: String,
    pub original_file_name: String,
}

/// What a gateway hands back after a successful store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub url: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobEntry {
    pub url: String,
    pub path: String,
    pub size_bytes: u64,
    pub uploaded_at: DateTime<Utc>,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListOptions {
    pub prefix: Option<String>,
    pub limit: Option<usize>,
    pub cursor: Option<String>,
}

impl ListOptions {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListPage {
    pub entries: Vec<BlobEntry>,
    pub next_cursor: Option<String>,
}

/// Renders a byte count the way the file manager shows it: `0 Bytes`, `1.5 KB`, `2 MB`.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut index = 0;
    let mut value = bytes as f64;
    while value >= 1024.0 && index < UNITS.len() - 1 {
        value /= 1024.0;
        index += 1;
    }

    let rounded = format!("{:.2}", value);
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[index])
}
