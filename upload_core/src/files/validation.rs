use std::collections::BTreeSet;
use thiserror::Error;

use super::models::UploadRequest;

pub const MIB: u64 = 1024 * 1024;
pub const DEFAULT_MAX_SIZE_BYTES: u64 = 10 * MIB;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("File too large: {size} bytes (max: {max_size} bytes)")]
    SizeExceeded { size: u64, max_size: u64 },

    #[error("Unsupported file type: {mime_type} (allowed: {allowed:?})")]
    UnsupportedType { mime_type: String, allowed: Vec<String> },
}

/// Limits applied to a file before it may reach a storage gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadConstraints {
    pub max_size_bytes: u64,
    pub allowed_mime_patterns: BTreeSet<String>,
    pub destination_folder: Option<String>,
}

impl Default for UploadConstraints {
    fn default() -> Self {
        Self {
            max_size_bytes: DEFAULT_MAX_SIZE_BYTES,
            allowed_mime_patterns: BTreeSet::from(["image/*".to_string()]),
            destination_folder: None,
        }
    }
}

impl UploadConstraints {
    pub fn new<I, S>(max_size_bytes: u64, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            max_size_bytes,
            allowed_mime_patterns: patterns.into_iter().map(Into::into).collect(),
            destination_folder: None,
        }
    }

    pub fn with_max_size(mut self, max_size_bytes: u64) -> Self {
        self.max_size_bytes = max_size_bytes;
        self
    }

    pub fn with_folder(mut self, folder: impl Into<String>) -> Self {
        self.destination_folder = Some(folder.into());
        self
    }

    pub fn without_folder(mut self) -> Self {
        self.destination_folder = None;
        self
    }

    pub fn allows(&self, mime_type: &str) -> bool {
        self.allowed_mime_patterns
            .iter()
            .any(|pattern| mime_matches(pattern, mime_type))
    }
}

/// Checks size first, then type. An empty allow-list rejects everything.
pub fn validate(file: &UploadRequest, constraints: &UploadConstraints) -> Result<(), ValidationError> {
    if file.size_bytes > constraints.max_size_bytes {
        return Err(ValidationError::SizeExceeded {
            size: file.size_bytes,
            max_size: constraints.max_size_bytes,
        });
    }

    if !constraints.allows(&file.mime_type) {
        return Err(ValidationError::UnsupportedType {
            mime_type: file.mime_type.clone(),
            allowed: constraints.allowed_mime_patterns.iter().cloned().collect(),
        });
    }

    Ok(())
}

/// `type/*` matches any MIME type sharing the part before `/`; anything else is exact.
pub fn mime_matches(pattern: &str, mime_type: &str) -> bool {
    match pattern.strip_suffix("/*") {
        Some(prefix) => mime_type
            .split_once('/')
            .map(|(top_level, _)| top_level == prefix)
            .unwrap_or(false),
        None => pattern == mime_type,
    }
}

/// Splits an `accept` attribute such as `"image/*, application/pdf"` into patterns.
pub fn parse_accept(accept: &str) -> BTreeSet<String> {
    accept
        .split(',')
        .map(str::trim)
        .filter(|pattern| !pattern.is_empty())
        .map(str::to_string)
        .collect()
}
