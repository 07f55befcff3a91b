//! Policy presets layered on top of the generic validator.

use serde::{Deserialize, Serialize};

use super::validation::{UploadConstraints, MIB};

pub const IMAGE_FOLDER: &str = "images";
pub const DOCUMENT_FOLDER: &str = "documents";

pub const IMAGE_MAX_SIZE_BYTES: u64 = 5 * MIB;
pub const DOCUMENT_MAX_SIZE_BYTES: u64 = 50 * MIB;

pub const DOCUMENT_MIME_TYPES: [&str; 6] = [
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/plain",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
];

pub fn image_constraints() -> UploadConstraints {
    UploadConstraints::new(IMAGE_MAX_SIZE_BYTES, ["image/*"]).with_folder(IMAGE_FOLDER)
}

pub fn document_constraints() -> UploadConstraints {
    UploadConstraints::new(DOCUMENT_MAX_SIZE_BYTES, DOCUMENT_MIME_TYPES).with_folder(DOCUMENT_FOLDER)
}

/// Fixed image destinations used across the storefront and admin panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageCategory {
    Profile,
    Platform,
    Receipt,
    Blog,
}

impl ImageCategory {
    pub fn folder(&self) -> &'static str {
        match self {
            ImageCategory::Profile => "profiles",
            ImageCategory::Platform => "platforms",
            ImageCategory::Receipt => "receipts",
            ImageCategory::Blog => "blog",
        }
    }
}
