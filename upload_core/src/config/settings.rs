use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::files::presets::{
    DOCUMENT_FOLDER, DOCUMENT_MAX_SIZE_BYTES, DOCUMENT_MIME_TYPES, IMAGE_FOLDER, IMAGE_MAX_SIZE_BYTES,
};
use crate::files::progress::{ProgressSettings, COMPLETE};
use crate::files::validation::{UploadConstraints, DEFAULT_MAX_SIZE_BYTES, MIB};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub uploads: UploadsConfig,
    pub progress: ProgressConfig,
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Local,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub root: PathBuf,
    pub public_base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresetConfig {
    pub max_size_bytes: u64,
    pub allowed_mime_types: Vec<String>,
    pub folder: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadsConfig {
    pub max_size_bytes: u64,
    pub allowed_mime_types: Vec<String>,
    pub destination_folder: Option<String>,
    pub images: PresetConfig,
    pub documents: PresetConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressConfig {
    pub tick_interval_ms: u64,
    pub step: u8,
    pub ceiling: u8,
    pub reset_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            uploads: UploadsConfig::default(),
            progress: ProgressConfig::default(),
            cors: CorsConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            max_body_bytes: 64 * MIB as usize,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            root: PathBuf::from("./uploads"),
            public_base_url: "http://127.0.0.1:3000/blobs".to_string(),
        }
    }
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: DEFAULT_MAX_SIZE_BYTES,
            allowed_mime_types: vec!["image/*".to_string()],
            destination_folder: None,
            images: PresetConfig {
                max_size_bytes: IMAGE_MAX_SIZE_BYTES,
                allowed_mime_types: vec!["image/*".to_string()],
                folder: IMAGE_FOLDER.to_string(),
            },
            documents: PresetConfig {
                max_size_bytes: DOCUMENT_MAX_SIZE_BYTES,
                allowed_mime_types: DOCUMENT_MIME_TYPES.iter().map(|t| t.to_string()).collect(),
                folder: DOCUMENT_FOLDER.to_string(),
            },
        }
    }
}

impl Default for ProgressConfig {
    fn default() -> Self {
        let settings = ProgressSettings::default();
        Self {
            tick_interval_ms: settings.tick_interval.as_millis() as u64,
            step: settings.step,
            ceiling: settings.ceiling,
            reset_delay_ms: settings.reset_delay.as_millis() as u64,
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:3000".to_string(),
                "http://127.0.0.1:5173".to_string(),
            ],
        }
    }
}

impl UploadsConfig {
    pub fn constraints(&self) -> UploadConstraints {
        let constraints = UploadConstraints::new(self.max_size_bytes, self.allowed_mime_types.iter().cloned());
        match &self.destination_folder {
            Some(folder) => constraints.with_folder(folder.clone()),
            None => constraints,
        }
    }
}

impl PresetConfig {
    pub fn constraints(&self) -> UploadConstraints {
        UploadConstraints::new(self.max_size_bytes, self.allowed_mime_types.iter().cloned())
            .with_folder(self.folder.clone())
    }
}

impl ProgressConfig {
    pub fn settings(&self) -> ProgressSettings {
        ProgressSettings {
            tick_interval: Duration::from_millis(self.tick_interval_ms),
            step: self.step,
            ceiling: self.ceiling,
            reset_delay: Duration::from_millis(self.reset_delay_ms),
        }
    }
}

impl AppConfig {
    /// Defaults, then `config.toml` if present, then `APP__SECTION__KEY` variables.
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?);

        if std::path::Path::new("config.toml").exists() {
            builder = builder.add_source(File::with_name("config"));
        }

        builder = builder.add_source(
            Environment::with_prefix("APP")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("uploads.allowed_mime_types")
                .with_list_parse_key("cors.allowed_origins")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let app_config: AppConfig = config.try_deserialize()?;

        app_config.validate()?;

        Ok(app_config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Message("Server port cannot be 0".to_string()));
        }

        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::Message(
                "Max request body size must be greater than 0".to_string(),
            ));
        }

        if self.storage.backend == StorageBackend::Local && self.storage.root.as_os_str().is_empty() {
            return Err(ConfigError::Message(
                "Storage root cannot be empty for the local backend".to_string(),
            ));
        }

        if self.storage.public_base_url.is_empty() {
            return Err(ConfigError::Message(
                "Storage public base URL cannot be empty".to_string(),
            ));
        }

        let limits = [
            ("uploads", self.uploads.max_size_bytes),
            ("uploads.images", self.uploads.images.max_size_bytes),
            ("uploads.documents", self.uploads.documents.max_size_bytes),
        ];
        for (section, limit) in limits {
            if limit == 0 {
                return Err(ConfigError::Message(format!(
                    "{} max size must be greater than 0",
                    section
                )));
            }
        }

        if self.uploads.allowed_mime_types.is_empty() {
            tracing::warn!("Upload allow-list is empty - every generic upload will be rejected");
        }

        if self.progress.step == 0 {
            return Err(ConfigError::Message(
                "Progress step must be greater than 0".to_string(),
            ));
        }

        if self.progress.ceiling >= COMPLETE {
            return Err(ConfigError::Message(
                "Progress ceiling must stay below 100".to_string(),
            ));
        }

        if self.progress.tick_interval_ms == 0 {
            return Err(ConfigError::Message(
                "Progress tick interval must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn create_directories(&self) -> Result<(), std::io::Error> {
        if self.storage.backend == StorageBackend::Local {
            std::fs::create_dir_all(&self.storage.root)?;
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.storage.backend, StorageBackend::Local);
        assert_eq!(config.uploads.max_size_bytes, 10 * MIB);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();

        config.server.port = 0;
        assert!(config.validate().is_err());

        config = AppConfig::default();
        config.progress.ceiling = 100;
        assert!(config.validate().is_err());

        config = AppConfig::default();
        config.progress.step = 0;
        assert!(config.validate().is_err());

        config = AppConfig::default();
        config.uploads.documents.max_size_bytes = 0;
        assert!(config.validate().is_err());

        config = AppConfig::default();
        config.storage.root = PathBuf::new();
        assert!(config.validate().is_err());
        config.storage.backend = StorageBackend::Memory;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bind_address() {
        let config = AppConfig::default();
        assert_eq!(config.bind_address(), "127.0.0.1:3000");

        let mut config = AppConfig::default();
        config.server.host = "0.0.0.0".to_string();
        config.server.port = 8080;
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_section_conversions() {
        let config = AppConfig::default();

        let generic = config.uploads.constraints();
        assert_eq!(generic.max_size_bytes, 10 * MIB);
        assert!(generic.allows("image/png"));
        assert!(generic.destination_folder.is_none());

        let images = config.uploads.images.constraints();
        assert_eq!(images.destination_folder.as_deref(), Some("images"));
        assert_eq!(images.max_size_bytes, 5 * MIB);

        let documents = config.uploads.documents.constraints();
        assert!(documents.allows("application/vnd.ms-excel"));

        let progress = config.progress.settings();
        assert_eq!(progress, ProgressSettings::default());
    }

    #[test]
    fn test_config_loading() {
        let config = AppConfig::load().expect("Should load default configuration");

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.uploads.images.folder, "images");
        assert_eq!(config.progress.ceiling, 90);
        assert!(config.validate().is_ok());
    }
}
