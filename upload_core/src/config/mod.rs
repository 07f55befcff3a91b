//! Application configuration

pub mod settings;

pub use settings::{
    AppConfig, CorsConfig, PresetConfig, ProgressConfig, ServerConfig, StorageBackend, StorageConfig,
    UploadsConfig,
};
