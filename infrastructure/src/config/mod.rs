//! Configuration loading and raw file structures

pub mod file_config;
pub mod loader;

pub use file_config::{
    ConfigIssue, FileAuthConfig, FileConfig, FileLimitsConfig, FileLlmConfig, FileLogConfig,
    FileServerConfig, FileTelegramConfig, Severity,
};
pub use loader::ConfigLoader;
