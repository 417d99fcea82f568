use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("configuration directory could not be determined for this platform")]
    NoProjectDirs,
}

pub type Result<T> = std::result::Result<T, ConfigError>;
