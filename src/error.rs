use thiserror::Error;

#[derive(Error, Debug)]
pub enum GvmSwitchError {
    #[error("No Go version specified in .go-version or go.mod")]
    NoVersionFound,

    #[error("No go.mod found in workspace")]
    NoGoMod,

    #[error("Failed to gvm use {version}: {detail}")]
    ActivationFailed { version: String, detail: String },

    #[error("Failed to use pkgset '{pkgset}': {detail}")]
    PkgsetActivationFailed { pkgset: String, detail: String },

    #[error("Failed to install {version} via gvm: {detail}")]
    InstallFailed { version: String, detail: String },

    #[error("Failed to gvm use {version} after installation: {detail}")]
    RetryFailed { version: String, detail: String },

    #[error("Command failed: {detail}")]
    Execution { detail: String },

    #[error("Could not quote shell argument: {0}")]
    Quote(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Shell integration error: {0}")]
    ShellError(String),

    #[error("File watcher error: {0}")]
    WatchError(#[from] notify::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

impl GvmSwitchError {
    /// Detail text captured from the external command, if this error carries one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            GvmSwitchError::ActivationFailed { detail, .. }
            | GvmSwitchError::PkgsetActivationFailed { detail, .. }
            | GvmSwitchError::InstallFailed { detail, .. }
            | GvmSwitchError::RetryFailed { detail, .. }
            | GvmSwitchError::Execution { detail } => Some(detail),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, GvmSwitchError>;
