use thiserror::Error;

/// Result type for graph configuration
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors raised while configuring the engine.
///
/// Graph operations themselves never fail: unknown IDs, missing paths and
/// exhausted bounds are reported as values.
#[derive(Error, Debug)]
pub enum GraphError {
    /// Configuration values violate a limit
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration text could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl GraphError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
