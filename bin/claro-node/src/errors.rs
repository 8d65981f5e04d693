use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed override string {0}, must be 'key=value'")]
    InvalidOverride(String),

    #[error("missing key {0} in config")]
    MissingKey(String),

    #[error("override path traverses non-table value at {0}")]
    TraverseNonTableAt(String),
}

#[derive(Debug, Error)]
pub enum InitError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("malformed config file: {0}")]
    MalformedConfig(#[from] toml::de::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
