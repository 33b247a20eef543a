use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Core(#[from] redmon_core::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unsupported {kind}: {value}")]
    Unsupported { kind: &'static str, value: String },

    #[error("missing required setting `{0}`")]
    MissingSetting(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
