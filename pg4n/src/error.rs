//! Typed error types for pg4n.

/// All errors produced by the pg4n library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Config(String),

    #[error("could not analyze statement: {0}")]
    Analysis(String),

    #[cfg(feature = "wrap")]
    #[error("{0}")]
    Wrap(String),

    #[error("{0}")]
    Other(String),
}

/// A `Result` alias where the error type is [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
