use crate::engine::source::SourceLocation;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Input error: {0}")]
    Input(String),

    #[error("Expression error: {0}")]
    Expression(String),

    #[error("{engine} engine error: {message}")]
    Engine {
        engine: &'static str,
        message: String,
        location: Option<SourceLocation>,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Engine failure without a source position
    pub fn engine(engine: &'static str, message: impl Into<String>) -> Self {
        Error::Engine {
            engine,
            message: message.into(),
            location: None,
        }
    }

    /// Engine failure pinned to a line (and optionally column) of the hosted source
    pub fn engine_at(
        engine: &'static str,
        message: impl Into<String>,
        location: SourceLocation,
    ) -> Self {
        Error::Engine {
            engine,
            message: message.into(),
            location: Some(location),
        }
    }

    /// Source location attached to the error, if any
    pub fn location(&self) -> Option<&SourceLocation> {
        match self {
            Error::Engine { location, .. } => location.as_ref(),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Expression(format!("{err:#}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
