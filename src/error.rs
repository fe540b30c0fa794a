use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Client database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// A required input file or directory does not exist.
    #[error("Missing input: {0}")]
    MissingInput(String),

    /// The external API answered with a shape we do not understand.
    #[error("Unexpected response from {url}: {message}")]
    UnexpectedResponse { url: String, message: String },

    /// Fatal invariant violation; the run must stop before writing output.
    #[error("Consistency violation: {0}")]
    Consistency(String),
}

impl Error {
    pub fn consistency(msg: impl Into<String>) -> Self {
        Error::Consistency(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}
