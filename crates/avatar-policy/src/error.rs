#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("URL '{0}' has no host component")]
    MissingHost(String),

    #[error("failed to parse certificate: {0}")]
    Certificate(String),
}

pub type Result<T> = std::result::Result<T, Error>;
