use thiserror::Error;

/// Errors raised while turning a connection string into options.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum Error {
    /// A query parameter was given more than once.
    #[error("duplicate query parameter {0:?}")]
    DuplicateParameter(String),

    /// The connection string could not be parsed.
    #[error("invalid connection string: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The connection string uses a scheme other than `nats`.
    #[error("unsupported scheme {0:?}")]
    UnsupportedScheme(String),

    /// A query parameter is not recognised.
    #[error("unsupported query parameter {0:?}")]
    UnsupportedParameter(String),
}
