use thiserror::Error;

/// Errors that can occur while converting between envelopes and NATS messages.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum Error {
    /// A header name or value was not valid percent-encoding.
    #[error("failed to percent-decode header field {0:?}")]
    Decode(String),

    /// A metadata key could not be turned into a header name.
    #[error("metadata key {0:?} cannot be used as a header name")]
    InvalidHeader(String),

    /// The native message carried a status instead of a delivery.
    #[error("invalid message")]
    InvalidMessage,
}
