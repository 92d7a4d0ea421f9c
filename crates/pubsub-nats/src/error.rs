use async_nats::ConnectErrorKind;
use async_nats::client::PublishErrorKind;
use async_nats::jetstream::consumer::pull::BatchErrorKind;
use async_nats::jetstream::context::{
    CreateStreamErrorKind, GetStreamErrorKind, PublishErrorKind as JetStreamPublishErrorKind,
};
use async_nats::jetstream::stream::ConsumerErrorKind;
use proven_pubsub::{DriverError, ErrorCode};
use thiserror::Error;

/// Errors that can occur in the NATS pub/sub driver.
#[derive(Debug, Error)]
pub enum Error {
    /// The caller cancelled the operation.
    #[error("operation canceled")]
    Canceled,

    /// The subscription has been unsubscribed or closed by the server.
    #[error("subscription is not active")]
    BadSubscription,

    /// The subject is not valid for the operation.
    #[error("invalid subject {0:?}")]
    BadSubject(String),

    /// An envelope could not be converted to or from a NATS message.
    #[error(transparent)]
    Codec(#[from] crate::codec::Error),

    /// Durable subscriptions need a stream to bind to.
    #[error("a stream name is required for durable subscriptions")]
    MissingStreamName,

    /// No subject was configured.
    #[error("subject not initialized")]
    UninitializedDestination,

    /// The connection string was rejected.
    #[error(transparent)]
    Url(#[from] crate::url_opener::Error),

    /// Dialing the server failed.
    #[error("failed to dial server using {url}: {kind}")]
    Dial {
        /// The base connection string that was dialed.
        url: String,

        /// Why the dial failed.
        kind: ConnectErrorKind,
    },

    /// The server reported a version that could not be parsed.
    #[error("failed to parse NATS server version {0:?}")]
    ServerVersion(String),

    /// The server is older than the minimum supported version.
    #[error("NATS server version {0:?} is not supported")]
    VersionUnsupported(String),

    /// Core publish error.
    #[error("Failed to publish: {0}")]
    Publish(PublishErrorKind),

    /// Stream publish error.
    #[error("Failed to publish to stream: {0}")]
    JetStreamPublish(JetStreamPublishErrorKind),

    /// Subscribe error.
    #[error("Failed to subscribe: {0}")]
    Subscribe(String),

    /// Unsubscribe error.
    #[error("Failed to unsubscribe: {0}")]
    Unsubscribe(String),

    /// Stream lookup error.
    #[error("Failed to look up stream: {0}")]
    GetStream(GetStreamErrorKind),

    /// Stream creation error.
    #[error("Failed to create stream: {0}")]
    CreateStream(CreateStreamErrorKind),

    /// Consumer creation error.
    #[error("Failed to create consumer: {0}")]
    CreateConsumer(ConsumerErrorKind),

    /// Fetch request error.
    #[error("Failed to fetch batch: {0}")]
    Fetch(BatchErrorKind),

    /// A message in a fetched batch could not be received.
    #[error("Failed to receive message: {0}")]
    Receive(#[source] async_nats::Error),
}

impl Error {
    /// Maps the error onto the portable error codes.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Canceled => ErrorCode::Canceled,
            Self::UninitializedDestination
            | Self::BadSubscription
            | Self::JetStreamPublish(JetStreamPublishErrorKind::StreamNotFound) => {
                ErrorCode::NotFound
            }
            Self::BadSubject(_)
            | Self::MissingStreamName
            | Self::Publish(PublishErrorKind::BadSubject) => ErrorCode::FailedPrecondition,
            Self::Dial {
                kind: ConnectErrorKind::Authentication | ConnectErrorKind::AuthorizationViolation,
                ..
            } => ErrorCode::PermissionDenied,
            Self::Publish(PublishErrorKind::MaxPayloadExceeded) => ErrorCode::ResourceExhausted,
            Self::Dial {
                kind: ConnectErrorKind::TimedOut,
                ..
            }
            | Self::JetStreamPublish(JetStreamPublishErrorKind::TimedOut) => {
                ErrorCode::DeadlineExceeded
            }
            _ => ErrorCode::Unknown,
        }
    }
}

impl DriverError for Error {}
