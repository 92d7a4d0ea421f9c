use crate::DriverError;
use crate::error_code::ErrorCode;
use crate::message::Message;

use std::fmt::Debug;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// A driver that publishes messages to a single destination.
#[async_trait]
pub trait Topic
where
    Self: Debug + Send + Sync + 'static,
{
    /// The error type for the topic.
    type Error: DriverError;

    /// Publishes the messages in order, stopping at the first failure.
    ///
    /// Messages sent before a failure stay sent.
    async fn send_batch(
        &self,
        cancel: &CancellationToken,
        messages: Vec<Message>,
    ) -> Result<(), Self::Error>;

    /// Whether the framework should retry a failed call.
    fn is_retryable(&self, _error: &Self::Error) -> bool {
        false
    }

    /// Classifies an error returned by this topic.
    fn error_code(&self, error: &Self::Error) -> ErrorCode;

    /// Releases resources held by the topic.
    async fn close(&self) -> Result<(), Self::Error>;
}
