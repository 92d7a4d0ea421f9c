use crate::DriverError;
use crate::error_code::ErrorCode;
use crate::message::Delivery;

use std::fmt::Debug;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// A driver that receives messages and settles them.
#[async_trait]
pub trait Subscription
where
    Self: Debug + Send + Sync + 'static,
{
    /// Handle used to ack or nack a single delivery.
    type AckId: Debug + Send + Sync + 'static;

    /// The error type for the subscription.
    type Error: DriverError;

    /// Receives up to `max_messages` messages. May return fewer, including none.
    async fn receive_batch(
        &self,
        cancel: &CancellationToken,
        max_messages: usize,
    ) -> Result<Vec<Delivery<Self::AckId>>, Self::Error>;

    /// Acknowledges the given deliveries.
    async fn send_acks(
        &self,
        cancel: &CancellationToken,
        ack_ids: Vec<Self::AckId>,
    ) -> Result<(), Self::Error>;

    /// Whether negative acknowledgements have any effect.
    fn can_nack(&self) -> bool;

    /// Negatively acknowledges the given deliveries so they can be redelivered.
    async fn send_nacks(
        &self,
        cancel: &CancellationToken,
        ack_ids: Vec<Self::AckId>,
    ) -> Result<(), Self::Error>;

    /// Whether the framework should retry a failed call.
    fn is_retryable(&self, _error: &Self::Error) -> bool {
        false
    }

    /// Classifies an error returned by this subscription.
    fn error_code(&self, error: &Self::Error) -> ErrorCode;

    /// Releases resources held by the subscription.
    async fn close(&self) -> Result<(), Self::Error>;
}
