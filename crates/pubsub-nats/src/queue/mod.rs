mod jetstream;
mod plain;

pub use jetstream::JetStreamQueue;
pub use plain::PlainQueue;

use crate::Error;

use proven_pubsub::Delivery;
use tokio_util::sync::CancellationToken;

const ACK: &[u8] = b"+ACK";
const NAK: &[u8] = b"-NAK";

/// The native handle for a received message, used to ack or nack it.
#[derive(Debug)]
pub enum NatsAckId {
    /// A core NATS delivery.
    Plain(async_nats::Message),

    /// A `JetStream` delivery.
    JetStream(async_nats::jetstream::Message),
}

impl NatsAckId {
    /// The core NATS message, if this came from a plain subscription.
    #[must_use]
    pub const fn as_plain(&self) -> Option<&async_nats::Message> {
        match self {
            Self::Plain(message) => Some(message),
            Self::JetStream(_) => None,
        }
    }

    /// The stream message, if this came from a `JetStream` consumer.
    #[must_use]
    pub const fn as_jetstream(&self) -> Option<&async_nats::jetstream::Message> {
        match self {
            Self::Plain(_) => None,
            Self::JetStream(message) => Some(message),
        }
    }
}

/// The receive side of a connection: one state machine per connection variant.
#[derive(Debug)]
pub enum NatsQueue {
    /// Core NATS subscription.
    Plain(PlainQueue),

    /// `JetStream` durable consumer.
    JetStream(JetStreamQueue),
}

impl NatsQueue {
    /// Receives up to `batch_size` messages.
    ///
    /// # Errors
    ///
    /// Fails on cancellation, on a torn-down subscription, on fetch errors, and if any
    /// message in the batch fails to decode. No partial batch is returned on failure.
    pub async fn receive_messages(
        &self,
        cancel: &CancellationToken,
        batch_size: usize,
    ) -> Result<Vec<Delivery<NatsAckId>>, Error> {
        match self {
            Self::Plain(queue) => queue.receive_messages(cancel, batch_size).await,
            Self::JetStream(queue) => queue.receive_messages(cancel, batch_size).await,
        }
    }

    /// Acknowledges deliveries. Handles from the other variant are skipped.
    ///
    /// # Errors
    ///
    /// Only fails if the caller cancels part way through.
    pub async fn ack(
        &self,
        cancel: &CancellationToken,
        ack_ids: Vec<NatsAckId>,
    ) -> Result<(), Error> {
        match self {
            Self::Plain(queue) => queue.settle(cancel, ack_ids, ACK).await,
            Self::JetStream(queue) => queue.ack(cancel, ack_ids).await,
        }
    }

    /// Negatively acknowledges deliveries. Handles from the other variant are skipped.
    ///
    /// # Errors
    ///
    /// Only fails if the caller cancels part way through.
    pub async fn nack(
        &self,
        cancel: &CancellationToken,
        ack_ids: Vec<NatsAckId>,
    ) -> Result<(), Error> {
        match self {
            Self::Plain(queue) => queue.settle(cancel, ack_ids, NAK).await,
            Self::JetStream(queue) => queue.nack(cancel, ack_ids).await,
        }
    }

    /// Whether nacks lead to redelivery.
    #[must_use]
    pub const fn is_durable(&self) -> bool {
        match self {
            Self::Plain(queue) => queue.is_durable(),
            Self::JetStream(_) => true,
        }
    }

    /// Largest batch worth asking for: core subscriptions hand back one message per poll.
    #[must_use]
    pub fn max_batch_size(&self, requested: usize) -> usize {
        match self {
            Self::Plain(_) => 1,
            Self::JetStream(_) => requested.max(1),
        }
    }

    /// Tears down a plain subscription. Durable consumers persist and are left alone.
    ///
    /// # Errors
    ///
    /// Returns `Error::Unsubscribe` if the plain unsubscribe could not be sent.
    pub async fn unsubscribe(&self) -> Result<(), Error> {
        match self {
            Self::Plain(queue) => queue.unsubscribe().await,
            Self::JetStream(_) => Ok(()),
        }
    }

    /// Returns the plain variant, if this is one.
    #[must_use]
    pub const fn as_plain(&self) -> Option<&PlainQueue> {
        match self {
            Self::Plain(queue) => Some(queue),
            Self::JetStream(_) => None,
        }
    }

    /// Returns the `JetStream` variant, if this is one.
    #[must_use]
    pub const fn as_jetstream(&self) -> Option<&JetStreamQueue> {
        match self {
            Self::Plain(_) => None,
            Self::JetStream(queue) => Some(queue),
        }
    }
}
