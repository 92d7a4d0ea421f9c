use crate::Error;
use crate::codec;
use crate::queue::NatsAckId;

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::time::Duration;

use async_nats::jetstream::AckKind;
use async_nats::jetstream::consumer::PullConsumer;
use futures::StreamExt;
use proven_pubsub::Delivery;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Whether a pull error is the server closing the request because the byte budget is
/// spent, rather than a failure.
fn ends_batch(error: &async_nats::Error) -> bool {
    error
        .to_string()
        .to_ascii_lowercase()
        .contains("exceeds maxbytes")
}

/// A durable pull consumer on a stream. Delivery is at-least-once.
pub struct JetStreamQueue {
    batch_timeout: Duration,
    consumer_name: String,
    max_batch_bytes: usize,
    nats_consumer: PullConsumer,
}

impl Debug for JetStreamQueue {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("JetStreamQueue")
            .field("batch_timeout", &self.batch_timeout)
            .field("consumer_name", &self.consumer_name)
            .field("max_batch_bytes", &self.max_batch_bytes)
            .finish_non_exhaustive()
    }
}

impl JetStreamQueue {
    pub(crate) const fn new(
        nats_consumer: PullConsumer,
        consumer_name: String,
        batch_timeout: Duration,
        max_batch_bytes: usize,
    ) -> Self {
        Self {
            batch_timeout,
            consumer_name,
            max_batch_bytes,
            nats_consumer,
        }
    }

    /// The underlying pull consumer.
    #[must_use]
    pub const fn nats_consumer(&self) -> &PullConsumer {
        &self.nats_consumer
    }

    /// The durable consumer name.
    #[must_use]
    pub fn consumer_name(&self) -> &str {
        &self.consumer_name
    }

    /// How long a fetch waits for the batch to fill.
    #[must_use]
    pub const fn batch_timeout(&self) -> Duration {
        self.batch_timeout
    }

    /// Issues one pull request for up to `batch_size` messages and drains whatever
    /// arrives before the batch timeout. A single round trip, not per-message polling.
    ///
    /// A terminal status from the server after some messages have arrived (or the
    /// byte budget running out) ends the batch and the collected messages are returned.
    pub(crate) async fn receive_messages(
        &self,
        cancel: &CancellationToken,
        batch_size: usize,
    ) -> Result<Vec<Delivery<NatsAckId>>, Error> {
        if cancel.is_cancelled() {
            return Err(Error::Canceled);
        }

        let mut request = self
            .nats_consumer
            .batch()
            .max_messages(batch_size.max(1))
            .expires(self.batch_timeout);

        if self.max_batch_bytes > 0 {
            request = request.max_bytes(self.max_batch_bytes);
        }

        let mut batch = request
            .messages()
            .await
            .map_err(|e| Error::Fetch(e.kind()))?;

        let mut deliveries = Vec::new();
        while let Some(message) = batch.next().await {
            let message = match message {
                Ok(message) => message,
                Err(e) if !deliveries.is_empty() || ends_batch(&e) => {
                    debug!(
                        consumer = %self.consumer_name,
                        received = deliveries.len(),
                        error = %e,
                        "pull request ended early"
                    );
                    break;
                }
                Err(e) => return Err(Error::Receive(e)),
            };
            let decoded = codec::decode(&message.message)?;

            deliveries.push(Delivery {
                message: decoded,
                ack_id: NatsAckId::JetStream(message),
            });
        }

        trace!(consumer = %self.consumer_name, received = deliveries.len(), "fetched batch");

        Ok(deliveries)
    }

    /// Acknowledges each stream delivery. Foreign handles are skipped and individual
    /// failures are logged rather than returned.
    ///
    /// This is a single-phase ack: the server does not confirm it, so a crash between
    /// fetch and ack, or a lost ack, leads to redelivery once the ack wait expires.
    pub(crate) async fn ack(
        &self,
        cancel: &CancellationToken,
        ack_ids: Vec<NatsAckId>,
    ) -> Result<(), Error> {
        for ack_id in ack_ids {
            if cancel.is_cancelled() {
                return Err(Error::Canceled);
            }

            let NatsAckId::JetStream(message) = ack_id else {
                continue;
            };

            if let Err(e) = message.ack().await {
                warn!(consumer = %self.consumer_name, error = %e, "failed to ack message");
            }
        }

        Ok(())
    }

    /// Negatively acknowledges each stream delivery so the server redelivers it.
    pub(crate) async fn nack(
        &self,
        cancel: &CancellationToken,
        ack_ids: Vec<NatsAckId>,
    ) -> Result<(), Error> {
        for ack_id in ack_ids {
            if cancel.is_cancelled() {
                return Err(Error::Canceled);
            }

            let NatsAckId::JetStream(message) = ack_id else {
                continue;
            };

            if let Err(e) = message.ack_with(AckKind::Nak(None)).await {
                warn!(consumer = %self.consumer_name, error = %e, "failed to nack message");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io;

    #[test]
    fn test_max_bytes_status_ends_batch() {
        let error: async_nats::Error = Box::new(io::Error::other(
            "error while processing messages from the stream: 409, Some(\"Message Size Exceeds MaxBytes\")",
        ));

        assert!(ends_batch(&error));
    }

    #[test]
    fn test_other_errors_do_not_end_batch() {
        let error: async_nats::Error = Box::new(io::Error::other(
            "error while processing messages from the stream: 409, Some(\"Consumer Deleted\")",
        ));

        assert!(!ends_batch(&error));
    }
}
