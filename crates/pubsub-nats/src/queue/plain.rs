use crate::Error;
use crate::codec;
use crate::queue::NatsAckId;

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::time::Duration;

use async_nats::{Client, Subscriber};
use bytes::Bytes;
use futures::StreamExt;
use proven_pubsub::Delivery;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// A synchronous-style core NATS subscription, polled one message at a time.
///
/// Delivery is at-most-once. Subscriptions opened with a queue group share the load
/// with every other member of the group.
pub struct PlainQueue {
    batch_timeout: Duration,
    client: Client,
    queue_group: Option<String>,
    subject: String,
    subscriber: Mutex<Option<Subscriber>>,
}

impl Debug for PlainQueue {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("PlainQueue")
            .field("batch_timeout", &self.batch_timeout)
            .field("queue_group", &self.queue_group)
            .field("subject", &self.subject)
            .finish_non_exhaustive()
    }
}

impl PlainQueue {
    pub(crate) fn new(
        client: Client,
        subscriber: Subscriber,
        subject: String,
        queue_group: Option<String>,
        batch_timeout: Duration,
    ) -> Self {
        Self {
            batch_timeout,
            client,
            queue_group,
            subject,
            subscriber: Mutex::new(Some(subscriber)),
        }
    }

    /// The subject being subscribed to.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// The queue group, if the subscription is load balanced.
    #[must_use]
    pub fn queue_group(&self) -> Option<&str> {
        self.queue_group.as_deref()
    }

    /// How long each poll waits for a message.
    #[must_use]
    pub const fn batch_timeout(&self) -> Duration {
        self.batch_timeout
    }

    /// Queue-group subscriptions count as durable; private ones do not.
    #[must_use]
    pub const fn is_durable(&self) -> bool {
        self.queue_group.is_some()
    }

    /// Polls for up to `batch_size` messages, waiting up to the batch timeout for each.
    ///
    /// A poll that times out ends the batch early and returns what was collected so far,
    /// possibly nothing.
    pub(crate) async fn receive_messages(
        &self,
        cancel: &CancellationToken,
        batch_size: usize,
    ) -> Result<Vec<Delivery<NatsAckId>>, Error> {
        let mut guard = self.subscriber.lock().await;
        let subscriber = guard.as_mut().ok_or(Error::BadSubscription)?;

        let mut deliveries = Vec::new();

        for _ in 0..batch_size {
            let polled = tokio::select! {
                () = cancel.cancelled() => {
                    if deliveries.is_empty() {
                        return Err(Error::Canceled);
                    }
                    break;
                }
                polled = timeout(self.batch_timeout, subscriber.next()) => polled,
            };

            let Ok(next) = polled else {
                trace!(subject = %self.subject, received = deliveries.len(), "poll timed out");
                break;
            };

            // The client ends the stream when the subscription is torn down server-side.
            let message = next.ok_or(Error::BadSubscription)?;
            let decoded = codec::decode(&message)?;

            deliveries.push(Delivery {
                message: decoded,
                ack_id: NatsAckId::Plain(message),
            });
        }

        Ok(deliveries)
    }

    /// Settles deliveries by replying with `body` (`+ACK` or `-NAK`).
    ///
    /// Only queue-group subscriptions reply, and only to messages that carry a reply
    /// subject. Private subscriptions have nobody to tell. Foreign handles are skipped and
    /// publish failures are logged rather than returned.
    pub(crate) async fn settle(
        &self,
        cancel: &CancellationToken,
        ack_ids: Vec<NatsAckId>,
        body: &'static [u8],
    ) -> Result<(), Error> {
        if !self.is_durable() {
            trace!(subject = %self.subject, count = ack_ids.len(), "nothing to settle");
            return Ok(());
        }

        for ack_id in ack_ids {
            if cancel.is_cancelled() {
                return Err(Error::Canceled);
            }

            let NatsAckId::Plain(message) = ack_id else {
                continue;
            };
            let Some(reply) = message.reply else {
                continue;
            };

            if let Err(e) = self
                .client
                .publish(reply, Bytes::from_static(body))
                .await
            {
                warn!(subject = %self.subject, error = %e, "failed to settle message");
            }
        }

        Ok(())
    }

    /// Tears down the subscription. Later receives fail with `Error::BadSubscription`.
    ///
    /// Waits for any in-flight receive to finish first, which can take up to the batch
    /// timeout.
    ///
    /// # Errors
    ///
    /// Returns `Error::Unsubscribe` if the unsubscribe could not be sent.
    pub async fn unsubscribe(&self) -> Result<(), Error> {
        let Some(mut subscriber) = self.subscriber.lock().await.take() else {
            return Ok(());
        };

        subscriber
            .unsubscribe()
            .await
            .map_err(|e| Error::Unsubscribe(e.to_string()))?;

        debug!(subject = %self.subject, "unsubscribed");

        Ok(())
    }
}
