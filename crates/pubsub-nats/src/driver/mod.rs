use crate::Error;
use crate::codec;
use crate::connection::Connection;
use crate::options::{SubscriptionOptions, TopicOptions};
use crate::queue::{NatsAckId, NatsQueue};
use crate::topic::NatsTopic;

use async_trait::async_trait;
use proven_pubsub::{BatcherOptions, Delivery, ErrorCode, Message, Subscription, Topic};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// NATS implementation of the generic publish driver.
#[derive(Clone, Debug)]
pub struct PubSubTopic {
    topic: NatsTopic,
}

impl PubSubTopic {
    /// The bound NATS topic.
    #[must_use]
    pub const fn topic(&self) -> &NatsTopic {
        &self.topic
    }
}

#[async_trait]
impl Topic for PubSubTopic {
    type Error = Error;

    async fn send_batch(
        &self,
        cancel: &CancellationToken,
        messages: Vec<Message>,
    ) -> Result<(), Self::Error> {
        for message in &messages {
            if cancel.is_cancelled() {
                return Err(Error::Canceled);
            }

            let outbound = codec::encode(message, self.topic.subject())?;
            self.topic.publish_message(outbound).await?;
        }

        Ok(())
    }

    fn error_code(&self, error: &Self::Error) -> ErrorCode {
        error.error_code()
    }

    async fn close(&self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// NATS implementation of the generic subscription driver.
#[derive(Debug)]
pub struct PubSubSubscription {
    batcher: BatcherOptions,
    queue: NatsQueue,
}

impl PubSubSubscription {
    /// The bound NATS queue.
    #[must_use]
    pub const fn queue(&self) -> &NatsQueue {
        &self.queue
    }

    /// Batching hints for the framework driving this subscription.
    #[must_use]
    pub const fn recv_batcher_options(&self) -> BatcherOptions {
        self.batcher
    }
}

#[async_trait]
impl Subscription for PubSubSubscription {
    type AckId = NatsAckId;
    type Error = Error;

    async fn receive_batch(
        &self,
        cancel: &CancellationToken,
        max_messages: usize,
    ) -> Result<Vec<Delivery<Self::AckId>>, Self::Error> {
        self.queue.receive_messages(cancel, max_messages).await
    }

    async fn send_acks(
        &self,
        cancel: &CancellationToken,
        ack_ids: Vec<Self::AckId>,
    ) -> Result<(), Self::Error> {
        self.queue.ack(cancel, ack_ids).await
    }

    fn can_nack(&self) -> bool {
        self.queue.is_durable()
    }

    async fn send_nacks(
        &self,
        cancel: &CancellationToken,
        ack_ids: Vec<Self::AckId>,
    ) -> Result<(), Self::Error> {
        self.queue.nack(cancel, ack_ids).await
    }

    fn error_code(&self, error: &Self::Error) -> ErrorCode {
        error.error_code()
    }

    async fn close(&self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Opens a publish driver on `connection`.
///
/// # Errors
///
/// Fails if the subject in `options` is missing or cannot be published to.
pub fn open_topic(connection: &Connection, options: &TopicOptions) -> Result<PubSubTopic, Error> {
    let topic = connection.create_topic(options)?;

    debug!(subject = %topic.subject(), "opened topic");

    Ok(PubSubTopic { topic })
}

/// Opens a subscription driver on `connection`, provisioning whatever the connection
/// variant needs.
///
/// # Errors
///
/// Fails if the subscription could not be created.
pub async fn open_subscription(
    connection: &Connection,
    options: &SubscriptionOptions,
) -> Result<PubSubSubscription, Error> {
    let queue = connection.create_subscription(options).await?;

    let batcher = BatcherOptions::new(
        queue.max_batch_size(options.consumer_max_batch_size),
        options.consumers_max_count,
    );

    debug!(?batcher, durable = queue.is_durable(), "opened subscription");

    Ok(PubSubSubscription { batcher, queue })
}
