use crate::Error;
use crate::options::{SubscriptionOptions, TopicOptions};
use crate::queue::{JetStreamQueue, NatsQueue, PlainQueue};
use crate::topic::{NatsTopic, validate_subject};

use async_nats::Client;
use async_nats::jetstream::consumer::AckPolicy;
use async_nats::jetstream::consumer::pull::Config as NatsConsumerConfig;
use async_nats::jetstream::context::GetStreamErrorKind;
use async_nats::jetstream::stream::{Config as NatsStreamConfig, Stream as NatsStreamType};
use async_nats::jetstream::{Context as JetStreamContext, ErrorCode};
use tracing::{debug, info, instrument};

/// Core NATS: direct publish/subscribe, at-most-once.
#[derive(Clone, Debug)]
pub struct PlainConnection {
    client: Client,
}

impl PlainConnection {
    /// The underlying NATS client.
    #[must_use]
    pub const fn client(&self) -> &Client {
        &self.client
    }

    fn create_topic(&self, options: &TopicOptions) -> Result<NatsTopic, Error> {
        NatsTopic::plain(self.client.clone(), options.subject.clone())
    }

    #[instrument(skip(self, options), fields(subjects = ?options.setup.subjects))]
    async fn create_subscription(&self, options: &SubscriptionOptions) -> Result<NatsQueue, Error> {
        let setup = &options.setup;
        let subject = setup
            .subjects
            .first()
            .cloned()
            .ok_or(Error::UninitializedDestination)?;
        validate_subject(&subject)?;

        let subscriber = match &setup.durable_queue {
            Some(queue_group) => self
                .client
                .queue_subscribe(subject.clone(), queue_group.clone())
                .await
                .map_err(|e| Error::Subscribe(e.to_string()))?,
            // At-most-once: messages published while nobody is subscribed are lost.
            None => self
                .client
                .subscribe(subject.clone())
                .await
                .map_err(|e| Error::Subscribe(e.to_string()))?,
        };

        debug!(queue_group = ?setup.durable_queue, "subscribed");

        Ok(NatsQueue::Plain(PlainQueue::new(
            self.client.clone(),
            subscriber,
            subject,
            setup.durable_queue.clone(),
            options.consumer_batch_timeout,
        )))
    }
}

/// `JetStream`: stream-backed publishing and durable, explicitly acknowledged consumers.
#[derive(Clone, Debug)]
pub struct JetStreamConnection {
    client: Client,
    jetstream_context: JetStreamContext,
}

impl JetStreamConnection {
    /// The underlying NATS client.
    #[must_use]
    pub const fn client(&self) -> &Client {
        &self.client
    }

    /// The `JetStream` context.
    #[must_use]
    pub const fn jetstream_context(&self) -> &JetStreamContext {
        &self.jetstream_context
    }

    fn create_topic(&self, options: &TopicOptions) -> Result<NatsTopic, Error> {
        NatsTopic::jetstream(self.jetstream_context.clone(), options.subject.clone())
    }

    /// Looks the stream up and creates it if it does not exist.
    async fn get_or_create_stream(
        &self,
        options: &SubscriptionOptions,
    ) -> Result<NatsStreamType, Error> {
        let setup = &options.setup;

        match self.jetstream_context.get_stream(&setup.stream_name).await {
            Ok(stream) => Ok(stream),
            Err(e) => match e.kind() {
                GetStreamErrorKind::JetStream(err)
                    if err.error_code() == ErrorCode::STREAM_NOT_FOUND =>
                {
                    let description = Some(setup.stream_description.clone())
                        .filter(|description| !description.is_empty());

                    let stream = self
                        .jetstream_context
                        .create_stream(NatsStreamConfig {
                            name: setup.stream_name.clone(),
                            description,
                            subjects: setup.effective_stream_subjects(),
                            max_consumers: i32::try_from(options.consumers_max_count)
                                .unwrap_or(i32::MAX),
                            ..Default::default()
                        })
                        .await
                        .map_err(|e| Error::CreateStream(e.kind()))?;

                    info!(stream = %setup.stream_name, "created stream");

                    Ok(stream)
                }
                kind => Err(Error::GetStream(kind)),
            },
        }
    }

    #[instrument(skip(self, options), fields(stream = %options.setup.stream_name))]
    async fn create_subscription(&self, options: &SubscriptionOptions) -> Result<NatsQueue, Error> {
        let setup = &options.setup;
        if setup.stream_name.is_empty() {
            return Err(Error::MissingStreamName);
        }

        let stream = self.get_or_create_stream(options).await?;

        let consumer_name = setup
            .durable_queue
            .clone()
            .unwrap_or_else(|| setup.stream_name.clone());

        // Create-or-update, so reopening with the same name rebinds to the same cursor.
        let nats_consumer = stream
            .create_consumer(NatsConsumerConfig {
                durable_name: Some(consumer_name.clone()),
                ack_policy: AckPolicy::Explicit,
                ..Default::default()
            })
            .await
            .map_err(|e| Error::CreateConsumer(e.kind()))?;

        debug!(consumer = %consumer_name, "bound durable consumer");

        Ok(NatsQueue::JetStream(JetStreamQueue::new(
            nats_consumer,
            consumer_name,
            options.consumer_batch_timeout,
            options.consumer_max_batch_bytes_size,
        )))
    }
}

/// A shared broker link, fixed to one delivery mode for its lifetime.
#[derive(Clone, Debug)]
pub enum Connection {
    /// Core NATS.
    Plain(PlainConnection),

    /// `JetStream`.
    JetStream(JetStreamConnection),
}

impl Connection {
    /// Wraps a client for core NATS publish/subscribe.
    #[must_use]
    pub const fn plain(client: Client) -> Self {
        Self::Plain(PlainConnection { client })
    }

    /// Wraps a client for `JetStream` publish/consume.
    #[must_use]
    pub fn jetstream(client: Client) -> Self {
        let jetstream_context = async_nats::jetstream::new(client.clone());

        Self::JetStream(JetStreamConnection {
            client,
            jetstream_context,
        })
    }

    /// Binds a publish target to the subject in `options`.
    ///
    /// # Errors
    ///
    /// Returns `Error::UninitializedDestination` for an empty subject and
    /// `Error::BadSubject` for one that cannot be published to.
    pub fn create_topic(&self, options: &TopicOptions) -> Result<NatsTopic, Error> {
        match self {
            Self::Plain(connection) => connection.create_topic(options),
            Self::JetStream(connection) => connection.create_topic(options),
        }
    }

    /// Creates the receive side, provisioning stream and consumer in `JetStream` mode.
    ///
    /// # Errors
    ///
    /// Any subscribe or provisioning failure aborts creation. Nothing is retried.
    pub async fn create_subscription(
        &self,
        options: &SubscriptionOptions,
    ) -> Result<NatsQueue, Error> {
        match self {
            Self::Plain(connection) => connection.create_subscription(options).await,
            Self::JetStream(connection) => connection.create_subscription(options).await,
        }
    }

    /// The underlying NATS client.
    #[must_use]
    pub const fn client(&self) -> &Client {
        match self {
            Self::Plain(connection) => connection.client(),
            Self::JetStream(connection) => connection.client(),
        }
    }

    /// Whether this connection runs in durable `JetStream` mode.
    #[must_use]
    pub const fn is_jetstream(&self) -> bool {
        matches!(self, Self::JetStream(_))
    }

    /// Returns the plain variant, if this is one.
    #[must_use]
    pub const fn as_plain(&self) -> Option<&PlainConnection> {
        match self {
            Self::Plain(connection) => Some(connection),
            Self::JetStream(_) => None,
        }
    }

    /// Returns the `JetStream` variant, if this is one.
    #[must_use]
    pub const fn as_jetstream(&self) -> Option<&JetStreamConnection> {
        match self {
            Self::Plain(_) => None,
            Self::JetStream(connection) => Some(connection),
        }
    }
}
