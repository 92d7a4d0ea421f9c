use crate::Error;
use crate::codec::OutboundMessage;

use async_nats::Client;
use async_nats::jetstream::Context as JetStreamContext;
use tracing::trace;

/// Publishes straight to a core NATS subject. Delivery is at-most-once.
#[derive(Clone, Debug)]
pub struct PlainTopic {
    client: Client,
    subject: String,
}

impl PlainTopic {
    /// The underlying NATS client.
    #[must_use]
    pub const fn client(&self) -> &Client {
        &self.client
    }

    async fn publish_message(&self, message: OutboundMessage) -> Result<String, Error> {
        let OutboundMessage {
            subject,
            payload,
            headers,
        } = message;

        if let Some(headers) = headers {
            self.client
                .publish_with_headers(subject, headers, payload)
                .await
                .map_err(|e| Error::Publish(e.kind()))?;
        } else {
            self.client
                .publish(subject, payload)
                .await
                .map_err(|e| Error::Publish(e.kind()))?;
        }

        // Core NATS has no publish acknowledgement.
        Ok(String::new())
    }
}

/// Publishes into a stream and waits for the stream's acknowledgement.
#[derive(Clone, Debug)]
pub struct JetStreamTopic {
    jetstream_context: JetStreamContext,
    subject: String,
}

impl JetStreamTopic {
    /// The underlying `JetStream` context.
    #[must_use]
    pub const fn jetstream_context(&self) -> &JetStreamContext {
        &self.jetstream_context
    }

    async fn publish_message(&self, message: OutboundMessage) -> Result<String, Error> {
        let OutboundMessage {
            subject,
            payload,
            headers,
        } = message;

        let ack_future = if let Some(headers) = headers {
            self.jetstream_context
                .publish_with_headers(subject, headers, payload)
                .await
        } else {
            self.jetstream_context.publish(subject, payload).await
        }
        .map_err(|e| Error::JetStreamPublish(e.kind()))?;

        let seq = ack_future
            .await
            .map_err(|e| Error::JetStreamPublish(e.kind()))?
            .sequence;

        trace!(subject = %self.subject, seq, "published to stream");

        Ok(seq.to_string())
    }
}

/// A publish target bound to one subject on one connection variant.
#[derive(Clone, Debug)]
pub enum NatsTopic {
    /// Core NATS publishing.
    Plain(PlainTopic),

    /// `JetStream` publishing.
    JetStream(JetStreamTopic),
}

impl NatsTopic {
    pub(crate) fn plain(client: Client, subject: String) -> Result<Self, Error> {
        validate_publish_subject(&subject)?;
        Ok(Self::Plain(PlainTopic { client, subject }))
    }

    pub(crate) fn jetstream(
        jetstream_context: JetStreamContext,
        subject: String,
    ) -> Result<Self, Error> {
        validate_publish_subject(&subject)?;
        Ok(Self::JetStream(JetStreamTopic {
            jetstream_context,
            subject,
        }))
    }

    /// The subject this topic publishes to.
    #[must_use]
    pub fn subject(&self) -> &str {
        match self {
            Self::Plain(topic) => &topic.subject,
            Self::JetStream(topic) => &topic.subject,
        }
    }

    /// Publishes a single message.
    ///
    /// Returns the publish token: empty for core NATS, the stream sequence number as a
    /// decimal string for `JetStream`. The token is opaque to callers.
    ///
    /// # Errors
    ///
    /// Returns the underlying publish error unchanged. Nothing is retried.
    pub async fn publish_message(&self, message: OutboundMessage) -> Result<String, Error> {
        match self {
            Self::Plain(topic) => topic.publish_message(message).await,
            Self::JetStream(topic) => topic.publish_message(message).await,
        }
    }

    /// Returns the plain variant, if this is one.
    #[must_use]
    pub const fn as_plain(&self) -> Option<&PlainTopic> {
        match self {
            Self::Plain(topic) => Some(topic),
            Self::JetStream(_) => None,
        }
    }

    /// Returns the `JetStream` variant, if this is one.
    #[must_use]
    pub const fn as_jetstream(&self) -> Option<&JetStreamTopic> {
        match self {
            Self::Plain(_) => None,
            Self::JetStream(topic) => Some(topic),
        }
    }
}

/// Checks that `subject` can be published to: no whitespace, no empty tokens and no
/// wildcards.
pub(crate) fn validate_publish_subject(subject: &str) -> Result<(), Error> {
    validate_subject(subject)?;

    if subject.split('.').any(|token| token == "*" || token == ">") {
        return Err(Error::BadSubject(subject.to_string()));
    }

    Ok(())
}

/// Checks that `subject` is well formed. Wildcards are allowed.
pub(crate) fn validate_subject(subject: &str) -> Result<(), Error> {
    if subject.is_empty() {
        return Err(Error::UninitializedDestination);
    }

    if subject.chars().any(char::is_whitespace) || subject.split('.').any(str::is_empty) {
        return Err(Error::BadSubject(subject.to_string()));
    }

    Ok(())
}
