use std::time::Duration;

/// Default number of concurrent receive handlers.
pub const DEFAULT_CONSUMERS_MAX_COUNT: usize = 1;

/// Default number of messages requested per receive batch.
pub const DEFAULT_CONSUMER_MAX_BATCH_SIZE: usize = 100;

/// Default byte bound for a receive batch (zero is unbounded).
pub const DEFAULT_CONSUMER_MAX_BATCH_BYTES_SIZE: usize = 0;

/// Default wait for a receive batch.
pub const DEFAULT_CONSUMER_BATCH_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Options for opening a topic.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TopicOptions {
    /// The subject messages are published to.
    pub subject: String,
}

/// Provisioning options applied once when a subscription is created.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SetupOptions {
    /// Name of the stream backing a durable subscription.
    pub stream_name: String,

    /// Description used if the stream has to be created.
    pub stream_description: String,

    /// Subjects captured by the stream. Falls back to `subjects` when empty.
    pub stream_subjects: Vec<String>,

    /// Subjects to subscribe to. Plain subscriptions use the first one.
    pub subjects: Vec<String>,

    /// Durable consumer name (durable mode) or queue group (plain mode).
    pub durable_queue: Option<String>,
}

impl SetupOptions {
    /// The subjects the stream should capture.
    #[must_use]
    pub fn effective_stream_subjects(&self) -> Vec<String> {
        if self.stream_subjects.is_empty() {
            self.subjects.clone()
        } else {
            self.stream_subjects.clone()
        }
    }
}

/// Options for opening a subscription.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SubscriptionOptions {
    /// Maximum number of concurrent receive handlers.
    pub consumers_max_count: usize,

    /// Number of messages requested per receive batch.
    pub consumer_max_batch_size: usize,

    /// Byte bound for a durable receive batch. Zero is unbounded.
    pub consumer_max_batch_bytes_size: usize,

    /// How long a receive batch waits for messages.
    pub consumer_batch_timeout: Duration,

    /// Stream and consumer provisioning options.
    pub setup: SetupOptions,
}

impl Default for SubscriptionOptions {
    fn default() -> Self {
        Self {
            consumers_max_count: DEFAULT_CONSUMERS_MAX_COUNT,
            consumer_max_batch_size: DEFAULT_CONSUMER_MAX_BATCH_SIZE,
            consumer_max_batch_bytes_size: DEFAULT_CONSUMER_MAX_BATCH_BYTES_SIZE,
            consumer_batch_timeout: DEFAULT_CONSUMER_BATCH_TIMEOUT,
            setup: SetupOptions::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_subjects_fall_back_to_subjects() {
        let setup = SetupOptions {
            subjects: vec!["orders".to_string()],
            ..Default::default()
        };

        assert_eq!(setup.effective_stream_subjects(), vec!["orders".to_string()]);
    }

    #[test]
    fn test_stream_subjects_take_precedence() {
        let setup = SetupOptions {
            subjects: vec!["orders".to_string()],
            stream_subjects: vec!["orders.>".to_string()],
            ..Default::default()
        };

        assert_eq!(setup.effective_stream_subjects(), vec!["orders.>".to_string()]);
    }
}
