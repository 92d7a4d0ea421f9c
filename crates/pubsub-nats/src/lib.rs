//! NATS driver for the generic pub/sub interface, over core NATS or `JetStream`.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Conversion between envelopes and NATS messages.
pub mod codec;

/// Plain and `JetStream` connections.
pub mod connection;

/// Connection registry keyed by base URL.
pub mod dialer;

/// Topic and subscription drivers for the generic interface.
pub mod driver;

/// Topic and subscription options.
pub mod options;

/// Receive side: subscriptions and durable consumers.
pub mod queue;

/// Publish side.
pub mod topic;

/// Connection strings to options.
pub mod url_opener;

mod error;

pub use connection::Connection;
pub use dialer::{Dialer, DialerConfig};
pub use driver::{PubSubSubscription, PubSubTopic, open_subscription, open_topic};
pub use error::Error;
pub use options::{SetupOptions, SubscriptionOptions, TopicOptions};
pub use queue::NatsAckId;
pub use url_opener::UrlOpener;
