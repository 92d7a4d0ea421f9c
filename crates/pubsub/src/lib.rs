//! Abstract driver interface for generic publish/subscribe.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Receive-side batching hints.
pub mod batcher;

/// Portable error classification.
pub mod error_code;

/// Envelopes exchanged with drivers.
pub mod message;

/// Subscriptions receive and acknowledge messages.
pub mod subscription;

/// Topics publish messages.
pub mod topic;

pub use batcher::BatcherOptions;
pub use error_code::ErrorCode;
pub use message::{Delivery, Message, Metadata};
pub use subscription::Subscription;
pub use topic::Topic;

use std::error::Error;

/// Marker trait for driver errors.
pub trait DriverError: Error + Send + Sync + 'static {}
