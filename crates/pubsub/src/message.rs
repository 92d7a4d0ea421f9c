use std::collections::HashMap;

use bytes::Bytes;

/// String-keyed message metadata.
pub type Metadata = HashMap<String, String>;

/// A message as seen by the generic layer: an opaque body plus optional metadata.
///
/// Absent metadata (`None`) and empty metadata (`Some` of an empty map) are distinct.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Message {
    /// The opaque message body.
    pub body: Bytes,

    /// Optional key/value metadata.
    pub metadata: Option<Metadata>,
}

impl Message {
    /// Creates a message without metadata.
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            metadata: None,
        }
    }

    /// Attaches the given metadata.
    #[must_use]
    pub fn with_metadata<I, K, V>(mut self, metadata: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.metadata = Some(
            metadata
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }
}

/// A received message together with the handle needed to ack or nack it.
#[derive(Clone, Debug)]
pub struct Delivery<A> {
    /// The decoded message.
    pub message: Message,

    /// Driver-specific acknowledgement handle.
    pub ack_id: A,
}
