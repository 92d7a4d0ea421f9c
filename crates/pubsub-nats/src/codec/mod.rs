mod error;

pub use error::Error;

use std::borrow::Cow;
use std::str::FromStr;

use async_nats::HeaderMap;
use async_nats::header::HeaderName;
use bytes::Bytes;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use proven_pubsub::{Message, Metadata};

// Everything but the URL "unreserved" characters is escaped.
const QUERY_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// A message ready to be handed to the NATS client.
#[derive(Clone, Debug)]
pub struct OutboundMessage {
    /// Destination subject.
    pub subject: String,

    /// Message body, copied verbatim from the envelope.
    pub payload: Bytes,

    /// Header block. `None` when the envelope had no metadata.
    pub headers: Option<HeaderMap>,
}

/// Converts an envelope into a NATS message bound for `subject`.
///
/// Every metadata key and value is percent-encoded independently. No header block is
/// created for absent or empty metadata.
///
/// Keys made only of unreserved characters pass through unchanged, so a key such as
/// `Nats-Msg-Id` or `Nats-Expected-Stream` reaches the server as the matching control
/// header and changes how a stream treats the publish (deduplication, expectations).
///
/// # Errors
///
/// Returns `Error::InvalidHeader` if an encoded key is not a usable header name.
pub fn encode(message: &Message, subject: impl Into<String>) -> Result<OutboundMessage, Error> {
    let headers = match &message.metadata {
        Some(metadata) if !metadata.is_empty() => {
            let mut headers = HeaderMap::new();
            for (key, value) in metadata {
                let name = HeaderName::from_str(&escape(key))
                    .map_err(|_| Error::InvalidHeader(key.clone()))?;
                headers.insert(name, escape(value).as_str());
            }
            Some(headers)
        }
        _ => None,
    };

    Ok(OutboundMessage {
        subject: subject.into(),
        payload: message.body.clone(),
        headers,
    })
}

/// Converts a received NATS message back into an envelope.
///
/// # Errors
///
/// Returns `Error::InvalidMessage` for status messages (heartbeats, flow control,
/// no-responders) and `Error::Decode` if any header field is not valid percent-encoding.
pub fn decode(message: &async_nats::Message) -> Result<Message, Error> {
    if message.status.is_some() {
        return Err(Error::InvalidMessage);
    }

    decode_parts(&message.payload, message.headers.as_ref())
}

/// Builds an envelope from a payload and optional header block.
///
/// Metadata stays `None` when there is no header block. Only the first value of a
/// repeated header is kept.
///
/// # Errors
///
/// Returns `Error::Decode` if any header name or value fails to percent-decode.
pub fn decode_parts(payload: &Bytes, headers: Option<&HeaderMap>) -> Result<Message, Error> {
    let metadata = headers
        .map(|headers| {
            headers
                .iter()
                .map(|(name, values)| {
                    let value = values.first().map(ToString::to_string).unwrap_or_default();
                    Ok((unescape(&name.to_string())?, unescape(&value)?))
                })
                .collect::<Result<Metadata, Error>>()
        })
        .transpose()?;

    Ok(Message {
        body: payload.clone(),
        metadata,
    })
}

fn escape(input: &str) -> String {
    // A literal '%' is always escaped, so "%20" can only come from a space.
    utf8_percent_encode(input, QUERY_ESCAPE)
        .to_string()
        .replace("%20", "+")
}

fn unescape(input: &str) -> Result<String, Error> {
    let bytes = input.as_bytes();
    for (index, _) in input.match_indices('%') {
        let well_formed = bytes
            .get(index + 1..index + 3)
            .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
        if !well_formed {
            return Err(Error::Decode(input.to_string()));
        }
    }

    let spaced = input.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(Cow::into_owned)
        .map_err(|_| Error::Decode(input.to_string()))
}
