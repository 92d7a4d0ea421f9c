mod error;

pub use error::Error;

use crate::connection::Connection;
use crate::driver::{self, PubSubSubscription, PubSubTopic};
use crate::options::{SubscriptionOptions, TopicOptions};

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::time::Duration;

use percent_encoding::percent_decode_str;
use url::Url;

/// URL scheme handled by the opener.
pub const SCHEME: &str = "nats";

/// Query parameters recognised in connection strings. Anything else is rejected.
pub const ALLOWED_PARAMETERS: &[&str] = &[
    "subject",
    "stream_name",
    "stream_description",
    "stream_subjects",
    "consumer_max_count",
    "consumer_max_batch_size",
    "consumer_max_batch_bytes_size",
    "consumer_queue",
    "consumer_batch_timeout",
    "jetstream",
];

/// Parses a connection string and checks its scheme.
///
/// # Errors
///
/// Returns `Error::InvalidUrl` for unparsable input and `Error::UnsupportedScheme` for
/// anything other than `nats://`.
pub fn parse(connection_string: &str) -> Result<Url, Error> {
    let url = Url::parse(connection_string)?;

    if url.scheme() != SCHEME {
        return Err(Error::UnsupportedScheme(url.scheme().to_string()));
    }

    Ok(url)
}

/// Collects the query parameters, keyed by lower-cased name.
///
/// # Errors
///
/// Rejects parameters outside [`ALLOWED_PARAMETERS`] and parameters given more than once.
pub fn query_parameters(url: &Url) -> Result<HashMap<String, String>, Error> {
    let mut parameters = HashMap::new();

    for (name, value) in url.query_pairs() {
        let name = name.to_lowercase();

        if !ALLOWED_PARAMETERS.contains(&name.as_str()) {
            return Err(Error::UnsupportedParameter(name));
        }

        match parameters.entry(name) {
            Entry::Occupied(entry) => return Err(Error::DuplicateParameter(entry.key().clone())),
            Entry::Vacant(entry) => {
                entry.insert(value.into_owned());
            }
        }
    }

    Ok(parameters)
}

/// The connection string with path, query and fragment stripped. Used as the key under
/// which connections are shared, and as the address that gets dialed.
#[must_use]
pub fn base_url(url: &Url) -> String {
    let mut base = url.clone();
    base.set_query(None);
    base.set_fragment(None);
    base.set_path("");
    base.to_string()
}

/// Whether the connection string asks for `JetStream`. A bare `jetstream` counts as yes.
#[must_use]
pub fn wants_jetstream(parameters: &HashMap<String, String>) -> bool {
    parameters.get("jetstream").is_some_and(|value| {
        !(value.eq_ignore_ascii_case("false") || value == "0")
    })
}

/// Resolves topic options from a connection string.
///
/// The subject is the `subject` parameter with the URL path appended:
/// `nats://host/bar?subject=foo` publishes to `foo/bar`.
///
/// # Errors
///
/// Fails on bad query parameters, or with `UninitializedDestination` when neither the
/// parameter nor the path give a subject.
pub fn topic_options(url: &Url, defaults: &TopicOptions) -> Result<TopicOptions, crate::Error> {
    let parameters = query_parameters(url)?;
    let path = url_path(url);

    let subject = join_subject(
        parameters.get("subject").map_or("", String::as_str),
        &path,
    );
    if subject.is_empty() {
        return Err(crate::Error::UninitializedDestination);
    }

    Ok(TopicOptions {
        subject,
        ..defaults.clone()
    })
}

/// Resolves subscription options from a connection string.
///
/// Each comma-separated `subject` entry gets the URL path appended. Numeric parameters
/// that are missing or unparsable keep their defaults.
///
/// # Errors
///
/// Fails on bad query parameters, or with `UninitializedDestination` when no subject
/// can be derived.
pub fn subscription_options(
    url: &Url,
    defaults: &SubscriptionOptions,
) -> Result<SubscriptionOptions, crate::Error> {
    let parameters = query_parameters(url)?;
    let path = url_path(url);

    let subjects: Vec<String> = parameters
        .get("subject")
        .map_or("", String::as_str)
        .split(',')
        .map(|subject| join_subject(subject.trim(), &path))
        .filter(|subject| !subject.is_empty())
        .collect();
    if subjects.is_empty() {
        return Err(crate::Error::UninitializedDestination);
    }

    let mut options = defaults.clone();

    options.consumers_max_count =
        numeric_parameter(&parameters, "consumer_max_count", defaults.consumers_max_count);
    options.consumer_max_batch_size = numeric_parameter(
        &parameters,
        "consumer_max_batch_size",
        defaults.consumer_max_batch_size,
    );
    options.consumer_max_batch_bytes_size = numeric_parameter(
        &parameters,
        "consumer_max_batch_bytes_size",
        defaults.consumer_max_batch_bytes_size,
    );
    options.consumer_batch_timeout = parameters
        .get("consumer_batch_timeout")
        .and_then(|value| value.parse().ok())
        .map_or(defaults.consumer_batch_timeout, Duration::from_millis);

    let setup = &mut options.setup;
    setup.subjects = subjects;

    if let Some(queue) = non_empty(&parameters, "consumer_queue") {
        setup.durable_queue = Some(queue.to_string());
    }
    if let Some(name) = non_empty(&parameters, "stream_name") {
        setup.stream_name = name.to_string();
    }
    if let Some(description) = non_empty(&parameters, "stream_description") {
        setup.stream_description = description.to_string();
    }
    if let Some(stream_subjects) = non_empty(&parameters, "stream_subjects") {
        setup.stream_subjects = stream_subjects
            .split(',')
            .map(str::trim)
            .filter(|subject| !subject.is_empty())
            .map(String::from)
            .collect();
    }

    Ok(options)
}

/// Opens topics and subscriptions on one shared connection from connection strings.
#[derive(Clone, Debug)]
pub struct UrlOpener {
    connection: Connection,
    subscription_options: SubscriptionOptions,
    topic_options: TopicOptions,
}

impl UrlOpener {
    /// Creates an opener with default options.
    #[must_use]
    pub fn new(connection: Connection) -> Self {
        Self::with_options(
            connection,
            TopicOptions::default(),
            SubscriptionOptions::default(),
        )
    }

    /// Creates an opener whose options are overridden by each connection string.
    #[must_use]
    pub const fn with_options(
        connection: Connection,
        topic_options: TopicOptions,
        subscription_options: SubscriptionOptions,
    ) -> Self {
        Self {
            connection,
            subscription_options,
            topic_options,
        }
    }

    /// The shared connection.
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Opens a topic for the subject named by `url`.
    ///
    /// # Errors
    ///
    /// Fails if no valid subject can be derived from `url`.
    pub fn open_topic_url(&self, url: &Url) -> Result<PubSubTopic, crate::Error> {
        let options = topic_options(url, &self.topic_options)?;

        driver::open_topic(&self.connection, &options)
    }

    /// Opens a subscription configured by `url`.
    ///
    /// # Errors
    ///
    /// Fails if the options are invalid or the subscription cannot be created.
    pub async fn open_subscription_url(&self, url: &Url) -> Result<PubSubSubscription, crate::Error> {
        let options = subscription_options(url, &self.subscription_options)?;

        driver::open_subscription(&self.connection, &options).await
    }
}

fn url_path(url: &Url) -> String {
    percent_decode_str(url.path())
        .decode_utf8_lossy()
        .into_owned()
}

fn non_empty<'a>(parameters: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    parameters
        .get(name)
        .map(String::as_str)
        .filter(|value| !value.is_empty())
}

fn numeric_parameter(parameters: &HashMap<String, String>, name: &str, default: usize) -> usize {
    parameters
        .get(name)
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

/// Joins a subject and a URL path the way slash-separated paths join: empty parts are
/// dropped, `.` and `..` segments are resolved and a leading slash is kept.
fn join_subject(subject: &str, path: &str) -> String {
    let joined = match (subject.is_empty(), path.is_empty()) {
        (true, true) => return String::new(),
        (true, false) => path.to_string(),
        (false, true) => subject.to_string(),
        (false, false) => format!("{subject}/{path}"),
    };

    let rooted = joined.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|last| *last != "..") {
                    segments.pop();
                } else if !rooted {
                    segments.push(segment);
                }
            }
            _ => segments.push(segment),
        }
    }

    let body = segments.join("/");
    if rooted { format!("/{body}") } else { body }
}
