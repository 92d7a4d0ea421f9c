mod version;

pub use version::{MINIMUM_SERVER_VERSION, ServerVersion, check_server_version};

use crate::Error;
use crate::connection::Connection;
use crate::driver::{PubSubSubscription, PubSubTopic};
use crate::url_opener::{self, UrlOpener};

use std::sync::Arc;
use std::time::Duration;

use async_nats::ConnectOptions;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};
use url::Url;

/// Default time allowed for establishing a connection.
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for the `Dialer`.
#[derive(Clone, Debug, Default)]
pub struct DialerConfig {
    /// Time allowed for establishing a connection. Defaults to 5 seconds if not set.
    pub connection_timeout: Option<Duration>,

    /// Client name reported to the server.
    pub name: Option<String>,
}

/// Resolves connection strings to shared connections.
///
/// One connection is dialed per distinct base URL (scheme, credentials, host and port)
/// and kept for the life of the dialer. Entries are never evicted.
#[derive(Debug)]
pub struct Dialer {
    connection_timeout: Duration,
    dial_lock: Mutex<()>,
    name: Option<String>,
    openers: DashMap<String, Arc<UrlOpener>>,
}

impl Default for Dialer {
    fn default() -> Self {
        Self::new(DialerConfig::default())
    }
}

impl Dialer {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(
        DialerConfig {
            connection_timeout,
            name,
        }: DialerConfig,
    ) -> Self {
        Self {
            connection_timeout: connection_timeout.unwrap_or(DEFAULT_CONNECTION_TIMEOUT),
            dial_lock: Mutex::new(()),
            name,
            openers: DashMap::new(),
        }
    }

    /// Number of connections dialed so far.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.openers.len()
    }

    /// Opens a topic described by `connection_string`, dialing if needed.
    ///
    /// # Errors
    ///
    /// Fails on a bad connection string, a failed dial or an unsupported server, or if
    /// no subject can be derived.
    pub async fn open_topic_url(&self, connection_string: &str) -> Result<PubSubTopic, Error> {
        let url = url_opener::parse(connection_string)?;
        let opener = self.opener(&url).await?;

        opener.open_topic_url(&url)
    }

    /// Opens a subscription described by `connection_string`, dialing if needed.
    ///
    /// # Errors
    ///
    /// Fails on a bad connection string, a failed dial or an unsupported server, or if
    /// the subscription cannot be created.
    pub async fn open_subscription_url(
        &self,
        connection_string: &str,
    ) -> Result<PubSubSubscription, Error> {
        let url = url_opener::parse(connection_string)?;
        let opener = self.opener(&url).await?;

        opener.open_subscription_url(&url).await
    }

    /// Returns the opener for the base of `url`, dialing on first use.
    ///
    /// Query parameters are validated before the cache is consulted, so a bad parameter
    /// never reaches the network. The `jetstream` flag only matters on the first dial.
    ///
    /// # Errors
    ///
    /// Fails on bad query parameters, a failed dial, or an unsupported server version.
    pub async fn opener(&self, url: &Url) -> Result<Arc<UrlOpener>, Error> {
        let parameters = url_opener::query_parameters(url)?;
        let key = url_opener::base_url(url);

        if let Some(opener) = self.cached(&key) {
            return Ok(opener);
        }

        let _guard = self.dial_lock.lock().await;

        // Another caller may have dialed while we waited.
        if let Some(opener) = self.cached(&key) {
            return Ok(opener);
        }

        let connection = self
            .dial(&key, url_opener::wants_jetstream(&parameters))
            .await?;
        let opener = Arc::new(UrlOpener::new(connection));

        self.openers.insert(key, Arc::clone(&opener));

        Ok(opener)
    }

    fn cached(&self, key: &str) -> Option<Arc<UrlOpener>> {
        self.openers.get(key).map(|entry| Arc::clone(entry.value()))
    }

    #[instrument(skip(self, base_url))]
    async fn dial(&self, base_url: &str, jetstream: bool) -> Result<Connection, Error> {
        let mut connect_options = ConnectOptions::new().connection_timeout(self.connection_timeout);
        if let Some(name) = &self.name {
            connect_options = connect_options.name(name);
        }

        let client = connect_options
            .connect(base_url)
            .await
            .map_err(|e| Error::Dial {
                url: base_url.to_string(),
                kind: e.kind(),
            })?;

        let server_version = client.server_info().version;
        let version = check_server_version(&server_version)?;

        debug!(%version, "server version supported");

        let connection = if jetstream {
            Connection::jetstream(client)
        } else {
            Connection::plain(client)
        };

        info!(jetstream, "connected to NATS");

        Ok(connection)
    }
}
