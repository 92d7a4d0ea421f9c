use crate::Error;

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::LazyLock;

use regex::Regex;

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\Av?(\d+)\.?(\d+)?\.?(\d+)?").expect("Invalid regex pattern")
});

/// Oldest server release the driver talks to.
pub const MINIMUM_SERVER_VERSION: ServerVersion = ServerVersion {
    major: 2,
    minor: 2,
    patch: 0,
};

/// A NATS server release number as reported in the server's INFO.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct ServerVersion {
    /// Major release.
    pub major: u64,

    /// Minor release. Zero when not reported.
    pub minor: u64,

    /// Patch release. Zero when not reported.
    pub patch: u64,
}

impl ServerVersion {
    /// Parses strings such as `2.10.4`, `v2.9` or `2.11.0-beta`.
    ///
    /// # Errors
    ///
    /// Returns `Error::ServerVersion` if no leading version number is found.
    pub fn parse(version: &str) -> Result<Self, Error> {
        let captures = VERSION_RE
            .captures(version)
            .ok_or_else(|| Error::ServerVersion(version.to_string()))?;

        let part = |index: usize| -> Result<u64, Error> {
            captures.get(index).map_or(Ok(0), |m| {
                m.as_str()
                    .parse()
                    .map_err(|_| Error::ServerVersion(version.to_string()))
            })
        };

        Ok(Self {
            major: part(1)?,
            minor: part(2)?,
            patch: part(3)?,
        })
    }

    /// Whether the server is new enough. Only major and minor are compared.
    #[must_use]
    pub const fn is_supported(&self) -> bool {
        self.major > MINIMUM_SERVER_VERSION.major
            || (self.major == MINIMUM_SERVER_VERSION.major
                && self.minor >= MINIMUM_SERVER_VERSION.minor)
    }
}

impl Display for ServerVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Checks a reported server version against [`MINIMUM_SERVER_VERSION`].
///
/// # Errors
///
/// Returns `Error::ServerVersion` for unparsable input and `Error::VersionUnsupported`
/// for servers older than 2.2.
pub fn check_server_version(version: &str) -> Result<ServerVersion, Error> {
    let parsed = ServerVersion::parse(version)?;

    if !parsed.is_supported() {
        return Err(Error::VersionUnsupported(version.to_string()));
    }

    Ok(parsed)
}
