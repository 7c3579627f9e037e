use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::SvnError;
use crate::props::AttributeEncoding;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_MAX_BYTES: u64 = 64 * 1024 * 1024;
const DEFAULT_SVN_BINARY: &str = "svn";

/// Settings shared by every fetch a [`crate::ConfigFetcher`] performs.
///
/// The defaults match what the transports would use on their own, so
/// `FetcherConfig::default()` is a reasonable starting point.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetcherConfig {
    connect_timeout: Duration,
    read_timeout: Duration,
    write_timeout: Duration,
    ra_client: Option<String>,
    svn_binary: PathBuf,
    attribute_encoding: AttributeEncoding,
    max_bytes: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            ra_client: None,
            svn_binary: PathBuf::from(DEFAULT_SVN_BINARY),
            attribute_encoding: AttributeEncoding::default(),
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }
}

impl FetcherConfig {
    /// Loads settings from `SVNREAD_*` environment variables, falling back to
    /// the defaults for unset or empty variables.
    ///
    /// | Variable | Meaning |
    /// |---|---|
    /// | `SVNREAD_CONNECT_TIMEOUT_SECS` | connect timeout for `svn://` |
    /// | `SVNREAD_READ_TIMEOUT_SECS` | read timeout for `svn://` |
    /// | `SVNREAD_WRITE_TIMEOUT_SECS` | write timeout for `svn://` |
    /// | `SVNREAD_SVN_BINARY` | `svn` executable for the other schemes |
    /// | `SVNREAD_ESCAPE_ATTRIBUTES` | `1`/`true` escapes the attributes block |
    /// | `SVNREAD_MAX_BYTES` | largest file that will be fetched |
    pub fn from_env() -> Result<Self, SvnError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Like [`FetcherConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SvnError> {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();

        if let Some(raw) = get("SVNREAD_CONNECT_TIMEOUT_SECS") {
            config.connect_timeout = parse_secs("SVNREAD_CONNECT_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = get("SVNREAD_READ_TIMEOUT_SECS") {
            config.read_timeout = parse_secs("SVNREAD_READ_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = get("SVNREAD_WRITE_TIMEOUT_SECS") {
            config.write_timeout = parse_secs("SVNREAD_WRITE_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = get("SVNREAD_SVN_BINARY") {
            config.svn_binary = PathBuf::from(raw.trim());
        }
        if let Some(raw) = get("SVNREAD_ESCAPE_ATTRIBUTES") {
            config.attribute_encoding = if parse_flag("SVNREAD_ESCAPE_ATTRIBUTES", &raw)? {
                AttributeEncoding::Escaped
            } else {
                AttributeEncoding::Raw
            };
        }
        if let Some(raw) = get("SVNREAD_MAX_BYTES") {
            config.max_bytes = raw.trim().parse::<u64>().map_err(|_| {
                SvnError::InvalidConfig(format!("SVNREAD_MAX_BYTES: not a byte count: {raw}"))
            })?;
        }

        debug!(?config, "loaded fetcher configuration");
        Ok(config)
    }

    /// Connect timeout for `svn://` sessions.
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Read timeout for `svn://` sessions.
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// Write timeout for `svn://` sessions.
    pub fn write_timeout(&self) -> Duration {
        self.write_timeout
    }

    /// `ra_client` string override for `svn://` handshakes.
    pub fn ra_client(&self) -> Option<&str> {
        self.ra_client.as_deref()
    }

    /// The `svn` executable used for `http(s)://`, `svn+ssh://` and `file://`.
    pub fn svn_binary(&self) -> &Path {
        &self.svn_binary
    }

    /// How the `attributes` block is written.
    pub fn attribute_encoding(&self) -> AttributeEncoding {
        self.attribute_encoding
    }

    /// Largest file, in bytes, that a fetch accepts.
    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Sets the connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Sets the read timeout.
    #[must_use]
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Sets the write timeout.
    #[must_use]
    pub fn with_write_timeout(mut self, write_timeout: Duration) -> Self {
        self.write_timeout = write_timeout;
        self
    }

    /// Sets the `ra_client` string sent during `svn://` handshakes.
    #[must_use]
    pub fn with_ra_client(mut self, ra_client: impl Into<String>) -> Self {
        self.ra_client = Some(ra_client.into());
        self
    }

    /// Sets the `svn` executable.
    #[must_use]
    pub fn with_svn_binary(mut self, svn_binary: impl Into<PathBuf>) -> Self {
        self.svn_binary = svn_binary.into();
        self
    }

    /// Sets how the `attributes` block is written.
    #[must_use]
    pub fn with_attribute_encoding(mut self, encoding: AttributeEncoding) -> Self {
        self.attribute_encoding = encoding;
        self
    }

    /// Sets the largest file, in bytes, that a fetch accepts.
    #[must_use]
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }
}

fn parse_secs(name: &str, raw: &str) -> Result<Duration, SvnError> {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(SvnError::InvalidConfig(format!(
            "{name}: expected a positive number of seconds, got {raw:?}"
        ))),
    }
}

fn parse_flag(name: &str, raw: &str) -> Result<bool, SvnError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(SvnError::InvalidConfig(format!(
            "{name}: expected a boolean, got {raw:?}"
        ))),
    }
}
