use std::fmt::{Display, Formatter};

use crate::SvnError;

/// The transport selected by a repository URL's scheme.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Transport {
    /// `http://` (WebDAV/DeltaV).
    Http,
    /// `https://` (WebDAV/DeltaV over TLS).
    Https,
    /// `svn://`, the native `ra_svn` protocol.
    Svn,
    /// `svn+ssh://`, `ra_svn` tunneled over SSH.
    SvnSsh,
    /// `file://`, direct repository access on the local filesystem.
    File,
}

impl Transport {
    fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme {
            "http" => Some(Self::Http),
            "https" => Some(Self::Https),
            "svn" => Some(Self::Svn),
            "svn+ssh" => Some(Self::SvnSsh),
            "file" => Some(Self::File),
            _ => None,
        }
    }

    /// Returns the URL scheme for this transport.
    pub fn scheme(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
            Self::Svn => "svn",
            Self::SvnSsh => "svn+ssh",
            Self::File => "file",
        }
    }
}

impl Display for Transport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.scheme())
    }
}

/// A repository URL with its transport resolved from the scheme.
///
/// The scheme is lowercased and trailing slashes are removed from the path;
/// everything else is kept as given.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepositoryUrl {
    transport: Transport,
    url: String,
}

impl RepositoryUrl {
    /// Parses a repository URL.
    ///
    /// # Examples
    ///
    /// ```
    /// # use svnread::{RepositoryUrl, Transport};
    /// let url = RepositoryUrl::parse("HTTPS://svn.example.com/repos/conf/").unwrap();
    /// assert_eq!(url.transport(), Transport::Https);
    /// assert_eq!(url.as_str(), "https://svn.example.com/repos/conf");
    /// ```
    pub fn parse(input: &str) -> Result<Self, SvnError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(SvnError::InvalidUrl("empty repository url".to_string()));
        }
        if input.chars().any(char::is_control) {
            return Err(SvnError::InvalidUrl(format!(
                "control characters in url: {input:?}"
            )));
        }
        let Some((scheme, rest)) = input.split_once("://") else {
            return Err(SvnError::InvalidUrl(format!("missing scheme in url: {input}")));
        };
        let scheme = scheme.to_ascii_lowercase();
        let Some(transport) = Transport::from_scheme(&scheme) else {
            return Err(SvnError::InvalidUrl(format!(
                "unsupported scheme '{scheme}' (expected http, https, svn, svn+ssh or file)"
            )));
        };

        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, ""),
        };
        if transport == Transport::File {
            if path.trim_matches('/').is_empty() {
                return Err(SvnError::InvalidUrl(format!(
                    "missing repository path in url: {input}"
                )));
            }
        } else if authority.rsplit('@').next().is_none_or(str::is_empty) {
            return Err(SvnError::InvalidUrl(format!("missing host in url: {input}")));
        }

        let path = path.trim_end_matches('/');
        Ok(Self {
            transport,
            url: format!("{scheme}://{authority}{path}"),
        })
    }

    /// Returns the transport selected by the scheme.
    pub fn transport(&self) -> Transport {
        self.transport
    }

    /// Returns the normalized URL string.
    pub fn as_str(&self) -> &str {
        &self.url
    }

    /// Converts this URL into an [`SvnUrl`] for the native `svn://` transport.
    pub fn to_svn_url(&self) -> Result<SvnUrl, SvnError> {
        SvnUrl::parse(&self.url)
    }
}

impl Display for RepositoryUrl {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.url)
    }
}

impl std::str::FromStr for RepositoryUrl {
    type Err = SvnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A normalized `svn://` URL with an explicit host and port.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SvnUrl {
    /// Hostname (or IP) portion of the URL.
    pub host: String,
    /// TCP port portion of the URL (default `3690`).
    pub port: u16,
    /// Full normalized URL string (`svn://[user@]host:port/path`, IPv6 uses brackets).
    pub url: String,
}

impl SvnUrl {
    /// Parses and normalizes a `svn://` URL.
    ///
    /// # Examples
    ///
    /// ```
    /// # use svnread::SvnUrl;
    /// let url = SvnUrl::parse("svn://example.com/repo").unwrap();
    /// assert_eq!(url.url, "svn://example.com:3690/repo");
    /// ```
    pub fn parse(input: &str) -> Result<Self, SvnError> {
        const SCHEME: &str = "svn://";
        const DEFAULT_PORT: u16 = 3690;

        let input = input.trim();
        let rest = match input.get(..SCHEME.len()) {
            Some(prefix) if prefix.eq_ignore_ascii_case(SCHEME) => &input[SCHEME.len()..],
            _ => {
                return Err(SvnError::InvalidUrl(
                    "the native transport only supports svn:// URLs".to_string(),
                ));
            }
        };
        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, "/"),
        };

        let (username, hostport) = match authority.rsplit_once('@') {
            Some((user, _)) if user.contains(':') => {
                return Err(SvnError::InvalidUrl(
                    "URL passwords are not supported (use user@host, not user:pass@host)"
                        .to_string(),
                ));
            }
            Some((user, _)) if user.trim().is_empty() => {
                return Err(SvnError::InvalidUrl(format!(
                    "invalid url (empty username): {input}"
                )));
            }
            Some((user, hostport)) => (Some(user), hostport),
            None => (None, authority),
        };

        let invalid_port = || SvnError::InvalidUrl(format!("invalid port in url: {input}"));
        let (host, port) = if let Some(bracketed) = hostport.strip_prefix('[') {
            let Some((host, after)) = bracketed.split_once(']') else {
                return Err(SvnError::InvalidUrl(format!("invalid url: {input}")));
            };
            let port = match after {
                "" => DEFAULT_PORT,
                _ => after
                    .strip_prefix(':')
                    .ok_or_else(|| SvnError::InvalidUrl(format!("invalid url: {input}")))?
                    .parse::<u16>()
                    .map_err(|_| invalid_port())?,
            };
            (host, port)
        } else {
            match hostport.split(':').collect::<Vec<_>>().as_slice() {
                [host] => (*host, DEFAULT_PORT),
                [host, port] => (*host, port.parse::<u16>().map_err(|_| invalid_port())?),
                _ => {
                    return Err(SvnError::InvalidUrl(
                        "IPv6 addresses must be enclosed in brackets (e.g. svn://[::1]/repo)"
                            .to_string(),
                    ));
                }
            }
        };

        if host.trim().is_empty() {
            return Err(SvnError::InvalidUrl(format!("missing host in url: {input}")));
        }

        let host_url = if host.contains(':') {
            format!("[{host}]")
        } else {
            host.to_string()
        };
        let user_url = username.map(|u| format!("{u}@")).unwrap_or_default();
        Ok(Self {
            host: host.to_string(),
            port,
            url: format!("{SCHEME}{user_url}{host_url}:{port}{path}"),
        })
    }

    /// Returns a `host:port` string suitable for `TcpStream::connect`.
    pub fn socket_addr(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl Display for SvnUrl {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.url)
    }
}
