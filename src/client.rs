use std::fmt::Formatter;
use std::time::Duration;

use tokio::net::TcpStream;
use tracing::debug;

use crate::path::{validate_rel_dir_path, validate_rel_path};
use crate::props::{ENTRY_CHECKSUM, ENTRY_REVISION};
use crate::rasvn::SvnItem;
use crate::rasvn::conn::{RaSvnConnection, RaSvnConnectionConfig};
use crate::rasvn::parse::parse_get_file_response_params;
use crate::{FetchedFile, NodeKind, Revision, ServerInfo, SvnError, SvnUrl};

/// A reusable configuration object for connecting to an `svn://` server.
///
/// Use [`RaSvnClient::open_session`] to create a connected [`RaSvnSession`].
#[derive(Clone)]
pub struct RaSvnClient {
    base_url: SvnUrl,
    username: Option<String>,
    password: Option<String>,
    connect_timeout: Duration,
    read_timeout: Duration,
    write_timeout: Duration,
    ra_client: String,
    max_bytes: u64,
}

impl std::fmt::Debug for RaSvnClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RaSvnClient")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("write_timeout", &self.write_timeout)
            .field("ra_client", &self.ra_client)
            .field("max_bytes", &self.max_bytes)
            .finish()
    }
}

/// A connected session to an `svn://` server.
///
/// A session owns a single TCP connection, which is closed when the session
/// is dropped. Operations require `&mut self` and run serially.
pub struct RaSvnSession {
    client: RaSvnClient,
    conn: RaSvnConnection,
    server_info: ServerInfo,
}

impl std::fmt::Debug for RaSvnSession {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RaSvnSession")
            .field("client", &self.client)
            .field("server_info", &self.server_info)
            .finish()
    }
}

impl RaSvnClient {
    /// Creates a client configuration for a repository URL and optional credentials.
    ///
    /// Credentials are used when the server offers `CRAM-MD5` or `PLAIN`;
    /// without them only `ANONYMOUS` is attempted.
    pub fn new(base_url: SvnUrl, username: Option<String>, password: Option<String>) -> Self {
        Self {
            base_url,
            username,
            password,
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(60),
            write_timeout: Duration::from_secs(60),
            ra_client: concat!("svnread/", env!("CARGO_PKG_VERSION")).to_string(),
            max_bytes: 64 * 1024 * 1024,
        }
    }

    /// Returns the configured base URL.
    pub fn base_url(&self) -> &SvnUrl {
        &self.base_url
    }

    /// Returns the configured username, if any.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Returns the configured `ra_client` string sent during handshake.
    pub fn ra_client(&self) -> &str {
        &self.ra_client
    }

    /// Returns the largest file, in bytes, a fetch through this client accepts.
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

    /// Sets the `ra_client` string sent to the server during handshake.
    #[must_use]
    pub fn with_ra_client(mut self, ra_client: impl Into<String>) -> Self {
        self.ra_client = ra_client.into();
        self
    }

    /// Sets the largest file, in bytes, a fetch through this client accepts.
    #[must_use]
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Opens a new TCP connection, performs the `ra_svn` handshake, and returns a [`RaSvnSession`].
    pub async fn open_session(&self) -> Result<RaSvnSession, SvnError> {
        let addr = self.base_url.socket_addr();
        debug!(addr = %addr, "connecting to svnserve");
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| {
                SvnError::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "connect timed out",
                ))
            })??;
        stream.set_nodelay(true)?;

        let (read, write) = stream.into_split();
        self.handshake(RaSvnConnection::new(
            Box::new(read),
            Box::new(write),
            self.connection_config(),
        ))
        .await
    }

    /// Opens a session over an already connected stream.
    ///
    /// The stream must already be connected to the same `host:port` as
    /// [`RaSvnClient::base_url`].
    pub async fn open_session_with_stream<S>(&self, stream: S) -> Result<RaSvnSession, SvnError>
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
    {
        let (read, write) = tokio::io::split(stream);
        self.handshake(RaSvnConnection::new(
            Box::new(read),
            Box::new(write),
            self.connection_config(),
        ))
        .await
    }

    fn connection_config(&self) -> RaSvnConnectionConfig {
        RaSvnConnectionConfig {
            username: self.username.clone(),
            password: self.password.clone(),
            url: self.base_url.url.clone(),
            ra_client: self.ra_client.clone(),
            read_timeout: self.read_timeout,
            write_timeout: self.write_timeout,
        }
    }

    async fn handshake(&self, mut conn: RaSvnConnection) -> Result<RaSvnSession, SvnError> {
        let server_info = conn.handshake().await?;
        Ok(RaSvnSession {
            client: self.clone(),
            conn,
            server_info,
        })
    }
}

impl RaSvnSession {
    /// Returns the [`RaSvnClient`] configuration used to create this session.
    pub fn client(&self) -> &RaSvnClient {
        &self.client
    }

    /// Returns server info collected during handshake.
    pub fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Returns the repository UUID.
    pub fn repos_uuid(&self) -> &str {
        &self.server_info.repository.uuid
    }

    /// Returns the repository root URL, if the server reported one.
    pub fn repos_root_url(&self) -> Option<&str> {
        let root = self.server_info.repository.root_url.as_str();
        if root.trim().is_empty() {
            None
        } else {
            Some(root)
        }
    }

    /// Runs `check-path` and returns the node kind at `path` and `rev`.
    ///
    /// `path` is relative to the session URL; an empty path names the
    /// session URL itself.
    pub async fn check_path(&mut self, path: &str, rev: Revision) -> Result<NodeKind, SvnError> {
        let path = validate_rel_dir_path(path)?;
        let params = SvnItem::List(vec![SvnItem::string(&path), rev_tuple(rev)]);

        let response = self.conn.call("check-path", params).await?;
        let params = response.success_params("check-path")?;
        let kind_word = params
            .first()
            .and_then(SvnItem::as_wordish)
            .ok_or_else(|| SvnError::Protocol("check-path response missing kind".into()))?;
        let kind = NodeKind::from_word(&kind_word);
        debug!(path = %path, rev = %rev, kind = %kind, "check-path");
        Ok(kind)
    }

    /// Runs `get-file` and returns the file contents with its properties.
    ///
    /// The property list contains the regular properties and the entry
    /// properties sent by the server, plus `svn:entry:revision` (the revision
    /// that was served) and `svn:entry:checksum` when the server reports a
    /// checksum. Fails once more than `max_bytes` of content arrive.
    pub async fn get_file(
        &mut self,
        path: &str,
        rev: Revision,
        max_bytes: u64,
    ) -> Result<FetchedFile, SvnError> {
        let path = validate_rel_path(path)?;
        let params = SvnItem::List(vec![
            SvnItem::string(&path),
            rev_tuple(rev),
            SvnItem::Bool(true),
            SvnItem::Bool(true),
            SvnItem::Bool(false),
        ]);

        let response = self.conn.call("get-file", params).await?;
        let meta = parse_get_file_response_params(response.success_params("get-file")?)?;

        let mut contents = Vec::new();
        loop {
            let item = self.conn.read_item().await?;
            let Some(chunk) = item.as_bytes() else {
                return Err(SvnError::Protocol("expected file chunk string".into()));
            };
            if chunk.is_empty() {
                break;
            }
            if (contents.len() + chunk.len()) as u64 > max_bytes {
                return Err(SvnError::Protocol(format!(
                    "file exceeds size limit of {max_bytes} bytes"
                )));
            }
            contents.extend_from_slice(chunk);
        }

        self.conn.read_command_response().await?.ensure_success("get-file")?;

        let mut props = meta.props;
        props.insert(ENTRY_REVISION.to_string(), meta.rev.to_string().into_bytes());
        if let Some(checksum) = meta.checksum.as_deref() {
            props
                .entry(ENTRY_CHECKSUM.to_string())
                .or_insert_with(|| checksum.as_bytes().to_vec());
        }
        debug!(path = %path, rev = meta.rev, bytes = contents.len(), "get-file");

        Ok(FetchedFile {
            rev: meta.rev,
            checksum: meta.checksum,
            props,
            contents,
        })
    }
}

fn rev_tuple(rev: Revision) -> SvnItem {
    match rev.number() {
        Some(n) => SvnItem::List(vec![SvnItem::Number(n)]),
        None => SvnItem::List(Vec::new()),
    }
}
