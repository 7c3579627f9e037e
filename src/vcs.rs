//! The capability interface the fetcher runs against, and the dispatch
//! between the native and command-line transports.

use std::future::Future;

use tracing::debug;

use crate::command::SvnCommandClient;
use crate::config::FetcherConfig;
use crate::{
    FetchedFile, NodeKind, RaSvnClient, RaSvnSession, RepositoryUrl, Revision, SvnError, Transport,
};

/// What a fetch needs from a repository connection.
///
/// Paths are relative to the repository URL the client was opened for.
pub trait VersionControlClient {
    /// Returns the kind of node at `path` and `revision`.
    ///
    /// A path that does not exist is [`NodeKind::None`], not an error.
    fn probe(
        &mut self,
        path: &str,
        revision: Revision,
    ) -> impl Future<Output = Result<NodeKind, SvnError>>;

    /// Fetches the contents and full property list of the file at `path` and
    /// `revision`, in one request-response unit.
    fn fetch(
        &mut self,
        path: &str,
        revision: Revision,
    ) -> impl Future<Output = Result<FetchedFile, SvnError>>;
}

impl VersionControlClient for RaSvnSession {
    async fn probe(&mut self, path: &str, revision: Revision) -> Result<NodeKind, SvnError> {
        self.check_path(path, revision).await
    }

    async fn fetch(&mut self, path: &str, revision: Revision) -> Result<FetchedFile, SvnError> {
        let max_bytes = self.client().max_bytes();
        self.get_file(path, revision, max_bytes).await
    }
}

impl VersionControlClient for SvnCommandClient {
    async fn probe(&mut self, path: &str, revision: Revision) -> Result<NodeKind, SvnError> {
        self.check_path(path, revision).await
    }

    async fn fetch(&mut self, path: &str, revision: Revision) -> Result<FetchedFile, SvnError> {
        self.get_file(path, revision).await
    }
}

/// A client for any supported repository URL.
#[derive(Debug)]
pub enum RepositoryClient {
    /// A connected `svn://` session.
    RaSvn(Box<RaSvnSession>),
    /// The `svn` command-line client.
    Command(SvnCommandClient),
}

impl RepositoryClient {
    /// Opens a client for `url`, choosing the transport from its scheme.
    ///
    /// `svn://` URLs connect and authenticate immediately; the other schemes
    /// only prepare the command-line client and fail on first use.
    pub async fn connect(
        url: &RepositoryUrl,
        username: Option<&str>,
        password: Option<&str>,
        config: &FetcherConfig,
    ) -> Result<Self, SvnError> {
        let username = username.map(str::to_string);
        let password = password.map(str::to_string);
        match url.transport() {
            Transport::Svn => {
                let mut client = RaSvnClient::new(url.to_svn_url()?, username, password)
                    .with_connect_timeout(config.connect_timeout())
                    .with_read_timeout(config.read_timeout())
                    .with_write_timeout(config.write_timeout())
                    .with_max_bytes(config.max_bytes());
                if let Some(ra_client) = config.ra_client() {
                    client = client.with_ra_client(ra_client);
                }
                let session = client.open_session().await?;
                debug!(url = %url, uuid = %session.repos_uuid(), "svn:// session opened");
                Ok(Self::RaSvn(Box::new(session)))
            }
            transport => {
                debug!(
                    url = %url,
                    %transport,
                    program = %config.svn_binary().display(),
                    "using svn command-line client"
                );
                Ok(Self::Command(
                    SvnCommandClient::new(config.svn_binary(), url.clone(), username, password)
                        .with_max_bytes(config.max_bytes()),
                ))
            }
        }
    }
}

impl VersionControlClient for RepositoryClient {
    async fn probe(&mut self, path: &str, revision: Revision) -> Result<NodeKind, SvnError> {
        match self {
            Self::RaSvn(session) => session.probe(path, revision).await,
            Self::Command(client) => client.probe(path, revision).await,
        }
    }

    async fn fetch(&mut self, path: &str, revision: Revision) -> Result<FetchedFile, SvnError> {
        match self {
            Self::RaSvn(session) => session.fetch(path, revision).await,
            Self::Command(client) => client.fetch(path, revision).await,
        }
    }
}
