//! The fetch component: resolves a repository, checks the node, fetches a
//! text file and reports the outcome as a [`FetchResult`].

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use tracing::{debug, info, warn};

use crate::config::FetcherConfig;
use crate::props::{ENTRY_REVISION, has_text_mime_type, serialize_attributes};
use crate::vcs::{RepositoryClient, VersionControlClient};
use crate::{NodeKind, RepositoryUrl, Revision, SvnError};

/// Output key holding the file contents.
pub const OUTPUT_CONTENT: &str = "content";
/// Output key holding the served revision.
pub const OUTPUT_REVISION: &str = "revision";
/// Output key holding the serialized property block.
pub const OUTPUT_ATTRIBUTES: &str = "attributes";
/// Output key holding the numeric status code.
pub const OUTPUT_RETURN_RESULT: &str = "returnResult";
/// Output key holding the human-readable status message.
pub const OUTPUT_RESULT_MESSAGE: &str = "resultMessage";

/// Outcome class of a fetch. Non-negative codes mean success.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// The content is available (`0`).
    Success,
    /// The path does not name a file (`-1`).
    NotAFile,
    /// The file is not text (`-2`).
    NotText,
    /// Transport, authentication or unexpected failure (`-3`).
    Failure,
}

impl StatusCode {
    /// Returns the numeric code reported to callers.
    pub fn code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::NotAFile => -1,
            Self::NotText => -2,
            Self::Failure => -3,
        }
    }

    /// Returns `true` for [`StatusCode::Success`].
    pub fn is_success(self) -> bool {
        self.code() >= 0
    }
}

impl Display for StatusCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// One fetch: where to read from, as whom, and which revision.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct FetchRequest {
    url: String,
    username: Option<String>,
    password: Option<String>,
    path: String,
    revision: Option<String>,
}

impl std::fmt::Debug for FetchRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchRequest")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("path", &self.path)
            .field("revision", &self.revision)
            .finish()
    }
}

impl FetchRequest {
    /// Creates a request for `path` below the repository `url`, at the
    /// latest revision, without credentials.
    pub fn new(url: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    /// Sets the username. A blank username means anonymous access.
    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Sets the password.
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the revision specifier. Anything but a non-negative integer
    /// selects the latest revision.
    #[must_use]
    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    /// Returns the repository URL as given.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the file path as given.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the username, or `None` when absent or blank.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref().filter(|name| !name.trim().is_empty())
    }

    /// Returns the revision specifier as given.
    pub fn revision_spec(&self) -> Option<&str> {
        self.revision.as_deref()
    }

    /// Returns the revision the specifier selects.
    pub fn revision(&self) -> Revision {
        Revision::from(self.revision.as_deref())
    }

    fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }
}

/// What a fetch produced.
///
/// `content`, `revision` and `attributes` are only set on success.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchResult {
    /// Outcome class.
    pub status: StatusCode,
    /// Human-readable outcome.
    pub message: String,
    /// File contents, byte for byte as stored in the repository.
    pub content: Option<Vec<u8>>,
    /// Revision that was served.
    pub revision: Option<String>,
    /// Serialized property block.
    pub attributes: Option<String>,
}

impl FetchResult {
    fn failure(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            content: None,
            revision: None,
            attributes: None,
        }
    }

    /// Returns `true` when the content is available.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns the five named outputs. Fields without a value are empty
    /// strings.
    ///
    /// The outputs are text, so `content` is decoded as UTF-8 here, with
    /// invalid sequences replaced by U+FFFD. Callers that need the stored
    /// bytes read [`FetchResult::content`] instead.
    pub fn outputs(&self) -> BTreeMap<String, String> {
        let text = |value: &Option<String>| value.clone().unwrap_or_default();
        let content = self
            .content
            .as_deref()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .unwrap_or_default();
        BTreeMap::from([
            (OUTPUT_CONTENT.to_string(), content),
            (OUTPUT_REVISION.to_string(), text(&self.revision)),
            (OUTPUT_ATTRIBUTES.to_string(), text(&self.attributes)),
            (OUTPUT_RETURN_RESULT.to_string(), self.status.to_string()),
            (OUTPUT_RESULT_MESSAGE.to_string(), self.message.clone()),
        ])
    }
}

/// Fetches single text files from Subversion repositories.
///
/// Every call opens its own connection (or child process) and releases it
/// before returning; nothing is shared between calls.
///
/// ```no_run
/// use svnread::{ConfigFetcher, FetchRequest};
///
/// let fetcher = ConfigFetcher::default();
/// let request = FetchRequest::new("svn://svn.example.com/repo", "conf/app.properties")
///     .with_revision("42");
/// let result = fetcher.fetch(&request);
/// println!("{}: {}", result.status, result.message);
/// ```
#[derive(Clone, Debug, Default)]
pub struct ConfigFetcher {
    config: FetcherConfig,
}

enum Failure {
    Repository(SvnError),
    Unexpected(String),
}

impl ConfigFetcher {
    /// Creates a fetcher with the given settings.
    pub fn new(config: FetcherConfig) -> Self {
        Self { config }
    }

    /// Returns the settings.
    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    /// Runs a fetch to completion on a private single-threaded runtime.
    ///
    /// Called from within a tokio runtime, this reports a -3 failure instead
    /// of blocking; use [`ConfigFetcher::fetch_async`] there.
    pub fn fetch(&self, request: &FetchRequest) -> FetchResult {
        if tokio::runtime::Handle::try_current().is_ok() {
            return self.report(
                request,
                Failure::Unexpected(
                    "blocking fetch called from within an async runtime; use fetch_async".into(),
                ),
            );
        }
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => return self.report(request, Failure::Unexpected(err.to_string())),
        };
        runtime.block_on(self.fetch_async(request))
    }

    /// Resolves the repository from the request URL and runs the fetch.
    pub async fn fetch_async(&self, request: &FetchRequest) -> FetchResult {
        info!(
            url = %request.url(),
            path = %request.path(),
            rev = %request.revision(),
            user = request.username().unwrap_or("<anonymous>"),
            "fetching file"
        );
        let url = match RepositoryUrl::parse(request.url()) {
            Ok(url) => url,
            Err(err) => return self.report(request, Failure::Repository(err)),
        };
        let client = RepositoryClient::connect(
            &url,
            request.username(),
            request.password(),
            &self.config,
        )
        .await;
        match client {
            Ok(mut client) => self.fetch_with(&mut client, request).await,
            Err(err) => self.report(request, Failure::Repository(err)),
        }
    }

    /// Runs the fetch against an already opened client.
    pub async fn fetch_with<C>(&self, client: &mut C, request: &FetchRequest) -> FetchResult
    where
        C: VersionControlClient,
    {
        match self.fetch_file(client, request).await {
            Ok(result) => {
                debug!(
                    path = %request.path(),
                    status = %result.status,
                    message = %result.message,
                    "fetch finished"
                );
                result
            }
            Err(err) => self.report(request, Failure::Repository(err)),
        }
    }

    /// Named-parameter entry point for hosts: returns `content`, `revision`,
    /// `attributes`, `returnResult` and `resultMessage`.
    pub fn read(
        &self,
        username: Option<&str>,
        password: Option<&str>,
        repository: &str,
        file: Option<&str>,
        revision: Option<&str>,
    ) -> BTreeMap<String, String> {
        let mut request = FetchRequest::new(repository, file.unwrap_or_default());
        if let Some(username) = username {
            request = request.with_username(username);
        }
        if let Some(password) = password {
            request = request.with_password(password);
        }
        if let Some(revision) = revision {
            request = request.with_revision(revision);
        }
        self.fetch(&request).outputs()
    }

    async fn fetch_file<C>(
        &self,
        client: &mut C,
        request: &FetchRequest,
    ) -> Result<FetchResult, SvnError>
    where
        C: VersionControlClient,
    {
        let path = request.path();
        let revision = request.revision();

        let kind = client.probe(path, revision).await?;
        let message = match kind {
            NodeKind::File => None,
            NodeKind::None => Some("There is no entry."),
            NodeKind::Dir => Some("The entry is a directory while a file was expected."),
            NodeKind::Unknown => Some("The entry is unknown."),
        };
        if let Some(message) = message {
            debug!(path = %path, rev = %revision, kind = %kind, "not a file");
            return Ok(FetchResult::failure(
                StatusCode::NotAFile,
                format!("{path}: {message}"),
            ));
        }

        let file = client.fetch(path, revision).await?;
        if !has_text_mime_type(&file.props) {
            debug!(path = %path, rev = file.rev, "rejecting non-text file");
            return Ok(FetchResult::failure(StatusCode::NotText, "not a text file"));
        }

        let served = file
            .props
            .get(ENTRY_REVISION)
            .map(|value| String::from_utf8_lossy(value).into_owned())
            .unwrap_or_else(|| file.rev.to_string());
        let attributes = serialize_attributes(&file.props, self.config.attribute_encoding());
        Ok(FetchResult {
            status: StatusCode::Success,
            message: "content available".to_string(),
            content: Some(file.contents),
            revision: Some(served),
            attributes: Some(attributes),
        })
    }

    fn report(&self, request: &FetchRequest, failure: Failure) -> FetchResult {
        let message = match failure {
            Failure::Repository(err) if err.is_auth_failure() => {
                warn!(url = %request.url(), error = %err, "authentication rejected");
                "wrong authentication".to_string()
            }
            Failure::Repository(err) => {
                warn!(url = %request.url(), error = %err, "repository access failed");
                format!(
                    "error while creating an SVNRepository for the location '{}': {err}",
                    request.url()
                )
            }
            Failure::Unexpected(err) => {
                warn!(url = %request.url(), error = %err, "fetch failed");
                format!("something is wrong: {err}")
            }
        };
        FetchResult::failure(StatusCode::Failure, message)
    }
}
