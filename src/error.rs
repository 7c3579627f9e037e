use thiserror::Error;

/// `SVN_ERR_RA_NOT_AUTHORIZED`
const SVN_ERR_RA_NOT_AUTHORIZED: u64 = 170001;
/// `SVN_ERR_AUTHN_FAILED`
const SVN_ERR_AUTHN_FAILED: u64 = 215004;
/// `SVN_ERR_AUTHZ_UNREADABLE`
const SVN_ERR_AUTHZ_UNREADABLE: u64 = 220001;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq)]
/// One error entry as returned by a server-side `failure` response.
pub struct ServerErrorItem {
    /// Subversion error code.
    pub code: u64,
    /// Human-readable error message (UTF-8, lossy-decoded).
    pub message: Option<String>,
    /// Source file on the server side, if provided.
    pub file: Option<String>,
    /// Source line on the server side, if provided.
    pub line: Option<u64>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq)]
/// A structured server error returned by `svnserve`.
///
/// `context` is the command that failed and `chain` is the server-provided
/// error stack, outermost first.
pub struct ServerError {
    /// High-level context for the failure (for example, the command name).
    pub context: Option<String>,
    /// The server-provided error chain.
    pub chain: Vec<ServerErrorItem>,
}

impl ServerError {
    /// Attaches additional context to this error.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Returns a single-line, human-readable message.
    pub fn message_summary(&self) -> String {
        let messages: Vec<&str> = self
            .chain
            .iter()
            .filter_map(|err| err.message.as_deref())
            .filter(|message| !message.is_empty())
            .collect();
        if messages.is_empty() {
            "unknown error".to_string()
        } else {
            messages.join("; ")
        }
    }

    /// Returns `true` if any entry in the chain carries the given error code.
    pub fn has_code(&self, code: u64) -> bool {
        self.chain.iter().any(|item| item.code == code)
    }
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ctx) = self.context.as_deref()
            && !ctx.is_empty()
        {
            write!(f, "{ctx}: ")?;
        }
        write!(f, "{}", self.message_summary())
    }
}

#[derive(Debug, Error)]
#[non_exhaustive]
/// Errors returned by this crate.
pub enum SvnError {
    /// The provided URL is syntactically invalid or uses an unsupported scheme.
    #[error("invalid svn url: {0}")]
    InvalidUrl(String),
    /// The provided repository path is invalid or unsafe.
    #[error("invalid path: {0}")]
    InvalidPath(String),
    /// A configuration value could not be used.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    /// An I/O error occurred while talking to the server or a child process.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The server response did not match the expected protocol shape.
    #[error("protocol error: {0}")]
    Protocol(String),
    /// The server requested authentication but offered no usable mechanism.
    #[error("auth required but no supported mechanism")]
    AuthUnavailable,
    /// Authentication failed (for example, invalid username/password).
    #[error("auth failed: {0}")]
    AuthFailed(String),
    /// The server returned a `failure` response.
    #[error("server error: {0}")]
    Server(ServerError),
    /// The `svn` command-line client exited unsuccessfully.
    #[error("{program} exited with {status}: {stderr}")]
    Command {
        /// Program and subcommand that failed (for example `svn cat`).
        program: String,
        /// Exit status as reported by the OS.
        status: String,
        /// Trimmed standard error output.
        stderr: String,
    },
}

impl SvnError {
    /// Returns `true` if this error means the server rejected our credentials.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            SvnError::AuthFailed(_) | SvnError::AuthUnavailable => true,
            SvnError::Server(server) => {
                server.has_code(SVN_ERR_RA_NOT_AUTHORIZED)
                    || server.has_code(SVN_ERR_AUTHN_FAILED)
                    || server.has_code(SVN_ERR_AUTHZ_UNREADABLE)
            }
            _ => false,
        }
    }
}
