//! Backend that delegates to the `svn` command-line client.
//!
//! Used for `http://`, `https://`, `svn+ssh://` and `file://` repositories.
//! Every call spawns one `svn` process with `--non-interactive
//! --no-auth-cache`; the password, when present, is written to the child's
//! stdin (`--password-from-stdin`) so it never appears in the process list.

use std::collections::BTreeMap;
use std::fmt::Formatter;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use md5::{Digest, Md5};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::path::{join_url, validate_rel_dir_path, validate_rel_path};
use crate::props::{
    ENTRY_CHECKSUM, ENTRY_COMMITTED_DATE, ENTRY_COMMITTED_REV, ENTRY_LAST_AUTHOR, ENTRY_REVISION,
    ENTRY_UUID, EOL_STYLE,
};
use crate::{FetchedFile, NodeKind, PropertyList, RepositoryUrl, Revision, SvnError};

/// Error codes meaning "the target does not exist at that revision".
const MISSING_TARGET_CODES: &[&str] = &["E160013", "W160013", "W170000", "E200009"];
/// Error codes meaning "the server rejected the credentials".
const AUTH_FAILURE_CODES: &[&str] = &["E170001", "E215004"];

/// A [`crate::VersionControlClient`] backed by the `svn` executable.
#[derive(Clone)]
pub struct SvnCommandClient {
    program: PathBuf,
    base_url: RepositoryUrl,
    username: Option<String>,
    password: Option<String>,
    max_bytes: u64,
}

impl std::fmt::Debug for SvnCommandClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SvnCommandClient")
            .field("program", &self.program)
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("max_bytes", &self.max_bytes)
            .finish()
    }
}

impl SvnCommandClient {
    /// Creates a client for `base_url` running `program` (usually `svn`).
    pub fn new(
        program: impl Into<PathBuf>,
        base_url: RepositoryUrl,
        username: Option<String>,
        password: Option<String>,
    ) -> Self {
        Self {
            program: program.into(),
            base_url,
            username,
            password,
            max_bytes: u64::MAX,
        }
    }

    /// Sets the largest file, in bytes, that [`SvnCommandClient::get_file`] accepts.
    #[must_use]
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Returns the executable this client runs.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Returns the repository URL paths are resolved against.
    pub fn base_url(&self) -> &RepositoryUrl {
        &self.base_url
    }

    /// Runs `svn info` and returns the node kind at `path` and `rev`.
    ///
    /// A target that does not exist yields [`NodeKind::None`] instead of an
    /// error.
    pub async fn check_path(&self, path: &str, rev: Revision) -> Result<NodeKind, SvnError> {
        let path = validate_rel_dir_path(path)?;
        let target = self.target(&path, rev);
        let info = match self.run("info", &[target]).await {
            Ok(stdout) => parse_info(&String::from_utf8_lossy(&stdout)),
            Err(SvnError::Command { stderr, .. }) if is_missing_target(&stderr) => {
                debug!(path = %path, rev = %rev, "svn info: target does not exist");
                return Ok(NodeKind::None);
            }
            Err(err) => return Err(err),
        };
        let kind = info
            .get("Node Kind")
            .map_or(NodeKind::Unknown, |word| NodeKind::from_word(word));
        debug!(path = %path, rev = %rev, kind = %kind, "svn info");
        Ok(kind)
    }

    /// Fetches the contents and properties of the file at `path` and `rev`.
    ///
    /// The revision is resolved once through `svn info`; contents and
    /// properties are then read at that fixed revision so a commit landing in
    /// between cannot mix two revisions.
    ///
    /// Contents are returned as stored: keywords stay unexpanded and line
    /// endings translated by `svn cat` for `svn:eol-style` are turned back
    /// into LF. `svn:entry:checksum` is the MD5 of those bytes.
    pub async fn get_file(&self, path: &str, rev: Revision) -> Result<FetchedFile, SvnError> {
        let path = validate_rel_path(path)?;
        let info_out = self.run("info", &[self.target(&path, rev)]).await?;
        let info = parse_info(&String::from_utf8_lossy(&info_out));
        let served = info
            .get("Revision")
            .and_then(|raw| raw.parse::<u64>().ok())
            .ok_or_else(|| SvnError::Protocol("svn info did not report a revision".into()))?;
        let target = self.target(&path, Revision::Number(served));

        let mut contents = self.run("cat", &cat_args(&target)).await?;
        if contents.len() as u64 > self.max_bytes {
            return Err(SvnError::Protocol(format!(
                "file exceeds size limit of {} bytes",
                self.max_bytes
            )));
        }

        let names = self.run("proplist", &["-q".to_string(), target.clone()]).await?;
        let mut props = PropertyList::new();
        for name in parse_proplist_names(&String::from_utf8_lossy(&names)) {
            let value = self
                .run(
                    "propget",
                    &["--no-newline".to_string(), name.clone(), target.clone()],
                )
                .await?;
            props.insert(name, value);
        }
        if let Some(style) = props.get(EOL_STYLE) {
            contents = restore_stored_eol(contents, style);
        }
        let checksum = content_checksum(&contents);

        props.insert(ENTRY_REVISION.to_string(), served.to_string().into_bytes());
        props
            .entry(ENTRY_CHECKSUM.to_string())
            .or_insert_with(|| checksum.as_bytes().to_vec());
        let committed_rev = info.get("Last Changed Rev");
        if let Some(committed_rev) = committed_rev {
            props.insert(
                ENTRY_COMMITTED_REV.to_string(),
                committed_rev.clone().into_bytes(),
            );
        }
        if let Some(date) = self.committed_date(committed_rev, &info).await {
            props.insert(ENTRY_COMMITTED_DATE.to_string(), date.into_bytes());
        }
        if let Some(author) = info.get("Last Changed Author") {
            props.insert(ENTRY_LAST_AUTHOR.to_string(), author.clone().into_bytes());
        }
        if let Some(uuid) = info.get("Repository UUID") {
            props.insert(ENTRY_UUID.to_string(), uuid.clone().into_bytes());
        }
        debug!(path = %path, rev = served, bytes = contents.len(), props = props.len(), "svn cat");

        Ok(FetchedFile {
            rev: served,
            checksum: Some(checksum),
            props,
            contents,
        })
    }

    /// Reads the `svn:date` revision property of the last changed revision,
    /// which is the machine-readable form of `Last Changed Date`.
    async fn committed_date(
        &self,
        committed_rev: Option<&String>,
        info: &BTreeMap<String, String>,
    ) -> Option<String> {
        let fallback = || info.get("Last Changed Date").cloned();
        let Some(committed_rev) = committed_rev else {
            return fallback();
        };
        let args = [
            "--revprop".to_string(),
            "-r".to_string(),
            committed_rev.clone(),
            "--no-newline".to_string(),
            "svn:date".to_string(),
            self.base_url.as_str().to_string(),
        ];
        match self.run("propget", &args).await {
            Ok(date) if !date.is_empty() => Some(String::from_utf8_lossy(&date).into_owned()),
            Ok(_) => fallback(),
            Err(err) => {
                debug!(error = %err, "svn:date unavailable; using svn info date");
                fallback()
            }
        }
    }

    fn target(&self, path: &str, rev: Revision) -> String {
        format!("{}@{}", join_url(self.base_url.as_str(), path), rev.peg())
    }

    async fn run(&self, subcommand: &str, args: &[String]) -> Result<Vec<u8>, SvnError> {
        let mut cmd = Command::new(&self.program);
        cmd.arg(subcommand)
            .arg("--non-interactive")
            .arg("--no-auth-cache");
        if let Some(username) = self.username.as_deref() {
            cmd.arg("--username").arg(username);
        }
        if self.password.is_some() {
            cmd.arg("--password-from-stdin");
        }
        cmd.args(args)
            .env("LC_ALL", "C")
            .kill_on_drop(true)
            .stdin(if self.password.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(program = %self.program.display(), subcommand, ?args, "running svn");
        let mut child = cmd.spawn()?;
        if let Some(password) = self.password.as_deref()
            && let Some(mut stdin) = child.stdin.take()
        {
            stdin.write_all(password.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
        }
        let output = child.wait_with_output().await?;

        if output.status.success() {
            return Ok(output.stdout);
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        debug!(subcommand, status = %output.status, stderr = %stderr, "svn failed");
        if is_auth_failure(&stderr) {
            return Err(SvnError::AuthFailed(stderr));
        }
        Err(SvnError::Command {
            program: format!("svn {subcommand}"),
            status: output.status.to_string(),
            stderr,
        })
    }
}

/// Parses `Key: Value` lines printed by `svn info`.
fn parse_info(stdout: &str) -> BTreeMap<String, String> {
    stdout
        .lines()
        .filter_map(|line| line.split_once(": "))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect()
}

/// Parses the indented property names printed by `svn proplist -q`.
fn parse_proplist_names(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("Properties on "))
        .map(str::to_string)
        .collect()
}

/// Extracts `E123456` / `W123456` codes from `svn` error output.
fn error_codes(stderr: &str) -> Vec<&str> {
    stderr
        .lines()
        .filter_map(|line| {
            let rest = line.trim().strip_prefix("svn: ")?;
            let rest = rest.strip_prefix("warning: ").unwrap_or(rest);
            let (code, _) = rest.split_once(':')?;
            let bytes = code.as_bytes();
            let well_formed = bytes.len() == 7
                && matches!(bytes[0], b'E' | b'W')
                && bytes[1..].iter().all(u8::is_ascii_digit);
            well_formed.then_some(code)
        })
        .collect()
}

fn is_missing_target(stderr: &str) -> bool {
    let codes = error_codes(stderr);
    !codes.is_empty() && codes.iter().all(|code| MISSING_TARGET_CODES.contains(code))
}

fn is_auth_failure(stderr: &str) -> bool {
    let codes = error_codes(stderr);
    codes.iter().any(|code| AUTH_FAILURE_CODES.contains(code))
        || (codes.contains(&"E170013")
            && stderr.to_ascii_lowercase().contains("authorization failed"))
}

/// Arguments for `svn cat`. Keywords are left unexpanded so the bytes match
/// what the native transport returns.
fn cat_args(target: &str) -> Vec<String> {
    vec!["--ignore-keywords".to_string(), target.to_string()]
}

/// Undoes the line ending translation `svn cat` applies for `svn:eol-style`.
///
/// Files with an eol style are stored with LF endings.
fn restore_stored_eol(contents: Vec<u8>, style: &[u8]) -> Vec<u8> {
    let eol: &[u8] = match style.trim_ascii() {
        b"native" if cfg!(windows) => b"\r\n",
        b"CRLF" => b"\r\n",
        b"CR" => b"\r",
        _ => return contents,
    };
    let mut restored = Vec::with_capacity(contents.len());
    let mut rest = contents.as_slice();
    while !rest.is_empty() {
        if rest.starts_with(eol) {
            restored.push(b'\n');
            rest = &rest[eol.len()..];
        } else {
            restored.push(rest[0]);
            rest = &rest[1..];
        }
    }
    restored
}

fn content_checksum(contents: &[u8]) -> String {
    hex::encode(Md5::digest(contents))
}
