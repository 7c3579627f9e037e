//! Fetch one text file and its properties from a Subversion repository.
//!
//! [`ConfigFetcher`] connects to a repository, checks that the path names a
//! file at the requested revision, fetches its contents and properties, and
//! reports the outcome as a [`FetchResult`] with a fixed status code:
//!
//! | Code | Meaning |
//! |---|---|
//! | `0` | content available |
//! | `-1` | the path is missing, a directory, or of unknown kind |
//! | `-2` | the file's `svn:mime-type` is not text |
//! | `-3` | transport, authentication or unexpected failure |
//!
//! ## Getting started
//!
//! ```rust,no_run
//! use std::io::Write;
//!
//! use svnread::{ConfigFetcher, FetchRequest, FetcherConfig};
//!
//! fn main() -> svnread::Result<()> {
//!     let fetcher = ConfigFetcher::new(FetcherConfig::from_env()?);
//!     let request = FetchRequest::new("svn://svn.example.com/repo", "conf/app.properties")
//!         .with_username("deploy")
//!         .with_password("secret")
//!         .with_revision("1234");
//!
//!     let result = fetcher.fetch(&request);
//!     if result.is_success() {
//!         println!("r{}", result.revision.unwrap_or_default());
//!         std::io::stdout().write_all(&result.content.unwrap_or_default())?;
//!     } else {
//!         eprintln!("{}: {}", result.status, result.message);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Transports
//!
//! - `svn://` is spoken natively ([`RaSvnClient`]), with the `ANONYMOUS`,
//!   `PLAIN` and `CRAM-MD5` authentication mechanisms.
//! - `http://`, `https://`, `svn+ssh://` and `file://` go through the `svn`
//!   command-line client ([`SvnCommandClient`]), which must be installed.
//!
//! Both implement [`VersionControlClient`]; [`ConfigFetcher::fetch_with`]
//! runs the fetch against any implementation.
//!
//! ## Features
//!
//! - `serde`: enables `Serialize`/`Deserialize` for public data types.

#![deny(unsafe_code)]

mod client;
mod command;
mod config;
mod error;
mod fetcher;
mod path;
pub mod props;
mod rasvn;
mod revision;
mod types;
mod url;
mod vcs;

pub use client::{RaSvnClient, RaSvnSession};
pub use command::SvnCommandClient;
pub use config::FetcherConfig;
pub use error::{ServerError, ServerErrorItem, SvnError};
pub use fetcher::{
    ConfigFetcher, FetchRequest, FetchResult, OUTPUT_ATTRIBUTES, OUTPUT_CONTENT,
    OUTPUT_RESULT_MESSAGE, OUTPUT_RETURN_RESULT, OUTPUT_REVISION, StatusCode,
};
pub use props::AttributeEncoding;
pub use revision::Revision;
pub use types::{FetchedFile, NodeKind, PropertyList, RepositoryInfo, ServerInfo};
pub use url::{RepositoryUrl, SvnUrl, Transport};
pub use vcs::{RepositoryClient, VersionControlClient};

/// Convenience alias for results returned by this crate.
pub type Result<T> = std::result::Result<T, SvnError>;
