use std::process::ExitCode;

use clap::Parser;
use tracing::debug;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use svnread::{AttributeEncoding, ConfigFetcher, FetchRequest, FetcherConfig};

/// Fetch one text file and its properties from a Subversion repository.
///
/// Prints `content`, `revision`, `attributes`, `returnResult` and
/// `resultMessage` as a JSON object on stdout.
#[derive(Parser)]
#[command(name = "svnread", version, about)]
struct CliArgs {
    /// Repository URL (svn://, http://, https://, svn+ssh:// or file://).
    #[arg(long, env = "SVN_REPOSITORY")]
    repository: String,

    /// Path of the file below the repository URL.
    #[arg(long, env = "SVN_FILE", default_value = "")]
    file: String,

    /// Revision number; anything else reads the latest revision.
    #[arg(long, env = "SVN_REVISION")]
    revision: Option<String>,

    /// Username; anonymous access when omitted.
    #[arg(long, env = "SVN_USERNAME")]
    username: Option<String>,

    /// Password.
    #[arg(long, env = "SVN_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Escape keys and values in the attributes block as JSON strings.
    #[arg(long)]
    escape_attributes: bool,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    init_tracing(args.verbose);

    let mut config = match FetcherConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("svnread: {err}");
            return ExitCode::from(2);
        }
    };
    if args.escape_attributes {
        config = config.with_attribute_encoding(AttributeEncoding::Escaped);
    }

    let mut request = FetchRequest::new(args.repository, args.file);
    if let Some(username) = args.username {
        request = request.with_username(username);
    }
    if let Some(password) = args.password {
        request = request.with_password(password);
    }
    if let Some(revision) = args.revision {
        request = request.with_revision(revision);
    }
    debug!(?request, "parsed arguments");

    let result = ConfigFetcher::new(config).fetch_async(&request).await;
    match serde_json::to_string_pretty(&result.outputs()) {
        Ok(json) => println!("{json}"),
        Err(err) => {
            eprintln!("svnread: {err}");
            return ExitCode::FAILURE;
        }
    }
    if result.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .try_init();
}
