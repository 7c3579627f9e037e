//! Optional interoperability tests against a real repository.
//!
//! These tests are opt-in: set `SVN_INTEROP=1` and ensure `svnadmin`, `svnserve`,
//! and `svn` are available on `PATH`.

#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]

use std::io::Write;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use svnread::{ConfigFetcher, FetchRequest, FetchResult, StatusCode};

fn interop_enabled() -> bool {
    matches!(
        std::env::var("SVN_INTEROP").as_deref(),
        Ok("1") | Ok("true") | Ok("TRUE") | Ok("yes") | Ok("YES")
    )
}

fn command_exists(cmd: &str) -> bool {
    Command::new(cmd)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok()
}

fn run_checked(program: &str, args: &[&str], cwd: Option<&Path>) {
    let mut cmd = Command::new(program);
    cmd.args(args).stdin(Stdio::null());
    if let Some(cwd) = cwd {
        cmd.current_dir(cwd);
    }
    let out = cmd.output().unwrap();
    if !out.status.success() {
        panic!(
            "{program} {:?} failed: {}\nstdout:\n{}\nstderr:\n{}",
            args,
            out.status,
            String::from_utf8_lossy(&out.stdout),
            String::from_utf8_lossy(&out.stderr)
        );
    }
}

fn file_url(path: &Path) -> String {
    let canonical = path.canonicalize().unwrap();
    let s = canonical.to_string_lossy().replace('\\', "/");
    if s.starts_with('/') {
        format!("file://{s}")
    } else {
        format!("file:///{s}")
    }
}

struct SvnserveFixture {
    _tmp: tempfile::TempDir,
    port: u16,
    repo_file_url: String,
    svnserve: Child,
    svnserve_stderr_log: std::path::PathBuf,
}

impl Drop for SvnserveFixture {
    fn drop(&mut self) {
        let _ = self.svnserve.kill();
        let _ = self.svnserve.wait();
    }
}

impl SvnserveFixture {
    fn url(&self) -> String {
        format!("svn://127.0.0.1:{}/repo", self.port)
    }

    fn wait_ready(&mut self) {
        for _ in 0..200 {
            if let Ok(Some(status)) = self.svnserve.try_wait() {
                let stderr = std::fs::read_to_string(&self.svnserve_stderr_log)
                    .unwrap_or_else(|_| "<failed to read svnserve stderr log>".to_string());
                panic!("svnserve exited early: {status}\nstderr:\n{stderr}");
            }
            if std::net::TcpStream::connect(("127.0.0.1", self.port)).is_ok() {
                return;
            }
            std::thread::sleep(Duration::from_millis(25));
        }

        let stderr = std::fs::read_to_string(&self.svnserve_stderr_log)
            .unwrap_or_else(|_| "<failed to read svnserve stderr log>".to_string());
        panic!(
            "svnserve did not become ready on port {}\nstderr:\n{}",
            self.port, stderr
        );
    }
}

/// Creates a repository with two revisions:
///
/// - r1 imports `trunk/hello.txt` (`hello\n`) and `trunk/logo.png`;
/// - r2 changes `hello.txt` to `hello again\n`, marks `logo.png` as
///   `image/png`, and adds `keywords.txt` (`$Id$` with `svn:keywords Id`),
///   `latin1.txt` (ISO-8859-1 bytes) and `crlf.txt` (`svn:eol-style CRLF`).
///
/// Anonymous access is disabled; `alice`/`secret` may read.
fn start_fixture() -> SvnserveFixture {
    for bin in ["svnadmin", "svnserve", "svn"] {
        if !command_exists(bin) {
            panic!("{bin} is required for interop tests");
        }
    }

    let tmp = tempfile::TempDir::new().unwrap();
    let root = tmp.path().join("root");
    std::fs::create_dir_all(&root).unwrap();
    let repo = root.join("repo");
    run_checked("svnadmin", &["create", repo.to_str().unwrap()], None);

    let conf = repo.join("conf");
    let mut svnserve_conf = std::fs::File::create(conf.join("svnserve.conf")).unwrap();
    writeln!(svnserve_conf, "[general]").unwrap();
    writeln!(svnserve_conf, "anon-access = none").unwrap();
    writeln!(svnserve_conf, "auth-access = read").unwrap();
    writeln!(svnserve_conf, "password-db = passwd").unwrap();
    writeln!(svnserve_conf, "realm = svnread-test").unwrap();

    let mut passwd = std::fs::File::create(conf.join("passwd")).unwrap();
    writeln!(passwd, "[users]").unwrap();
    writeln!(passwd, "alice = secret").unwrap();

    let import_dir = tmp.path().join("import");
    std::fs::create_dir_all(import_dir.join("trunk")).unwrap();
    std::fs::write(import_dir.join("trunk/hello.txt"), b"hello\n").unwrap();
    std::fs::write(import_dir.join("trunk/logo.png"), b"\x89PNG\r\n").unwrap();

    let repo_file_url = file_url(&repo);
    run_checked(
        "svn",
        &[
            "import",
            import_dir.to_str().unwrap(),
            repo_file_url.as_str(),
            "-m",
            "init",
            "--non-interactive",
            "--no-auto-props",
        ],
        None,
    );

    let wc = tmp.path().join("wc");
    run_checked(
        "svn",
        &[
            "checkout",
            &format!("{repo_file_url}/trunk"),
            wc.to_str().unwrap(),
            "--non-interactive",
        ],
        None,
    );
    std::fs::write(wc.join("hello.txt"), b"hello again\n").unwrap();
    run_checked(
        "svn",
        &["propset", "svn:mime-type", "image/png", "logo.png"],
        Some(&wc),
    );
    std::fs::write(wc.join("keywords.txt"), b"$Id$\n").unwrap();
    std::fs::write(wc.join("latin1.txt"), b"caf\xe9\n").unwrap();
    std::fs::write(wc.join("crlf.txt"), b"one\ntwo\n").unwrap();
    run_checked(
        "svn",
        &["add", "--no-auto-props", "keywords.txt", "latin1.txt", "crlf.txt"],
        Some(&wc),
    );
    run_checked("svn", &["propset", "svn:keywords", "Id", "keywords.txt"], Some(&wc));
    run_checked(
        "svn",
        &["propset", "svn:mime-type", "text/plain; charset=ISO-8859-1", "latin1.txt"],
        Some(&wc),
    );
    run_checked("svn", &["propset", "svn:eol-style", "CRLF", "crlf.txt"], Some(&wc));
    run_checked(
        "svn",
        &["commit", "-m", "second", "--non-interactive"],
        Some(&wc),
    );

    let listener = std::net::TcpListener::bind(("127.0.0.1", 0)).unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let svnserve_stderr_log = tmp.path().join("svnserve.stderr.log");
    let log = std::fs::File::create(&svnserve_stderr_log).unwrap();
    let log_err = log.try_clone().unwrap();
    let child = Command::new("svnserve")
        .arg("-d")
        .arg("--foreground")
        .arg("-r")
        .arg(&root)
        .arg("--listen-host")
        .arg("127.0.0.1")
        .arg("--listen-port")
        .arg(port.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::from(log))
        .stderr(Stdio::from(log_err))
        .spawn()
        .unwrap();

    let mut fixture = SvnserveFixture {
        _tmp: tmp,
        port,
        repo_file_url,
        svnserve: child,
        svnserve_stderr_log,
    };
    fixture.wait_ready();
    fixture
}

fn fetch(url: &str, path: &str, revision: Option<&str>) -> FetchResult {
    let mut request = FetchRequest::new(url, path)
        .with_username("alice")
        .with_password("secret");
    if let Some(revision) = revision {
        request = request.with_revision(revision);
    }
    ConfigFetcher::default().fetch(&request)
}

fn assert_fetch_contract(url: &str) {
    let head = fetch(url, "trunk/hello.txt", None);
    assert_eq!(head.status, StatusCode::Success, "{}", head.message);
    assert_eq!(head.content.as_deref(), Some(b"hello again\n".as_slice()));
    assert_eq!(head.revision.as_deref(), Some("2"));
    let attributes = head.attributes.clone().unwrap();
    assert!(attributes.contains("\"svn:entry:revision\" : \"2\""), "{attributes}");
    assert!(
        attributes.contains("\"svn:entry:checksum\" : \"90f4dd73d11e55a3d19b4bd8e4ad1bdb\""),
        "{attributes}"
    );

    let first = fetch(url, "trunk/hello.txt", Some("1"));
    assert_eq!(first.status, StatusCode::Success, "{}", first.message);
    assert_eq!(first.content.as_deref(), Some(b"hello\n".as_slice()));
    assert_eq!(first.revision.as_deref(), Some("1"));

    let lenient = fetch(url, "trunk/hello.txt", Some("tip"));
    assert_eq!(lenient.content.as_deref(), Some(b"hello again\n".as_slice()));

    assert_eq!(fetch(url, "trunk/hello.txt", None), head);

    let missing = fetch(url, "trunk/nope.txt", None);
    assert_eq!(missing.status, StatusCode::NotAFile);
    assert_eq!(missing.message, "trunk/nope.txt: There is no entry.");

    let dir = fetch(url, "trunk", None);
    assert_eq!(dir.status, StatusCode::NotAFile);
    assert!(dir.message.contains("directory while a file was expected"));

    let binary = fetch(url, "trunk/logo.png", None);
    assert_eq!(binary.status, StatusCode::NotText);
    assert_eq!(binary.content, None);

    let old_binary = fetch(url, "trunk/logo.png", Some("1"));
    assert_eq!(old_binary.status, StatusCode::Success, "{}", old_binary.message);

    for (path, stored, md5) in [
        (
            "trunk/keywords.txt",
            b"$Id$\n".as_slice(),
            "60d2445f39ed500fe763b26bb19f06d3",
        ),
        (
            "trunk/latin1.txt",
            b"caf\xe9\n".as_slice(),
            "70941b2a2a6a84556c97b2a3220ef4be",
        ),
        (
            "trunk/crlf.txt",
            b"one\ntwo\n".as_slice(),
            "2094b601daac3d68f5aed51d3c20f7cd",
        ),
    ] {
        let result = fetch(url, path, None);
        assert_eq!(result.status, StatusCode::Success, "{path}: {}", result.message);
        assert_eq!(result.content.as_deref(), Some(stored), "{path}");
        let attributes = result.attributes.unwrap();
        assert!(
            attributes.contains(&format!("\"svn:entry:checksum\" : \"{md5}\"")),
            "{path}: {attributes}"
        );
    }
}

#[test]
fn interop_svnserve_fetch_contract() {
    if !interop_enabled() {
        return;
    }
    let fixture = start_fixture();
    assert_fetch_contract(&fixture.url());
}

#[test]
fn interop_command_line_fetch_contract() {
    if !interop_enabled() {
        return;
    }
    let fixture = start_fixture();
    assert_fetch_contract(&fixture.repo_file_url);
}

#[test]
fn interop_svnserve_rejects_bad_credentials() {
    if !interop_enabled() {
        return;
    }
    let fixture = start_fixture();
    let fetcher = ConfigFetcher::default();

    for _ in 0..2 {
        let request = FetchRequest::new(fixture.url(), "trunk/hello.txt")
            .with_username("alice")
            .with_password("wrong");
        let result = fetcher.fetch(&request);
        assert_eq!(result.status, StatusCode::Failure);
        assert_eq!(result.message, "wrong authentication");
    }

    let anonymous = fetcher.fetch(&FetchRequest::new(fixture.url(), "trunk/hello.txt"));
    assert_eq!(anonymous.status, StatusCode::Failure);
    assert_eq!(anonymous.message, "wrong authentication");
}
