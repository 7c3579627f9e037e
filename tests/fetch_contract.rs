//! The fetch contract, exercised through the public API against a scripted
//! client and against an in-process fake `svnserve`.

#![allow(clippy::unwrap_used)]

use std::collections::BTreeMap;

use svnread::{
    AttributeEncoding, ConfigFetcher, FetchRequest, FetchedFile, FetcherConfig, NodeKind,
    PropertyList, Revision, StatusCode, SvnError, VersionControlClient,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// A repository held in memory: `path -> revision -> (props, contents)`.
#[derive(Default)]
struct MemoryRepo {
    head: u64,
    dirs: Vec<String>,
    files: BTreeMap<String, BTreeMap<u64, (PropertyList, Vec<u8>)>>,
    fetches: usize,
}

impl MemoryRepo {
    fn add(&mut self, path: &str, rev: u64, mime: Option<&str>, contents: &[u8]) {
        let mut props = PropertyList::new();
        if let Some(mime) = mime {
            props.insert("svn:mime-type".to_string(), mime.as_bytes().to_vec());
        }
        props.insert("owner".to_string(), b"ops".to_vec());
        self.files
            .entry(path.to_string())
            .or_default()
            .insert(rev, (props, contents.to_vec()));
        self.head = self.head.max(rev);
    }

    fn lookup(&self, path: &str, revision: Revision) -> Option<(u64, &(PropertyList, Vec<u8>))> {
        let rev = revision.number().unwrap_or(self.head);
        self.files
            .get(path)?
            .range(..=rev)
            .next_back()
            .map(|(_, entry)| (rev, entry))
    }
}

impl VersionControlClient for MemoryRepo {
    async fn probe(&mut self, path: &str, revision: Revision) -> Result<NodeKind, SvnError> {
        if self.dirs.iter().any(|dir| dir == path) {
            return Ok(NodeKind::Dir);
        }
        Ok(match self.lookup(path, revision) {
            Some(_) => NodeKind::File,
            None => NodeKind::None,
        })
    }

    async fn fetch(&mut self, path: &str, revision: Revision) -> Result<FetchedFile, SvnError> {
        self.fetches += 1;
        let (rev, (props, contents)) = self
            .lookup(path, revision)
            .ok_or_else(|| SvnError::Protocol(format!("no such file: {path}")))?;
        let mut props = props.clone();
        props.insert("svn:entry:revision".to_string(), rev.to_string().into_bytes());
        Ok(FetchedFile {
            rev,
            checksum: None,
            props,
            contents: contents.clone(),
        })
    }
}

fn repo() -> MemoryRepo {
    let mut repo = MemoryRepo {
        dirs: vec!["conf".to_string()],
        ..MemoryRepo::default()
    };
    repo.add("conf/app.properties", 3, Some("text/plain"), b"port=8080\n");
    repo.add("conf/app.properties", 7, Some("text/plain"), b"port=9090\n");
    repo.add("conf/notes.txt", 2, None, b"plain notes");
    repo.add("conf/logo.png", 4, Some("image/png"), b"\x89PNG");
    repo.add(
        "conf/menu.txt",
        5,
        Some("text/plain; charset=ISO-8859-1"),
        b"caf\xe9 $Id$\n",
    );
    repo
}

#[tokio::test]
async fn integer_revision_fetches_that_revision() {
    let mut repo = repo();
    let request = FetchRequest::new("svn://h/r", "conf/app.properties").with_revision("3");
    let result = ConfigFetcher::default().fetch_with(&mut repo, &request).await;
    assert_eq!(result.status, StatusCode::Success);
    assert_eq!(result.content.as_deref(), Some(b"port=8080\n".as_slice()));
    assert_eq!(result.revision.as_deref(), Some("3"));
}

#[tokio::test]
async fn unparseable_revision_fetches_latest() {
    let fetcher = ConfigFetcher::default();
    for spec in ["", "HEAD", "latest", "-1", "99999999999999999999999"] {
        let mut repo = repo();
        let request = FetchRequest::new("svn://h/r", "conf/app.properties").with_revision(spec);
        let result = fetcher.fetch_with(&mut repo, &request).await;
        assert_eq!(result.status, StatusCode::Success, "{spec:?}");
        assert_eq!(result.content.as_deref(), Some(b"port=9090\n".as_slice()), "{spec:?}");
        assert_eq!(result.revision.as_deref(), Some("7"), "{spec:?}");
    }
}

#[tokio::test]
async fn missing_and_directory_paths_do_not_fetch() {
    let fetcher = ConfigFetcher::default();
    let mut repo = repo();

    let missing = fetcher
        .fetch_with(&mut repo, &FetchRequest::new("svn://h/r", "conf/absent.xml"))
        .await;
    assert_eq!(missing.status.code(), -1);
    assert!(missing.message.contains("conf/absent.xml"));
    assert!(missing.message.contains("There is no entry"));

    let dir = fetcher
        .fetch_with(&mut repo, &FetchRequest::new("svn://h/r", "conf"))
        .await;
    assert_eq!(dir.status.code(), -1);
    assert!(dir.message.contains("directory while a file was expected"));

    let before_it_existed = fetcher
        .fetch_with(
            &mut repo,
            &FetchRequest::new("svn://h/r", "conf/logo.png").with_revision("1"),
        )
        .await;
    assert_eq!(before_it_existed.status, StatusCode::NotAFile);
    assert_eq!(repo.fetches, 0);
}

#[tokio::test]
async fn text_file_has_one_attribute_line_per_property() {
    let mut repo = repo();
    let result = ConfigFetcher::default()
        .fetch_with(&mut repo, &FetchRequest::new("svn://h/r", "conf/notes.txt"))
        .await;
    assert_eq!(result.status, StatusCode::Success);
    assert_eq!(result.message, "content available");
    assert_eq!(result.content.as_deref(), Some(b"plain notes".as_slice()));
    assert!(result.revision.as_deref().unwrap().parse::<u64>().is_ok());

    let attributes = result.attributes.unwrap();
    let lines: Vec<&str> = attributes.lines().collect();
    assert_eq!(lines.first(), Some(&"{"));
    assert_eq!(lines.last(), Some(&"}"));
    assert_eq!(lines.len(), 2 + 2);
    assert!(lines.contains(&"  \"owner\" : \"ops\","));
    assert!(lines.contains(&"  \"svn:entry:revision\" : \"7\""));
}

#[tokio::test]
async fn latin1_text_keeps_its_bytes() {
    let mut repo = repo();
    let result = ConfigFetcher::default()
        .fetch_with(&mut repo, &FetchRequest::new("svn://h/r", "conf/menu.txt"))
        .await;
    assert_eq!(result.status, StatusCode::Success);
    assert_eq!(result.content.as_deref(), Some(b"caf\xe9 $Id$\n".as_slice()));
    assert_eq!(result.outputs()["content"], "caf\u{fffd} $Id$\n");
}

#[tokio::test]
async fn binary_file_is_rejected() {
    let mut repo = repo();
    let result = ConfigFetcher::default()
        .fetch_with(&mut repo, &FetchRequest::new("svn://h/r", "conf/logo.png"))
        .await;
    assert_eq!(result.status.code(), -2);
    assert_eq!(result.message, "not a text file");
    let outputs = result.outputs();
    assert_eq!(outputs["content"], "");
    assert_eq!(outputs["attributes"], "");
    assert_eq!(outputs["returnResult"], "-2");
}

#[tokio::test]
async fn repeated_fetches_are_identical() {
    let fetcher = ConfigFetcher::new(
        FetcherConfig::default().with_attribute_encoding(AttributeEncoding::Escaped),
    );
    let request = FetchRequest::new("svn://h/r", "conf/app.properties");
    let first = fetcher.fetch_with(&mut repo(), &request).await;
    let second = fetcher.fetch_with(&mut repo(), &request).await;
    assert_eq!(first, second);
}

// A minimal `svnserve` that answers one connection: anonymous or CRAM-MD5
// handshake, then `check-path` and `get-file` from a fixed file table.

fn s(text: &str) -> String {
    format!("{}:{text} ", text.len())
}

async fn read_line(stream: &mut TcpStream) -> Vec<u8> {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    while stream.read(&mut byte).await.unwrap() == 1 && byte[0] != b'\n' {
        line.push(byte[0]);
    }
    line
}

async fn send(stream: &mut TcpStream, message: &str) {
    stream.write_all(format!("{message}\n").as_bytes()).await.unwrap();
}

async fn send_chunk(stream: &mut TcpStream, chunk: &[u8]) {
    let mut line = format!("{}:", chunk.len()).into_bytes();
    line.extend_from_slice(chunk);
    line.extend_from_slice(b" \n");
    stream.write_all(&line).await.unwrap();
}

const MENU: &[u8] = b"caf\xe9 $Id$\n";

const NO_AUTH: &str = "( success ( ( ) 5:realm ) ) ";

async fn serve(listener: TcpListener, require_auth: bool) {
    let (mut stream, _) = listener.accept().await.unwrap();
    let mechs = if require_auth { "CRAM-MD5" } else { "ANONYMOUS" };
    send(
        &mut stream,
        &format!("( success ( 2 2 ( {mechs} ) ( edit-pipeline depth ) ) ) "),
    )
    .await;
    read_line(&mut stream).await;

    if require_auth {
        send(&mut stream, "( success ( ( CRAM-MD5 ) 5:realm ) ) ").await;
        read_line(&mut stream).await;
        send(&mut stream, &format!("( step ( {}) ) ", s("<1.2@svnserve>"))).await;
        read_line(&mut stream).await;
        send(&mut stream, &format!("( failure ( {}) ) ", s("Password incorrect"))).await;
        return;
    }
    send(&mut stream, NO_AUTH).await;
    send(
        &mut stream,
        &format!(
            "( success ( {}{}( ) ) ) ",
            s("2d1b7c3e-uuid"),
            s("svn://127.0.0.1/repo")
        ),
    )
    .await;

    loop {
        let request = read_line(&mut stream).await;
        if request.is_empty() {
            return;
        }
        let text = String::from_utf8_lossy(&request).into_owned();
        send(&mut stream, NO_AUTH).await;
        if text.starts_with("( check-path ") {
            let kind = if text.contains("19:conf/app.properties") || text.contains("13:conf/menu.txt")
            {
                "file"
            } else if text.contains("4:conf") {
                "dir"
            } else {
                "none"
            };
            send(&mut stream, &format!("( success ( {kind} ) ) ")).await;
        } else if text.starts_with("( get-file ") && text.contains("13:conf/menu.txt") {
            send(
                &mut stream,
                &format!(
                    "( success ( ( {}) 12 ( ( {}{}) ) ) ) ",
                    s("16c347cdc7cbbb8099700cfb2420f6a0"),
                    s("svn:mime-type"),
                    s("text/plain; charset=ISO-8859-1")
                ),
            )
            .await;
            send_chunk(&mut stream, MENU).await;
            send(&mut stream, &s("")).await;
            send(&mut stream, "( success ( ) ) ").await;
        } else if text.starts_with("( get-file ") {
            send(
                &mut stream,
                &format!(
                    "( success ( ( {}) 12 ( ( {}{}) ) ) ) ",
                    s("15d7b699ef445e8718486c1acea86b75"),
                    s("svn:eol-style"),
                    s("native")
                ),
            )
            .await;
            send(&mut stream, &s("port=")).await;
            send(&mut stream, &s("8080\n")).await;
            send(&mut stream, &s("")).await;
            send(&mut stream, "( success ( ) ) ").await;
        } else {
            panic!("unexpected request: {text}");
        }
    }
}

#[tokio::test]
async fn fetches_over_the_native_transport() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("svn://{}/repo", listener.local_addr().unwrap());
    let server = tokio::spawn(serve(listener, false));

    let result = ConfigFetcher::default()
        .fetch_async(&FetchRequest::new(&url, "conf/app.properties").with_revision("12"))
        .await;
    assert_eq!(result.status, StatusCode::Success, "{}", result.message);
    assert_eq!(result.content.as_deref(), Some(b"port=8080\n".as_slice()));
    assert_eq!(result.revision.as_deref(), Some("12"));
    assert_eq!(
        result.attributes.as_deref(),
        Some(
            "{\n  \"svn:entry:checksum\" : \"15d7b699ef445e8718486c1acea86b75\",\
             \n  \"svn:entry:revision\" : \"12\",\
             \n  \"svn:eol-style\" : \"native\"\n}"
        )
    );
    server.await.unwrap();
}

#[tokio::test]
async fn native_transport_returns_raw_bytes() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("svn://{}/repo", listener.local_addr().unwrap());
    let server = tokio::spawn(serve(listener, false));

    let result = ConfigFetcher::default()
        .fetch_async(&FetchRequest::new(&url, "conf/menu.txt"))
        .await;
    assert_eq!(result.status, StatusCode::Success, "{}", result.message);
    assert_eq!(result.content.as_deref(), Some(MENU));
    assert!(
        result
            .attributes
            .unwrap()
            .contains("\"svn:entry:checksum\" : \"16c347cdc7cbbb8099700cfb2420f6a0\"")
    );
    server.await.unwrap();
}

#[tokio::test]
async fn directory_over_the_native_transport() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("svn://{}/repo", listener.local_addr().unwrap());
    let server = tokio::spawn(serve(listener, false));

    let result = ConfigFetcher::default()
        .fetch_async(&FetchRequest::new(&url, "conf"))
        .await;
    assert_eq!(result.status, StatusCode::NotAFile);
    assert_eq!(
        result.message,
        "conf: The entry is a directory while a file was expected."
    );
    server.await.unwrap();
}

#[tokio::test]
async fn rejected_credentials_are_wrong_authentication() {
    for _ in 0..2 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("svn://{}/repo", listener.local_addr().unwrap());
        let server = tokio::spawn(serve(listener, true));

        let request = FetchRequest::new(&url, "conf/app.properties")
            .with_username("alice")
            .with_password("wrong");
        let result = ConfigFetcher::default().fetch_async(&request).await;
        assert_eq!(result.status, StatusCode::Failure);
        assert_eq!(result.message, "wrong authentication");
        server.await.unwrap();
    }
}

#[tokio::test]
async fn unreachable_server_names_the_location() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("svn://{}/repo", listener.local_addr().unwrap());
    drop(listener);

    let result = ConfigFetcher::default()
        .fetch_async(&FetchRequest::new(&url, "conf/app.properties"))
        .await;
    assert_eq!(result.status.code(), -3);
    assert!(
        result.message.starts_with(&format!(
            "error while creating an SVNRepository for the location '{url}': "
        )),
        "{}",
        result.message
    );
}
