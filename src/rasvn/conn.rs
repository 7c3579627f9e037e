use hmac::{Hmac, Mac};
use md5::Md5;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::types::Capability;
use crate::{RepositoryInfo, ServerError, ServerInfo, SvnError};

use super::SvnItem;
use super::parse::{parse_repos_info, parse_server_error};
use super::wire::{encode_command, encode_item};

type AuthMechanismChoice = (String, Option<Vec<u8>>);

/// Strings larger than this are read incrementally instead of being
/// preallocated from the length prefix.
const MAX_PREALLOC: usize = 1024 * 1024;

#[derive(Debug)]
pub(crate) struct CommandResponse {
    success: bool,
    params: Vec<SvnItem>,
    errors: Vec<SvnItem>,
}

impl CommandResponse {
    pub(crate) fn is_failure(&self) -> bool {
        !self.success
    }

    pub(crate) fn success_params(&self, ctx: &str) -> Result<&[SvnItem], SvnError> {
        if self.success {
            Ok(&self.params)
        } else {
            Err(self.failure(ctx))
        }
    }

    pub(crate) fn ensure_success(&self, ctx: &str) -> Result<(), SvnError> {
        self.success_params(ctx).map(|_| ())
    }

    pub(crate) fn failure(&self, ctx: &str) -> SvnError {
        SvnError::Server(self.failure_server_error().with_context(ctx))
    }

    pub(crate) fn failure_server_error(&self) -> ServerError {
        parse_server_error(&self.errors)
    }
}

pub(crate) struct RaSvnConnectionConfig {
    pub(crate) username: Option<String>,
    pub(crate) password: Option<String>,
    pub(crate) url: String,
    pub(crate) ra_client: String,
    pub(crate) read_timeout: Duration,
    pub(crate) write_timeout: Duration,
}

type DynRead = Box<dyn AsyncRead + Unpin + Send>;
type DynWrite = Box<dyn AsyncWrite + Unpin + Send>;

/// One `ra_svn` connection: buffered item reader, item writer and the
/// credentials used to answer the server's auth requests.
pub(crate) struct RaSvnConnection {
    read: DynRead,
    write: DynWrite,
    buf: Vec<u8>,
    pos: usize,
    write_buf: Vec<u8>,
    username: Option<String>,
    password: Option<String>,
    url: String,
    ra_client: String,
    read_timeout: Duration,
    write_timeout: Duration,
    server_caps: Vec<String>,
}

impl RaSvnConnection {
    pub(crate) fn new(read: DynRead, write: DynWrite, config: RaSvnConnectionConfig) -> Self {
        Self {
            read,
            write,
            buf: Vec::new(),
            pos: 0,
            write_buf: Vec::new(),
            username: config.username,
            password: config.password,
            url: config.url,
            ra_client: config.ra_client,
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
            server_caps: Vec::new(),
        }
    }

    pub(crate) fn server_has_cap(&self, cap: &str) -> bool {
        self.server_caps.iter().any(|c| c == cap)
    }

    pub(crate) async fn handshake(&mut self) -> Result<ServerInfo, SvnError> {
        let greeting = self.read_command_response().await?;
        let params = greeting.success_params("greeting")?;
        let [minver, maxver, _mechs, caps, ..] = params else {
            return Err(SvnError::Protocol("greeting params too short".into()));
        };
        let minver = minver
            .as_u64()
            .ok_or_else(|| SvnError::Protocol("invalid greeting minver".into()))?;
        let maxver = maxver
            .as_u64()
            .ok_or_else(|| SvnError::Protocol("invalid greeting maxver".into()))?;
        self.server_caps = caps
            .as_list()
            .unwrap_or_default()
            .iter()
            .filter_map(|c| c.as_word().map(str::to_string))
            .collect();
        debug!(minver, maxver, caps = ?self.server_caps, "received server greeting");
        if !(minver <= 2 && 2 <= maxver) {
            return Err(SvnError::Protocol(format!(
                "server does not support protocol v2 (min={minver}, max={maxver})"
            )));
        }
        if !self.server_has_cap(Capability::EditPipeline.as_wire_word()) {
            return Err(SvnError::Protocol(
                "server does not support edit pipelining".into(),
            ));
        }

        debug!(url = %self.url, ra_client = %self.ra_client, "sending client greeting response");
        let client_caps = [Capability::EditPipeline, Capability::Depth]
            .into_iter()
            .map(|cap| SvnItem::word(cap.as_wire_word()))
            .collect();
        let response = SvnItem::List(vec![
            SvnItem::Number(2),
            SvnItem::List(client_caps),
            SvnItem::string(&self.url),
            SvnItem::string(&self.ra_client),
            SvnItem::List(Vec::new()),
        ]);
        self.write_item(&response).await?;

        self.handle_auth_request().await?;

        let repos_info = self.read_command_response().await?;
        let repository: RepositoryInfo =
            parse_repos_info(repos_info.success_params("repos-info")?)?;
        for cap in &repository.capabilities {
            if !self.server_has_cap(cap) {
                self.server_caps.push(cap.clone());
            }
        }
        debug!(uuid = %repository.uuid, root = %repository.root_url, "handshake complete");
        Ok(ServerInfo {
            server_caps: self.server_caps.clone(),
            repository,
        })
    }

    /// Sends `command`, answers the auth request that precedes every
    /// command response, then reads the response itself.
    pub(crate) async fn call(
        &mut self,
        command: &str,
        params: SvnItem,
    ) -> Result<CommandResponse, SvnError> {
        self.send_command(command, params).await?;
        self.handle_auth_request().await?;
        self.read_command_response().await
    }

    pub(crate) async fn send_command(
        &mut self,
        command: &str,
        params: SvnItem,
    ) -> Result<(), SvnError> {
        self.write_buf.clear();
        encode_command(command, &params, &mut self.write_buf);
        self.write_buf.push(b'\n');

        let buf = std::mem::take(&mut self.write_buf);
        let result = self.write_wire_bytes(&buf).await;
        self.write_buf = buf;
        result
    }

    pub(crate) async fn handle_auth_request(&mut self) -> Result<(), SvnError> {
        let auth_req = self.read_command_response().await?;
        if auth_req.is_failure() {
            debug!(
                message = %auth_req.failure_server_error().message_summary(),
                "auth-request command response is failure"
            );
        }
        let params = auth_req.success_params("auth-request")?;
        let [mechs, realm, ..] = params else {
            return Err(SvnError::Protocol("auth-request params too short".into()));
        };
        let mechs = mechs
            .as_list()
            .ok_or_else(|| SvnError::Protocol("auth mechs not a list".into()))?;
        if mechs.is_empty() {
            return Ok(());
        }
        debug!(realm = %realm.as_wordish().unwrap_or_default(), "server requires authentication");

        let mech_words: Vec<String> = mechs
            .iter()
            .filter_map(|m| m.as_word().map(str::to_string))
            .collect();
        debug!(mechs = ?mech_words, "auth mechanisms offered");

        self.authenticate(&mech_words).await
    }

    async fn authenticate(&mut self, mechs: &[String]) -> Result<(), SvnError> {
        let mut last_failure = None::<String>;

        for (mech, initial) in self.select_mechs(mechs)? {
            debug!(mech = %mech, "trying auth mechanism");

            let token_tuple = match initial {
                Some(token) => SvnItem::List(vec![SvnItem::String(token)]),
                None => SvnItem::List(Vec::new()),
            };
            self.write_item(&SvnItem::List(vec![SvnItem::word(&mech), token_tuple]))
                .await?;

            loop {
                let challenge = self.read_item().await?;
                let Some(parts) = challenge.as_list() else {
                    return Err(SvnError::Protocol("invalid auth challenge".into()));
                };
                let Some(kind) = parts.first().and_then(SvnItem::as_word) else {
                    return Err(SvnError::Protocol("invalid auth challenge kind".into()));
                };
                let payload = parts
                    .get(1)
                    .and_then(SvnItem::as_list)
                    .and_then(<[SvnItem]>::first);
                match kind {
                    "step" => {
                        let token = payload
                            .and_then(SvnItem::as_bytes)
                            .ok_or_else(|| SvnError::Protocol("auth step missing token".into()))?;
                        let reply = self.auth_step_reply(&mech, token)?;
                        self.write_item(&SvnItem::String(reply)).await?;
                    }
                    "success" => {
                        debug!(mech = %mech, "authenticated");
                        return Ok(());
                    }
                    "failure" => {
                        let message = payload
                            .and_then(SvnItem::as_wordish)
                            .unwrap_or_else(|| "auth failed".to_string());
                        debug!(mech = %mech, message = %message, "auth mechanism failed");
                        last_failure = Some(message);
                        break;
                    }
                    other => {
                        return Err(SvnError::Protocol(format!(
                            "unexpected auth challenge: {other}"
                        )));
                    }
                }
            }
        }

        Err(SvnError::AuthFailed(
            last_failure.unwrap_or_else(|| "auth failed".to_string()),
        ))
    }

    /// Orders the offered mechanisms by preference: `CRAM-MD5`, then `PLAIN`
    /// when credentials are present, then `ANONYMOUS`.
    fn select_mechs(&self, mechs: &[String]) -> Result<Vec<AuthMechanismChoice>, SvnError> {
        let offered = |name: &str| mechs.iter().any(|m| m == name);
        let creds = match (&self.username, &self.password) {
            (Some(user), Some(pass)) if !user.trim().is_empty() => Some((user, pass)),
            _ => None,
        };

        let mut out = Vec::new();
        if let Some((user, pass)) = creds {
            if offered("CRAM-MD5") {
                out.push(("CRAM-MD5".to_string(), None));
            }
            if offered("PLAIN") {
                let mut token = Vec::with_capacity(user.len() + pass.len() + 2);
                token.push(0);
                token.extend_from_slice(user.as_bytes());
                token.push(0);
                token.extend_from_slice(pass.as_bytes());
                out.push(("PLAIN".to_string(), Some(token)));
            }
        }
        if offered("ANONYMOUS") {
            out.push(("ANONYMOUS".to_string(), Some(Vec::new())));
        }

        if out.is_empty() {
            Err(SvnError::AuthUnavailable)
        } else {
            Ok(out)
        }
    }

    fn auth_step_reply(&self, mech: &str, challenge: &[u8]) -> Result<Vec<u8>, SvnError> {
        match mech {
            "CRAM-MD5" => {
                let user = self
                    .username
                    .as_deref()
                    .ok_or_else(|| SvnError::AuthFailed("missing username".into()))?;
                let pass = self
                    .password
                    .as_deref()
                    .ok_or_else(|| SvnError::AuthFailed("missing password".into()))?;
                let mut mac = Hmac::<Md5>::new_from_slice(pass.as_bytes())
                    .map_err(|_| SvnError::Protocol("failed to create HMAC-MD5".into()))?;
                mac.update(challenge);
                let hex = hex::encode(mac.finalize().into_bytes());
                Ok(format!("{user} {hex}").into_bytes())
            }
            other => Err(SvnError::Protocol(format!(
                "unexpected auth step for {other}"
            ))),
        }
    }

    async fn write_wire_bytes(&mut self, bytes: &[u8]) -> Result<(), SvnError> {
        tokio::time::timeout(self.write_timeout, self.write.write_all(bytes))
            .await
            .map_err(|_| timed_out("write timed out"))??;
        self.write.flush().await?;
        Ok(())
    }

    async fn write_item(&mut self, item: &SvnItem) -> Result<(), SvnError> {
        self.write_buf.clear();
        encode_item(item, &mut self.write_buf);
        self.write_buf.push(b'\n');

        let buf = std::mem::take(&mut self.write_buf);
        let result = self.write_wire_bytes(&buf).await;
        self.write_buf = buf;
        result
    }

    pub(crate) async fn read_command_response(&mut self) -> Result<CommandResponse, SvnError> {
        let item = self.read_item().await?;
        let SvnItem::List(mut parts) = item else {
            return Err(SvnError::Protocol("command response not a list".into()));
        };
        if parts.is_empty() {
            return Err(SvnError::Protocol("empty command response".into()));
        }
        let body = if parts.len() > 1 {
            match parts.swap_remove(1) {
                SvnItem::List(items) => items,
                _ => Vec::new(),
            }
        } else {
            Vec::new()
        };
        match parts[0].as_word() {
            Some("success") => Ok(CommandResponse {
                success: true,
                params: body,
                errors: Vec::new(),
            }),
            Some("failure") => Ok(CommandResponse {
                success: false,
                params: Vec::new(),
                errors: body,
            }),
            Some(other) => Err(SvnError::Protocol(format!(
                "unexpected command response kind: {other}"
            ))),
            None => Err(SvnError::Protocol(
                "command response kind not a word".into(),
            )),
        }
    }

    pub(crate) async fn read_item(&mut self) -> Result<SvnItem, SvnError> {
        tokio::time::timeout(self.read_timeout, self.read_item_inner())
            .await
            .map_err(|_| timed_out("read timed out"))?
    }

    async fn read_item_inner(&mut self) -> Result<SvnItem, SvnError> {
        self.skip_ws().await?;
        if self.peek_byte().await? == b'(' {
            return self.read_list().await;
        }
        self.read_atom().await
    }

    async fn read_list(&mut self) -> Result<SvnItem, SvnError> {
        self.consume_byte().await?;
        self.require_ws().await?;

        let mut stack: Vec<Vec<SvnItem>> = vec![Vec::new()];
        loop {
            self.skip_ws().await?;
            match self.peek_byte().await? {
                b')' => {
                    self.consume_byte().await?;
                    self.require_ws().await?;

                    let completed = stack
                        .pop()
                        .ok_or_else(|| SvnError::Protocol("list stack underflow".into()))?;
                    let item = SvnItem::List(completed);
                    match stack.last_mut() {
                        Some(parent) => parent.push(item),
                        None => return Ok(item),
                    }
                }
                b'(' => {
                    self.consume_byte().await?;
                    self.require_ws().await?;
                    stack.push(Vec::new());
                }
                _ => {
                    let atom = self.read_atom().await?;
                    stack
                        .last_mut()
                        .ok_or_else(|| SvnError::Protocol("list stack underflow".into()))?
                        .push(atom);
                }
            }
        }
    }

    async fn read_atom(&mut self) -> Result<SvnItem, SvnError> {
        self.skip_ws().await?;
        match self.peek_byte().await? {
            b'0'..=b'9' => {
                let n = self.parse_digits().await?;
                if self.peek_byte().await? == b':' {
                    self.consume_byte().await?;
                    let len = usize::try_from(n)
                        .map_err(|_| SvnError::Protocol("string too long".into()))?;
                    let bytes = self.read_exact_vec(len).await?;
                    self.require_ws().await?;
                    Ok(SvnItem::String(bytes))
                } else {
                    self.require_ws().await?;
                    Ok(SvnItem::Number(n))
                }
            }
            _ => {
                let word = self.parse_word().await?;
                let item = match word.as_str() {
                    "true" => SvnItem::Bool(true),
                    "false" => SvnItem::Bool(false),
                    _ => SvnItem::Word(word),
                };
                self.require_ws().await?;
                Ok(item)
            }
        }
    }

    async fn read_exact_vec(&mut self, n: usize) -> Result<Vec<u8>, SvnError> {
        let mut out = Vec::with_capacity(n.min(MAX_PREALLOC));
        while out.len() < n {
            if self.pos < self.buf.len() {
                let take = (n - out.len()).min(self.buf.len() - self.pos);
                out.extend_from_slice(&self.buf[self.pos..self.pos + take]);
                self.pos += take;
            } else {
                self.fill().await?;
            }
        }
        Ok(out)
    }

    async fn fill(&mut self) -> Result<(), SvnError> {
        if self.pos > 0 {
            self.buf.drain(..self.pos);
            self.pos = 0;
        }
        let mut temp = [0u8; 16384];
        let n = self.read.read(&mut temp).await?;
        if n == 0 {
            return Err(SvnError::Protocol("unexpected EOF".into()));
        }
        self.buf.extend_from_slice(&temp[..n]);
        Ok(())
    }

    async fn peek_byte(&mut self) -> Result<u8, SvnError> {
        loop {
            if let Some(b) = self.buf.get(self.pos) {
                return Ok(*b);
            }
            self.fill().await?;
        }
    }

    async fn consume_byte(&mut self) -> Result<u8, SvnError> {
        let b = self.peek_byte().await?;
        self.pos += 1;
        Ok(b)
    }

    async fn skip_ws(&mut self) -> Result<(), SvnError> {
        while self.peek_byte().await?.is_ascii_whitespace() {
            self.pos += 1;
        }
        Ok(())
    }

    async fn require_ws(&mut self) -> Result<(), SvnError> {
        if self.consume_byte().await?.is_ascii_whitespace() {
            Ok(())
        } else {
            Err(SvnError::Protocol("expected whitespace".into()))
        }
    }

    async fn parse_digits(&mut self) -> Result<u64, SvnError> {
        let mut n = 0u64;
        loop {
            let b = self.peek_byte().await?;
            if !b.is_ascii_digit() {
                break;
            }
            self.pos += 1;
            n = n
                .checked_mul(10)
                .and_then(|v| v.checked_add(u64::from(b - b'0')))
                .ok_or_else(|| SvnError::Protocol("number overflow".into()))?;
        }
        Ok(n)
    }

    async fn parse_word(&mut self) -> Result<String, SvnError> {
        let mut bytes = Vec::new();
        loop {
            let b = self.peek_byte().await?;
            if b.is_ascii_whitespace() {
                break;
            }
            if matches!(b, b'(' | b')' | b':') {
                return Err(SvnError::Protocol("invalid word token".into()));
            }
            bytes.push(b);
            self.pos += 1;
        }
        String::from_utf8(bytes).map_err(|_| SvnError::Protocol("non-utf8 word".into()))
    }
}

fn timed_out(message: &'static str) -> SvnError {
    SvnError::Io(std::io::Error::new(std::io::ErrorKind::TimedOut, message))
}
