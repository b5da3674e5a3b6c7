//! Concurrent session dispatcher.
//!
//! Owns the live connection once the handshake in [`crate::authentication`]
//! has produced an [`EncryptedSession`]: one task reads frames off the
//! socket and correlates replies to in-flight [`Dispatcher::invoke`] calls
//! by `msg_id`, a second task sends periodic keepalive pings, and outbound
//! writes from both `invoke` callers and the ping task are serialized
//! through a single mutex-guarded [`FrameWriter`].
//!
//! Transparent retry covers two server-initiated resets: a changed server
//! salt (`bad_server_salt`, `new_session_created`) rewinds every pending
//! waiter so it resends with the corrected session state, and a
//! `*_MIGRATE_n` RPC error reconnects to the named datacenter before
//! resending. Both count against a shared retry cap so a misbehaving
//! server can't wedge a caller into looping forever.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

use layer_tl_types::object::{self, Object};
use layer_tl_types::{Cursor, Deserializable, RemoteCall, Serializable};

use crate::authentication::{self, PublicKeys};
use crate::encrypted::EncryptedSession;
use crate::message::{Message, MessageId};
use crate::transport::{FrameReader, FrameWriter};

/// Requests are retried at most this many times before giving up, covering
/// both salt-rewind and datacenter-migration retries combined.
const MAX_RETRIES: u32 = 5;

/// How often the keepalive task pings the server.
const PING_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);

/// `disconnect_delay` sent with every ping: how long the server should wait
/// for a next ping before considering the connection dead.
const PING_DISCONNECT_DELAY: i32 = 75;

// ─── Errors ─────────────────────────────────────────────────────────────────

/// Failure modes surfaced by the dispatcher's public operations.
#[allow(missing_docs)]
#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Transport(crate::transport::Error),
    HandshakeFailed(authentication::Error),
    Decode(layer_tl_types::deserialize::Error),
    /// The server rejected the call with `rpc_error`.
    RpcError { code: i32, message: String },
    /// The server rejected the message envelope itself.
    BadMsg { code: i32 },
    /// The dispatcher was closed, or the retry cap was exhausted.
    Cancelled,
    /// A migration error named a datacenter not present in the configured
    /// [`DcList`].
    UnknownDc(i32),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::Transport(e) => write!(f, "transport error: {e}"),
            Self::HandshakeFailed(e) => write!(f, "handshake failed: {e}"),
            Self::Decode(e) => write!(f, "decode error: {e}"),
            Self::RpcError { code, message } => write!(f, "rpc error {code}: {message}"),
            Self::BadMsg { code } => write!(f, "bad_msg_notification, error_code {code}"),
            Self::Cancelled => write!(f, "request cancelled"),
            Self::UnknownDc(dc) => write!(f, "no address configured for dc {dc}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self { Self::Io(e) }
}
impl From<crate::transport::Error> for Error {
    fn from(e: crate::transport::Error) -> Self { Self::Transport(e) }
}
impl From<layer_tl_types::deserialize::Error> for Error {
    fn from(e: layer_tl_types::deserialize::Error) -> Self { Self::Decode(e) }
}

// ─── DC list injection ──────────────────────────────────────────────────────

/// Supplies datacenter addresses for migration, mirroring how
/// [`PublicKeys`] supplies RSA keys: the dispatcher never bundles
/// Telegram's real DC table, a caller hands in whatever it trusts.
///
/// IPv6-only datacenters aren't representable here — callers that need
/// them must resolve an IPv6 address through their own `DcList`
/// implementation; this crate only ever dials the string it's given.
pub trait DcList: Send + Sync {
    /// Return the `host:port` to dial for `dc_id`, if known.
    fn addr_for_dc(&self, dc_id: i32) -> Option<String>;
}

/// A fixed, in-memory `(dc_id, addr)` table.
#[derive(Clone, Default)]
pub struct StaticDcList(Vec<(i32, String)>);

impl StaticDcList {
    /// Build a DC list from explicit `(dc_id, addr)` pairs.
    pub fn new(entries: Vec<(i32, String)>) -> Self { Self(entries) }

    /// Build a DC list from decoded `dcOption` constructors, e.g. the table
    /// a `help.getConfig` response would carry. Entries with `this_port_only`
    /// or `cdn` set are skipped — this crate only dials the plain address,
    /// same restriction `DcList`'s docs already call out for IPv6-only DCs.
    pub fn from_dc_options(options: &[layer_tl_types::types::DcOption]) -> Self {
        let entries = options
            .iter()
            .filter(|o| !o.cdn && !o.this_port_only)
            .map(|o| (o.id, format!("{}:{}", o.ip_address, o.port)))
            .collect();
        Self(entries)
    }
}

impl DcList for StaticDcList {
    fn addr_for_dc(&self, dc_id: i32) -> Option<String> {
        self.0.iter().find(|(id, _)| *id == dc_id).map(|(_, a)| a.clone())
    }
}

impl<F: Fn(i32) -> Option<String> + Send + Sync> DcList for F {
    fn addr_for_dc(&self, dc_id: i32) -> Option<String> { self(dc_id) }
}

/// Persists and restores session state across process restarts.
///
/// No implementation ships with this crate — [`Dispatcher`] never touches
/// disk on its own. A caller that wants to resume a session implements this
/// against whatever storage it trusts and wires it in itself; the shape
/// exists so that kind of caller has something to implement against.
pub trait SessionStore: Send + Sync {
    /// Load a previously saved session, if any.
    fn load(&self) -> Option<crate::session::Session>;
    /// Persist the current session.
    fn save(&self, session: &crate::session::Session);
}

/// A decoded object offered to the custom handler chain, and whether a
/// handler consumed it (`true`) or it should fall through to the next one.
pub type UpdateHandler = Arc<dyn Fn(&Object) -> bool + Send + Sync>;

// ─── Configuration ──────────────────────────────────────────────────────────

/// Dispatcher construction parameters.
pub struct Config {
    /// `host:port` of the datacenter to dial initially.
    pub server_addr: String,
    /// Resolves `*_MIGRATE_n` errors to an address to reconnect to.
    pub dc_list: Arc<dyn DcList>,
    /// Resolves the server's RSA fingerprint during the handshake.
    pub public_keys: Arc<dyn PublicKeys + Send + Sync>,
    /// Bound on the warnings channel returned by [`Dispatcher::connect`].
    /// Warnings are dropped, not blocked on, once the channel is full.
    pub warn_channel_capacity: usize,
    /// Ordered callbacks offered any decoded object that isn't an RPC
    /// reply or a session-control message (salt change, ack, pong). The
    /// first handler to return `true` consumes it; if none do, a warning
    /// is emitted and the object is dropped.
    pub update_handlers: Vec<UpdateHandler>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: String::new(),
            dc_list: Arc::new(StaticDcList::default()),
            public_keys: Arc::new(authentication::StaticKeyRing::default()),
            warn_channel_capacity: 64,
            update_handlers: Vec::new(),
        }
    }
}

// ─── Internal plumbing ──────────────────────────────────────────────────────

/// What a pending [`Dispatcher::invoke`] call is woken with.
enum Signal {
    Reply(Vec<u8>),
    Rpc { code: i32, message: String },
    BadMsg(i32),
    /// Session state changed underneath the caller (salt rewind or a fresh
    /// connection after migration/reconnect) — resend against current state.
    Retry,
}

struct Shared {
    enc: Mutex<EncryptedSession>,
    writer: Mutex<FrameWriter<WriteHalf<TcpStream>>>,
    waiters: Mutex<HashMap<i64, oneshot::Sender<Signal>>>,
    closed: AtomicBool,
    warnings: mpsc::Sender<String>,
    handlers: Vec<UpdateHandler>,
}

impl Shared {
    fn warn(&self, message: String) {
        let _ = self.warnings.try_send(message);
    }

    async fn signal(&self, msg_id: i64, sig: Signal) {
        if let Some(tx) = self.waiters.lock().await.remove(&msg_id) {
            let _ = tx.send(sig);
        }
    }

    /// Wake every pending waiter so it resends against the session state
    /// current at the time it wakes, rather than the state it sent under.
    async fn retry_all(&self) {
        for (_, tx) in self.waiters.lock().await.drain() {
            let _ = tx.send(Signal::Retry);
        }
    }

    async fn send_ack(&self, msg_id: i64) {
        let wire = {
            let mut enc = self.enc.lock().await;
            enc.pack_serializable_unrelated(&layer_tl_types::functions::MsgsAck {
                msg_ids: vec![msg_id],
            })
        };
        let mut w = self.writer.lock().await;
        if let Err(e) = w.write_frame(&wire).await {
            self.warn(format!("ack send failed: {e}"));
        }
    }
}

fn gz_inflate(data: &[u8]) -> std::io::Result<Vec<u8>> {
    use std::io::Read;
    let mut out = Vec::new();
    flate2::read::GzDecoder::new(data).read_to_end(&mut out)?;
    Ok(out)
}

/// Recognizes the `PHONE_MIGRATE_n` / `NETWORK_MIGRATE_n` / `USER_MIGRATE_n`
/// error family and extracts the target DC id. A plain numeric suffix isn't
/// enough on its own — plenty of unrelated errors end in a number — so the
/// known prefixes are checked explicitly.
fn parse_migrate_dc(message: &str) -> Option<i32> {
    const PREFIXES: [&str; 3] = ["PHONE_MIGRATE_", "NETWORK_MIGRATE_", "USER_MIGRATE_"];
    PREFIXES.iter().find_map(|p| message.strip_prefix(p)?.parse().ok())
}

async fn rpc_plain<R: RemoteCall>(
    writer: &mut FrameWriter<WriteHalf<TcpStream>>,
    reader: &mut FrameReader<ReadHalf<TcpStream>>,
    req: &R,
) -> Result<R::Return, Error> {
    let msg = Message::plaintext(MessageId::generate(0), 0, req.to_bytes());
    writer.write_frame(&msg.to_plaintext_bytes()).await?;

    let frame = reader.read_frame().await?;
    if frame.len() < 20 {
        return Err(Error::Decode(layer_tl_types::deserialize::Error::UnexpectedEof));
    }
    let body_len = u32::from_le_bytes(frame[16..20].try_into().unwrap()) as usize;
    let body_end = 20 + body_len.min(frame.len() - 20);
    let mut cursor = Cursor::from_slice(&frame[20..body_end]);
    Ok(R::Return::deserialize(&mut cursor)?)
}

/// Dial `addr` and run the full sans-IO handshake over it, returning a
/// ready-to-use session plus the still-open reader/writer halves.
async fn connect_and_handshake(
    addr: &str,
    keys: &dyn PublicKeys,
) -> Result<(EncryptedSession, FrameReader<ReadHalf<TcpStream>>, FrameWriter<WriteHalf<TcpStream>>), Error> {
    let stream = TcpStream::connect(addr).await?;
    let (r, w) = tokio::io::split(stream);
    let mut reader = FrameReader::new(r);
    let mut writer = FrameWriter::new(w);

    let (req, s1) = authentication::step1().map_err(Error::HandshakeFailed)?;
    let resp = rpc_plain(&mut writer, &mut reader, &req).await?;
    let (req, s2) = authentication::step2(s1, resp, keys).map_err(Error::HandshakeFailed)?;
    let resp = rpc_plain(&mut writer, &mut reader, &req).await?;
    let (req, s3) = authentication::step3(s2, resp).map_err(Error::HandshakeFailed)?;
    let resp = rpc_plain(&mut writer, &mut reader, &req).await?;
    let finished = authentication::finish(s3, resp).map_err(Error::HandshakeFailed)?;

    let enc = EncryptedSession::new(finished.auth_key, finished.first_salt, finished.time_offset);
    Ok((enc, reader, writer))
}

/// Single decrypted message pulled off the wire or unwrapped from a
/// container, queued for dispatch. Containers and `gzip_packed` wrappers
/// feed more entries back into the same queue instead of recursing, since
/// an `async fn` can't call itself without boxing.
struct Pending {
    msg_id: i64,
    seq_no: i32,
    body: Vec<u8>,
}

async fn dispatch_one(shared: &Arc<Shared>, queue: &mut VecDeque<Pending>, item: Pending) {
    let Pending { msg_id, seq_no, body } = item;
    let mut cursor = Cursor::from_slice(&body);
    let obj = match object::decode_any(&mut cursor) {
        Ok(o) => o,
        Err(e) => {
            shared.warn(format!("malformed message {msg_id:#x}: {e}"));
            return;
        }
    };

    match obj {
        Object::MsgContainer(c) => {
            for m in c.messages {
                queue.push_back(Pending { msg_id: m.msg_id, seq_no: m.seq_no, body: m.body });
            }
            return; // the container itself carries no seq_no parity to ack
        }
        Object::GzipPacked(g) => {
            match gz_inflate(&g.packed_data) {
                Ok(inflated) => queue.push_back(Pending { msg_id, seq_no, body: inflated }),
                Err(e) => shared.warn(format!("gzip_packed inflate failed: {e}")),
            }
            // The re-queued (or dropped) entry carries the same msg_id/seq_no
            // forward; let its own pass through this function schedule the ack.
            return;
        }
        Object::RpcResult(r) => {
            let mut inner_cursor = Cursor::from_slice(&r.result);
            match object::decode_any(&mut inner_cursor) {
                Ok(Object::RpcError(e)) => {
                    shared.signal(r.req_msg_id, Signal::Rpc { code: e.error_code, message: e.error_message }).await;
                }
                Ok(Object::GzipPacked(g)) => match gz_inflate(&g.packed_data) {
                    Ok(inflated) => shared.signal(r.req_msg_id, Signal::Reply(inflated)).await,
                    Err(e) => shared.warn(format!("rpc_result gzip inflate failed: {e}")),
                },
                _ => shared.signal(r.req_msg_id, Signal::Reply(r.result)).await,
            }
        }
        Object::BadServerSalt(b) => {
            {
                let mut enc = shared.enc.lock().await;
                enc.salt = b.new_server_salt;
            }
            shared.retry_all().await;
        }
        Object::NewSessionCreated(n) => {
            let mut enc = shared.enc.lock().await;
            enc.salt = n.server_salt;
        }
        Object::BadMsgNotification(b) => {
            shared.signal(b.bad_msg_id, Signal::BadMsg(b.error_code)).await;
        }
        Object::Pong(_) | Object::MsgsAck(_) => {}
        Object::RpcError(e) => {
            shared.warn(format!("unsolicited rpc_error {}: {}", e.error_code, e.error_message));
        }
        Object::Unknown { tag, raw } => {
            let obj = Object::Unknown { tag, raw };
            if !shared.handlers.iter().any(|h| h(&obj)) {
                let Object::Unknown { tag, raw } = obj else { unreachable!() };
                shared.warn(format!("unhandled constructor {tag:#010x} ({} bytes)", raw.len()));
            }
        }
    }

    if seq_no & 1 != 0 {
        shared.send_ack(msg_id).await;
    }
}

async fn reader_loop(shared: Arc<Shared>, mut reader: FrameReader<ReadHalf<TcpStream>>) {
    let mut queue: VecDeque<Pending> = VecDeque::new();
    loop {
        if shared.closed.load(Ordering::Acquire) {
            return;
        }

        let mut frame = match reader.read_frame().await {
            Ok(f) => f,
            Err(e) => {
                shared.warn(format!("connection lost: {e}"));
                shared.retry_all().await;
                return;
            }
        };

        let decrypted = {
            let enc = shared.enc.lock().await;
            enc.unpack(&mut frame)
        };
        let msg = match decrypted {
            Ok(m) => m,
            Err(e) => {
                shared.warn(format!("failed to decrypt incoming frame: {e}"));
                continue;
            }
        };

        queue.push_back(Pending { msg_id: msg.msg_id, seq_no: msg.seq_no, body: msg.body });
        while let Some(item) = queue.pop_front() {
            dispatch_one(&shared, &mut queue, item).await;
        }
    }
}

async fn ping_loop(shared: Arc<Shared>) {
    let mut interval = tokio::time::interval(PING_INTERVAL);
    interval.tick().await; // the first tick fires immediately
    loop {
        interval.tick().await;
        if shared.closed.load(Ordering::Acquire) {
            return;
        }
        let mut rnd = [0u8; 8];
        if getrandom::getrandom(&mut rnd).is_err() {
            continue;
        }
        let wire = {
            let mut enc = shared.enc.lock().await;
            enc.pack(&layer_tl_types::functions::PingDelayDisconnect {
                ping_id: i64::from_le_bytes(rnd),
                disconnect_delay: PING_DISCONNECT_DELAY,
            })
        };
        let mut w = shared.writer.lock().await;
        // A failed ping is left for the reader task to notice and report;
        // reconnecting from here too would race it.
        if let Err(e) = w.write_frame(&wire).await {
            shared.warn(format!("ping send failed: {e}"));
        }
    }
}

// ─── Public handle ──────────────────────────────────────────────────────────

/// A live, running MTProto session.
///
/// Cheap to clone — every clone shares the same connection, correlation
/// table, and background tasks.
#[derive(Clone)]
pub struct Dispatcher {
    shared: Arc<Shared>,
    config: Arc<Config>,
    reader_task: Arc<Mutex<Option<JoinHandle<()>>>>,
    ping_task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Dispatcher {
    /// Dial `config.server_addr`, run the handshake, and start the
    /// reader/ping tasks.
    ///
    /// Returns the dispatcher plus a channel of free-text warnings about
    /// events with nowhere else to go (unsolicited replies, malformed
    /// frames, failed acks) — nothing fatal, but worth logging.
    pub async fn connect(config: Config) -> Result<(Self, mpsc::Receiver<String>), Error> {
        let config = Arc::new(config);
        let (enc, reader, writer) =
            connect_and_handshake(&config.server_addr, config.public_keys.as_ref()).await?;

        let (warn_tx, warn_rx) = mpsc::channel(config.warn_channel_capacity.max(1));
        let shared = Arc::new(Shared {
            enc: Mutex::new(enc),
            writer: Mutex::new(writer),
            waiters: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
            warnings: warn_tx,
            handlers: config.update_handlers.clone(),
        });

        let reader_task = tokio::spawn(reader_loop(shared.clone(), reader));
        let ping_task = tokio::spawn(ping_loop(shared.clone()));

        Ok((
            Self {
                shared,
                config,
                reader_task: Arc::new(Mutex::new(Some(reader_task))),
                ping_task: Arc::new(Mutex::new(Some(ping_task))),
            },
            warn_rx,
        ))
    }

    /// Send `call` and wait for its reply, transparently retrying on a
    /// session-salt rewind or a datacenter migration (up to
    /// [`MAX_RETRIES`] combined attempts).
    pub async fn invoke<R: RemoteCall>(&self, call: &R) -> Result<R::Return, Error> {
        let mut attempt = 0u32;
        loop {
            if self.shared.closed.load(Ordering::Acquire) {
                return Err(Error::Cancelled);
            }
            if attempt >= MAX_RETRIES {
                return Err(Error::Cancelled);
            }

            let (wire, msg_id) = {
                let mut enc = self.shared.enc.lock().await;
                enc.pack_with_msg_id(call)
            };

            let (tx, rx) = oneshot::channel();
            self.shared.waiters.lock().await.insert(msg_id, tx);

            {
                let mut w = self.shared.writer.lock().await;
                if let Err(e) = w.write_frame(&wire).await {
                    self.shared.waiters.lock().await.remove(&msg_id);
                    return Err(Error::Transport(e));
                }
            }

            match rx.await {
                Ok(Signal::Reply(bytes)) => {
                    let mut cursor = Cursor::from_slice(&bytes);
                    return Ok(R::Return::deserialize(&mut cursor)?);
                }
                Ok(Signal::Rpc { code, message }) => {
                    if let Some(dc) = parse_migrate_dc(&message) {
                        self.reconnect_to(dc).await?;
                        attempt += 1;
                        continue;
                    }
                    return Err(Error::RpcError { code, message });
                }
                Ok(Signal::BadMsg(code)) => return Err(Error::BadMsg { code }),
                Ok(Signal::Retry) => {
                    attempt += 1;
                    continue;
                }
                Err(_) => return Err(Error::Cancelled),
            }
        }
    }

    /// Reconnect to the originally configured address, replacing the
    /// session (and so the auth key — this is a fresh handshake, not a
    /// resume).
    pub async fn reconnect(&self) -> Result<(), Error> {
        let addr = self.config.server_addr.clone();
        self.reconnect_inner(addr).await
    }

    async fn reconnect_to(&self, dc_id: i32) -> Result<(), Error> {
        let addr = self
            .config
            .dc_list
            .addr_for_dc(dc_id)
            .ok_or(Error::UnknownDc(dc_id))?;
        self.reconnect_inner(addr).await
    }

    async fn reconnect_inner(&self, addr: String) -> Result<(), Error> {
        if let Some(h) = self.reader_task.lock().await.take() {
            h.abort();
        }
        if let Some(h) = self.ping_task.lock().await.take() {
            h.abort();
        }

        let (enc, reader, writer) =
            connect_and_handshake(&addr, self.config.public_keys.as_ref()).await?;

        *self.shared.enc.lock().await = enc;
        *self.shared.writer.lock().await = writer;
        self.shared.retry_all().await;

        *self.reader_task.lock().await = Some(tokio::spawn(reader_loop(self.shared.clone(), reader)));
        *self.ping_task.lock().await = Some(tokio::spawn(ping_loop(self.shared.clone())));

        Ok(())
    }

    /// Tear the session down. Any call still waiting on a reply resolves to
    /// [`Error::Cancelled`]; no further `invoke` succeeds.
    pub async fn close(&self) {
        self.shared.closed.store(true, Ordering::Release);
        if let Some(h) = self.reader_task.lock().await.take() {
            h.abort();
        }
        if let Some(h) = self.ping_task.lock().await.take() {
            h.abort();
        }
        self.shared.retry_all().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A `Shared` backed by a real loopback socket (so `FrameWriter` has
    /// somewhere to write) but no handshake — tests below exercise
    /// `dispatch_one`'s decoding/correlation logic directly, not the wire.
    async fn test_shared(handlers: Vec<UpdateHandler>) -> Arc<Shared> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (_server_side, _) = listener.accept().await.unwrap();
        let (_r, w) = tokio::io::split(client);

        let (warn_tx, _warn_rx) = mpsc::channel(16);
        Arc::new(Shared {
            enc: Mutex::new(EncryptedSession::new([9u8; 256], 1000, 0)),
            writer: Mutex::new(FrameWriter::new(w)),
            waiters: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
            warnings: warn_tx,
            handlers,
        })
    }

    fn encode_rpc_result(req_msg_id: i64, result: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend(0xf35c6d01u32.to_le_bytes());
        out.extend(req_msg_id.to_le_bytes());
        out.extend_from_slice(result);
        out
    }

    fn encode_bad_msg_notification(bad_msg_id: i64, bad_msg_seqno: i32, error_code: i32) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend(0xa7eff811u32.to_le_bytes());
        out.extend(bad_msg_id.to_le_bytes());
        out.extend(bad_msg_seqno.to_le_bytes());
        out.extend(error_code.to_le_bytes());
        out
    }

    fn encode_bad_server_salt(bad_msg_id: i64, bad_msg_seqno: i32, error_code: i32, new_salt: i64) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend(0xedab447bu32.to_le_bytes());
        out.extend(bad_msg_id.to_le_bytes());
        out.extend(bad_msg_seqno.to_le_bytes());
        out.extend(error_code.to_le_bytes());
        out.extend(new_salt.to_le_bytes());
        out
    }

    #[tokio::test]
    async fn rpc_result_wakes_only_its_own_waiter() {
        let shared = test_shared(Vec::new()).await;
        let (tx_a, mut rx_a) = oneshot::channel();
        let (tx_b, mut rx_b) = oneshot::channel();
        shared.waiters.lock().await.insert(1, tx_a);
        shared.waiters.lock().await.insert(2, tx_b);

        let mut queue = VecDeque::new();
        let body = encode_rpc_result(1, b"payload");
        dispatch_one(&shared, &mut queue, Pending { msg_id: 500, seq_no: 2, body }).await;

        match rx_a.try_recv() {
            Ok(Signal::Reply(bytes)) => assert_eq!(bytes, b"payload"),
            _ => panic!("expected Reply for waiter 1"),
        }
        assert!(rx_b.try_recv().is_err(), "waiter 2 must not be woken");
    }

    #[tokio::test]
    async fn container_dispatches_each_child_to_its_own_waiter() {
        let shared = test_shared(Vec::new()).await;
        let (tx_a, mut rx_a) = oneshot::channel();
        shared.waiters.lock().await.insert(10, tx_a);

        let inner = object::ContainerMessage {
            msg_id: 777,
            seq_no: 2,
            body: encode_rpc_result(10, b"inner-reply"),
        };
        let container = object::MsgContainer { messages: vec![inner] };
        let mut body_buf = Vec::new();
        body_buf.extend(0x73f1f8dcu32.to_le_bytes());
        container.serialize(&mut body_buf);

        let mut queue = VecDeque::new();
        dispatch_one(&shared, &mut queue, Pending { msg_id: 1, seq_no: 2, body: body_buf }).await;
        // The container itself doesn't ack; its child is still queued.
        assert_eq!(queue.len(), 1);
        let child = queue.pop_front().unwrap();
        dispatch_one(&shared, &mut queue, child).await;

        match rx_a.try_recv() {
            Ok(Signal::Reply(bytes)) => assert_eq!(bytes, b"inner-reply"),
            _ => panic!("expected Reply"),
        }
    }

    #[tokio::test]
    async fn bad_server_salt_updates_salt_and_retries_all_waiters() {
        let shared = test_shared(Vec::new()).await;
        let (tx_a, rx_a) = oneshot::channel();
        let (tx_b, rx_b) = oneshot::channel();
        shared.waiters.lock().await.insert(1, tx_a);
        shared.waiters.lock().await.insert(2, tx_b);

        let body = encode_bad_server_salt(1, 1, 48, 0xAABBCCDD);
        let mut queue = VecDeque::new();
        dispatch_one(&shared, &mut queue, Pending { msg_id: 42, seq_no: 2, body }).await;

        assert_eq!(shared.enc.lock().await.salt, 0xAABBCCDDu32 as i64);
        assert!(matches!(rx_a.await, Ok(Signal::Retry)));
        assert!(matches!(rx_b.await, Ok(Signal::Retry)));
    }

    #[tokio::test]
    async fn bad_msg_notification_signals_named_waiter_only() {
        let shared = test_shared(Vec::new()).await;
        let (tx_a, mut rx_a) = oneshot::channel();
        let (tx_b, mut rx_b) = oneshot::channel();
        shared.waiters.lock().await.insert(1, tx_a);
        shared.waiters.lock().await.insert(2, tx_b);

        let body = encode_bad_msg_notification(1, 1, 16);
        let mut queue = VecDeque::new();
        dispatch_one(&shared, &mut queue, Pending { msg_id: 42, seq_no: 2, body }).await;

        assert!(matches!(rx_a.try_recv(), Ok(Signal::BadMsg(16))));
        assert!(rx_b.try_recv().is_err(), "unrelated waiter must not be touched");
    }

    #[tokio::test]
    async fn unknown_object_offered_to_update_handlers_in_order() {
        use std::sync::atomic::AtomicUsize;

        let first_seen = Arc::new(AtomicUsize::new(0));
        let second_seen = Arc::new(AtomicUsize::new(0));
        let (first_seen_h, second_seen_h) = (first_seen.clone(), second_seen.clone());

        let declines: UpdateHandler = Arc::new(move |_obj| {
            first_seen_h.fetch_add(1, Ordering::SeqCst);
            false
        });
        let consumes: UpdateHandler = Arc::new(move |_obj| {
            second_seen_h.fetch_add(1, Ordering::SeqCst);
            true
        });

        let shared = test_shared(vec![declines, consumes]).await;

        let mut body = 0xdeadbeefu32.to_le_bytes().to_vec();
        body.extend_from_slice(b"payload");
        let mut queue = VecDeque::new();
        dispatch_one(&shared, &mut queue, Pending { msg_id: 1, seq_no: 0, body }).await;

        assert_eq!(first_seen.load(Ordering::SeqCst), 1, "every handler is tried until one consumes");
        assert_eq!(second_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_object_warns_when_no_handler_consumes_it() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (_server_side, _) = listener.accept().await.unwrap();
        let (_r, w) = tokio::io::split(client);
        let (warn_tx, mut warn_rx) = mpsc::channel(16);
        let shared = Arc::new(Shared {
            enc: Mutex::new(EncryptedSession::new([9u8; 256], 1000, 0)),
            writer: Mutex::new(FrameWriter::new(w)),
            waiters: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
            warnings: warn_tx,
            handlers: Vec::new(),
        });

        let mut body = 0xdeadbeefu32.to_le_bytes().to_vec();
        body.extend_from_slice(b"payload");
        let mut queue = VecDeque::new();
        dispatch_one(&shared, &mut queue, Pending { msg_id: 1, seq_no: 0, body }).await;

        let warning = warn_rx.try_recv().expect("unconsumed object should warn");
        assert!(warning.contains("deadbeef"));
    }

    #[test]
    fn parses_known_migrate_prefixes() {
        assert_eq!(parse_migrate_dc("PHONE_MIGRATE_2"), Some(2));
        assert_eq!(parse_migrate_dc("NETWORK_MIGRATE_5"), Some(5));
        assert_eq!(parse_migrate_dc("USER_MIGRATE_1"), Some(1));
    }

    #[test]
    fn rejects_unrelated_numeric_suffixes() {
        assert_eq!(parse_migrate_dc("FLOOD_WAIT_30"), None);
        assert_eq!(parse_migrate_dc("MIGRATE_2"), None);
    }

    #[test]
    fn static_dc_list_looks_up_configured_entries() {
        let list = StaticDcList::new(vec![(2, "149.154.167.51:443".to_string())]);
        assert_eq!(list.addr_for_dc(2).as_deref(), Some("149.154.167.51:443"));
        assert_eq!(list.addr_for_dc(4), None);
    }

    #[test]
    fn config_default_has_empty_dc_list() {
        let cfg = Config::default();
        assert_eq!(cfg.dc_list.addr_for_dc(2), None);
    }

    #[test]
    fn static_dc_list_from_dc_options_skips_cdn_and_port_only_entries() {
        use layer_tl_types::types::DcOption;

        fn opt(id: i32, ip: &str, port: i32, cdn: bool, this_port_only: bool) -> DcOption {
            DcOption {
                ipv6: false,
                media_only: false,
                tcpo_only: false,
                cdn,
                is_static: false,
                this_port_only,
                id,
                ip_address: ip.to_owned(),
                port,
                secret: None,
            }
        }

        let options = vec![
            opt(1, "149.154.175.50", 443, false, false),
            opt(203, "91.108.4.204", 443, true, false),
            opt(2, "149.154.167.51", 80, false, true),
        ];

        let list = StaticDcList::from_dc_options(&options);
        assert_eq!(list.addr_for_dc(1).as_deref(), Some("149.154.175.50:443"));
        assert_eq!(list.addr_for_dc(203), None, "cdn entries are skipped");
        assert_eq!(list.addr_for_dc(2), None, "this_port_only entries are skipped");
    }
}
