//! Session reactor - accept, frame, dispatch, notify, reap.
//!
//! One task owns all mutable engine state. Per-connection reader tasks
//! drain their socket into an input buffer, frame newline-terminated
//! lines and forward them over a single event channel, so commands from
//! every connection are processed in one total order. Writer tasks
//! drain each session's outbound queue independently.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context as _;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::command;
use crate::ids::IdGenerator;
use crate::notifier::Notifier;
use crate::registry::Registry;
use crate::session::{ConnId, Session, SessionStore};

/// Longest accepted input line; a peer exceeding it is dropped.
const MAX_LINE_BYTES: usize = 8 * 1024;

/// Read chunk size for the per-connection input buffer.
const READ_CHUNK: usize = 4096;

/// Server configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// TCP port to listen on (0 = ephemeral)
    pub port: u16,
    /// Idle sessions are reaped after this long without input
    pub idle_timeout: Duration,
    /// Shared secret for AUTH (compared case-insensitively)
    pub passkey: String,
    /// Secret for DEBUG AUTH
    pub admin_secret: String,
    /// Instruments listed at startup
    pub symbols: Vec<String>,
    /// Market-data group receiving L1 updates
    pub md_group: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 0,
            idle_timeout: Duration::from_secs(60),
            passkey: "pawy".to_string(),
            admin_secret: "123456".to_string(),
            symbols: vec!["TSLA".to_string()],
            md_group: "F1".to_string(),
        }
    }
}

impl Config {
    /// Config for the given port with defaults elsewhere.
    pub fn new(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }
}

/// All engine state, owned by the reactor and handed to command
/// handlers by mutable reference.
pub struct Context {
    pub config: Config,
    pub registry: Registry,
    pub sessions: SessionStore,
    pub notifier: Notifier,
    pub ids: IdGenerator,
}

impl Context {
    /// Build engine state from a config: list the seed instruments and
    /// register the market-data group.
    pub fn new(config: Config) -> Self {
        let mut registry = Registry::new();
        for symbol in &config.symbols {
            if let Err(err) = registry.create(symbol) {
                warn!(%symbol, %err, "skipping seed instrument");
            }
        }

        let mut notifier = Notifier::new();
        notifier.register_group(&config.md_group);

        Self {
            config,
            registry,
            sessions: SessionStore::new(),
            notifier,
            ids: IdGenerator::new(),
        }
    }
}

/// What connection tasks report to the reactor.
#[derive(Debug)]
enum ConnEvent {
    /// A complete, trimmed, non-empty input line
    Line { conn: ConnId, line: String },
    /// Peer closed, I/O error, or oversized frame
    Closed { conn: ConnId },
}

/// The listening server. `bind` then `run`.
pub struct Server {
    listener: TcpListener,
    ctx: Context,
}

impl Server {
    /// Bind the listener and build engine state.
    pub async fn bind(config: Config) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", config.port))
            .await
            .with_context(|| format!("failed to bind port {}", config.port))?;
        info!(addr = %listener.local_addr()?, "listening");

        Ok(Self {
            listener,
            ctx: Context::new(config),
        })
    }

    /// Actual listening address (useful when bound to port 0).
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Run the reactor until shutdown.
    pub async fn run(mut self) -> anyhow::Result<()> {
        let (event_tx, mut event_rx) = mpsc::channel::<ConnEvent>(1024);
        let mut sweep = tokio::time::interval(Duration::from_secs(1));
        let mut next_conn: ConnId = 1;

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let conn = next_conn;
                            next_conn += 1;
                            register_connection(
                                &mut self.ctx.sessions,
                                conn,
                                stream,
                                peer,
                                event_tx.clone(),
                            );
                        }
                        Err(err) if is_transient_accept_error(&err) => {
                            debug!(%err, "transient accept failure");
                        }
                        Err(err) => {
                            error!(%err, "listener failed");
                            return Err(err.into());
                        }
                    }
                }
                Some(event) = event_rx.recv() => {
                    match event {
                        ConnEvent::Line { conn, line } => {
                            if let Some(session) = self.ctx.sessions.get_mut(conn) {
                                session.touch();
                            }
                            command::dispatch(&mut self.ctx, conn, &line);
                        }
                        ConnEvent::Closed { conn } => {
                            if let Some(session) = self.ctx.sessions.remove(conn) {
                                info!(conn, client = %session.client_id, "session closed");
                                session.close();
                            }
                        }
                    }
                }
                _ = sweep.tick() => {
                    for session in self.ctx.sessions.reap_idle(self.ctx.config.idle_timeout) {
                        info!(conn = session.conn, client = %session.client_id, "idle timeout");
                        session.close();
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("shutting down");
                    for session in self.ctx.sessions.drain() {
                        session.close();
                    }
                    return Ok(());
                }
            }
        }
    }

}

/// Track a fresh connection and spawn its I/O tasks.
fn register_connection(
    sessions: &mut SessionStore,
    conn: ConnId,
    stream: TcpStream,
    peer: SocketAddr,
    event_tx: mpsc::Sender<ConnEvent>,
) {
    if let Err(err) = stream.set_nodelay(true) {
        debug!(conn, %err, "set_nodelay failed");
    }

    let (read_half, write_half) = stream.into_split();
    let (out_tx, out_rx) = mpsc::unbounded_channel::<String>();

    let reader = tokio::spawn(read_loop(conn, read_half, event_tx));
    let writer = tokio::spawn(write_loop(write_half, out_rx));

    info!(conn, %peer, "accepted connection");
    sessions.insert(Session::new(
        conn,
        peer,
        out_tx,
        reader.abort_handle(),
        writer.abort_handle(),
    ));
}

fn is_transient_accept_error(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::Interrupted
            | std::io::ErrorKind::WouldBlock
    )
}

/// Drain the socket, frame lines on `\n`, forward non-empty trimmed
/// lines to the reactor. Exits (reporting `Closed`) on EOF, I/O error,
/// or an oversized frame.
async fn read_loop(conn: ConnId, mut read_half: OwnedReadHalf, events: mpsc::Sender<ConnEvent>) {
    let mut inbuf: Vec<u8> = Vec::with_capacity(READ_CHUNK);
    let mut chunk = [0u8; READ_CHUNK];

    'io: loop {
        match read_half.read(&mut chunk).await {
            Ok(0) => break, // peer close
            Ok(n) => {
                inbuf.extend_from_slice(&chunk[..n]);

                while let Some(pos) = inbuf.iter().position(|&b| b == b'\n') {
                    let raw: Vec<u8> = inbuf.drain(..=pos).collect();
                    let line = String::from_utf8_lossy(&raw);
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let event = ConnEvent::Line {
                        conn,
                        line: line.to_string(),
                    };
                    if events.send(event).await.is_err() {
                        return; // reactor gone
                    }
                }

                if inbuf.len() > MAX_LINE_BYTES {
                    warn!(conn, "dropping connection: line exceeds {MAX_LINE_BYTES} bytes");
                    break 'io;
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => {
                debug!(conn, %err, "read failed");
                break;
            }
        }
    }

    let _ = events.send(ConnEvent::Closed { conn }).await;
}

/// Drain the outbound queue onto the socket. Exits when the queue
/// closes (session removed) or the peer stops accepting bytes.
async fn write_loop(mut write_half: OwnedWriteHalf, mut outbound: mpsc::UnboundedReceiver<String>) {
    while let Some(message) = outbound.recv().await {
        if write_half.write_all(message.as_bytes()).await.is_err() {
            return;
        }
    }
    let _ = write_half.shutdown().await;
}
