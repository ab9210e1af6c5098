//! Per-connection session state and the reactor's session tables.
//!
//! Sessions are owned exclusively by the reactor. A session starts
//! anonymous (keyed by connection id only) and is promoted into the
//! by-client index on successful AUTH; a later login under the same
//! client id evicts the earlier session ("newest login wins").

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

/// Reactor-assigned connection identifier.
pub type ConnId = u64;

/// State for one TCP connection.
pub struct Session {
    /// Connection id (key in the by-connection table)
    pub conn: ConnId,
    /// Peer address, for diagnostics
    pub peer: SocketAddr,
    /// Set by AUTH
    pub authenticated: bool,
    /// Set by DEBUG AUTH
    pub admin: bool,
    /// Owning principal; empty until authenticated
    pub client_id: String,
    /// Refreshed on every framed line
    pub last_active: Instant,
    /// Outbound queue drained by the connection's writer task
    outbound: mpsc::UnboundedSender<String>,
    reader: AbortHandle,
    writer: AbortHandle,
}

impl Session {
    /// Create an anonymous session for a fresh connection.
    pub fn new(
        conn: ConnId,
        peer: SocketAddr,
        outbound: mpsc::UnboundedSender<String>,
        reader: AbortHandle,
        writer: AbortHandle,
    ) -> Self {
        Self {
            conn,
            peer,
            authenticated: false,
            admin: false,
            client_id: String::new(),
            last_active: Instant::now(),
            outbound,
            reader,
            writer,
        }
    }

    /// Queue bytes for the writer task. Errors (writer gone) are
    /// ignored; the reactor learns of dead connections via the reader.
    pub fn send(&self, message: impl Into<String>) {
        let _ = self.outbound.send(message.into());
    }

    /// Refresh the idle timer.
    pub fn touch(&mut self) {
        self.last_active = Instant::now();
    }

    /// True once the session has been idle longer than `timeout`.
    pub fn is_stale(&self, now: Instant, timeout: Duration) -> bool {
        now.duration_since(self.last_active) > timeout
    }

    /// Tear down the connection: abort both I/O tasks, which drops the
    /// socket halves and discards any buffered output.
    pub fn close(&self) {
        self.reader.abort();
        self.writer.abort();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("conn", &self.conn)
            .field("peer", &self.peer)
            .field("authenticated", &self.authenticated)
            .field("admin", &self.admin)
            .field("client_id", &self.client_id)
            .finish()
    }
}

/// Outcome of an AUTH promotion.
#[derive(Debug)]
pub enum Promotion {
    /// Session was already bound to this client id
    Unchanged,
    /// Session is now bound; `evicted` holds a superseded session that
    /// the caller must close
    Promoted { evicted: Option<Session> },
}

/// The reactor's session tables: every connection keyed by id, plus an
/// index from client id to its (single) authenticated connection.
#[derive(Default)]
pub struct SessionStore {
    conns: FxHashMap<ConnId, Session>,
    by_client: FxHashMap<String, ConnId>,
}

impl SessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a fresh (pre-auth) session.
    pub fn insert(&mut self, session: Session) {
        self.conns.insert(session.conn, session);
    }

    /// Session by connection id.
    pub fn get(&self, conn: ConnId) -> Option<&Session> {
        self.conns.get(&conn)
    }

    /// Mutable session by connection id.
    pub fn get_mut(&mut self, conn: ConnId) -> Option<&mut Session> {
        self.conns.get_mut(&conn)
    }

    /// The authenticated session for a client id, if one exists.
    pub fn authed(&self, client_id: &str) -> Option<&Session> {
        let conn = self.by_client.get(client_id)?;
        self.conns.get(conn)
    }

    /// Queue a reply on a connection's outbound buffer.
    pub fn reply(&self, conn: ConnId, message: impl Into<String>) {
        if let Some(session) = self.conns.get(&conn) {
            session.send(message);
        }
    }

    /// Number of tracked connections.
    pub fn len(&self) -> usize {
        self.conns.len()
    }

    /// True when no connections are tracked.
    pub fn is_empty(&self) -> bool {
        self.conns.is_empty()
    }

    /// Iterate sessions ordered by connection id (diagnostics).
    pub fn iter_ordered(&self) -> Vec<&Session> {
        let mut sessions: Vec<&Session> = self.conns.values().collect();
        sessions.sort_by_key(|s| s.conn);
        sessions
    }

    /// Bind `conn` to `client_id` after a successful AUTH.
    ///
    /// - Re-auth under the same id: no-op.
    /// - Re-auth under a different id: the old binding is released.
    /// - Another session already bound to `client_id`: it is removed and
    ///   returned for the caller to close (newest login wins).
    ///
    /// Returns `None` if `conn` is not tracked.
    pub fn promote(&mut self, conn: ConnId, client_id: &str) -> Option<Promotion> {
        let (was_authed, old_client) = {
            let session = self.conns.get(&conn)?;
            (session.authenticated, session.client_id.clone())
        };

        if was_authed && old_client == client_id {
            return Some(Promotion::Unchanged);
        }

        if was_authed && self.by_client.get(&old_client) == Some(&conn) {
            self.by_client.remove(&old_client);
        }

        let evicted = match self.by_client.get(client_id) {
            Some(&other) if other != conn => self.conns.remove(&other),
            _ => None,
        };

        let session = self.conns.get_mut(&conn)?;
        session.authenticated = true;
        session.client_id = client_id.to_string();
        self.by_client.insert(client_id.to_string(), conn);

        Some(Promotion::Promoted { evicted })
    }

    /// Remove a session from both tables. The caller decides whether to
    /// close it (it may already be dead).
    pub fn remove(&mut self, conn: ConnId) -> Option<Session> {
        let session = self.conns.remove(&conn)?;
        if session.authenticated && self.by_client.get(&session.client_id) == Some(&conn) {
            self.by_client.remove(&session.client_id);
        }
        Some(session)
    }

    /// Remove and return every session idle longer than `timeout`.
    pub fn reap_idle(&mut self, timeout: Duration) -> Vec<Session> {
        let now = Instant::now();
        let stale: Vec<ConnId> = self
            .conns
            .values()
            .filter(|s| s.is_stale(now, timeout))
            .map(|s| s.conn)
            .collect();
        stale.into_iter().filter_map(|c| self.remove(c)).collect()
    }

    /// Drain every session (shutdown). Caller closes them.
    pub fn drain(&mut self) -> Vec<Session> {
        self.by_client.clear();
        self.conns.drain().map(|(_, s)| s).collect()
    }
}
