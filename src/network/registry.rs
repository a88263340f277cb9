//! Connection Registry
//!
//! Bookkeeping for live connections: where to deliver a participant's
//! messages, plus diagnostic liveness data. Nothing here influences
//! matchmaking or sessions.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, trace, warn};

use crate::game::state::PlayerId;
use crate::network::protocol::ServerMessage;

/// A live connection.
#[derive(Debug)]
pub struct ConnectionEntry {
    /// Remote address.
    pub addr: SocketAddr,
    /// Outbound queue drained by the connection's writer task.
    sender: mpsc::Sender<ServerMessage>,
    /// When the connection was admitted.
    pub connected_at: Instant,
    /// Last client heartbeat ping.
    pub last_heartbeat: Option<Instant>,
    /// Last measured round trip of a server probe.
    pub rtt: Option<Duration>,
    /// Events refused by the engine or the codec.
    pub rejected_events: u64,
}

/// All live connections, keyed by identity.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: BTreeMap<PlayerId, ConnectionEntry>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a connection.
    pub fn register(&mut self, id: PlayerId, addr: SocketAddr, sender: mpsc::Sender<ServerMessage>) {
        self.connections.insert(id, ConnectionEntry {
            addr,
            sender,
            connected_at: Instant::now(),
            last_heartbeat: None,
            rtt: None,
            rejected_events: 0,
        });
    }

    /// Forget a connection, logging where it came from and how long it lasted.
    pub fn unregister(&mut self, id: &PlayerId) -> Option<ConnectionEntry> {
        let entry = self.connections.remove(id)?;
        info!(
            "Participant {} from {} left after {:?} (rtt {:?}, {} rejected events)",
            id.short(),
            entry.addr,
            entry.connected_at.elapsed(),
            entry.rtt,
            entry.rejected_events
        );
        Some(entry)
    }

    /// Queue `message` for `id` without waiting.
    ///
    /// Returns false when the participant is gone or its queue is full;
    /// the message is dropped in both cases.
    pub fn deliver(&self, id: &PlayerId, message: ServerMessage) -> bool {
        let Some(entry) = self.connections.get(id) else {
            debug!("Dropping message for unknown participant {}", id.short());
            return false;
        };
        match entry.sender.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("Outbound queue full for {}, message dropped", id.short());
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Outbound queue closed for {}", id.short());
                false
            }
        }
    }

    /// Count a refused event against `id`. Returns the running total.
    pub fn record_rejection(&mut self, id: &PlayerId) -> u64 {
        match self.connections.get_mut(id) {
            Some(entry) => {
                entry.rejected_events += 1;
                entry.rejected_events
            }
            None => 0,
        }
    }

    /// Note a client heartbeat ping.
    pub fn record_heartbeat(&mut self, id: &PlayerId) {
        if let Some(entry) = self.connections.get_mut(id) {
            entry.last_heartbeat = Some(Instant::now());
        }
    }

    /// Store a measured probe round trip.
    pub fn record_rtt(&mut self, id: &PlayerId, rtt: Duration) {
        if let Some(entry) = self.connections.get_mut(id) {
            trace!("RTT for {}: {:?}", id.short(), rtt);
            entry.rtt = Some(rtt);
        }
    }

    /// Look up a connection.
    pub fn get(&self, id: &PlayerId) -> Option<&ConnectionEntry> {
        self.connections.get(id)
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}
