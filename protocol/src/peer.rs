//! # Peer Registry & Gossip
//!
//! Tracks the set of peers this node has shaken hands with, dials
//! bootstrap addresses, and fans out transactions/blocks to every
//! connected peer. There is no persistent peer connection to hold open —
//! each RPC is a short-lived HTTP/1.1 request/response over a fresh TCP
//! connection (`Connection: close`), so a "peer handle" here is just the
//! address we dial, keyed the same way the registry itself is keyed.
//!
//! Two de-duplication layers prevent redial storms, exactly as the system
//! this was ported from: a registry-local set of addresses this node has
//! already dialed, and a process-wide set shared by every [`PeerRegistry`]
//! instance in the same process (useful when multiple nodes run inside one
//! test process or one operator host).

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use thiserror::Error;

use crate::rpc::{RpcError, Version, WireBlock, WireTransaction};
use crate::types::{Block, Transaction};

/// Version string this node's handshake advertises.
pub const NODE_VERSION: &str = "meridian-1";

/// Per-RPC deadline. Matches spec §5's "5 seconds is the client default".
const RPC_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum GossipError {
    #[error("dial to {addr} failed: {reason}")]
    Dial { addr: String, reason: String },

    #[error("request to {addr} timed out")]
    Timeout { addr: String },

    #[error("peer {addr} returned HTTP {status}")]
    BadStatus { addr: String, status: u16 },

    #[error("malformed response from {addr}: {source}")]
    Json {
        addr: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Wire(#[from] RpcError),
}

fn global_dialed() -> &'static Mutex<HashMap<String, String>> {
    static CELL: OnceLock<Mutex<HashMap<String, String>>> = OnceLock::new();
    CELL.get_or_init(|| Mutex::new(HashMap::new()))
}

/// The set of connected peers and the bookkeeping needed to gossip to
/// them. Always held behind an `Arc` — `add_peer` spawns a background
/// bootstrap task against a peer's advertised peer list, which needs its
/// own owned handle to the registry.
pub struct PeerRegistry {
    self_addr: String,
    peers: RwLock<HashMap<String, Version>>,
    dialed: RwLock<HashSet<String>>,
}

impl PeerRegistry {
    /// Creates an empty registry for a node listening on `self_addr`
    /// (e.g. `":4000"`).
    pub fn new(self_addr: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            self_addr: self_addr.into(),
            peers: RwLock::new(HashMap::new()),
            dialed: RwLock::new(HashSet::new()),
        })
    }

    /// This node's own listen address.
    pub fn self_addr(&self) -> &str {
        &self.self_addr
    }

    /// Number of currently connected peers.
    pub fn peer_count(&self) -> usize {
        self.peers.read().len()
    }

    /// The listen addresses of every connected peer, in unspecified order.
    pub fn peer_addrs(&self) -> Vec<String> {
        self.peers.read().keys().cloned().collect()
    }

    /// Builds this node's own `Version` record for a handshake, reporting
    /// `height` as its current chain height.
    pub fn self_version(&self, height: i32) -> Version {
        Version {
            version: NODE_VERSION.to_string(),
            height,
            listen_addr: self.self_addr.clone(),
            peer_list: self.peer_addrs(),
        }
    }

    /// Whether `addr` is worth dialing: not ourselves, and not already a
    /// connected peer.
    pub fn can_connect_with(&self, addr: &str) -> bool {
        if addr == self.self_addr {
            return false;
        }
        !self.peers.read().contains_key(addr)
    }

    /// Registers `version` as a connected peer. Idempotent: a peer already
    /// known by its advertised listen address is left untouched and this
    /// returns `false`. On a genuinely new peer, if it advertised a
    /// non-empty peer list, a bootstrap pass against those addresses is
    /// kicked off in the background.
    pub fn add_peer(self: &Arc<Self>, version: Version) -> bool {
        let newly_added = {
            let mut peers = self.peers.write();
            if peers.contains_key(&version.listen_addr) {
                false
            } else {
                peers.insert(version.listen_addr.clone(), version.clone());
                true
            }
        };

        if newly_added {
            tracing::info!(
                self_addr = %self.self_addr,
                peer_addr = %version.listen_addr,
                height = version.height,
                "connected to peer",
            );
            if !version.peer_list.is_empty() {
                let registry = Arc::clone(self);
                let peer_list = version.peer_list.clone();
                tokio::spawn(async move {
                    registry.bootstrap(&peer_list).await;
                });
            }
        }

        newly_added
    }

    /// Removes a peer, e.g. after a failed broadcast.
    pub fn delete_peer(&self, addr: &str) {
        self.peers.write().remove(addr);
    }

    /// Dials every address in `addrs` that passes the connect/dedup
    /// checks, performs a handshake, and registers the result as a peer.
    /// Failures to dial an individual address are logged and skipped —
    /// bootstrap never fails the caller.
    pub async fn bootstrap(self: &Arc<Self>, addrs: &[String]) {
        for addr in addrs {
            if !self.can_connect_with(addr) {
                continue;
            }

            if self.dialed.read().contains(addr) {
                continue;
            }

            {
                let mut global = global_dialed().lock();
                if global
                    .get(addr)
                    .is_some_and(|dialed_by| dialed_by == &self.self_addr)
                {
                    continue;
                }
                global.insert(addr.clone(), self.self_addr.clone());
            }

            tracing::debug!(self_addr = %self.self_addr, %addr, "dialing peer");
            match self.dial(addr).await {
                Ok(remote_version) => {
                    self.add_peer(remote_version);
                    self.dialed.write().insert(addr.clone());
                }
                Err(err) => {
                    tracing::warn!(%addr, %err, "failed to dial peer");
                }
            }
        }
    }

    /// Performs the `Handshake` RPC against `addr`, returning its `Version`.
    async fn dial(&self, addr: &str) -> Result<Version, GossipError> {
        let body = serde_json::to_vec(&self.self_version(0)).expect("Version always serializes");
        let response = transport::post_json(addr, "/internal/handshake", &body).await?;
        serde_json::from_slice(&response).map_err(|source| GossipError::Json {
            addr: addr.to_string(),
            source,
        })
    }

    /// Fans `tx` out to every connected peer via `HandleTransaction`. A
    /// peer that fails the RPC is evicted — the next bootstrap pass will
    /// reconnect it if it comes back.
    pub async fn broadcast_transaction(self: &Arc<Self>, tx: &Transaction) {
        let wire = WireTransaction::from(tx);
        let body = serde_json::to_vec(&wire).expect("WireTransaction always serializes");
        for addr in self.peer_addrs() {
            if let Err(err) = transport::post_json(&addr, "/internal/tx", &body).await {
                tracing::warn!(%addr, %err, "transaction broadcast failed, evicting peer");
                self.delete_peer(&addr);
            }
        }
    }

    /// Fans `block` out to every connected peer via `HandleBlock`. Unlike
    /// transaction broadcast, a failure here is logged only — the peer is
    /// kept, since it will catch up at the next block regardless.
    pub async fn broadcast_block(self: &Arc<Self>, block: &Block) {
        let wire = WireBlock::from(block);
        let body = serde_json::to_vec(&wire).expect("WireBlock always serializes");
        for addr in self.peer_addrs() {
            if let Err(err) = transport::post_json(&addr, "/internal/block", &body).await {
                tracing::warn!(%addr, %err, "block broadcast failed (peer kept)");
            }
        }
    }
}

/// A minimal hand-rolled async HTTP/1.1 client: just enough to POST a JSON
/// body to a peer and read back its JSON response. Avoids pulling in a
/// full HTTP client crate for what is, on the wire, four fixed internal
/// endpoints between nodes that trust each other's validator identity.
mod transport {
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    use super::{GossipError, RPC_TIMEOUT};

    /// Peer addresses are bare `:<port>` strings (as in the CLI's `--port`
    /// flag); every node in this mesh runs on localhost.
    fn host_port(addr: &str) -> String {
        if let Some(port) = addr.strip_prefix(':') {
            format!("127.0.0.1:{port}")
        } else {
            addr.to_string()
        }
    }

    pub async fn post_json(addr: &str, path: &str, body: &[u8]) -> Result<Vec<u8>, GossipError> {
        tokio::time::timeout(RPC_TIMEOUT, post_json_inner(addr, path, body))
            .await
            .map_err(|_| GossipError::Timeout {
                addr: addr.to_string(),
            })?
    }

    async fn post_json_inner(
        addr: &str,
        path: &str,
        body: &[u8],
    ) -> Result<Vec<u8>, GossipError> {
        let target = host_port(addr);
        let mut stream = TcpStream::connect(&target)
            .await
            .map_err(|e| GossipError::Dial {
                addr: addr.to_string(),
                reason: e.to_string(),
            })?;

        let request = format!(
            "POST {path} HTTP/1.1\r\n\
             Host: {target}\r\n\
             Content-Type: application/json\r\n\
             Content-Length: {len}\r\n\
             Connection: close\r\n\r\n",
            path = path,
            target = target,
            len = body.len(),
        );

        stream
            .write_all(request.as_bytes())
            .await
            .map_err(|e| GossipError::Dial {
                addr: addr.to_string(),
                reason: e.to_string(),
            })?;
        stream.write_all(body).await.map_err(|e| GossipError::Dial {
            addr: addr.to_string(),
            reason: e.to_string(),
        })?;
        stream.shutdown().await.ok();

        let mut buf = Vec::new();
        stream
            .read_to_end(&mut buf)
            .await
            .map_err(|e| GossipError::Dial {
                addr: addr.to_string(),
                reason: e.to_string(),
            })?;

        let response = String::from_utf8_lossy(&buf);
        let (headers, rest) = response.split_once("\r\n\r\n").unwrap_or((&response, ""));

        let status = parse_status(headers).unwrap_or(0);
        if !(200..300).contains(&status) {
            return Err(GossipError::BadStatus {
                addr: addr.to_string(),
                status,
            });
        }

        Ok(rest.as_bytes().to_vec())
    }

    fn parse_status(headers: &str) -> Option<u16> {
        let first_line = headers.lines().next()?;
        first_line.split_whitespace().nth(1)?.parse().ok()
    }

    #[allow(dead_code)]
    pub fn rpc_timeout() -> Duration {
        RPC_TIMEOUT
    }
}
