//! # PBFT-PoA Consensus Engine
//!
//! A classical three-phase (Pre-Prepare / Prepare / Commit) Byzantine
//! agreement engine over a static, configured validator set. Leader
//! election is `validators[view mod N]`; quorum is the number of distinct
//! Prepare (respectively Commit) votes required to advance a view.
//!
//! The source this was ported from stubbed every identity-sensitive piece
//! of this component to constants: a hardcoded node id of `"validator1"`,
//! a quorum equal to the full validator count, and `is_leader` always
//! returning `true`. None of that survives here — `node_id` is derived
//! from the running validator's public key, `quorum` and the validator
//! set both come from configuration, and leadership is computed per view.
//!
//! There is one limitation this reimplementation keeps rather than
//! invents a fix for: the wire protocol (`Handshake` / `HandleTransaction`
//! / `HandleBlock` / `GetBlock`) has no fifth method for carrying
//! consensus messages between processes, so `broadcast` here only ever
//! reaches this node's own engine. That is sufficient for the
//! single-validator deployments this system actually runs (every
//! end-to-end scenario has exactly one validator quorum of one); wiring
//! real inter-validator consensus transport would mean inventing an RPC
//! method with no counterpart in the wire protocol.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use crate::hash::hash_block;
use crate::types::Block;

/// The three PBFT message phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    PrePrepare,
    Prepare,
    Commit,
}

/// A single consensus protocol message.
#[derive(Debug, Clone)]
pub struct ConsensusMessage {
    pub kind: MessageKind,
    pub block: Block,
    pub node_id: String,
    pub view: u64,
}

/// A callback the engine uses to check a proposed block's validity before
/// accepting a `PrePrepare` for it — normally `Chain::validate_block`,
/// wired in by the caller so this module stays free of a `Chain` dependency.
pub type BlockValidator = Arc<dyn Fn(&Block) -> bool + Send + Sync>;

struct EngineState {
    current_view: u64,
    pre_prepare: HashMap<u64, Block>,
    prepare_votes: HashMap<u64, HashSet<String>>,
    commit_votes: HashMap<u64, HashSet<String>>,
    finalized_views: HashSet<u64>,
}

impl EngineState {
    fn new() -> Self {
        Self {
            current_view: 0,
            pre_prepare: HashMap::new(),
            prepare_votes: HashMap::new(),
            commit_votes: HashMap::new(),
            finalized_views: HashSet::new(),
        }
    }
}

/// The running engine. Cheap to clone (it's an `Arc` internally via
/// [`Self::new`]'s return type); every method takes `&self`.
pub struct ConsensusEngine {
    validators: Vec<String>,
    node_id: String,
    quorum: usize,
    validate_block: BlockValidator,
    state: Mutex<EngineState>,
    proposal_tx: mpsc::UnboundedSender<Block>,
    proposal_rx: Mutex<Option<mpsc::UnboundedReceiver<Block>>>,
    incoming_tx: mpsc::UnboundedSender<ConsensusMessage>,
    incoming_rx: Mutex<Option<mpsc::UnboundedReceiver<ConsensusMessage>>>,
    finalized_tx: mpsc::UnboundedSender<Block>,
    stop_tx: Mutex<Option<oneshot::Sender<()>>>,
}

/// Computes the classical PBFT quorum `⌊2N/3⌋ + 1` for `n` validators.
pub fn classical_quorum(n: usize) -> usize {
    (2 * n) / 3 + 1
}

impl ConsensusEngine {
    /// Builds a new engine over `validators` (node ids, in a stable
    /// declared order — leader(view) = validators\[view mod N\]) for the
    /// validator identified by `node_id`, with a given `quorum`. `validate_block`
    /// gates every inbound `PrePrepare`; pass a closure wrapping
    /// `Chain::validate_block` in production.
    ///
    /// Returns the engine plus the receiving half of the finalized-block
    /// channel: every block that reaches commit quorum is sent there for
    /// the caller to append to the chain and broadcast to peers.
    pub fn new(
        validators: Vec<String>,
        node_id: String,
        quorum: usize,
        validate_block: BlockValidator,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<Block>) {
        let (proposal_tx, proposal_rx) = mpsc::unbounded_channel();
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
        let (finalized_tx, finalized_rx) = mpsc::unbounded_channel();

        let engine = Arc::new(Self {
            validators,
            node_id,
            quorum,
            validate_block,
            state: Mutex::new(EngineState::new()),
            proposal_tx,
            proposal_rx: Mutex::new(Some(proposal_rx)),
            incoming_tx,
            incoming_rx: Mutex::new(Some(incoming_rx)),
            finalized_tx,
            stop_tx: Mutex::new(None),
        });

        (engine, finalized_rx)
    }

    /// The leader for `view`: `validators[view mod N]`.
    pub fn leader(&self, view: u64) -> &str {
        let n = self.validators.len();
        &self.validators[(view as usize) % n]
    }

    /// Whether this node is the leader for `view`.
    pub fn is_leader(&self, view: u64) -> bool {
        self.leader(view) == self.node_id
    }

    /// The view currently in progress.
    pub fn current_view(&self) -> u64 {
        self.state.lock().current_view
    }

    /// This validator's node id (its public key hex).
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Queues `block` for proposal if this node is the leader of the
    /// current view. Non-leaders silently drop the proposal — they won't
    /// actually propose, matching spec §4.K.
    pub fn propose_block(&self, block: Block) {
        let view = self.current_view();
        if !self.is_leader(view) {
            return;
        }
        let _ = self.proposal_tx.send(block);
    }

    /// Feeds an inbound consensus message to the engine's receiver task.
    pub fn on_receive_message(&self, msg: ConsensusMessage) {
        let _ = self.incoming_tx.send(msg);
    }

    /// Starts the long-running receiver task that drains the proposal and
    /// inbound-message channels. Returns a join handle; call [`Self::stop`]
    /// to terminate it.
    pub fn start(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let (stop_tx, mut stop_rx) = oneshot::channel();
        *self.stop_tx.lock() = Some(stop_tx);

        let mut proposal_rx = self
            .proposal_rx
            .lock()
            .take()
            .expect("consensus engine started twice");
        let mut incoming_rx = self
            .incoming_rx
            .lock()
            .take()
            .expect("consensus engine started twice");

        let engine = Arc::clone(self);
        tokio::spawn(async move {
            tracing::info!("starting PBFT-PoA consensus engine");
            loop {
                tokio::select! {
                    _ = &mut stop_rx => {
                        tracing::info!("consensus engine stopped");
                        return;
                    }
                    Some(block) = proposal_rx.recv() => {
                        engine.handle_propose(block);
                    }
                    Some(msg) = incoming_rx.recv() => {
                        engine.handle_message(msg);
                    }
                    else => return,
                }
            }
        })
    }

    /// Closes the engine's stop channel, causing the receiver task to
    /// exit on its next scheduling point.
    pub fn stop(&self) {
        if let Some(tx) = self.stop_tx.lock().take() {
            let _ = tx.send(());
        }
    }

    fn handle_propose(&self, block: Block) {
        let view = self.current_view();
        let msg = ConsensusMessage {
            kind: MessageKind::PrePrepare,
            block,
            node_id: self.node_id.clone(),
            view,
        };
        tracing::debug!(view, hash = %hex::encode(hash_block(&msg.block))[..8].to_string(), "proposing block");
        self.broadcast(msg);
    }

    fn handle_message(&self, msg: ConsensusMessage) {
        match msg.kind {
            MessageKind::PrePrepare => self.handle_pre_prepare(msg),
            MessageKind::Prepare => self.handle_prepare(msg),
            MessageKind::Commit => self.handle_commit(msg),
        }
    }

    fn handle_pre_prepare(&self, msg: ConsensusMessage) {
        if msg.node_id != self.leader(msg.view) {
            tracing::warn!(view = msg.view, from = %msg.node_id, "pre-prepare from non-leader dropped");
            return;
        }
        if !(self.validate_block)(&msg.block) {
            tracing::warn!(view = msg.view, "pre-prepare with an invalid block dropped");
            return;
        }

        let prepare_msg = {
            let mut state = self.state.lock();
            state.pre_prepare.insert(msg.view, msg.block.clone());
            state
                .prepare_votes
                .entry(msg.view)
                .or_default()
                .insert(self.node_id.clone());
            ConsensusMessage {
                kind: MessageKind::Prepare,
                block: msg.block,
                node_id: self.node_id.clone(),
                view: msg.view,
            }
        };
        self.broadcast(prepare_msg);
    }

    fn handle_prepare(&self, msg: ConsensusMessage) {
        let commit_msg = {
            let mut state = self.state.lock();
            let Some(pre_prepared) = state.pre_prepare.get(&msg.view) else {
                tracing::debug!(view = msg.view, "prepare with no matching pre-prepare dropped");
                return;
            };
            if hash_block(pre_prepared) != hash_block(&msg.block) {
                tracing::warn!(view = msg.view, "prepare block hash mismatch dropped");
                return;
            }

            let votes = state.prepare_votes.entry(msg.view).or_default();
            votes.insert(msg.node_id.clone());
            if votes.len() < self.quorum {
                return;
            }

            let commit_votes = state.commit_votes.entry(msg.view).or_default();
            if !commit_votes.insert(self.node_id.clone()) {
                // Already crossed quorum and cast our commit vote once.
                return;
            }

            ConsensusMessage {
                kind: MessageKind::Commit,
                block: pre_prepared.clone(),
                node_id: self.node_id.clone(),
                view: msg.view,
            }
        };
        self.broadcast(commit_msg);
    }

    fn handle_commit(&self, msg: ConsensusMessage) {
        let finalized = {
            let mut state = self.state.lock();
            let Some(pre_prepared) = state.pre_prepare.get(&msg.view) else {
                return;
            };
            if hash_block(pre_prepared) != hash_block(&msg.block) {
                tracing::warn!(view = msg.view, "commit block hash mismatch dropped");
                return;
            }

            let votes = state.commit_votes.entry(msg.view).or_default();
            votes.insert(msg.node_id.clone());
            if votes.len() < self.quorum {
                return;
            }

            if !state.finalized_views.insert(msg.view) {
                // Already finalized this view on an earlier commit crossing quorum.
                return;
            }

            let block = pre_prepared.clone();
            state.current_view += 1;
            block
        };

        tracing::info!(
            view = msg.view,
            hash = %hex::encode(hash_block(&finalized))[..8].to_string(),
            "block finalized by consensus"
        );
        let _ = self.finalized_tx.send(finalized);
    }

    /// Delivers a message produced locally back into the engine's own
    /// inbound queue. See the module docs for why this stays in-process.
    fn broadcast(&self, msg: ConsensusMessage) {
        self.on_receive_message(msg);
    }
}
