//! # Validator Loop
//!
//! The block producer. Only a node that was started as the bootstrap
//! validator runs this; peer nodes only ever receive blocks over RPC. A
//! wall-clock ticker fires every `network.tick` seconds and, if the
//! mempool isn't empty, builds, signs, and hands a new block to the
//! consensus engine — mirroring the original `validatorLoop`'s
//! drain-stage-resign-sign-propose sequence, with one behavioral
//! correction: the original proposed every tick regardless of mempool
//! contents (an empty block every interval); this loop skips ticks with
//! nothing to include.
//!
//! Re-signing deserves a word: every drained transaction arrives already
//! signed by its original submitter. The block doesn't commit to that
//! signature — it commits to the validator that proposed the block. So
//! each transaction is re-signed with the validator's key before being
//! included, and the transaction's pre-resign hash is preserved in
//! `inputs[0].prev_tx_hash` purely as an identity marker back to the
//! client-submitted original (this field carries no spend semantics in
//! this system).

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Duration;

use crate::chain::Chain;
use crate::consensus::ConsensusEngine;
use crate::crypto::Keypair;
use crate::hash::{hash_header, hash_transaction_clean, sign_transaction};
use crate::mempool::Mempool;
use crate::merkle::merkle_root;
use crate::peer::PeerRegistry;
use crate::types::{Block, Header, Transaction};

fn now_ns() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_nanos() as i64
}

/// Re-materialises a mempool-drained transaction for inclusion in a block:
/// stamps the pre-resign hash into `inputs[0].prev_tx_hash` as an identity
/// marker, then re-signs with the validator's key.
fn restage_for_inclusion(mut tx: Transaction, validator_key: &Keypair) -> Transaction {
    let original_hash = hash_transaction_clean(&tx);
    if let Some(input) = tx.inputs.first_mut() {
        input.prev_tx_hash = original_hash.to_vec();
    }
    sign_transaction(&mut tx, validator_key);
    tx
}

/// Drives block production on a ticker and hands finalized blocks from
/// the consensus engine back to the chain and the peer gossip layer.
pub struct ValidatorLoop {
    tick: Duration,
    mempool: Arc<Mempool>,
    chain: Arc<Mutex<Chain>>,
    validator_key: Keypair,
    peers: Arc<PeerRegistry>,
    consensus: Arc<ConsensusEngine>,
}

impl ValidatorLoop {
    pub fn new(
        tick: Duration,
        mempool: Arc<Mempool>,
        chain: Arc<Mutex<Chain>>,
        validator_key: Keypair,
        peers: Arc<PeerRegistry>,
        consensus: Arc<ConsensusEngine>,
    ) -> Arc<Self> {
        Arc::new(Self {
            tick,
            mempool,
            chain,
            validator_key,
            peers,
            consensus,
        })
    }

    /// Spawns the ticker task that builds and proposes blocks.
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(this.tick);
            loop {
                ticker.tick().await;
                this.produce_block();
            }
        })
    }

    /// Spawns the task that drains the consensus engine's finalized-block
    /// channel, appending each one to the chain and broadcasting it.
    pub fn spawn_finalizer(
        self: &Arc<Self>,
        mut finalized_rx: mpsc::UnboundedReceiver<Block>,
    ) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(block) = finalized_rx.recv().await {
                this.finalize_block(block).await;
            }
        })
    }

    /// Runs one tick's worth of block production synchronously, without
    /// waiting on the ticker. Exposed for integration tests that want to
    /// force a tick deterministically rather than sleeping past the real
    /// interval.
    pub fn produce_block_for_test(&self) {
        self.produce_block();
    }

    fn produce_block(&self) {
        let drained = self.mempool.drain();
        if drained.is_empty() {
            return;
        }

        let mut chain = self.chain.lock();
        let next_height = chain.height() + 1;
        let prev_hash = chain.tip_hash();

        // Stage every drained transaction into F before re-materialising
        // it for inclusion, then clear F once the block is signed.
        let mut transactions = Vec::with_capacity(drained.len());
        for tx in drained {
            chain.txstore().put(tx.clone());
            transactions.push(restage_for_inclusion(tx, &self.validator_key));
        }

        let root_hash = merkle_root(&transactions);
        let header = Header {
            version: 1,
            height: next_height,
            prev_hash,
            root_hash,
            timestamp: now_ns(),
        };
        let signature = self.validator_key.sign(&hash_header(&header));
        let block = Block {
            header,
            public_key: self.validator_key.public_key_bytes(),
            signature: signature.to_array(),
            transactions,
        };

        // Persist before handing off to consensus: step 9 runs before step
        // 10 (spec §4.J, §5's ordering guarantee). `Chain::add_block` will
        // persist again once the block is finalized, but that's an
        // idempotent overwrite of the same key with the same bytes — the
        // point here is that the block survives a crash between proposal
        // and finalization even though it hasn't been appended yet.
        if let Err(err) = chain.store().put(&block) {
            tracing::error!(height = block.header.height, error = %err, "failed to persist proposed block, aborting tick");
            chain.txstore().clear();
            return;
        }
        chain.txstore().clear();
        drop(chain);

        tracing::info!(
            height = block.header.height,
            txs = block.transactions.len(),
            "proposing block"
        );
        self.consensus.propose_block(block);
    }

    async fn finalize_block(&self, block: Block) {
        let added = {
            let mut chain = self.chain.lock();
            chain.add_block(block.clone())
        };
        if let Err(err) = added {
            tracing::error!(height = block.header.height, error = %err, "finalized block rejected by chain");
            return;
        }

        self.peers.broadcast_block(&block).await;
    }
}
