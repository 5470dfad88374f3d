//! The chain coordinator: owns the block store, UTXO set, and mempool, and
//! implements fork detection, best-tip selection, and reorganization.
//!
//! `node-core` validates; this module decides what to do with the verdict.
//! [`Coordinator`] implements [`ChainView`] and [`BlockSink`] so a validator
//! or a test fixture can depend on the narrow interface instead of this
//! concrete type, but [`Coordinator::mine_next_block`] is an inherent method
//! that reaches into `self`'s fields directly — going through the trait
//! objects there would require an immutable borrow for the chain view and a
//! mutable one for submission at the same time.

use std::collections::{HashMap, HashSet};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use node_core::block_validation::{self, BlockContext};
use node_core::chain_state::{BlockUndo, UtxoSet};
use node_core::config::ConsensusParams;
use node_core::constants::{MAX_BLOCK_SIZE, MEDIAN_TIME_PAST_WINDOW};
use node_core::crypto;
use node_core::difficulty::{self, DifficultyHistory};
use node_core::error::{BlockError, ChainError, MempoolError, ValidationError};
use node_core::genesis;
use node_core::mempool::Mempool;
use node_core::merkle::merkle_root;
use node_core::reward;
use node_core::traits::{BlockSink, ChainView};
use node_core::types::{Block, BlockHeader, Hash256, OutPoint, Transaction, UtxoEntry};
use node_core::validation;

use crate::miner;

fn system_time_now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the unix epoch")
        .as_secs() as u32
}

fn decode_hash160(hash160_hex: &str) -> Result<[u8; 20], ChainError> {
    let bytes = hex::decode(hash160_hex).map_err(|_| ChainError::InvalidRecipient(hash160_hex.to_string()))?;
    <[u8; 20]>::try_from(bytes).map_err(|_| ChainError::InvalidRecipient(hash160_hex.to_string()))
}

/// A JSON-serializable snapshot of everything [`Coordinator`] owns, for the
/// optional external-collaborator interface (a wallet or visualizer that
/// wants a point-in-time copy rather than a live view).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChainSnapshot {
    pub blocks: Vec<Block>,
    pub utxo: Vec<(OutPoint, UtxoEntry)>,
    pub mempool: Vec<Transaction>,
    pub tips: Vec<Hash256>,
    pub best_tip: Hash256,
}

/// Read-only adapter handing [`difficulty::expected_difficulty`] an ancestor
/// view rooted at a specific parent, so retargeting is computed against the
/// fork a candidate block actually extends rather than whichever chain is
/// currently best.
struct ChainHistory<'a> {
    coordinator: &'a Coordinator,
    parent_hash: Hash256,
    parent_height: u64,
}

impl DifficultyHistory for ChainHistory<'_> {
    fn nbits_at(&self, height: u64) -> u32 {
        self.coordinator
            .header_at_height_on_chain(self.parent_hash, self.parent_height, height)
            .expect("requested height is within the known ancestor chain")
            .nbits
    }

    fn timestamp_at(&self, height: u64) -> u32 {
        self.coordinator
            .header_at_height_on_chain(self.parent_hash, self.parent_height, height)
            .expect("requested height is within the known ancestor chain")
            .timestamp
    }
}

/// Owns chain state and mediates every mutation to it: block acceptance,
/// fork handling, reorganization, mempool admission, and mining.
pub struct Coordinator {
    params: ConsensusParams,
    blocks: HashMap<Hash256, Block>,
    heights: HashMap<Hash256, u64>,
    height_index: HashMap<u64, HashSet<Hash256>>,
    tips: HashSet<Hash256>,
    best_tip: Hash256,
    best_height: u64,
    utxo: UtxoSet,
    undo_data: HashMap<Hash256, BlockUndo>,
    mempool: Mempool,
    clock: Box<dyn Fn() -> u32 + Send + Sync>,
}

impl Coordinator {
    /// Build a coordinator rooted at the genesis block for `params`, using
    /// the system wall clock for block timestamps.
    pub fn new(params: ConsensusParams) -> Self {
        Self::with_clock(params, Box::new(system_time_now))
    }

    /// Build a coordinator with an injected clock. Exposed for tests that
    /// need deterministic timestamps without waiting on the system clock.
    pub fn with_clock(params: ConsensusParams, clock: Box<dyn Fn() -> u32 + Send + Sync>) -> Self {
        let genesis_block = genesis::genesis_block(&params);
        let hash = genesis_block.hash();

        let mut utxo = UtxoSet::new();
        let (undo, _) = utxo
            .apply_block(&genesis_block, 0)
            .expect("genesis coinbase has no inputs to spend");

        let mut blocks = HashMap::new();
        blocks.insert(hash, genesis_block);
        let mut heights = HashMap::new();
        heights.insert(hash, 0);
        let mut height_index: HashMap<u64, HashSet<Hash256>> = HashMap::new();
        height_index.entry(0).or_default().insert(hash);
        let mut tips = HashSet::new();
        tips.insert(hash);
        let mut undo_data = HashMap::new();
        undo_data.insert(hash, undo);

        Coordinator {
            params,
            blocks,
            heights,
            height_index,
            tips,
            best_tip: hash,
            best_height: 0,
            utxo,
            undo_data,
            mempool: Mempool::new(),
            clock,
        }
    }

    /// Walk back `tip_height - target_height` links from `tip_hash` along
    /// `prev_block_hash` pointers. Unlike a height-index lookup, this always
    /// resolves against the specific fork `tip_hash` sits on.
    fn header_at_height_on_chain(&self, tip_hash: Hash256, tip_height: u64, target_height: u64) -> Option<BlockHeader> {
        if target_height > tip_height {
            return None;
        }
        let mut distance = tip_height - target_height;
        let mut current = tip_hash;
        loop {
            let block = self.blocks.get(&current)?;
            if distance == 0 {
                return Some(block.header);
            }
            current = block.header.prev_block_hash;
            distance -= 1;
        }
    }

    fn ancestor_hash_at(&self, tip_hash: Hash256, tip_height: u64, target_height: u64) -> Option<Hash256> {
        if target_height > tip_height {
            return None;
        }
        let mut distance = tip_height - target_height;
        let mut current = tip_hash;
        loop {
            if distance == 0 {
                return Some(current);
            }
            let block = self.blocks.get(&current)?;
            current = block.header.prev_block_hash;
            distance -= 1;
        }
    }

    /// Timestamps of up to the last `n` ancestors of `from_hash`, inclusive,
    /// oldest last block first (the order `median_time_past` expects).
    fn last_n_ancestor_timestamps(&self, from_hash: Hash256, n: usize) -> Vec<u32> {
        let mut timestamps = Vec::new();
        let mut current = from_hash;
        for _ in 0..n {
            let Some(block) = self.blocks.get(&current) else {
                break;
            };
            timestamps.push(block.header.timestamp);
            current = block.header.prev_block_hash;
        }
        timestamps
    }

    fn expected_nbits_for(&self, parent_hash: Hash256, parent_height: u64, candidate_height: u64) -> u32 {
        let history = ChainHistory {
            coordinator: self,
            parent_hash,
            parent_height,
        };
        difficulty::expected_difficulty(
            &history,
            candidate_height,
            self.params.adjustment_interval,
            self.params.target_block_time_sec,
            self.params.max_target_nbits,
        )
    }

    fn build_context(&self, parent_hash: Hash256, parent_height: u64, reward_value: i64) -> BlockContext {
        let candidate_height = parent_height + 1;
        BlockContext {
            height: candidate_height,
            expected_nbits: self.expected_nbits_for(parent_hash, parent_height, candidate_height),
            ancestor_timestamps: self.last_n_ancestor_timestamps(parent_hash, MEDIAN_TIME_PAST_WINDOW),
            current_time: (self.clock)(),
            block_reward: reward_value,
            coinbase_maturity: self.params.coinbase_maturity,
        }
    }

    /// Find the common ancestor of `old_tip` and `new_tip`, plus the path
    /// from each tip down to (but excluding) that ancestor. `old_path` is
    /// ordered tip-to-ancestor; `new_path` is ordered ancestor-to-tip.
    fn find_fork_paths(&self, old_tip: Hash256, new_tip: Hash256) -> Result<(Vec<Hash256>, Vec<Hash256>, Hash256), ChainError> {
        let mut a = old_tip;
        let mut b = new_tip;
        let mut a_height = *self.heights.get(&a).ok_or(ChainError::BlockNotFound(a))?;
        let mut b_height = *self.heights.get(&b).ok_or(ChainError::BlockNotFound(b))?;
        let mut old_path = Vec::new();
        let mut new_path = Vec::new();

        while a_height > b_height {
            old_path.push(a);
            a = self.blocks[&a].header.prev_block_hash;
            a_height -= 1;
        }
        while b_height > a_height {
            new_path.push(b);
            b = self.blocks[&b].header.prev_block_hash;
            b_height -= 1;
        }
        while a != b {
            old_path.push(a);
            new_path.push(b);
            if a_height == 0 {
                return Err(ChainError::NoCommonAncestor);
            }
            a = self.blocks[&a].header.prev_block_hash;
            b = self.blocks[&b].header.prev_block_hash;
            a_height -= 1;
            b_height -= 1;
        }

        new_path.reverse();
        Ok((old_path, new_path, a))
    }

    /// Unwind `self.best_tip`'s chain down to the ancestor shared with
    /// `new_tip`, then rewind up to `new_tip`, revalidating every rewound
    /// block against the UTXO view it would actually see. Rolls back
    /// completely if any rewound block fails.
    fn reorganize(&mut self, new_tip: Hash256) -> Result<(), ChainError> {
        let (old_chain, new_chain, ancestor) = self.find_fork_paths(self.best_tip, new_tip)?;
        let ancestor_height = self.heights[&ancestor];

        let mut requeue_txs = Vec::new();
        for hash in &old_chain {
            let block = self.blocks.get(hash).cloned().expect("block recorded in store");
            let undo = self.undo_data.remove(hash).ok_or(ChainError::UndoDataMissing(*hash))?;
            self.utxo.revert_block(&block, undo)?;
            requeue_txs.extend(block.transactions.iter().skip(1).cloned());
        }

        let mut applied_new: Vec<(Hash256, BlockUndo)> = Vec::new();
        let mut prev_hash = ancestor;
        let mut prev_height = ancestor_height;
        let mut rewind_failure: Option<BlockError> = None;

        for &hash in &new_chain {
            let block = self.blocks.get(&hash).cloned().expect("block recorded in store");
            let candidate_height = prev_height + 1;
            let context = self.build_context(prev_hash, prev_height, reward::block_reward(candidate_height));
            let utxo_ref = &self.utxo;
            match block_validation::validate_block(&block, &context, prev_hash, |op| utxo_ref.get(op)) {
                Ok(_) => {
                    let (undo, _) = self
                        .utxo
                        .apply_block(&block, candidate_height)
                        .expect("block just revalidated against this exact UTXO view");
                    applied_new.push((hash, undo));
                    prev_hash = hash;
                    prev_height = candidate_height;
                }
                Err(err) => {
                    rewind_failure = Some(err);
                    break;
                }
            }
        }

        if let Some(err) = rewind_failure {
            for (hash, undo) in applied_new.into_iter().rev() {
                let block = self.blocks.get(&hash).cloned().expect("block recorded in store");
                self.utxo.revert_block(&block, undo).expect("reverting a rollback-in-progress block");
            }
            for hash in old_chain.iter().rev() {
                let block = self.blocks.get(hash).cloned().expect("block recorded in store");
                let height = self.heights[hash];
                let (undo, _) = self
                    .utxo
                    .apply_block(&block, height)
                    .expect("re-applying the original chain during rollback");
                self.undo_data.insert(*hash, undo);
            }
            return Err(ChainError::from(ValidationError::from(err)));
        }

        for (hash, undo) in applied_new {
            self.undo_data.insert(hash, undo);
        }
        self.best_tip = new_tip;
        self.best_height = prev_height;

        for hash in &new_chain {
            if let Some(block) = self.blocks.get(hash).cloned() {
                self.mempool.remove_confirmed(&block);
            }
        }
        let utxo_ref = &self.utxo;
        self.mempool
            .reinsert(requeue_txs, self.best_height, self.params.coinbase_maturity, |op| utxo_ref.get(op));

        tracing::info!(
            new_tip = %new_tip,
            new_height = self.best_height,
            ancestor_height,
            "reorganization complete"
        );
        Ok(())
    }

    /// Validate and accept `block`. Extends the best tip directly, triggers
    /// a reorg if it surpasses the best tip on another fork, or is stored
    /// without effect on a shorter/equal-height side chain.
    pub fn add_block(&mut self, block: Block) -> Result<(), ChainError> {
        let hash = block.hash();
        if self.blocks.contains_key(&hash) {
            return Err(ChainError::DuplicateBlock(hash));
        }

        let prev_hash = block.header.prev_block_hash;
        let parent_height = *self.heights.get(&prev_hash).ok_or(ChainError::OrphanBlock(hash))?;
        let candidate_height = parent_height + 1;

        let context = self.build_context(prev_hash, parent_height, reward::block_reward(candidate_height));
        let utxo_ref = &self.utxo;
        block_validation::validate_block(&block, &context, prev_hash, |op| utxo_ref.get(op))
            .map_err(ValidationError::from)?;

        self.blocks.insert(hash, block.clone());
        self.heights.insert(hash, candidate_height);
        self.height_index.entry(candidate_height).or_default().insert(hash);
        self.tips.remove(&prev_hash);
        self.tips.insert(hash);

        if prev_hash == self.best_tip {
            let (undo, _) = self.utxo.apply_block(&block, candidate_height)?;
            self.undo_data.insert(hash, undo);
            self.best_tip = hash;
            self.best_height = candidate_height;
            self.mempool.remove_confirmed(&block);
            tracing::info!(height = candidate_height, %hash, "block extends best tip");
        } else if candidate_height > self.best_height {
            tracing::info!(height = candidate_height, %hash, "block triggers reorganization");
            self.reorganize(hash)?;
        } else {
            tracing::debug!(height = candidate_height, %hash, "block stored on a side chain");
        }

        Ok(())
    }

    /// Validate and admit `tx` to the mempool.
    pub fn add_transaction(&mut self, tx: Transaction) -> Result<(), MempoolError> {
        let height = self.best_height;
        let maturity = self.params.coinbase_maturity;
        let utxo_ref = &self.utxo;
        self.mempool.add(tx, height, maturity, |op| utxo_ref.get(op))
    }

    /// Assemble a template extending `parent_hash`, mine it, and submit it
    /// to this same coordinator. `parent_hash` need not be the current best
    /// tip: mining onto a known non-tip block is how a competing fork gets
    /// built, both in tests and for a miner that started work before
    /// learning about a just-received competing block.
    fn assemble_and_mine(&self, parent_hash: Hash256, recipient: [u8; 20]) -> Result<Block, ChainError> {
        let parent_height = *self.heights.get(&parent_hash).ok_or(ChainError::BlockNotFound(parent_hash))?;
        let height = parent_height + 1;
        let reward_value = reward::block_reward(height);
        let expected_nbits = self.expected_nbits_for(parent_hash, parent_height, height);

        let parent_timestamp = self.blocks[&parent_hash].header.timestamp;
        let timestamp = (self.clock)().max(parent_timestamp.saturating_add(1));

        let maturity = self.params.coinbase_maturity;
        let mut included = Vec::new();
        let mut total_fees: i64 = 0;
        let mut block_spent = HashSet::new();
        if parent_hash == self.best_tip {
            for tx in self.mempool.take_top(MAX_BLOCK_SIZE / 2) {
                let utxo_ref = &self.utxo;
                if let Ok(fee) = validation::validate_transaction(&tx, height, maturity, |op| utxo_ref.get(op), &mut block_spent) {
                    total_fees = total_fees.saturating_add(fee);
                    included.push(tx);
                }
            }
        }
        let coinbase_value = reward_value.saturating_add(total_fees);

        let mut extra_nonce = 0u32;
        loop {
            let coinbase = miner::create_coinbase(height, coinbase_value, recipient, extra_nonce);
            let mut transactions = Vec::with_capacity(included.len() + 1);
            transactions.push(coinbase);
            transactions.extend(included.iter().cloned());

            let txids: Vec<Hash256> = transactions.iter().map(Transaction::txid).collect();
            let mut header = BlockHeader {
                version: 1,
                prev_block_hash: parent_hash,
                merkle_root: merkle_root(&txids),
                timestamp,
                nbits: expected_nbits,
                nonce: 0,
            };

            if miner::search_nonce(&mut header) {
                return Ok(Block { header, transactions });
            }
            extra_nonce = extra_nonce.wrapping_add(1);
        }
    }

    /// Assemble a template extending the best tip, mine it, and submit it to
    /// this same coordinator.
    pub fn mine_next_block(&mut self, recipient_hash160_hex: &str) -> Result<Block, ChainError> {
        let recipient = decode_hash160(recipient_hash160_hex)?;
        let block = self.assemble_and_mine(self.best_tip, recipient)?;
        self.submit_block(block.clone())?;
        Ok(block)
    }

    /// Mine onto a specific known ancestor rather than the current best
    /// tip, then submit the result. Used to construct a competing fork
    /// deliberately; mempool transactions are only considered when
    /// `parent_hash` is the current best tip, since only then is the
    /// mempool's UTXO view (built against the live chain) valid.
    pub fn mine_block_extending(&mut self, parent_hash: Hash256, recipient_hash160_hex: &str) -> Result<Block, ChainError> {
        let recipient = decode_hash160(recipient_hash160_hex)?;
        let block = self.assemble_and_mine(parent_hash, recipient)?;
        self.submit_block(block.clone())?;
        Ok(block)
    }

    pub fn best_tip(&self) -> Hash256 {
        self.best_tip
    }

    pub fn height(&self) -> u32 {
        self.best_height as u32
    }

    pub fn block_by_hash(&self, hash: &Hash256) -> Option<Block> {
        self.blocks.get(hash).cloned()
    }

    pub fn block_by_height(&self, height: u64) -> Option<Block> {
        let hash = self.ancestor_hash_at(self.best_tip, self.best_height, height)?;
        self.blocks.get(&hash).cloned()
    }

    /// Sum of every unspent output paying `hash160_hex`, looked up by raw
    /// hash160 rather than Base58 address: address derivation is a display
    /// concern handled in [`node_core::crypto`].
    pub fn balance_of(&self, hash160_hex: &str) -> Result<u64, ChainError> {
        let hash160 = decode_hash160(hash160_hex)?;
        Ok(self.utxo.balance_of(&hash160).max(0) as u64)
    }

    pub fn snapshot(&self) -> ChainSnapshot {
        ChainSnapshot {
            blocks: self.blocks.values().cloned().collect(),
            utxo: self.utxo.iter().map(|(op, entry)| (*op, entry.clone())).collect(),
            mempool: self.mempool.take_top(usize::MAX),
            tips: self.tips.iter().cloned().collect(),
            best_tip: self.best_tip,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.snapshot())
    }

    /// Rebuild a coordinator from a snapshot by replaying its blocks through
    /// ordinary `add_block`, which reconstructs heights, undo data, and the
    /// UTXO set exactly as if they had been received live. Blocks whose
    /// ancestor chain is never seen (a snapshot truncated mid-chain) are
    /// dropped rather than looped on forever.
    ///
    /// `snapshot.blocks` came from a `HashMap`'s iteration order, which is
    /// not stable, so blocks are replayed in height order (ties broken by
    /// hash) rather than snapshot order: for equal-height forks, replay
    /// order decides which side wins first-seen-wins, and snapshot order
    /// alone would make that outcome nondeterministic across round trips.
    pub fn from_snapshot(params: ConsensusParams, snapshot: ChainSnapshot) -> Result<Coordinator, ChainError> {
        let mut coordinator = Coordinator::new(params);
        let genesis_hash = coordinator.best_tip();

        let mut pending: Vec<Block> = snapshot
            .blocks
            .into_iter()
            .filter(|b| !genesis::is_genesis(b))
            .collect();

        let mut heights: HashMap<Hash256, u64> = HashMap::new();
        heights.insert(genesis_hash, 0);
        loop {
            let mut progressed = false;
            for block in &pending {
                if let Some(&parent_height) = heights.get(&block.header.prev_block_hash) {
                    heights.entry(block.hash()).or_insert_with(|| {
                        progressed = true;
                        parent_height + 1
                    });
                }
            }
            if !progressed {
                break;
            }
        }
        pending.sort_by_key(|block| (heights.get(&block.hash()).copied().unwrap_or(u64::MAX), block.hash()));

        loop {
            let mut next_pending = Vec::new();
            let mut progressed = false;
            for block in pending {
                if coordinator.blocks.contains_key(&block.header.prev_block_hash) {
                    coordinator.add_block(block)?;
                    progressed = true;
                } else {
                    next_pending.push(block);
                }
            }
            pending = next_pending;
            if pending.is_empty() || !progressed {
                break;
            }
        }

        for tx in snapshot.mempool {
            let _ = coordinator.add_transaction(tx);
        }
        Ok(coordinator)
    }
}

impl ChainView for Coordinator {
    fn best_tip(&self) -> Hash256 {
        self.best_tip
    }

    fn height(&self) -> u64 {
        self.best_height
    }

    fn get_block(&self, hash: &Hash256) -> Option<Block> {
        self.blocks.get(hash).cloned()
    }

    fn get_block_by_height(&self, height: u64) -> Option<Block> {
        self.block_by_height(height)
    }

    fn get_utxo(&self, outpoint: &OutPoint) -> Option<UtxoEntry> {
        self.utxo.get(outpoint)
    }
}

impl BlockSink for Coordinator {
    fn submit_block(&mut self, block: Block) -> Result<(), ChainError> {
        self.add_block(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use node_core::crypto::KeyPair;
    use node_core::types::{TransactionInput, TransactionOutput};

    fn test_coordinator() -> Coordinator {
        Coordinator::with_clock(ConsensusParams::dev(), Box::new(|| 2_000_000_000))
    }

    fn random_hash160_hex() -> String {
        hex::encode(KeyPair::generate().public_key().hash160())
    }

    #[test]
    fn new_coordinator_starts_at_genesis() {
        let coord = test_coordinator();
        assert_eq!(coord.best_tip(), genesis::genesis_hash(&ConsensusParams::dev()));
        assert_eq!(coord.height(), 0);
        assert_eq!(coord.block_by_height(0).unwrap().hash(), coord.best_tip());
    }

    #[test]
    fn mine_next_block_extends_tip_and_pays_reward() {
        let mut coord = test_coordinator();
        let recipient = random_hash160_hex();
        let block = coord.mine_next_block(&recipient).unwrap();
        assert_eq!(coord.height(), 1);
        assert_eq!(coord.best_tip(), block.hash());
        assert_eq!(coord.balance_of(&recipient).unwrap(), reward::block_reward(1) as u64);
    }

    #[test]
    fn duplicate_block_is_rejected() {
        let mut coord = test_coordinator();
        let block = coord.mine_next_block(&random_hash160_hex()).unwrap();
        let err = coord.add_block(block).unwrap_err();
        assert!(matches!(err, ChainError::DuplicateBlock(_)));
    }

    #[test]
    fn orphan_block_is_rejected() {
        let mut coord = test_coordinator();
        let coinbase = miner::create_coinbase(1, reward::block_reward(1), [1u8; 20], 0);
        let mut header = BlockHeader {
            version: 1,
            prev_block_hash: Hash256::from_bytes([0xAA; 32]),
            merkle_root: merkle_root(&[coinbase.txid()]),
            timestamp: 2_000_000_100,
            nbits: 0x207fffff,
            nonce: 0,
        };
        miner::search_nonce(&mut header);
        let block = Block {
            header,
            transactions: vec![coinbase],
        };
        let err = coord.add_block(block).unwrap_err();
        assert!(matches!(err, ChainError::OrphanBlock(_)));
    }

    #[test]
    fn add_transaction_then_mine_confirms_it_and_pays_recipient() {
        let mut coord = test_coordinator();
        let miner_kp = KeyPair::generate();
        let miner_hex = hex::encode(miner_kp.public_key().hash160());
        let block1 = coord.mine_next_block(&miner_hex).unwrap();
        let coinbase_txid = block1.transactions[0].txid();

        for _ in 0..coord.params.coinbase_maturity {
            coord.mine_next_block(&random_hash160_hex()).unwrap();
        }

        let recipient_kp = KeyPair::generate();
        let spend_value = reward::block_reward(1) - 1000;
        let mut spend = Transaction {
            version: 1,
            inputs: vec![TransactionInput {
                prev_txid: coinbase_txid,
                prev_output_index: 0,
                signature_script: vec![],
                sequence: u32::MAX,
            }],
            outputs: vec![TransactionOutput {
                value: spend_value,
                pubkey_script: recipient_kp.public_key().hash160().to_vec(),
            }],
            lock_time: 0,
        };
        crypto::sign_transaction_input(&mut spend, 0, &miner_kp).unwrap();
        let spend_txid = spend.txid();
        coord.add_transaction(spend).unwrap();

        let confirming_block = coord.mine_next_block(&random_hash160_hex()).unwrap();
        assert!(confirming_block.transactions.iter().any(|tx| tx.txid() == spend_txid));

        let recipient_hex = hex::encode(recipient_kp.public_key().hash160());
        assert_eq!(coord.balance_of(&recipient_hex).unwrap(), spend_value as u64);
    }

    #[test]
    fn equal_height_fork_keeps_first_seen_as_best_tip() {
        let mut coord = test_coordinator();
        let genesis_hash = coord.best_tip();

        let block_a = coord.mine_next_block(&random_hash160_hex()).unwrap();
        assert_eq!(coord.best_tip(), block_a.hash());

        coord.mine_block_extending(genesis_hash, &random_hash160_hex()).unwrap();
        assert_eq!(coord.best_tip(), block_a.hash(), "equal height must not trigger a reorg");
        assert_eq!(coord.height(), 1);
    }

    #[test]
    fn longer_side_chain_triggers_reorganization() {
        let mut coord = test_coordinator();
        let genesis_hash = coord.best_tip();

        let block_a = coord.mine_next_block(&random_hash160_hex()).unwrap();

        let block_b = coord.mine_block_extending(genesis_hash, &random_hash160_hex()).unwrap();
        assert_eq!(coord.best_tip(), block_a.hash());

        let winner_hex = hex::encode([8u8; 20]);
        let block_c = coord.mine_block_extending(block_b.hash(), &winner_hex).unwrap();

        assert_eq!(coord.best_tip(), block_c.hash());
        assert_eq!(coord.height(), 2);
        assert_eq!(coord.balance_of(&hex::encode([8u8; 20])).unwrap(), reward::block_reward(2) as u64);
        // block_a's coinbase is no longer part of the best chain's UTXO set.
        assert_eq!(
            coord.utxo.get(&OutPoint {
                txid: block_a.transactions[0].txid(),
                index: 0
            }),
            None
        );
    }

    #[test]
    fn snapshot_round_trips_best_tip_and_utxo() {
        let mut coord = test_coordinator();
        coord.mine_next_block(&random_hash160_hex()).unwrap();
        coord.mine_next_block(&random_hash160_hex()).unwrap();

        let snapshot = coord.snapshot();
        let restored = Coordinator::from_snapshot(ConsensusParams::dev(), snapshot).unwrap();

        assert_eq!(restored.best_tip(), coord.best_tip());
        assert_eq!(restored.height(), coord.height());
        for (outpoint, entry) in coord.utxo.iter() {
            assert_eq!(restored.utxo.get(outpoint), Some(entry.clone()));
        }
    }
}
