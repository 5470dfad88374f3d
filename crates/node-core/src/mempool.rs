//! Pending-transaction pool, ordered by fee rate.
//!
//! Three indices kept in lockstep: `entries` (txid -> full entry),
//! `by_outpoint` (outpoint -> claiming txid, for double-spend detection),
//! and `by_fee_rate` (a `BTreeSet` ordered so the highest fee rate sorts
//! last, used by [`Mempool::take_top`]).

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::error::MempoolError;
use crate::types::{Block, Hash256, OutPoint, Transaction, UtxoEntry};
use crate::validation::validate_transaction;

const FEE_RATE_PRECISION: u128 = 1_000;

fn compute_fee_rate(fee: i64, size: usize) -> u64 {
    if size == 0 {
        return 0;
    }
    ((fee.max(0) as u128 * FEE_RATE_PRECISION) / size as u128) as u64
}

#[derive(Clone, Debug)]
struct MempoolEntry {
    tx: Transaction,
    fee: i64,
    size: usize,
    fee_rate: u64,
}

/// A pool of transactions that pass validation against the current UTXO
/// view but are not yet confirmed in a block.
pub struct Mempool {
    entries: HashMap<Hash256, MempoolEntry>,
    by_outpoint: HashMap<OutPoint, Hash256>,
    by_fee_rate: BTreeSet<(u64, Hash256)>,
    total_bytes: usize,
}

impl Mempool {
    pub fn new() -> Self {
        Mempool {
            entries: HashMap::new(),
            by_outpoint: HashMap::new(),
            by_fee_rate: BTreeSet::new(),
            total_bytes: 0,
        }
    }

    /// Validate `tx` against `get_utxo` and, if every rule passes and none
    /// of its inputs is already claimed by another pool entry, add it.
    pub fn add<F>(
        &mut self,
        tx: Transaction,
        current_height: u64,
        coinbase_maturity: u64,
        get_utxo: F,
    ) -> Result<(), MempoolError>
    where
        F: Fn(&OutPoint) -> Option<UtxoEntry>,
    {
        let txid = tx.txid();
        if self.entries.contains_key(&txid) {
            return Err(MempoolError::AlreadyExists(txid));
        }

        for input in &tx.inputs {
            let outpoint = input.previous_output();
            if let Some(existing_txid) = self.by_outpoint.get(&outpoint) {
                return Err(MempoolError::MempoolDoubleSpend {
                    outpoint,
                    existing_txid: *existing_txid,
                });
            }
        }

        let mut block_spent = HashSet::new();
        let fee = validate_transaction(&tx, current_height, coinbase_maturity, get_utxo, &mut block_spent)?;

        let size = tx.serialize().len();
        let fee_rate = compute_fee_rate(fee, size);

        for input in &tx.inputs {
            self.by_outpoint.insert(input.previous_output(), txid);
        }
        self.by_fee_rate.insert((fee_rate, txid));
        self.total_bytes += size;
        self.entries.insert(
            txid,
            MempoolEntry {
                tx,
                fee,
                size,
                fee_rate,
            },
        );
        Ok(())
    }

    fn remove(&mut self, txid: &Hash256) -> Option<Transaction> {
        let entry = self.entries.remove(txid)?;
        self.by_fee_rate.remove(&(entry.fee_rate, *txid));
        self.total_bytes -= entry.size;
        for input in &entry.tx.inputs {
            self.by_outpoint.remove(&input.previous_output());
        }
        Some(entry.tx)
    }

    /// Highest-fee-rate transactions whose combined serialized size does
    /// not exceed `limit_bytes`. Oversized individual transactions are
    /// skipped rather than truncated.
    pub fn take_top(&self, limit_bytes: usize) -> Vec<Transaction> {
        let mut selected = Vec::new();
        let mut used = 0usize;
        for &(_, txid) in self.by_fee_rate.iter().rev() {
            let entry = &self.entries[&txid];
            if used + entry.size > limit_bytes {
                continue;
            }
            used += entry.size;
            selected.push(entry.tx.clone());
        }
        selected
    }

    /// Remove every txid confirmed by `block`, and any remaining pool
    /// transaction whose inputs the block has now spent.
    pub fn remove_confirmed(&mut self, block: &Block) {
        let confirmed: HashSet<Hash256> = block.txids().into_iter().collect();
        for txid in &confirmed {
            self.remove(txid);
        }

        let mut now_spent: HashSet<OutPoint> = HashSet::new();
        for tx in &block.transactions {
            for input in &tx.inputs {
                now_spent.insert(input.previous_output());
            }
        }
        let conflicting: Vec<Hash256> = self
            .entries
            .iter()
            .filter(|(_, entry)| {
                entry
                    .tx
                    .inputs
                    .iter()
                    .any(|input| now_spent.contains(&input.previous_output()))
            })
            .map(|(txid, _)| *txid)
            .collect();
        for txid in conflicting {
            self.remove(&txid);
        }
    }

    /// Re-offer transactions unwound from a reorged-away chain. Each is
    /// re-validated against the (now current) UTXO view; transactions that
    /// no longer validate (e.g. now double-spent on the new chain) are
    /// silently dropped rather than propagated as an error, matching the
    /// best-effort nature of reorg re-submission.
    pub fn reinsert<F>(&mut self, txs: Vec<Transaction>, current_height: u64, coinbase_maturity: u64, get_utxo: F)
    where
        F: Fn(&OutPoint) -> Option<UtxoEntry>,
    {
        for tx in txs {
            let _ = self.add(tx, current_height, coinbase_maturity, &get_utxo);
        }
    }

    pub fn contains(&self, txid: &Hash256) -> bool {
        self.entries.contains_key(txid)
    }

    pub fn get(&self, txid: &Hash256) -> Option<Transaction> {
        self.entries.get(txid).map(|e| e.tx.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }
}

impl Default for Mempool {
    fn default() -> Self {
        Self::new()
    }
}
