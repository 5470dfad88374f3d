//! The UTXO set and the undo data needed to revert a block's effect on it.
//!
//! Inserting an already-present key or removing a missing one is a
//! consensus failure, not a recoverable condition — callers that hit
//! either have a bug upstream (e.g. validation let a double-spend through).

use std::collections::HashMap;

use crate::error::ChainError;
use crate::types::{Block, OutPoint, UtxoEntry};

/// What `apply_block` removed, so `revert_block` can put it back.
#[derive(Clone, Debug, Default)]
pub struct BlockUndo {
    /// Outpoints spent by the block, in the order they were spent, with
    /// the entry that was removed.
    spent: Vec<(OutPoint, UtxoEntry)>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ConnectBlockResult {
    pub utxos_created: usize,
    pub utxos_spent: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct DisconnectBlockResult {
    pub utxos_restored: usize,
    pub utxos_removed: usize,
}

/// An in-memory mapping from `(txid, index)` to unspent output.
#[derive(Clone, Debug, Default)]
pub struct UtxoSet {
    entries: HashMap<OutPoint, UtxoEntry>,
}

impl UtxoSet {
    pub fn new() -> Self {
        UtxoSet {
            entries: HashMap::new(),
        }
    }

    pub fn add(&mut self, outpoint: OutPoint, entry: UtxoEntry) -> Result<(), ChainError> {
        if self.entries.contains_key(&outpoint) {
            return Err(ChainError::DuplicateUtxo(outpoint));
        }
        self.entries.insert(outpoint, entry);
        Ok(())
    }

    pub fn remove(&mut self, outpoint: &OutPoint) -> Result<UtxoEntry, ChainError> {
        self.entries
            .remove(outpoint)
            .ok_or(ChainError::MissingUtxo(*outpoint))
    }

    pub fn get(&self, outpoint: &OutPoint) -> Option<UtxoEntry> {
        self.entries.get(outpoint).cloned()
    }

    pub fn contains(&self, outpoint: &OutPoint) -> bool {
        self.entries.contains_key(outpoint)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of the values of every unspent output whose `pubkey_script`
    /// matches `pubkey_script` exactly (the P2PKH recipient hash160).
    pub fn balance_of(&self, pubkey_script: &[u8]) -> i64 {
        self.entries
            .values()
            .filter(|entry| entry.pubkey_script == pubkey_script)
            .map(|entry| entry.value)
            .sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OutPoint, &UtxoEntry)> {
        self.entries.iter()
    }

    /// Apply every transaction in `block` (assumed already validated) to
    /// the set: spend each non-coinbase input, then create each output.
    /// Returns the undo data needed to reverse this exact application.
    pub fn apply_block(&mut self, block: &Block, height: u64) -> Result<(BlockUndo, ConnectBlockResult), ChainError> {
        let mut undo = BlockUndo::default();
        let mut result = ConnectBlockResult::default();

        for tx in &block.transactions {
            if !tx.is_coinbase() {
                for input in &tx.inputs {
                    let outpoint = input.previous_output();
                    let entry = self.remove(&outpoint)?;
                    undo.spent.push((outpoint, entry));
                    result.utxos_spent += 1;
                }
            }
            let txid = tx.txid();
            for (index, output) in tx.outputs.iter().enumerate() {
                let outpoint = OutPoint {
                    txid,
                    index: index as u32,
                };
                let entry = UtxoEntry::from_output(output, height, tx.is_coinbase());
                self.add(outpoint, entry)?;
                result.utxos_created += 1;
            }
        }

        Ok((undo, result))
    }

    /// Revert `block`'s effect using the undo data `apply_block` produced
    /// for it: remove the outputs it created, then restore the inputs it
    /// spent, both in reverse order.
    pub fn revert_block(&mut self, block: &Block, undo: BlockUndo) -> Result<DisconnectBlockResult, ChainError> {
        let mut result = DisconnectBlockResult::default();

        for tx in block.transactions.iter().rev() {
            let txid = tx.txid();
            for index in (0..tx.outputs.len()).rev() {
                let outpoint = OutPoint {
                    txid,
                    index: index as u32,
                };
                self.remove(&outpoint)?;
                result.utxos_removed += 1;
            }
        }

        for (outpoint, entry) in undo.spent.into_iter().rev() {
            self.add(outpoint, entry)?;
            result.utxos_restored += 1;
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BlockHeader, Hash256, Transaction, TransactionInput, TransactionOutput};

    fn coinbase(value: i64) -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![TransactionInput {
                prev_txid: Hash256::ZERO,
                prev_output_index: u32::MAX,
                signature_script: vec![],
                sequence: u32::MAX,
            }],
            outputs: vec![TransactionOutput {
                value,
                pubkey_script: vec![1u8; 20],
            }],
            lock_time: 0,
        }
    }

    fn block_of(txs: Vec<Transaction>) -> Block {
        Block {
            header: BlockHeader {
                version: 1,
                prev_block_hash: Hash256::ZERO,
                merkle_root: Hash256::ZERO,
                timestamp: 0,
                nbits: 0,
                nonce: 0,
            },
            transactions: txs,
        }
    }

    #[test]
    fn add_then_get_round_trips() {
        let mut set = UtxoSet::new();
        let op = OutPoint {
            txid: Hash256::ZERO,
            index: 0,
        };
        let entry = UtxoEntry {
            value: 100,
            pubkey_script: vec![0; 20],
            block_height: 0,
            is_coinbase: false,
        };
        set.add(op, entry.clone()).unwrap();
        assert_eq!(set.get(&op), Some(entry));
    }

    #[test]
    fn add_rejects_duplicate_key() {
        let mut set = UtxoSet::new();
        let op = OutPoint {
            txid: Hash256::ZERO,
            index: 0,
        };
        let entry = UtxoEntry {
            value: 1,
            pubkey_script: vec![],
            block_height: 0,
            is_coinbase: false,
        };
        set.add(op, entry.clone()).unwrap();
        assert_eq!(set.add(op, entry), Err(ChainError::DuplicateUtxo(op)));
    }

    #[test]
    fn remove_rejects_missing_key() {
        let mut set = UtxoSet::new();
        let op = OutPoint {
            txid: Hash256::ZERO,
            index: 0,
        };
        assert_eq!(set.remove(&op), Err(ChainError::MissingUtxo(op)));
    }

    #[test]
    fn balance_of_sums_matching_outputs() {
        let mut set = UtxoSet::new();
        let script = vec![7u8; 20];
        set.add(
            OutPoint {
                txid: Hash256::ZERO,
                index: 0,
            },
            UtxoEntry {
                value: 100,
                pubkey_script: script.clone(),
                block_height: 0,
                is_coinbase: false,
            },
        )
        .unwrap();
        set.add(
            OutPoint {
                txid: Hash256::ZERO,
                index: 1,
            },
            UtxoEntry {
                value: 250,
                pubkey_script: script.clone(),
                block_height: 0,
                is_coinbase: false,
            },
        )
        .unwrap();
        set.add(
            OutPoint {
                txid: Hash256::from_bytes([1u8; 32]),
                index: 0,
            },
            UtxoEntry {
                value: 999,
                pubkey_script: vec![8u8; 20],
                block_height: 0,
                is_coinbase: false,
            },
        )
        .unwrap();
        assert_eq!(set.balance_of(&script), 350);
    }

    #[test]
    fn apply_block_creates_coinbase_output() {
        let mut set = UtxoSet::new();
        let block = block_of(vec![coinbase(5000)]);
        let (_, result) = set.apply_block(&block, 1).unwrap();
        assert_eq!(result.utxos_created, 1);
        assert_eq!(result.utxos_spent, 0);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn apply_then_revert_restores_original_state() {
        let mut set = UtxoSet::new();
        let genesis_cb = coinbase(5000);
        let block1 = block_of(vec![genesis_cb.clone()]);
        let (_, _) = set.apply_block(&block1, 0).unwrap();

        let spend_outpoint = OutPoint {
            txid: genesis_cb.txid(),
            index: 0,
        };
        let spend_tx = Transaction {
            version: 1,
            inputs: vec![TransactionInput {
                prev_txid: spend_outpoint.txid,
                prev_output_index: 0,
                signature_script: vec![],
                sequence: u32::MAX,
            }],
            outputs: vec![TransactionOutput {
                value: 4000,
                pubkey_script: vec![2u8; 20],
            }],
            lock_time: 0,
        };
        let block2 = block_of(vec![coinbase(1), spend_tx]);
        let (undo, result) = set.apply_block(&block2, 1).unwrap();
        assert_eq!(result.utxos_spent, 1);
        assert_eq!(result.utxos_created, 2);
        assert!(!set.contains(&spend_outpoint));

        let revert_result = set.revert_block(&block2, undo).unwrap();
        assert_eq!(revert_result.utxos_removed, 2);
        assert_eq!(revert_result.utxos_restored, 1);
        assert!(set.contains(&spend_outpoint));
        assert_eq!(set.len(), 1);
    }
}
