//! Transaction-level consensus rules.
//!
//! UTXO lookups are injected as a closure (`Fn(&OutPoint) -> Option<UtxoEntry>`)
//! rather than a storage trait, so the same validation code runs unchanged
//! whether the caller is backed by the live chain tip, a reorg's
//! partially-rebuilt view, or a test fixture.

use std::collections::HashSet;

use crate::constants::{MAX_SUPPLY, MAX_TX_SIZE};
use crate::crypto;
use crate::error::TransactionError;
use crate::types::{OutPoint, Transaction, UtxoEntry};

/// Validate a single non-coinbase transaction against a UTXO view.
///
/// `block_spent` tracks outpoints already claimed earlier in the same
/// block (or earlier in the same mempool scan) so cross-transaction double
/// spends are caught; callers validating in isolation pass an empty set.
///
/// Returns the transaction's fee (sum of inputs minus sum of outputs) on
/// success.
pub fn validate_transaction<F>(
    tx: &Transaction,
    current_height: u64,
    coinbase_maturity: u64,
    get_utxo: F,
    block_spent: &mut HashSet<OutPoint>,
) -> Result<i64, TransactionError>
where
    F: Fn(&OutPoint) -> Option<UtxoEntry>,
{
    if tx.inputs.is_empty() {
        return Err(TransactionError::NoInputs);
    }
    if tx.outputs.is_empty() {
        return Err(TransactionError::NoOutputs);
    }
    if tx.serialize().len() > MAX_TX_SIZE {
        return Err(TransactionError::TooLarge);
    }

    let mut seen_within_tx = HashSet::new();
    let mut total_input_value: i64 = 0;

    for (index, input) in tx.inputs.iter().enumerate() {
        let outpoint = input.previous_output();

        if !seen_within_tx.insert(outpoint) {
            return Err(TransactionError::DuplicateInput(outpoint));
        }
        if block_spent.contains(&outpoint) {
            return Err(TransactionError::DuplicateInput(outpoint));
        }

        let utxo = get_utxo(&outpoint).ok_or(TransactionError::MissingUtxo(outpoint))?;

        if !utxo.is_mature(current_height, coinbase_maturity) {
            return Err(TransactionError::ImmatureCoinbase(outpoint));
        }

        crypto::verify_transaction_input(tx, index, &utxo.pubkey_script)
            .map_err(|_| TransactionError::ScriptVerificationFailed(outpoint))?;

        total_input_value = total_input_value
            .checked_add(utxo.value)
            .ok_or(TransactionError::OutputOverflow)?;

        block_spent.insert(outpoint);
    }

    let mut total_output_value: i64 = 0;
    for output in &tx.outputs {
        if output.value < 0 {
            return Err(TransactionError::NegativeOutput);
        }
        total_output_value = total_output_value
            .checked_add(output.value)
            .ok_or(TransactionError::OutputOverflow)?;
    }
    if total_output_value > MAX_SUPPLY {
        return Err(TransactionError::OutputOverflow);
    }

    if total_input_value < total_output_value {
        return Err(TransactionError::InsufficientInputValue);
    }

    Ok(total_input_value - total_output_value)
}

/// Structural checks applying to every transaction, coinbase included:
/// presence of inputs/outputs and size bound. Used before the full
/// UTXO-dependent checks and as the entire check for coinbase transactions,
/// which are validated separately by block-level reward accounting.
pub fn validate_transaction_structure(tx: &Transaction) -> Result<(), TransactionError> {
    if tx.inputs.is_empty() {
        return Err(TransactionError::NoInputs);
    }
    if tx.outputs.is_empty() {
        return Err(TransactionError::NoOutputs);
    }
    if tx.serialize().len() > MAX_TX_SIZE {
        return Err(TransactionError::TooLarge);
    }
    for output in &tx.outputs {
        if output.value < 0 {
            return Err(TransactionError::NegativeOutput);
        }
    }
    if tx.total_output_value().ok_or(TransactionError::OutputOverflow)? > MAX_SUPPLY {
        return Err(TransactionError::OutputOverflow);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::types::{Hash256, TransactionInput, TransactionOutput};

    fn utxo_for(pubkey_script: Vec<u8>, value: i64, height: u64, is_coinbase: bool) -> UtxoEntry {
        UtxoEntry {
            value,
            pubkey_script,
            block_height: height,
            is_coinbase,
        }
    }

    fn spend_tx(outpoint: OutPoint, recipient_hash160: [u8; 20], value: i64) -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![TransactionInput {
                prev_txid: outpoint.txid,
                prev_output_index: outpoint.index,
                signature_script: vec![],
                sequence: u32::MAX,
            }],
            outputs: vec![TransactionOutput {
                value,
                pubkey_script: recipient_hash160.to_vec(),
            }],
            lock_time: 0,
        }
    }

    #[test]
    fn accepts_well_formed_spend() {
        let kp = KeyPair::generate();
        let outpoint = OutPoint {
            txid: Hash256::from_bytes([1u8; 32]),
            index: 0,
        };
        let mut tx = spend_tx(outpoint, [9u8; 20], 900);
        crate::crypto::sign_transaction_input(&mut tx, 0, &kp).unwrap();

        let utxo = utxo_for(kp.public_key().hash160().to_vec(), 1000, 0, false);
        let mut spent = HashSet::new();
        let fee = validate_transaction(&tx, 1, 100, |_| Some(utxo.clone()), &mut spent).unwrap();
        assert_eq!(fee, 100);
    }

    #[test]
    fn rejects_empty_inputs() {
        let tx = Transaction {
            version: 1,
            inputs: vec![],
            outputs: vec![TransactionOutput {
                value: 1,
                pubkey_script: vec![0; 20],
            }],
            lock_time: 0,
        };
        let mut spent = HashSet::new();
        assert_eq!(
            validate_transaction(&tx, 0, 100, |_| None, &mut spent),
            Err(TransactionError::NoInputs)
        );
    }

    #[test]
    fn rejects_empty_outputs() {
        let tx = Transaction {
            version: 1,
            inputs: vec![TransactionInput {
                prev_txid: Hash256::ZERO,
                prev_output_index: 0,
                signature_script: vec![],
                sequence: 0,
            }],
            outputs: vec![],
            lock_time: 0,
        };
        let mut spent = HashSet::new();
        assert_eq!(
            validate_transaction(&tx, 0, 100, |_| None, &mut spent),
            Err(TransactionError::NoOutputs)
        );
    }

    #[test]
    fn rejects_missing_utxo() {
        let outpoint = OutPoint {
            txid: Hash256::from_bytes([1u8; 32]),
            index: 0,
        };
        let tx = spend_tx(outpoint, [0u8; 20], 500);
        let mut spent = HashSet::new();
        assert_eq!(
            validate_transaction(&tx, 0, 100, |_| None, &mut spent),
            Err(TransactionError::MissingUtxo(outpoint))
        );
    }

    #[test]
    fn rejects_immature_coinbase_input() {
        let kp = KeyPair::generate();
        let outpoint = OutPoint {
            txid: Hash256::from_bytes([2u8; 32]),
            index: 0,
        };
        let mut tx = spend_tx(outpoint, [9u8; 20], 900);
        crate::crypto::sign_transaction_input(&mut tx, 0, &kp).unwrap();

        let utxo = utxo_for(kp.public_key().hash160().to_vec(), 1000, 10, true);
        let mut spent = HashSet::new();
        // current_height=50, maturity=100: only 40 confirmations, not mature.
        assert_eq!(
            validate_transaction(&tx, 50, 100, |_| Some(utxo.clone()), &mut spent),
            Err(TransactionError::ImmatureCoinbase(outpoint))
        );
    }

    #[test]
    fn rejects_insufficient_input_value() {
        let kp = KeyPair::generate();
        let outpoint = OutPoint {
            txid: Hash256::from_bytes([3u8; 32]),
            index: 0,
        };
        let mut tx = spend_tx(outpoint, [9u8; 20], 2000);
        crate::crypto::sign_transaction_input(&mut tx, 0, &kp).unwrap();

        let utxo = utxo_for(kp.public_key().hash160().to_vec(), 1000, 0, false);
        let mut spent = HashSet::new();
        assert_eq!(
            validate_transaction(&tx, 1, 100, |_| Some(utxo.clone()), &mut spent),
            Err(TransactionError::InsufficientInputValue)
        );
    }

    #[test]
    fn rejects_script_verification_failure_for_wrong_signer() {
        let owner = KeyPair::generate();
        let attacker = KeyPair::generate();
        let outpoint = OutPoint {
            txid: Hash256::from_bytes([4u8; 32]),
            index: 0,
        };
        let mut tx = spend_tx(outpoint, [9u8; 20], 900);
        crate::crypto::sign_transaction_input(&mut tx, 0, &attacker).unwrap();

        let utxo = utxo_for(owner.public_key().hash160().to_vec(), 1000, 0, false);
        let mut spent = HashSet::new();
        assert_eq!(
            validate_transaction(&tx, 1, 100, |_| Some(utxo.clone()), &mut spent),
            Err(TransactionError::ScriptVerificationFailed(outpoint))
        );
    }

    #[test]
    fn rejects_duplicate_input_against_block_spent_set() {
        let kp = KeyPair::generate();
        let outpoint = OutPoint {
            txid: Hash256::from_bytes([5u8; 32]),
            index: 0,
        };
        let mut tx = spend_tx(outpoint, [9u8; 20], 900);
        crate::crypto::sign_transaction_input(&mut tx, 0, &kp).unwrap();

        let utxo = utxo_for(kp.public_key().hash160().to_vec(), 1000, 0, false);
        let mut spent = HashSet::new();
        spent.insert(outpoint);
        assert_eq!(
            validate_transaction(&tx, 1, 100, |_| Some(utxo.clone()), &mut spent),
            Err(TransactionError::DuplicateInput(outpoint))
        );
    }

    #[test]
    fn structure_check_rejects_negative_output() {
        let tx = Transaction {
            version: 1,
            inputs: vec![TransactionInput {
                prev_txid: Hash256::ZERO,
                prev_output_index: 0,
                signature_script: vec![],
                sequence: 0,
            }],
            outputs: vec![TransactionOutput {
                value: -1,
                pubkey_script: vec![0; 20],
            }],
            lock_time: 0,
        };
        assert_eq!(
            validate_transaction_structure(&tx),
            Err(TransactionError::NegativeOutput)
        );
    }

    #[test]
    fn structure_check_rejects_supply_overflow() {
        let tx = Transaction {
            version: 1,
            inputs: vec![TransactionInput {
                prev_txid: Hash256::ZERO,
                prev_output_index: 0,
                signature_script: vec![],
                sequence: 0,
            }],
            outputs: vec![TransactionOutput {
                value: MAX_SUPPLY + 1,
                pubkey_script: vec![0; 20],
            }],
            lock_time: 0,
        };
        assert_eq!(
            validate_transaction_structure(&tx),
            Err(TransactionError::OutputOverflow)
        );
    }
}
