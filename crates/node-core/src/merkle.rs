//! Merkle tree over transaction ids.
//!
//! Preserves Bitcoin's historical odd-count duplication bug: whenever a
//! level has an odd number of elements greater than one, the last element
//! is duplicated before pairing. This applies at every level, leaf and
//! interior alike, not just the bottom one.

use crate::encoding::double_sha256;
use crate::types::Hash256;

/// Compute the merkle root of an ordered list of txids.
///
/// An empty list yields [`Hash256::ZERO`]. A single txid is its own root.
pub fn merkle_root(txids: &[Hash256]) -> Hash256 {
    if txids.is_empty() {
        return Hash256::ZERO;
    }
    let mut level: Vec<Hash256> = txids.to_vec();
    while level.len() > 1 {
        level = next_layer(&level);
    }
    level[0]
}

fn next_layer(level: &[Hash256]) -> Vec<Hash256> {
    let mut padded = level.to_vec();
    if padded.len() % 2 == 1 {
        padded.push(*padded.last().unwrap());
    }
    padded
        .chunks(2)
        .map(|pair| hash_pair(&pair[0], &pair[1]))
        .collect()
}

fn hash_pair(left: &Hash256, right: &Hash256) -> Hash256 {
    let mut buf = Vec::with_capacity(64);
    buf.extend_from_slice(left.as_bytes());
    buf.extend_from_slice(right.as_bytes());
    Hash256::from_bytes(double_sha256(&buf))
}

/// One step of a merkle proof: the sibling hash and whether it sits to the
/// left of the node being proven.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProofStep {
    pub sibling: Hash256,
    pub sibling_is_left: bool,
}

/// Build an ordered sibling path proving that `txids[index]` is included
/// under `merkle_root(txids)`.
///
/// Returns `None` if `index` is out of range.
pub fn merkle_proof(txids: &[Hash256], index: usize) -> Option<Vec<ProofStep>> {
    if index >= txids.len() {
        return None;
    }
    let mut proof = Vec::new();
    let mut level: Vec<Hash256> = txids.to_vec();
    let mut pos = index;
    while level.len() > 1 {
        let mut padded = level.clone();
        if padded.len() % 2 == 1 {
            padded.push(*padded.last().unwrap());
        }
        let pair_index = pos / 2;
        let is_left = pos % 2 == 0;
        let sibling_index = if is_left { pair_index * 2 + 1 } else { pair_index * 2 };
        proof.push(ProofStep {
            sibling: padded[sibling_index],
            sibling_is_left: !is_left,
        });
        level = padded
            .chunks(2)
            .map(|pair| hash_pair(&pair[0], &pair[1]))
            .collect();
        pos = pair_index;
    }
    Some(proof)
}

/// Recompute the merkle root from a leaf and its proof path.
pub fn verify_merkle_proof(leaf: Hash256, proof: &[ProofStep]) -> Hash256 {
    proof.iter().fold(leaf, |acc, step| {
        if step.sibling_is_left {
            hash_pair(&step.sibling, &acc)
        } else {
            hash_pair(&acc, &step.sibling)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(n: u8) -> Hash256 {
        Hash256::from_bytes([n; 32])
    }

    #[test]
    fn empty_list_has_zero_root() {
        assert_eq!(merkle_root(&[]), Hash256::ZERO);
    }

    #[test]
    fn single_txid_is_its_own_root() {
        let tx = leaf(1);
        assert_eq!(merkle_root(&[tx]), tx);
    }

    #[test]
    fn two_txids_hash_to_their_pair() {
        let a = leaf(1);
        let b = leaf(2);
        assert_eq!(merkle_root(&[a, b]), hash_pair(&a, &b));
    }

    #[test]
    fn three_txids_duplicates_last_at_leaf_level() {
        let a = leaf(1);
        let b = leaf(2);
        let c = leaf(3);
        let left = hash_pair(&a, &b);
        let right = hash_pair(&c, &c);
        assert_eq!(merkle_root(&[a, b, c]), hash_pair(&left, &right));
    }

    #[test]
    fn five_txids_duplicates_at_every_odd_level() {
        // 5 leaves -> pad to 6 -> 3 parents -> pad to 4 -> 2 -> 1.
        let txids: Vec<Hash256> = (1..=5u8).map(leaf).collect();
        let level1 = next_layer(&txids);
        assert_eq!(level1.len(), 3);
        let level2 = next_layer(&level1);
        assert_eq!(level2.len(), 2);
        let expected = hash_pair(&level2[0], &level2[1]);
        assert_eq!(merkle_root(&txids), expected);
    }

    #[test]
    fn order_sensitive() {
        let a = leaf(1);
        let b = leaf(2);
        assert_ne!(merkle_root(&[a, b]), merkle_root(&[b, a]));
    }

    #[test]
    fn proof_round_trip_even_count() {
        let txids: Vec<Hash256> = (1..=4u8).map(leaf).collect();
        let root = merkle_root(&txids);
        for (i, txid) in txids.iter().enumerate() {
            let proof = merkle_proof(&txids, i).unwrap();
            assert_eq!(verify_merkle_proof(*txid, &proof), root);
        }
    }

    #[test]
    fn proof_round_trip_odd_count() {
        let txids: Vec<Hash256> = (1..=5u8).map(leaf).collect();
        let root = merkle_root(&txids);
        for (i, txid) in txids.iter().enumerate() {
            let proof = merkle_proof(&txids, i).unwrap();
            assert_eq!(verify_merkle_proof(*txid, &proof), root);
        }
    }

    #[test]
    fn proof_out_of_range_is_none() {
        let txids: Vec<Hash256> = (1..=3u8).map(leaf).collect();
        assert_eq!(merkle_proof(&txids, 3), None);
    }

    #[test]
    fn single_leaf_proof_is_empty_and_self_verifying() {
        let tx = leaf(9);
        let proof = merkle_proof(&[tx], 0).unwrap();
        assert!(proof.is_empty());
        assert_eq!(verify_merkle_proof(tx, &proof), tx);
    }
}
