//! RFC 6962 Merkle tree hashing and inclusion proof verification.

use sha2::{Digest, Sha256};

use crate::error::CtError;

const LEAF_HASH_PREFIX: u8 = 0x00;
const NODE_HASH_PREFIX: u8 = 0x01;

/// `MTH({d})`: the RFC 6962 leaf hash of a single input.
pub fn leaf_hash(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update([LEAF_HASH_PREFIX]);
    hasher.update(data);
    hasher.finalize().into()
}

fn hash_children(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update([NODE_HASH_PREFIX]);
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Verifies that `leaf` at `leaf_index` is included in a tree of `tree_size`
/// leaves with the given Merkle root, per the audit path algorithm in RFC
/// 6962 §2.1.1. `proof` is root-ward, i.e. the entry closest to the leaf
/// comes first.
pub fn verify_inclusion(
    leaf: &[u8; 32],
    leaf_index: u64,
    tree_size: u64,
    proof: &[[u8; 32]],
    root: &[u8; 32],
) -> Result<(), CtError> {
    if leaf_index >= tree_size {
        return Err(CtError::InclusionMismatch);
    }

    let mut node = leaf_index;
    let mut last_node = tree_size - 1;
    let mut hash = *leaf;
    let mut proof_idx = 0usize;

    while last_node > 0 {
        if node % 2 == 1 {
            let sibling = proof.get(proof_idx).ok_or(CtError::InclusionMismatch)?;
            hash = hash_children(sibling, &hash);
            proof_idx += 1;
        } else if node < last_node {
            let sibling = proof.get(proof_idx).ok_or(CtError::InclusionMismatch)?;
            hash = hash_children(&hash, sibling);
            proof_idx += 1;
        }
        // else: node == last_node and even; rightmost node at this level
        // has no sibling, so the hash is promoted unchanged.
        node /= 2;
        last_node /= 2;
    }

    if proof_idx != proof.len() {
        return Err(CtError::InclusionMismatch);
    }
    if hash != *root {
        return Err(CtError::InclusionMismatch);
    }
    Ok(())
}
