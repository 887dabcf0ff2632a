//! Merkle tree over the active transfers of a channel.
//!
//! Leaves are the hashes of the [CoreTransferState]s ordered by transfer id,
//! so both participants compute the same root for the same set of transfers
//! regardless of the order they learned about them. Inner nodes hash the
//! sorted pair of their children, a node without a sibling moves up
//! unchanged. The root of an empty tree is the zero hash.

use crate::{
    abiencode::{self, hashing::keccak256, types::Hash},
    channel::CoreTransferState,
};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MerkleError {
    #[error("failed to hash transfer: {0}")]
    Encoding(#[from] abiencode::Error),
    #[error("transfer {0} is contained twice")]
    DuplicateTransfer(Hash),
    #[error("merkle root mismatch, expected {expected}, computed {computed}")]
    RootMismatch { expected: Hash, computed: Hash },
    #[error("invalid inclusion proof for transfer {0}")]
    InvalidProof(Hash),
}

impl MerkleError {
    pub fn reason(&self) -> &'static str {
        match self {
            MerkleError::Encoding(_) => "EncodingFailed",
            MerkleError::DuplicateTransfer(_) => "DuplicateTransfer",
            MerkleError::RootMismatch { .. } => "InvalidMerkleRoot",
            MerkleError::InvalidProof(_) => "InvalidMerkleProof",
        }
    }
}

pub type Proof = Vec<Hash>;

pub fn hash_pair(a: &Hash, b: &Hash) -> Hash {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(&first.0);
    buf[32..].copy_from_slice(&second.0);
    keccak256(&buf)
}

#[derive(Debug, Clone)]
pub struct TransferTree {
    /// `layers[0]` are the leaves, the last layer holds the root.
    layers: Vec<Vec<Hash>>,
    /// Leaf position of each transfer.
    positions: HashMap<Hash, usize>,
}

/// Build the tree over `transfers`, in any order.
pub fn build_tree<'a, I>(transfers: I) -> Result<TransferTree, MerkleError>
where
    I: IntoIterator<Item = &'a CoreTransferState>,
{
    let mut sorted: Vec<&CoreTransferState> = transfers.into_iter().collect();
    sorted.sort_by_key(|t| t.transfer_id);

    let mut positions = HashMap::with_capacity(sorted.len());
    let mut leaves = Vec::with_capacity(sorted.len());
    for (pos, transfer) in sorted.iter().enumerate() {
        if positions.insert(transfer.transfer_id, pos).is_some() {
            return Err(MerkleError::DuplicateTransfer(transfer.transfer_id));
        }
        leaves.push(transfer.hash()?);
    }

    let mut layers = vec![leaves];
    while let Some(layer) = layers.last().filter(|l| l.len() > 1) {
        let next = layer
            .chunks(2)
            .map(|pair| match pair {
                [a, b] => hash_pair(a, b),
                [a] => *a,
                _ => unreachable!("chunks(2) yields one or two elements"),
            })
            .collect();
        layers.push(next);
    }

    Ok(TransferTree { layers, positions })
}

/// Root of the tree over `transfers`.
pub fn compute_root<'a, I>(transfers: I) -> Result<Hash, MerkleError>
where
    I: IntoIterator<Item = &'a CoreTransferState>,
{
    Ok(build_tree(transfers)?.root())
}

impl TransferTree {
    pub fn root(&self) -> Hash {
        self.layers
            .last()
            .and_then(|l| l.first())
            .copied()
            .unwrap_or(Hash::ZERO)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Sibling hashes from the leaf of `transfer_id` up to the root.
    pub fn proof(&self, transfer_id: &Hash) -> Option<Proof> {
        let mut pos = *self.positions.get(transfer_id)?;
        let mut proof = Vec::new();
        for layer in &self.layers[..self.layers.len() - 1] {
            let sibling = pos ^ 1;
            if let Some(hash) = layer.get(sibling) {
                proof.push(*hash);
            }
            pos /= 2;
        }
        Some(proof)
    }

    /// Proofs of all transfers in the tree.
    pub fn proofs(&self) -> HashMap<Hash, Proof> {
        self.positions
            .keys()
            .filter_map(|id| self.proof(id).map(|p| (*id, p)))
            .collect()
    }
}

/// Check that `leaf` is part of the tree with root `root`.
pub fn verify_proof(leaf: Hash, proof: &[Hash], root: Hash) -> bool {
    proof.iter().fold(leaf, |node, sibling| hash_pair(&node, sibling)) == root
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::core_transfer;

    fn transfers(n: u8) -> Vec<CoreTransferState> {
        (1..=n).map(core_transfer).collect()
    }

    #[test]
    fn empty_root_is_zero() {
        let tree = build_tree(&[]).unwrap();
        assert_eq!(tree.root(), Hash::ZERO);
        assert!(tree.is_empty());
    }

    #[test]
    fn single_leaf_is_root() {
        let t = transfers(1);
        let tree = build_tree(&t).unwrap();
        assert_eq!(tree.root(), t[0].hash().unwrap());
        assert_eq!(tree.proof(&t[0].transfer_id), Some(vec![]));
    }

    #[test]
    fn root_is_independent_of_order() {
        let t = transfers(5);
        let expected = compute_root(&t).unwrap();

        let mut reversed = t.clone();
        reversed.reverse();
        assert_eq!(compute_root(&reversed).unwrap(), expected);

        let rotated: Vec<_> = t[2..].iter().chain(&t[..2]).cloned().collect();
        assert_eq!(compute_root(&rotated).unwrap(), expected);
    }

    #[test]
    fn proofs_verify_for_every_size() {
        for n in 1..=7 {
            let t = transfers(n);
            let tree = build_tree(&t).unwrap();
            for transfer in &t {
                let proof = tree.proof(&transfer.transfer_id).unwrap();
                assert!(
                    verify_proof(transfer.hash().unwrap(), &proof, tree.root()),
                    "proof for {} of {n} transfers",
                    transfer.transfer_id
                );
            }
            assert_eq!(tree.proofs().len(), n as usize);
        }
    }

    #[test]
    fn proof_fails_for_other_leaf() {
        let t = transfers(4);
        let tree = build_tree(&t).unwrap();
        let proof = tree.proof(&t[0].transfer_id).unwrap();
        assert!(!verify_proof(t[1].hash().unwrap(), &proof, tree.root()));
    }

    #[test]
    fn add_then_remove_restores_root() {
        let t = transfers(3);
        let before = compute_root(&t[..2]).unwrap();
        let with_new = compute_root(&t).unwrap();
        assert_ne!(before, with_new);
        assert_eq!(compute_root(&t[..2]).unwrap(), before);
    }

    #[test]
    fn duplicate_transfer_is_rejected() {
        let mut t = transfers(2);
        t.push(t[0].clone());
        assert_eq!(
            build_tree(&t).unwrap_err(),
            MerkleError::DuplicateTransfer(t[0].transfer_id)
        );
    }
}
