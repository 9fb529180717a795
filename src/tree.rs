//! A native sparse Merkle tree over the circuit's Poseidon hash
//!
//! Witness producers maintain one instance per circuit tree (trading history
//! and accounts) and read authentication paths from it; the circuit verifies
//! those paths against the roots tracked here.

use std::collections::HashMap;

use ark_sponge::poseidon::PoseidonParameters;
use thiserror::Error;
use tracing::trace;

use crate::circuits::SystemField;
use crate::hash;

/// Errors raised by native tree operations
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    /// The requested slot does not exist at this depth
    #[error("slot {index} out of range for a tree of depth {depth}")]
    SlotOutOfRange {
        /// The offending leaf index
        index: u64,
        /// The tree's depth
        depth: usize,
    },
}

/// A fixed-depth binary Merkle tree storing only non-default nodes
///
/// Level i hashes its children as `H(iv[i], left, right)`; untouched subtrees
/// fall back to precomputed default nodes, so the tree supports the full
/// 2^depth key space at any depth used by the circuit.
pub struct SparseMerkleTree {
    depth: usize,
    poseidon: PoseidonParameters<SystemField>,
    ivs: Vec<SystemField>,
    empty: Vec<SystemField>,
    nodes: HashMap<(usize, u64), SystemField>,
}

impl SparseMerkleTree {
    /// Create an empty tree; the depth is the number of IVs supplied
    pub fn new(
        poseidon: PoseidonParameters<SystemField>,
        ivs: Vec<SystemField>,
        empty_leaf: SystemField,
    ) -> Self {
        let depth = ivs.len();
        let mut empty = vec![empty_leaf];
        for level in 0..depth {
            let child = empty[level];
            empty.push(hash::poseidon_hash(&poseidon, &[ivs[level], child, child]));
        }

        Self {
            depth,
            poseidon,
            ivs,
            empty,
            nodes: HashMap::new(),
        }
    }

    /// The tree's depth
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The current root
    pub fn root(&self) -> SystemField {
        self.node(self.depth, 0)
    }

    /// The current hash stored at the given leaf slot
    pub fn leaf(&self, index: u64) -> Result<SystemField, TreeError> {
        self.check_range(index)?;
        Ok(self.node(0, index))
    }

    /// Write a leaf hash and recompute the path to the root
    pub fn insert(&mut self, index: u64, leaf: SystemField) -> Result<(), TreeError> {
        self.check_range(index)?;
        trace!(index, "updating tree leaf");

        self.nodes.insert((0, index), leaf);
        let mut idx = index;
        for level in 0..self.depth {
            let parent = idx >> 1;
            let left = self.node(level, parent << 1);
            let right = self.node(level, (parent << 1) | 1);
            let digest = hash::poseidon_hash(&self.poseidon, &[self.ivs[level], left, right]);
            self.nodes.insert((level + 1, parent), digest);
            idx = parent;
        }

        Ok(())
    }

    /// The authentication path for a slot: one sibling per level, leaf first
    pub fn opening(&self, index: u64) -> Result<Vec<SystemField>, TreeError> {
        self.check_range(index)?;

        let mut path = Vec::with_capacity(self.depth);
        let mut idx = index;
        for level in 0..self.depth {
            path.push(self.node(level, idx ^ 1));
            idx >>= 1;
        }

        Ok(path)
    }

    fn node(&self, level: usize, index: u64) -> SystemField {
        *self.nodes.get(&(level, index)).unwrap_or(&self.empty[level])
    }

    fn check_range(&self, index: u64) -> Result<(), TreeError> {
        if self.depth < 64 && (index >> self.depth) != 0 {
            return Err(TreeError::SlotOutOfRange {
                index,
                depth: self.depth,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn test_tree(depth: usize) -> SparseMerkleTree {
        let poseidon = hash::default_poseidon_parameters();
        let ivs = hash::merkle_tree_ivs(&poseidon, depth);
        SparseMerkleTree::new(poseidon, ivs, SystemField::from(0u64))
    }

    // Fold a leaf up the tree along an opening, mirroring the circuit gadget
    fn fold_opening(
        tree: &SparseMerkleTree,
        index: u64,
        leaf: SystemField,
        opening: &[SystemField],
    ) -> SystemField {
        let mut current = leaf;
        for (level, sibling) in opening.iter().enumerate() {
            let bit = (index >> level) & 1 == 1;
            let (left, right) = if bit {
                (*sibling, current)
            } else {
                (current, *sibling)
            };
            current = hash::poseidon_hash(&tree.poseidon, &[tree.ivs[level], left, right]);
        }
        current
    }

    #[test]
    fn test_empty_roots_agree() {
        assert_eq!(test_tree(8).root(), test_tree(8).root());
        assert_ne!(test_tree(8).root(), test_tree(9).root());
    }

    #[test]
    fn test_opening_folds_to_root() {
        let mut tree = test_tree(8);
        for slot in [0u64, 1, 5, 200, 255] {
            tree.insert(slot, SystemField::from(slot + 1000)).unwrap();
        }

        for slot in [0u64, 5, 255, 17] {
            let leaf = tree.leaf(slot).unwrap();
            let opening = tree.opening(slot).unwrap();
            assert_eq!(fold_opening(&tree, slot, leaf, &opening), tree.root());
        }
    }

    #[test]
    fn test_insert_changes_root() {
        let mut tree = test_tree(8);
        let before = tree.root();
        tree.insert(42, SystemField::from(7u64)).unwrap();
        assert_ne!(before, tree.root());
    }

    #[test]
    fn test_out_of_range() {
        let mut tree = test_tree(4);
        assert_eq!(
            tree.insert(16, SystemField::from(1u64)),
            Err(TreeError::SlotOutOfRange {
                index: 16,
                depth: 4
            })
        );
        assert!(tree.opening(16).is_err());
    }
}
