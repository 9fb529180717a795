//! Immutable circuit-wide parameters, threaded through gadget construction

use ark_sponge::poseidon::PoseidonParameters;

use crate::circuits::constants::{TREE_DEPTH_ACCOUNTS, TREE_DEPTH_FILLED};
use crate::circuits::SystemField;
use crate::hash;

/// Everything the gadgets need beyond their witness: the Poseidon
/// parameterization and the per-level IVs (and thereby depths) of both
/// Merkle trees.
///
/// Holding these in one value rather than process-global state lets tests run
/// parameter variants (notably shallow trees) side by side.
#[derive(Clone)]
pub struct CircuitParameters {
    /// Poseidon permutation parameters backing every algebraic hash
    pub poseidon: PoseidonParameters<SystemField>,
    /// Per-level IVs of the trading-history tree; the length is the depth
    pub filled_tree_ivs: Vec<SystemField>,
    /// Per-level IVs of the accounts tree; the length is the depth
    pub accounts_tree_ivs: Vec<SystemField>,
}

impl CircuitParameters {
    /// Build parameters for the given tree depths
    pub fn new(filled_tree_depth: usize, accounts_tree_depth: usize) -> Self {
        let poseidon = hash::default_poseidon_parameters();
        let filled_tree_ivs = hash::merkle_tree_ivs(&poseidon, filled_tree_depth);
        let accounts_tree_ivs = hash::merkle_tree_ivs(&poseidon, accounts_tree_depth);

        Self {
            poseidon,
            filled_tree_ivs,
            accounts_tree_ivs,
        }
    }

    /// Depth of the trading-history tree
    pub fn filled_tree_depth(&self) -> usize {
        self.filled_tree_ivs.len()
    }

    /// Depth of the accounts tree
    pub fn accounts_tree_depth(&self) -> usize {
        self.accounts_tree_ivs.len()
    }
}

impl Default for CircuitParameters {
    fn default() -> Self {
        Self::new(TREE_DEPTH_FILLED, TREE_DEPTH_ACCOUNTS)
    }
}
