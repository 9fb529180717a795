//! Poseidon hashing and Merkle authentication/update gadgets
//!
//! Every Merkle operation in the settlement circuit goes through
//! [`MerkleUpdateGadget::update_root`]: it first verifies the old leaf under
//! the claimed prior root, then recomputes the root for the new leaf along
//! the *same* sibling path. Sharing the siblings between both computations is
//! what makes the update sound; a prover cannot swap in a different path to
//! cover an illegal change.

use std::marker::PhantomData;

use ark_ff::PrimeField;
use ark_r1cs_std::{
    fields::fp::FpVar,
    prelude::{AllocVar, Boolean, CondSelectGadget, EqGadget},
};
use ark_relations::r1cs::{ConstraintSystemRef, SynthesisError};
use ark_sponge::{
    constraints::CryptographicSpongeVar,
    poseidon::{constraints::PoseidonSpongeVar, PoseidonParameters},
};

use crate::circuits::{params::CircuitParameters, EmbeddedPointVar, SystemField};
use crate::hash::LEAF_DOMAIN_TAG;

/// In-circuit counterpart of [`crate::hash::poseidon_hash`]
pub struct PoseidonHashGadget<F: PrimeField> {
    _phantom: PhantomData<F>,
}

impl<F: PrimeField> PoseidonHashGadget<F> {
    /// Sponge-hash a sequence of allocated field elements down to one
    pub fn hash(
        cs: ConstraintSystemRef<F>,
        params: &PoseidonParameters<F>,
        inputs: &[FpVar<F>],
    ) -> Result<FpVar<F>, SynthesisError> {
        let mut sponge = PoseidonSpongeVar::new(cs, params);
        for input in inputs {
            sponge.absorb(input)?;
        }

        Ok(sponge.squeeze_field_elements(1 /* num_elements */)?.remove(0))
    }
}

/// Recomputes a Merkle root from a leaf, its slot index, and a sibling path
pub struct MerklePathGadget<F: PrimeField> {
    _phantom: PhantomData<F>,
}

impl<F: PrimeField> MerklePathGadget<F> {
    /// Fold the leaf up the tree; index bit i selects whether the running
    /// node is the left or right child at level i
    pub fn compute_root(
        cs: ConstraintSystemRef<F>,
        poseidon: &PoseidonParameters<F>,
        ivs: &[F],
        index_bits: &[Boolean<F>],
        leaf: &FpVar<F>,
        path: &[FpVar<F>],
    ) -> Result<FpVar<F>, SynthesisError> {
        assert_eq!(index_bits.len(), path.len());
        assert_eq!(ivs.len(), path.len());

        let mut current = leaf.clone();
        for ((bit, sibling), iv) in index_bits.iter().zip(path).zip(ivs) {
            // Bit set means the running node sits on the right
            let left = FpVar::conditionally_select(bit, sibling, &current)?;
            let right = FpVar::conditionally_select(bit, &current, sibling)?;

            current = PoseidonHashGadget::hash(
                cs.clone(),
                poseidon,
                &[FpVar::Constant(*iv), left, right],
            )?;
        }

        Ok(current)
    }
}

/// Verifies a leaf replacement against a prior root and yields the new root
pub struct MerkleUpdateGadget<F: PrimeField> {
    _phantom: PhantomData<F>,
}

impl<F: PrimeField> MerkleUpdateGadget<F> {
    /// Constrain `leaf_before` to be included under `root_before`, then
    /// return the root obtained by writing `leaf_after` along the same
    /// sibling path
    #[allow(clippy::too_many_arguments)]
    pub fn update_root(
        cs: ConstraintSystemRef<F>,
        poseidon: &PoseidonParameters<F>,
        ivs: &[F],
        index_bits: &[Boolean<F>],
        leaf_before: &FpVar<F>,
        leaf_after: &FpVar<F>,
        path: &[FpVar<F>],
        root_before: &FpVar<F>,
    ) -> Result<FpVar<F>, SynthesisError> {
        let recomputed = MerklePathGadget::compute_root(
            cs.clone(),
            poseidon,
            ivs,
            index_bits,
            leaf_before,
            path,
        )?;
        recomputed.enforce_equal(root_before)?;

        MerklePathGadget::compute_root(cs, poseidon, ivs, index_bits, leaf_after, path)
    }
}

/// Result of applying a fill to a trading-history slot
pub struct FilledUpdate {
    /// The trading-history root after the update
    pub new_root: FpVar<SystemField>,
    /// The cumulative filled amount after the update, for the over-fill check
    pub filled_after: FpVar<SystemField>,
}

/// Adds a fill to the cumulative filled amount stored for an order slot
pub struct UpdateFilledGadget;

impl UpdateFilledGadget {
    /// Apply `fill` to the slot addressed by the low depth bits of
    /// `slot_bits`, against `root_before`
    pub fn apply(
        cs: ConstraintSystemRef<SystemField>,
        params: &CircuitParameters,
        root_before: &FpVar<SystemField>,
        slot_bits: &[Boolean<SystemField>],
        filled_before: SystemField,
        fill: &FpVar<SystemField>,
        opening: &[SystemField],
    ) -> Result<FilledUpdate, SynthesisError> {
        let depth = params.filled_tree_depth();

        let filled_before =
            FpVar::new_witness(ark_relations::ns!(cs, "filled_before"), || Ok(filled_before))?;
        let filled_after = &filled_before + fill;

        let tag = FpVar::Constant(SystemField::from(LEAF_DOMAIN_TAG));
        let leaf_before = PoseidonHashGadget::hash(
            cs.clone(),
            &params.poseidon,
            &[tag.clone(), filled_before.clone(), filled_before],
        )?;
        let leaf_after = PoseidonHashGadget::hash(
            cs.clone(),
            &params.poseidon,
            &[tag, filled_after.clone(), filled_after.clone()],
        )?;

        let path = allocate_opening(cs.clone(), opening)?;
        let new_root = MerkleUpdateGadget::update_root(
            cs,
            &params.poseidon,
            &params.filled_tree_ivs,
            &slot_bits[..depth],
            &leaf_before,
            &leaf_after,
            &path,
            root_before,
        )?;

        Ok(FilledUpdate {
            new_root,
            filled_after,
        })
    }
}

/// Rewrites one account's balance while binding the owning key and token
///
/// The public key and token appear in both the before- and after-leaf
/// preimage, so a balance can only move under the key and token stored in
/// the tree.
pub struct UpdateBalanceGadget;

impl UpdateBalanceGadget {
    /// Replace the balance of the account addressed by the low depth bits of
    /// `account_bits`, against `root_before`; returns the new accounts root
    #[allow(clippy::too_many_arguments)]
    pub fn apply(
        cs: ConstraintSystemRef<SystemField>,
        params: &CircuitParameters,
        root_before: &FpVar<SystemField>,
        account_bits: &[Boolean<SystemField>],
        public_key: &EmbeddedPointVar,
        token: &FpVar<SystemField>,
        balance_before: &FpVar<SystemField>,
        balance_after: &FpVar<SystemField>,
        opening: &[SystemField],
    ) -> Result<FpVar<SystemField>, SynthesisError> {
        let depth = params.accounts_tree_depth();

        let tag = FpVar::Constant(SystemField::from(LEAF_DOMAIN_TAG));
        let leaf_before = PoseidonHashGadget::hash(
            cs.clone(),
            &params.poseidon,
            &[
                tag.clone(),
                public_key.x.clone(),
                public_key.y.clone(),
                token.clone(),
                balance_before.clone(),
            ],
        )?;
        let leaf_after = PoseidonHashGadget::hash(
            cs.clone(),
            &params.poseidon,
            &[
                tag,
                public_key.x.clone(),
                public_key.y.clone(),
                token.clone(),
                balance_after.clone(),
            ],
        )?;

        let path = allocate_opening(cs.clone(), opening)?;
        MerkleUpdateGadget::update_root(
            cs,
            &params.poseidon,
            &params.accounts_tree_ivs,
            &account_bits[..depth],
            &leaf_before,
            &leaf_after,
            &path,
            root_before,
        )
    }
}

fn allocate_opening(
    cs: ConstraintSystemRef<SystemField>,
    opening: &[SystemField],
) -> Result<Vec<FpVar<SystemField>>, SynthesisError> {
    opening
        .iter()
        .map(|node| FpVar::new_witness(cs.clone(), || Ok(*node)))
        .collect()
}

#[cfg(test)]
mod hash_test {
    use ark_r1cs_std::{fields::fp::FpVar, prelude::AllocVar, R1CSVar};
    use ark_relations::r1cs::ConstraintSystem;

    use crate::circuits::SystemField;
    use crate::hash;

    use super::PoseidonHashGadget;

    #[test]
    fn test_matches_native_hash() {
        let params = hash::default_poseidon_parameters();
        let inputs = [
            SystemField::from(1u64),
            SystemField::from(42u64),
            SystemField::from(7u64),
        ];

        let cs = ConstraintSystem::<SystemField>::new_ref();
        let input_vars: Vec<FpVar<SystemField>> = inputs
            .iter()
            .map(|x| FpVar::new_witness(cs.clone(), || Ok(*x)).unwrap())
            .collect();

        let digest = PoseidonHashGadget::hash(cs.clone(), &params, &input_vars).unwrap();

        assert_eq!(digest.value().unwrap(), hash::poseidon_hash(&params, &inputs));
        assert!(cs.is_satisfied().unwrap());
    }
}
