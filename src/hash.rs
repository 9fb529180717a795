//! Native implementations of the algebraic hash used by both Merkle trees
//!
//! Witness producers and tests hash with these functions; the in-circuit
//! gadgets in [`crate::circuits::tree_hash`] mirror them exactly, so a value
//! hashed here verifies against the corresponding constraint.

use ark_sponge::{
    poseidon::{PoseidonParameters, PoseidonSponge},
    CryptographicSponge, FieldBasedCryptographicSponge,
};

use crate::circuits::{
    constants::{POSEIDON_MDS_MATRIX_T_3, POSEIDON_ROUND_CONSTANTS_T_3},
    SystemField,
};

/// Domain tag prepended to every leaf hash
pub const LEAF_DOMAIN_TAG: u64 = 1;
/// Domain tag under which per-level Merkle IVs are derived
pub const NODE_DOMAIN_TAG: u64 = 2;

/// The Poseidon permutation used everywhere an algebraic hash is needed
///
/// t = 3 (rate 2, capacity 1) with the s-box x^5 mod p; x^5 was chosen
/// because gcd(5, p - 1) = 1 over the BN254 scalar field, making the s-box
/// invertible. The MDS matrix and round constants are fixed tables; hashes
/// are only compatible across provers that share them bit-for-bit.
pub fn default_poseidon_parameters() -> PoseidonParameters<SystemField> {
    PoseidonParameters::new(
        8,  /* full_rounds */
        19, /* partial_rounds */
        5,  /* alpha */
        POSEIDON_MDS_MATRIX_T_3(),
        POSEIDON_ROUND_CONSTANTS_T_3(),
    )
}

/// Sponge-hash a sequence of field elements down to one
pub fn poseidon_hash(
    params: &PoseidonParameters<SystemField>,
    inputs: &[SystemField],
) -> SystemField {
    let mut sponge = PoseidonSponge::new(params);
    for input in inputs {
        sponge.absorb(input);
    }
    sponge.squeeze_native_field_elements(1 /* num_elements */)[0]
}

/// Hash of a trading-history leaf holding a cumulative filled amount
pub fn filled_leaf_hash(
    params: &PoseidonParameters<SystemField>,
    filled: SystemField,
) -> SystemField {
    poseidon_hash(params, &[SystemField::from(LEAF_DOMAIN_TAG), filled, filled])
}

/// Hash of an accounts leaf; the owning public key and token are part of the
/// preimage, binding the balance to that key/token pair
pub fn account_leaf_hash(
    params: &PoseidonParameters<SystemField>,
    key_x: SystemField,
    key_y: SystemField,
    token: SystemField,
    balance: SystemField,
) -> SystemField {
    poseidon_hash(
        params,
        &[
            SystemField::from(LEAF_DOMAIN_TAG),
            key_x,
            key_y,
            token,
            balance,
        ],
    )
}

/// Per-level initial values for a Merkle tree of the given depth
///
/// Level i (leaves at level 0) compresses children as H(iv[i], left, right).
pub fn merkle_tree_ivs(
    params: &PoseidonParameters<SystemField>,
    depth: usize,
) -> Vec<SystemField> {
    (0..depth)
        .map(|level| {
            poseidon_hash(
                params,
                &[
                    SystemField::from(NODE_DOMAIN_TAG),
                    SystemField::from(level as u64),
                ],
            )
        })
        .collect()
}
