//! Constraint gadgets and the batch settlement circuit

pub mod batch;
pub mod constants;
pub mod eddsa;
pub mod gadgets;
pub mod order;
pub mod params;
pub mod settlement;
pub mod sha256;
pub mod tree_hash;
pub mod types;

#[cfg(test)]
pub(crate) mod fixtures;

/// The scalar field of the outer proving curve; every constraint in this
/// crate is expressed over it. It doubles as the base field of the embedded
/// twisted Edwards curve.
pub type SystemField = ark_ed_on_bn254::Fq;

/// Scalar field of the embedded curve; signature scalars live here
pub type EmbeddedScalarField = ark_ed_on_bn254::Fr;

/// Affine point on the embedded twisted Edwards curve
pub type EmbeddedPoint = ark_ed_on_bn254::EdwardsAffine;

/// Constraint-system analog of an embedded-curve point
pub type EmbeddedPointVar = ark_ed_on_bn254::constraints::EdwardsVar;
