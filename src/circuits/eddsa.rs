//! EdDSA over the embedded twisted Edwards curve
//!
//! The native half (key generation, signing, verification) is what witness
//! producers run; the gadget half re-derives the challenge scalar inside the
//! circuit and enforces the verification equation `s·G == R + t·P` as point
//! equality. The challenge is the Poseidon sponge over the nonce point, the
//! public key, and the message packed MSB-first into 253-bit field chunks.

use ark_ec::{AffineCurve, ProjectiveCurve};
use ark_ff::{BigInteger, Field, PrimeField, UniformRand, Zero};
use ark_r1cs_std::{
    prelude::{AllocVar, Boolean, CurveVar, EqGadget},
    ToBitsGadget,
};
use ark_relations::r1cs::{ConstraintSystemRef, SynthesisError};
use rand::Rng;

use crate::circuits::{
    constants::MESSAGE_CHUNK_BITS,
    gadgets::pack_bits_be,
    params::CircuitParameters,
    tree_hash::PoseidonHashGadget,
    EmbeddedPoint, EmbeddedPointVar, EmbeddedScalarField, SystemField,
};
use crate::hash;

/// A signature: the nonce point and the response scalar
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    /// The nonce point R
    pub r: EmbeddedPoint,
    /// The response scalar s
    pub s: EmbeddedScalarField,
}

/// A signing keypair on the embedded curve
#[derive(Clone, Debug)]
pub struct Keypair {
    /// The secret scalar
    pub secret: EmbeddedScalarField,
    /// The public point, secret · G
    pub public: EmbeddedPoint,
}

impl Keypair {
    /// Sample a fresh keypair
    pub fn generate<R: Rng>(rng: &mut R) -> Self {
        let secret = EmbeddedScalarField::rand(rng);
        let public = generator().mul(secret.into_repr()).into_affine();
        Self { secret, public }
    }
}

fn generator() -> EmbeddedPoint {
    EmbeddedPoint::prime_subgroup_generator()
}

/// The challenge scalar t = H(R.x, R.y, P.x, P.y, m̂), as a base-field element
pub fn challenge(
    params: &CircuitParameters,
    r: &EmbeddedPoint,
    public_key: &EmbeddedPoint,
    message: &[bool],
) -> SystemField {
    let mut inputs = vec![r.x, r.y, public_key.x, public_key.y];
    for chunk in message.chunks(MESSAGE_CHUNK_BITS) {
        inputs.push(pack_bits_be_native(chunk));
    }

    hash::poseidon_hash(&params.poseidon, &inputs)
}

/// Sign an MSB-first message bit string
pub fn sign<R: Rng>(
    params: &CircuitParameters,
    keypair: &Keypair,
    message: &[bool],
    rng: &mut R,
) -> Signature {
    let nonce = EmbeddedScalarField::rand(rng);
    let r = generator().mul(nonce.into_repr()).into_affine();

    let t = to_embedded_scalar(&challenge(params, &r, &keypair.public, message));
    Signature {
        r,
        s: nonce + t * keypair.secret,
    }
}

/// Native verification, mirroring the in-circuit equation
pub fn verify(
    params: &CircuitParameters,
    public_key: &EmbeddedPoint,
    message: &[bool],
    signature: &Signature,
) -> bool {
    let t = to_embedded_scalar(&challenge(params, &signature.r, public_key, message));

    let lhs = generator().mul(signature.s.into_repr());
    let rhs = signature.r.into_projective() + public_key.mul(t.into_repr());
    lhs == rhs
}

// The challenge is squeezed in the base field; its integer representation is
// reduced into the scalar field for the response. The circuit multiplies by
// the unreduced integer, which agrees on the prime-order subgroup.
fn to_embedded_scalar(x: &SystemField) -> EmbeddedScalarField {
    EmbeddedScalarField::from_le_bytes_mod_order(&x.into_repr().to_bytes_le())
}

fn pack_bits_be_native(bits: &[bool]) -> SystemField {
    bits.iter().fold(SystemField::zero(), |acc, bit| {
        let doubled = acc.double();
        if *bit {
            doubled + SystemField::from(1u64)
        } else {
            doubled
        }
    })
}

/// In-circuit EdDSA verification
pub struct EddsaVerifyGadget;

impl EddsaVerifyGadget {
    /// Enforce `s·G == R + t·P` for the message (MSB-first bits)
    pub fn verify(
        cs: ConstraintSystemRef<SystemField>,
        params: &CircuitParameters,
        public_key: &EmbeddedPointVar,
        sig_r: &EmbeddedPointVar,
        sig_s_bits: &[Boolean<SystemField>],
        message: &[Boolean<SystemField>],
    ) -> Result<(), SynthesisError> {
        let mut inputs = vec![
            sig_r.x.clone(),
            sig_r.y.clone(),
            public_key.x.clone(),
            public_key.y.clone(),
        ];
        for chunk in message.chunks(MESSAGE_CHUNK_BITS) {
            inputs.push(pack_bits_be(chunk)?);
        }

        let t = PoseidonHashGadget::hash(cs.clone(), &params.poseidon, &inputs)?;
        let t_bits = t.to_bits_le()?;

        let generator = EmbeddedPointVar::new_constant(cs, generator().into_projective())?;
        let lhs = generator.scalar_mul_le(sig_s_bits.iter())?;
        let rhs = public_key.scalar_mul_le(t_bits.iter())? + sig_r;

        lhs.enforce_equal(&rhs)
    }
}
