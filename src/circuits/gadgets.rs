//! Generic helper gadgets: bit decomposition, comparison, and the combined
//! subtract-one-add-other used for balance transfers

use std::marker::PhantomData;

use ark_ff::{BigInteger, PrimeField};
use ark_r1cs_std::{
    fields::fp::FpVar,
    prelude::{AllocVar, Boolean, EqGadget},
    R1CSVar,
};
use ark_relations::r1cs::{Namespace, SynthesisError};
use num_bigint::BigUint;

use super::constants::COMPARISON_BITS;

/// A packed field element bound to its little-endian bit decomposition
///
/// Allocating one both range-checks the value to `num_bits` and exposes the
/// bit view for message assembly and Merkle addressing. Widths above the
/// field size (the 256-bit roots and public input) bind the packing modulo
/// the field characteristic instead.
#[derive(Clone, Debug)]
pub struct DualVar<F: PrimeField> {
    /// The packed field element
    pub packed: FpVar<F>,
    /// Its bits, least significant first
    pub bits: Vec<Boolean<F>>,
}

impl<F: PrimeField> DualVar<F> {
    /// Allocate a witness value together with its bit decomposition
    pub fn new_witness(
        cs: impl Into<Namespace<F>>,
        value: impl FnOnce() -> Result<F, SynthesisError>,
        num_bits: usize,
    ) -> Result<Self, SynthesisError> {
        let ns = cs.into();
        let packed = FpVar::new_witness(ns.cs(), value)?;
        Self::from_fp(&packed, num_bits)
    }

    /// Allocate a public input together with its (witnessed) bit decomposition
    pub fn new_input(
        cs: impl Into<Namespace<F>>,
        value: impl FnOnce() -> Result<F, SynthesisError>,
        num_bits: usize,
    ) -> Result<Self, SynthesisError> {
        let ns = cs.into();
        let packed = FpVar::new_input(ns.cs(), value)?;
        Self::from_fp(&packed, num_bits)
    }

    /// Bind fresh bit variables to an already-allocated field element
    pub fn from_fp(packed: &FpVar<F>, num_bits: usize) -> Result<Self, SynthesisError> {
        let cs = packed.cs();

        let mut bits = Vec::with_capacity(num_bits);
        for i in 0..num_bits {
            bits.push(Boolean::new_witness(cs.clone(), || {
                Ok(packed.value()?.into_repr().to_bits_le()[i])
            })?);
        }

        // The inner product of the bits with 1, 2, 4, ... must recompose the
        // packed value; for num_bits below the field size this is the range
        // check
        Boolean::le_bits_to_fp_var(&bits)?.enforce_equal(packed)?;

        Ok(Self {
            packed: packed.clone(),
            bits,
        })
    }

    /// The bits most significant first, the order used on the wire
    pub fn bits_be(&self) -> Vec<Boolean<F>> {
        self.bits.iter().rev().cloned().collect()
    }
}

/// Pack an MSB-first bit slice into a field element
pub fn pack_bits_be<F: PrimeField>(bits: &[Boolean<F>]) -> Result<FpVar<F>, SynthesisError> {
    let le: Vec<Boolean<F>> = bits.iter().rev().cloned().collect();
    Boolean::le_bits_to_fp_var(&le)
}

/// 128-bit less-than-or-equal comparison
///
/// Callers guarantee both operands fit in [`COMPARISON_BITS`] bits; every
/// amount in the system is 96 bits, so sums of two amounts stay far below the
/// ceiling.
pub struct LeqGadget<F: PrimeField> {
    _phantom: PhantomData<F>,
}

impl<F: PrimeField> LeqGadget<F> {
    /// Returns (a < b, a <= b)
    pub fn compare(
        a: &FpVar<F>,
        b: &FpVar<F>,
    ) -> Result<(Boolean<F>, Boolean<F>), SynthesisError> {
        // 2^COMPARISON_BITS + b - a has its top bit set exactly when a <= b
        let shift = FpVar::Constant(F::from(BigUint::from(1u8) << COMPARISON_BITS));
        let shifted = shift + b - a;
        let decomposed = DualVar::from_fp(&shifted, COMPARISON_BITS + 1)?;

        let leq = decomposed.bits[COMPARISON_BITS].clone();
        let lt = leq.and(&a.is_neq(b)?)?;
        Ok((lt, leq))
    }

    /// Adds the constraint a <= b
    pub fn enforce_leq(a: &FpVar<F>, b: &FpVar<F>) -> Result<(), SynthesisError> {
        let (_, leq) = Self::compare(a, b)?;
        leq.enforce_equal(&Boolean::TRUE)
    }
}

/// Enforces the exact price-ratio invariant `amountS * fillB == amountB * fillS`
///
/// No rounding happens in-circuit; the prover must supply fills that divide
/// cleanly.
pub struct RateCheckerGadget<F: PrimeField> {
    _phantom: PhantomData<F>,
}

impl<F: PrimeField> RateCheckerGadget<F> {
    /// Constrain `fill_s : fill_b` to equal `amount_s : amount_b` exactly
    pub fn enforce(
        fill_s: &FpVar<F>,
        fill_b: &FpVar<F>,
        amount_s: &FpVar<F>,
        amount_b: &FpVar<F>,
    ) -> Result<(), SynthesisError> {
        let invariant = amount_s * fill_b;
        invariant.enforce_equal(&(amount_b * fill_s))
    }
}

/// Moves `amount` from one balance to another, range-checking both results
///
/// The range check on the debited side is what makes underflow unprovable:
/// `amount > from` puts `from - amount` above 2^num_bits.
pub struct SubAddGadget<F: PrimeField> {
    _phantom: PhantomData<F>,
}

impl<F: PrimeField> SubAddGadget<F> {
    /// Returns (from - amount, to + amount), both bound to num_bits bits
    pub fn sub_add(
        from: &FpVar<F>,
        to: &FpVar<F>,
        amount: &FpVar<F>,
        num_bits: usize,
    ) -> Result<(DualVar<F>, DualVar<F>), SynthesisError> {
        let from_after = from - amount;
        let to_after = to + amount;

        Ok((
            DualVar::from_fp(&from_after, num_bits)?,
            DualVar::from_fp(&to_after, num_bits)?,
        ))
    }
}
