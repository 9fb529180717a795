//! Bit-level SHA-256 over constraint-system booleans
//!
//! Consumes a message as an MSB-first bit stream, applies FIPS-180-4 padding
//! in-circuit (the padding bits are constants), and produces the 256-bit
//! digest MSB-first. Word arithmetic runs on `UInt32`; the sigma, choice, and
//! majority functions work directly on the bit vectors.

use std::marker::PhantomData;

use ark_ff::PrimeField;
use ark_r1cs_std::{prelude::Boolean, uint32::UInt32};
use ark_relations::r1cs::SynthesisError;

const BLOCK_BITS: usize = 512;
const LENGTH_BITS: usize = 64;

#[rustfmt::skip]
const ROUND_CONSTANTS: [u32; 64] = [
    0x428a2f98, 0x71374491, 0xb5c0fbcf, 0xe9b5dba5, 0x3956c25b, 0x59f111f1, 0x923f82a4, 0xab1c5ed5,
    0xd807aa98, 0x12835b01, 0x243185be, 0x550c7dc3, 0x72be5d74, 0x80deb1fe, 0x9bdc06a7, 0xc19bf174,
    0xe49b69c1, 0xefbe4786, 0x0fc19dc6, 0x240ca1cc, 0x2de92c6f, 0x4a7484aa, 0x5cb0a9dc, 0x76f988da,
    0x983e5152, 0xa831c66d, 0xb00327c8, 0xbf597fc7, 0xc6e00bf3, 0xd5a79147, 0x06ca6351, 0x14292967,
    0x27b70a85, 0x2e1b2138, 0x4d2c6dfc, 0x53380d13, 0x650a7354, 0x766a0abb, 0x81c2c92e, 0x92722c85,
    0xa2bfe8a1, 0xa81a664b, 0xc24b8b70, 0xc76c51a3, 0xd192e819, 0xd6990624, 0xf40e3585, 0x106aa070,
    0x19a4c116, 0x1e376c08, 0x2748774c, 0x34b0bcb5, 0x391c0cb3, 0x4ed8aa4a, 0x5b9cca4f, 0x682e6ff3,
    0x748f82ee, 0x78a5636f, 0x84c87814, 0x8cc70208, 0x90befffa, 0xa4506ceb, 0xbef9a3f7, 0xc67178f2,
];

#[rustfmt::skip]
const INITIAL_STATE: [u32; 8] = [
    0x6a09e667, 0xbb67ae85, 0x3c6ef372, 0xa54ff53a,
    0x510e527f, 0x9b05688c, 0x1f83d9ab, 0x5be0cd19,
];

/// SHA-256 compression over boolean streams
pub struct Sha256Gadget<F: PrimeField> {
    _phantom: PhantomData<F>,
}

impl<F: PrimeField> Sha256Gadget<F> {
    /// Hash an MSB-first bit stream of any length; returns 256 MSB-first bits
    pub fn digest(message: &[Boolean<F>]) -> Result<Vec<Boolean<F>>, SynthesisError> {
        let padded = Self::pad(message);
        debug_assert_eq!(padded.len() % BLOCK_BITS, 0);

        let mut state: Vec<UInt32<F>> =
            INITIAL_STATE.iter().map(|word| UInt32::constant(*word)).collect();

        for block in padded.chunks(BLOCK_BITS) {
            state = Self::compress(&state, block)?;
        }

        // Emit h0..h7, each word big-endian
        Ok(state
            .iter()
            .flat_map(|word| word.to_bits_le().into_iter().rev())
            .collect())
    }

    // FIPS-180-4 §5.1.1: append a single 1 bit, zero-fill to 448 mod 512,
    // then the message length as a 64-bit big-endian integer
    fn pad(message: &[Boolean<F>]) -> Vec<Boolean<F>> {
        let length = message.len() as u64;

        let mut padded = message.to_vec();
        padded.push(Boolean::TRUE);
        while padded.len() % BLOCK_BITS != BLOCK_BITS - LENGTH_BITS {
            padded.push(Boolean::FALSE);
        }
        for i in (0..LENGTH_BITS).rev() {
            padded.push(Boolean::constant((length >> i) & 1 == 1));
        }

        padded
    }

    fn compress(
        state: &[UInt32<F>],
        block: &[Boolean<F>],
    ) -> Result<Vec<UInt32<F>>, SynthesisError> {
        // Message schedule; words are 32-bit big-endian slices of the stream
        let mut w: Vec<UInt32<F>> = block
            .chunks(32)
            .map(|chunk| {
                let le: Vec<Boolean<F>> = chunk.iter().rev().cloned().collect();
                UInt32::from_bits_le(&le)
            })
            .collect();
        for i in 16..64 {
            let s0 = Self::sigma(&w[i - 15], 7, 18, 3)?;
            let s1 = Self::sigma(&w[i - 2], 17, 19, 10)?;
            w.push(UInt32::addmany(&[
                w[i - 16].clone(),
                s0,
                w[i - 7].clone(),
                s1,
            ])?);
        }

        let mut a = state[0].clone();
        let mut b = state[1].clone();
        let mut c = state[2].clone();
        let mut d = state[3].clone();
        let mut e = state[4].clone();
        let mut f = state[5].clone();
        let mut g = state[6].clone();
        let mut h = state[7].clone();

        for i in 0..64 {
            let t1 = UInt32::addmany(&[
                h.clone(),
                Self::big_sigma(&e, 6, 11, 25)?,
                Self::choice(&e, &f, &g)?,
                UInt32::constant(ROUND_CONSTANTS[i]),
                w[i].clone(),
            ])?;
            let t2 = UInt32::addmany(&[
                Self::big_sigma(&a, 2, 13, 22)?,
                Self::majority(&a, &b, &c)?,
            ])?;

            h = g;
            g = f;
            f = e;
            e = UInt32::addmany(&[d, t1.clone()])?;
            d = c;
            c = b;
            b = a;
            a = UInt32::addmany(&[t1, t2])?;
        }

        let feedforward = [a, b, c, d, e, f, g, h];
        state
            .iter()
            .zip(feedforward.iter())
            .map(|(prev, new)| UInt32::addmany(&[prev.clone(), new.clone()]))
            .collect()
    }

    // rotr(r1) ^ rotr(r2) ^ shr(shift)
    fn sigma(
        word: &UInt32<F>,
        r1: usize,
        r2: usize,
        shift: usize,
    ) -> Result<UInt32<F>, SynthesisError> {
        let bits = word.to_bits_le();
        let mut out = Vec::with_capacity(32);
        for i in 0..32 {
            let rotated = bits[(i + r1) % 32].xor(&bits[(i + r2) % 32])?;
            out.push(if i + shift < 32 {
                rotated.xor(&bits[i + shift])?
            } else {
                rotated
            });
        }
        Ok(UInt32::from_bits_le(&out))
    }

    // rotr(r1) ^ rotr(r2) ^ rotr(r3)
    fn big_sigma(
        word: &UInt32<F>,
        r1: usize,
        r2: usize,
        r3: usize,
    ) -> Result<UInt32<F>, SynthesisError> {
        word.rotr(r1).xor(&word.rotr(r2))?.xor(&word.rotr(r3))
    }

    // (e & f) ^ (!e & g), rewritten as (e & f) ^ (e & g) ^ g to avoid negation
    fn choice(
        e: &UInt32<F>,
        f: &UInt32<F>,
        g: &UInt32<F>,
    ) -> Result<UInt32<F>, SynthesisError> {
        let e_bits = e.to_bits_le();
        let f_bits = f.to_bits_le();
        let g_bits = g.to_bits_le();

        let mut out = Vec::with_capacity(32);
        for i in 0..32 {
            let ef = e_bits[i].and(&f_bits[i])?;
            let eg = e_bits[i].and(&g_bits[i])?;
            out.push(ef.xor(&eg)?.xor(&g_bits[i])?);
        }
        Ok(UInt32::from_bits_le(&out))
    }

    // (a & b) ^ (a & c) ^ (b & c)
    fn majority(
        a: &UInt32<F>,
        b: &UInt32<F>,
        c: &UInt32<F>,
    ) -> Result<UInt32<F>, SynthesisError> {
        let a_bits = a.to_bits_le();
        let b_bits = b.to_bits_le();
        let c_bits = c.to_bits_le();

        let mut out = Vec::with_capacity(32);
        for i in 0..32 {
            let ab = a_bits[i].and(&b_bits[i])?;
            let ac = a_bits[i].and(&c_bits[i])?;
            let bc = b_bits[i].and(&c_bits[i])?;
            out.push(ab.xor(&ac)?.xor(&bc)?);
        }
        Ok(UInt32::from_bits_le(&out))
    }
}
