//! The batch circuit: N chained ring settlements bound to one public input
//!
//! Ring j consumes the roots ring j-1 produced; the first ring starts from
//! the declared "before" roots and the last ring must land on the declared
//! "after" roots. The public data stream is hashed with SHA-256 in-circuit
//! and the digest is constrained against the 256-bit decomposition of the
//! single public input, so an on-chain verifier only ever hashes the public
//! data.

use ark_ff::{BigInteger, PrimeField};
use ark_r1cs_std::prelude::EqGadget;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::circuits::{
    gadgets::DualVar,
    order::push_uint_bits,
    params::CircuitParameters,
    settlement::RingSettlementGadget,
    sha256::Sha256Gadget,
    types::{Ring, SettlementBatch},
    SystemField,
};

const ROOT_BITS: usize = 256;

impl Ring {
    // The per-ring slice of the public data stream, in wire order
    fn append_public_data(&self, bits: &mut Vec<bool>) {
        for (order, partner, fill_s, fill_f) in [
            (&self.order_a, &self.order_b, self.fill_s_a, self.fill_f_a),
            (&self.order_b, &self.order_a, self.fill_s_b, self.fill_f_b),
        ] {
            push_uint_bits(bits, order.dex_id as u128, 16);
            push_uint_bits(bits, order.order_id as u128, 4);
            push_uint_bits(bits, order.account_s as u128, 24);
            push_uint_bits(bits, partner.account_b as u128, 24);
            push_uint_bits(bits, fill_s, 96);
            push_uint_bits(bits, order.account_f as u128, 24);
            push_uint_bits(bits, fill_f, 96);
        }
    }
}

impl SettlementBatch {
    /// The batch's public data as an MSB-first bit stream: both
    /// trading-history roots followed by each ring's transfers
    pub fn public_data_bits(&self) -> Vec<bool> {
        let mut bits = Vec::new();
        push_field_bits(&mut bits, &self.trading_history_root_before);
        push_field_bits(&mut bits, &self.trading_history_root_after);
        for settlement in &self.settlements {
            settlement.ring.append_public_data(&mut bits);
        }
        bits
    }

    /// The single public input: the SHA-256 digest of the public data,
    /// read big-endian and reduced into the field
    pub fn public_input(&self) -> SystemField {
        let bits = self.public_data_bits();
        debug_assert_eq!(bits.len() % 8, 0);

        let mut bytes = vec![0u8; bits.len() / 8];
        for (i, bit) in bits.iter().enumerate() {
            if *bit {
                bytes[i / 8] |= 1 << (7 - i % 8);
            }
        }

        SystemField::from_be_bytes_mod_order(&Sha256::digest(&bytes))
    }
}

fn push_field_bits(bits: &mut Vec<bool>, value: &SystemField) {
    let le = value.into_repr().to_bits_le();
    for i in (0..ROOT_BITS).rev() {
        bits.push(le[i]);
    }
}

/// The top-level settlement circuit; carries its witness by value
#[derive(Clone)]
pub struct SettlementCircuit {
    /// Tree depths, IVs, and hash parameters
    pub params: CircuitParameters,
    /// The witnessed batch
    pub batch: SettlementBatch,
}

impl ConstraintSynthesizer<SystemField> for SettlementCircuit {
    fn generate_constraints(
        self,
        cs: ConstraintSystemRef<SystemField>,
    ) -> Result<(), SynthesisError> {
        let public_data_hash = DualVar::new_input(
            ark_relations::ns!(cs, "public_data_hash"),
            || Ok(self.batch.public_input()),
            ROOT_BITS,
        )?;

        let trading_root_before = alloc_root(&cs, self.batch.trading_history_root_before)?;
        let trading_root_after = alloc_root(&cs, self.batch.trading_history_root_after)?;
        let accounts_root_before = alloc_root(&cs, self.batch.accounts_root_before)?;
        let accounts_root_after = alloc_root(&cs, self.batch.accounts_root_after)?;

        let mut public_data = Vec::new();
        public_data.extend(trading_root_before.bits_be());
        public_data.extend(trading_root_after.bits_be());

        // Thread both roots through the rings
        let mut trading_root = trading_root_before.packed.clone();
        let mut accounts_root = accounts_root_before.packed.clone();
        for settlement in &self.batch.settlements {
            let settled = RingSettlementGadget::apply(
                cs.clone(),
                &self.params,
                settlement,
                &trading_root,
                &accounts_root,
            )?;
            trading_root = settled.new_trading_history_root;
            accounts_root = settled.new_accounts_root;
            public_data.extend(settled.public_data);
        }

        // The batch must land on the declared closing roots
        trading_root.enforce_equal(&trading_root_after.packed)?;
        accounts_root.enforce_equal(&accounts_root_after.packed)?;

        // Bind the public data to the public input; the digest comes out
        // MSB-first while the input's decomposition is LSB-first
        let digest = Sha256Gadget::digest(&public_data)?;
        for i in 0..ROOT_BITS {
            digest[ROOT_BITS - 1 - i].enforce_equal(&public_data_hash.bits[i])?;
        }

        debug!(
            num_rings = self.batch.settlements.len(),
            num_constraints = cs.num_constraints(),
            "synthesized settlement batch"
        );

        Ok(())
    }
}

fn alloc_root(
    cs: &ConstraintSystemRef<SystemField>,
    value: SystemField,
) -> Result<DualVar<SystemField>, SynthesisError> {
    DualVar::new_witness(ark_relations::ns!(cs.clone(), "root"), || Ok(value), ROOT_BITS)
}

#[cfg(test)]
mod test {
    use ark_relations::r1cs::{ConstraintSystem, ConstraintSynthesizer};

    use crate::circuits::{
        fixtures::{happy_ring, second_ring, TestExchange},
        types::SettlementBatch,
        SystemField,
    };

    use super::SettlementCircuit;

    fn batch_satisfies(exchange: &TestExchange, batch: SettlementBatch) -> bool {
        let circuit = SettlementCircuit {
            params: exchange.params.clone(),
            batch,
        };
        let cs = ConstraintSystem::<SystemField>::new_ref();
        circuit.generate_constraints(cs.clone()).unwrap();
        cs.is_satisfied().unwrap()
    }

    fn settle_batch(
        exchange: &mut TestExchange,
        rings: Vec<crate::circuits::types::Ring>,
    ) -> SettlementBatch {
        let trading_history_root_before = exchange.trading_history_root();
        let accounts_root_before = exchange.accounts_root();

        let settlements = rings
            .into_iter()
            .map(|ring| exchange.settle(ring))
            .collect();

        SettlementBatch {
            trading_history_root_before,
            trading_history_root_after: exchange.trading_history_root(),
            accounts_root_before,
            accounts_root_after: exchange.accounts_root(),
            settlements,
        }
    }

    #[test]
    fn test_single_ring_batch() {
        let (mut exchange, ring) = happy_ring(41);
        let batch = settle_batch(&mut exchange, vec![ring]);
        assert!(batch_satisfies(&exchange, batch));
    }

    #[test]
    fn test_two_ring_chain() {
        let (mut exchange, first) = happy_ring(42);
        let second = second_ring(&mut exchange, 43);
        let batch = settle_batch(&mut exchange, vec![first, second]);
        assert!(batch_satisfies(&exchange, batch));
    }

    #[test]
    fn test_two_ring_chain_out_of_order() {
        let (mut exchange, first) = happy_ring(44);
        let second = second_ring(&mut exchange, 45);
        let mut batch = settle_batch(&mut exchange, vec![first, second]);
        // Swapping the settlements breaks the root chain
        batch.settlements.swap(0, 1);
        assert!(!batch_satisfies(&exchange, batch));
    }

    #[test]
    fn test_empty_batch() {
        let (exchange, _) = happy_ring(46);
        let batch = SettlementBatch {
            trading_history_root_before: exchange.trading_history_root(),
            trading_history_root_after: exchange.trading_history_root(),
            accounts_root_before: exchange.accounts_root(),
            accounts_root_after: exchange.accounts_root(),
            settlements: Vec::new(),
        };
        assert!(batch_satisfies(&exchange, batch));
    }

    #[test]
    fn test_empty_batch_root_change_rejected() {
        let (exchange, _) = happy_ring(47);
        let batch = SettlementBatch {
            trading_history_root_before: exchange.trading_history_root(),
            trading_history_root_after: exchange.trading_history_root()
                + SystemField::from(1u64),
            accounts_root_before: exchange.accounts_root(),
            accounts_root_after: exchange.accounts_root(),
            settlements: Vec::new(),
        };
        assert!(!batch_satisfies(&exchange, batch));
    }

    #[test]
    fn test_wrong_closing_trading_root_rejected() {
        let (mut exchange, ring) = happy_ring(48);
        let mut batch = settle_batch(&mut exchange, vec![ring]);
        batch.trading_history_root_after += SystemField::from(1u64);
        assert!(!batch_satisfies(&exchange, batch));
    }

    #[test]
    fn test_wrong_closing_accounts_root_rejected() {
        let (mut exchange, ring) = happy_ring(49);
        let mut batch = settle_batch(&mut exchange, vec![ring]);
        batch.accounts_root_after += SystemField::from(1u64);
        assert!(!batch_satisfies(&exchange, batch));
    }

    #[test]
    fn test_public_input_deterministic() {
        let (mut exchange, ring) = happy_ring(50);
        let batch = settle_batch(&mut exchange, vec![ring]);
        assert_eq!(batch.public_input(), batch.public_input());
        assert_eq!(
            batch.public_data_bits().len(),
            2 * 256 + 2 * (16 + 4 + 24 + 24 + 96 + 24 + 96)
        );
    }
}

#[cfg(test)]
mod proof_test {
    use ark_bn254::Bn254;
    use ark_groth16::{
        create_random_proof, generate_random_parameters, prepare_verifying_key, verify_proof,
    };
    use rand::rngs::OsRng;

    use crate::circuits::{fixtures::happy_ring, types::SettlementBatch};

    use super::SettlementCircuit;

    // Full Groth16 round trip over a one-ring batch. Slow in debug builds,
    // so it only runs when asked for explicitly.
    #[test]
    #[ignore]
    fn test_prove_single_ring_batch() {
        let (mut exchange, ring) = happy_ring(51);
        let trading_history_root_before = exchange.trading_history_root();
        let accounts_root_before = exchange.accounts_root();
        let settlement = exchange.settle(ring);

        let batch = SettlementBatch {
            trading_history_root_before,
            trading_history_root_after: exchange.trading_history_root(),
            accounts_root_before,
            accounts_root_after: exchange.accounts_root(),
            settlements: vec![settlement],
        };
        let public_input = batch.public_input();

        let circuit = SettlementCircuit {
            params: exchange.params.clone(),
            batch,
        };

        let mut rng = OsRng;
        let proving_key =
            generate_random_parameters::<Bn254, _, _>(circuit.clone(), &mut rng).unwrap();
        let verifying_key = prepare_verifying_key(&proving_key.vk);

        let proof = create_random_proof(circuit, &proving_key, &mut rng).unwrap();
        assert!(verify_proof(&verifying_key, &proof, &[public_input]).unwrap());
    }
}
