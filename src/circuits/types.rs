//! Witness data for a settlement batch and its constraint-system analogs
//!
//! The plain structs are the handoff surface for witness producers; the
//! corresponding `*Var` types allocate them inside the constraint system.
//! Authentication paths ("openings") are fresh witness per update and must be
//! consistent with both the old and new leaf under the same slot.

use ark_ec::AffineCurve;
use ark_ff::{BigInteger, PrimeField};
use ark_r1cs_std::{
    fields::fp::FpVar,
    prelude::{AllocVar, Boolean},
};
use ark_relations::r1cs::{ConstraintSystemRef, SynthesisError};

use crate::circuits::{
    constants::{
        ACCOUNT_BITS, AMOUNT_BITS, DEX_ID_BITS, ORDER_ID_BITS, WALLET_BITS,
    },
    eddsa::Signature,
    gadgets::DualVar,
    EmbeddedPoint, EmbeddedPointVar, EmbeddedScalarField, SystemField,
};

/// One limit order, as authorized by its owner's signature
///
/// Token identifiers are plain field elements; they are bound to real tokens
/// through the account leaves and the cross-order equalities, not by range.
#[derive(Clone, Debug)]
pub struct Order {
    /// Identifier of the exchange the order was placed on
    pub dex_id: u16,
    /// The order's slot within its selling account's trading history
    pub order_id: u8,
    /// Account sold from
    pub account_s: u32,
    /// Account bought into
    pub account_b: u32,
    /// Account fees are paid from
    pub account_f: u32,
    /// Maximum amount to sell
    pub amount_s: u128,
    /// Amount to buy at the limit price
    pub amount_b: u128,
    /// Maximum fee at full fill
    pub amount_f: u128,
    /// Identifier of the fee wallet
    pub wallet_f: u32,
    /// Token sold
    pub token_s: SystemField,
    /// Token bought
    pub token_b: SystemField,
    /// Token the fee is denominated in
    pub token_f: SystemField,
    /// The owner's public key; must match the key in the account leaves
    pub public_key: EmbeddedPoint,
    /// The owner's signature over the order fields
    pub signature: Signature,
}

/// Constraint-system analog of [`Order`]
pub struct OrderVar {
    /// dexID, range-checked to 16 bits
    pub dex_id: DualVar<SystemField>,
    /// orderID, range-checked to 4 bits
    pub order_id: DualVar<SystemField>,
    /// Selling account, range-checked to 24 bits
    pub account_s: DualVar<SystemField>,
    /// Buying account, range-checked to 24 bits
    pub account_b: DualVar<SystemField>,
    /// Fee account, range-checked to 24 bits
    pub account_f: DualVar<SystemField>,
    /// Sell amount, range-checked to 96 bits
    pub amount_s: DualVar<SystemField>,
    /// Buy amount, range-checked to 96 bits
    pub amount_b: DualVar<SystemField>,
    /// Fee amount, range-checked to 96 bits
    pub amount_f: DualVar<SystemField>,
    /// Fee wallet, range-checked to 24 bits
    pub wallet_f: DualVar<SystemField>,
    /// Token sold, free witness
    pub token_s: FpVar<SystemField>,
    /// Token bought, free witness
    pub token_b: FpVar<SystemField>,
    /// Fee token, free witness
    pub token_f: FpVar<SystemField>,
    /// The owner's public key
    pub public_key: EmbeddedPointVar,
    /// Signature nonce point
    pub sig_r: EmbeddedPointVar,
    /// Signature response scalar, as bits
    pub sig_s_bits: Vec<Boolean<SystemField>>,
}

impl OrderVar {
    /// Allocate an order as witness variables
    pub fn new_witness(
        cs: ConstraintSystemRef<SystemField>,
        order: &Order,
    ) -> Result<Self, SynthesisError> {
        let dex_id = DualVar::new_witness(
            ark_relations::ns!(cs, "dex_id"),
            || Ok(SystemField::from(order.dex_id)),
            DEX_ID_BITS,
        )?;
        let order_id = DualVar::new_witness(
            ark_relations::ns!(cs, "order_id"),
            || Ok(SystemField::from(order.order_id)),
            ORDER_ID_BITS,
        )?;
        let account_s = DualVar::new_witness(
            ark_relations::ns!(cs, "account_s"),
            || Ok(SystemField::from(order.account_s)),
            ACCOUNT_BITS,
        )?;
        let account_b = DualVar::new_witness(
            ark_relations::ns!(cs, "account_b"),
            || Ok(SystemField::from(order.account_b)),
            ACCOUNT_BITS,
        )?;
        let account_f = DualVar::new_witness(
            ark_relations::ns!(cs, "account_f"),
            || Ok(SystemField::from(order.account_f)),
            ACCOUNT_BITS,
        )?;
        let amount_s = DualVar::new_witness(
            ark_relations::ns!(cs, "amount_s"),
            || Ok(SystemField::from(order.amount_s)),
            AMOUNT_BITS,
        )?;
        let amount_b = DualVar::new_witness(
            ark_relations::ns!(cs, "amount_b"),
            || Ok(SystemField::from(order.amount_b)),
            AMOUNT_BITS,
        )?;
        let amount_f = DualVar::new_witness(
            ark_relations::ns!(cs, "amount_f"),
            || Ok(SystemField::from(order.amount_f)),
            AMOUNT_BITS,
        )?;
        let wallet_f = DualVar::new_witness(
            ark_relations::ns!(cs, "wallet_f"),
            || Ok(SystemField::from(order.wallet_f)),
            WALLET_BITS,
        )?;

        let token_s =
            FpVar::new_witness(ark_relations::ns!(cs, "token_s"), || Ok(order.token_s))?;
        let token_b =
            FpVar::new_witness(ark_relations::ns!(cs, "token_b"), || Ok(order.token_b))?;
        let token_f =
            FpVar::new_witness(ark_relations::ns!(cs, "token_f"), || Ok(order.token_f))?;

        let public_key = EmbeddedPointVar::new_witness(ark_relations::ns!(cs, "public_key"), || {
            Ok(order.public_key.into_projective())
        })?;
        let sig_r = EmbeddedPointVar::new_witness(ark_relations::ns!(cs, "sig_r"), || {
            Ok(order.signature.r.into_projective())
        })?;

        let s_repr_bits = order.signature.s.into_repr().to_bits_le();
        let sig_s_bits = (0..EmbeddedScalarField::size_in_bits())
            .map(|i| Boolean::new_witness(ark_relations::ns!(cs, "sig_s"), || Ok(s_repr_bits[i])))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            dex_id,
            order_id,
            account_s,
            account_b,
            account_f,
            amount_s,
            amount_b,
            amount_f,
            wallet_f,
            token_s,
            token_b,
            token_f,
            public_key,
            sig_r,
            sig_s_bits,
        })
    }

    /// The trading-history slot address, orderID bits then accountS bits
    pub fn filled_slot_bits(&self) -> Vec<Boolean<SystemField>> {
        let mut bits = self.order_id.bits.clone();
        bits.extend_from_slice(&self.account_s.bits);
        bits
    }
}

/// A matched pair of orders with the fills the operator chose for each leg
#[derive(Clone, Debug)]
pub struct Ring {
    /// First order
    pub order_a: Order,
    /// Second order
    pub order_b: Order,
    /// Amount of tokenS sold by A
    pub fill_s_a: u128,
    /// Amount of tokenB bought by A
    pub fill_b_a: u128,
    /// Fee paid by A
    pub fill_f_a: u128,
    /// Amount of tokenS sold by B
    pub fill_s_b: u128,
    /// Amount of tokenB bought by B
    pub fill_b_b: u128,
    /// Fee paid by B
    pub fill_f_b: u128,
}

/// Everything needed to replay one ring settlement inside the circuit
#[derive(Clone, Debug)]
pub struct RingSettlement {
    /// The ring being settled
    pub ring: Ring,

    /// Cumulative filled amount of order A before this settlement
    pub filled_a_before: u128,
    /// Cumulative filled amount of order B before this settlement
    pub filled_b_before: u128,
    /// Opening for order A's trading-history slot, taken before its update
    pub filled_opening_a: Vec<SystemField>,
    /// Opening for order B's trading-history slot, taken before its update
    pub filled_opening_b: Vec<SystemField>,

    /// A's selling balance before settlement
    pub balance_s_a_before: u128,
    /// A's buying balance before settlement
    pub balance_b_a_before: u128,
    /// A's fee balance before settlement
    pub balance_f_a_before: u128,
    /// A's fee-wallet bucket before settlement
    pub wallet_f_a_before: u128,
    /// B's selling balance before settlement
    pub balance_s_b_before: u128,
    /// B's buying balance before settlement
    pub balance_b_b_before: u128,
    /// B's fee balance before settlement
    pub balance_f_b_before: u128,
    /// B's fee-wallet bucket before settlement
    pub wallet_f_b_before: u128,

    /// Opening for A's selling account, taken before its update
    pub balance_opening_s_a: Vec<SystemField>,
    /// Opening for A's buying account
    pub balance_opening_b_a: Vec<SystemField>,
    /// Opening for A's fee account
    pub balance_opening_f_a: Vec<SystemField>,
    /// Opening for B's selling account
    pub balance_opening_s_b: Vec<SystemField>,
    /// Opening for B's buying account
    pub balance_opening_b_b: Vec<SystemField>,
    /// Opening for B's fee account
    pub balance_opening_f_b: Vec<SystemField>,
}

/// A batch of ring settlements between two snapshots of both trees
#[derive(Clone, Debug)]
pub struct SettlementBatch {
    /// Trading-history root before the batch
    pub trading_history_root_before: SystemField,
    /// Trading-history root after the batch
    pub trading_history_root_after: SystemField,
    /// Accounts root before the batch
    pub accounts_root_before: SystemField,
    /// Accounts root after the batch
    pub accounts_root_after: SystemField,
    /// The settlements, applied in order
    pub settlements: Vec<RingSettlement>,
}
