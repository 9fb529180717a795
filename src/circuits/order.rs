//! The message each order's owner signs, and its in-circuit verification
//!
//! The signed message is the MSB-first concatenation
//! `dexID ‖ orderID ‖ accountS ‖ accountB ‖ accountF ‖ amountS ‖ amountB ‖ amountF`.
//! Token identifiers and the fee wallet are deliberately outside the
//! signature; tokens are bound through the account leaves instead.

use ark_r1cs_std::prelude::Boolean;
use ark_relations::r1cs::{ConstraintSystemRef, SynthesisError};

use crate::circuits::{
    constants::{ACCOUNT_BITS, AMOUNT_BITS, DEX_ID_BITS, ORDER_ID_BITS},
    eddsa::EddsaVerifyGadget,
    params::CircuitParameters,
    types::{Order, OrderVar},
    SystemField,
};

impl Order {
    /// The bits the owner signs, MSB-first per field
    pub fn signed_message_bits(&self) -> Vec<bool> {
        let mut bits = Vec::new();
        push_uint_bits(&mut bits, self.dex_id as u128, DEX_ID_BITS);
        push_uint_bits(&mut bits, self.order_id as u128, ORDER_ID_BITS);
        push_uint_bits(&mut bits, self.account_s as u128, ACCOUNT_BITS);
        push_uint_bits(&mut bits, self.account_b as u128, ACCOUNT_BITS);
        push_uint_bits(&mut bits, self.account_f as u128, ACCOUNT_BITS);
        push_uint_bits(&mut bits, self.amount_s, AMOUNT_BITS);
        push_uint_bits(&mut bits, self.amount_b, AMOUNT_BITS);
        push_uint_bits(&mut bits, self.amount_f, AMOUNT_BITS);
        bits
    }
}

pub(crate) fn push_uint_bits(bits: &mut Vec<bool>, value: u128, width: usize) {
    for i in (0..width).rev() {
        bits.push((value >> i) & 1 == 1);
    }
}

/// Wires an allocated order's fields into its signature check
pub struct OrderGadget;

impl OrderGadget {
    /// The allocated counterpart of [`Order::signed_message_bits`]
    pub fn signed_message_bits(order: &OrderVar) -> Vec<Boolean<SystemField>> {
        let mut bits = Vec::new();
        for field in [
            &order.dex_id,
            &order.order_id,
            &order.account_s,
            &order.account_b,
            &order.account_f,
            &order.amount_s,
            &order.amount_b,
            &order.amount_f,
        ] {
            bits.extend(field.bits_be());
        }
        bits
    }

    /// Enforce the owner's signature over the order's signed fields
    pub fn verify_signature(
        cs: ConstraintSystemRef<SystemField>,
        params: &CircuitParameters,
        order: &OrderVar,
    ) -> Result<(), SynthesisError> {
        let message = Self::signed_message_bits(order);
        EddsaVerifyGadget::verify(
            cs,
            params,
            &order.public_key,
            &order.sig_r,
            &order.sig_s_bits,
            &message,
        )
    }
}
