//! The settlement state machine for a single order ring
//!
//! Every constraint here must hold; there is no in-circuit branching, so a
//! ring that fails any check makes the whole batch unprovable rather than
//! being skipped.

use ark_r1cs_std::{fields::fp::FpVar, prelude::{AllocVar, Boolean, EqGadget}};
use ark_relations::r1cs::{ConstraintSystemRef, SynthesisError};

use crate::circuits::{
    constants::AMOUNT_BITS,
    gadgets::{DualVar, LeqGadget, RateCheckerGadget, SubAddGadget},
    order::OrderGadget,
    params::CircuitParameters,
    tree_hash::{UpdateBalanceGadget, UpdateFilledGadget},
    types::{OrderVar, RingSettlement},
    SystemField,
};

/// Outputs of one settled ring: the advanced roots and the ring's share of
/// the batch's public data
pub struct RingSettlementGadget {
    /// Trading-history root after both fills are recorded
    pub new_trading_history_root: FpVar<SystemField>,
    /// Accounts root after all six balance updates
    pub new_accounts_root: FpVar<SystemField>,
    /// This ring's public data, MSB-first, in wire order
    pub public_data: Vec<Boolean<SystemField>>,
}

impl RingSettlementGadget {
    /// Settle one ring against the incoming roots
    pub fn apply(
        cs: ConstraintSystemRef<SystemField>,
        params: &CircuitParameters,
        settlement: &RingSettlement,
        trading_history_root: &FpVar<SystemField>,
        accounts_root: &FpVar<SystemField>,
    ) -> Result<Self, SynthesisError> {
        let ring = &settlement.ring;

        let order_a = OrderVar::new_witness(cs.clone(), &ring.order_a)?;
        let order_b = OrderVar::new_witness(cs.clone(), &ring.order_b)?;
        OrderGadget::verify_signature(cs.clone(), params, &order_a)?;
        OrderGadget::verify_signature(cs.clone(), params, &order_b)?;

        // Fills, range-checked to amount width
        let fill_s_a = alloc_fill(cs.clone(), ring.fill_s_a)?;
        let fill_b_a = alloc_fill(cs.clone(), ring.fill_b_a)?;
        let fill_f_a = alloc_fill(cs.clone(), ring.fill_f_a)?;
        let fill_s_b = alloc_fill(cs.clone(), ring.fill_s_b)?;
        let fill_b_b = alloc_fill(cs.clone(), ring.fill_b_b)?;
        let fill_f_b = alloc_fill(cs.clone(), ring.fill_f_b)?;

        // Record both fills in the trading history, order A then order B,
        // and cap each order's cumulative fill at its sell amount
        let filled_a = UpdateFilledGadget::apply(
            cs.clone(),
            params,
            trading_history_root,
            &order_a.filled_slot_bits(),
            SystemField::from(settlement.filled_a_before),
            &fill_s_a.packed,
            &settlement.filled_opening_a,
        )?;
        let filled_b = UpdateFilledGadget::apply(
            cs.clone(),
            params,
            &filled_a.new_root,
            &order_b.filled_slot_bits(),
            SystemField::from(settlement.filled_b_before),
            &fill_s_b.packed,
            &settlement.filled_opening_b,
        )?;
        LeqGadget::enforce_leq(&filled_a.filled_after, &order_a.amount_s.packed)?;
        LeqGadget::enforce_leq(&filled_b.filled_after, &order_b.amount_s.packed)?;

        // Balance movements. Each SubAdd pairs a debit with the credit it
        // funds, range-checking both sides so a debit can never underflow.
        let balance_s_a = alloc_balance(cs.clone(), settlement.balance_s_a_before)?;
        let balance_b_a = alloc_balance(cs.clone(), settlement.balance_b_a_before)?;
        let balance_f_a = alloc_balance(cs.clone(), settlement.balance_f_a_before)?;
        let wallet_f_a = alloc_balance(cs.clone(), settlement.wallet_f_a_before)?;
        let balance_s_b = alloc_balance(cs.clone(), settlement.balance_s_b_before)?;
        let balance_b_b = alloc_balance(cs.clone(), settlement.balance_b_b_before)?;
        let balance_f_b = alloc_balance(cs.clone(), settlement.balance_f_b_before)?;
        let wallet_f_b = alloc_balance(cs.clone(), settlement.wallet_f_b_before)?;

        let (balance_s_a_after, balance_b_b_after) =
            SubAddGadget::sub_add(&balance_s_a, &balance_b_b, &fill_s_a.packed, AMOUNT_BITS)?;
        let (balance_s_b_after, balance_b_a_after) =
            SubAddGadget::sub_add(&balance_s_b, &balance_b_a, &fill_s_b.packed, AMOUNT_BITS)?;
        let (balance_f_a_after, _wallet_f_a_after) =
            SubAddGadget::sub_add(&balance_f_a, &wallet_f_a, &fill_f_a.packed, AMOUNT_BITS)?;
        let (balance_f_b_after, _wallet_f_b_after) =
            SubAddGadget::sub_add(&balance_f_b, &wallet_f_b, &fill_f_b.packed, AMOUNT_BITS)?;

        // Six ordered account updates, each root chaining into the next
        let root = UpdateBalanceGadget::apply(
            cs.clone(),
            params,
            accounts_root,
            &order_a.account_s.bits,
            &order_a.public_key,
            &order_a.token_s,
            &balance_s_a,
            &balance_s_a_after.packed,
            &settlement.balance_opening_s_a,
        )?;
        let root = UpdateBalanceGadget::apply(
            cs.clone(),
            params,
            &root,
            &order_a.account_b.bits,
            &order_a.public_key,
            &order_a.token_b,
            &balance_b_a,
            &balance_b_a_after.packed,
            &settlement.balance_opening_b_a,
        )?;
        let root = UpdateBalanceGadget::apply(
            cs.clone(),
            params,
            &root,
            &order_a.account_f.bits,
            &order_a.public_key,
            &order_a.token_f,
            &balance_f_a,
            &balance_f_a_after.packed,
            &settlement.balance_opening_f_a,
        )?;
        let root = UpdateBalanceGadget::apply(
            cs.clone(),
            params,
            &root,
            &order_b.account_s.bits,
            &order_b.public_key,
            &order_b.token_s,
            &balance_s_b,
            &balance_s_b_after.packed,
            &settlement.balance_opening_s_b,
        )?;
        let root = UpdateBalanceGadget::apply(
            cs.clone(),
            params,
            &root,
            &order_b.account_b.bits,
            &order_b.public_key,
            &order_b.token_b,
            &balance_b_b,
            &balance_b_b_after.packed,
            &settlement.balance_opening_b_b,
        )?;
        let new_accounts_root = UpdateBalanceGadget::apply(
            cs.clone(),
            params,
            &root,
            &order_b.account_f.bits,
            &order_b.public_key,
            &order_b.token_f,
            &balance_f_b,
            &balance_f_b_after.packed,
            &settlement.balance_opening_f_b,
        )?;

        // The ring must actually close: what A sells is what B buys
        order_a.token_s.enforce_equal(&order_b.token_b)?;
        order_a.token_b.enforce_equal(&order_b.token_s)?;

        // Limit prices and fee rates hold exactly for each leg
        RateCheckerGadget::enforce(
            &fill_s_a.packed,
            &fill_b_a.packed,
            &order_a.amount_s.packed,
            &order_a.amount_b.packed,
        )?;
        RateCheckerGadget::enforce(
            &fill_s_b.packed,
            &fill_b_b.packed,
            &order_b.amount_s.packed,
            &order_b.amount_b.packed,
        )?;
        RateCheckerGadget::enforce(
            &fill_f_a.packed,
            &fill_s_a.packed,
            &order_a.amount_f.packed,
            &order_a.amount_s.packed,
        )?;
        RateCheckerGadget::enforce(
            &fill_f_b.packed,
            &fill_s_b.packed,
            &order_b.amount_f.packed,
            &order_b.amount_s.packed,
        )?;

        // The operator may keep a margin split but never over-deliver
        LeqGadget::enforce_leq(&fill_b_b.packed, &fill_s_a.packed)?;
        LeqGadget::enforce_leq(&fill_b_a.packed, &fill_s_b.packed)?;

        // This ring's contribution to the public data stream
        let mut public_data = Vec::new();
        for field in [
            &order_a.dex_id,
            &order_a.order_id,
            &order_a.account_s,
            &order_b.account_b,
            &fill_s_a,
            &order_a.account_f,
            &fill_f_a,
            &order_b.dex_id,
            &order_b.order_id,
            &order_b.account_s,
            &order_a.account_b,
            &fill_s_b,
            &order_b.account_f,
            &fill_f_b,
        ] {
            public_data.extend(field.bits_be());
        }

        Ok(Self {
            new_trading_history_root: filled_b.new_root,
            new_accounts_root,
            public_data,
        })
    }
}

fn alloc_fill(
    cs: ConstraintSystemRef<SystemField>,
    fill: u128,
) -> Result<DualVar<SystemField>, SynthesisError> {
    DualVar::new_witness(
        ark_relations::ns!(cs, "fill"),
        || Ok(SystemField::from(fill)),
        AMOUNT_BITS,
    )
}

fn alloc_balance(
    cs: ConstraintSystemRef<SystemField>,
    balance: u128,
) -> Result<FpVar<SystemField>, SynthesisError> {
    FpVar::new_witness(ark_relations::ns!(cs, "balance"), || {
        Ok(SystemField::from(balance))
    })
}
