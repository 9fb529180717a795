//! Native exchange state for building circuit witnesses in tests
//!
//! Mirrors the update order of the settlement gadget exactly: two
//! trading-history fills, then the six balance updates, with every opening
//! captured immediately before its update.

use std::collections::HashMap;

use ark_ec::AffineCurve;
use rand::{rngs::StdRng, SeedableRng};

use crate::circuits::{
    constants::ORDER_ID_BITS,
    eddsa::{sign, Keypair, Signature},
    params::CircuitParameters,
    types::{Order, Ring, RingSettlement},
    EmbeddedPoint, EmbeddedScalarField, SystemField,
};
use crate::hash;
use crate::tree::SparseMerkleTree;

#[derive(Clone)]
struct AccountState {
    key: EmbeddedPoint,
    token: SystemField,
    balance: u128,
}

/// An in-memory exchange: both trees plus the plain state behind them
pub struct TestExchange {
    pub params: CircuitParameters,
    filled_tree: SparseMerkleTree,
    accounts_tree: SparseMerkleTree,
    accounts: HashMap<u32, AccountState>,
    filled: HashMap<u64, u128>,
}

impl TestExchange {
    pub fn new(params: CircuitParameters) -> Self {
        let filled_tree = SparseMerkleTree::new(
            params.poseidon.clone(),
            params.filled_tree_ivs.clone(),
            hash::filled_leaf_hash(&params.poseidon, SystemField::from(0u64)),
        );
        let accounts_tree = SparseMerkleTree::new(
            params.poseidon.clone(),
            params.accounts_tree_ivs.clone(),
            hash::account_leaf_hash(
                &params.poseidon,
                SystemField::from(0u64),
                SystemField::from(0u64),
                SystemField::from(0u64),
                SystemField::from(0u64),
            ),
        );

        Self {
            params,
            filled_tree,
            accounts_tree,
            accounts: HashMap::new(),
            filled: HashMap::new(),
        }
    }

    pub fn trading_history_root(&self) -> SystemField {
        self.filled_tree.root()
    }

    pub fn accounts_root(&self) -> SystemField {
        self.accounts_tree.root()
    }

    pub fn create_account(
        &mut self,
        account: u32,
        key: EmbeddedPoint,
        token: SystemField,
        balance: u128,
    ) {
        let leaf = hash::account_leaf_hash(
            &self.params.poseidon,
            key.x,
            key.y,
            token,
            SystemField::from(balance),
        );
        self.accounts_tree.insert(account as u64, leaf).unwrap();
        self.accounts.insert(
            account,
            AccountState {
                key,
                token,
                balance,
            },
        );
    }

    pub fn filled(&self, order: &Order) -> u128 {
        *self.filled.get(&filled_slot(order)).unwrap_or(&0)
    }

    /// Overwrite an order's cumulative filled amount
    pub fn set_filled(&mut self, order: &Order, filled: u128) {
        self.apply_fill(filled_slot(order), filled);
    }

    /// Settle a ring, returning the witness for the circuit
    pub fn settle(&mut self, ring: Ring) -> RingSettlement {
        let slot_a = filled_slot(&ring.order_a);
        let slot_b = filled_slot(&ring.order_b);

        let filled_a_before = self.filled(&ring.order_a);
        let filled_opening_a = self.filled_tree.opening(slot_a).unwrap();
        self.apply_fill(slot_a, filled_a_before + ring.fill_s_a);

        let filled_b_before = self.filled(&ring.order_b);
        let filled_opening_b = self.filled_tree.opening(slot_b).unwrap();
        self.apply_fill(slot_b, filled_b_before + ring.fill_s_b);

        let (balance_s_a_before, balance_opening_s_a) =
            self.adjust_balance(ring.order_a.account_s, -(ring.fill_s_a as i128));
        let (balance_b_a_before, balance_opening_b_a) =
            self.adjust_balance(ring.order_a.account_b, ring.fill_s_b as i128);
        let (balance_f_a_before, balance_opening_f_a) =
            self.adjust_balance(ring.order_a.account_f, -(ring.fill_f_a as i128));
        let (balance_s_b_before, balance_opening_s_b) =
            self.adjust_balance(ring.order_b.account_s, -(ring.fill_s_b as i128));
        let (balance_b_b_before, balance_opening_b_b) =
            self.adjust_balance(ring.order_b.account_b, ring.fill_s_a as i128);
        let (balance_f_b_before, balance_opening_f_b) =
            self.adjust_balance(ring.order_b.account_f, -(ring.fill_f_b as i128));

        RingSettlement {
            ring,
            filled_a_before,
            filled_b_before,
            filled_opening_a,
            filled_opening_b,
            balance_s_a_before,
            balance_b_a_before,
            balance_f_a_before,
            wallet_f_a_before: 0,
            balance_s_b_before,
            balance_b_b_before,
            balance_f_b_before,
            wallet_f_b_before: 0,
            balance_opening_s_a,
            balance_opening_b_a,
            balance_opening_f_a,
            balance_opening_s_b,
            balance_opening_b_b,
            balance_opening_f_b,
        }
    }

    fn apply_fill(&mut self, slot: u64, filled_after: u128) {
        self.filled.insert(slot, filled_after);
        self.filled_tree
            .insert(
                slot,
                hash::filled_leaf_hash(&self.params.poseidon, SystemField::from(filled_after)),
            )
            .unwrap();
    }

    // Shifts a balance and returns the prior value plus the opening captured
    // before the tree changed
    fn adjust_balance(&mut self, account: u32, delta: i128) -> (u128, Vec<SystemField>) {
        let opening = self.accounts_tree.opening(account as u64).unwrap();

        let state = self
            .accounts
            .get_mut(&account)
            .expect("account not registered");
        let before = state.balance;
        let after = before
            .checked_add_signed(delta)
            .expect("fixture balance underflow");
        state.balance = after;
        let (key, token) = (state.key, state.token);

        let leaf = hash::account_leaf_hash(
            &self.params.poseidon,
            key.x,
            key.y,
            token,
            SystemField::from(after),
        );
        self.accounts_tree.insert(account as u64, leaf).unwrap();

        (before, opening)
    }
}

fn filled_slot(order: &Order) -> u64 {
    order.order_id as u64 | (order.account_s as u64) << ORDER_ID_BITS
}

fn placeholder_signature() -> Signature {
    Signature {
        r: EmbeddedPoint::prime_subgroup_generator(),
        s: EmbeddedScalarField::from(0u64),
    }
}

fn sign_order(
    params: &CircuitParameters,
    keypair: &Keypair,
    rng: &mut StdRng,
    mut order: Order,
) -> Order {
    order.public_key = keypair.public;
    order.signature = sign(params, keypair, &order.signed_message_bits(), rng);
    order
}

/// A two-order ring at exactly matching prices with full fills, on a fresh
/// exchange with shallow trees
pub fn happy_ring(seed: u64) -> (TestExchange, Ring) {
    let mut rng = StdRng::seed_from_u64(seed);
    let params = CircuitParameters::new(8, 6);
    let mut exchange = TestExchange::new(params);

    let token_x = SystemField::from(100u64);
    let token_y = SystemField::from(200u64);
    let token_fee = SystemField::from(300u64);

    let alice = Keypair::generate(&mut rng);
    let bob = Keypair::generate(&mut rng);

    exchange.create_account(1, alice.public, token_x, 1_000);
    exchange.create_account(2, alice.public, token_y, 0);
    exchange.create_account(3, alice.public, token_fee, 500);
    exchange.create_account(4, bob.public, token_y, 800);
    exchange.create_account(5, bob.public, token_x, 0);
    exchange.create_account(6, bob.public, token_fee, 500);

    let order_a = sign_order(
        &exchange.params,
        &alice,
        &mut rng,
        Order {
            dex_id: 1,
            order_id: 0,
            account_s: 1,
            account_b: 2,
            account_f: 3,
            amount_s: 100,
            amount_b: 50,
            amount_f: 10,
            wallet_f: 7,
            token_s: token_x,
            token_b: token_y,
            token_f: token_fee,
            public_key: alice.public,
            signature: placeholder_signature(),
        },
    );
    let order_b = sign_order(
        &exchange.params,
        &bob,
        &mut rng,
        Order {
            dex_id: 1,
            order_id: 0,
            account_s: 4,
            account_b: 5,
            account_f: 6,
            amount_s: 50,
            amount_b: 100,
            amount_f: 6,
            wallet_f: 7,
            token_s: token_y,
            token_b: token_x,
            token_f: token_fee,
            public_key: bob.public,
            signature: placeholder_signature(),
        },
    );

    let ring = Ring {
        order_a,
        order_b,
        fill_s_a: 100,
        fill_b_a: 50,
        fill_f_a: 10,
        fill_s_b: 50,
        fill_b_b: 100,
        fill_f_b: 6,
    };

    (exchange, ring)
}

/// A second full-fill ring between two new parties on the same exchange
pub fn second_ring(exchange: &mut TestExchange, seed: u64) -> Ring {
    let mut rng = StdRng::seed_from_u64(seed);

    let token_p = SystemField::from(400u64);
    let token_q = SystemField::from(500u64);
    let token_fee = SystemField::from(300u64);

    let carol = Keypair::generate(&mut rng);
    let dan = Keypair::generate(&mut rng);

    exchange.create_account(11, carol.public, token_p, 600);
    exchange.create_account(12, carol.public, token_q, 0);
    exchange.create_account(13, carol.public, token_fee, 200);
    exchange.create_account(14, dan.public, token_q, 600);
    exchange.create_account(15, dan.public, token_p, 0);
    exchange.create_account(16, dan.public, token_fee, 200);

    let order_a = sign_order(
        &exchange.params,
        &carol,
        &mut rng,
        Order {
            dex_id: 1,
            order_id: 1,
            account_s: 11,
            account_b: 12,
            account_f: 13,
            amount_s: 60,
            amount_b: 30,
            amount_f: 6,
            wallet_f: 8,
            token_s: token_p,
            token_b: token_q,
            token_f: token_fee,
            public_key: carol.public,
            signature: placeholder_signature(),
        },
    );
    let order_b = sign_order(
        &exchange.params,
        &dan,
        &mut rng,
        Order {
            dex_id: 1,
            order_id: 1,
            account_s: 14,
            account_b: 15,
            account_f: 16,
            amount_s: 30,
            amount_b: 60,
            amount_f: 3,
            wallet_f: 8,
            token_s: token_q,
            token_b: token_p,
            token_f: token_fee,
            public_key: dan.public,
            signature: placeholder_signature(),
        },
    );

    Ring {
        order_a,
        order_b,
        fill_s_a: 60,
        fill_b_a: 30,
        fill_f_a: 6,
        fill_s_b: 30,
        fill_b_b: 60,
        fill_f_b: 3,
    }
}
