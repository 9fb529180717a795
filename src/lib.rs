//! Zero-knowledge circuits proving the correct off-chain settlement of
//! two-party order rings on a decentralized exchange.
//!
//! The heart of the crate is [`circuits::batch::SettlementCircuit`], a rank-1
//! constraint system over the BN254 scalar field. Given a prior
//! trading-history Merkle root, a prior accounts Merkle root, and a list of
//! ring settlements, it enforces that every settlement was authorized by both
//! counterparties, respects each order's limit price and fee rate, does not
//! exceed remaining fillable amounts, moves token and fee balances
//! consistently, and transitions both Merkle trees to the claimed new roots.
//! A single SHA-256 digest over the batch's public transfer data is bound to
//! the circuit's one public input, so an on-chain verifier only hashes the
//! public data to check a proof.
//!
//! The [`hash`] and [`tree`] modules provide the native counterparts of the
//! in-circuit hashing: witness producers use them to build authentication
//! paths that the circuit then verifies.
#![deny(unsafe_code)]

pub mod circuits;
pub mod hash;
pub mod tree;
