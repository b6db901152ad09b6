//! x402x: an HTTP-402 pay-per-request facilitator that settles stablecoin
//! payments through an on-chain Settlement Router, with optional hook
//! execution (transfers, revenue splits, NFT mints, rewards) in the same
//! transaction.
//!
//! Module layout follows the teacher's flat `src/` (no `crates/` workspace
//! split): each module here corresponds to one numbered component of the
//! design (`C1`..`C14` in their doc comments).

pub mod account_pool;
pub mod balance;
pub mod cache;
pub mod chain;
pub mod chain_id;
pub mod commitment;
pub mod config;
pub mod dispatch;
pub mod erc20_abi;
pub mod errors;
pub mod facilitator;
pub mod fee_claim;
pub mod gas;
pub mod handlers;
pub mod hooks;
pub mod metrics;
pub mod middleware;
pub mod network;
pub mod price;
pub mod router_abi;
pub mod settlement;
pub mod timestamp;
pub mod types;
pub mod util;
pub mod verification;
