//! Application layer: the withdrawal saga and the gateway access it drives.
//!
//! `WithdrawalOrchestrator` owns the state machine from validation to a
//! terminal phase. `PayoutClient` wraps the gateway port with token caching
//! and a bounded call time.

pub mod orchestrator;
pub mod payout_client;
