//! Adapters for the domain ports: storage backends, payout gateways and
//! reconciliation alerting.

pub mod alerting;
pub mod in_memory;
pub mod paypal;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
pub mod simulated;
