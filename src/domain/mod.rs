//! Domain types and the ports the settlement core talks through.

pub mod account;
pub mod fee;
pub mod money;
pub mod ports;
pub mod transaction;
pub mod withdrawal;
