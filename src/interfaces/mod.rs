//! Outer adapters: CSV batch input/output and response rendering.

pub mod csv;
pub mod response;
