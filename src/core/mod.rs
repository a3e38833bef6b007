//! Core domain logic: protocol decoding, grocery reconciliation, and the
//! real-time session engine.

pub mod groceries;
pub mod protocol;
pub mod session;
