//! HTTP request handlers.

pub mod diag;
pub mod groceries;
pub mod health;
pub mod negotiate;
