//! Authorization for contributed actions.
//!
//! # Responsibility
//! - Define the ordered permission levels.
//! - Hold the authenticated session and evaluate grants against it.
//!
//! # Invariants
//! - A denial is a `false` result, never an error.

pub mod door_keeper;
pub mod permission;
