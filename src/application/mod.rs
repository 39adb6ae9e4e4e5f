//! Application layer: the bank coordinator.
//!
//! [`bank::Bank`] owns all shared state and is the only component terminals
//! talk to. It is built explicitly and shared by `Arc`; there is no global
//! instance.

pub mod bank;
