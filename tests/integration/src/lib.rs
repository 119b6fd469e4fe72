//! End-to-end tests across the CAT crates.
//!
//! This test suite validates:
//! - The key-derivation chain against independently computed HMACs
//! - Request authentication for the documented rejection scenarios
//! - The full bootstrap flow against a live CA server

pub mod test_utils;

#[cfg(test)]
mod key_chain_tests;

#[cfg(test)]
mod request_auth_tests;

#[cfg(test)]
mod bootstrap_flow_tests;
