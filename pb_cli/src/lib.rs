//! Internal modules for the blackjack table client.
//!
//! This library provides command parsing and command execution against a
//! table service, used by the pb_cli binary.

pub mod commands;
pub mod session;
