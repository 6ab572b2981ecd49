//! # moltguard
//!
//! Command-line front end for the `moltguard-totp` vault: add, remove and
//! list TOTP secrets and print the current code for a service.

pub mod cli;

pub use cli::{error_message, init_logging, run, Cli, Command};
