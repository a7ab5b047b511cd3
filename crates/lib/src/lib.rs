//! hive-setup-lib: provisioning logic for Hive testrack Raspberry Pis
//!
//! The pieces, bottom up:
//! - `block`: find and replace a delimited, tool-owned block in a text file
//! - `edit`: read-modify-write sessions that never leave a half-written file
//! - `host`: the OS commands provisioning shells out to, behind a trait
//! - `release`: monitor version discovery, download and extraction
//! - `sequence`: runs named steps in order and stops at the first failure
//! - `provision`: the actual steps and the sequences for each subcommand

pub mod block;
pub mod config;
pub mod consts;
pub mod edit;
pub mod error;
pub mod host;
pub mod platform;
pub mod provision;
pub mod release;
pub mod sequence;
