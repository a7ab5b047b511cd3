//! Integration tests for hive-setup-lib.
//!
//! Every test works on a scratch sysroot with a recording host and a local
//! release feed, so nothing here touches the machine running the tests.

mod common;
mod edit_tests;
mod provision_tests;
