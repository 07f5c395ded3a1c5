//! Shared utilities for receiptflow integration tests.
//!
//! - `TestHarness`: temp directories, on-disk ledger and scripted adapters
//! - builders for settings files

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::{ScriptedAi, ScriptedOcr, TestHarness, TEST_KEY_HEX};
