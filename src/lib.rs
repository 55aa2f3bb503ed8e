//! DFI anchor submitter.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod error;
pub mod types;
pub mod log;
pub mod rpc;
pub mod engine;

pub use error::{AnchorError, Result};
