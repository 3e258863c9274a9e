//! Nullable infrastructure for deterministic testing.
//!
//! All external dependencies of the wallet engine (durable storage, the
//! mint's HTTP API) are abstracted behind traits. This crate provides
//! test-friendly implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod mint;
pub mod store;

pub use mint::{MeltBehavior, NullMint};
pub use store::NullStore;
