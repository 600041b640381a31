//! Core types and trait definitions for the clinic client-assignment engine.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! claim decision and the capability check live here as pure functions so
//! every surface (API, scheduled jobs, tests) shares a single rule set.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod account;
pub mod assignment;
pub mod client;
pub mod error;
pub mod policy;
pub mod store;
pub mod sweep;
pub mod validate;

pub use error::{Error, Result};
