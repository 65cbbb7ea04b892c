//! Core abstractions for NiftyNavigator
//!
//! This crate defines the agent trait and the request context shared by the
//! recommendation and validation agents in `nifty-bot`.

pub mod agent;
pub mod context;
pub mod error;

pub use agent::Agent;
pub use context::Context;
pub use error::{Error, Result};
