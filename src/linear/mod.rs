//! Linear API client and effect interpreter.
//!
//! Executes `TargetEffect`s against Linear's GraphQL API with one API key.

mod client;
mod interpreter;

pub use client::{DEFAULT_ENDPOINT, LinearClient};
pub use interpreter::interpret_target_effect;
