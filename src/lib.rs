//! Tracker Sync - mirrors GitHub issues into Linear.
//!
//! Webhook deliveries are authenticated, mapped onto a configured
//! repository/team link, and turned into Linear mutations. A small retry
//! subsystem watches issues handed to the Jules coding agent.

pub mod agent;
pub mod config;
pub mod connector;
pub mod credentials;
pub mod effects;
pub mod error;
pub mod github;
pub mod identity;
pub mod linear;
pub mod markdown;
pub mod rewrite;
pub mod server;
pub mod store;
pub mod transport;
pub mod types;
pub mod webhooks;

#[cfg(test)]
pub mod test_utils;
