//! Revision-based vault synchronization
//!
//! - [`SyncClient`]: HTTP calls against a spind server, with a local blob cache
//! - [`Session`]: the unlock/save/rotate lifecycle of one vault at a time
//! - Last-write-wins: the client advances the revision, the server stores it

pub mod client;
pub mod config;
pub mod session;

pub use client::SyncClient;
pub use config::ClientConfig;
pub use session::Session;
