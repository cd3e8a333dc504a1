//! GroupMind SDK - client API for proposing, voting on and merging changes
//!
//! The core crates are pure, synchronous computation over in-memory state.
//! This crate is where suspension happens: a [`ChangeBackend`] owns
//! persistence and a [`Client`] drives drafts, votes and merges against it
//! on behalf of one user.
//!
//! # Quick Start
//!
//! ```rust
//! use gmh_core::Block;
//! use gmh_governance::{Entry, QuorumConfig};
//! use gmh_sdk::{quick, MemoryBackend};
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let backend = Arc::new(MemoryBackend::new());
//! let entry = Entry::new("e", "Charter", vec![Block::heading("h_seed", "Seed", None)]);
//! backend.create_project("charter", entry, QuorumConfig::default()).unwrap();
//!
//! let clients = quick::create_clients(backend, "charter", &["alice", "bob"]);
//! clients[0].refresh().await.unwrap();
//! assert_eq!(clients[0].entry().unwrap().version, 1);
//! # });
//! ```
//!
//! # Architecture
//!
//! - [`backend`] - Persistence boundary and the in-memory backend
//! - [`client`] - Per-user client with draft, vote and merge actions
//! - [`error`] - Error types

pub mod backend;
pub mod client;
pub mod error;

// Re-exports for convenience
pub use backend::{BackendEvent, ChangeBackend, MemoryBackend};
pub use client::{quick, Client, ClientConfig, ClientConfigBuilder};
pub use error::{Result, SdkError};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::backend::{ChangeBackend, MemoryBackend};
    pub use crate::client::{Client, ClientConfig};
    pub use crate::error::SdkError;
    pub use gmh_governance::{ChangeId, ChangeStatus, VoteValue};
}
