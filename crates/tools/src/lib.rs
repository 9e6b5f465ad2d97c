//! Repository-introspection tool adapters and the retrieval-service client
//!
//! This crate implements the service traits defined in `repoagent-core`:
//!
//! - [`FsRepoInspector`] - filesystem-backed repository analysis tools
//! - [`HttpRetrievalService`] - JSON client for an external retrieval service
//! - [`NullRetrievalService`] - stand-in when no knowledge base is attached
//!
//! All adapters are pure request/response; no state is shared between calls.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

mod inspector;
mod retrieval;

pub use inspector::FsRepoInspector;
pub use retrieval::{HttpRetrievalService, NullRetrievalService};
