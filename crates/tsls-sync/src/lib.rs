//! `tsls-sync` - Buffer synchronization and diagnostics scheduling.
//!
//! This crate keeps a replica of the editor's open TypeScript/JavaScript
//! files coherent inside a long-running TS analysis server, and drives the
//! debounced, cancellable diagnostics loop on top of that replica.
//!
//! The moving parts, leaves first:
//!
//! - [`ResourceMap`]: case-aware keying from URI to value that preserves the
//!   originally inserted URI on iteration.
//! - [`BufferSynchronizer`]: coalesces per-file open/close/change operations
//!   and flushes them as one batched `updateOpen` request.
//! - [`SyncedBuffer`]: the per-file lifecycle state machine.
//! - [`PendingDiagnostics`]: the set of files awaiting error re-computation,
//!   drained oldest-request-first.
//! - [`GetErrRequest`]: one in-flight diagnostics request with a
//!   cancellation handle and a completion callback.
//! - [`TabResourceTracker`]: which URIs are visible in editor tabs.
//! - [`Delayer`]: a trailing-edge debouncer.
//! - [`BufferSyncSupport`]: the orchestrator wiring all of the above to
//!   editor events.
//!
//! The editor side delivers document and tab events as plain method calls;
//! the server side is reached through the [`Client`] trait. Timers and
//! request completions run on Tokio, so the orchestrator must be created
//! inside a runtime.

#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]

mod buffer;
mod client;
mod config;
mod delayer;
mod document;
mod get_err;
mod pending;
mod resource_map;
mod support;
mod synchronizer;
mod tabs;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use buffer::{language_ids, BufferKind, BufferState, SyncedBuffer};
pub use client::{
    Client, ClientCapabilities, ClientCapability, ClientConfiguration, ClientError, ExecuteOptions,
};
pub use config::ValidateSettings;
pub use delayer::Delayer;
pub use document::TextDocument;
pub use get_err::GetErrRequest;
pub use pending::PendingDiagnostics;
pub use resource_map::{file_path_normalizer, MapConfig, PathNormalizer, ResourceMap, ResourceSet};
pub use support::BufferSyncSupport;
pub use synchronizer::{BufferOperation, BufferSynchronizer};
pub use tabs::{Tab, TabDelta, TabId, TabInput, TabResourceTracker};
