//! `tsls-protocol` - Wire types for the TypeScript analysis server protocol.
//!
//! The TS server speaks its own JSON request/response protocol keyed by file
//! paths. This crate defines the command names and request argument shapes
//! the bridge emits, plus the protocol version type used for capability
//! gating. Field names and casing are protocol-fixed; everything here
//! serializes with `serde` into exactly the JSON the server expects.
//!
//! Positions on this protocol are 1-based (`line`/`offset`), unlike the
//! 0-based LSP coordinates, so conversions happen at the edge that builds
//! these types.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod requests;
mod version;

pub use requests::{
    ChangeRequestArgs, CloseRequestArgs, CodeEdit, Command, FileCodeEdits,
    GeterrForProjectRequestArgs, GeterrRequestArgs, Location, OpenRequestArgs, ScriptKindName,
    UpdateOpenRequestArgs,
};
pub use version::ProtocolVersion;
