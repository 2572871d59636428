//! The consumed TS server client interface.

use async_trait::async_trait;
use lsp_types::Url;
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tsls_protocol::{Command, ProtocolVersion};

/// A capability the connected server grants the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCapability {
    /// Syntax-level requests are served.
    Syntax,
    /// Project-wide semantic requests are served.
    Semantic,
}

impl ClientCapability {
    const fn bit(self) -> u8 {
        match self {
            ClientCapability::Syntax => 1 << 0,
            ClientCapability::Semantic => 1 << 1,
        }
    }
}

/// The set of capabilities a client currently has.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientCapabilities(u8);

impl ClientCapabilities {
    /// Builds a set from the listed capabilities.
    #[must_use]
    pub fn new(capabilities: &[ClientCapability]) -> Self {
        let mut bits = 0;
        for capability in capabilities {
            bits |= capability.bit();
        }
        Self(bits)
    }

    /// True when the set contains `capability`.
    #[must_use]
    pub fn has(self, capability: ClientCapability) -> bool {
        self.0 & capability.bit() != 0
    }
}

/// Client-side configuration the scheduling core consults.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientConfiguration {
    /// Compute diagnostics project-wide instead of per visible file.
    pub enable_project_diagnostics: bool,
}

/// Per-request execution options.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecuteOptions {
    /// A failure of this request leaves the server unusable for the current
    /// session (the transport must not retry it against a restarted server).
    pub non_recoverable: bool,
}

/// Failure of a server request.
///
/// These surface through the returned futures only; local bridge state is
/// always consistent by the time a request is handed to the transport, so a
/// failed request needs no unwinding here.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request was cancelled before the server answered.
    #[error("`{command}` request cancelled")]
    Cancelled {
        /// The cancelled command.
        command: Command,
    },
    /// The server answered with an error response.
    #[error("`{command}` request failed: {message}")]
    Response {
        /// The failed command.
        command: Command,
        /// Server-provided message.
        message: String,
    },
    /// The server process or its transport is gone.
    #[error("server transport closed")]
    TransportClosed,
}

/// The transport to the TS server, as the scheduling core consumes it.
///
/// An implementation owns the server process and its request/response
/// plumbing. All methods may be called from the orchestrator while it holds
/// its own state lock, so none of the synchronous ones may block on the
/// server.
#[async_trait]
pub trait Client: Send + Sync {
    /// Protocol version the connected server reported.
    fn api_version(&self) -> ProtocolVersion;

    /// Capabilities of the connected server.
    fn capabilities(&self) -> ClientCapabilities;

    /// Whether `capability` is available for this specific resource (a
    /// resource may be out of project for semantic operations while still
    /// syntactically served).
    fn has_capability_for_resource(&self, resource: &Url, capability: ClientCapability) -> bool;

    /// Current client configuration.
    fn configuration(&self) -> ClientConfiguration;

    /// Maps a resource to the server's file id, or `None` when the server
    /// cannot address it.
    fn to_ts_file_path(&self, resource: &Url) -> Option<String>;

    /// The workspace root owning `resource`, when known.
    fn workspace_root_for_resource(&self, resource: &Url) -> Option<String>;

    /// Sends `command` and waits for its response.
    async fn execute(
        &self,
        command: Command,
        args: Value,
        token: Option<CancellationToken>,
        options: ExecuteOptions,
    ) -> Result<Value, ClientError>;

    /// Sends `command` without waiting for (or routing) a response.
    fn execute_without_waiting_for_response(&self, command: Command, args: Value);

    /// Sends a long-running `command` whose progress the server streams
    /// elsewhere; resolves when the server finishes, fails, or honors
    /// `token`.
    async fn execute_async(
        &self,
        command: Command,
        args: Value,
        token: CancellationToken,
    ) -> Result<Value, ClientError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_sets_are_membership_tested() {
        let none = ClientCapabilities::default();
        assert!(!none.has(ClientCapability::Syntax));
        assert!(!none.has(ClientCapability::Semantic));

        let syntax_only = ClientCapabilities::new(&[ClientCapability::Syntax]);
        assert!(syntax_only.has(ClientCapability::Syntax));
        assert!(!syntax_only.has(ClientCapability::Semantic));

        let both = ClientCapabilities::new(&[ClientCapability::Syntax, ClientCapability::Semantic]);
        assert!(both.has(ClientCapability::Syntax));
        assert!(both.has(ClientCapability::Semantic));
    }
}
