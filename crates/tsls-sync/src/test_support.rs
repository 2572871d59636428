//! Scripted client and document doubles shared by unit and integration
//! tests.

use std::sync::Arc;

use async_trait::async_trait;
use lsp_types::{Position, Range, TextDocumentContentChangeEvent, Url};
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tsls_protocol::{Command, ProtocolVersion};

use crate::client::{
    Client, ClientCapabilities, ClientCapability, ClientConfiguration, ClientError, ExecuteOptions,
};
use crate::document::TextDocument;
use crate::resource_map::file_path_normalizer;

/// One command the mock client has been asked to send, in order.
#[derive(Debug, Clone)]
pub struct ExecutedCommand {
    /// The command.
    pub command: Command,
    /// Its serialized arguments.
    pub args: Value,
}

/// A scripted [`Client`] that records every command instead of talking to a
/// server.
///
/// By default it reports protocol version 5.0.0 with both capabilities, so
/// batching and syntax-served diagnostics are on. `execute_async` resolves
/// immediately unless [`hold_async_requests`](MockClient::hold_async_requests)
/// keeps it in flight until cancellation.
pub struct MockClient {
    api_version: ProtocolVersion,
    capabilities: ClientCapabilities,
    configuration: ClientConfiguration,
    workspace_root: Option<String>,
    non_semantic: FxHashSet<String>,
    hold_async: bool,
    executed: Mutex<Vec<ExecutedCommand>>,
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClient {
    /// A fully capable client on a current protocol version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            api_version: ProtocolVersion::new(5, 0, 0),
            capabilities: ClientCapabilities::new(&[
                ClientCapability::Syntax,
                ClientCapability::Semantic,
            ]),
            configuration: ClientConfiguration::default(),
            workspace_root: None,
            non_semantic: FxHashSet::default(),
            hold_async: false,
            executed: Mutex::new(Vec::new()),
        }
    }

    /// Overrides the reported protocol version.
    #[must_use]
    pub fn with_api_version(mut self, version: ProtocolVersion) -> Self {
        self.api_version = version;
        self
    }

    /// Overrides the reported capability set.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: ClientCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Enables or disables project-wide diagnostics.
    #[must_use]
    pub fn with_project_diagnostics(mut self, enabled: bool) -> Self {
        self.configuration.enable_project_diagnostics = enabled;
        self
    }

    /// Sets the workspace root reported for every resource.
    #[must_use]
    pub fn with_workspace_root(mut self, root: impl Into<String>) -> Self {
        self.workspace_root = Some(root.into());
        self
    }

    /// Marks `resource` as outside the semantic project.
    #[must_use]
    pub fn without_semantic_for(mut self, resource: Url) -> Self {
        self.non_semantic.insert(resource.to_string());
        self
    }

    /// Keeps `execute_async` requests in flight until their token cancels.
    #[must_use]
    pub fn hold_async_requests(mut self) -> Self {
        self.hold_async = true;
        self
    }

    /// Everything sent so far, in order.
    #[must_use]
    pub fn executed(&self) -> Vec<ExecutedCommand> {
        self.executed.lock().clone()
    }

    /// The command names sent so far, in order.
    #[must_use]
    pub fn commands(&self) -> Vec<Command> {
        self.executed.lock().iter().map(|entry| entry.command).collect()
    }

    /// Forgets everything recorded so far.
    pub fn clear_executed(&self) {
        self.executed.lock().clear();
    }

    fn record(&self, command: Command, args: Value) {
        self.executed.lock().push(ExecutedCommand { command, args });
    }
}

#[async_trait]
impl Client for MockClient {
    fn api_version(&self) -> ProtocolVersion {
        self.api_version
    }

    fn capabilities(&self) -> ClientCapabilities {
        self.capabilities
    }

    fn has_capability_for_resource(&self, resource: &Url, capability: ClientCapability) -> bool {
        if capability == ClientCapability::Semantic
            && self.non_semantic.contains(resource.as_str())
        {
            return false;
        }
        self.capabilities.has(capability)
    }

    fn configuration(&self) -> ClientConfiguration {
        self.configuration
    }

    fn to_ts_file_path(&self, resource: &Url) -> Option<String> {
        if resource.scheme() != "file" {
            return None;
        }
        file_path_normalizer(resource)
    }

    fn workspace_root_for_resource(&self, _resource: &Url) -> Option<String> {
        self.workspace_root.clone()
    }

    async fn execute(
        &self,
        command: Command,
        args: Value,
        _token: Option<CancellationToken>,
        _options: ExecuteOptions,
    ) -> Result<Value, ClientError> {
        self.record(command, args);
        Ok(Value::Null)
    }

    fn execute_without_waiting_for_response(&self, command: Command, args: Value) {
        self.record(command, args);
    }

    async fn execute_async(
        &self,
        command: Command,
        args: Value,
        token: CancellationToken,
    ) -> Result<Value, ClientError> {
        self.record(command, args);
        if self.hold_async {
            token.cancelled().await;
            return Err(ClientError::Cancelled { command });
        }
        Ok(Value::Null)
    }
}

/// A [`TextDocument`] over a mutable in-memory string.
pub struct MockDocument {
    uri: Url,
    language_id: String,
    text: Mutex<String>,
}

impl MockDocument {
    /// Creates a document; panics on an invalid URI (tests only).
    #[must_use]
    pub fn new(uri: &str, language_id: &str, text: &str) -> Arc<Self> {
        Arc::new(Self {
            uri: Url::parse(uri).expect("mock document uri"),
            language_id: language_id.to_string(),
            text: Mutex::new(text.to_string()),
        })
    }

    /// Replaces the document content, as an editor edit would.
    pub fn set_text(&self, text: &str) {
        *self.text.lock() = text.to_string();
    }
}

impl TextDocument for MockDocument {
    fn uri(&self) -> Url {
        self.uri.clone()
    }

    fn language_id(&self) -> String {
        self.language_id.clone()
    }

    fn line_count(&self) -> u32 {
        self.text.lock().split('\n').count() as u32
    }

    fn text(&self) -> String {
        self.text.lock().clone()
    }
}

/// An incremental content change replacing `start..end` with `text`.
#[must_use]
pub fn change_event(start: Position, end: Position, text: &str) -> TextDocumentContentChangeEvent {
    TextDocumentContentChangeEvent {
        range: Some(Range { start, end }),
        range_length: None,
        text: text.to_string(),
    }
}
