//! Per-file buffer lifecycle.

use std::sync::Arc;

use lsp_types::{TextDocumentContentChangeEvent, Url};
use tracing::warn;
use tsls_protocol::{OpenRequestArgs, ScriptKindName};

use crate::client::Client;
use crate::document::TextDocument;
use crate::synchronizer::BufferSynchronizer;

/// Editor language ids the bridge mirrors into the server.
pub mod language_ids {
    /// TypeScript.
    pub const TYPESCRIPT: &str = "typescript";
    /// TypeScript with JSX.
    pub const TYPESCRIPT_REACT: &str = "typescriptreact";
    /// JavaScript.
    pub const JAVASCRIPT: &str = "javascript";
    /// JavaScript with JSX.
    pub const JAVASCRIPT_REACT: &str = "javascriptreact";
}

/// Lifecycle of a synced buffer.
///
/// The progression is `Initial` to `Open` to `Closed`; `Closed` is terminal
/// and re-opening a file creates a fresh buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    /// Created, not yet announced to the server.
    Initial,
    /// Announced to the server and receiving changes.
    Open,
    /// Withdrawn from the server.
    Closed,
}

/// The language family of a buffer, derived from its language id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    /// `typescript` / `typescriptreact`, and anything unrecognized.
    TypeScript,
    /// `javascript` / `javascriptreact`.
    JavaScript,
}

/// The local record of one editor document mirrored into the server.
pub struct SyncedBuffer {
    document: Arc<dyn TextDocument>,
    resource: Url,
    filepath: String,
    client: Arc<dyn Client>,
    state: BufferState,
}

impl SyncedBuffer {
    /// Creates a buffer in the `Initial` state.
    #[must_use]
    pub fn new(document: Arc<dyn TextDocument>, filepath: String, client: Arc<dyn Client>) -> Self {
        let resource = document.uri();
        Self {
            document,
            resource,
            filepath,
            client,
            state: BufferState::Initial,
        }
    }

    /// The document URI, parsed once at construction.
    #[must_use]
    pub fn resource(&self) -> &Url {
        &self.resource
    }

    /// The server file id.
    #[must_use]
    pub fn filepath(&self) -> &str {
        &self.filepath
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> BufferState {
        self.state
    }

    /// Current line count of the underlying document.
    #[must_use]
    pub fn line_count(&self) -> u32 {
        self.document.line_count()
    }

    /// The language family, a pure function of the document's language id.
    #[must_use]
    pub fn kind(&self) -> BufferKind {
        match self.document.language_id().as_str() {
            language_ids::JAVASCRIPT | language_ids::JAVASCRIPT_REACT => BufferKind::JavaScript,
            _ => BufferKind::TypeScript,
        }
    }

    fn script_kind(&self) -> Option<ScriptKindName> {
        match self.document.language_id().as_str() {
            language_ids::TYPESCRIPT => Some(ScriptKindName::Ts),
            language_ids::TYPESCRIPT_REACT => Some(ScriptKindName::Tsx),
            language_ids::JAVASCRIPT => Some(ScriptKindName::Js),
            language_ids::JAVASCRIPT_REACT => Some(ScriptKindName::Jsx),
            _ => None,
        }
    }

    /// Announces the buffer to the server with its current content.
    ///
    /// Also used to re-announce an already-open buffer after a server
    /// restart.
    pub fn open(&mut self, synchronizer: &mut BufferSynchronizer) {
        let args = OpenRequestArgs {
            file: self.filepath.clone(),
            file_content: self.document.text(),
            project_root_path: self.client.workspace_root_for_resource(&self.resource),
            script_kind_name: self.script_kind(),
        };
        synchronizer.open(&self.resource, args);
        self.state = BufferState::Open;
    }

    /// Withdraws the buffer from the server.
    ///
    /// Returns whether the server could have observed the buffer as open; a
    /// buffer closed straight from `Initial`, or one whose queued open was
    /// elided before any flush, was never visible to it.
    pub fn close(&mut self, synchronizer: &mut BufferSynchronizer) -> bool {
        if self.state != BufferState::Open {
            self.state = BufferState::Closed;
            return false;
        }
        self.state = BufferState::Closed;
        synchronizer.close(&self.resource, &self.filepath)
    }

    /// Relays editor content changes to the server.
    ///
    /// Changes are only expected while `Open`; receiving one in another
    /// state is a defect upstream, logged and relayed anyway so the editor
    /// and server cannot drift apart silently.
    pub fn on_content_changed(
        &self,
        synchronizer: &mut BufferSynchronizer,
        events: &[TextDocumentContentChangeEvent],
    ) {
        if self.state != BufferState::Open {
            warn!(
                resource = %self.resource,
                state = ?self.state,
                "content change for a buffer that is not open"
            );
        }
        synchronizer.change(&self.resource, &self.filepath, events);
    }
}
