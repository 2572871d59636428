//! Coalescing of per-file operations into batched server requests.

use std::sync::Arc;

use lsp_types::{Range, TextDocumentContentChangeEvent, Url};
use serde_json::Value;
use tracing::warn;
use tsls_protocol::{
    ChangeRequestArgs, CloseRequestArgs, CodeEdit, Command, FileCodeEdits, Location,
    OpenRequestArgs, ProtocolVersion, UpdateOpenRequestArgs,
};

use crate::client::{Client, ExecuteOptions};
use crate::resource_map::{MapConfig, PathNormalizer, ResourceMap};

/// The one operation pending for a resource between an edit and a flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferOperation {
    /// Announce the file.
    Open(OpenRequestArgs),
    /// Withdraw the file, by server file id.
    Close(String),
    /// Edit the file in place.
    Change(FileCodeEdits),
}

/// Forwards buffer open/close/change operations to the server.
///
/// Against servers that accept `updateOpen` the operations are coalesced per
/// resource and flushed as a single batch; older servers get each operation
/// immediately as its own command. At most one operation is pending per
/// resource at any time.
pub struct BufferSynchronizer {
    client: Arc<dyn Client>,
    supports_batching: bool,
    pending: ResourceMap<BufferOperation>,
}

impl BufferSynchronizer {
    /// Creates a synchronizer; batching mode follows the server's protocol
    /// version.
    #[must_use]
    pub fn new(client: Arc<dyn Client>, normalizer: PathNormalizer, config: MapConfig) -> Self {
        let supports_batching = client.api_version().gte(ProtocolVersion::V3_4_0);
        Self {
            client,
            supports_batching,
            pending: ResourceMap::new(normalizer, config),
        }
    }

    /// True when operations are batched into `updateOpen`.
    #[must_use]
    pub fn supports_batching(&self) -> bool {
        self.supports_batching
    }

    /// Queues (or directly sends) an open for `resource`.
    pub fn open(&mut self, resource: &Url, args: OpenRequestArgs) {
        if self.supports_batching {
            self.update_pending(resource, BufferOperation::Open(args));
        } else {
            self.client
                .execute_without_waiting_for_response(Command::Open, args_value(&args));
        }
    }

    /// Queues (or directly sends) a close for `resource`.
    ///
    /// Returns whether the server has observed, or will observe, the file as
    /// open. A close that merely cancels a still-queued open reports
    /// `false`: the server never learned about the buffer, and there is
    /// nothing to send.
    pub fn close(&mut self, resource: &Url, filepath: &str) -> bool {
        if self.supports_batching {
            self.update_pending(resource, BufferOperation::Close(filepath.to_string()))
        } else {
            let args = CloseRequestArgs {
                file: filepath.to_string(),
            };
            self.client
                .execute_without_waiting_for_response(Command::Close, args_value(&args));
            true
        }
    }

    /// Queues (or directly sends) content changes for `resource`.
    ///
    /// The edit list is reversed so the server applies end-of-document edits
    /// first and earlier positions stay valid throughout.
    pub fn change(
        &mut self,
        resource: &Url,
        filepath: &str,
        events: &[TextDocumentContentChangeEvent],
    ) {
        if events.is_empty() {
            return;
        }
        if self.supports_batching {
            self.update_pending(
                resource,
                BufferOperation::Change(FileCodeEdits {
                    file_name: filepath.to_string(),
                    text_changes: code_edits(resource, events),
                }),
            );
        } else {
            for event in events.iter().rev() {
                let Some(range) = event.range else {
                    warn!(%resource, "dropping range-less change event");
                    continue;
                };
                let args = ChangeRequestArgs {
                    file: filepath.to_string(),
                    line: range.start.line + 1,
                    offset: range.start.character + 1,
                    end_line: range.end.line + 1,
                    end_offset: range.end.character + 1,
                    insert_string: event.text.clone(),
                };
                self.client
                    .execute_without_waiting_for_response(Command::Change, args_value(&args));
            }
        }
    }

    /// Guarantees the server sees a consistent buffer set before `command`
    /// runs.
    pub fn before_command(&mut self, command: Command) {
        if command != Command::UpdateOpen {
            self.flush();
        }
    }

    /// Sends every pending operation as one `updateOpen` batch.
    pub fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }

        let mut args = UpdateOpenRequestArgs::default();
        for (_, operation) in self.pending.drain() {
            match operation {
                BufferOperation::Open(open) => args.open_files.push(open),
                BufferOperation::Close(file) => args.closed_files.push(file),
                BufferOperation::Change(edits) => args.changed_files.push(edits),
            }
        }

        let client = Arc::clone(&self.client);
        tokio::spawn(async move {
            let _ = client
                .execute(
                    Command::UpdateOpen,
                    args_value(&args),
                    None,
                    ExecuteOptions {
                        non_recoverable: true,
                    },
                )
                .await;
        });
    }

    /// Drops all pending operations without sending them.
    pub fn reset(&mut self) {
        self.pending.clear();
    }

    /// Records `operation` as the single pending operation for `resource`.
    ///
    /// A pending operation for the same resource forces a flush of the whole
    /// batch first, so the server observes transitions in causal order with
    /// respect to other files. The exception is a close landing on a queued
    /// open, which cancels the pair outright and reports `false`.
    fn update_pending(&mut self, resource: &Url, operation: BufferOperation) -> bool {
        match self.pending.get(resource) {
            Some(BufferOperation::Open(_)) if matches!(operation, BufferOperation::Close(_)) => {
                self.pending.remove(resource);
                return false;
            }
            Some(_) => {
                self.flush();
            }
            None => {}
        }
        self.pending.insert(resource, operation);
        true
    }
}

fn code_edits(resource: &Url, events: &[TextDocumentContentChangeEvent]) -> Vec<CodeEdit> {
    events
        .iter()
        .rev()
        .filter_map(|event| match event.range {
            Some(range) => Some(code_edit(range, event.text.clone())),
            None => {
                warn!(%resource, "dropping range-less change event");
                None
            }
        })
        .collect()
}

fn code_edit(range: Range, new_text: String) -> CodeEdit {
    CodeEdit {
        start: Location {
            line: range.start.line + 1,
            offset: range.start.character + 1,
        },
        end: Location {
            line: range.end.line + 1,
            offset: range.end.character + 1,
        },
        new_text,
    }
}

fn args_value<T: serde::Serialize>(args: &T) -> Value {
    // Derived Serialize on plain protocol structs cannot fail.
    serde_json::to_value(args).unwrap_or(Value::Null)
}
