//! One in-flight diagnostics request.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use lsp_types::Url;
use parking_lot::Mutex;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tsls_protocol::{Command, GeterrForProjectRequestArgs, GeterrRequestArgs, ProtocolVersion};

use crate::client::{Client, ClientCapability};
use crate::resource_map::ResourceSet;

/// A single cancellable `geterr` / `geterrForProject` request.
///
/// Construction decides whether the server can report errors at all, filters
/// the file set down to what it can serve, and issues the request. The
/// completion callback runs exactly once, whether the request resolves,
/// fails, or is cancelled; when nothing needs to be sent it still runs, on a
/// later scheduler turn so the caller can store the handle first.
pub struct GetErrRequest {
    files: Mutex<ResourceSet>,
    done: AtomicBool,
    token: CancellationToken,
}

impl GetErrRequest {
    /// Issues a diagnostics request over `files`.
    pub fn execute(
        client: Arc<dyn Client>,
        files: ResourceSet,
        on_done: impl FnOnce() + Send + 'static,
    ) -> Arc<Self> {
        let token = CancellationToken::new();
        let request = Arc::new(Self {
            files: Mutex::new(files),
            done: AtomicBool::new(false),
            token: token.clone(),
        });

        if !error_reporting_enabled(client.as_ref()) {
            return Self::finish_immediately(request, on_done);
        }

        // Older servers answer geterr only from the semantic side, so files
        // outside the project have to be dropped up front.
        let syntax_get_err_supported = client.api_version().gte(ProtocolVersion::V4_4_0);
        let file_paths: Vec<String> = {
            let files = request.files.lock();
            files
                .entries()
                .filter(|(resource, ())| {
                    syntax_get_err_supported
                        || client.has_capability_for_resource(resource, ClientCapability::Semantic)
                })
                .filter_map(|(resource, ())| client.to_ts_file_path(resource))
                .collect()
        };
        if file_paths.is_empty() {
            return Self::finish_immediately(request, on_done);
        }

        let project_wide = client.configuration().enable_project_diagnostics
            && client.capabilities().has(ClientCapability::Semantic);
        let (command, args) = if project_wide {
            // The server widens a single file to its whole project, so only
            // the first file of the set is sent.
            let args = GeterrForProjectRequestArgs {
                delay: 0,
                file: file_paths[0].clone(),
            };
            (Command::GeterrForProject, serde_json::to_value(args))
        } else {
            let args = GeterrRequestArgs {
                delay: 0,
                files: file_paths,
            };
            (Command::Geterr, serde_json::to_value(args))
        };
        let args = args.unwrap_or(Value::Null);

        let task_request = Arc::clone(&request);
        tokio::spawn(async move {
            let request_token = token.clone();
            tokio::select! {
                () = token.cancelled() => {}
                _ = client.execute_async(command, args, request_token) => {}
            }
            task_request.finish(on_done);
        });

        request
    }

    fn finish_immediately(request: Arc<Self>, on_done: impl FnOnce() + Send + 'static) -> Arc<Self> {
        request.done.store(true, Ordering::SeqCst);
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            on_done();
        });
        request
    }

    fn finish(&self, on_done: impl FnOnce() + Send + 'static) {
        if !self.done.swap(true, Ordering::SeqCst) {
            on_done();
        }
    }

    /// True once the request has resolved, failed, been cancelled, or was
    /// never issued.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }

    /// Signals cancellation. Idempotent; the local request is treated as
    /// done as soon as the signal lands, without waiting on the server.
    pub fn cancel(&self) {
        if !self.done.load(Ordering::SeqCst) {
            self.token.cancel();
        }
    }

    /// The resources this request still tracks.
    #[must_use]
    pub fn file_resources(&self) -> Vec<Url> {
        self.files
            .lock()
            .entries()
            .map(|(resource, ())| resource.clone())
            .collect()
    }

    /// Stops tracking `resource`; the file will not be re-queued when this
    /// request is cancelled and replaced.
    pub fn remove_file(&self, resource: &Url) {
        self.files.lock().remove(resource);
    }
}

fn error_reporting_enabled(client: &dyn Client) -> bool {
    if client.api_version().gte(ProtocolVersion::V4_4_0) {
        return true;
    }
    // Older servers report errors only when the semantic side is up.
    client.capabilities().has(ClientCapability::Semantic)
}
