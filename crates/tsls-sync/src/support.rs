//! The orchestrator wiring buffers, tabs, and the diagnostics loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use lsp_types::{TextDocumentContentChangeEvent, Url};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashSet;
use tsls_protocol::Command;

use crate::buffer::{BufferKind, SyncedBuffer};
use crate::client::Client;
use crate::config::ValidateSettings;
use crate::delayer::Delayer;
use crate::document::TextDocument;
use crate::get_err::GetErrRequest;
use crate::pending::PendingDiagnostics;
use crate::resource_map::{file_path_normalizer, MapConfig, ResourceMap};
use crate::synchronizer::BufferSynchronizer;
use crate::tabs::{Tab, TabResourceTracker};

/// Debounce for a drain that was not scheduled per file.
const TRIGGER_DELAY: Duration = Duration::from_millis(200);
/// Base debounce of the diagnostics delayer; also the floor of the per-file
/// delay window.
const DIAGNOSTIC_DELAY: Duration = Duration::from_millis(300);
/// Ceiling of the per-file delay window.
const MAX_FILE_DELAY_MS: u64 = 800;

type ResourceListener = Box<dyn Fn(&Url) + Send + Sync>;

/// Keeps the server's replica of open files coherent with the editor and
/// drives the debounced diagnostics loop.
///
/// Editor events arrive as plain method calls; completions and timer firings
/// come back on Tokio tasks, so an instance must be created inside a
/// runtime. All state lives behind one lock and every entry point is safe to
/// call from any thread.
pub struct BufferSyncSupport {
    inner: Arc<Inner>,
}

struct Inner {
    client: Arc<dyn Client>,
    state: Mutex<State>,
    diagnostic_delayer: Delayer,
    on_delete: RwLock<Vec<ResourceListener>>,
    on_will_change: RwLock<Vec<ResourceListener>>,
}

struct State {
    language_ids: FxHashSet<String>,
    synced_buffers: ResourceMap<SyncedBuffer>,
    pending_diagnostics: PendingDiagnostics,
    synchronizer: BufferSynchronizer,
    tabs: TabResourceTracker,
    pending_get_err: Option<PendingGetErr>,
    get_err_generation: u64,
    validate: ValidateSettings,
}

/// The current in-flight request, tagged so a stale completion callback
/// cannot clear a successor that replaced it.
struct PendingGetErr {
    generation: u64,
    request: Arc<GetErrRequest>,
}

impl BufferSyncSupport {
    /// Creates the orchestrator over `client`.
    ///
    /// Only documents whose language id is in `language_ids` are mirrored.
    /// `initial_tabs` seeds the visibility tracker with the editor's current
    /// tab snapshot.
    #[must_use]
    pub fn new(
        client: Arc<dyn Client>,
        language_ids: impl IntoIterator<Item = String>,
        settings: ValidateSettings,
        on_case_insensitive_file_system: bool,
        initial_tabs: impl IntoIterator<Item = Tab>,
    ) -> Self {
        let config = MapConfig {
            on_case_insensitive_file_system,
        };
        let state = State {
            language_ids: language_ids.into_iter().collect(),
            synced_buffers: ResourceMap::new(file_path_normalizer, config),
            pending_diagnostics: PendingDiagnostics::new(file_path_normalizer, config),
            synchronizer: BufferSynchronizer::new(
                Arc::clone(&client),
                file_path_normalizer,
                config,
            ),
            tabs: TabResourceTracker::new(file_path_normalizer, config, initial_tabs),
            pending_get_err: None,
            get_err_generation: 0,
            validate: settings,
        };
        Self {
            inner: Arc::new(Inner {
                client,
                state: Mutex::new(state),
                diagnostic_delayer: Delayer::new(DIAGNOSTIC_DELAY),
                on_delete: RwLock::new(Vec::new()),
                on_will_change: RwLock::new(Vec::new()),
            }),
        }
    }

    /// True when `resource` is a tracked synced buffer.
    #[must_use]
    pub fn handles(&self, resource: &Url) -> bool {
        self.inner.state.lock().synced_buffers.contains(resource)
    }

    /// Registers a listener fired after a buffer is removed.
    pub fn on_delete(&self, listener: impl Fn(&Url) + Send + Sync + 'static) {
        self.inner.on_delete.write().push(Box::new(listener));
    }

    /// Registers a listener fired before a change is forwarded.
    pub fn on_will_change(&self, listener: impl Fn(&Url) + Send + Sync + 'static) {
        self.inner.on_will_change.write().push(Box::new(listener));
    }

    /// Editor opened a document.
    ///
    /// Ignored unless the language id is accepted, the resource resolves to
    /// a server file id, and the document is not already tracked (a
    /// duplicate open short-circuits as success).
    pub fn did_open_document(&self, document: Arc<dyn TextDocument>) {
        let inner = &self.inner;
        let mut state = inner.state.lock();
        if !state.language_ids.contains(&document.language_id()) {
            return;
        }
        let resource = document.uri();
        if state.synced_buffers.contains(&resource) {
            return;
        }
        let Some(filepath) = inner.client.to_ts_file_path(&resource) else {
            return;
        };

        let mut buffer = SyncedBuffer::new(document, filepath, Arc::clone(&inner.client));
        {
            let State {
                synced_buffers,
                synchronizer,
                ..
            } = &mut *state;
            buffer.open(synchronizer);
            synced_buffers.insert(&resource, buffer);
        }
        inner.request_diagnostic_locked(&mut state, &resource);
    }

    /// Editor closed a document.
    pub fn did_close_document(&self, resource: &Url) {
        let inner = &self.inner;
        {
            let mut state = inner.state.lock();
            let was_open = {
                let State {
                    synced_buffers,
                    pending_diagnostics,
                    pending_get_err,
                    synchronizer,
                    ..
                } = &mut *state;
                let Some(mut buffer) = synced_buffers.remove(resource) else {
                    return;
                };
                pending_diagnostics.remove(resource);
                if let Some(pending) = pending_get_err {
                    pending.request.remove_file(resource);
                }
                buffer.close(synchronizer)
            };
            // Closing a file the server had open changes what the remaining
            // buffers resolve against, so they are all re-checked.
            if was_open {
                inner.request_all_diagnostics_locked(&mut state);
            }
        }
        inner.fire(&inner.on_delete, resource);
    }

    /// Editor changed a document's content.
    pub fn did_change_document(
        &self,
        resource: &Url,
        changes: &[TextDocumentContentChangeEvent],
    ) {
        let inner = &self.inner;
        {
            let state = inner.state.lock();
            if !state.synced_buffers.contains(resource) {
                return;
            }
        }
        inner.fire(&inner.on_will_change, resource);

        let mut state = inner.state.lock();
        {
            let State {
                synced_buffers,
                synchronizer,
                ..
            } = &mut *state;
            let Some(buffer) = synced_buffers.get(resource) else {
                return;
            };
            buffer.on_content_changed(synchronizer, changes);
        }
        let requested = inner.request_diagnostic_locked(&mut state, resource);
        if !requested {
            // The edited file is not eligible for its own request, but an
            // in-flight cycle would otherwise report stale positions for it.
            if let Some(pending) = state.pending_get_err.take() {
                pending.request.cancel();
                inner.trigger_diagnostics(TRIGGER_DELAY);
            }
        }
    }

    /// Editor changed the set of visible documents.
    pub fn did_change_visible_documents(&self, resources: &[Url]) {
        let inner = &self.inner;
        let mut state = inner.state.lock();
        for resource in resources {
            if state.synced_buffers.contains(resource) {
                inner.request_diagnostic_locked(&mut state, resource);
            }
        }
    }

    /// Editor opened or closed tabs.
    pub fn did_change_tabs(&self, opened: &[Tab], closed: &[Tab]) {
        let inner = &self.inner;
        let mut state = inner.state.lock();
        let Some(delta) = state.tabs.handle_tab_change(opened, closed) else {
            return;
        };
        // With project-wide diagnostics, visibility does not gate anything.
        if inner.client.configuration().enable_project_diagnostics {
            return;
        }
        for resource in &delta.closed {
            if state.synced_buffers.contains(resource) {
                state.pending_diagnostics.remove(resource);
                if let Some(pending) = &state.pending_get_err {
                    pending.request.remove_file(resource);
                }
            }
        }
        for resource in &delta.opened {
            if state.synced_buffers.contains(resource) {
                inner.request_diagnostic_locked(&mut state, resource);
            }
        }
    }

    /// Flushes queued buffer operations before any command that must observe
    /// a consistent buffer set.
    pub fn before_command(&self, command: Command) {
        self.inner.state.lock().synchronizer.before_command(command);
    }

    /// Queues every validatable buffer for diagnostics.
    pub fn request_all_diagnostics(&self) {
        let inner = &self.inner;
        let mut state = inner.state.lock();
        inner.request_all_diagnostics_locked(&mut state);
    }

    /// Queues diagnostics for specific resources, skipping untracked ones.
    pub fn get_err(&self, resources: &[Url]) {
        let inner = &self.inner;
        let mut state = inner.state.lock();
        let now = Instant::now();
        let mut queued = false;
        for resource in resources {
            if state.synced_buffers.contains(resource) {
                state.pending_diagnostics.insert(resource, now);
                queued = true;
            }
        }
        if queued {
            inner.trigger_diagnostics(TRIGGER_DELAY);
        }
    }

    /// Runs `f` with any in-flight diagnostics request out of the way.
    ///
    /// The re-triggered drain afterwards folds every synced buffer back into
    /// a fresh request, so the cancelled cycle's files are not lost. With
    /// project-wide diagnostics there is nothing worth interrupting, so `f`
    /// simply runs.
    pub fn interrupt_get_err<R>(&self, f: impl FnOnce() -> R) -> R {
        let inner = &self.inner;
        let interrupted = {
            let mut state = inner.state.lock();
            if inner.client.configuration().enable_project_diagnostics {
                false
            } else if let Some(pending) = state.pending_get_err.take() {
                pending.request.cancel();
                true
            } else {
                false
            }
        };
        let result = f();
        if interrupted {
            inner.trigger_diagnostics(TRIGGER_DELAY);
        }
        result
    }

    /// Applies updated validation settings; kinds that just became
    /// validatable are re-requested.
    pub fn set_validation(&self, settings: ValidateSettings) {
        let inner = &self.inner;
        let mut state = inner.state.lock();
        let previous = state.validate;
        state.validate = settings;
        let typescript_enabled =
            settings.validate_typescript && !previous.validate_typescript;
        let javascript_enabled =
            settings.validate_javascript && !previous.validate_javascript;
        if typescript_enabled || javascript_enabled {
            inner.request_all_diagnostics_locked(&mut state);
        }
    }

    /// Cancels in-flight work and forgets everything queued, keeping the
    /// synced buffers themselves.
    pub fn reset(&self) {
        let mut state = self.inner.state.lock();
        if let Some(pending) = state.pending_get_err.take() {
            pending.request.cancel();
        }
        state.pending_diagnostics.clear();
        state.synchronizer.reset();
    }

    /// Re-announces every tracked buffer after a server restart.
    pub fn reinitialize(&self) {
        self.reset();
        let mut state = self.inner.state.lock();
        let State {
            synced_buffers,
            synchronizer,
            ..
        } = &mut *state;
        for buffer in synced_buffers.values_mut() {
            buffer.open(synchronizer);
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl BufferSyncSupport {
    /// True while a diagnostics request handle is held as pending.
    #[must_use]
    pub fn has_pending_get_err(&self) -> bool {
        self.inner.state.lock().pending_get_err.is_some()
    }

    /// Number of files queued for the next drain.
    #[must_use]
    pub fn pending_diagnostics_len(&self) -> usize {
        self.inner.state.lock().pending_diagnostics.len()
    }
}

impl Inner {
    /// Queues diagnostics for one buffer, debounced proportionally to its
    /// size so huge files batch more edits per request.
    ///
    /// Returns false, scheduling nothing, when the buffer is not eligible
    /// for validation.
    fn request_diagnostic_locked(self: &Arc<Self>, state: &mut State, resource: &Url) -> bool {
        let line_count = {
            let Some(buffer) = state.synced_buffers.get(resource) else {
                return false;
            };
            if !should_validate(self.client.as_ref(), state, buffer) {
                return false;
            }
            buffer.line_count()
        };
        state.pending_diagnostics.insert(resource, Instant::now());
        let delay_ms = u64::from(line_count)
            .div_ceil(20)
            .clamp(DIAGNOSTIC_DELAY.as_millis() as u64, MAX_FILE_DELAY_MS);
        self.trigger_diagnostics(Duration::from_millis(delay_ms));
        true
    }

    fn request_all_diagnostics_locked(self: &Arc<Self>, state: &mut State) {
        let now = Instant::now();
        let eligible: Vec<Url> = {
            let state: &State = state;
            state
                .synced_buffers
                .values()
                .filter(|buffer| should_validate(self.client.as_ref(), state, buffer))
                .map(|buffer| buffer.resource().clone())
                .collect()
        };
        for resource in &eligible {
            state.pending_diagnostics.insert(resource, now);
        }
        self.trigger_diagnostics(TRIGGER_DELAY);
    }

    fn trigger_diagnostics(self: &Arc<Self>, delay: Duration) {
        let weak = Arc::downgrade(self);
        self.diagnostic_delayer.trigger_with_delay(delay, move || {
            if let Some(inner) = weak.upgrade() {
                inner.send_pending_diagnostics();
            }
        });
    }

    /// Drains the pending set into a fresh diagnostics request.
    fn send_pending_diagnostics(self: &Arc<Self>) {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        // Oldest queued file first.
        let mut ordered = state.pending_diagnostics.get_ordered_file_set();

        // A superseded in-flight request donates the files it was still
        // tracking, so none of them silently miss the new cycle.
        if let Some(pending) = state.pending_get_err.take() {
            pending.request.cancel();
            for resource in pending.request.file_resources() {
                if state.synced_buffers.contains(&resource) {
                    ordered.insert(&resource, ());
                }
            }
        }

        // Every synced buffer rides along; it may be visible in an editor
        // that never produced a pending entry.
        for (resource, _) in state.synced_buffers.entries() {
            ordered.insert(resource, ());
        }

        if !ordered.is_empty() {
            state.get_err_generation += 1;
            let generation = state.get_err_generation;
            let weak = Arc::downgrade(self);
            let request = GetErrRequest::execute(Arc::clone(&self.client), ordered, move || {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let mut state = inner.state.lock();
                let still_current = state
                    .pending_get_err
                    .as_ref()
                    .is_some_and(|pending| pending.generation == generation);
                if still_current {
                    state.pending_get_err = None;
                }
            });
            state.pending_get_err = Some(PendingGetErr {
                generation,
                request,
            });
        }

        state.pending_diagnostics.clear();
    }

    fn fire(&self, listeners: &RwLock<Vec<ResourceListener>>, resource: &Url) {
        for listener in listeners.read().iter() {
            listener(resource);
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(pending) = self.state.get_mut().pending_get_err.take() {
            pending.request.cancel();
        }
    }
}

fn should_validate(client: &dyn Client, state: &State, buffer: &SyncedBuffer) -> bool {
    // Without project-wide diagnostics, only files the user can see are
    // worth a server round-trip.
    if !client.configuration().enable_project_diagnostics && !state.tabs.has(buffer.resource()) {
        return false;
    }
    match buffer.kind() {
        BufferKind::JavaScript => state.validate.validate_javascript,
        BufferKind::TypeScript => state.validate.validate_typescript,
    }
}
