//! End-to-end scheduling behavior of the orchestrator against a scripted
//! client.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lsp_types::{Position, Url};
use parking_lot::Mutex;
use tsls_protocol::Command;
use tsls_sync::test_support::{change_event, ExecutedCommand, MockClient, MockDocument};
use tsls_sync::{BufferSyncSupport, Tab, TabInput, ValidateSettings};

fn url(text: &str) -> Url {
    Url::parse(text).expect("test url")
}

fn text_tab(id: u64, uri: &str) -> Tab {
    Tab {
        id,
        input: TabInput::Text { uri: url(uri) },
    }
}

fn support(client: &Arc<MockClient>, initial_tabs: Vec<Tab>) -> BufferSyncSupport {
    BufferSyncSupport::new(
        Arc::clone(client) as _,
        ["typescript", "typescriptreact", "javascript", "javascriptreact"]
            .into_iter()
            .map(String::from),
        ValidateSettings::default(),
        false,
        initial_tabs,
    )
}

/// Waits long enough for pending timers below `ms` to fire and for spawned
/// request tasks to run.
async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    tokio::task::yield_now().await;
    tokio::task::yield_now().await;
}

fn geterr_requests(executed: &[ExecutedCommand]) -> Vec<&ExecutedCommand> {
    executed
        .iter()
        .filter(|entry| entry.command == Command::Geterr)
        .collect()
}

fn geterr_files(entry: &ExecutedCommand) -> Vec<String> {
    entry.args["files"]
        .as_array()
        .expect("geterr files array")
        .iter()
        .map(|file| file.as_str().expect("file id").to_string())
        .collect()
}

#[tokio::test(start_paused = true)]
async fn opening_a_visible_document_schedules_diagnostics() {
    let client = Arc::new(MockClient::new());
    let support = support(&client, vec![text_tab(1, "file:///src/a.ts")]);

    support.did_open_document(MockDocument::new("file:///src/a.ts", "typescript", "let x = 1;\n"));
    assert!(support.handles(&url("file:///src/a.ts")));

    // The per-file delay floor is 300ms; nothing is sent before it.
    advance(100).await;
    assert!(geterr_requests(&client.executed()).is_empty());

    advance(300).await;
    let executed = client.executed();
    let requests = geterr_requests(&executed);
    assert_eq!(requests.len(), 1);
    assert_eq!(geterr_files(requests[0]), ["/src/a.ts"]);
    assert_eq!(requests[0].args["delay"], 0);
}

#[tokio::test(start_paused = true)]
async fn unacceptable_documents_are_ignored() {
    let client = Arc::new(MockClient::new());
    let support = support(&client, vec![text_tab(1, "file:///src/a.md")]);

    // Wrong language id.
    support.did_open_document(MockDocument::new("file:///src/a.md", "markdown", ""));
    // No server file id for the scheme.
    support.did_open_document(MockDocument::new("untitled:Untitled-1", "typescript", ""));

    assert!(!support.handles(&url("file:///src/a.md")));
    assert!(!support.handles(&url("untitled:Untitled-1")));
    advance(1000).await;
    assert!(client.executed().is_empty());
}

#[tokio::test(start_paused = true)]
async fn duplicate_open_is_short_circuited() {
    let client = Arc::new(MockClient::new());
    let support = support(&client, vec![text_tab(1, "file:///src/a.ts")]);

    support.did_open_document(MockDocument::new("file:///src/a.ts", "typescript", "one\n"));
    support.did_open_document(MockDocument::new("file:///src/a.ts", "typescript", "two\n"));
    support.before_command(Command::Geterr);
    advance(5).await;

    let executed = client.executed();
    let update_open: Vec<_> = executed
        .iter()
        .filter(|entry| entry.command == Command::UpdateOpen)
        .collect();
    assert_eq!(update_open.len(), 1);
    assert_eq!(
        update_open[0].args["openFiles"]
            .as_array()
            .expect("openFiles")
            .len(),
        1,
        "the second open must not reach the server"
    );
}

#[tokio::test(start_paused = true)]
async fn open_then_close_produces_no_server_traffic() {
    let client = Arc::new(MockClient::new());
    let support = support(&client, vec![text_tab(1, "file:///src/a.ts")]);

    let deletions = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&deletions);
    support.on_delete(move |resource| captured.lock().push(resource.clone()));

    support.did_open_document(MockDocument::new("file:///src/a.ts", "typescript", ""));
    support.did_close_document(&url("file:///src/a.ts"));
    support.before_command(Command::Geterr);
    advance(5).await;

    assert!(!support.handles(&url("file:///src/a.ts")));
    assert_eq!(deletions.lock().clone(), vec![url("file:///src/a.ts")]);
    let executed = client.executed();
    assert!(
        executed.iter().all(|entry| entry.command != Command::UpdateOpen),
        "an elided open/close pair sends nothing"
    );
}

#[tokio::test(start_paused = true)]
async fn closing_an_observably_open_buffer_requeues_the_rest() {
    let client = Arc::new(MockClient::new());
    let support = support(
        &client,
        vec![text_tab(1, "file:///src/a.ts"), text_tab(2, "file:///src/b.ts")],
    );

    support.did_open_document(MockDocument::new("file:///src/a.ts", "typescript", ""));
    support.did_open_document(MockDocument::new("file:///src/b.ts", "typescript", ""));
    support.before_command(Command::Geterr);
    advance(400).await;
    client.clear_executed();

    support.did_close_document(&url("file:///src/a.ts"));
    advance(250).await;

    let executed = client.executed();
    let requests = geterr_requests(&executed);
    assert_eq!(requests.len(), 1, "a full re-request runs after the close");
    assert_eq!(geterr_files(requests[0]), ["/src/b.ts"]);
}

#[tokio::test(start_paused = true)]
async fn change_fires_will_change_and_schedules() {
    let client = Arc::new(MockClient::new());
    let support = support(&client, vec![text_tab(1, "file:///src/a.ts")]);

    let will_change = Arc::new(AtomicUsize::new(0));
    let captured = Arc::clone(&will_change);
    support.on_will_change(move |_| {
        captured.fetch_add(1, Ordering::SeqCst);
    });

    let document = MockDocument::new("file:///src/a.ts", "typescript", "let x = 1;\n");
    support.did_open_document(Arc::clone(&document) as _);
    advance(400).await;
    client.clear_executed();

    document.set_text("let x = 2;\n");
    support.did_change_document(
        &url("file:///src/a.ts"),
        &[change_event(Position::new(0, 8), Position::new(0, 9), "2")],
    );
    assert_eq!(will_change.load(Ordering::SeqCst), 1);

    // Untracked resources neither fire events nor schedule work.
    support.did_change_document(&url("file:///src/other.ts"), &[]);
    assert_eq!(will_change.load(Ordering::SeqCst), 1);

    advance(350).await;
    let executed = client.executed();
    assert_eq!(geterr_requests(&executed).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn interrupting_replaces_the_inflight_request() {
    let client = Arc::new(MockClient::new().hold_async_requests());
    let support = support(
        &client,
        vec![text_tab(1, "file:///src/a.ts"), text_tab(2, "file:///src/b.ts")],
    );

    support.did_open_document(MockDocument::new("file:///src/a.ts", "typescript", ""));
    support.did_open_document(MockDocument::new("file:///src/b.ts", "typescript", ""));
    advance(400).await;
    assert_eq!(geterr_requests(&client.executed()).len(), 1);
    assert!(support.has_pending_get_err());

    let ran = Arc::new(AtomicUsize::new(0));
    let captured = Arc::clone(&ran);
    support.interrupt_get_err(move || {
        captured.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(ran.load(Ordering::SeqCst), 1);

    advance(250).await;
    let executed = client.executed();
    let requests = geterr_requests(&executed);
    assert_eq!(requests.len(), 2, "the cancelled cycle is replaced");
    assert_eq!(geterr_files(requests[1]), ["/src/a.ts", "/src/b.ts"]);
    assert!(support.has_pending_get_err());
}

#[tokio::test(start_paused = true)]
async fn invisible_buffers_are_gated_until_a_tab_shows_them() {
    let client = Arc::new(MockClient::new());
    let support = support(&client, vec![]);

    support.did_open_document(MockDocument::new("file:///src/x.ts", "typescript", ""));
    assert_eq!(support.pending_diagnostics_len(), 0, "nothing scheduled while invisible");
    advance(1000).await;
    assert!(geterr_requests(&client.executed()).is_empty());

    support.did_change_tabs(&[text_tab(1, "file:///src/x.ts")], &[]);
    advance(400).await;
    let executed = client.executed();
    let requests = geterr_requests(&executed);
    assert_eq!(requests.len(), 1);
    assert_eq!(geterr_files(requests[0]), ["/src/x.ts"]);
}

#[tokio::test(start_paused = true)]
async fn ineligible_change_still_interrupts_the_current_cycle() {
    let client = Arc::new(MockClient::new().hold_async_requests());
    let support = support(&client, vec![text_tab(1, "file:///src/a.ts")]);

    support.did_open_document(MockDocument::new("file:///src/a.ts", "typescript", ""));
    // Tracked but invisible, so its own diagnostics are gated off.
    support.did_open_document(MockDocument::new("file:///src/x.ts", "typescript", ""));
    advance(400).await;
    assert_eq!(geterr_requests(&client.executed()).len(), 1);

    support.did_change_document(
        &url("file:///src/x.ts"),
        &[change_event(Position::new(0, 0), Position::new(0, 0), "x")],
    );
    advance(250).await;

    let executed = client.executed();
    let requests = geterr_requests(&executed);
    assert_eq!(
        requests.len(),
        2,
        "the edit may not silently miss the next cycle"
    );
}

#[tokio::test(start_paused = true)]
async fn closing_the_last_tab_drops_the_queued_request() {
    let client = Arc::new(MockClient::new());
    let support = support(&client, vec![text_tab(1, "file:///src/a.ts")]);

    support.did_open_document(MockDocument::new("file:///src/a.ts", "typescript", ""));
    assert_eq!(support.pending_diagnostics_len(), 1);

    support.did_change_tabs(&[], &[text_tab(1, "file:///src/a.ts")]);
    assert_eq!(support.pending_diagnostics_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn tab_changes_are_inert_under_project_diagnostics() {
    let client = Arc::new(MockClient::new().with_project_diagnostics(true));
    let support = support(&client, vec![]);

    support.did_open_document(MockDocument::new("file:///src/a.ts", "typescript", ""));
    advance(400).await;
    client.clear_executed();

    support.did_change_tabs(&[text_tab(1, "file:///src/a.ts")], &[]);
    advance(400).await;
    assert!(client.executed().is_empty(), "no per-tab scheduling in project mode");
}

#[tokio::test(start_paused = true)]
async fn reinitialize_reopens_every_buffer() {
    let client = Arc::new(MockClient::new());
    let support = support(&client, vec![text_tab(1, "file:///src/a.ts")]);

    let document = MockDocument::new("file:///src/a.ts", "typescript", "let x = 1;\n");
    support.did_open_document(Arc::clone(&document) as _);
    support.before_command(Command::Geterr);
    advance(400).await;
    client.clear_executed();

    // The server restarted and lost its replica; the reopen must carry the
    // document's current content.
    document.set_text("let x = 2;\n");
    support.reinitialize();
    support.before_command(Command::Geterr);
    advance(5).await;

    let executed = client.executed();
    let update_open: Vec<_> = executed
        .iter()
        .filter(|entry| entry.command == Command::UpdateOpen)
        .collect();
    assert_eq!(update_open.len(), 1);
    assert_eq!(
        update_open[0].args["openFiles"][0]["fileContent"],
        "let x = 2;\n"
    );
    assert!(support.handles(&url("file:///src/a.ts")));
}

#[tokio::test(start_paused = true)]
async fn reset_forgets_queued_work_but_keeps_buffers() {
    let client = Arc::new(MockClient::new());
    let support = support(&client, vec![text_tab(1, "file:///src/a.ts")]);

    support.did_open_document(MockDocument::new("file:///src/a.ts", "typescript", ""));
    assert_eq!(support.pending_diagnostics_len(), 1);

    support.reset();
    assert_eq!(support.pending_diagnostics_len(), 0);
    assert!(support.handles(&url("file:///src/a.ts")));

    // The queued open was discarded with the synchronizer state.
    support.before_command(Command::Geterr);
    advance(5).await;
    assert!(client
        .executed()
        .iter()
        .all(|entry| entry.command != Command::UpdateOpen));
}

#[tokio::test(start_paused = true)]
async fn enabling_validation_requeues_the_newly_eligible_kind() {
    let client = Arc::new(MockClient::new());
    let support = support(&client, vec![text_tab(1, "file:///src/a.js")]);

    support.set_validation(ValidateSettings {
        validate_javascript: false,
        validate_typescript: true,
    });
    support.did_open_document(MockDocument::new("file:///src/a.js", "javascript", ""));
    advance(1000).await;
    assert!(geterr_requests(&client.executed()).is_empty());

    support.set_validation(ValidateSettings::default());
    advance(250).await;
    let executed = client.executed();
    let requests = geterr_requests(&executed);
    assert_eq!(requests.len(), 1);
    assert_eq!(geterr_files(requests[0]), ["/src/a.js"]);
}

#[tokio::test(start_paused = true)]
async fn get_err_requeues_only_tracked_resources() {
    let client = Arc::new(MockClient::new());
    let support = support(&client, vec![text_tab(1, "file:///src/a.ts")]);

    support.did_open_document(MockDocument::new("file:///src/a.ts", "typescript", ""));
    advance(400).await;
    client.clear_executed();

    support.get_err(&[url("file:///src/a.ts"), url("file:///src/untracked.ts")]);
    advance(250).await;

    let executed = client.executed();
    let requests = geterr_requests(&executed);
    assert_eq!(requests.len(), 1);
    assert_eq!(geterr_files(requests[0]), ["/src/a.ts"]);
}
