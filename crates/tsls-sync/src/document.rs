//! Read-only view of an editor document.

use lsp_types::Url;

/// What the bridge needs to know about an editor document.
///
/// The editor layer implements this over its live document model; the bridge
/// never mutates documents and never applies the content changes it relays
/// (edits pass through opaquely). `text` and `line_count` must reflect the
/// document as it currently stands, since a server restart re-opens every
/// buffer from this view.
pub trait TextDocument: Send + Sync {
    /// The document's URI.
    fn uri(&self) -> Url;

    /// The editor language id, e.g. `"typescript"` or `"javascriptreact"`.
    fn language_id(&self) -> String;

    /// Current number of lines.
    fn line_count(&self) -> u32;

    /// Current full text.
    fn text(&self) -> String;
}
