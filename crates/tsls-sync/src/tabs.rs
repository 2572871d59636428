//! Visibility tracking over editor tabs.

use lsp_types::Url;
use rustc_hash::FxHashSet;

use crate::resource_map::{MapConfig, PathNormalizer, ResourceMap};

/// Identity of an editor tab, assigned by the editor layer. Tabs are only
/// ever used as set members; the tracker never looks inside them.
pub type TabId = u64;

/// What a tab displays, reduced to the resources it makes visible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabInput {
    /// A plain text editor.
    Text {
        /// The shown document.
        uri: Url,
    },
    /// A diff editor; both sides count as visible.
    TextDiff {
        /// Left-hand side.
        original: Url,
        /// Right-hand side.
        modified: Url,
    },
    /// A notebook editor.
    Notebook {
        /// The shown notebook.
        uri: Url,
    },
    /// Anything else; contributes no resources.
    Other,
}

/// One editor tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tab {
    /// Editor-assigned identity.
    pub id: TabId,
    /// What the tab displays.
    pub input: TabInput,
}

impl Tab {
    fn resources(&self) -> impl Iterator<Item = &Url> {
        let pair: [Option<&Url>; 2] = match &self.input {
            TabInput::Text { uri } | TabInput::Notebook { uri } => [Some(uri), None],
            TabInput::TextDiff { original, modified } => [Some(original), Some(modified)],
            TabInput::Other => [None, None],
        };
        pair.into_iter().flatten()
    }
}

/// Resources that became visible or invisible in one tab-change batch.
#[derive(Debug, Clone, Default)]
pub struct TabDelta {
    /// Resources shown by their first tab.
    pub opened: Vec<Url>,
    /// Resources whose last tab went away.
    pub closed: Vec<Url>,
}

impl TabDelta {
    /// True when the batch changed nothing observable.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.opened.is_empty() && self.closed.is_empty()
    }
}

/// Tracks which resources are currently visible in editor tabs.
///
/// Each tracked resource maps to the nonempty set of tabs showing it; the
/// entry is dropped the moment its last tab closes, so membership alone
/// answers visibility.
pub struct TabResourceTracker {
    tabs: ResourceMap<FxHashSet<TabId>>,
}

impl TabResourceTracker {
    /// Creates a tracker seeded with the editor's current tab snapshot.
    #[must_use]
    pub fn new(
        normalizer: PathNormalizer,
        config: MapConfig,
        initial: impl IntoIterator<Item = Tab>,
    ) -> Self {
        let mut tracker = Self {
            tabs: ResourceMap::new(normalizer, config),
        };
        let mut ignored = Vec::new();
        for tab in initial {
            tracker.add(&tab, &mut ignored);
        }
        tracker
    }

    /// True when `resource` is visible in at least one tab.
    #[must_use]
    pub fn has(&self, resource: &Url) -> bool {
        self.tabs.contains(resource)
    }

    /// Applies one batch of tab changes and reports the visibility delta,
    /// or `None` when no resource appeared or disappeared.
    pub fn handle_tab_change(&mut self, opened: &[Tab], closed: &[Tab]) -> Option<TabDelta> {
        let mut delta = TabDelta::default();
        for tab in closed {
            self.delete(tab, &mut delta.closed);
        }
        for tab in opened {
            self.add(tab, &mut delta.opened);
        }
        (!delta.is_empty()).then_some(delta)
    }

    fn add(&mut self, tab: &Tab, newly_opened: &mut Vec<Url>) {
        for resource in tab.resources() {
            match self.tabs.get_mut(resource) {
                Some(tabs) => {
                    tabs.insert(tab.id);
                }
                None => {
                    let mut tabs = FxHashSet::default();
                    tabs.insert(tab.id);
                    self.tabs.insert(resource, tabs);
                    newly_opened.push(resource.clone());
                }
            }
        }
    }

    fn delete(&mut self, tab: &Tab, newly_closed: &mut Vec<Url>) {
        for resource in tab.resources() {
            let Some(tabs) = self.tabs.get_mut(resource) else {
                continue;
            };
            tabs.remove(&tab.id);
            if tabs.is_empty() {
                self.tabs.remove(resource);
                newly_closed.push(resource.clone());
            }
        }
    }
}
