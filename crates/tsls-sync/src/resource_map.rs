//! Case-aware mapping from resource URIs to values.

use indexmap::IndexMap;
use lsp_types::Url;
use percent_encoding::percent_decode_str;

/// Produces the canonical string key for a resource, or `None` when the
/// resource cannot be keyed at all (such URIs are ignored by every map
/// operation).
pub type PathNormalizer = fn(&Url) -> Option<String>;

/// Case-sensitivity policy captured alongside the normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapConfig {
    /// Treat absolute POSIX paths as case-insensitive. Windows-style
    /// drive-letter paths are always case-insensitive regardless of this
    /// flag.
    pub on_case_insensitive_file_system: bool,
}

/// The default normalizer: file URIs become their decoded filesystem path,
/// everything else serializes without its fragment.
///
/// Drive-letter file URIs (`file:///C:/x`) normalize to `C:/x` on every
/// host, since TS server file ids use the editor host's path syntax rather
/// than the local one. UNC hosts are folded in as `//host/...`.
#[must_use]
pub fn file_path_normalizer(resource: &Url) -> Option<String> {
    if resource.scheme() != "file" {
        let mut without_fragment = resource.clone();
        without_fragment.set_fragment(None);
        return Some(without_fragment.to_string());
    }

    let decoded = percent_decode_str(resource.path()).decode_utf8_lossy();
    if let Some(host) = resource.host_str().filter(|host| !host.is_empty()) {
        return Some(format!("//{host}{decoded}"));
    }
    if let Some(tail) = decoded.strip_prefix('/') {
        if is_windows_path(tail) {
            return Some(tail.to_string());
        }
    }
    Some(decoded.into_owned())
}

fn is_windows_path(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'/' || bytes[2] == b'\\')
}

struct MapEntry<V> {
    resource: Url,
    value: V,
}

/// Mapping from URI to `V` with preservation of the original URI.
///
/// Keys are produced by the configured [`PathNormalizer`] and lowercased when
/// the path is detected as case-insensitive, so `file:///C:/A.ts` and
/// `file:///c:/a.ts` address the same slot. Iteration yields entries in the
/// order their key was first inserted, carrying the URI from that first
/// insertion.
pub struct ResourceMap<V> {
    normalizer: PathNormalizer,
    config: MapConfig,
    map: IndexMap<String, MapEntry<V>>,
}

/// A [`ResourceMap`] used for membership only.
pub type ResourceSet = ResourceMap<()>;

impl<V> ResourceMap<V> {
    /// Creates an empty map with the given keying policy.
    #[must_use]
    pub fn new(normalizer: PathNormalizer, config: MapConfig) -> Self {
        Self {
            normalizer,
            config,
            map: IndexMap::new(),
        }
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True when the map holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// True when `resource` keys to an entry.
    #[must_use]
    pub fn contains(&self, resource: &Url) -> bool {
        self.key_for(resource)
            .is_some_and(|key| self.map.contains_key(&key))
    }

    /// Returns the value stored for `resource`.
    #[must_use]
    pub fn get(&self, resource: &Url) -> Option<&V> {
        let key = self.key_for(resource)?;
        self.map.get(&key).map(|entry| &entry.value)
    }

    /// Returns the value stored for `resource`, mutably.
    pub fn get_mut(&mut self, resource: &Url) -> Option<&mut V> {
        let key = self.key_for(resource)?;
        self.map.get_mut(&key).map(|entry| &mut entry.value)
    }

    /// Stores `value` under `resource`.
    ///
    /// Replacing an existing entry keeps the URI from the first insertion;
    /// unkeyable resources are ignored.
    pub fn insert(&mut self, resource: &Url, value: V) {
        let Some(key) = self.key_for(resource) else {
            return;
        };
        match self.map.get_mut(&key) {
            Some(entry) => entry.value = value,
            None => {
                self.map.insert(
                    key,
                    MapEntry {
                        resource: resource.clone(),
                        value,
                    },
                );
            }
        }
    }

    /// Removes and returns the value stored for `resource`, keeping the
    /// relative order of the remaining entries.
    pub fn remove(&mut self, resource: &Url) -> Option<V> {
        let key = self.key_for(resource)?;
        self.map.shift_remove(&key).map(|entry| entry.value)
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Iterates values in first-insertion order.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.map.values().map(|entry| &entry.value)
    }

    /// Iterates values mutably in first-insertion order.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.map.values_mut().map(|entry| &mut entry.value)
    }

    /// Iterates `(original URI, value)` pairs in first-insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (&Url, &V)> {
        self.map.values().map(|entry| (&entry.resource, &entry.value))
    }

    /// Empties the map, yielding `(original URI, value)` pairs in
    /// first-insertion order.
    pub fn drain(&mut self) -> impl Iterator<Item = (Url, V)> + '_ {
        self.map
            .drain(..)
            .map(|(_, entry)| (entry.resource, entry.value))
    }

    pub(crate) fn normalizer(&self) -> PathNormalizer {
        self.normalizer
    }

    pub(crate) fn config(&self) -> MapConfig {
        self.config
    }

    fn key_for(&self, resource: &Url) -> Option<String> {
        let key = (self.normalizer)(resource)?;
        if self.is_case_insensitive_path(&key) {
            Some(key.to_lowercase())
        } else {
            Some(key)
        }
    }

    fn is_case_insensitive_path(&self, path: &str) -> bool {
        if is_windows_path(path) {
            return true;
        }
        path.starts_with('/') && self.config.on_case_insensitive_file_system
    }
}
