//! Validation settings consumed from the editor configuration.

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

/// Which buffer kinds are eligible for diagnostics.
///
/// Read from the `javascript.validate.enable` and
/// `typescript.validate.enable` configuration keys; both default to enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidateSettings {
    /// `javascript.validate.enable`
    pub validate_javascript: bool,
    /// `typescript.validate.enable`
    pub validate_typescript: bool,
}

impl Default for ValidateSettings {
    fn default() -> Self {
        Self {
            validate_javascript: true,
            validate_typescript: true,
        }
    }
}

impl ValidateSettings {
    /// Reads the validation flags out of an LSP-style nested settings blob.
    ///
    /// Unknown sections are ignored and missing ones keep their defaults; a
    /// malformed blob logs a warning and falls back to the defaults
    /// entirely.
    #[must_use]
    pub fn from_settings(settings: &Value) -> Self {
        let tree: SettingsTree = match serde_json::from_value(settings.clone()) {
            Ok(tree) => tree,
            Err(err) => {
                warn!("malformed validation settings, using defaults: {err}");
                SettingsTree::default()
            }
        };
        Self {
            validate_javascript: tree.javascript.validate.enable,
            validate_typescript: tree.typescript.validate.enable,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SettingsTree {
    javascript: LanguageSection,
    typescript: LanguageSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LanguageSection {
    validate: ValidateSection,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ValidateSection {
    enable: bool,
}

impl Default for ValidateSection {
    fn default() -> Self {
        Self { enable: true }
    }
}
