//! Command names and request argument shapes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Commands the bridge issues to the TS server.
///
/// The wire names are protocol-fixed; [`Command::name`] yields the exact
/// string the server dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Register one open file (non-batching servers only).
    Open,
    /// Unregister one open file (non-batching servers only).
    Close,
    /// Apply one in-place edit (non-batching servers only).
    Change,
    /// Batched open/close/change for any number of files.
    UpdateOpen,
    /// Request diagnostics for an explicit file list.
    Geterr,
    /// Request diagnostics for the whole project containing a file.
    GeterrForProject,
}

impl Command {
    /// The wire name of the command.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Command::Open => "open",
            Command::Close => "close",
            Command::Change => "change",
            Command::UpdateOpen => "updateOpen",
            Command::Geterr => "geterr",
            Command::GeterrForProject => "geterrForProject",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Script kind hints understood by the server's `open` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScriptKindName {
    /// Plain TypeScript.
    #[serde(rename = "TS")]
    Ts,
    /// TypeScript with JSX.
    #[serde(rename = "TSX")]
    Tsx,
    /// Plain JavaScript.
    #[serde(rename = "JS")]
    Js,
    /// JavaScript with JSX.
    #[serde(rename = "JSX")]
    Jsx,
}

/// A 1-based line/column position on the TS server protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// 1-based line.
    pub line: u32,
    /// 1-based column.
    pub offset: u32,
}

/// One in-place text replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeEdit {
    /// Start of the replaced span.
    pub start: Location,
    /// End of the replaced span (exclusive).
    pub end: Location,
    /// Replacement text.
    pub new_text: String,
}

/// Edits to a single file inside an `updateOpen` batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileCodeEdits {
    /// Server file id the edits apply to.
    pub file_name: String,
    /// Edits ordered so that applying them front to back never invalidates
    /// a later position (end of document first).
    pub text_changes: Vec<CodeEdit>,
}

/// Arguments for `open` and for the `openFiles` entries of `updateOpen`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenRequestArgs {
    /// Server file id.
    pub file: String,
    /// Full buffer content at open time.
    pub file_content: String,
    /// Workspace root the file belongs to, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_root_path: Option<String>,
    /// Script kind hint; omitted when the language id maps to none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_kind_name: Option<ScriptKindName>,
}

/// Arguments for `close`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseRequestArgs {
    /// Server file id.
    pub file: String,
}

/// Arguments for a single legacy `change` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRequestArgs {
    /// Server file id.
    pub file: String,
    /// 1-based start line.
    pub line: u32,
    /// 1-based start column.
    pub offset: u32,
    /// 1-based end line.
    pub end_line: u32,
    /// 1-based end column.
    pub end_offset: u32,
    /// Replacement text.
    pub insert_string: String,
}

/// Arguments for the batched `updateOpen` request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOpenRequestArgs {
    /// Files with pending edits.
    pub changed_files: Vec<FileCodeEdits>,
    /// Server file ids to close.
    pub closed_files: Vec<String>,
    /// Files to open.
    pub open_files: Vec<OpenRequestArgs>,
}

/// Arguments for `geterr`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeterrRequestArgs {
    /// Server-side debounce in milliseconds; the bridge debounces itself and
    /// always sends zero.
    pub delay: u32,
    /// Server file ids, oldest request first.
    pub files: Vec<String>,
}

/// Arguments for `geterrForProject`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeterrForProjectRequestArgs {
    /// Server-side debounce in milliseconds; always zero, as for `geterr`.
    pub delay: u32,
    /// Any file inside the project; the server widens to the whole project.
    pub file: String,
}

#[cfg(test)]
mod tests {
    use expect_test::expect;

    use super::*;

    #[test]
    fn command_names_are_wire_exact() {
        assert_eq!(Command::UpdateOpen.name(), "updateOpen");
        assert_eq!(Command::GeterrForProject.name(), "geterrForProject");
        assert_eq!(Command::Geterr.to_string(), "geterr");
    }

    #[test]
    fn update_open_serializes_protocol_shape() {
        let args = UpdateOpenRequestArgs {
            changed_files: vec![FileCodeEdits {
                file_name: "/src/index.ts".into(),
                text_changes: vec![CodeEdit {
                    start: Location { line: 5, offset: 1 },
                    end: Location { line: 5, offset: 2 },
                    new_text: "x".into(),
                }],
            }],
            closed_files: vec!["/src/old.ts".into()],
            open_files: vec![OpenRequestArgs {
                file: "/src/new.ts".into(),
                file_content: "export {};\n".into(),
                project_root_path: Some("/src".into()),
                script_kind_name: Some(ScriptKindName::Ts),
            }],
        };
        let json = serde_json::to_string_pretty(&args).expect("serialize updateOpen args");
        expect![[r#"
            {
              "changedFiles": [
                {
                  "fileName": "/src/index.ts",
                  "textChanges": [
                    {
                      "start": {
                        "line": 5,
                        "offset": 1
                      },
                      "end": {
                        "line": 5,
                        "offset": 2
                      },
                      "newText": "x"
                    }
                  ]
                }
              ],
              "closedFiles": [
                "/src/old.ts"
              ],
              "openFiles": [
                {
                  "file": "/src/new.ts",
                  "fileContent": "export {};\n",
                  "projectRootPath": "/src",
                  "scriptKindName": "TS"
                }
              ]
            }"#]]
        .assert_eq(&json);
    }

    #[test]
    fn open_args_omit_unknown_optionals() {
        let args = OpenRequestArgs {
            file: "/src/a.mts".into(),
            file_content: String::new(),
            project_root_path: None,
            script_kind_name: None,
        };
        let json = serde_json::to_string(&args).expect("serialize open args");
        assert_eq!(json, r#"{"file":"/src/a.mts","fileContent":""}"#);
    }

    #[test]
    fn geterr_args_keep_file_order() {
        let args = GeterrRequestArgs {
            delay: 0,
            files: vec!["/a.ts".into(), "/c.ts".into(), "/b.ts".into()],
        };
        let json = serde_json::to_string(&args).expect("serialize geterr args");
        assert_eq!(json, r#"{"delay":0,"files":["/a.ts","/c.ts","/b.ts"]}"#);
    }
}
