//! Server configuration.
//!
//! Settings arrive as JSON in `initializationOptions` and in
//! `workspace/didChangeConfiguration`. Both may either wrap the settings in a `sola` key
//! or send them bare. Every field has a default, so partial payloads are fine.

use crate::features::formatting::FormatOptions;
use serde::Deserialize;
use serde_json::Value;
use sola_analysis::code_lens::CodeLensSettings;
use sola_analysis::completion::CompletionSettings;
use sola_analysis::diagnostics::DiagnosticSettings;
use sola_analysis::inlay_hints::InlayHintSettings;
use sola_analysis::workspace_index::DEFAULT_MAX_FILE_SIZE;
use std::path::PathBuf;
use thiserror::Error;

/// Key under which clients nest the settings.
pub const SETTINGS_SECTION: &str = "sola";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("settings must be a JSON object, got {0}")]
    NotAnObject(&'static str),
    #[error("invalid settings: {0}")]
    Invalid(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SolaConfiguration {
    pub formatting: FormattingConfig,
    pub diagnostics: DiagnosticsConfig,
    pub completion: CompletionConfig,
    pub inlay_hints: InlayHintsConfig,
    pub code_lens: CodeLensConfig,
    pub semantic_highlighting: SemanticHighlightingConfig,
    pub workspace: WorkspaceConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormattingConfig {
    pub enabled: bool,
    pub indent_size: u32,
    pub use_tabs: bool,
    pub max_blank_lines: u32,
}

impl Default for FormattingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            indent_size: 4,
            use_tabs: false,
            max_blank_lines: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiagnosticsConfig {
    pub enabled: bool,
    pub unused_variables: bool,
    pub unused_imports: bool,
    pub type_check: bool,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            unused_variables: true,
            unused_imports: true,
            type_check: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompletionConfig {
    pub keywords: bool,
    pub snippets: bool,
    pub max_items: usize,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            keywords: true,
            snippets: true,
            max_items: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InlayHintsConfig {
    pub enabled: bool,
    pub variable_types: bool,
    pub parameter_names: bool,
    pub foreach_types: bool,
}

impl Default for InlayHintsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            variable_types: true,
            parameter_names: true,
            foreach_types: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CodeLensConfig {
    pub enabled: bool,
    pub tests: bool,
    pub implementations: bool,
}

impl Default for CodeLensConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tests: true,
            implementations: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SemanticHighlightingConfig {
    pub enabled: bool,
}

impl Default for SemanticHighlightingConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkspaceConfig {
    pub max_file_size: u64,
    pub index_on_startup: bool,
    /// Glob patterns excluded from indexing.
    pub exclude: Vec<String>,
    /// Accepted for compatibility; the server does not watch the file system.
    pub watch: bool,
    pub std_lib_path: Option<PathBuf>,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            index_on_startup: true,
            exclude: Vec::new(),
            watch: false,
            std_lib_path: None,
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl SolaConfiguration {
    /// Parses a settings payload. `null` yields the defaults.
    pub fn from_settings(settings: &Value) -> Result<Self, ConfigError> {
        let section = settings.get(SETTINGS_SECTION).unwrap_or(settings);
        match section {
            Value::Null => Ok(Self::default()),
            Value::Object(_) => Ok(Self::deserialize(section)?),
            other => Err(ConfigError::NotAnObject(json_kind(other))),
        }
    }

    pub fn diagnostic_settings(&self) -> DiagnosticSettings {
        DiagnosticSettings {
            type_check: self.diagnostics.type_check,
            unused_variables: self.diagnostics.unused_variables,
            unused_imports: self.diagnostics.unused_imports,
        }
    }

    pub fn completion_settings(&self) -> CompletionSettings {
        CompletionSettings {
            keywords: self.completion.keywords,
            snippets: self.completion.snippets,
            max_items: self.completion.max_items,
        }
    }

    pub fn inlay_hint_settings(&self) -> InlayHintSettings {
        InlayHintSettings {
            variable_types: self.inlay_hints.variable_types,
            parameter_names: self.inlay_hints.parameter_names,
            foreach_types: self.inlay_hints.foreach_types,
        }
    }

    pub fn code_lens_settings(&self) -> CodeLensSettings {
        CodeLensSettings {
            tests: self.code_lens.tests,
            implementations: self.code_lens.implementations,
        }
    }

    /// Formatter options. The editor's tab settings win over the configured ones when it
    /// sends any.
    pub fn format_options(&self, tab_size: u32, insert_spaces: bool) -> FormatOptions {
        let (indent_size, use_tabs) = if tab_size == 0 {
            (self.formatting.indent_size, self.formatting.use_tabs)
        } else {
            (tab_size, !insert_spaces)
        };
        FormatOptions {
            indent_size,
            use_tabs,
            max_blank_lines: self.formatting.max_blank_lines,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_match_documented_values() {
        let config = SolaConfiguration::default();
        assert!(config.formatting.enabled);
        assert_eq!(config.formatting.indent_size, 4);
        assert_eq!(config.formatting.max_blank_lines, 2);
        assert_eq!(config.completion.max_items, 200);
        assert_eq!(config.workspace.max_file_size, 524_288);
        assert!(config.workspace.index_on_startup);
        assert!(!config.workspace.watch);
        assert!(config.workspace.std_lib_path.is_none());
    }

    #[test]
    fn reads_nested_camel_case_settings() {
        let settings = json!({
            "sola": {
                "diagnostics": { "unusedVariables": false },
                "inlayHints": { "parameterNames": false },
                "workspace": { "exclude": ["build/**"], "stdLibPath": "/opt/sola/std" }
            }
        });
        let config = SolaConfiguration::from_settings(&settings).expect("valid settings");
        assert!(!config.diagnostics.unused_variables);
        assert!(config.diagnostics.unused_imports);
        assert!(!config.inlay_hint_settings().parameter_names);
        assert_eq!(config.workspace.exclude, vec!["build/**".to_string()]);
        assert_eq!(config.workspace.std_lib_path, Some(PathBuf::from("/opt/sola/std")));
    }

    #[test]
    fn accepts_bare_settings_and_null() {
        let config = SolaConfiguration::from_settings(&json!({ "codeLens": { "tests": false } }))
            .expect("valid settings");
        assert!(!config.code_lens.tests);
        assert_eq!(
            SolaConfiguration::from_settings(&Value::Null).expect("null"),
            SolaConfiguration::default()
        );
    }

    #[test]
    fn rejects_malformed_payloads() {
        assert!(matches!(
            SolaConfiguration::from_settings(&json!({ "sola": 3 })),
            Err(ConfigError::NotAnObject(_))
        ));
        assert!(matches!(
            SolaConfiguration::from_settings(&json!({ "formatting": { "indentSize": "wide" } })),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn editor_tab_settings_override_configured_indent() {
        let config = SolaConfiguration::default();
        let options = config.format_options(2, true);
        assert_eq!((options.indent_size, options.use_tabs), (2, false));
        let options = config.format_options(0, true);
        assert_eq!((options.indent_size, options.use_tabs), (4, false));
        assert_eq!(options.max_blank_lines, 2);
    }
}
