use serde::{Deserialize, Serialize};
use std::path::Path;
use crate::critical::{DEFAULT_LINE_WINDOW, DEFAULT_MAX_SELECTORS, DEFAULT_SEED_SELECTORS};
use crate::errors::{PrunerError, Result};
use crate::segmenter::CommentMode;

/// Pruner configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PrunerConfig {
    /// Selectors always kept. `/regex/` entries are patterns.
    pub safelist: Vec<String>,

    /// Selectors always removed, even when used or safelisted
    pub blocklist: Vec<String>,

    /// Keep rules that define or use custom properties
    pub preserve_variables: bool,

    /// Keep `@keyframes`
    pub preserve_keyframes: bool,

    /// Keep `@font-face`
    pub preserve_font_face: bool,

    /// Keep `:hover`, `:focus`, `::before` and similar rules
    pub preserve_interactive_states: bool,

    /// Keep `@media` blocks whole
    pub preserve_media_queries: bool,

    /// Keep `:root` rules
    pub preserve_root: bool,

    /// Selectors that are always critical
    pub critical_seed_selectors: Vec<String>,

    /// Lines after `<body>` scanned for critical elements
    pub critical_line_window: usize,

    /// Hard cap on the critical allow-list
    pub critical_max_selectors: usize,

    pub comments: CommentMode,

    /// Merge duplicate `@media` blocks after filtering
    pub combine_media_queries: bool,
}

impl Default for PrunerConfig {
    fn default() -> Self {
        Self {
            safelist: Vec::new(),
            blocklist: Vec::new(),
            preserve_variables: true,
            preserve_keyframes: true,
            preserve_font_face: true,
            preserve_interactive_states: true,
            preserve_media_queries: true,
            preserve_root: true,
            critical_seed_selectors: DEFAULT_SEED_SELECTORS.iter().map(|s| s.to_string()).collect(),
            critical_line_window: DEFAULT_LINE_WINDOW,
            critical_max_selectors: DEFAULT_MAX_SELECTORS,
            comments: CommentMode::default(),
            combine_media_queries: false,
        }
    }
}

impl PrunerConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PrunerError::ConfigError {
                message: format!("Failed to read config file {}: {}", path.display(), e),
            })?;

        serde_yaml::from_str(&content)
            .map_err(|e| PrunerError::ConfigError {
                message: format!("Failed to parse YAML config: {}", e),
            })
    }

    /// Load configuration from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PrunerError::ConfigError {
                message: format!("Failed to read config file {}: {}", path.display(), e),
            })?;

        serde_json::from_str(&content)
            .map_err(|e| PrunerError::ConfigError {
                message: format!("Failed to parse JSON config: {}", e),
            })
    }

    /// Load configuration from a file (auto-detect format)
    pub fn from_file(path: &Path) -> Result<Self> {
        match path.extension().and_then(|s| s.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(PrunerError::ConfigError {
                message: format!(
                    "Unsupported config file format: {}. Use .yaml, .yml, or .json",
                    path.display()
                ),
            }),
        }
    }

    /// Merge with another configuration.
    ///
    /// Lists are unioned; toggles and limits come from `other`.
    pub fn merge(mut self, other: Self) -> Self {
        union_into(&mut self.safelist, other.safelist);
        union_into(&mut self.blocklist, other.blocklist);
        union_into(&mut self.critical_seed_selectors, other.critical_seed_selectors);

        self.preserve_variables = other.preserve_variables;
        self.preserve_keyframes = other.preserve_keyframes;
        self.preserve_font_face = other.preserve_font_face;
        self.preserve_interactive_states = other.preserve_interactive_states;
        self.preserve_media_queries = other.preserve_media_queries;
        self.preserve_root = other.preserve_root;
        self.critical_line_window = other.critical_line_window;
        self.critical_max_selectors = other.critical_max_selectors;
        self.comments = other.comments;
        self.combine_media_queries = other.combine_media_queries;

        self
    }
}

fn union_into(target: &mut Vec<String>, entries: Vec<String>) {
    for entry in entries {
        if !target.contains(&entry) {
            target.push(entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = PrunerConfig::default();
        assert!(config.safelist.is_empty());
        assert!(config.preserve_variables && config.preserve_root);
        assert!(!config.combine_media_queries);
        assert_eq!(config.critical_seed_selectors.len(), 12);
        assert_eq!(config.critical_line_window, 50);
        assert_eq!(config.comments, CommentMode::Preserve);
    }

    #[test]
    fn test_yaml_config_loading() {
        let yaml_content = r##"
safelist:
  - "modal-open"
  - "/^\\.js-/"
preserveKeyframes: false
comments: strip
criticalSeedSelectors:
  - "html"
"##;

        let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
        file.write_all(yaml_content.as_bytes()).unwrap();

        let config = PrunerConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.safelist, vec!["modal-open", "/^\\.js-/"]);
        assert!(!config.preserve_keyframes);
        assert!(config.preserve_font_face);
        assert_eq!(config.comments, CommentMode::Strip);
        assert_eq!(config.critical_seed_selectors, vec!["html"]);
    }

    #[test]
    fn test_json_config_loading() {
        let json_content = r##"{
  "blocklist": ["legacy"],
  "combineMediaQueries": true,
  "criticalMaxSelectors": 20
}"##;

        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        file.write_all(json_content.as_bytes()).unwrap();

        let config = PrunerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.blocklist, vec!["legacy"]);
        assert!(config.combine_media_queries);
        assert_eq!(config.critical_max_selectors, 20);
        assert!(config.preserve_variables);
    }

    #[test]
    fn test_unsupported_extension() {
        let file = NamedTempFile::with_suffix(".toml").unwrap();
        let err = PrunerConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, PrunerError::ConfigError { .. }));
    }

    #[test]
    fn test_config_merge() {
        let base = PrunerConfig {
            safelist: vec!["a".to_string()],
            ..PrunerConfig::default()
        };
        let other = PrunerConfig {
            safelist: vec!["a".to_string(), "b".to_string()],
            preserve_root: false,
            ..PrunerConfig::default()
        };

        let merged = base.merge(other);
        assert_eq!(merged.safelist, vec!["a", "b"]);
        assert!(!merged.preserve_root);
        assert_eq!(merged.critical_seed_selectors.len(), 12);
    }
}
