use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use syntaviz_parse::ConllLayout;
use syntaviz_trie::{BuildOptions, BuildStrategy, Window, DEFAULT_DELIMITER};

/// Settings shared by every command. Loaded from `--config` (JSON), then
/// overridden by flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Path delimiter; must not occur in labels.
    pub delimiter: char,
    /// Deepest tree level indexed (root label = 0).
    pub max_depth: Option<usize>,
    /// How decoded records are merged into the trie.
    pub strategy: BuildStrategy,
    /// Worker threads for decoding and sharded builds (rayon default if unset).
    pub threads: Option<usize>,
    /// Column positions for tabular transcripts.
    pub conll_layout: ConllLayout,
    /// Default listing window.
    pub window: Window,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
            max_depth: None,
            strategy: BuildStrategy::default(),
            threads: None,
            conll_layout: ConllLayout::default(),
            window: Window::default(),
        }
    }
}

impl ClusterConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("invalid config {}", path.display()))?;
        tracing::debug!(path = %path.display(), ?config, "loaded config");
        Ok(config)
    }

    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            delimiter: self.delimiter,
            max_depth: self.max_depth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("syntaviz.json");
        fs::write(
            &path,
            r#"{ "delimiter": "/", "strategy": "shard-by-root", "window": { "end": 9 } }"#,
        )
        .unwrap();

        let config = ClusterConfig::load(Some(&path)).unwrap();
        assert_eq!(config.delimiter, '/');
        assert_eq!(config.strategy, BuildStrategy::ShardByRoot);
        assert_eq!(config.window, Window::new(0, 9));
        assert_eq!(config.conll_layout, ConllLayout::default());
        assert_eq!(config.build_options().delimiter, '/');
    }

    #[test]
    fn missing_config_path_is_default() {
        assert_eq!(ClusterConfig::load(None).unwrap(), ClusterConfig::default());
    }

    #[test]
    fn unreadable_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        assert!(ClusterConfig::load(Some(&path)).is_err());
        fs::write(&path, "{ not json").unwrap();
        assert!(ClusterConfig::load(Some(&path)).is_err());
    }
}
