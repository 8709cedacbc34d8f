use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use weft_editor::EditorConfig;

pub const DEFAULT_CONFIG_NAME: &str = "weft.config.json";

/// Weft configuration file format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Tag of the element documents are rendered into
    #[serde(default = "default_root_tag")]
    pub root_tag: String,

    /// Options handed to every editor the CLI builds
    #[serde(default)]
    pub editor: EditorConfig,
}

fn default_root_tag() -> String {
    "div".to_string()
}

impl Config {
    /// Load config from a directory
    pub fn load(cwd: &str) -> anyhow::Result<Self> {
        let config_path = PathBuf::from(cwd).join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            // Return default config if none exists
            Ok(Config::default())
        }
    }

    /// Load an explicitly named config file
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// `explicit` when given, otherwise the config in `cwd`
    pub fn resolve(explicit: Option<&Path>, cwd: &str) -> anyhow::Result<Self> {
        match explicit {
            Some(path) => Self::load_from(path),
            None => Self::load(cwd),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_tag: default_root_tag(),
            editor: EditorConfig::default(),
        }
    }
}
