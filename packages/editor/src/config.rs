//! Editor configuration.

use crate::node::TextFormat;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_TRANSFORM_ITERATION_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorConfig {
    /// Distinguishes editors that share a document or clipboard.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default)]
    pub theme: Theme,

    #[serde(default = "default_editable")]
    pub editable: bool,

    /// Passes of the transform loop allowed before an update fails.
    #[serde(default = "default_transform_iteration_limit")]
    pub transform_iteration_limit: usize,
}

fn default_namespace() -> String {
    "weft".to_string()
}

fn default_editable() -> bool {
    true
}

fn default_transform_iteration_limit() -> usize {
    DEFAULT_TRANSFORM_ITERATION_LIMIT
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            theme: Theme::default(),
            editable: default_editable(),
            transform_iteration_limit: default_transform_iteration_limit(),
        }
    }
}

/// CSS class names keyed by node type, or `text.<format>` for text formats.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Theme {
    classes: BTreeMap<String, String>,
}

impl Theme {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_class(mut self, key: impl Into<String>, class: impl Into<String>) -> Self {
        self.classes.insert(key.into(), class.into());
        self
    }

    pub fn class_for(&self, key: &str) -> Option<&str> {
        self.classes.get(key).map(String::as_str)
    }

    /// Space-joined classes for every set flag that has a theme entry.
    pub fn text_format_classes(&self, format: TextFormat) -> Option<String> {
        let classes: Vec<&str> = format
            .names()
            .into_iter()
            .filter_map(|name| self.class_for(&format!("text.{}", name)))
            .collect();
        if classes.is_empty() {
            None
        } else {
            Some(classes.join(" "))
        }
    }
}
