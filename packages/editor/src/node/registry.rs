use super::behavior::{DomConversion, NodeBehavior};
use super::builtin::{LineBreakBehavior, ParagraphBehavior, RootBehavior, TextBehavior};
use crate::{EditorError, EditorResult};
use std::collections::HashMap;
use std::sync::Arc;

/// Node types known to an editor, keyed by type name.
#[derive(Debug, Clone)]
pub struct NodeRegistry {
    behaviors: HashMap<String, Arc<dyn NodeBehavior>>,
    conversions: HashMap<&'static str, Vec<DomConversion>>,
}

impl NodeRegistry {
    /// An empty registry. Editors always need at least the built-ins.
    pub fn empty() -> Self {
        Self {
            behaviors: HashMap::new(),
            conversions: HashMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        let builtins: [Arc<dyn NodeBehavior>; 4] = [
            Arc::new(RootBehavior),
            Arc::new(ParagraphBehavior),
            Arc::new(TextBehavior),
            Arc::new(LineBreakBehavior),
        ];
        for behavior in builtins {
            // Built-in names are distinct.
            let _ = registry.register(behavior);
        }
        registry
    }

    pub fn register(&mut self, behavior: Arc<dyn NodeBehavior>) -> EditorResult<()> {
        let node_type = behavior.node_type().to_string();
        if self.behaviors.contains_key(&node_type) {
            return Err(EditorError::DuplicateNodeType(node_type));
        }
        for conversion in behavior.import_dom() {
            let slot = self.conversions.entry(conversion.tag).or_default();
            slot.push(conversion);
            slot.sort_by(|a, b| b.priority.cmp(&a.priority));
        }
        self.behaviors.insert(node_type, behavior);
        Ok(())
    }

    pub fn get(&self, node_type: &str) -> EditorResult<&Arc<dyn NodeBehavior>> {
        self.behaviors
            .get(node_type)
            .ok_or_else(|| EditorError::UnregisteredNodeType(node_type.to_string()))
    }

    pub fn contains(&self, node_type: &str) -> bool {
        self.behaviors.contains_key(node_type)
    }

    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.behaviors.keys().map(String::as_str)
    }

    /// Converters claimed for `tag`, highest priority first.
    pub fn conversions_for(&self, tag: &str) -> Vec<DomConversion> {
        self.conversions.get(tag).cloned().unwrap_or_default()
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_registered() {
        let registry = NodeRegistry::with_builtins();
        for node_type in ["root", "paragraph", "text", "linebreak"] {
            assert!(registry.contains(node_type), "{} missing", node_type);
        }
        assert!(!registry.conversions_for("p").is_empty());
        assert!(registry.conversions_for("table").is_empty());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = NodeRegistry::with_builtins();
        let err = registry.register(Arc::new(ParagraphBehavior)).unwrap_err();
        assert_eq!(err, EditorError::DuplicateNodeType("paragraph".to_string()));
    }

    #[test]
    fn test_unknown_type_lookup() {
        let registry = NodeRegistry::with_builtins();
        assert!(matches!(
            registry.get("heading"),
            Err(EditorError::UnregisteredNodeType(_))
        ));
    }
}
