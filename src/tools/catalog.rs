//! Immutable tool catalog snapshots
//!
//! A catalog is what the reasoner sees for one request: names, descriptions
//! and parameter schemas, passed as data.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Description of one registered tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Snapshot of the registry taken for a single request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCatalog {
    specs: Vec<ToolSpec>,
}

impl ToolCatalog {
    /// Build from specs; kept sorted by name so rendering is stable
    pub fn new(mut specs: Vec<ToolSpec>) -> Self {
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        Self { specs }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.specs.iter().map(|s| s.name.clone()).collect()
    }

    pub fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(name: &str) -> ToolSpec {
        ToolSpec {
            name: name.to_string(),
            description: format!("{} tool", name),
            parameters: json!({"type": "object"}),
        }
    }

    #[test]
    fn test_catalog_sorted_by_name() {
        let catalog = ToolCatalog::new(vec![spec("zeta"), spec("alpha"), spec("mid")]);
        assert_eq!(catalog.names(), vec!["alpha", "mid", "zeta"]);
        assert_eq!(catalog.len(), 3);
    }

    #[test]
    fn test_catalog_lookup() {
        let catalog = ToolCatalog::new(vec![spec("echo")]);
        assert!(catalog.contains("echo"));
        assert!(!catalog.contains("missing"));
        assert_eq!(catalog.get("echo").unwrap().description, "echo tool");
    }

    #[test]
    fn test_empty_catalog() {
        let catalog = ToolCatalog::default();
        assert!(catalog.is_empty());
        assert!(catalog.names().is_empty());
    }
}
