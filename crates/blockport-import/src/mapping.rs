//! Block mapping tables: source identifier -> target catalog id.

use blockport_common::{BlockportError, Result};
use blockport_logger::{log, LogSeverity::Warning};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Last resort target when nothing else matches.
pub const GENERIC_FALLBACK_ID: &str = "stone";

/// Substring rule applied to the lower-cased plain name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRule {
    pub pattern: String,
    pub target: String,
}

impl CategoryRule {
    pub fn new(pattern: &str, target: &str) -> Self {
        CategoryRule {
            pattern: pattern.to_ascii_lowercase(),
            target: target.to_string(),
        }
    }

    pub fn matches(&self, plain_name: &str) -> bool {
        plain_name.contains(&self.pattern)
    }
}

/// Checked in order; the first match wins, so narrower patterns come first.
const DEFAULT_CATEGORIES: [(&str, &str); 20] = [
    ("leaf", "leaves"),
    ("leaves", "leaves"),
    ("plank", "planks"),
    ("log", "wood"),
    ("wood", "wood"),
    ("stem", "wood"),
    ("water", "water"),
    ("lava", "lava"),
    ("glass", "glass"),
    ("wool", "wool"),
    ("gravel", "gravel"),
    ("sand", "sand"),
    ("ore", "ore"),
    ("grass", "grass"),
    ("dirt", "dirt"),
    ("brick", "brick"),
    ("ice", "ice"),
    ("snow", "snow"),
    ("stone", "stone"),
    ("slate", "stone"),
];

const BUILTIN_ENTRIES: [(&str, &str); 16] = [
    ("minecraft:stone", "stone"),
    ("minecraft:cobblestone", "stone"),
    ("minecraft:deepslate", "stone"),
    ("minecraft:dirt", "dirt"),
    ("minecraft:grass_block", "grass"),
    ("minecraft:sand", "sand"),
    ("minecraft:gravel", "gravel"),
    ("minecraft:oak_log", "wood"),
    ("minecraft:oak_planks", "planks"),
    ("minecraft:oak_leaves", "leaves"),
    ("minecraft:glass", "glass"),
    ("minecraft:water", "water"),
    ("minecraft:lava", "lava"),
    ("minecraft:snow_block", "snow"),
    ("minecraft:ice", "ice"),
    ("minecraft:bricks", "brick"),
];

#[derive(Debug, Clone, PartialEq)]
pub struct BlockMappingTable {
    entries: HashMap<String, String>,
    categories: Vec<CategoryRule>,
    fallback: String,
}

impl Default for BlockMappingTable {
    fn default() -> Self {
        BlockMappingTable::empty()
    }
}

impl BlockMappingTable {
    /// No explicit entries, default categories and the generic fallback.
    pub fn empty() -> Self {
        BlockMappingTable {
            entries: HashMap::new(),
            categories: default_categories(),
            fallback: GENERIC_FALLBACK_ID.to_string(),
        }
    }

    /// Small table used when no mapping document can be loaded.
    pub fn builtin() -> Self {
        let mut table = BlockMappingTable::empty();
        for (source, target) in BUILTIN_ENTRIES {
            table.insert(source, target);
        }
        table
    }

    /// Adds an entry. Empty targets are ignored.
    pub fn insert(&mut self, source: &str, target: &str) {
        let target = target.trim();
        if source.is_empty() || target.is_empty() {
            return;
        }
        self.entries.insert(source.to_string(), target.to_string());
    }

    pub fn get(&self, source: &str) -> Option<&str> {
        self.entries.get(source).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn categories(&self) -> &[CategoryRule] {
        &self.categories
    }

    /// Category target for a lower-cased plain name.
    pub fn category_for(&self, plain_name: &str) -> Option<&str> {
        self.categories
            .iter()
            .find(|rule| rule.matches(plain_name))
            .map(|rule| rule.target.as_str())
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    pub fn set_fallback(&mut self, fallback: &str) {
        let fallback = fallback.trim();
        if !fallback.is_empty() {
            self.fallback = fallback.to_string();
        }
    }

    /// Puts custom rules ahead of the current ones.
    pub fn prepend_categories(&mut self, rules: Vec<CategoryRule>) {
        let mut combined: Vec<CategoryRule> = rules
            .into_iter()
            .filter(|rule| !rule.pattern.is_empty() && !rule.target.trim().is_empty())
            .collect();
        combined.append(&mut self.categories);
        self.categories = combined;
    }
}

fn default_categories() -> Vec<CategoryRule> {
    DEFAULT_CATEGORIES
        .iter()
        .map(|(pattern, target)| CategoryRule::new(pattern, target))
        .collect()
}

/// Accepted shapes of a mapping document.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MappingDocument {
    Structured {
        mappings: HashMap<String, String>,
        #[serde(default)]
        fallback: Option<String>,
        #[serde(default)]
        categories: Vec<(String, String)>,
    },
    Flat(HashMap<String, String>),
}

/// Parses a JSON mapping document.
pub fn parse_mapping(text: &str) -> Result<BlockMappingTable> {
    let document: MappingDocument = serde_json::from_str(text)?;
    let mut table = BlockMappingTable::empty();
    match document {
        MappingDocument::Structured {
            mappings,
            fallback,
            categories,
        } => {
            for (source, target) in &mappings {
                table.insert(source, target);
            }
            if let Some(fallback) = fallback {
                table.set_fallback(&fallback);
            }
            table.prepend_categories(
                categories
                    .iter()
                    .map(|(pattern, target)| CategoryRule::new(pattern, target))
                    .collect(),
            );
        }
        MappingDocument::Flat(mappings) => {
            for (source, target) in &mappings {
                table.insert(source, target);
            }
        }
    }
    Ok(table)
}

pub async fn load_mapping(path: &Path) -> Result<BlockMappingTable> {
    let text = tokio::fs::read_to_string(path).await.map_err(|e| {
        BlockportError::MappingError(format!("cannot read {}: {}", path.display(), e))
    })?;
    parse_mapping(&text)
}

/// Loads a mapping document, or falls back to [`BlockMappingTable::builtin`]
/// on any failure. The warning is returned for the import result.
pub async fn load_mapping_or_default(path: Option<&Path>) -> (BlockMappingTable, Option<String>) {
    let Some(path) = path else {
        return (BlockMappingTable::builtin(), None);
    };
    match load_mapping(path).await {
        Ok(table) => (table, None),
        Err(e) => {
            let warning = format!("Using built-in block mapping: {}", e);
            log(warning.clone(), Warning);
            (BlockMappingTable::builtin(), Some(warning))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_flat_document() {
        let table = parse_mapping(r#"{"minecraft:stone": "rock", "minecraft:dirt": ""}"#).unwrap();
        assert_eq!(table.get("minecraft:stone"), Some("rock"));
        assert_eq!(table.get("minecraft:dirt"), None);
        assert_eq!(table.fallback(), GENERIC_FALLBACK_ID);
    }

    #[test]
    fn test_structured_document() {
        let table = parse_mapping(
            r#"{
                "mappings": {"mod:crystal": "glass"},
                "fallback": "concrete",
                "categories": [["crystal", "gem"]]
            }"#,
        )
        .unwrap();
        assert_eq!(table.get("mod:crystal"), Some("glass"));
        assert_eq!(table.fallback(), "concrete");
        assert_eq!(table.category_for("blue_crystal"), Some("gem"));
        assert_eq!(table.category_for("oak_leaves"), Some("leaves"));
    }

    #[test]
    fn test_invalid_document() {
        assert_matches!(parse_mapping("[1, 2]"), Err(BlockportError::MappingError(_)));
        assert_matches!(parse_mapping("not json"), Err(BlockportError::MappingError(_)));
    }

    #[test]
    fn test_category_order() {
        let table = BlockMappingTable::empty();
        assert_eq!(table.category_for("oak_planks"), Some("planks"));
        assert_eq!(table.category_for("birch_log"), Some("wood"));
        assert_eq!(table.category_for("sandstone"), Some("sand"));
        assert_eq!(table.category_for("deepslate"), Some("stone"));
        assert_eq!(table.category_for("mod_leaf"), Some("leaves"));
        assert_eq!(table.category_for("beacon"), None);
    }

    #[test]
    fn test_missing_document_falls_back() {
        let path = std::env::temp_dir().join("blockport-missing-mapping.json");
        let (table, warning) = tokio_test::block_on(load_mapping_or_default(Some(&path)));
        assert_eq!(table, BlockMappingTable::builtin());
        assert!(warning.is_some());

        let (table, warning) = tokio_test::block_on(load_mapping_or_default(None));
        assert_eq!(table.get("minecraft:stone"), Some("stone"));
        assert!(warning.is_none());
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("blockport-mapping-{}.json", std::process::id()));
        tokio::fs::write(&path, r#"{"minecraft:granite": "stone"}"#).await.unwrap();
        let table = load_mapping(&path).await.unwrap();
        assert_eq!(table.get("minecraft:granite"), Some("stone"));
        tokio::fs::remove_file(&path).await.unwrap();
    }
}
