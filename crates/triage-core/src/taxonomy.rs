//! Work-colour taxonomy: the fixed, ordered set of categories a backlog item
//! can be assigned to.
//!
//! Each category carries a canonical description that is embedded as its
//! prototype. Order matters: it is the tie-break order used by the
//! classifier, so it is preserved exactly as constructed.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Visible, positive business value.
pub const GREEN: &str = "green";
/// Visible, user-impacting problem being fixed.
pub const RED: &str = "red";
/// Internal quality, architecture, maintainability.
pub const YELLOW: &str = "yellow";
/// Invisible, negative work: technical debt.
pub const BLACK: &str = "black";

const GREEN_TEXT: &str = "Work that delivers visible and positive business value. \
This includes user-facing features, APIs, CLI commands, or functional capabilities requested by external stakeholders. \
Also includes backend functionality changes that introduce new behavior, such as upgrading default components or implementing new workflows.\
Examples: new features, extended functionality, enhancements visible to users or integrators.";

const RED_TEXT: &str = "Work that resolves a visible and user-impacting problem in the system. \
Examples: broken behavior, crashes, misbehaving components, runtime errors, or regressions. \
This - Usually involves fixing production code or patching functionality.\
Usually involves fixing broken behavior that exists in production code.\
Does NOT include writing new tests for known cases or improving test coverage.\
Does NOT include documentation tasks or tickets that describe an issue to be explained rather than fixed.";

const YELLOW_TEXT: &str = "Work that improves the internal quality, architecture, or maintainability of the system. \
This includes performance enhancements, scalability efforts, refactors, internal tools, or writing documentation \
that clarifies complex logic, setup, or developer workflows. \
Even if it refers to a known issue, the goal is to explain, structure, or improve \u{2014} not patch.\
Includes adding integration tests, improving test reliability, tuning configurations, and restructuring internal logic.";

const BLACK_TEXT: &str = "Invisible and negative work caused by shortcuts or past decisions. \
Examples: technical debt, missing tests, deprecated APIs, unstable components, or quick fixes without long-term support. \
This type of work often becomes visible later due to its impact on stability or maintainability.\
Includes writing missing tests for important components or failure cases that were previously untested.";

#[derive(Debug, Error)]
pub enum TaxonomyError {
    #[error("taxonomy needs at least 2 categories, got {0}")]
    TooFew(usize),

    #[error("duplicate category id: {0}")]
    DuplicateId(String),

    #[error("category id must not be empty")]
    EmptyId,

    #[error("category {0} has an empty prototype text")]
    EmptyPrototype(String),

    #[error("failed to read taxonomy file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse taxonomy JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// One category: a stable id and the natural-language description embedded
/// as its prototype.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Category {
    pub id: String,
    pub prototype_text: String,
}

impl Category {
    pub fn new(id: impl Into<String>, prototype_text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            prototype_text: prototype_text.into(),
        }
    }
}

/// Validated, immutable, ordered set of categories.
#[derive(Debug, Clone)]
pub struct Taxonomy {
    categories: Vec<Category>,
}

impl Taxonomy {
    /// Validate and freeze a list of categories.
    ///
    /// Rejects fewer than two categories, empty or duplicate ids, and blank
    /// prototype texts.
    pub fn new(categories: Vec<Category>) -> Result<Self, TaxonomyError> {
        if categories.len() < 2 {
            return Err(TaxonomyError::TooFew(categories.len()));
        }

        let mut seen: HashSet<&str> = HashSet::with_capacity(categories.len());
        for category in &categories {
            if category.id.is_empty() {
                return Err(TaxonomyError::EmptyId);
            }
            if category.prototype_text.trim().is_empty() {
                return Err(TaxonomyError::EmptyPrototype(category.id.clone()));
            }
            if !seen.insert(category.id.as_str()) {
                return Err(TaxonomyError::DuplicateId(category.id.clone()));
            }
        }
        drop(seen);

        Ok(Self { categories })
    }

    /// The built-in four-colour taxonomy: green, red, yellow, black.
    pub fn work_colors() -> Self {
        Self {
            categories: vec![
                Category::new(GREEN, GREEN_TEXT),
                Category::new(RED, RED_TEXT),
                Category::new(YELLOW, YELLOW_TEXT),
                Category::new(BLACK, BLACK_TEXT),
            ],
        }
    }

    /// Parse a JSON array of `{"id": ..., "prototype_text": ...}` objects.
    pub fn from_json_str(json: &str) -> Result<Self, TaxonomyError> {
        let categories: Vec<Category> = serde_json::from_str(json)?;
        Self::new(categories)
    }

    /// Load a taxonomy from a JSON file (see [`from_json_str`](Self::from_json_str)).
    pub fn from_json_file(path: &Path) -> Result<Self, TaxonomyError> {
        let json = std::fs::read_to_string(path)?;
        let taxonomy = Self::from_json_str(&json)?;
        debug!(path = %path.display(), count = taxonomy.len(), "loaded taxonomy");
        Ok(taxonomy)
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        self.categories.iter()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    /// Always false for a validated taxonomy; present for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Position of a category in iteration (tie-break) order.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.categories.iter().position(|c| c.id == id)
    }

    /// Category ids in iteration order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn work_colors_order_and_validity() {
        let tax = Taxonomy::work_colors();
        let ids: Vec<&str> = tax.ids().collect();
        assert_eq!(ids, vec![GREEN, RED, YELLOW, BLACK]);

        // The built-in set must pass its own validation.
        let revalidated = Taxonomy::new(tax.categories().to_vec()).unwrap();
        assert_eq!(revalidated.len(), 4);
    }

    #[test]
    fn rejects_duplicate_ids() {
        let result = Taxonomy::new(vec![
            Category::new("a", "fix a crash"),
            Category::new("a", "add a new feature"),
        ]);
        assert!(matches!(result, Err(TaxonomyError::DuplicateId(id)) if id == "a"));
    }

    #[test]
    fn rejects_blank_prototype() {
        let result = Taxonomy::new(vec![
            Category::new("a", "fix a crash"),
            Category::new("b", "   "),
        ]);
        assert!(matches!(result, Err(TaxonomyError::EmptyPrototype(id)) if id == "b"));
    }

    #[test]
    fn rejects_single_category() {
        let result = Taxonomy::new(vec![Category::new("a", "fix a crash")]);
        assert!(matches!(result, Err(TaxonomyError::TooFew(1))));
    }

    #[test]
    fn rejects_empty_id() {
        let result = Taxonomy::new(vec![
            Category::new("", "fix a crash"),
            Category::new("b", "add a new feature"),
        ]);
        assert!(matches!(result, Err(TaxonomyError::EmptyId)));
    }

    #[test]
    fn lookup_and_position() {
        let tax = Taxonomy::work_colors();
        assert!(tax.contains(YELLOW));
        assert!(!tax.contains("purple"));
        assert_eq!(tax.position(BLACK), Some(3));
        assert!(tax.get(RED).unwrap().prototype_text.contains("crashes"));
    }

    #[test]
    fn from_json_keeps_order() {
        let json = r#"[
            {"id": "B", "prototype_text": "add a new feature"},
            {"id": "A", "prototype_text": "fix a crash"}
        ]"#;
        let tax = Taxonomy::from_json_str(json).unwrap();
        let ids: Vec<&str> = tax.ids().collect();
        assert_eq!(ids, vec!["B", "A"]);
    }

    #[test]
    fn from_json_validates() {
        let json = r#"[{"id": "A", "prototype_text": "fix a crash"}]"#;
        assert!(matches!(
            Taxonomy::from_json_str(json),
            Err(TaxonomyError::TooFew(1))
        ));
        assert!(matches!(
            Taxonomy::from_json_str("not json"),
            Err(TaxonomyError::Json(_))
        ));
    }

    #[test]
    fn from_json_file_round_trip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("taxonomy.json");
        std::fs::write(
            &path,
            r#"[{"id": "A", "prototype_text": "fix a crash"},
                {"id": "B", "prototype_text": "add a new feature"}]"#,
        )
        .unwrap();

        let tax = Taxonomy::from_json_file(&path).unwrap();
        assert_eq!(tax.len(), 2);
        assert!(matches!(
            Taxonomy::from_json_file(&tmp.path().join("missing.json")),
            Err(TaxonomyError::Io(_))
        ));
    }
}
