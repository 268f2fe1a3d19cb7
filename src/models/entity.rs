//! Entity: a versioned node in the knowledge graph.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::temporal::current_timestamp;

/// A single version of a named node in the graph.
///
/// Entities are never mutated in place: every change to `observations`
/// produces a new row with an incremented `version`, while the old row is
/// archived by setting `valid_to`. Only one row per `name` may have
/// `valid_to == None` at a time (the "current" version).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Opaque identifier, unique per version (not per name).
    pub id: Uuid,
    /// The entity's name. Unique among currently-valid entities.
    pub name: String,
    /// A free-form type tag (e.g. "person", "concept", "file").
    pub entity_type: String,
    /// Ordered, deduplicated textual observations about this entity.
    pub observations: Vec<String>,
    /// The embedding vector for this version, if one has been computed.
    pub vector: Option<Vec<f32>>,
    /// The embedding model used to produce `vector`.
    pub embedding_model: Option<String>,
    /// When the embedding was last refreshed.
    pub embedding_updated_at: Option<i64>,
    /// Monotonically increasing version number, starting at 1.
    pub version: u32,
    /// When this name was first created (copied across versions).
    pub created_at: i64,
    /// When this particular row was last written.
    pub updated_at: i64,
    /// Start of this version's validity window (inclusive).
    pub valid_from: i64,
    /// End of this version's validity window (exclusive). `None` = current.
    pub valid_to: Option<i64>,
}

impl Entity {
    /// Creates the first version of a new entity.
    #[must_use]
    pub fn new(name: impl Into<String>, entity_type: impl Into<String>, observations: Vec<String>) -> Self {
        let now = current_timestamp();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            entity_type: entity_type.into(),
            observations: dedup_preserve_order(observations),
            vector: None,
            embedding_model: None,
            embedding_updated_at: None,
            version: 1,
            created_at: now,
            updated_at: now,
            valid_from: now,
            valid_to: None,
        }
    }

    /// Returns `true` if this row is the currently-valid version.
    #[must_use]
    pub const fn is_current(&self) -> bool {
        self.valid_to.is_none()
    }

    /// Returns `true` if this row was valid at the given timestamp.
    #[must_use]
    pub const fn is_valid_at(&self, timestamp: i64) -> bool {
        let after_start = timestamp >= self.valid_from;
        let before_end = match self.valid_to {
            Some(end) => timestamp < end,
            None => true,
        };
        after_start && before_end
    }

    /// Builds the next version of this entity with the given observations,
    /// leaving `self` untouched (the caller is responsible for archiving it).
    #[must_use]
    pub fn next_version(&self, observations: Vec<String>) -> Self {
        let now = current_timestamp();
        Self {
            id: Uuid::new_v4(),
            name: self.name.clone(),
            entity_type: self.entity_type.clone(),
            observations: dedup_preserve_order(observations),
            vector: None,
            embedding_model: None,
            embedding_updated_at: None,
            version: self.version + 1,
            created_at: self.created_at,
            updated_at: now,
            valid_from: now,
            valid_to: None,
        }
    }

    /// Returns a copy of this row with `valid_to` set to `at`.
    #[must_use]
    pub fn archived_at(&self, at: i64) -> Self {
        let mut archived = self.clone();
        archived.valid_to = Some(at);
        archived.updated_at = at;
        archived
    }

    /// Computes the canonical text used as the embedding-cache key and as
    /// the input to the embedding provider.
    #[must_use]
    pub fn canonical_text(&self) -> String {
        let mut text = format!("Name: {}\nType: {}\nObservations:\n", self.name, self.entity_type);
        for obs in &self.observations {
            text.push_str("- ");
            text.push_str(obs);
            text.push('\n');
        }
        text
    }
}

/// Merges `existing` and `additions`, preserving `existing`'s order and
/// appending novel items from `additions` in their given order.
#[must_use]
pub fn merge_observations(existing: &[String], additions: &[String]) -> Vec<String> {
    let mut merged = existing.to_vec();
    for item in additions {
        if !merged.contains(item) {
            merged.push(item.clone());
        }
    }
    merged
}

/// Removes the given observations from `existing`, preserving order.
#[must_use]
pub fn remove_observations(existing: &[String], removals: &[String]) -> Vec<String> {
    existing
        .iter()
        .filter(|o| !removals.contains(o))
        .cloned()
        .collect()
}

fn dedup_preserve_order(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items.into_iter().filter(|i| seen.insert(i.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_entity_is_version_one_and_current() {
        let e = Entity::new("Alice", "person", vec!["likes tea".to_string()]);
        assert_eq!(e.version, 1);
        assert!(e.is_current());
    }

    #[test]
    fn next_version_increments_and_is_current() {
        let e = Entity::new("Alice", "person", vec!["a".to_string()]);
        let v2 = e.next_version(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(v2.version, 2);
        assert_ne!(v2.id, e.id);
        assert_eq!(v2.created_at, e.created_at);
        assert!(v2.is_current());
    }

    #[test]
    fn merge_observations_appends_novel_in_order() {
        let existing = vec!["a".to_string(), "b".to_string()];
        let additions = vec!["b".to_string(), "c".to_string(), "d".to_string()];
        assert_eq!(
            merge_observations(&existing, &additions),
            vec!["a", "b", "c", "d"]
        );
    }

    #[test]
    fn remove_observations_preserves_order() {
        let existing = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let removals = vec!["b".to_string()];
        assert_eq!(remove_observations(&existing, &removals), vec!["a", "c"]);
    }

    #[test]
    fn is_valid_at_respects_half_open_interval() {
        let mut e = Entity::new("Alice", "person", vec![]);
        e.valid_from = 100;
        e.valid_to = Some(200);
        assert!(!e.is_valid_at(99));
        assert!(e.is_valid_at(100));
        assert!(e.is_valid_at(199));
        assert!(!e.is_valid_at(200));
    }
}
