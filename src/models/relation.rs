//! Relation: a versioned, directed, typed edge between two entity names.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::metadata::Metadata;
use super::temporal::current_timestamp;

/// Default strength assigned to a new relation.
pub const DEFAULT_STRENGTH: f32 = 0.9;
/// Default confidence assigned to a new relation.
pub const DEFAULT_CONFIDENCE: f32 = 0.95;

/// A single version of a directed, typed edge between two entities.
///
/// Relations are addressed by their endpoints' *names*, not their entity
/// ids, because an endpoint's id changes every time it is versioned. A
/// relation is only ever current if both endpoints it points at are
/// themselves current (see the graph store's "no phantom relations"
/// invariant).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    /// Opaque identifier, unique per version.
    pub id: Uuid,
    /// Name of the source entity.
    pub from: String,
    /// Name of the target entity.
    pub to: String,
    /// Free-form relation type tag (e.g. "knows", "depends_on").
    pub relation_type: String,
    /// Relative strength of this relation, in `[0, 1]`.
    pub strength: f32,
    /// Confidence in this relation's correctness, in `[0, 1]`.
    pub confidence: f32,
    /// Optional structured metadata.
    pub metadata: Metadata,
    /// Monotonically increasing version number, starting at 1.
    pub version: u32,
    /// When this edge (by endpoint names and type) was first created.
    pub created_at: i64,
    /// When this particular row was last written.
    pub updated_at: i64,
    /// Start of this version's validity window (inclusive).
    pub valid_from: i64,
    /// End of this version's validity window (exclusive). `None` = current.
    pub valid_to: Option<i64>,
    /// The decay-adjusted confidence, populated only by `get_decayed_graph`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decayed_confidence: Option<f32>,
}

impl Relation {
    /// Creates the first version of a new relation.
    #[must_use]
    pub fn new(from: impl Into<String>, to: impl Into<String>, relation_type: impl Into<String>) -> Self {
        let now = current_timestamp();
        Self {
            id: Uuid::new_v4(),
            from: from.into(),
            to: to.into(),
            relation_type: relation_type.into(),
            strength: DEFAULT_STRENGTH,
            confidence: DEFAULT_CONFIDENCE,
            metadata: Metadata::Null,
            version: 1,
            created_at: now,
            updated_at: now,
            valid_from: now,
            valid_to: None,
            decayed_confidence: None,
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

    /// Builds the next version of this relation, preserving identity fields
    /// and bumping `version`.
    #[must_use]
    pub fn next_version(&self) -> Self {
        let now = current_timestamp();
        Self {
            id: Uuid::new_v4(),
            from: self.from.clone(),
            to: self.to.clone(),
            relation_type: self.relation_type.clone(),
            strength: self.strength,
            confidence: self.confidence,
            metadata: self.metadata.clone(),
            version: self.version + 1,
            created_at: self.created_at,
            updated_at: now,
            valid_from: now,
            valid_to: None,
            decayed_confidence: None,
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

    /// Applies exponential time-decay to `confidence` and returns the
    /// decayed value, never dropping below `min_floor`.
    ///
    /// `age_days` is the age of this relation version in days (from
    /// `valid_from` to the reference instant); `half_life_days` controls
    /// how quickly confidence decays.
    #[must_use]
    pub fn decay_confidence(&self, age_days: f64, half_life_days: f64, min_floor: f32) -> f32 {
        if half_life_days <= 0.0 {
            return self.confidence;
        }
        #[allow(clippy::cast_possible_truncation)]
        let decayed = (f64::from(self.confidence) * 0.5_f64.powf(age_days / half_life_days)) as f32;
        decayed.max(min_floor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_relation_has_defaults() {
        let r = Relation::new("Alice", "Bob", "knows");
        assert_eq!(r.strength, DEFAULT_STRENGTH);
        assert_eq!(r.confidence, DEFAULT_CONFIDENCE);
        assert_eq!(r.version, 1);
        assert!(r.is_current());
    }

    #[test]
    fn next_version_preserves_endpoints_and_bumps_version() {
        let r = Relation::new("Alice", "Bob", "knows");
        let r2 = r.next_version();
        assert_eq!(r2.from, r.from);
        assert_eq!(r2.to, r.to);
        assert_eq!(r2.version, 2);
        assert_ne!(r2.id, r.id);
    }

    #[test]
    fn decay_respects_half_life_and_floor() {
        let mut r = Relation::new("Alice", "Bob", "knows");
        r.confidence = 1.0;
        // One half-life exactly halves confidence.
        let decayed = r.decay_confidence(30.0, 30.0, 0.0);
        assert!((decayed - 0.5).abs() < 0.01);

        // Never drops below the floor.
        let floored = r.decay_confidence(10_000.0, 30.0, 0.1);
        assert!((floored - 0.1).abs() < 1e-6);
    }

    #[test]
    fn is_valid_at_respects_half_open_interval() {
        let mut r = Relation::new("Alice", "Bob", "knows");
        r.valid_from = 100;
        r.valid_to = Some(200);
        assert!(!r.is_valid_at(99));
        assert!(r.is_valid_at(100));
        assert!(r.is_valid_at(199));
        assert!(!r.is_valid_at(200));
    }
}
