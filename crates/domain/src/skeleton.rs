//! Skeleton tree - the branching-narrative reference tree generated once per
//! story.
//!
//! The tree is produced by a streaming generation step, so every node is
//! deserialized leniently: fields default to empty while the raw JSON is
//! still arriving, and a milestone only counts as fully formed once it has
//! an id, a description, and at least one decision point. Lookups go through
//! [`SkeletonIndex`], built once per tree, keyed by decision-point id - the
//! sole source of ordering and uniqueness truth.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

use serde::{Deserialize, Serialize};

use crate::{DomainError, StoryId};

/// Lifecycle of a skeleton. Mutated only by the generation workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkeletonStatus {
    #[default]
    Init,
    Generating,
    Completed,
    Failed,
}

impl SkeletonStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::Generating => "GENERATING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    /// A generation run must not start while another is live or finished.
    pub fn blocks_regeneration(&self) -> bool {
        matches!(self, Self::Generating | Self::Completed)
    }
}

/// One branch choice at a decision point.
///
/// `consequence` is flavor text consumed only by generation prompts; it is
/// never forwarded to the player ahead of the choice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionOption {
    #[serde(default)]
    pub option_id: String,
    #[serde(default)]
    pub option_name: String,
    #[serde(default)]
    pub consequence: String,
}

/// A node where the player must pick one of several options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionPoint {
    #[serde(default)]
    pub decision_point_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub options: Vec<DecisionOption>,
}

/// An ordered narrative beat holding one or more decision points.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    #[serde(default)]
    pub milestone_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub decision_points: Vec<DecisionPoint>,
}

impl Milestone {
    /// Whether this milestone has fully arrived from the generation stream.
    pub fn is_complete(&self) -> bool {
        !self.milestone_id.is_empty()
            && !self.description.is_empty()
            && !self.decision_points.is_empty()
    }
}

/// A possible story ending. Endings are not tied to a decision point;
/// selection is the ending prompt's concern.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ending {
    #[serde(default)]
    pub ending_id: String,
    #[serde(default)]
    pub description: String,
}

/// The parsed skeleton tree: background, milestones in narrative order, and
/// an unordered set of endings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkeletonTree {
    #[serde(rename = "story_background", default)]
    pub background: String,
    #[serde(default)]
    pub milestones: Vec<Milestone>,
    #[serde(default)]
    pub endings: Vec<Ending>,
}

impl SkeletonTree {
    /// Parse a raw JSON tree, tolerating missing fields in partially
    /// streamed snapshots.
    pub fn from_value(value: serde_json::Value) -> Result<Self, DomainError> {
        serde_json::from_value(value)
            .map_err(|e| DomainError::validation(format!("malformed skeleton tree: {e}")))
    }

    /// Count milestones that have fully arrived.
    pub fn complete_milestone_count(&self) -> usize {
        self.milestones.iter().filter(|m| m.is_complete()).count()
    }

    /// Build the lookup index over complete milestones.
    pub fn index(&self) -> SkeletonIndex<'_> {
        SkeletonIndex::new(self)
    }
}

/// Indexed lookups over a [`SkeletonTree`], built once per tree.
///
/// Only complete milestones are indexed, so lookups against a tree that is
/// still being generated simply miss rather than observing half-formed
/// nodes.
pub struct SkeletonIndex<'a> {
    decision_points: BTreeMap<&'a str, (&'a Milestone, &'a DecisionPoint)>,
    options: HashMap<&'a str, &'a DecisionOption>,
    first: Option<&'a str>,
}

impl<'a> SkeletonIndex<'a> {
    fn new(tree: &'a SkeletonTree) -> Self {
        let mut decision_points = BTreeMap::new();
        let mut options = HashMap::new();
        let mut first = None;

        for milestone in tree.milestones.iter().filter(|m| m.is_complete()) {
            for point in &milestone.decision_points {
                if point.decision_point_id.is_empty() {
                    continue;
                }
                if first.is_none() {
                    first = Some(point.decision_point_id.as_str());
                }
                decision_points.insert(point.decision_point_id.as_str(), (milestone, point));
                for option in &point.options {
                    if !option.option_id.is_empty() {
                        options.insert(option.option_id.as_str(), option);
                    }
                }
            }
        }

        Self {
            decision_points,
            options,
            first,
        }
    }

    /// Exact lookup of a decision point by id.
    pub fn decision_point(&self, id: &str) -> Result<&'a DecisionPoint, DomainError> {
        self.decision_points
            .get(id)
            .map(|(_, point)| *point)
            .ok_or_else(|| DomainError::not_found("DecisionPoint", id))
    }

    /// Exact lookup of a decision point together with its owning milestone.
    pub fn milestone_and_point(
        &self,
        id: &str,
    ) -> Result<(&'a Milestone, &'a DecisionPoint), DomainError> {
        self.decision_points
            .get(id)
            .copied()
            .ok_or_else(|| DomainError::not_found("DecisionPoint", id))
    }

    /// Exact lookup of a decision option by id.
    pub fn option(&self, id: &str) -> Result<&'a DecisionOption, DomainError> {
        self.options
            .get(id)
            .copied()
            .ok_or_else(|| DomainError::not_found("DecisionOption", id))
    }

    /// The first decision point in skeleton order, where a fresh story
    /// starts.
    pub fn first_decision_point(&self) -> Option<&'a str> {
        self.first
    }

    /// The lexicographic successor of `id`, or `None` when the story has
    /// walked past the last decision point and the ending is due.
    pub fn next_after(&self, id: &str) -> Option<&'a str> {
        self.decision_points
            .range::<str, _>((Bound::Excluded(id), Bound::Unbounded))
            .next()
            .map(|(key, _)| *key)
    }
}

/// The skeleton entity owned by a story: the tree plus its generation
/// status. At most one per story.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Skeleton {
    pub story_id: StoryId,
    pub tree: SkeletonTree,
    pub status: SkeletonStatus,
}

impl Skeleton {
    pub fn new(story_id: StoryId) -> Self {
        Self {
            story_id,
            tree: SkeletonTree::default(),
            status: SkeletonStatus::Init,
        }
    }

    pub fn has_milestones(&self) -> bool {
        self.tree.complete_milestone_count() > 0
    }
}
