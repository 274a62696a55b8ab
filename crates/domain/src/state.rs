//! Narrative state - the ephemeral per-turn view of a story, folded from
//! its persisted progress entries, plus the continue-or-end transition.

use serde::{Deserialize, Serialize};

use crate::{CefrLevel, ProgressEntry, SkeletonTree};

/// The next generation step for a story. Constructed by
/// [`NarrativeState::next_step`]; there are exactly two live steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoryStep {
    /// Continue the story toward `decision_point_id`.
    Delta { decision_point_id: String },
    /// No decision point remains; generate the ending.
    Ending,
}

/// Ephemeral state derived once per turn. Not persisted - the progress
/// entries are the source of truth, and this fold is how they are read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrativeState {
    /// The decision point the next segment should conclude at. `None` means
    /// the story has walked past the last decision point and the ending is
    /// due.
    pub current_decision_point: Option<String>,
    /// Prior segment texts in creation order.
    pub story_progress: Vec<String>,
    /// Chosen option ids in creation order.
    pub chosen_decisions: Vec<String>,
    pub cefr_level: CefrLevel,
}

impl NarrativeState {
    /// Fold progress entries into the current state.
    ///
    /// The current decision point is the first point in skeleton order for
    /// a fresh story, the last entry's point while it is unfulfilled, and
    /// otherwise the lexicographic successor of the last visited point.
    pub fn derive(tree: &SkeletonTree, entries: &[ProgressEntry], cefr_level: CefrLevel) -> Self {
        let index = tree.index();

        let current_decision_point = match entries.last() {
            None => index.first_decision_point().map(str::to_string),
            Some(last) if last.decision_point_id.is_empty() => None,
            Some(last) if !last.is_fulfilled() => Some(last.decision_point_id.clone()),
            Some(last) => index.next_after(&last.decision_point_id).map(str::to_string),
        };

        Self {
            current_decision_point,
            story_progress: entries.iter().map(|e| e.content.clone()).collect(),
            chosen_decisions: entries
                .iter()
                .filter(|e| e.is_fulfilled())
                .map(|e| e.chosen_option_id.clone())
                .collect(),
            cefr_level,
        }
    }

    /// Decide whether to continue the story or generate an ending.
    pub fn next_step(&self) -> StoryStep {
        match &self.current_decision_point {
            Some(id) => StoryStep::Delta {
                decision_point_id: id.clone(),
            },
            None => StoryStep::Ending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{OfferedOption, StoryId};
    use chrono::Utc;
    use serde_json::json;

    fn tree() -> SkeletonTree {
        SkeletonTree::from_value(json!({
            "story_background": "bg",
            "milestones": [
                {
                    "milestone_id": "M1",
                    "description": "first",
                    "decision_points": [
                        {
                            "decision_point_id": "M1.D1",
                            "description": "d1",
                            "options": [
                                {"option_id": "M1.D1.O1", "option_name": "one", "consequence": "c1"},
                                {"option_id": "M1.D1.O2", "option_name": "two", "consequence": "c2"}
                            ]
                        }
                    ]
                },
                {
                    "milestone_id": "M2",
                    "description": "second",
                    "decision_points": [
                        {
                            "decision_point_id": "M2.D1",
                            "description": "d2",
                            "options": [
                                {"option_id": "M2.D1.O1", "option_name": "three", "consequence": "c3"}
                            ]
                        }
                    ]
                }
            ]
        }))
        .expect("valid tree")
    }

    fn entry(decision_point_id: &str, chosen: Option<&str>) -> ProgressEntry {
        let mut entry = ProgressEntry::new(
            StoryId::new(),
            "segment",
            decision_point_id,
            vec![OfferedOption {
                option_id: format!("{decision_point_id}.O1"),
                option_name: "one".into(),
            }],
            Utc::now(),
        );
        if let Some(option_id) = chosen {
            assert!(entry.set_chosen_option(option_id, "one"));
        }
        entry
    }

    #[test]
    fn fresh_story_starts_at_first_decision_point() {
        let state = NarrativeState::derive(&tree(), &[], CefrLevel::A1);
        assert_eq!(state.current_decision_point.as_deref(), Some("M1.D1"));
        assert_eq!(
            state.next_step(),
            StoryStep::Delta {
                decision_point_id: "M1.D1".into()
            }
        );
    }

    #[test]
    fn unfulfilled_entry_pins_the_current_point() {
        let entries = vec![entry("M1.D1", None)];
        let state = NarrativeState::derive(&tree(), &entries, CefrLevel::A1);
        assert_eq!(state.current_decision_point.as_deref(), Some("M1.D1"));
        assert!(state.chosen_decisions.is_empty());
    }

    #[test]
    fn fulfilled_entry_advances_to_the_successor() {
        let entries = vec![entry("M1.D1", Some("M1.D1.O1"))];
        let state = NarrativeState::derive(&tree(), &entries, CefrLevel::A1);
        assert_eq!(state.current_decision_point.as_deref(), Some("M2.D1"));
        assert_eq!(state.chosen_decisions, vec!["M1.D1.O1".to_string()]);
    }

    #[test]
    fn exhausted_decision_points_mean_ending() {
        let entries = vec![
            entry("M1.D1", Some("M1.D1.O1")),
            entry("M2.D1", Some("M2.D1.O1")),
        ];
        let state = NarrativeState::derive(&tree(), &entries, CefrLevel::A1);
        assert_eq!(state.current_decision_point, None);
        assert_eq!(state.next_step(), StoryStep::Ending);
    }

    #[test]
    fn ending_entry_keeps_state_terminal() {
        let entries = vec![entry("M1.D1", Some("M1.D1.O1")), entry("", None)];
        let state = NarrativeState::derive(&tree(), &entries, CefrLevel::A1);
        assert_eq!(state.current_decision_point, None);
    }

    #[test]
    fn progress_and_decisions_preserve_order() {
        let entries = vec![
            entry("M1.D1", Some("M1.D1.O1")),
            entry("M2.D1", Some("M2.D1.O1")),
        ];
        let state = NarrativeState::derive(&tree(), &entries, CefrLevel::B2);
        assert_eq!(state.story_progress.len(), 2);
        assert_eq!(
            state.chosen_decisions,
            vec!["M1.D1.O1".to_string(), "M2.D1.O1".to_string()]
        );
    }
}
