//! Progress entries - one persisted narrative segment per turn, plus the
//! choice that followed it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ProgressEntryId, StoryId};

/// Snapshot of one option as it was offered to the player, decoupled from
/// the skeleton so history stays stable even if the skeleton ever changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferedOption {
    pub option_id: String,
    pub option_name: String,
}

/// One generated narrative segment.
///
/// Created by the progression engine after each generation step; mutated
/// exactly once by the player's choice; never deleted. Entries are ordered
/// by creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub id: ProgressEntryId,
    pub story_id: StoryId,
    pub content: String,
    /// The decision point this segment concluded at; blank for an ending.
    pub decision_point_id: String,
    /// Blank until the player decides.
    pub chosen_option_id: String,
    pub chosen_option_text: String,
    pub is_end_point: bool,
    pub offered_options: Vec<OfferedOption>,
    pub created_at: DateTime<Utc>,
}

impl ProgressEntry {
    pub fn new(
        story_id: StoryId,
        content: impl Into<String>,
        decision_point_id: impl Into<String>,
        offered_options: Vec<OfferedOption>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let decision_point_id = decision_point_id.into();
        Self {
            id: ProgressEntryId::new(),
            story_id,
            content: content.into(),
            is_end_point: decision_point_id.is_empty(),
            decision_point_id,
            chosen_option_id: String::new(),
            chosen_option_text: String::new(),
            offered_options,
            created_at,
        }
    }

    /// Whether the player has already resolved this entry's decision point.
    pub fn is_fulfilled(&self) -> bool {
        !self.chosen_option_id.is_empty()
    }

    /// An option belongs to this entry iff its decision-point prefix (the
    /// option id minus its last `.`-separated part) matches the entry's
    /// decision point.
    pub fn is_option_valid(&self, option_id: &str) -> bool {
        let decision_point_id = match option_id.rsplit_once('.') {
            Some((prefix, _)) => prefix,
            None => return false,
        };
        self.decision_point_id == decision_point_id
    }

    /// Record the player's choice. Returns `false` and leaves the entry
    /// unchanged when the option does not belong to this decision point or
    /// the decision is already made.
    pub fn set_chosen_option(&mut self, option_id: &str, option_text: &str) -> bool {
        if self.is_fulfilled() || !self.is_option_valid(option_id) {
            return false;
        }
        self.chosen_option_id = option_id.to_string();
        self.chosen_option_text = option_text.to_string();
        true
    }
}
