//! Text explanation records - a linear request/response flow, no state
//! machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ExplanationId, StoryId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplanationStatus {
    #[default]
    Pending,
    Streaming,
    Completed,
    Failed,
}

/// An explanation of a text selection, requested mid-story.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Explanation {
    pub id: ExplanationId,
    pub story_id: StoryId,
    pub selected_text: String,
    pub context_text: String,
    pub explanation: String,
    pub status: ExplanationStatus,
    pub error: String,
    pub created_at: DateTime<Utc>,
}

impl Explanation {
    pub fn new(
        story_id: StoryId,
        selected_text: impl Into<String>,
        context_text: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ExplanationId::new(),
            story_id,
            selected_text: selected_text.into(),
            context_text: context_text.into(),
            explanation: String::new(),
            status: ExplanationStatus::Pending,
            error: String::new(),
            created_at,
        }
    }
}
