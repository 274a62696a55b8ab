//! Record choice use case - resolve the pending decision point with the
//! player's option.
//!
//! Validation happens before any mutation: the option must exist in the
//! skeleton and belong to the latest entry's decision point, and that
//! decision must still be open.

use std::sync::Arc;

use storyloom_domain::StoryId;

use crate::infrastructure::ports::{ProgressRepo, RepoError, SkeletonRepo, StoryRepo};

#[derive(Debug, thiserror::Error)]
pub enum ChoiceError {
    #[error("Story not found: {0}")]
    StoryNotFound(StoryId),
    #[error("Skeleton not ready for story {0}")]
    SkeletonNotReady(StoryId),
    #[error("Story {0} has no pending decision")]
    NoPendingDecision(StoryId),
    #[error("Invalid choice: {0}")]
    InvalidChoice(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

pub struct RecordChoice {
    stories: Arc<dyn StoryRepo>,
    skeletons: Arc<dyn SkeletonRepo>,
    progress: Arc<dyn ProgressRepo>,
}

impl RecordChoice {
    pub fn new(
        stories: Arc<dyn StoryRepo>,
        skeletons: Arc<dyn SkeletonRepo>,
        progress: Arc<dyn ProgressRepo>,
    ) -> Self {
        Self {
            stories,
            skeletons,
            progress,
        }
    }

    pub async fn execute(&self, story_id: StoryId, option_id: &str) -> Result<(), ChoiceError> {
        let story = self
            .stories
            .get(story_id)
            .await?
            .ok_or(ChoiceError::StoryNotFound(story_id))?;

        let skeleton = self
            .skeletons
            .get_for_story(story_id)
            .await?
            .filter(|s| s.has_milestones())
            .ok_or(ChoiceError::SkeletonNotReady(story_id))?;

        // Resolve the option text from the skeleton; an unknown id is an
        // invalid choice, not a server failure.
        let option = skeleton
            .tree
            .index()
            .option(option_id)
            .map_err(|_| ChoiceError::InvalidChoice(format!("unknown option {option_id}")))?
            .clone();

        let mut entry = self
            .progress
            .latest_for_story(story_id)
            .await?
            .ok_or(ChoiceError::NoPendingDecision(story_id))?;

        if entry.is_fulfilled() {
            return Err(ChoiceError::InvalidChoice(format!(
                "decision {} already resolved",
                entry.decision_point_id
            )));
        }
        if !entry.set_chosen_option(option_id, &option.option_name) {
            return Err(ChoiceError::InvalidChoice(format!(
                "option {option_id} does not belong to decision {}",
                entry.decision_point_id
            )));
        }

        self.progress.save(&entry).await?;
        tracing::info!(
            story_id = %story.id,
            decision_point = %entry.decision_point_id,
            option = %option_id,
            "Recorded player choice"
        );
        Ok(())
    }
}
