//! Skeleton generation workflow - the long-running background step that
//! streams a JSON tree into the skeleton store.
//!
//! The partial skeleton is persisted on every milestone boundary, so the
//! latest snapshot survives a crash. Notifications are fire-and-forget: the
//! persisted status is authoritative, and an unavailable channel is logged
//! and ignored, never failing the generation.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::StreamExt;

use storyloom_domain::{Skeleton, SkeletonStatus, SkeletonTree, Story, StoryId};

use crate::generation::{GenerationConfig, GenerationPurpose};
use crate::infrastructure::partial_json;
use crate::infrastructure::ports::{
    GenerationRequest, LlmError, LlmPort, RepoError, SkeletonEvent, SkeletonRepo, StoryNotifier,
    StoryRepo,
};
use crate::prompt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkeletonOutcome {
    Generated { n_milestones: usize },
    /// A skeleton is already generating or complete; starting again is an
    /// idempotent no-op, not an error.
    AlreadyExists,
}

#[derive(Debug, thiserror::Error)]
pub enum SkeletonGenError {
    #[error("Story not found: {0}")]
    StoryNotFound(StoryId),
    #[error("Generation failed: {0}")]
    Generation(#[from] LlmError),
    #[error("Skeleton stream produced no usable tree")]
    EmptyResult,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

pub struct GenerateSkeleton {
    stories: Arc<dyn StoryRepo>,
    skeletons: Arc<dyn SkeletonRepo>,
    llm: Arc<dyn LlmPort>,
    config: Arc<GenerationConfig>,
    notifier: Arc<dyn StoryNotifier>,
}

impl GenerateSkeleton {
    pub fn new(
        stories: Arc<dyn StoryRepo>,
        skeletons: Arc<dyn SkeletonRepo>,
        llm: Arc<dyn LlmPort>,
        config: Arc<GenerationConfig>,
        notifier: Arc<dyn StoryNotifier>,
    ) -> Self {
        Self {
            stories,
            skeletons,
            llm,
            config,
            notifier,
        }
    }

    pub async fn execute(&self, story_id: StoryId) -> Result<SkeletonOutcome, SkeletonGenError> {
        let story = self
            .stories
            .get(story_id)
            .await?
            .ok_or(SkeletonGenError::StoryNotFound(story_id))?;

        if let Some(existing) = self.skeletons.get_for_story(story_id).await? {
            if existing.status.blocks_regeneration() {
                tracing::warn!(
                    story_id = %story_id,
                    status = existing.status.as_str(),
                    "Story already has a skeleton, skipping generation"
                );
                return Ok(SkeletonOutcome::AlreadyExists);
            }
        }

        let mut skeleton = Skeleton::new(story_id);
        skeleton.status = SkeletonStatus::Generating;
        self.skeletons.save(&skeleton).await?;
        self.notify(story_id, SkeletonEvent::Started).await;

        tracing::info!(story_id = %story_id, "Starting skeleton generation");
        match self.run(&story, &mut skeleton).await {
            Ok(n_milestones) => {
                tracing::info!(
                    story_id = %story_id,
                    n_milestones,
                    "Completed skeleton generation"
                );
                self.notify(story_id, SkeletonEvent::Completed { n_milestones })
                    .await;
                Ok(SkeletonOutcome::Generated { n_milestones })
            }
            Err(error) => {
                // Persist the failure before re-raising so operators see it
                // even if no notification gets through.
                skeleton.status = SkeletonStatus::Failed;
                if let Err(save_error) = self.skeletons.save(&skeleton).await {
                    tracing::error!(
                        story_id = %story_id,
                        error = %save_error,
                        "Failed to persist skeleton failure status"
                    );
                }
                self.notify(
                    story_id,
                    SkeletonEvent::Failed {
                        error: error.to_string(),
                    },
                )
                .await;
                Err(error)
            }
        }
    }

    async fn run(
        &self,
        story: &Story,
        skeleton: &mut Skeleton,
    ) -> Result<usize, SkeletonGenError> {
        let settings = self.config.settings(GenerationPurpose::SkeletonGeneration);

        let mut params = HashMap::new();
        params.insert("genre", story.genre.clone());
        params.insert("cefr_level", story.cefr_level.to_string());
        params.insert("scene_text", story.scene_text.clone());
        params.insert("details", story.details.clone());
        let prompt_text = prompt::render_template(&settings.template, &params);

        let mut stream = self
            .llm
            .generate_stream(GenerationRequest::new(
                prompt_text,
                settings.model.clone(),
                settings.temperature,
            ))
            .await?;

        let mut buffer = String::new();
        let mut prev_milestones = 0usize;
        let mut latest: Option<SkeletonTree> = None;

        while let Some(fragment) = stream.next().await {
            buffer.push_str(&fragment?);

            // Streaming fragments are expected to be temporarily malformed;
            // a buffer that yields no snapshot yet is simply skipped.
            let Some(snapshot) = partial_json::parse_partial(&buffer) else {
                continue;
            };
            let Ok(tree) = SkeletonTree::from_value(snapshot) else {
                continue;
            };

            let n_milestones = tree.complete_milestone_count();
            if n_milestones > prev_milestones {
                skeleton.tree = tree.clone();
                skeleton.status = SkeletonStatus::Generating;
                self.skeletons.save(skeleton).await?;
                self.notify(skeleton.story_id, SkeletonEvent::Progress { n_milestones })
                    .await;
                prev_milestones = n_milestones;
            }
            latest = Some(tree);
        }

        let tree = latest.ok_or(SkeletonGenError::EmptyResult)?;
        let n_milestones = tree.complete_milestone_count();
        skeleton.tree = tree;
        skeleton.status = SkeletonStatus::Completed;
        self.skeletons.save(skeleton).await?;
        Ok(n_milestones)
    }

    /// Best-effort notification; the skeleton status row stays
    /// authoritative.
    async fn notify(&self, story_id: StoryId, event: SkeletonEvent) {
        if let Err(error) = self.notifier.notify(story_id, event).await {
            tracing::warn!(
                story_id = %story_id,
                error = %error,
                "Notification channel unavailable, continuing"
            );
        }
    }
}
