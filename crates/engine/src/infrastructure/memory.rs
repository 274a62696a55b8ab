//! In-memory persistence adapters.
//!
//! The default store for local play and tests. A durable store plugs in by
//! implementing the same repository ports.

use async_trait::async_trait;
use dashmap::DashMap;

use storyloom_domain::{
    Explanation, ExplanationId, ProgressEntry, Skeleton, Story, StoryId, StoryStatus,
};

use crate::infrastructure::ports::{
    ExplanationRepo, ProgressRepo, RepoError, SkeletonRepo, StoryRepo,
};

#[derive(Default)]
pub struct InMemoryStore {
    stories: DashMap<StoryId, Story>,
    skeletons: DashMap<StoryId, Skeleton>,
    progress: DashMap<StoryId, Vec<ProgressEntry>>,
    explanations: DashMap<ExplanationId, Explanation>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StoryRepo for InMemoryStore {
    async fn get(&self, id: StoryId) -> Result<Option<Story>, RepoError> {
        Ok(self.stories.get(&id).map(|s| s.clone()))
    }

    async fn save(&self, story: &Story) -> Result<(), RepoError> {
        self.stories.insert(story.id, story.clone());
        Ok(())
    }

    async fn update_status(&self, id: StoryId, status: StoryStatus) -> Result<(), RepoError> {
        let mut story = self
            .stories
            .get_mut(&id)
            .ok_or_else(|| RepoError::not_found("Story", id))?;
        story.status = status;
        Ok(())
    }
}

#[async_trait]
impl SkeletonRepo for InMemoryStore {
    async fn get_for_story(&self, story_id: StoryId) -> Result<Option<Skeleton>, RepoError> {
        Ok(self.skeletons.get(&story_id).map(|s| s.clone()))
    }

    async fn save(&self, skeleton: &Skeleton) -> Result<(), RepoError> {
        self.skeletons.insert(skeleton.story_id, skeleton.clone());
        Ok(())
    }
}

#[async_trait]
impl ProgressRepo for InMemoryStore {
    async fn list_for_story(&self, story_id: StoryId) -> Result<Vec<ProgressEntry>, RepoError> {
        Ok(self
            .progress
            .get(&story_id)
            .map(|entries| entries.clone())
            .unwrap_or_default())
    }

    async fn latest_for_story(
        &self,
        story_id: StoryId,
    ) -> Result<Option<ProgressEntry>, RepoError> {
        Ok(self
            .progress
            .get(&story_id)
            .and_then(|entries| entries.last().cloned()))
    }

    async fn append(&self, entry: &ProgressEntry) -> Result<(), RepoError> {
        self.progress
            .entry(entry.story_id)
            .or_default()
            .push(entry.clone());
        Ok(())
    }

    async fn save(&self, entry: &ProgressEntry) -> Result<(), RepoError> {
        let mut entries = self
            .progress
            .get_mut(&entry.story_id)
            .ok_or_else(|| RepoError::not_found("ProgressEntry", entry.id))?;
        let existing = entries
            .iter_mut()
            .find(|e| e.id == entry.id)
            .ok_or_else(|| RepoError::not_found("ProgressEntry", entry.id))?;
        *existing = entry.clone();
        Ok(())
    }
}

#[async_trait]
impl ExplanationRepo for InMemoryStore {
    async fn get(&self, id: ExplanationId) -> Result<Option<Explanation>, RepoError> {
        Ok(self.explanations.get(&id).map(|e| e.clone()))
    }

    async fn save(&self, explanation: &Explanation) -> Result<(), RepoError> {
        self.explanations.insert(explanation.id, explanation.clone());
        Ok(())
    }
}
