//! Persistence ports, one per entity type.
//!
//! The engine never touches a store directly; callers inject adapters for
//! these traits (the crate ships an in-memory implementation).

use async_trait::async_trait;

use storyloom_domain::{
    Explanation, ExplanationId, ProgressEntry, Skeleton, Story, StoryId, StoryStatus,
};

use super::error::RepoError;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StoryRepo: Send + Sync {
    async fn get(&self, id: StoryId) -> Result<Option<Story>, RepoError>;
    async fn save(&self, story: &Story) -> Result<(), RepoError>;
    async fn update_status(&self, id: StoryId, status: StoryStatus) -> Result<(), RepoError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SkeletonRepo: Send + Sync {
    /// A story has at most one skeleton.
    async fn get_for_story(&self, story_id: StoryId) -> Result<Option<Skeleton>, RepoError>;
    async fn save(&self, skeleton: &Skeleton) -> Result<(), RepoError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProgressRepo: Send + Sync {
    /// All entries for a story in creation order.
    async fn list_for_story(&self, story_id: StoryId) -> Result<Vec<ProgressEntry>, RepoError>;
    /// The most recent entry for a story, if any.
    async fn latest_for_story(&self, story_id: StoryId)
        -> Result<Option<ProgressEntry>, RepoError>;
    /// Persist a new entry.
    async fn append(&self, entry: &ProgressEntry) -> Result<(), RepoError>;
    /// Persist a mutation of an existing entry (the one-shot choice).
    async fn save(&self, entry: &ProgressEntry) -> Result<(), RepoError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExplanationRepo: Send + Sync {
    async fn get(&self, id: ExplanationId) -> Result<Option<Explanation>, RepoError>;
    async fn save(&self, explanation: &Explanation) -> Result<(), RepoError>;
}
