//! Skeleton generation progress notifications.
//!
//! The workflow raises these as milestones land; delivery is best-effort.
//! A lost notification must not corrupt anything - the persisted skeleton
//! status is authoritative.

use async_trait::async_trait;

use storyloom_domain::StoryId;

use super::error::NotifyError;

/// Progress events raised by the skeleton generation workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkeletonEvent {
    Started,
    Progress { n_milestones: usize },
    Completed { n_milestones: usize },
    Failed { error: String },
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StoryNotifier: Send + Sync {
    async fn notify(&self, story_id: StoryId, event: SkeletonEvent) -> Result<(), NotifyError>;
}
