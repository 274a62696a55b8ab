//! In-process skeleton progress notifier.
//!
//! Relays workflow events to WebSocket sessions through a per-story
//! broadcast channel. Nobody listening is not an error; the workflow keeps
//! generating either way.

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;

use storyloom_domain::StoryId;
use storyloom_shared::ServerMessage;

use crate::infrastructure::ports::{NotifyError, SkeletonEvent, StoryNotifier};

const CHANNEL_CAPACITY: usize = 64;

#[derive(Default)]
pub struct BroadcastNotifier {
    channels: DashMap<StoryId, broadcast::Sender<ServerMessage>>,
}

impl BroadcastNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a story's events. Sessions call this on connect.
    pub fn subscribe(&self, story_id: StoryId) -> broadcast::Receiver<ServerMessage> {
        self.channels
            .entry(story_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    fn to_message(story_id: StoryId, event: SkeletonEvent) -> ServerMessage {
        let story_id = story_id.to_string();
        match event {
            SkeletonEvent::Started => ServerMessage::SkeletonGenerationStarted { story_id },
            SkeletonEvent::Progress { n_milestones } => {
                ServerMessage::SkeletonGenerationProgress {
                    story_id,
                    n_milestones,
                }
            }
            SkeletonEvent::Completed { n_milestones } => {
                ServerMessage::SkeletonGenerationCompleted {
                    story_id,
                    n_milestones,
                }
            }
            SkeletonEvent::Failed { error } => {
                ServerMessage::SkeletonGenerationFailed { story_id, error }
            }
        }
    }
}

#[async_trait]
impl StoryNotifier for BroadcastNotifier {
    async fn notify(&self, story_id: StoryId, event: SkeletonEvent) -> Result<(), NotifyError> {
        if let Some(channel) = self.channels.get(&story_id) {
            // A send error only means no receiver is currently subscribed.
            let _ = channel.send(Self::to_message(story_id, event));
        }
        Ok(())
    }
}
