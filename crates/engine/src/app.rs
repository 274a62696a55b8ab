//! Application state and composition.

use std::sync::Arc;

use crate::generation::GenerationConfig;
use crate::infrastructure::{
    broadcast::BroadcastNotifier,
    clock::SystemClock,
    memory::InMemoryStore,
    ports::{
        ClockPort, ExplanationRepo, LlmPort, ProgressRepo, SkeletonRepo, StoryNotifier, StoryRepo,
    },
};
use crate::use_cases::{AdvanceStory, ExplainText, GenerateSkeleton, RecordChoice};

/// Main application state.
///
/// Holds the repository ports and use cases; passed to HTTP/WebSocket
/// handlers via Axum state.
pub struct App {
    pub stories: Arc<dyn StoryRepo>,
    pub skeletons: Arc<dyn SkeletonRepo>,
    pub progress: Arc<dyn ProgressRepo>,
    pub clock: Arc<dyn ClockPort>,
    /// Concrete so sessions can subscribe; use cases see it as a port.
    pub notifier: Arc<BroadcastNotifier>,

    pub advance_story: Arc<AdvanceStory>,
    pub record_choice: Arc<RecordChoice>,
    pub generate_skeleton: Arc<GenerateSkeleton>,
    pub explain_text: Arc<ExplainText>,
}

impl App {
    /// Wire up all dependencies.
    pub fn new(
        stories: Arc<dyn StoryRepo>,
        skeletons: Arc<dyn SkeletonRepo>,
        progress: Arc<dyn ProgressRepo>,
        explanations: Arc<dyn ExplanationRepo>,
        llm: Arc<dyn LlmPort>,
        config: Arc<GenerationConfig>,
    ) -> Self {
        let clock: Arc<dyn ClockPort> = Arc::new(SystemClock::new());
        let notifier = Arc::new(BroadcastNotifier::new());
        let notifier_port: Arc<dyn StoryNotifier> = notifier.clone();

        let advance_story = Arc::new(AdvanceStory::new(
            stories.clone(),
            skeletons.clone(),
            progress.clone(),
            llm.clone(),
            config.clone(),
            clock.clone(),
        ));
        let record_choice = Arc::new(RecordChoice::new(
            stories.clone(),
            skeletons.clone(),
            progress.clone(),
        ));
        let generate_skeleton = Arc::new(GenerateSkeleton::new(
            stories.clone(),
            skeletons.clone(),
            llm.clone(),
            config.clone(),
            notifier_port,
        ));
        let explain_text = Arc::new(ExplainText::new(
            explanations,
            llm,
            config,
            clock.clone(),
        ));

        Self {
            stories,
            skeletons,
            progress,
            clock,
            notifier,
            advance_story,
            record_choice,
            generate_skeleton,
            explain_text,
        }
    }

    /// Compose against the in-memory store.
    pub fn in_memory(llm: Arc<dyn LlmPort>, config: Arc<GenerationConfig>) -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store,
            llm,
            config,
        )
    }
}
