//! Advance story use case - one turn of the progression state machine.
//!
//! A turn advances exactly one segment: either a continuation toward the
//! current decision point or the ending. The generation call is the only
//! suspension point; persistence happens once, after the full text is
//! assembled, so a failed or abandoned generation leaves no partial entry.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use storyloom_domain::{
    DomainError, NarrativeState, OfferedOption, ProgressEntry, SkeletonTree, StoryId, StoryStatus,
    StoryStep,
};
use storyloom_shared::OptionView;

use crate::generation::{GenerationConfig, GenerationPurpose};
use crate::infrastructure::ports::{
    collect_text, ClockPort, GenerationRequest, LlmError, LlmPort, ProgressRepo, RepoError,
    SkeletonRepo, StoryRepo,
};
use crate::prompt;

/// Placeholder fed to the continuation prompt for a story with no progress
/// yet.
const NO_PROGRESS_PLACEHOLDER: &str =
    "(There is no progress yet: please start writing the story from the background)";

/// The result of one turn, as surfaced to the session adapter.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub content: String,
    pub status: StoryStatus,
    pub current_decision: Option<String>,
    pub options: Vec<OptionView>,
}

#[derive(Debug, thiserror::Error)]
pub enum ProgressionError {
    #[error("Story not found: {0}")]
    StoryNotFound(StoryId),
    #[error("Story {0} accepts no further turns")]
    StoryCompleted(StoryId),
    #[error("Skeleton not ready for story {0}")]
    SkeletonNotReady(StoryId),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("Generation failed: {0}")]
    Generation(#[from] LlmError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Runs one turn per invocation. Not internally concurrency-safe: callers
/// must serialize turns per story (one session per story, or a per-story
/// queue upstream).
pub struct AdvanceStory {
    stories: Arc<dyn StoryRepo>,
    skeletons: Arc<dyn SkeletonRepo>,
    progress: Arc<dyn ProgressRepo>,
    llm: Arc<dyn LlmPort>,
    config: Arc<GenerationConfig>,
    clock: Arc<dyn ClockPort>,
}

impl AdvanceStory {
    pub fn new(
        stories: Arc<dyn StoryRepo>,
        skeletons: Arc<dyn SkeletonRepo>,
        progress: Arc<dyn ProgressRepo>,
        llm: Arc<dyn LlmPort>,
        config: Arc<GenerationConfig>,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        Self {
            stories,
            skeletons,
            progress,
            llm,
            config,
            clock,
        }
    }

    /// Run one turn. Fragments are forwarded through `fragments` as they
    /// arrive; a dropped receiver loses the in-flight output without
    /// failing the turn.
    pub async fn execute(
        &self,
        story_id: StoryId,
        fragments: Option<UnboundedSender<String>>,
    ) -> Result<TurnOutcome, ProgressionError> {
        let story = self
            .stories
            .get(story_id)
            .await?
            .ok_or(ProgressionError::StoryNotFound(story_id))?;
        if !story.can_advance() {
            return Err(ProgressionError::StoryCompleted(story_id));
        }

        let skeleton = self
            .skeletons
            .get_for_story(story_id)
            .await?
            .filter(|s| s.has_milestones())
            .ok_or(ProgressionError::SkeletonNotReady(story_id))?;
        let tree = &skeleton.tree;

        let entries = self.progress.list_for_story(story_id).await?;
        let state = NarrativeState::derive(tree, &entries, story.cefr_level);

        let (text, new_status, concluded_at) = match state.next_step() {
            StoryStep::Delta { decision_point_id } => {
                tracing::info!(story_id = %story_id, decision_point = %decision_point_id, "Generating story delta");
                let text = self
                    .generate_delta(tree, &state, &decision_point_id, fragments.as_ref())
                    .await?;
                (text, StoryStatus::InProgress, decision_point_id)
            }
            StoryStep::Ending => {
                tracing::info!(story_id = %story_id, "Generating story ending");
                let text = self
                    .generate_ending(tree, &state, fragments.as_ref())
                    .await?;
                (text, StoryStatus::Completed, String::new())
            }
        };

        // Snapshot the offered options onto the entry so history survives
        // independently of the skeleton.
        let offered: Vec<OfferedOption> = if concluded_at.is_empty() {
            Vec::new()
        } else {
            tree.index()
                .decision_point(&concluded_at)?
                .options
                .iter()
                .map(|o| OfferedOption {
                    option_id: o.option_id.clone(),
                    option_name: o.option_name.clone(),
                })
                .collect()
        };

        let entry = ProgressEntry::new(
            story_id,
            text.clone(),
            concluded_at,
            offered,
            self.clock.now(),
        );
        self.progress.append(&entry).await?;
        self.stories.update_status(story_id, new_status).await?;

        // The decision surfaced to the client is recomputed from the
        // updated state, not the one just consumed.
        let mut all_entries = entries;
        all_entries.push(entry);
        let new_state = NarrativeState::derive(tree, &all_entries, story.cefr_level);
        let options = match &new_state.current_decision_point {
            Some(id) => tree
                .index()
                .decision_point(id)?
                .options
                .iter()
                .map(OptionView::from)
                .collect(),
            None => Vec::new(),
        };

        Ok(TurnOutcome {
            content: text,
            status: new_status,
            current_decision: new_state.current_decision_point,
            options,
        })
    }

    async fn generate_delta(
        &self,
        tree: &SkeletonTree,
        state: &NarrativeState,
        decision_point_id: &str,
        fragments: Option<&UnboundedSender<String>>,
    ) -> Result<String, ProgressionError> {
        // Resolve before generating: a missing decision point means a
        // corrupted or incomplete skeleton and must surface, not retry.
        let index = tree.index();
        let (milestone, point) = index.milestone_and_point(decision_point_id)?;

        let mut progress_text = prompt::format_progress_with_decisions(tree, state)?;
        if progress_text.is_empty() {
            progress_text = NO_PROGRESS_PLACEHOLDER.to_string();
        }

        let mut params = HashMap::new();
        params.insert("skeleton", prompt::format_story_skeleton(tree));
        params.insert("background", tree.background.clone());
        params.insert("progress", progress_text);
        params.insert("milestone", prompt::format_milestone(milestone));
        params.insert(
            "decisions_made",
            prompt::format_decisions_made(tree, state)?,
        );
        params.insert("cefr_level", state.cefr_level.to_string());
        params.insert("decision_point", prompt::format_decision_point(point));

        self.invoke(GenerationPurpose::StoryContinuation, &params, fragments)
            .await
    }

    async fn generate_ending(
        &self,
        tree: &SkeletonTree,
        state: &NarrativeState,
        fragments: Option<&UnboundedSender<String>>,
    ) -> Result<String, ProgressionError> {
        let mut params = HashMap::new();
        params.insert(
            "decisions_made",
            prompt::format_decisions_made(tree, state)?,
        );
        params.insert("skeleton", prompt::format_story_skeleton(tree));
        params.insert(
            "progress",
            prompt::format_progress_with_decisions(tree, state)?,
        );
        params.insert("cefr_level", state.cefr_level.to_string());

        self.invoke(GenerationPurpose::StoryEnding, &params, fragments)
            .await
    }

    async fn invoke(
        &self,
        purpose: GenerationPurpose,
        params: &HashMap<&str, String>,
        fragments: Option<&UnboundedSender<String>>,
    ) -> Result<String, ProgressionError> {
        let settings = self.config.settings(purpose);
        let prompt_text = prompt::render_template(&settings.template, params);
        let stream = self
            .llm
            .generate_stream(GenerationRequest::new(
                prompt_text,
                settings.model.clone(),
                settings.temperature,
            ))
            .await?;
        let text = collect_text(stream, fragments).await?;
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::ports::{
        MockClockPort, MockLlmPort, MockProgressRepo, MockSkeletonRepo, MockStoryRepo, TokenStream,
    };
    use chrono::{TimeZone, Utc};
    use futures_util::stream;
    use mockall::predicate::*;
    use storyloom_domain::{CefrLevel, Skeleton, SkeletonStatus, SkeletonTree, Story};

    fn demo_tree() -> SkeletonTree {
        let value: serde_json::Value =
            serde_json::from_str(crate::infrastructure::fake_llm::DEMO_SKELETON_JSON)
                .expect("valid JSON");
        SkeletonTree::from_value(value).expect("valid tree")
    }

    fn demo_skeleton(story_id: StoryId) -> Skeleton {
        let mut skeleton = Skeleton::new(story_id);
        skeleton.tree = demo_tree();
        skeleton.status = SkeletonStatus::Completed;
        skeleton
    }

    fn demo_story(status: StoryStatus) -> Story {
        let mut story = Story::new("The Vanishing", "Mystery", CefrLevel::B1, Utc::now());
        story.status = status;
        story
    }

    fn singleton_stream(text: &str) -> TokenStream {
        Box::pin(stream::iter(vec![Ok(text.to_string())]))
    }

    fn use_case(
        stories: MockStoryRepo,
        skeletons: MockSkeletonRepo,
        progress: MockProgressRepo,
        llm: MockLlmPort,
    ) -> AdvanceStory {
        let mut clock = MockClockPort::new();
        clock
            .expect_now()
            .returning(|| Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).single().expect("valid"));
        AdvanceStory::new(
            Arc::new(stories),
            Arc::new(skeletons),
            Arc::new(progress),
            Arc::new(llm),
            Arc::new(GenerationConfig::fake()),
            Arc::new(clock),
        )
    }

    fn fulfilled_entry(story_id: StoryId, decision_point_id: &str, option_id: &str) -> ProgressEntry {
        let mut entry =
            ProgressEntry::new(story_id, "earlier segment", decision_point_id, vec![], Utc::now());
        assert!(entry.set_chosen_option(option_id, "choice"));
        entry
    }

    #[tokio::test]
    async fn delta_step_persists_one_entry_at_the_pre_step_decision_point() {
        let story = demo_story(StoryStatus::Init);
        let story_id = story.id;

        let mut stories = MockStoryRepo::new();
        stories
            .expect_get()
            .with(eq(story_id))
            .returning(move |_| Ok(Some(story.clone())));
        stories
            .expect_update_status()
            .with(eq(story_id), eq(StoryStatus::InProgress))
            .times(1)
            .returning(|_, _| Ok(()));

        let mut skeletons = MockSkeletonRepo::new();
        skeletons
            .expect_get_for_story()
            .returning(move |id| Ok(Some(demo_skeleton(id))));

        let mut progress = MockProgressRepo::new();
        progress.expect_list_for_story().returning(|_| Ok(vec![]));
        progress
            .expect_append()
            .withf(move |entry: &ProgressEntry| {
                entry.story_id == story_id
                    && entry.decision_point_id == "M1.D1"
                    && entry.content == "The docks are silent."
                    && entry.offered_options.len() == 2
                    && !entry.is_end_point
            })
            .times(1)
            .returning(|_| Ok(()));

        let mut llm = MockLlmPort::new();
        llm.expect_generate_stream()
            .withf(|req: &GenerationRequest| {
                req.model == crate::infrastructure::fake_llm::FAKE_CONTINUATION_MODEL
                    && req.prompt.contains("(There is no progress yet")
                    && req.prompt.contains("(NONE YET)")
                    && req.prompt.contains("DecisionPoint [M1.D1]")
            })
            .times(1)
            .returning(|_| Ok(singleton_stream("The docks are silent.")));

        let outcome = use_case(stories, skeletons, progress, llm)
            .execute(story_id, None)
            .await
            .expect("turn succeeds");

        assert_eq!(outcome.status, StoryStatus::InProgress);
        assert_eq!(outcome.content, "The docks are silent.");
        assert_eq!(outcome.current_decision.as_deref(), Some("M1.D1"));
        assert_eq!(outcome.options.len(), 2);
        assert_eq!(outcome.options[0].option_id, "M1.D1.O1");
    }

    #[tokio::test]
    async fn fulfilled_decision_advances_to_the_next_point() {
        let story = demo_story(StoryStatus::InProgress);
        let story_id = story.id;

        let mut stories = MockStoryRepo::new();
        stories
            .expect_get()
            .returning(move |_| Ok(Some(story.clone())));
        stories
            .expect_update_status()
            .with(eq(story_id), eq(StoryStatus::InProgress))
            .times(1)
            .returning(|_, _| Ok(()));

        let mut skeletons = MockSkeletonRepo::new();
        skeletons
            .expect_get_for_story()
            .returning(move |id| Ok(Some(demo_skeleton(id))));

        let mut progress = MockProgressRepo::new();
        progress.expect_list_for_story().returning(move |_| {
            Ok(vec![fulfilled_entry(story_id, "M1.D1", "M1.D1.O1")])
        });
        progress
            .expect_append()
            .withf(|entry: &ProgressEntry| entry.decision_point_id == "M2.D1")
            .times(1)
            .returning(|_| Ok(()));

        let mut llm = MockLlmPort::new();
        llm.expect_generate_stream()
            .withf(|req: &GenerationRequest| {
                // The most recent decision is fed forward, consequence and
                // all; the choice annotation uses the skeleton's option
                // name, not the text snapshotted on the entry.
                req.prompt.contains("[M1.D1.O1]")
                    && req.prompt.contains("[Choice made: Yes, head to the docks.]")
                    && req.prompt.contains("DecisionPoint [M2.D1]")
            })
            .returning(|_| Ok(singleton_stream("A new lead emerges.")));

        let outcome = use_case(stories, skeletons, progress, llm)
            .execute(story_id, None)
            .await
            .expect("turn succeeds");

        assert_eq!(outcome.current_decision.as_deref(), Some("M2.D1"));
    }

    #[tokio::test]
    async fn ending_step_completes_the_story_with_no_options() {
        let story = demo_story(StoryStatus::InProgress);
        let story_id = story.id;

        let mut stories = MockStoryRepo::new();
        stories
            .expect_get()
            .returning(move |_| Ok(Some(story.clone())));
        stories
            .expect_update_status()
            .with(eq(story_id), eq(StoryStatus::Completed))
            .times(1)
            .returning(|_, _| Ok(()));

        let mut skeletons = MockSkeletonRepo::new();
        skeletons
            .expect_get_for_story()
            .returning(move |id| Ok(Some(demo_skeleton(id))));

        let mut progress = MockProgressRepo::new();
        progress.expect_list_for_story().returning(move |_| {
            Ok(vec![
                fulfilled_entry(story_id, "M1.D1", "M1.D1.O1"),
                fulfilled_entry(story_id, "M2.D1", "M2.D1.O1"),
            ])
        });
        progress
            .expect_append()
            .withf(|entry: &ProgressEntry| {
                entry.decision_point_id.is_empty()
                    && entry.is_end_point
                    && entry.offered_options.is_empty()
            })
            .times(1)
            .returning(|_| Ok(()));

        let mut llm = MockLlmPort::new();
        llm.expect_generate_stream()
            .withf(|req: &GenerationRequest| {
                req.model == crate::infrastructure::fake_llm::FAKE_ENDING_MODEL
            })
            .returning(|_| Ok(singleton_stream("And so it ended.")));

        let outcome = use_case(stories, skeletons, progress, llm)
            .execute(story_id, None)
            .await
            .expect("turn succeeds");

        assert_eq!(outcome.status, StoryStatus::Completed);
        assert_eq!(outcome.current_decision, None);
        assert!(outcome.options.is_empty());
    }

    #[tokio::test]
    async fn terminal_story_rejects_further_turns() {
        let story = demo_story(StoryStatus::Completed);
        let story_id = story.id;

        let mut stories = MockStoryRepo::new();
        stories
            .expect_get()
            .returning(move |_| Ok(Some(story.clone())));

        // No skeleton/progress/llm expectations: nothing else may run.
        let err = use_case(
            stories,
            MockSkeletonRepo::new(),
            MockProgressRepo::new(),
            MockLlmPort::new(),
        )
        .execute(story_id, None)
        .await
        .expect_err("rejected");

        assert!(matches!(err, ProgressionError::StoryCompleted(_)));
    }

    #[tokio::test]
    async fn generation_failure_aborts_the_step_without_mutation() {
        let story = demo_story(StoryStatus::Init);
        let story_id = story.id;

        let mut stories = MockStoryRepo::new();
        stories
            .expect_get()
            .returning(move |_| Ok(Some(story.clone())));
        // update_status must not be called.

        let mut skeletons = MockSkeletonRepo::new();
        skeletons
            .expect_get_for_story()
            .returning(move |id| Ok(Some(demo_skeleton(id))));

        let mut progress = MockProgressRepo::new();
        progress.expect_list_for_story().returning(|_| Ok(vec![]));
        // append must not be called.

        let mut llm = MockLlmPort::new();
        llm.expect_generate_stream()
            .returning(|_| Err(LlmError::RequestFailed("provider down".into())));

        let err = use_case(stories, skeletons, progress, llm)
            .execute(story_id, None)
            .await
            .expect_err("generation failed");

        assert!(matches!(err, ProgressionError::Generation(_)));
    }

    #[tokio::test]
    async fn missing_skeleton_is_surfaced_before_any_generation() {
        let story = demo_story(StoryStatus::Init);
        let story_id = story.id;

        let mut stories = MockStoryRepo::new();
        stories
            .expect_get()
            .returning(move |_| Ok(Some(story.clone())));

        let mut skeletons = MockSkeletonRepo::new();
        skeletons.expect_get_for_story().returning(|_| Ok(None));

        let err = use_case(stories, skeletons, MockProgressRepo::new(), MockLlmPort::new())
            .execute(story_id, None)
            .await
            .expect_err("no skeleton");

        assert!(matches!(err, ProgressionError::SkeletonNotReady(_)));
    }

    #[tokio::test]
    async fn fragments_are_forwarded_during_the_turn() {
        let story = demo_story(StoryStatus::Init);
        let story_id = story.id;

        let mut stories = MockStoryRepo::new();
        stories
            .expect_get()
            .returning(move |_| Ok(Some(story.clone())));
        stories.expect_update_status().returning(|_, _| Ok(()));

        let mut skeletons = MockSkeletonRepo::new();
        skeletons
            .expect_get_for_story()
            .returning(move |id| Ok(Some(demo_skeleton(id))));

        let mut progress = MockProgressRepo::new();
        progress.expect_list_for_story().returning(|_| Ok(vec![]));
        progress.expect_append().returning(|_| Ok(()));

        let mut llm = MockLlmPort::new();
        llm.expect_generate_stream().returning(|_| {
            Ok(Box::pin(stream::iter(vec![
                Ok("The docks ".to_string()),
                Ok("are silent.".to_string()),
            ])))
        });

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let outcome = use_case(stories, skeletons, progress, llm)
            .execute(story_id, Some(tx))
            .await
            .expect("turn succeeds");

        assert_eq!(outcome.content, "The docks are silent.");
        let mut forwarded = Vec::new();
        while let Ok(fragment) = rx.try_recv() {
            forwarded.push(fragment);
        }
        assert_eq!(forwarded, vec!["The docks ", "are silent."]);
    }
}
