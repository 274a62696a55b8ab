//! End-to-end story walk against the in-memory store and the scripted
//! fake LLM: skeleton generation, two decision points, the ending, and
//! terminal rejection.

use std::sync::Arc;

use chrono::Utc;

use storyloom_domain::{CefrLevel, Story, StoryStatus};
use storyloom_engine::app::App;
use storyloom_engine::generation::GenerationConfig;
use storyloom_engine::infrastructure::fake_llm::FakeLlm;
use storyloom_engine::use_cases::{ChoiceError, ProgressionError, SkeletonOutcome};

fn demo_app() -> App {
    App::in_memory(
        Arc::new(FakeLlm::for_game()),
        Arc::new(GenerationConfig::fake()),
    )
}

#[tokio::test]
async fn full_story_walkthrough() {
    let app = demo_app();

    let story = Story::new("The Vanishing", "Mystery", CefrLevel::B1, Utc::now());
    let story_id = story.id;
    app.stories.save(&story).await.expect("story saved");

    // Skeleton generation populates the tree and completes.
    let outcome = app
        .generate_skeleton
        .execute(story_id)
        .await
        .expect("skeleton generated");
    assert_eq!(outcome, SkeletonOutcome::Generated { n_milestones: 2 });

    // Starting a second generation is an idempotent no-op.
    let outcome = app
        .generate_skeleton
        .execute(story_id)
        .await
        .expect("no-op");
    assert_eq!(outcome, SkeletonOutcome::AlreadyExists);

    // First turn: the opening segment, concluding at M1.D1.
    let turn = app
        .advance_story
        .execute(story_id, None)
        .await
        .expect("first turn");
    assert_eq!(turn.status, StoryStatus::InProgress);
    assert_eq!(turn.current_decision.as_deref(), Some("M1.D1"));
    assert_eq!(turn.options.len(), 2);
    assert!(!turn.content.is_empty());

    // An option from a future decision point is rejected before mutation.
    let err = app
        .record_choice
        .execute(story_id, "M2.D1.O1")
        .await
        .expect_err("foreign option");
    assert!(matches!(err, ChoiceError::InvalidChoice(_)));

    // Choose at M1.D1 and advance: the story walks to M2.D1.
    app.record_choice
        .execute(story_id, "M1.D1.O1")
        .await
        .expect("first choice");
    let turn = app
        .advance_story
        .execute(story_id, None)
        .await
        .expect("second turn");
    assert_eq!(turn.current_decision.as_deref(), Some("M2.D1"));

    // Choosing the same decision twice is rejected.
    let err = app
        .record_choice
        .execute(story_id, "M1.D1.O2")
        .await
        .expect_err("already resolved");
    assert!(matches!(err, ChoiceError::InvalidChoice(_)));

    // Resolve M2.D1; no decision point remains, so the next turn ends the
    // story.
    app.record_choice
        .execute(story_id, "M2.D1.O1")
        .await
        .expect("second choice");
    let turn = app
        .advance_story
        .execute(story_id, None)
        .await
        .expect("ending turn");
    assert_eq!(turn.status, StoryStatus::Completed);
    assert_eq!(turn.current_decision, None);
    assert!(turn.options.is_empty());

    // The story is terminal: no further turns are accepted.
    let err = app
        .advance_story
        .execute(story_id, None)
        .await
        .expect_err("terminal story");
    assert!(matches!(err, ProgressionError::StoryCompleted(_)));

    // Exactly three entries were persisted, the last being the ending.
    let entries = app
        .progress
        .list_for_story(story_id)
        .await
        .expect("entries");
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].decision_point_id, "M1.D1");
    assert_eq!(entries[0].chosen_option_id, "M1.D1.O1");
    assert_eq!(entries[1].decision_point_id, "M2.D1");
    assert!(entries[2].is_end_point);
    assert!(entries[2].chosen_option_id.is_empty());
}

#[tokio::test]
async fn turn_before_skeleton_is_rejected() {
    let app = demo_app();
    let story = Story::new("Early", "Mystery", CefrLevel::A2, Utc::now());
    let story_id = story.id;
    app.stories.save(&story).await.expect("story saved");

    let err = app
        .advance_story
        .execute(story_id, None)
        .await
        .expect_err("no skeleton yet");
    assert!(matches!(err, ProgressionError::SkeletonNotReady(_)));
}
