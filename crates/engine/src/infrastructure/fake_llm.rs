//! Scripted fake LLM for tests and offline play.
//!
//! Replies are keyed by the request's model identifier, mirroring the
//! per-purpose model wiring: in fake mode every generation purpose is
//! configured with a distinct `fake-*` model name. A reply equal to
//! [`FAKE_ERROR`] fails the generation instead, for exercising error
//! paths.

use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::stream;

use crate::infrastructure::ports::{GenerationRequest, LlmError, LlmPort, TokenStream};

/// Sentinel reply that makes the fake fail the generation.
pub const FAKE_ERROR: &str = "__error__";

pub const FAKE_SKELETON_MODEL: &str = "fake-skeleton";
pub const FAKE_CONTINUATION_MODEL: &str = "fake-continuation";
pub const FAKE_ENDING_MODEL: &str = "fake-ending";
pub const FAKE_EXPLANATION_MODEL: &str = "fake-explanation";

pub struct FakeLlm {
    replies: DashMap<String, String>,
}

impl FakeLlm {
    /// An empty fake; add replies with [`FakeLlm::with_reply`].
    pub fn new() -> Self {
        Self {
            replies: DashMap::new(),
        }
    }

    /// A fake scripted with a small playable game: a two-milestone mystery
    /// skeleton plus canned continuation, ending, and explanation texts.
    pub fn for_game() -> Self {
        let fake = Self::new();
        fake.replies
            .insert(FAKE_SKELETON_MODEL.into(), DEMO_SKELETON_JSON.into());
        fake.replies.insert(
            FAKE_CONTINUATION_MODEL.into(),
            "This is a continuation of the story.".into(),
        );
        fake.replies.insert(
            FAKE_ENDING_MODEL.into(),
            "This is the ending of the story.".into(),
        );
        fake.replies.insert(
            FAKE_EXPLANATION_MODEL.into(),
            "This is the explanation of the text.".into(),
        );
        fake
    }

    pub fn with_reply(self, model: impl Into<String>, reply: impl Into<String>) -> Self {
        self.replies.insert(model.into(), reply.into());
        self
    }
}

impl Default for FakeLlm {
    fn default() -> Self {
        Self::for_game()
    }
}

#[async_trait]
impl LlmPort for FakeLlm {
    async fn generate_stream(&self, request: GenerationRequest) -> Result<TokenStream, LlmError> {
        let reply = self
            .replies
            .get(&request.model)
            .map(|r| r.clone())
            .ok_or_else(|| {
                LlmError::RequestFailed(format!("no scripted reply for model {}", request.model))
            })?;

        if reply == FAKE_ERROR {
            return Err(LlmError::RequestFailed("fake error".into()));
        }

        // Word-split fragments so consumers exercise the streaming path.
        let fragments: Vec<Result<String, LlmError>> = reply
            .split_inclusive(' ')
            .map(|w| Ok(w.to_string()))
            .collect();
        Ok(Box::pin(stream::iter(fragments)))
    }
}

/// The scripted demo skeleton, in the flat milestones shape.
pub const DEMO_SKELETON_JSON: &str = r#"{
  "story_background": "A once-peaceful coastal town becomes embroiled in secrets and betrayal after a local fisherman disappears under suspicious circumstances.",
  "milestones": [
    {
      "milestone_id": "M1",
      "description": "The disappearance of Joe, a local fisherman, is reported to the town sheriff.",
      "decision_points": [
        {
          "decision_point_id": "M1.D1",
          "description": "Do you investigate Joe's last known location?",
          "options": [
            {
              "option_id": "M1.D1.O1",
              "option_name": "Yes, head to the docks.",
              "consequence": "You discover Joe's boat in disarray, hinting at a struggle."
            },
            {
              "option_id": "M1.D1.O2",
              "option_name": "No, talk to the townsfolk first.",
              "consequence": "You hear rumors of Joe's debts and conflicts with a local gang."
            }
          ]
        }
      ]
    },
    {
      "milestone_id": "M2",
      "description": "A secret underground meeting is discovered.",
      "decision_points": [
        {
          "decision_point_id": "M2.D1",
          "description": "Do you attend the meeting undercover?",
          "options": [
            {
              "option_id": "M2.D1.O1",
              "option_name": "Yes, gather intel.",
              "consequence": "You overhear plans that could implicate the townsfolk."
            },
            {
              "option_id": "M2.D1.O2",
              "option_name": "No, report to the sheriff.",
              "consequence": "The meeting disbands before anyone can act on it."
            }
          ]
        }
      ]
    }
  ],
  "endings": [
    {
      "ending_id": "E1",
      "description": "The truth about Joe's disappearance comes to light."
    },
    {
      "ending_id": "E2",
      "description": "The town keeps its secrets, and the sea keeps Joe."
    }
  ]
}"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::ports::collect_text;
    use storyloom_domain::SkeletonTree;

    #[tokio::test]
    async fn scripted_reply_streams_word_fragments() {
        let fake = FakeLlm::for_game();
        let stream = fake
            .generate_stream(GenerationRequest::new("p", FAKE_CONTINUATION_MODEL, 0.7))
            .await
            .expect("scripted");
        let text = collect_text(stream, None).await.expect("collects");
        assert_eq!(text, "This is a continuation of the story.");
    }

    #[tokio::test]
    async fn error_sentinel_fails_the_generation() {
        let fake = FakeLlm::new().with_reply("broken", FAKE_ERROR);
        let err = fake
            .generate_stream(GenerationRequest::new("p", "broken", 0.7))
            .await
            .err()
            .expect("fails");
        assert!(matches!(err, LlmError::RequestFailed(_)));
    }

    #[tokio::test]
    async fn unknown_model_is_rejected() {
        let fake = FakeLlm::new();
        assert!(fake
            .generate_stream(GenerationRequest::new("p", "nope", 0.7))
            .await
            .is_err());
    }

    #[test]
    fn demo_skeleton_parses_into_a_complete_tree() {
        let value: serde_json::Value =
            serde_json::from_str(DEMO_SKELETON_JSON).expect("valid JSON");
        let tree = SkeletonTree::from_value(value).expect("valid tree");
        assert_eq!(tree.complete_milestone_count(), 2);
        assert_eq!(tree.endings.len(), 2);
        assert_eq!(tree.index().first_decision_point(), Some("M1.D1"));
    }
}
