//! WebSocket message types for engine-client communication.
//!
//! One JSON object per message, discriminated by a `type` tag. These types
//! are used by the engine (sending `ServerMessage`, receiving
//! `ClientMessage`) and by any client implementation.
//!
//! ## Versioning Policy
//!
//! - New variants can be added at the end (forward compatible)
//! - Removing or renaming variants is a breaking change
//! - Unknown inbound message types deserialize to `Unknown`

use serde::{Deserialize, Serialize};

use storyloom_domain::{DecisionOption, OfferedOption, StoryStatus};

/// An option as shown to the player: id and name only. The skeleton's
/// `consequence` text is never forwarded ahead of the choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionView {
    pub option_id: String,
    pub option_name: String,
}

impl From<&DecisionOption> for OptionView {
    fn from(option: &DecisionOption) -> Self {
        Self {
            option_id: option.option_id.clone(),
            option_name: option.option_name.clone(),
        }
    }
}

impl From<&OfferedOption> for OptionView {
    fn from(option: &OfferedOption) -> Self {
        Self {
            option_id: option.option_id.clone(),
            option_name: option.option_name.clone(),
        }
    }
}

// =============================================================================
// Client Messages (Client → Engine)
// =============================================================================

/// Messages from the client to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Begin the story: generate the skeleton if absent, else run the first
    /// turn.
    StartStory,
    /// Resolve the current decision point and advance one turn.
    Interact { option_id: String },
    /// Ask for an explanation of a text selection.
    ExplainText {
        selected_text: String,
        context_text: String,
        /// Client-side correlation id echoed back in `explanation_created`.
        #[serde(default)]
        explanation_id: Option<String>,
    },
    /// Forward compatibility for unrecognized message types.
    #[serde(other)]
    Unknown,
}

// =============================================================================
// Server Messages (Engine → Client)
// =============================================================================

/// Messages from the engine to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A completed turn: the new segment, the story status, and the options
    /// now on offer.
    StoryUpdate {
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        status: StoryStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        current_decision: Option<String>,
        options: Vec<OptionView>,
    },
    /// Re-send the pending decision point without generating anything, for
    /// clients reconnecting mid-decision.
    SendDecisionPoint {
        #[serde(skip_serializing_if = "Option::is_none")]
        current_decision: Option<String>,
        options: Vec<OptionView>,
    },
    /// One incremental fragment of the segment being generated this turn.
    StoryStream { content: String },

    /// Skeleton generation lifecycle.
    SkeletonGenerationStarted { story_id: String },
    SkeletonGenerationProgress { story_id: String, n_milestones: usize },
    SkeletonGenerationCompleted { story_id: String, n_milestones: usize },
    SkeletonGenerationFailed { story_id: String, error: String },

    /// Text explanation lifecycle.
    ExplanationCreated {
        explanation_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        client_id: Option<String>,
    },
    ExplanationStream {
        explanation_id: String,
        content: String,
    },
    ExplanationCompleted {
        explanation_id: String,
        explanation: String,
    },

    /// Any recovered failure, as a single uniform event.
    Error { error: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_messages_parse_from_snake_case_tags() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type": "interact", "option_id": "M1.D1.O1"}"#)
                .expect("valid message");
        match msg {
            ClientMessage::Interact { option_id } => assert_eq!(option_id, "M1.D1.O1"),
            other => panic!("unexpected message: {other:?}"),
        }

        let msg: ClientMessage =
            serde_json::from_str(r#"{"type": "start_story"}"#).expect("valid message");
        assert!(matches!(msg, ClientMessage::StartStory));
    }

    #[test]
    fn unknown_inbound_type_does_not_fail() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type": "time_travel"}"#).expect("tolerant parse");
        assert!(matches!(msg, ClientMessage::Unknown));
    }

    #[test]
    fn story_update_serializes_status_and_options() {
        let msg = ServerMessage::StoryUpdate {
            content: Some("The docks are silent.".into()),
            status: StoryStatus::InProgress,
            current_decision: Some("M1.D1".into()),
            options: vec![OptionView {
                option_id: "M1.D1.O1".into(),
                option_name: "Head to the docks.".into(),
            }],
        };
        let json = serde_json::to_value(&msg).expect("serializable");
        assert_eq!(json["type"], "story_update");
        assert_eq!(json["status"], "IN_PROGRESS");
        assert_eq!(json["options"][0]["option_id"], "M1.D1.O1");
        // Spoiler containment: option payloads never carry consequences.
        assert!(json["options"][0].get("consequence").is_none());
    }

    #[test]
    fn option_view_drops_consequence_text() {
        let option = DecisionOption {
            option_id: "M1.D1.O1".into(),
            option_name: "Head to the docks.".into(),
            consequence: "The boat is in disarray.".into(),
        };
        let view = OptionView::from(&option);
        let json = serde_json::to_value(&view).expect("serializable");
        assert_eq!(json["option_name"], "Head to the docks.");
        assert!(json.get("consequence").is_none());
    }
}
