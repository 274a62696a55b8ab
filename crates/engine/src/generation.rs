//! Per-purpose generation settings: model, temperature, and prompt
//! template.
//!
//! Each generation step the engine performs has a purpose; each purpose
//! resolves to a hard-coded default template overridable by an environment
//! variable. Templates carry `{name}` placeholders filled at call time, and
//! a template missing a required placeholder is rejected at startup rather
//! than at generation time.

use std::collections::HashMap;

use crate::infrastructure::fake_llm;

/// What a generation call is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenerationPurpose {
    /// Produce the JSON skeleton tree for a new story.
    SkeletonGeneration,
    /// Continue the story toward the current decision point.
    StoryContinuation,
    /// Write the story's ending.
    StoryEnding,
    /// Explain a text selection to the player.
    TextExplanation,
}

impl GenerationPurpose {
    pub const ALL: [Self; 4] = [
        Self::SkeletonGeneration,
        Self::StoryContinuation,
        Self::StoryEnding,
        Self::TextExplanation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SkeletonGeneration => "skeleton_generation",
            Self::StoryContinuation => "story_continuation",
            Self::StoryEnding => "story_ending",
            Self::TextExplanation => "text_explanation",
        }
    }

    /// Environment variable overriding this purpose's template.
    pub fn template_env_var(&self) -> &'static str {
        match self {
            Self::SkeletonGeneration => "STORYLOOM_PROMPT_SKELETON",
            Self::StoryContinuation => "STORYLOOM_PROMPT_CONTINUATION",
            Self::StoryEnding => "STORYLOOM_PROMPT_ENDING",
            Self::TextExplanation => "STORYLOOM_PROMPT_EXPLANATION",
        }
    }

    /// Environment variable overriding this purpose's model.
    pub fn model_env_var(&self) -> &'static str {
        match self {
            Self::SkeletonGeneration => "STORYLOOM_MODEL_SKELETON",
            Self::StoryContinuation => "STORYLOOM_MODEL_CONTINUATION",
            Self::StoryEnding => "STORYLOOM_MODEL_ENDING",
            Self::TextExplanation => "STORYLOOM_MODEL_EXPLANATION",
        }
    }

    /// Placeholders the template must contain to be usable.
    pub fn required_placeholders(&self) -> &'static [&'static str] {
        match self {
            Self::SkeletonGeneration => &["{genre}", "{cefr_level}"],
            Self::StoryContinuation => &[
                "{skeleton}",
                "{background}",
                "{progress}",
                "{milestone}",
                "{decisions_made}",
                "{cefr_level}",
                "{decision_point}",
            ],
            Self::StoryEnding => &["{decisions_made}", "{skeleton}", "{progress}", "{cefr_level}"],
            Self::TextExplanation => &["{selected_text}", "{context_text}"],
        }
    }

    fn default_template(&self) -> &'static str {
        match self {
            Self::SkeletonGeneration => defaults::SKELETON_PROMPT,
            Self::StoryContinuation => defaults::CONTINUATION_PROMPT,
            Self::StoryEnding => defaults::ENDING_PROMPT,
            Self::TextExplanation => defaults::EXPLANATION_PROMPT,
        }
    }
}

impl std::fmt::Display for GenerationPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved settings for one purpose.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub model: String,
    pub temperature: f32,
    pub template: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{purpose} template must include the {placeholder} placeholder")]
    MissingPlaceholder {
        purpose: GenerationPurpose,
        placeholder: &'static str,
    },
}

/// All purposes' settings, resolved once at startup.
#[derive(Debug)]
pub struct GenerationConfig {
    settings: HashMap<GenerationPurpose, GenerationSettings>,
}

impl GenerationConfig {
    const DEFAULT_TEMPERATURE: f32 = 0.7;

    /// Resolve settings from defaults + environment overrides.
    ///
    /// `default_model` is used for any purpose without a per-purpose model
    /// override.
    pub fn from_env(default_model: &str) -> Result<Self, ConfigError> {
        let mut settings = HashMap::new();
        for purpose in GenerationPurpose::ALL {
            let template = std::env::var(purpose.template_env_var())
                .unwrap_or_else(|_| purpose.default_template().to_string());
            validate_template(purpose, &template)?;
            let model = std::env::var(purpose.model_env_var())
                .unwrap_or_else(|_| default_model.to_string());
            settings.insert(
                purpose,
                GenerationSettings {
                    model,
                    temperature: Self::DEFAULT_TEMPERATURE,
                    template,
                },
            );
        }
        Ok(Self { settings })
    }

    /// Settings wired to the scripted fake's per-purpose model names.
    pub fn fake() -> Self {
        let mut settings = HashMap::new();
        for purpose in GenerationPurpose::ALL {
            let model = match purpose {
                GenerationPurpose::SkeletonGeneration => fake_llm::FAKE_SKELETON_MODEL,
                GenerationPurpose::StoryContinuation => fake_llm::FAKE_CONTINUATION_MODEL,
                GenerationPurpose::StoryEnding => fake_llm::FAKE_ENDING_MODEL,
                GenerationPurpose::TextExplanation => fake_llm::FAKE_EXPLANATION_MODEL,
            };
            settings.insert(
                purpose,
                GenerationSettings {
                    model: model.to_string(),
                    temperature: Self::DEFAULT_TEMPERATURE,
                    template: purpose.default_template().to_string(),
                },
            );
        }
        Self { settings }
    }

    pub fn settings(&self, purpose: GenerationPurpose) -> &GenerationSettings {
        // Every purpose is populated by both constructors.
        &self.settings[&purpose]
    }
}

fn validate_template(purpose: GenerationPurpose, template: &str) -> Result<(), ConfigError> {
    for placeholder in purpose.required_placeholders() {
        if !template.contains(placeholder) {
            return Err(ConfigError::MissingPlaceholder {
                purpose,
                placeholder,
            });
        }
    }
    Ok(())
}

/// Default prompt templates.
pub mod defaults {
    pub const SKELETON_PROMPT: &str = r#"You are a story architect for an interactive fiction game aimed at language learners.

Design the complete skeleton of a branching {genre} story written for CEFR level {cefr_level}.
Opening scene to honor (may be empty): {scene_text}
Extra details from the player (may be empty): {details}

Respond with a single JSON object and nothing else, in exactly this shape:
{
  "story_background": "...",
  "milestones": [
    {
      "milestone_id": "M1",
      "description": "...",
      "decision_points": [
        {
          "decision_point_id": "M1.D1",
          "description": "...",
          "options": [
            {"option_id": "M1.D1.O1", "option_name": "...", "consequence": "..."}
          ]
        }
      ]
    }
  ],
  "endings": [
    {"ending_id": "E1", "description": "..."}
  ]
}

Use 3 to 5 milestones, one decision point per milestone, and 2 to 3 options
per decision point. Ids must follow the M<n>.D<n>.O<n> pattern shown above."#;

    pub const CONTINUATION_PROMPT: &str = r#"You are narrating an interactive {cefr_level}-level story, one segment at a time.

STORY SKELETON:
{skeleton}

BACKGROUND:
{background}

STORY SO FAR:
{progress}

MOST RECENT DECISION:
{decisions_made}

CURRENT MILESTONE:
{milestone}

Write the next story segment in language appropriate for CEFR level {cefr_level}.
The segment must flow from the most recent decision and end exactly at this
decision point, without resolving it:
{decision_point}

Do not list the options; the interface presents them. Respond with the
segment text only."#;

    pub const ENDING_PROMPT: &str = r#"You are concluding an interactive {cefr_level}-level story.

STORY SKELETON:
{skeleton}

STORY SO FAR:
{progress}

FINAL DECISION MADE:
{decisions_made}

Write the story's ending in language appropriate for CEFR level {cefr_level},
consistent with the journey above and with one of the skeleton's endings.
Respond with the ending text only."#;

    pub const EXPLANATION_PROMPT: &str = r#"A language learner reading a story selected this text:

{selected_text}

It appears in this context:

{context_text}

Explain the selected text in simple terms: its meaning here, and any idioms
or grammar worth noting. Keep the explanation short."#;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_templates_carry_their_required_placeholders() {
        for purpose in GenerationPurpose::ALL {
            validate_template(purpose, purpose.default_template())
                .unwrap_or_else(|e| panic!("{purpose} default template invalid: {e}"));
        }
    }

    #[test]
    fn template_missing_a_placeholder_is_rejected() {
        let err = validate_template(GenerationPurpose::TextExplanation, "explain {selected_text}")
            .expect_err("incomplete template");
        assert!(err.to_string().contains("{context_text}"));
    }

    #[test]
    fn fake_config_routes_each_purpose_to_its_fake_model() {
        let config = GenerationConfig::fake();
        assert_eq!(
            config
                .settings(GenerationPurpose::SkeletonGeneration)
                .model,
            fake_llm::FAKE_SKELETON_MODEL
        );
        assert_eq!(
            config.settings(GenerationPurpose::StoryEnding).model,
            fake_llm::FAKE_ENDING_MODEL
        );
    }
}
