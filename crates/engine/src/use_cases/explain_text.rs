//! Text explanation use case - a linear request/response flow.
//!
//! Create the pending record first so the client gets an id to correlate
//! stream fragments with, then run the generation and persist the final
//! text (or the failure).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use storyloom_domain::{Explanation, ExplanationStatus, StoryId};

use crate::generation::{GenerationConfig, GenerationPurpose};
use crate::infrastructure::ports::{
    collect_text, ClockPort, ExplanationRepo, GenerationRequest, LlmError, LlmPort, RepoError,
};
use crate::prompt;

#[derive(Debug, thiserror::Error)]
pub enum ExplanationError {
    #[error("selected_text and context_text are required")]
    MissingInput,
    #[error("Generation failed: {0}")]
    Generation(#[from] LlmError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

pub struct ExplainText {
    explanations: Arc<dyn ExplanationRepo>,
    llm: Arc<dyn LlmPort>,
    config: Arc<GenerationConfig>,
    clock: Arc<dyn ClockPort>,
}

impl ExplainText {
    pub fn new(
        explanations: Arc<dyn ExplanationRepo>,
        llm: Arc<dyn LlmPort>,
        config: Arc<GenerationConfig>,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        Self {
            explanations,
            llm,
            config,
            clock,
        }
    }

    /// Create and persist the pending explanation record.
    pub async fn create(
        &self,
        story_id: StoryId,
        selected_text: &str,
        context_text: &str,
    ) -> Result<Explanation, ExplanationError> {
        if selected_text.trim().is_empty() || context_text.trim().is_empty() {
            return Err(ExplanationError::MissingInput);
        }
        let explanation = Explanation::new(story_id, selected_text, context_text, self.clock.now());
        self.explanations.save(&explanation).await?;
        Ok(explanation)
    }

    /// Generate the explanation text, streaming fragments as they arrive.
    pub async fn run(
        &self,
        mut explanation: Explanation,
        fragments: Option<UnboundedSender<String>>,
    ) -> Result<Explanation, ExplanationError> {
        explanation.status = ExplanationStatus::Streaming;
        self.explanations.save(&explanation).await?;

        let settings = self.config.settings(GenerationPurpose::TextExplanation);
        let mut params = HashMap::new();
        params.insert("selected_text", explanation.selected_text.clone());
        params.insert("context_text", explanation.context_text.clone());
        let prompt_text = prompt::render_template(&settings.template, &params);

        let result = match self
            .llm
            .generate_stream(GenerationRequest::new(
                prompt_text,
                settings.model.clone(),
                settings.temperature,
            ))
            .await
        {
            Ok(stream) => collect_text(stream, fragments.as_ref()).await,
            Err(error) => Err(error),
        };

        match result {
            Ok(text) => {
                explanation.explanation = text;
                explanation.status = ExplanationStatus::Completed;
                self.explanations.save(&explanation).await?;
                Ok(explanation)
            }
            Err(error) => {
                explanation.status = ExplanationStatus::Failed;
                explanation.error = error.to_string();
                if let Err(save_error) = self.explanations.save(&explanation).await {
                    tracing::error!(
                        explanation_id = %explanation.id,
                        error = %save_error,
                        "Failed to persist explanation failure"
                    );
                }
                Err(error.into())
            }
        }
    }
}
