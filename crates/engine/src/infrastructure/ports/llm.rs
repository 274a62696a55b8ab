//! The unified generation capability port.
//!
//! Every generation step - continuation, ending, skeleton tree, text
//! explanation - goes through one interface returning a lazy sequence of
//! text fragments. Non-streaming providers return a singleton stream, so
//! the engine's persistence and event logic is written once.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::stream::Stream;
use futures_util::StreamExt;

use super::error::LlmError;

/// A lazy sequence of generated text fragments whose concatenation is the
/// full result.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// One generation invocation: a fully rendered prompt plus the configured
/// model parameters.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// The rendered prompt text.
    pub prompt: String,
    /// Provider model identifier (e.g. "gpt-4o-mini").
    pub model: String,
    /// Sampling temperature (0.0 - 2.0).
    pub temperature: f32,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            temperature,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LlmPort: Send + Sync {
    /// Start a generation and return its fragment stream.
    async fn generate_stream(&self, request: GenerationRequest) -> Result<TokenStream, LlmError>;
}

/// Drain a fragment stream into the complete text, forwarding each fragment
/// through `fragments` as it arrives. A dropped receiver loses the in-flight
/// fragments without failing the generation.
pub async fn collect_text(
    mut stream: TokenStream,
    fragments: Option<&tokio::sync::mpsc::UnboundedSender<String>>,
) -> Result<String, LlmError> {
    let mut text = String::new();
    while let Some(fragment) = stream.next().await {
        let fragment = fragment?;
        if let Some(sender) = fragments {
            // Client gone is not an error; the turn still completes.
            let _ = sender.send(fragment.clone());
        }
        text.push_str(&fragment);
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    fn stream_of(fragments: Vec<Result<String, LlmError>>) -> TokenStream {
        Box::pin(stream::iter(fragments))
    }

    #[tokio::test]
    async fn collect_concatenates_fragments_in_order() {
        let stream = stream_of(vec![
            Ok("The docks ".to_string()),
            Ok("are silent.".to_string()),
        ]);
        let text = collect_text(stream, None).await.expect("collects");
        assert_eq!(text, "The docks are silent.");
    }

    #[tokio::test]
    async fn collect_forwards_fragments_as_they_arrive() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let stream = stream_of(vec![Ok("a".to_string()), Ok("b".to_string())]);
        collect_text(stream, Some(&tx)).await.expect("collects");
        drop(tx);

        let mut forwarded = Vec::new();
        while let Some(fragment) = rx.recv().await {
            forwarded.push(fragment);
        }
        assert_eq!(forwarded, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn collect_surfaces_mid_stream_failure() {
        let stream = stream_of(vec![
            Ok("partial".to_string()),
            Err(LlmError::RequestFailed("connection reset".into())),
        ]);
        let err = collect_text(stream, None).await.expect_err("fails");
        assert!(matches!(err, LlmError::RequestFailed(_)));
    }

    #[tokio::test]
    async fn dropped_receiver_does_not_fail_collection() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        drop(rx);
        let stream = stream_of(vec![Ok("a".to_string())]);
        let text = collect_text(stream, Some(&tx)).await.expect("collects");
        assert_eq!(text, "a");
    }
}
