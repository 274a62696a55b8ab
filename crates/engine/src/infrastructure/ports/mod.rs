//! Port traits for infrastructure boundaries.
//!
//! These are the only abstractions in the engine. Everything else is
//! concrete types. Ports exist for:
//! - Persistence (stories, skeletons, progress entries, explanations -
//!   in-memory by default, a real store plugs in here)
//! - LLM calls (could swap the OpenAI-compatible client for another
//!   provider)
//! - Progress notifications (could swap the in-process broadcast for a
//!   channel layer)
//! - Clock (for testing)

mod error;
mod llm;
mod notify;
mod repos;
mod testing;

pub use error::{LlmError, NotifyError, RepoError};
pub use llm::{collect_text, GenerationRequest, LlmPort, TokenStream};
pub use notify::{SkeletonEvent, StoryNotifier};
pub use repos::{ExplanationRepo, ProgressRepo, SkeletonRepo, StoryRepo};
pub use testing::ClockPort;

#[cfg(test)]
pub use llm::MockLlmPort;
#[cfg(test)]
pub use notify::MockStoryNotifier;
#[cfg(test)]
pub use repos::{MockExplanationRepo, MockProgressRepo, MockSkeletonRepo, MockStoryRepo};
#[cfg(test)]
pub use testing::MockClockPort;
