pub mod advance_story;
pub mod explain_text;
pub mod generate_skeleton;
pub mod record_choice;

pub use advance_story::{AdvanceStory, ProgressionError, TurnOutcome};
pub use explain_text::{ExplainText, ExplanationError};
pub use generate_skeleton::{GenerateSkeleton, SkeletonGenError, SkeletonOutcome};
pub use record_choice::{ChoiceError, RecordChoice};
