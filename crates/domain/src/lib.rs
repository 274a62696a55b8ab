pub mod error;
pub mod explanation;
pub mod ids;
pub mod progress;
pub mod skeleton;
pub mod state;
pub mod story;

pub use error::DomainError;
pub use explanation::{Explanation, ExplanationStatus};
pub use ids::{ExplanationId, ProgressEntryId, StoryId};
pub use progress::{OfferedOption, ProgressEntry};
pub use skeleton::{
    DecisionOption, DecisionPoint, Ending, Milestone, Skeleton, SkeletonIndex, SkeletonStatus,
    SkeletonTree,
};
pub use state::{NarrativeState, StoryStep};
pub use story::{CefrLevel, Story, StoryStatus};
