//! Story entity and its lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{DomainError, StoryId};

/// CEFR language-proficiency level, forwarded opaquely into generation
/// prompts to set the narrative's language difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CefrLevel {
    #[default]
    A1,
    A2,
    B1,
    B2,
    C1,
    C2,
}

impl CefrLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A1 => "A1",
            Self::A2 => "A2",
            Self::B1 => "B1",
            Self::B2 => "B2",
            Self::C1 => "C1",
            Self::C2 => "C2",
        }
    }
}

impl std::fmt::Display for CefrLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CefrLevel {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A1" => Ok(Self::A1),
            "A2" => Ok(Self::A2),
            "B1" => Ok(Self::B1),
            "B2" => Ok(Self::B2),
            "C1" => Ok(Self::C1),
            "C2" => Ok(Self::C2),
            other => Err(DomainError::validation(format!(
                "unknown CEFR level: {other}"
            ))),
        }
    }
}

/// Story lifecycle, set by the progression engine after each turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StoryStatus {
    #[default]
    Init,
    InProgress,
    Completed,
    Abandoned,
}

impl StoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Abandoned => "ABANDONED",
        }
    }

    /// Terminal stories accept no further turns.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Abandoned)
    }
}

/// A playthrough: genre and level seeds plus the lifecycle status. The
/// skeleton and progress entries hang off the story by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
    pub id: StoryId,
    pub title: String,
    pub genre: String,
    pub cefr_level: CefrLevel,
    /// Opening scene seed fed to skeleton generation.
    pub scene_text: String,
    /// Extra user-provided details fed to skeleton generation.
    pub details: String,
    pub status: StoryStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Story {
    pub fn new(
        title: impl Into<String>,
        genre: impl Into<String>,
        cefr_level: CefrLevel,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: StoryId::new(),
            title: title.into(),
            genre: genre.into(),
            cefr_level,
            scene_text: String::new(),
            details: String::new(),
            status: StoryStatus::Init,
            created_at,
            updated_at: created_at,
        }
    }

    pub fn with_scene(mut self, scene_text: impl Into<String>) -> Self {
        self.scene_text = scene_text.into();
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }

    /// Callers must check this before invoking a turn; the engine rejects
    /// terminal stories with an error.
    pub fn can_advance(&self) -> bool {
        !self.status.is_terminal()
    }
}
