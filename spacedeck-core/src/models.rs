use crate::CoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub type DeckId = Uuid;
pub type CardId = Uuid;
pub type ReviewId = Uuid;
pub type OwnerId = String;

pub const EF_MIN: f64 = 1.3;
pub const EF_DEFAULT: f64 = 2.5;

/// Self-reported recall quality, ordered worst to best.
///
/// Level 2 is reserved by the SM-2 scale and has no label, so it has no
/// variant either.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Grade {
    Again,
    Hard,
    Medium,
    Easy,
    VeryEasy,
}

impl Grade {
    /// Lowest level counted as a successful recall.
    pub const PASSING_LEVEL: u8 = 3;

    pub const ALL: [Grade; 5] = [
        Grade::Again,
        Grade::Hard,
        Grade::Medium,
        Grade::Easy,
        Grade::VeryEasy,
    ];

    pub fn level(self) -> u8 {
        match self {
            Grade::Again => 0,
            Grade::Hard => 1,
            Grade::Medium => 3,
            Grade::Easy => 4,
            Grade::VeryEasy => 5,
        }
    }

    pub fn from_level(level: u8) -> Option<Grade> {
        match level {
            0 => Some(Grade::Again),
            1 => Some(Grade::Hard),
            3 => Some(Grade::Medium),
            4 => Some(Grade::Easy),
            5 => Some(Grade::VeryEasy),
            _ => None,
        }
    }

    /// Canonical label shown to users.
    pub fn label(self) -> &'static str {
        match self {
            Grade::Again => "Review again!",
            Grade::Hard => "Hard",
            Grade::Medium => "Medium",
            Grade::Easy => "Easy",
            Grade::VeryEasy => "Very Easy",
        }
    }

    /// Maps a submitted label to its grade. Matching is exact apart from
    /// surrounding whitespace.
    pub fn from_label(label: &str) -> Result<Grade, CoreError> {
        match label.trim() {
            "Too hard/review again!" | "Review again!" => Ok(Grade::Again),
            "Hard" => Ok(Grade::Hard),
            "Medium" => Ok(Grade::Medium),
            "Easy" => Ok(Grade::Easy),
            "Very Easy" => Ok(Grade::VeryEasy),
            _ => Err(CoreError::InvalidGrade(label.to_string())),
        }
    }

    pub fn is_passing(self) -> bool {
        self.level() >= Self::PASSING_LEVEL
    }
}

impl FromStr for Grade {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Grade::from_label(s)
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Where a card sits in its review lifecycle, derived from `repetitions`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    New,
    Learning,
    Reviewing,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Deck {
    pub id: DeckId,
    pub name: String,
    pub owner_id: OwnerId,
    pub created_at: DateTime<Utc>,
}

impl Deck {
    pub fn new(owner_id: impl Into<OwnerId>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            owner_id: owner_id.into(),
            created_at: Utc::now(),
        }
    }
}

/// Content for a card about to be created.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewCard {
    pub front: String,
    pub back: String,
    #[serde(default)]
    pub language: Option<String>,
}

impl NewCard {
    pub fn new(front: impl Into<String>, back: impl Into<String>) -> Self {
        Self {
            front: front.into(),
            back: back.into(),
            language: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Card {
    pub id: CardId,
    pub deck_id: DeckId,
    pub front: String,
    pub back: String,
    pub language: Option<String>,

    // scheduling state
    pub difficulty_level: u8,
    pub repetitions: u32,
    pub ease_factor: f64,
    pub interval_days: u32,
    pub due_at: DateTime<Utc>,

    // review history
    pub total_reviews: u64,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub last_grade_label: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl Card {
    pub fn new(deck_id: DeckId, content: NewCard) -> Self {
        Self::new_at(deck_id, content, Utc::now())
    }

    /// A fresh card created at `now`, due immediately.
    pub fn new_at(deck_id: DeckId, content: NewCard, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            deck_id,
            front: content.front,
            back: content.back,
            language: content.language,
            difficulty_level: 0,
            repetitions: 0,
            ease_factor: EF_DEFAULT,
            interval_days: 0,
            due_at: now,
            total_reviews: 0,
            last_reviewed_at: None,
            last_grade_label: None,
            created_at: now,
        }
    }

    pub fn stage(&self) -> Stage {
        match self.repetitions {
            0 => Stage::New,
            1 => Stage::Learning,
            _ => Stage::Reviewing,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.due_at <= now
    }
}

/// One grading event as it was applied to a card.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Review {
    pub id: ReviewId,
    pub card_id: CardId,
    pub grade: Grade,
    pub reviewed_at: DateTime<Utc>,
    pub interval_days: u32,
    pub ease_factor: f64,
}

impl Review {
    pub fn new(
        card_id: CardId,
        grade: Grade,
        reviewed_at: DateTime<Utc>,
        interval_days: u32,
        ease_factor: f64,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            card_id,
            grade,
            reviewed_at,
            interval_days,
            ease_factor,
        }
    }
}
