use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use spacedeck_core::{Card, Deck, DeckSummary, Stage};
use uuid::Uuid;

#[derive(Serialize)]
pub struct DeckOut {
    pub id: Uuid,
    pub name: String,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    pub num_total_cards: usize,
    pub num_cards_up_for_review: usize,
}

impl DeckOut {
    pub fn new(d: Deck, summary: DeckSummary) -> Self {
        Self {
            id: d.id,
            name: d.name,
            owner_id: d.owner_id,
            created_at: d.created_at,
            num_total_cards: summary.total_cards,
            num_cards_up_for_review: summary.due_cards,
        }
    }
}

#[derive(Serialize)]
pub struct CardOut {
    pub id: Uuid,
    pub deck_id: Uuid,
    pub front: String,
    pub back: String,
    pub language: Option<String>,
    pub stage: Stage,
    pub difficulty_level: u8,
    pub repetitions: u32,
    pub ease_factor: f64,
    pub interval_days: u32,
    pub due_at: DateTime<Utc>,
    pub total_reviews: u64,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub last_grade_label: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Card> for CardOut {
    fn from(c: Card) -> Self {
        Self {
            stage: c.stage(),
            id: c.id,
            deck_id: c.deck_id,
            front: c.front,
            back: c.back,
            language: c.language,
            difficulty_level: c.difficulty_level,
            repetitions: c.repetitions,
            ease_factor: c.ease_factor,
            interval_days: c.interval_days,
            due_at: c.due_at,
            total_reviews: c.total_reviews,
            last_reviewed_at: c.last_reviewed_at,
            last_grade_label: c.last_grade_label,
            created_at: c.created_at,
        }
    }
}

#[derive(Deserialize)]
pub struct NewDeckIn {
    pub deck_name: String,
}

#[derive(Deserialize)]
pub struct DueQuery {
    /// Evaluation instant; defaults to the server clock.
    pub now: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct CountOut {
    pub count: usize,
}
