use crate::{
    due, Card, CardEdit, CardId, CardUpdate, CoreError, Deck, DeckId, DeckSummary, NewCard,
    Review,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub mod memory;

/// Storage for decks, cards and review logs.
///
/// `grade_card` is the only read-modify-write the scheduler needs; each
/// implementation must serialize it per card so concurrent grading of the
/// same card cannot lose an update.
#[async_trait]
pub trait Repository: Send + Sync {
    // Decks
    async fn create_deck(&self, owner_id: &str, name: &str) -> Result<Deck, CoreError>;
    async fn get_deck(&self, id: DeckId) -> Result<Deck, CoreError>;
    async fn list_decks(&self, owner_id: Option<&str>) -> Result<Vec<Deck>, CoreError>;
    /// Removes the deck together with its cards and their reviews.
    async fn delete_deck(&self, id: DeckId) -> Result<Deck, CoreError>;

    // Cards
    async fn add_card(&self, deck_id: DeckId, content: &NewCard) -> Result<Card, CoreError>;
    async fn get_card(&self, id: CardId) -> Result<Card, CoreError>;
    /// Cards in ascending id order, optionally restricted to one deck.
    async fn list_cards(&self, deck_id: Option<DeckId>) -> Result<Vec<Card>, CoreError>;
    async fn update_card(&self, card: &Card) -> Result<Card, CoreError>;
    async fn edit_card(&self, id: CardId, edit: &CardEdit) -> Result<Card, CoreError>;
    async fn delete_card(&self, id: CardId) -> Result<(), CoreError>;

    // Scheduling
    /// Records a grading event and applies the scheduler as one update.
    async fn grade_card(
        &self,
        id: CardId,
        label: &str,
        now: DateTime<Utc>,
    ) -> Result<Card, CoreError>;

    async fn due_cards(&self, deck_id: DeckId, now: DateTime<Utc>) -> Result<Vec<Card>, CoreError> {
        self.get_deck(deck_id).await?;
        let cards = self.list_cards(Some(deck_id)).await?;
        Ok(due::due_cards(&cards, now))
    }

    async fn count_due(&self, deck_id: DeckId, now: DateTime<Utc>) -> Result<usize, CoreError> {
        self.get_deck(deck_id).await?;
        let cards = self.list_cards(Some(deck_id)).await?;
        Ok(due::count_due(&cards, now))
    }

    async fn deck_summary(
        &self,
        deck_id: DeckId,
        now: DateTime<Utc>,
    ) -> Result<DeckSummary, CoreError> {
        self.get_deck(deck_id).await?;
        let cards = self.list_cards(Some(deck_id)).await?;
        Ok(DeckSummary::of(&cards, now))
    }

    // Reviews
    async fn list_reviews_for_card(&self, card_id: CardId) -> Result<Vec<Review>, CoreError>;
}

/// Dispatches a decoded card update to the matching store operation.
pub async fn apply_update<R: Repository + ?Sized>(
    repo: &R,
    id: CardId,
    update: CardUpdate,
    now: DateTime<Utc>,
) -> Result<Card, CoreError> {
    match update {
        CardUpdate::EditFront(front) => {
            let edit = CardEdit {
                front: Some(front),
                back: None,
            };
            repo.edit_card(id, &edit).await
        }
        CardUpdate::EditBack(back) => {
            let edit = CardEdit {
                front: None,
                back: Some(back),
            };
            repo.edit_card(id, &edit).await
        }
        CardUpdate::Grade(label) => {
            let card = repo.grade_card(id, &label, now).await?;
            tracing::info!(
                card_id = %card.id,
                grade = label.trim(),
                interval_days = card.interval_days,
                ease_factor = card.ease_factor,
                due_at = %card.due_at,
                "card graded"
            );
            Ok(card)
        }
    }
}

/// Trimmed deck name, rejecting blank names.
pub fn checked_deck_name(name: &str) -> Result<&str, CoreError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CoreError::Invalid("deck name is empty"));
    }
    Ok(name)
}
