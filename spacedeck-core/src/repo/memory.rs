use crate::{
    due, history, repo::checked_deck_name, Card, CardEdit, CardId, CoreError, Deck, DeckId,
    NewCard, Review,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Default)]
pub struct MemoryRepo {
    decks: RwLock<HashMap<DeckId, Deck>>,
    cards: RwLock<HashMap<CardId, Card>>,
    reviews: RwLock<HashMap<CardId, Vec<Review>>>,
}

impl MemoryRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl crate::repo::Repository for MemoryRepo {
    async fn create_deck(&self, owner_id: &str, name: &str) -> Result<Deck, CoreError> {
        let name = checked_deck_name(name)?;
        let mut m = self.decks.write();
        if m
            .values()
            .any(|d| d.owner_id == owner_id && d.name.eq_ignore_ascii_case(name))
        {
            return Err(CoreError::Conflict("deck name already exists"));
        }
        let deck = Deck::new(owner_id, name);
        m.insert(deck.id, deck.clone());
        Ok(deck)
    }

    async fn get_deck(&self, id: DeckId) -> Result<Deck, CoreError> {
        self.decks
            .read()
            .get(&id)
            .cloned()
            .ok_or(CoreError::NotFound("deck"))
    }

    async fn list_decks(&self, owner_id: Option<&str>) -> Result<Vec<Deck>, CoreError> {
        let mut v: Vec<Deck> = self
            .decks
            .read()
            .values()
            .filter(|d| owner_id.map_or(true, |o| d.owner_id == o))
            .cloned()
            .collect();
        v.sort_by_key(|d| d.id);
        Ok(v)
    }

    async fn delete_deck(&self, id: DeckId) -> Result<Deck, CoreError> {
        let deck = self
            .decks
            .write()
            .remove(&id)
            .ok_or(CoreError::NotFound("deck"))?;
        let mut cards = self.cards.write();
        let mut reviews = self.reviews.write();
        cards.retain(|cid, c| {
            let keep = c.deck_id != id;
            if !keep {
                reviews.remove(cid);
            }
            keep
        });
        Ok(deck)
    }

    async fn add_card(&self, deck_id: DeckId, content: &NewCard) -> Result<Card, CoreError> {
        if !self.decks.read().contains_key(&deck_id) {
            return Err(CoreError::NotFound("deck"));
        }
        let card = Card::new(deck_id, content.clone());
        self.cards.write().insert(card.id, card.clone());
        Ok(card)
    }

    async fn get_card(&self, id: CardId) -> Result<Card, CoreError> {
        self.cards
            .read()
            .get(&id)
            .cloned()
            .ok_or(CoreError::NotFound("card"))
    }

    async fn list_cards(&self, deck_id: Option<DeckId>) -> Result<Vec<Card>, CoreError> {
        let mut v: Vec<Card> = self.cards.read().values().cloned().collect();
        if let Some(did) = deck_id {
            v.retain(|c| c.deck_id == did);
        }
        due::sort_by_id(&mut v);
        Ok(v)
    }

    async fn update_card(&self, card: &Card) -> Result<Card, CoreError> {
        let mut m = self.cards.write();
        if !m.contains_key(&card.id) {
            return Err(CoreError::NotFound("card"));
        }
        m.insert(card.id, card.clone());
        Ok(card.clone())
    }

    async fn edit_card(&self, id: CardId, edit: &CardEdit) -> Result<Card, CoreError> {
        let mut m = self.cards.write();
        let Some(card) = m.get_mut(&id) else {
            return Err(CoreError::NotFound("card"));
        };
        if let Some(front) = &edit.front {
            card.front = front.clone();
        }
        if let Some(back) = &edit.back {
            card.back = back.clone();
        }
        Ok(card.clone())
    }

    async fn delete_card(&self, id: CardId) -> Result<(), CoreError> {
        let mut cards = self.cards.write();
        cards.remove(&id).ok_or(CoreError::NotFound("card"))?;
        self.reviews.write().remove(&id);
        Ok(())
    }

    async fn grade_card(
        &self,
        id: CardId,
        label: &str,
        now: DateTime<Utc>,
    ) -> Result<Card, CoreError> {
        // Cards write lock spans load, transition, store and the log append.
        let mut m = self.cards.write();
        let card = m.get(&id).cloned().ok_or(CoreError::NotFound("card"))?;
        let outcome = history::review(card, label, now)?;
        m.insert(id, outcome.updated_card.clone());
        self.reviews
            .write()
            .entry(id)
            .or_default()
            .push(outcome.review);
        Ok(outcome.updated_card)
    }

    async fn list_reviews_for_card(&self, card_id: CardId) -> Result<Vec<Review>, CoreError> {
        Ok(self
            .reviews
            .read()
            .get(&card_id)
            .cloned()
            .unwrap_or_default())
    }
}
