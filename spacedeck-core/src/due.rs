use crate::Card;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Every card with `due_at <= now`, ordered by ascending id.
pub fn due_cards(cards: &[Card], now: DateTime<Utc>) -> Vec<Card> {
    let mut v: Vec<Card> = cards.iter().filter(|c| c.is_due(now)).cloned().collect();
    sort_by_id(&mut v);
    v
}

pub fn count_due(cards: &[Card], now: DateTime<Utc>) -> usize {
    cards.iter().filter(|c| c.is_due(now)).count()
}

/// All cards, no due filter, ordered by ascending id.
pub fn all_cards(cards: &[Card]) -> Vec<Card> {
    let mut v = cards.to_vec();
    sort_by_id(&mut v);
    v
}

/// Splits cards into (due, not yet due), both in ascending id order.
pub fn partition_due(cards: &[Card], now: DateTime<Utc>) -> (Vec<Card>, Vec<Card>) {
    let (mut due, mut later): (Vec<Card>, Vec<Card>) =
        cards.iter().cloned().partition(|c| c.is_due(now));
    sort_by_id(&mut due);
    sort_by_id(&mut later);
    (due, later)
}

pub fn sort_by_id(cards: &mut [Card]) {
    cards.sort_by_key(|c| c.id);
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeckSummary {
    pub total_cards: usize,
    pub due_cards: usize,
}

impl DeckSummary {
    pub fn of(cards: &[Card], now: DateTime<Utc>) -> Self {
        Self {
            total_cards: cards.len(),
            due_cards: count_due(cards, now),
        }
    }
}
