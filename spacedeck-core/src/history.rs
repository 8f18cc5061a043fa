use crate::{scheduler, Card, CoreError, Grade, Review};
use chrono::{DateTime, Utc};

#[derive(Clone, Debug)]
pub struct ScheduleOutcome {
    pub updated_card: Card,
    pub review: Review,
}

/// Bumps the lifetime review count and remembers when and how the card was
/// last graded. The label is not validated here.
pub fn record_review(mut card: Card, label: &str, now: DateTime<Utc>) -> Card {
    card.total_reviews += 1;
    card.last_reviewed_at = Some(now);
    card.last_grade_label = Some(label.trim().to_string());
    card
}

/// A complete grading event: history bookkeeping followed by the scheduling
/// transition. Fails before touching any field if the label is unknown.
pub fn review(card: Card, label: &str, now: DateTime<Utc>) -> Result<ScheduleOutcome, CoreError> {
    let grade = Grade::from_label(label)?;
    let card = record_review(card, label, now);
    let card = scheduler::schedule(card, grade, now)?;

    let review = Review::new(card.id, grade, now, card.interval_days, card.ease_factor);
    Ok(ScheduleOutcome {
        updated_card: card,
        review,
    })
}
