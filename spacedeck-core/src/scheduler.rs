//! SM-2 scheduling transitions.
//!
//! A passing grade (level 3 and up) grows the interval 1 → 6 → `I × E` and
//! adjusts the ease factor by the SM-2 delta. A failing grade resets the
//! repetition count and leaves the ease factor alone. "Again" (level 0) makes
//! the card due immediately, "Hard" (level 1) schedules it for tomorrow.
//!
//! Intervals past the second repetition are rounded half-to-even, so
//! `5 × 2.5 = 12.5` becomes 12.

use crate::{Card, CoreError, Grade, EF_MIN};
use chrono::{DateTime, Duration, Utc};

/// Applies a grade, given by its user-facing label, to a card.
///
/// Only the scheduling fields are touched; see [`crate::history::review`]
/// for the full grading event including history.
pub fn apply_grade(card: Card, label: &str, now: DateTime<Utc>) -> Result<Card, CoreError> {
    let grade = Grade::from_label(label)?;
    schedule(card, grade, now)
}

pub fn schedule(mut card: Card, grade: Grade, now: DateTime<Utc>) -> Result<Card, CoreError> {
    let level = grade.level();

    let (repetitions, interval, ease) = if grade.is_passing() {
        let interval = next_interval(card.repetitions, card.interval_days, card.ease_factor)?;
        (
            card.repetitions.saturating_add(1),
            interval,
            next_ease(card.ease_factor, level),
        )
    } else {
        let interval = if grade == Grade::Again { 0 } else { 1 };
        (0, interval, card.ease_factor)
    };

    if !ease.is_finite() || ease < EF_MIN {
        tracing::error!(card_id = %card.id, ease, "ease factor below minimum");
        return Err(CoreError::InvariantViolation("ease factor below minimum"));
    }

    let due_at = Duration::try_days(i64::from(interval))
        .and_then(|d| now.checked_add_signed(d))
        .ok_or_else(|| {
            tracing::error!(card_id = %card.id, interval, "due date out of range");
            CoreError::InvariantViolation("due date out of range")
        })?;

    card.repetitions = repetitions;
    card.interval_days = interval;
    card.ease_factor = ease;
    card.due_at = due_at;
    card.difficulty_level = level;
    Ok(card)
}

/// Interval for a passing grade, computed from the state before the
/// repetition count is bumped.
pub fn next_interval(repetitions: u32, interval: u32, ease: f64) -> Result<u32, CoreError> {
    match repetitions {
        0 => Ok(1),
        1 => Ok(6),
        _ => {
            let grown = (f64::from(interval) * ease).round_ties_even();
            if !grown.is_finite() || grown < 0.0 || grown > f64::from(u32::MAX) {
                return Err(CoreError::InvariantViolation("interval out of range"));
            }
            Ok(grown as u32)
        }
    }
}

pub fn next_ease(ease: f64, level: u8) -> f64 {
    let miss = 5.0 - f64::from(level);
    let ef = ease + (0.1 - miss * (0.08 + miss * 0.02));
    if ef < EF_MIN {
        EF_MIN
    } else {
        ef
    }
}
