use chrono::{DateTime, Utc};
use spacedeck_core::{
    history, repo::checked_deck_name, repo::Repository, Card, CardEdit, CardId, CoreError, Deck,
    DeckId, DeckSummary, Grade, NewCard, Review,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;

/// How often a grading update is retried after losing a race on the same card.
const GRADE_ATTEMPTS: usize = 5;

const CARD_COLUMNS: &str = "id,deck_id,front,back,language,difficulty_level,repetitions,\
     ease_factor,interval_days,due_at,total_reviews,last_reviewed_at,last_grade_label,created_at";

pub struct SqliteRepo {
    pool: SqlitePool,
}

impl SqliteRepo {
    pub async fn open_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let opts = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, path = %path.as_ref().display(), "sqlite connect failed");
                CoreError::Storage("sqlite connect")
            })?;
        let repo = Self { pool };
        repo.ensure_schema().await?;
        Ok(repo)
    }

    pub async fn open_memory() -> Result<Self, CoreError> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|_| CoreError::Storage("sqlite connect"))?
            .foreign_keys(true);
        // Every connection to :memory: is its own database, so keep exactly one alive.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await
            .map_err(|_| CoreError::Storage("sqlite connect"))?;
        let repo = Self { pool };
        repo.ensure_schema().await?;
        Ok(repo)
    }

    async fn ensure_schema(&self) -> Result<(), CoreError> {
        const STMT: &str = r#"
        CREATE TABLE IF NOT EXISTS decks (
          id          TEXT PRIMARY KEY,
          name        TEXT NOT NULL,
          owner_id    TEXT NOT NULL,
          created_at  TEXT NOT NULL,
          UNIQUE (owner_id, name COLLATE NOCASE)
        );

        CREATE TABLE IF NOT EXISTS cards (
          id                TEXT PRIMARY KEY,
          deck_id           TEXT NOT NULL,
          front             TEXT NOT NULL,
          back              TEXT NOT NULL,
          language          TEXT,
          difficulty_level  INTEGER NOT NULL DEFAULT 0,
          repetitions       INTEGER NOT NULL DEFAULT 0,
          ease_factor       REAL    NOT NULL DEFAULT 2.5,
          interval_days     INTEGER NOT NULL DEFAULT 0,
          due_at            TEXT    NOT NULL,
          total_reviews     INTEGER NOT NULL DEFAULT 0,
          last_reviewed_at  TEXT,
          last_grade_label  TEXT,
          created_at        TEXT    NOT NULL,
          FOREIGN KEY(deck_id) REFERENCES decks(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS reviews (
          id             TEXT PRIMARY KEY,
          card_id        TEXT NOT NULL,
          grade          INTEGER NOT NULL,
          reviewed_at    TEXT NOT NULL,
          interval_days  INTEGER NOT NULL,
          ease_factor    REAL NOT NULL,
          FOREIGN KEY(card_id) REFERENCES cards(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_decks_owner ON decks (owner_id);
        CREATE INDEX IF NOT EXISTS idx_cards_deck_due ON cards (deck_id, due_at);
        CREATE INDEX IF NOT EXISTS idx_reviews_card_time ON reviews (card_id, reviewed_at);
        "#;

        // One statement per query.
        for chunk in STMT.split(';') {
            let sql = chunk.trim();
            if sql.is_empty() {
                continue;
            }
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|_| CoreError::Storage("sqlite schema"))?;
        }
        Ok(())
    }

    /// Grades `current` and writes the result only if the stored card still
    /// has the review count that was read. `None` means another grade won.
    async fn try_grade(
        &self,
        current: Card,
        label: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Card>, CoreError> {
        let id = current.id;
        let seen_reviews = current.total_reviews;
        let outcome = history::review(current, label, now)?;
        let card = &outcome.updated_card;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|_| CoreError::Storage("tx"))?;

        let res = sqlx::query(
            r#"
            UPDATE cards SET
              difficulty_level=?, repetitions=?, ease_factor=?, interval_days=?, due_at=?,
              total_reviews=?, last_reviewed_at=?, last_grade_label=?
            WHERE id=? AND total_reviews=?
            "#,
        )
        .bind(i64::from(card.difficulty_level))
        .bind(i64::from(card.repetitions))
        .bind(card.ease_factor)
        .bind(i64::from(card.interval_days))
        .bind(dt_to_str(card.due_at))
        .bind(card.total_reviews as i64)
        .bind(card.last_reviewed_at.map(dt_to_str))
        .bind(card.last_grade_label.clone())
        .bind(id.to_string())
        .bind(seen_reviews as i64)
        .execute(&mut *tx)
        .await
        .map_err(|_| CoreError::Storage("grade card"))?;

        if res.rows_affected() == 0 {
            tx.rollback().await.ok();
            return Ok(None);
        }

        let review = &outcome.review;
        sqlx::query(
            r#"INSERT INTO reviews (id,card_id,grade,reviewed_at,interval_days,ease_factor)
               VALUES (?,?,?,?,?,?)"#,
        )
        .bind(review.id.to_string())
        .bind(review.card_id.to_string())
        .bind(i64::from(review.grade.level()))
        .bind(dt_to_str(review.reviewed_at))
        .bind(i64::from(review.interval_days))
        .bind(review.ease_factor)
        .execute(&mut *tx)
        .await
        .map_err(|_| CoreError::Storage("insert review"))?;

        tx.commit()
            .await
            .map_err(|_| CoreError::Storage("tx commit"))?;
        Ok(Some(outcome.updated_card))
    }

    async fn deck_exists(&self, id: DeckId) -> Result<bool, CoreError> {
        Ok(sqlx::query("SELECT 1 FROM decks WHERE id=? LIMIT 1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|_| CoreError::Storage("read deck"))?
            .is_some())
    }

    async fn ensure_deck(&self, id: DeckId) -> Result<(), CoreError> {
        if self.deck_exists(id).await? {
            Ok(())
        } else {
            Err(CoreError::NotFound("deck"))
        }
    }
}

#[async_trait::async_trait]
impl Repository for SqliteRepo {
    // ===== Decks =====
    async fn create_deck(&self, owner_id: &str, name: &str) -> Result<Deck, CoreError> {
        let name = checked_deck_name(name)?;
        let exists = sqlx::query(
            "SELECT 1 FROM decks WHERE owner_id=? AND lower(name)=lower(?) LIMIT 1",
        )
        .bind(owner_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|_| CoreError::Storage("read deck"))?
        .is_some();
        if exists {
            return Err(CoreError::Conflict("deck name already exists"));
        }

        let deck = Deck::new(owner_id, name);
        sqlx::query("INSERT INTO decks (id,name,owner_id,created_at) VALUES (?,?,?,?)")
            .bind(deck.id.to_string())
            .bind(&deck.name)
            .bind(&deck.owner_id)
            .bind(dt_to_str(deck.created_at))
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    CoreError::Conflict("deck name already exists")
                }
                _ => CoreError::Storage("insert deck"),
            })?;
        tracing::debug!(deck_id = %deck.id, owner_id, "created deck");
        Ok(deck)
    }

    async fn get_deck(&self, id: DeckId) -> Result<Deck, CoreError> {
        let row = sqlx::query("SELECT id,name,owner_id,created_at FROM decks WHERE id=?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|_| CoreError::Storage("read deck"))?;
        let row = row.ok_or(CoreError::NotFound("deck"))?;
        row_into_deck(row)
    }

    async fn list_decks(&self, owner_id: Option<&str>) -> Result<Vec<Deck>, CoreError> {
        let rows = if let Some(owner) = owner_id {
            sqlx::query(
                "SELECT id,name,owner_id,created_at FROM decks WHERE owner_id=? ORDER BY id ASC",
            )
            .bind(owner)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query("SELECT id,name,owner_id,created_at FROM decks ORDER BY id ASC")
                .fetch_all(&self.pool)
                .await
        }
        .map_err(|_| CoreError::Storage("list decks"))?;
        rows.into_iter().map(row_into_deck).collect()
    }

    async fn delete_deck(&self, id: DeckId) -> Result<Deck, CoreError> {
        let deck = self.get_deck(id).await?;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|_| CoreError::Storage("tx"))?;

        // Explicit cascade; does not depend on PRAGMA foreign_keys.
        sqlx::query("DELETE FROM reviews WHERE card_id IN (SELECT id FROM cards WHERE deck_id=?)")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|_| CoreError::Storage("del reviews"))?;

        sqlx::query("DELETE FROM cards WHERE deck_id=?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|_| CoreError::Storage("del cards"))?;

        let res = sqlx::query("DELETE FROM decks WHERE id=?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|_| CoreError::Storage("del deck"))?;
        if res.rows_affected() == 0 {
            tx.rollback().await.ok();
            return Err(CoreError::NotFound("deck"));
        }

        tx.commit()
            .await
            .map_err(|_| CoreError::Storage("tx commit"))?;
        tracing::debug!(deck_id = %id, "deleted deck");
        Ok(deck)
    }

    // ===== Cards =====
    async fn add_card(&self, deck_id: DeckId, content: &NewCard) -> Result<Card, CoreError> {
        self.ensure_deck(deck_id).await?;

        let card = Card::new(deck_id, content.clone());
        let sql = format!(
            "INSERT INTO cards ({CARD_COLUMNS}) VALUES (?,?,?,?,?,?,?,?,?,?,?,?,?,?)"
        );
        sqlx::query(&sql)
            .bind(card.id.to_string())
            .bind(card.deck_id.to_string())
            .bind(&card.front)
            .bind(&card.back)
            .bind(card.language.clone())
            .bind(i64::from(card.difficulty_level))
            .bind(i64::from(card.repetitions))
            .bind(card.ease_factor)
            .bind(i64::from(card.interval_days))
            .bind(dt_to_str(card.due_at))
            .bind(card.total_reviews as i64)
            .bind(card.last_reviewed_at.map(dt_to_str))
            .bind(card.last_grade_label.clone())
            .bind(dt_to_str(card.created_at))
            .execute(&self.pool)
            .await
            .map_err(|_| CoreError::Storage("insert card"))?;

        Ok(card)
    }

    async fn get_card(&self, id: CardId) -> Result<Card, CoreError> {
        let sql = format!("SELECT {CARD_COLUMNS} FROM cards WHERE id=?");
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|_| CoreError::Storage("read card"))?;
        let row = row.ok_or(CoreError::NotFound("card"))?;
        row_into_card(row)
    }

    async fn list_cards(&self, deck_id: Option<DeckId>) -> Result<Vec<Card>, CoreError> {
        let rows = if let Some(did) = deck_id {
            let sql = format!("SELECT {CARD_COLUMNS} FROM cards WHERE deck_id=? ORDER BY id ASC");
            sqlx::query(&sql)
                .bind(did.to_string())
                .fetch_all(&self.pool)
                .await
        } else {
            let sql = format!("SELECT {CARD_COLUMNS} FROM cards ORDER BY id ASC");
            sqlx::query(&sql).fetch_all(&self.pool).await
        }
        .map_err(|_| CoreError::Storage("list cards"))?;
        rows.into_iter().map(row_into_card).collect()
    }

    async fn update_card(&self, card: &Card) -> Result<Card, CoreError> {
        let res = sqlx::query(
            r#"
            UPDATE cards SET
              deck_id=?, front=?, back=?, language=?, difficulty_level=?, repetitions=?,
              ease_factor=?, interval_days=?, due_at=?, total_reviews=?, last_reviewed_at=?,
              last_grade_label=?
            WHERE id=?
            "#,
        )
        .bind(card.deck_id.to_string())
        .bind(&card.front)
        .bind(&card.back)
        .bind(card.language.clone())
        .bind(i64::from(card.difficulty_level))
        .bind(i64::from(card.repetitions))
        .bind(card.ease_factor)
        .bind(i64::from(card.interval_days))
        .bind(dt_to_str(card.due_at))
        .bind(card.total_reviews as i64)
        .bind(card.last_reviewed_at.map(dt_to_str))
        .bind(card.last_grade_label.clone())
        .bind(card.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|_| CoreError::Storage("update card"))?;
        if res.rows_affected() == 0 {
            return Err(CoreError::NotFound("card"));
        }
        Ok(card.clone())
    }

    async fn edit_card(&self, id: CardId, edit: &CardEdit) -> Result<Card, CoreError> {
        let res = sqlx::query(
            "UPDATE cards SET front=COALESCE(?, front), back=COALESCE(?, back) WHERE id=?",
        )
        .bind(edit.front.clone())
        .bind(edit.back.clone())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|_| CoreError::Storage("edit card"))?;
        if res.rows_affected() == 0 {
            return Err(CoreError::NotFound("card"));
        }
        self.get_card(id).await
    }

    async fn delete_card(&self, id: CardId) -> Result<(), CoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|_| CoreError::Storage("tx"))?;
        sqlx::query("DELETE FROM reviews WHERE card_id=?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|_| CoreError::Storage("del reviews"))?;
        let res = sqlx::query("DELETE FROM cards WHERE id=?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|_| CoreError::Storage("del card"))?;
        if res.rows_affected() == 0 {
            tx.rollback().await.ok();
            return Err(CoreError::NotFound("card"));
        }
        tx.commit()
            .await
            .map_err(|_| CoreError::Storage("tx commit"))
    }

    // ===== Scheduling =====
    async fn grade_card(
        &self,
        id: CardId,
        label: &str,
        now: DateTime<Utc>,
    ) -> Result<Card, CoreError> {
        Grade::from_label(label)?;

        for attempt in 1..=GRADE_ATTEMPTS {
            let current = self.get_card(id).await?;
            if let Some(card) = self.try_grade(current, label, now).await? {
                return Ok(card);
            }
            tracing::debug!(card_id = %id, attempt, "card changed while grading, retrying");
        }

        tracing::warn!(card_id = %id, "gave up grading after repeated conflicts");
        Err(CoreError::Conflict("card was graded concurrently"))
    }

    async fn due_cards(&self, deck_id: DeckId, now: DateTime<Utc>) -> Result<Vec<Card>, CoreError> {
        self.ensure_deck(deck_id).await?;
        let sql = format!(
            "SELECT {CARD_COLUMNS} FROM cards WHERE deck_id=? AND due_at<=? ORDER BY id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(deck_id.to_string())
            .bind(dt_to_str(now))
            .fetch_all(&self.pool)
            .await
            .map_err(|_| CoreError::Storage("due cards"))?;
        rows.into_iter().map(row_into_card).collect()
    }

    async fn count_due(&self, deck_id: DeckId, now: DateTime<Utc>) -> Result<usize, CoreError> {
        Ok(self.deck_summary(deck_id, now).await?.due_cards)
    }

    async fn deck_summary(
        &self,
        deck_id: DeckId,
        now: DateTime<Utc>,
    ) -> Result<DeckSummary, CoreError> {
        self.ensure_deck(deck_id).await?;
        let row = sqlx::query(
            r#"SELECT COUNT(*) AS total,
                      COUNT(CASE WHEN due_at<=? THEN 1 END) AS due
               FROM cards WHERE deck_id=?"#,
        )
        .bind(dt_to_str(now))
        .bind(deck_id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|_| CoreError::Storage("deck summary"))?;
        Ok(DeckSummary {
            total_cards: row.get::<i64, _>("total") as usize,
            due_cards: row.get::<i64, _>("due") as usize,
        })
    }

    // ===== Reviews =====
    async fn list_reviews_for_card(&self, card_id: CardId) -> Result<Vec<Review>, CoreError> {
        let rows = sqlx::query(
            r#"SELECT id,card_id,grade,reviewed_at,interval_days,ease_factor
               FROM reviews WHERE card_id=? ORDER BY reviewed_at ASC, id ASC"#,
        )
        .bind(card_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|_| CoreError::Storage("list reviews"))?;
        let mut v = Vec::with_capacity(rows.len());
        for row in rows {
            v.push(Review {
                id: uuid_from_str(row.get::<String, _>("id"))?,
                card_id: uuid_from_str(row.get::<String, _>("card_id"))?,
                grade: u8::try_from(row.get::<i64, _>("grade"))
                    .ok()
                    .and_then(Grade::from_level)
                    .ok_or(CoreError::Invalid("grade"))?,
                reviewed_at: dt_from_str(row.get::<String, _>("reviewed_at"))?,
                interval_days: int_col(&row, "interval_days")?,
                ease_factor: row.get::<f64, _>("ease_factor"),
            });
        }
        Ok(v)
    }
}

// ===== Helpers =====
fn uuid_from_str(s: String) -> Result<uuid::Uuid, CoreError> {
    uuid::Uuid::parse_str(&s).map_err(|_| CoreError::Invalid("uuid"))
}

/// Shifts every representable Unix second to a positive 14-digit number.
const EPOCH_SHIFT: i64 = 10_000_000_000_000;

/// Timestamps are stored as `<shifted seconds>.<nanoseconds>`, both
/// zero-padded, so text order is time order for any year chrono supports.
fn dt_to_str(dt: DateTime<Utc>) -> String {
    format!(
        "{:014}.{:010}",
        dt.timestamp() + EPOCH_SHIFT,
        dt.timestamp_subsec_nanos()
    )
}

fn dt_from_str(s: String) -> Result<DateTime<Utc>, CoreError> {
    let (secs, nanos) = s.split_once('.').ok_or(CoreError::Invalid("datetime"))?;
    let secs = secs
        .parse::<i64>()
        .map_err(|_| CoreError::Invalid("datetime"))?;
    let nanos = nanos
        .parse::<u32>()
        .map_err(|_| CoreError::Invalid("datetime"))?;
    DateTime::from_timestamp(secs - EPOCH_SHIFT, nanos).ok_or(CoreError::Invalid("datetime"))
}

fn int_col<T: TryFrom<i64>>(row: &SqliteRow, col: &str) -> Result<T, CoreError> {
    T::try_from(row.get::<i64, _>(col)).map_err(|_| CoreError::Invalid("integer column"))
}

fn row_into_deck(row: SqliteRow) -> Result<Deck, CoreError> {
    Ok(Deck {
        id: uuid_from_str(row.get::<String, _>("id"))?,
        name: row.get::<String, _>("name"),
        owner_id: row.get::<String, _>("owner_id"),
        created_at: dt_from_str(row.get::<String, _>("created_at"))?,
    })
}

fn row_into_card(row: SqliteRow) -> Result<Card, CoreError> {
    Ok(Card {
        id: uuid_from_str(row.get::<String, _>("id"))?,
        deck_id: uuid_from_str(row.get::<String, _>("deck_id"))?,
        front: row.get::<String, _>("front"),
        back: row.get::<String, _>("back"),
        language: row.get::<Option<String>, _>("language"),
        difficulty_level: int_col(&row, "difficulty_level")?,
        repetitions: int_col(&row, "repetitions")?,
        ease_factor: row.get::<f64, _>("ease_factor"),
        interval_days: int_col(&row, "interval_days")?,
        due_at: dt_from_str(row.get::<String, _>("due_at"))?,
        total_reviews: int_col(&row, "total_reviews")?,
        last_reviewed_at: row
            .get::<Option<String>, _>("last_reviewed_at")
            .map(dt_from_str)
            .transpose()?,
        last_grade_label: row.get::<Option<String>, _>("last_grade_label"),
        created_at: dt_from_str(row.get::<String, _>("created_at"))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Duration, TimeZone};
    use std::sync::Arc;

    #[tokio::test]
    async fn card_round_trips_through_sqlite() {
        let repo = SqliteRepo::open_memory().await.unwrap();
        let deck = repo.create_deck("ana", "Python").await.unwrap();
        let card = repo
            .add_card(deck.id, &NewCard::new("len", "size").with_language("python3"))
            .await
            .unwrap();

        assert_eq!(repo.get_card(card.id).await.unwrap(), card);
        assert_eq!(repo.list_cards(Some(deck.id)).await.unwrap(), vec![card]);
    }

    #[tokio::test]
    async fn deck_name_conflicts_ignore_case() {
        let repo = SqliteRepo::open_memory().await.unwrap();
        repo.create_deck("ana", "Python").await.unwrap();
        let err = repo.create_deck("ana", "PYTHON").await.unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
        repo.create_deck("ben", "Python").await.unwrap();
        assert_eq!(repo.list_decks(Some("ben")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn grading_persists_and_logs() {
        let repo = SqliteRepo::open_memory().await.unwrap();
        let deck = repo.create_deck("ana", "Python").await.unwrap();
        let card = repo.add_card(deck.id, &NewCard::new("a", "b")).await.unwrap();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        for _ in 0..3 {
            repo.grade_card(card.id, "Very Easy", now).await.unwrap();
        }
        let c = repo.get_card(card.id).await.unwrap();
        assert_eq!(c.repetitions, 3);
        assert_eq!(c.interval_days, 16);
        assert_eq!(c.total_reviews, 3);
        assert_eq!(c.difficulty_level, 5);
        assert_eq!(c.due_at, now + Duration::days(16));
        assert_eq!(c.last_grade_label.as_deref(), Some("Very Easy"));

        let log = repo.list_reviews_for_card(card.id).await.unwrap();
        assert_eq!(log.len(), 3);
        assert!(log.iter().all(|r| r.grade == Grade::VeryEasy));

        let err = repo.grade_card(card.id, "nope", now).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidGrade(_)));
        assert_eq!(repo.get_card(card.id).await.unwrap(), c);
    }

    #[tokio::test]
    async fn due_filter_runs_in_sql() {
        let repo = SqliteRepo::open_memory().await.unwrap();
        let deck = repo.create_deck("ana", "Python").await.unwrap();
        let a = repo.add_card(deck.id, &NewCard::new("a", "1")).await.unwrap();
        let b = repo.add_card(deck.id, &NewCard::new("b", "2")).await.unwrap();
        let now = Utc::now() + Duration::seconds(1);

        repo.grade_card(a.id, "Hard", now).await.unwrap();

        let due = repo.due_cards(deck.id, now).await.unwrap();
        assert_eq!(due.iter().map(|c| c.id).collect::<Vec<_>>(), vec![b.id]);
        assert_eq!(repo.count_due(deck.id, now).await.unwrap(), 1);
        assert_eq!(
            repo.count_due(deck.id, now + Duration::days(1)).await.unwrap(),
            2
        );
        let summary = repo.deck_summary(deck.id, now).await.unwrap();
        assert_eq!((summary.total_cards, summary.due_cards), (2, 1));

        let err = repo.count_due(uuid::Uuid::now_v7(), now).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound("deck")));
    }

    #[tokio::test]
    async fn delete_deck_cascades() {
        let repo = SqliteRepo::open_memory().await.unwrap();
        let deck = repo.create_deck("ana", "Python").await.unwrap();
        let card = repo.add_card(deck.id, &NewCard::new("a", "b")).await.unwrap();
        repo.grade_card(card.id, "Medium", Utc::now()).await.unwrap();

        repo.delete_deck(deck.id).await.unwrap();
        assert!(matches!(
            repo.get_card(card.id).await.unwrap_err(),
            CoreError::NotFound("card")
        ));
        assert!(repo.list_reviews_for_card(card.id).await.unwrap().is_empty());
        assert!(matches!(
            repo.delete_deck(deck.id).await.unwrap_err(),
            CoreError::NotFound("deck")
        ));
    }

    #[tokio::test]
    async fn edit_keeps_schedule() {
        let repo = SqliteRepo::open_memory().await.unwrap();
        let deck = repo.create_deck("ana", "Python").await.unwrap();
        let card = repo.add_card(deck.id, &NewCard::new("a", "b")).await.unwrap();
        let graded = repo.grade_card(card.id, "Easy", Utc::now()).await.unwrap();

        let edit = CardEdit {
            front: Some("A".into()),
            back: None,
        };
        let c = repo.edit_card(card.id, &edit).await.unwrap();
        assert_eq!((c.front.as_str(), c.back.as_str()), ("A", "b"));
        assert_eq!(c.due_at, graded.due_at);
        assert_eq!(c.total_reviews, 1);
    }

    #[tokio::test]
    async fn concurrent_grades_on_file_db_all_count() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Arc::new(SqliteRepo::open_file(dir.path().join("t.sqlite3")).await.unwrap());
        let deck = repo.create_deck("ana", "Python").await.unwrap();
        let card = repo.add_card(deck.id, &NewCard::new("a", "b")).await.unwrap();
        let id = card.id;

        let mut handles = Vec::new();
        for _ in 0..3 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                repo.grade_card(id, "Medium", Utc::now()).await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        let c = repo.get_card(id).await.unwrap();
        assert_eq!(c.total_reviews, 3);
        assert_eq!(c.repetitions, 3);
        assert_eq!(repo.list_reviews_for_card(id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn stale_grade_loses_and_writes_nothing() {
        let repo = SqliteRepo::open_memory().await.unwrap();
        let deck = repo.create_deck("ana", "Python").await.unwrap();
        let card = repo.add_card(deck.id, &NewCard::new("a", "b")).await.unwrap();
        let stale = repo.get_card(card.id).await.unwrap();

        let winner = repo.grade_card(card.id, "Easy", Utc::now()).await.unwrap();
        let lost = repo.try_grade(stale, "Hard", Utc::now()).await.unwrap();
        assert!(lost.is_none());

        assert_eq!(repo.get_card(card.id).await.unwrap(), winner);
        let log = repo.list_reviews_for_card(card.id).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].grade, Grade::Easy);

        // A fresh read goes through.
        let c = repo.grade_card(card.id, "Hard", Utc::now()).await.unwrap();
        assert_eq!(c.total_reviews, 2);
    }

    #[tokio::test]
    async fn due_dates_past_year_9999_stay_ordered() {
        let repo = SqliteRepo::open_memory().await.unwrap();
        let deck = repo.create_deck("ana", "Python").await.unwrap();
        let card = repo.add_card(deck.id, &NewCard::new("a", "b")).await.unwrap();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        let mut graded = card;
        for _ in 0..14 {
            graded = repo.grade_card(graded.id, "Very Easy", now).await.unwrap();
        }
        assert!(graded.due_at.year() > 9999);

        let c = repo.get_card(graded.id).await.unwrap();
        assert_eq!(c, graded);
        assert!(repo.due_cards(deck.id, now).await.unwrap().is_empty());
        assert_eq!(repo.count_due(deck.id, now).await.unwrap(), 0);
        assert_eq!(repo.count_due(deck.id, c.due_at).await.unwrap(), 1);
        assert_eq!(repo.due_cards(deck.id, c.due_at).await.unwrap(), vec![c]);
    }

    #[test]
    fn timestamp_text_sorts_like_time() {
        let times = [
            Utc.with_ymd_and_hms(-50, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(1969, 12, 31, 23, 59, 59).unwrap(),
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + Duration::nanoseconds(7),
            Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).unwrap(),
            Utc.with_ymd_and_hms(23236, 11, 29, 12, 0, 0).unwrap(),
        ];
        let keys: Vec<String> = times.iter().map(|t| dt_to_str(*t)).collect();
        for pair in keys.windows(2) {
            assert_eq!(pair[0].len(), pair[1].len());
            assert!(pair[0] < pair[1], "{} !< {}", pair[0], pair[1]);
        }
        for (t, k) in times.iter().zip(keys) {
            assert_eq!(dt_from_str(k).unwrap(), *t);
        }
    }
}
