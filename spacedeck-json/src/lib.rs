use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use spacedeck_core::{
    due, history, repo::checked_deck_name, repo::Repository, Card, CardEdit, CardId, CoreError,
    Deck, DeckId, NewCard, Review,
};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tokio::task;

pub mod paths;

const FILE_VERSION: u32 = 1;
pub const DEFAULT_MAX_BACKUPS: usize = 10;

#[derive(Clone, Serialize, Deserialize)]
struct FileImage {
    version: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    decks: Vec<Deck>,
    cards: Vec<Card>,
    reviews: Vec<Review>,
}

#[derive(Clone)]
struct State {
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    decks: HashMap<DeckId, Deck>,
    cards: HashMap<CardId, Card>,
    reviews: HashMap<CardId, Vec<Review>>,
}

impl State {
    fn new_empty() -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            updated_at: now,
            decks: HashMap::new(),
            cards: HashMap::new(),
            reviews: HashMap::new(),
        }
    }

    fn to_image(&self) -> FileImage {
        let mut decks: Vec<Deck> = self.decks.values().cloned().collect();
        decks.sort_by_key(|d| d.id);
        let mut cards: Vec<Card> = self.cards.values().cloned().collect();
        due::sort_by_id(&mut cards);
        let mut reviews: Vec<Review> = self.reviews.values().flatten().cloned().collect();
        reviews.sort_by_key(|r| r.id);
        FileImage {
            version: FILE_VERSION,
            created_at: self.created_at,
            updated_at: self.updated_at,
            decks,
            cards,
            reviews,
        }
    }

    fn from_image(img: FileImage) -> Self {
        let decks = img.decks.into_iter().map(|d| (d.id, d)).collect();
        let cards = img.cards.into_iter().map(|c| (c.id, c)).collect();
        let mut reviews: HashMap<CardId, Vec<Review>> = HashMap::new();
        for r in img.reviews {
            reviews.entry(r.card_id).or_default().push(r);
        }
        Self {
            created_at: img.created_at,
            updated_at: img.updated_at,
            decks,
            cards,
            reviews,
        }
    }
}

/// Whole-collection JSON document kept in memory and rewritten atomically on
/// every change, with a rotating set of timestamped backups.
pub struct JsonStore {
    path: PathBuf,
    backups_dir: PathBuf,
    max_backups: usize,
    state: RwLock<State>,
    // One commit at a time, so each one starts from the last published state.
    write_gate: Mutex<()>,
}

impl JsonStore {
    pub async fn open_default() -> Result<Self, CoreError> {
        let (file, backups) = paths::default_store_file();
        Self::open_with(file, backups, DEFAULT_MAX_BACKUPS).await
    }

    pub async fn open_in(root: &Path) -> Result<Self, CoreError> {
        let (file, backups) = paths::store_files(root);
        Self::open_with(file, backups, DEFAULT_MAX_BACKUPS).await
    }

    pub async fn open_with(
        path: PathBuf,
        backups_dir: PathBuf,
        max_backups: usize,
    ) -> Result<Self, CoreError> {
        ensure_parent_dirs(&path)?;
        ensure_dir(&backups_dir)?;
        let state = load_or_init(&path, &backups_dir).await?;
        tracing::debug!(path = %path.display(), "opened json store");
        Ok(Self {
            path,
            backups_dir,
            max_backups: max_backups.max(1),
            state: RwLock::new(state),
            write_gate: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Applies `change` to a copy of the state, writes that copy, and only
    /// then makes it visible. A failed write leaves the store untouched.
    async fn commit<T, F>(&self, change: F) -> Result<T, CoreError>
    where
        F: FnOnce(&mut State) -> Result<T, CoreError> + Send,
        T: Send,
    {
        let _gate = self.write_gate.lock().await;
        let mut next = self.state.read().clone();
        let out = change(&mut next)?;
        next.updated_at = Utc::now();

        let snapshot = next.to_image();
        let path = self.path.clone();
        let backups = self.backups_dir.clone();
        let keep = self.max_backups;
        task::spawn_blocking(move || write_with_backup(&path, &backups, keep, &snapshot))
            .await
            .map_err(|_| CoreError::Storage("io"))?
            .map_err(|e| {
                tracing::error!(error = %e, "failed to write json store");
                CoreError::Storage("io")
            })?;

        *self.state.write() = next;
        tracing::debug!(path = %self.path.display(), "saved json store");
        Ok(out)
    }
}

fn ensure_parent_dirs(path: &Path) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    Ok(())
}

fn ensure_dir(path: &Path) -> Result<(), CoreError> {
    fs::create_dir_all(path).map_err(|_| CoreError::Storage("io"))
}

async fn load_or_init(path: &Path, backups_dir: &Path) -> Result<State, CoreError> {
    if path.exists() {
        let p = path.to_path_buf();
        let img: FileImage = task::spawn_blocking(move || {
            let buf = fs::read_to_string(&p)?;
            let v = serde_json::from_str::<FileImage>(&buf)?;
            Ok::<FileImage, std::io::Error>(v)
        })
        .await
        .map_err(|_| CoreError::Storage("io"))
        .and_then(|r| r.map_err(|_| CoreError::Storage("corrupt json store")))?;
        if img.version != FILE_VERSION {
            return Err(CoreError::Storage("unsupported json store version"));
        }
        Ok(State::from_image(img))
    } else {
        let st = State::new_empty();
        let img = st.to_image();
        write_with_backup(path, backups_dir, 1, &img).map_err(|_| CoreError::Storage("io"))?;
        Ok(st)
    }
}

fn write_with_backup(
    path: &Path,
    backups_dir: &Path,
    max_backups: usize,
    img: &FileImage,
) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::create_dir_all(backups_dir)?;

    let json = serde_json::to_vec_pretty(img)?;

    let ts = Utc::now().format("%Y%m%d-%H%M%S%.3f");
    let backup_path = backups_dir.join(format!("spacedeck-{ts}.json"));
    let mut btmp = NamedTempFile::new_in(backups_dir)?;
    btmp.write_all(&json)?;
    btmp.flush()?;
    btmp.persist(&backup_path).map_err(|e| e.error)?;

    // The document is replaced last; nothing after this may fail the write.
    let mut tmp = NamedTempFile::new_in(path.parent().unwrap_or_else(|| Path::new(".")))?;
    tmp.write_all(&json)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;

    if let Err(e) = rotate_backups(backups_dir, max_backups) {
        tracing::warn!(error = %e, "failed to rotate json store backups");
    }
    Ok(())
}

fn rotate_backups(dir: &Path, keep: usize) -> Result<(), std::io::Error> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("json"))
        .collect();
    // timestamped names sort chronologically
    entries.sort();
    if entries.len() > keep {
        for p in &entries[..entries.len() - keep] {
            let _ = fs::remove_file(p);
        }
    }
    Ok(())
}

#[async_trait]
impl Repository for JsonStore {
    async fn create_deck(&self, owner_id: &str, name: &str) -> Result<Deck, CoreError> {
        let name = checked_deck_name(name)?;
        self.commit(|s| {
            if s
                .decks
                .values()
                .any(|d| d.owner_id == owner_id && d.name.eq_ignore_ascii_case(name))
            {
                return Err(CoreError::Conflict("deck name already exists"));
            }
            let deck = Deck::new(owner_id, name);
            s.decks.insert(deck.id, deck.clone());
            Ok(deck)
        })
        .await
    }

    async fn get_deck(&self, id: DeckId) -> Result<Deck, CoreError> {
        let s = self.state.read();
        s.decks.get(&id).cloned().ok_or(CoreError::NotFound("deck"))
    }

    async fn list_decks(&self, owner_id: Option<&str>) -> Result<Vec<Deck>, CoreError> {
        let s = self.state.read();
        let mut v: Vec<Deck> = s
            .decks
            .values()
            .filter(|d| owner_id.map_or(true, |o| d.owner_id == o))
            .cloned()
            .collect();
        v.sort_by_key(|d| d.id);
        Ok(v)
    }

    async fn delete_deck(&self, id: DeckId) -> Result<Deck, CoreError> {
        self.commit(|s| {
            let deck = s.decks.remove(&id).ok_or(CoreError::NotFound("deck"))?;
            let to_remove: Vec<CardId> = s
                .cards
                .values()
                .filter(|c| c.deck_id == id)
                .map(|c| c.id)
                .collect();
            for cid in to_remove {
                s.cards.remove(&cid);
                s.reviews.remove(&cid);
            }
            Ok(deck)
        })
        .await
    }

    async fn add_card(&self, deck_id: DeckId, content: &NewCard) -> Result<Card, CoreError> {
        self.commit(|s| {
            if !s.decks.contains_key(&deck_id) {
                return Err(CoreError::NotFound("deck"));
            }
            let c = Card::new(deck_id, content.clone());
            s.cards.insert(c.id, c.clone());
            Ok(c)
        })
        .await
    }

    async fn get_card(&self, id: CardId) -> Result<Card, CoreError> {
        let s = self.state.read();
        s.cards.get(&id).cloned().ok_or(CoreError::NotFound("card"))
    }

    async fn list_cards(&self, deck_id: Option<DeckId>) -> Result<Vec<Card>, CoreError> {
        let mut v: Vec<Card> = {
            let s = self.state.read();
            s.cards
                .values()
                .filter(|c| deck_id.map_or(true, |did| c.deck_id == did))
                .cloned()
                .collect()
        };
        due::sort_by_id(&mut v);
        Ok(v)
    }

    async fn update_card(&self, card: &Card) -> Result<Card, CoreError> {
        self.commit(|s| {
            if !s.cards.contains_key(&card.id) {
                return Err(CoreError::NotFound("card"));
            }
            s.cards.insert(card.id, card.clone());
            Ok(card.clone())
        })
        .await
    }

    async fn edit_card(&self, id: CardId, edit: &CardEdit) -> Result<Card, CoreError> {
        self.commit(|s| {
            let c = s.cards.get_mut(&id).ok_or(CoreError::NotFound("card"))?;
            if let Some(front) = &edit.front {
                c.front = front.clone();
            }
            if let Some(back) = &edit.back {
                c.back = back.clone();
            }
            Ok(c.clone())
        })
        .await
    }

    async fn delete_card(&self, id: CardId) -> Result<(), CoreError> {
        self.commit(|s| {
            s.cards.remove(&id).ok_or(CoreError::NotFound("card"))?;
            s.reviews.remove(&id);
            Ok(())
        })
        .await
    }

    async fn grade_card(
        &self,
        id: CardId,
        label: &str,
        now: DateTime<Utc>,
    ) -> Result<Card, CoreError> {
        self.commit(|s| {
            let current = s.cards.get(&id).cloned().ok_or(CoreError::NotFound("card"))?;
            let outcome = history::review(current, label, now)?;
            s.cards.insert(id, outcome.updated_card.clone());
            s.reviews.entry(id).or_default().push(outcome.review);
            Ok(outcome.updated_card)
        })
        .await
    }

    async fn list_reviews_for_card(&self, card_id: CardId) -> Result<Vec<Review>, CoreError> {
        let s = self.state.read();
        Ok(s.reviews.get(&card_id).cloned().unwrap_or_default())
    }
}
