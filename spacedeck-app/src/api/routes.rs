use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use spacedeck_core::{apply_update, CardUpdate, NewCard, Repository, Review};

use crate::api::dto::{CardOut, CountOut, DeckOut, DueQuery, NewDeckIn};
use crate::api::error::{ApiError, Result};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repository>,
}

type St = State<Arc<AppState>>;

pub async fn health() -> &'static str {
    "OK"
}

pub async fn list_decks(State(st): St, Path(owner_id): Path<String>) -> Result<Json<Vec<DeckOut>>> {
    let now = Utc::now();
    let decks = st.repo.list_decks(Some(&owner_id)).await?;
    let mut out = Vec::with_capacity(decks.len());
    for d in decks {
        let summary = st.repo.deck_summary(d.id, now).await?;
        out.push(DeckOut::new(d, summary));
    }
    Ok(Json(out))
}

pub async fn create_deck(
    State(st): St,
    Path(owner_id): Path<String>,
    body: std::result::Result<Json<NewDeckIn>, JsonRejection>,
) -> Result<(StatusCode, Json<DeckOut>)> {
    let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let d = st.repo.create_deck(&owner_id, &body.deck_name).await?;
    let summary = st.repo.deck_summary(d.id, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(DeckOut::new(d, summary))))
}

pub async fn get_deck(State(st): St, Path(deck_id): Path<Uuid>) -> Result<Json<DeckOut>> {
    let d = st.repo.get_deck(deck_id).await?;
    let summary = st.repo.deck_summary(d.id, Utc::now()).await?;
    Ok(Json(DeckOut::new(d, summary)))
}

pub async fn delete_deck(State(st): St, Path(deck_id): Path<Uuid>) -> Result<Json<DeckOut>> {
    // Summary first; the cards are gone once the deck is.
    let summary = st.repo.deck_summary(deck_id, Utc::now()).await?;
    let d = st.repo.delete_deck(deck_id).await?;
    Ok(Json(DeckOut::new(d, summary)))
}

pub async fn list_cards(State(st): St, Path(deck_id): Path<Uuid>) -> Result<Json<Vec<CardOut>>> {
    st.repo.get_deck(deck_id).await?;
    let cards = st.repo.list_cards(Some(deck_id)).await?;
    Ok(Json(cards.into_iter().map(CardOut::from).collect()))
}

pub async fn create_card(
    State(st): St,
    Path(deck_id): Path<Uuid>,
    body: std::result::Result<Json<NewCard>, JsonRejection>,
) -> Result<(StatusCode, Json<CardOut>)> {
    let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let c = st.repo.add_card(deck_id, &body).await?;
    Ok((StatusCode::CREATED, Json(c.into())))
}

pub async fn due_cards(
    State(st): St,
    Path(deck_id): Path<Uuid>,
    Query(q): Query<DueQuery>,
) -> Result<Json<Vec<CardOut>>> {
    let now = q.now.unwrap_or_else(Utc::now);
    let cards = st.repo.due_cards(deck_id, now).await?;
    Ok(Json(cards.into_iter().map(CardOut::from).collect()))
}

pub async fn count_due(
    State(st): St,
    Path(deck_id): Path<Uuid>,
    Query(q): Query<DueQuery>,
) -> Result<Json<CountOut>> {
    let now = q.now.unwrap_or_else(Utc::now);
    let count = st.repo.count_due(deck_id, now).await?;
    Ok(Json(CountOut { count }))
}

pub async fn get_card(State(st): St, Path(card_id): Path<Uuid>) -> Result<Json<CardOut>> {
    Ok(Json(st.repo.get_card(card_id).await?.into()))
}

pub async fn update_card(
    State(st): St,
    Path(card_id): Path<Uuid>,
    body: std::result::Result<Json<CardUpdate>, JsonRejection>,
) -> Result<Json<CardOut>> {
    let Json(update) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let c = apply_update(&*st.repo, card_id, update, Utc::now()).await?;
    Ok(Json(c.into()))
}

pub async fn delete_card(State(st): St, Path(card_id): Path<Uuid>) -> Result<StatusCode> {
    st.repo.delete_card(card_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_reviews(State(st): St, Path(card_id): Path<Uuid>) -> Result<Json<Vec<Review>>> {
    st.repo.get_card(card_id).await?;
    Ok(Json(st.repo.list_reviews_for_card(card_id).await?))
}
