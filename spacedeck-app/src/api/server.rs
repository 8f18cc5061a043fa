use axum::{routing::get, Router};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::api::routes::*;
use spacedeck_core::Repository;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/owners/:owner_id/decks", get(list_decks).post(create_deck))
        .route("/decks/:deck_id", get(get_deck).delete(delete_deck))
        .route("/decks/:deck_id/flashcards", get(list_cards).post(create_card))
        .route("/decks/:deck_id/flashcards/due", get(due_cards))
        .route("/decks/:deck_id/flashcards/due/count", get(count_due))
        .route(
            "/flashcards/:card_id",
            get(get_card).put(update_card).delete(delete_card),
        )
        .route("/flashcards/:card_id/reviews", get(list_reviews))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn run(repo: Arc<dyn Repository>, addr: SocketAddr) -> anyhow::Result<()> {
    let app = router(Arc::new(AppState { repo }));

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "api listening");
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
