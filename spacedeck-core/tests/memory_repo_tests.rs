use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use spacedeck_core::{
    apply_update, memory::MemoryRepo, CardEdit, CardUpdate, CoreError, Grade, NewCard,
    Repository,
};
use std::sync::Arc;

#[tokio::test]
async fn deck_names_are_unique_per_owner() {
    let repo = MemoryRepo::new();
    repo.create_deck("ana", "Spanish").await.unwrap();

    let dup = repo.create_deck("ana", "spanish").await.unwrap_err();
    assert!(matches!(dup, CoreError::Conflict(_)));

    repo.create_deck("ben", "Spanish").await.unwrap();
    assert_eq!(repo.list_decks(Some("ana")).await.unwrap().len(), 1);
    assert_eq!(repo.list_decks(None).await.unwrap().len(), 2);

    let blank = repo.create_deck("ana", "   ").await.unwrap_err();
    assert!(matches!(blank, CoreError::Invalid(_)));
}

#[tokio::test]
async fn new_card_has_default_schedule() {
    let repo = MemoryRepo::new();
    let deck = repo.create_deck("ana", "Go").await.unwrap();
    let before = Utc::now();
    let card = repo
        .add_card(deck.id, &NewCard::new("fmt.Println", "print").with_language("go"))
        .await
        .unwrap();

    assert_eq!(card.difficulty_level, 0);
    assert_eq!(card.repetitions, 0);
    assert_eq!(card.ease_factor, 2.5);
    assert_eq!(card.interval_days, 0);
    assert_eq!(card.total_reviews, 0);
    assert_eq!(card.language.as_deref(), Some("go"));
    assert!(card.due_at >= before);
    assert_eq!(card.due_at, card.created_at);

    let missing = repo
        .add_card(uuid::Uuid::now_v7(), &NewCard::new("a", "b"))
        .await
        .unwrap_err();
    assert!(matches!(missing, CoreError::NotFound("deck")));
}

#[tokio::test]
async fn grade_card_persists_schedule_history_and_log() {
    let repo = MemoryRepo::new();
    let deck = repo.create_deck("ana", "Go").await.unwrap();
    let card = repo.add_card(deck.id, &NewCard::new("a", "b")).await.unwrap();
    let now = Utc::now();

    repo.grade_card(card.id, "Easy", now).await.unwrap();
    let graded = repo.grade_card(card.id, "Easy", now).await.unwrap();
    assert_eq!(graded.repetitions, 2);
    assert_eq!(graded.interval_days, 6);
    assert_eq!(graded.total_reviews, 2);
    assert_eq!(graded.due_at, now + Duration::days(6));

    assert_eq!(repo.get_card(card.id).await.unwrap(), graded);

    let log = repo.list_reviews_for_card(card.id).await.unwrap();
    assert_eq!(log.len(), 2);
    assert_eq!(log[1].grade, Grade::Easy);
    assert_eq!(log[1].interval_days, 6);
}

#[tokio::test]
async fn invalid_grade_leaves_card_untouched() {
    let repo = MemoryRepo::new();
    let deck = repo.create_deck("ana", "Go").await.unwrap();
    let card = repo.add_card(deck.id, &NewCard::new("a", "b")).await.unwrap();

    let err = repo.grade_card(card.id, "meh", Utc::now()).await.unwrap_err();
    assert!(matches!(err, CoreError::InvalidGrade(_)));
    assert_eq!(repo.get_card(card.id).await.unwrap(), card);
    assert!(repo.list_reviews_for_card(card.id).await.unwrap().is_empty());

    let err = repo
        .grade_card(uuid::Uuid::now_v7(), "Easy", Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound("card")));
}

#[tokio::test]
async fn concurrent_grading_loses_no_updates() {
    let repo = Arc::new(MemoryRepo::new());
    let deck = repo.create_deck("ana", "Go").await.unwrap();
    let card = repo.add_card(deck.id, &NewCard::new("a", "b")).await.unwrap();

    let id = card.id;
    let mut handles = Vec::new();
    for _ in 0..16 {
        let repo = repo.clone();
        handles.push(tokio::spawn(async move {
            repo.grade_card(id, "Medium", Utc::now()).await.unwrap();
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    let c = repo.get_card(card.id).await.unwrap();
    assert_eq!(c.total_reviews, 16);
    assert_eq!(c.repetitions, 16);
    assert_eq!(repo.list_reviews_for_card(card.id).await.unwrap().len(), 16);
}

#[tokio::test]
async fn deleting_while_grading_leaves_no_review_log() {
    let repo = Arc::new(MemoryRepo::new());
    let deck = repo.create_deck("ana", "Go").await.unwrap();

    for _ in 0..20 {
        let card = repo.add_card(deck.id, &NewCard::new("a", "b")).await.unwrap();
        let id = card.id;
        let mut handles = Vec::new();
        for _ in 0..4 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                let _ = repo.grade_card(id, "Easy", Utc::now()).await;
            }));
        }
        let deleter = {
            let repo = repo.clone();
            tokio::spawn(async move { repo.delete_card(id).await })
        };
        for h in handles {
            h.await.unwrap();
        }
        deleter.await.unwrap().unwrap();

        assert!(repo.get_card(id).await.is_err());
        assert!(repo.list_reviews_for_card(id).await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn due_queries_follow_schedule() {
    let repo = MemoryRepo::new();
    let deck = repo.create_deck("ana", "Go").await.unwrap();
    let a = repo.add_card(deck.id, &NewCard::new("a", "1")).await.unwrap();
    let b = repo.add_card(deck.id, &NewCard::new("b", "2")).await.unwrap();
    let now = Utc::now() + Duration::seconds(1);

    assert_eq!(repo.count_due(deck.id, now).await.unwrap(), 2);

    repo.grade_card(a.id, "Hard", now).await.unwrap();
    let due = repo.due_cards(deck.id, now).await.unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].id, b.id);

    let summary = repo.deck_summary(deck.id, now).await.unwrap();
    assert_eq!((summary.total_cards, summary.due_cards), (2, 1));

    // Again makes the card due right away
    repo.grade_card(a.id, "Review again!", now).await.unwrap();
    assert_eq!(repo.count_due(deck.id, now).await.unwrap(), 2);

    let err = repo.due_cards(uuid::Uuid::now_v7(), now).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound("deck")));
}

#[tokio::test]
async fn deleting_deck_cascades() {
    let repo = MemoryRepo::new();
    let deck = repo.create_deck("ana", "Go").await.unwrap();
    let other = repo.create_deck("ana", "Rust").await.unwrap();
    let card = repo.add_card(deck.id, &NewCard::new("a", "b")).await.unwrap();
    let kept = repo.add_card(other.id, &NewCard::new("c", "d")).await.unwrap();
    repo.grade_card(card.id, "Easy", Utc::now()).await.unwrap();

    let removed = repo.delete_deck(deck.id).await.unwrap();
    assert_eq!(removed.id, deck.id);

    assert!(matches!(
        repo.get_card(card.id).await.unwrap_err(),
        CoreError::NotFound("card")
    ));
    assert!(repo.list_reviews_for_card(card.id).await.unwrap().is_empty());
    assert_eq!(repo.list_cards(None).await.unwrap(), vec![kept]);
}

#[tokio::test]
async fn card_updates_dispatch_by_variant() {
    let repo = MemoryRepo::new();
    let deck = repo.create_deck("ana", "Go").await.unwrap();
    let card = repo.add_card(deck.id, &NewCard::new("a", "b")).await.unwrap();
    let now = Utc::now();

    let c = apply_update(&repo, card.id, CardUpdate::EditFront("A".into()), now)
        .await
        .unwrap();
    assert_eq!((c.front.as_str(), c.back.as_str()), ("A", "b"));
    assert_eq!(c.total_reviews, 0);

    let c = apply_update(&repo, card.id, CardUpdate::EditBack("B".into()), now)
        .await
        .unwrap();
    assert_eq!((c.front.as_str(), c.back.as_str()), ("A", "B"));

    let c = apply_update(&repo, card.id, CardUpdate::Grade("Very Easy".into()), now)
        .await
        .unwrap();
    assert_eq!(c.total_reviews, 1);
    assert_eq!(c.difficulty_level, 5);

    let both = CardEdit {
        front: Some("x".into()),
        back: Some("y".into()),
    };
    let c = repo.edit_card(card.id, &both).await.unwrap();
    assert_eq!((c.front.as_str(), c.back.as_str()), ("x", "y"));
    assert_eq!(c.repetitions, 1);
}

#[test]
fn card_update_decodes_exactly_one_key() {
    let front: CardUpdate = serde_json::from_str(r#"{"front":"q"}"#).unwrap();
    assert_eq!(front, CardUpdate::EditFront("q".into()));

    let back: CardUpdate = serde_json::from_str(r#"{"back":"a"}"#).unwrap();
    assert_eq!(back, CardUpdate::EditBack("a".into()));

    let grade: CardUpdate = serde_json::from_str(r#"{"difficultyString":"Hard"}"#).unwrap();
    assert_eq!(grade, CardUpdate::Grade("Hard".into()));

    assert!(serde_json::from_str::<CardUpdate>(r#"{"front":"q","back":"a"}"#).is_err());
    assert!(serde_json::from_str::<CardUpdate>(r#"{}"#).is_err());
}
