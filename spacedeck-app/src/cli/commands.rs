use crate::api::server as api_server;
use crate::cli::opts::*;

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use spacedeck_core::{apply_update, Card, CardUpdate, Deck, DeckId, Grade, NewCard, Repository};
use spacedeck_json::paths::data_root;
use spacedeck_json::JsonStore;
use spacedeck_sqlite::SqliteRepo;
use std::collections::HashMap;
use std::io::{stdin, stdout, Write};
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

pub async fn run_cli(args: Cli) -> Result<()> {
    let repo = open_repo(&args.store, args.data_dir.clone(), args.db_path.clone()).await?;
    let owner = args.owner.clone();
    match args.cmd {
        Command::Api(api) => {
            let addr: std::net::SocketAddr = api.addr.parse()?;
            api_server::run(repo, addr).await
        }
        Command::Deck(cmd) => deck_cmd(repo, &owner, cmd).await,
        Command::Card(cmd) => card_cmd(repo, &owner, cmd).await,
        Command::Review(cmd) => review_cmd(repo, &owner, cmd).await,
        Command::Grade(cmd) => grade_cmd(repo, cmd).await,
        Command::Export(cmd) => export_cmd(repo, &owner, cmd).await,
        Command::Import(cmd) => import_cmd(repo, &owner, cmd).await,
    }
}

pub async fn open_repo(
    store: &StoreKind,
    data_dir: Option<PathBuf>,
    db_path: Option<PathBuf>,
) -> Result<Arc<dyn Repository>> {
    match store {
        StoreKind::Json => {
            let s = match data_dir {
                Some(root) => JsonStore::open_in(&root).await?,
                None => JsonStore::open_default().await?,
            };
            tracing::info!(path = %s.path().display(), "using json store");
            Ok(Arc::new(s))
        }
        StoreKind::Sqlite => {
            let p = db_path.unwrap_or_else(|| {
                data_dir.unwrap_or_else(data_root).join("spacedeck.sqlite3")
            });
            if let Some(parent) = p.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            let s = SqliteRepo::open_file(&p).await?;
            tracing::info!(path = %p.display(), "using sqlite store");
            Ok(Arc::new(s))
        }
    }
}

async fn deck_cmd(repo: Arc<dyn Repository>, owner: &str, cmd: DeckCmd) -> Result<()> {
    let now = Utc::now();
    match cmd {
        DeckCmd::Add { name } => {
            let d = repo.create_deck(owner, &name).await?;
            println!("{}", d.id);
        }
        DeckCmd::List => {
            for d in repo.list_decks(Some(owner)).await? {
                let s = repo.deck_summary(d.id, now).await?;
                println!("{}\t{}\tcards={}\tdue={}", d.id, d.name, s.total_cards, s.due_cards);
            }
        }
        DeckCmd::Show { deck } => {
            let d = resolve_deck(&*repo, owner, &deck).await?;
            let s = repo.deck_summary(d.id, now).await?;
            println!("id:\t{}\nname:\t{}\nowner:\t{}", d.id, d.name, d.owner_id);
            println!("cards:\t{}\ndue:\t{}", s.total_cards, s.due_cards);
        }
        DeckCmd::Rm { deck } => {
            let d = resolve_deck(&*repo, owner, &deck).await?;
            repo.delete_deck(d.id).await?;
            println!("ok");
        }
    }
    Ok(())
}

async fn card_cmd(repo: Arc<dyn Repository>, owner: &str, cmd: CardCmd) -> Result<()> {
    match cmd {
        CardCmd::Add(a) => {
            let deck = resolve_deck(&*repo, owner, &a.deck).await?;
            let content = NewCard {
                front: a.front,
                back: a.back,
                language: a.language,
            };
            let c = repo.add_card(deck.id, &content).await?;
            println!("{}", c.id);
        }
        CardCmd::List { deck } => {
            let deck = resolve_deck(&*repo, owner, &deck).await?;
            for c in repo.list_cards(Some(deck.id)).await? {
                print_card_line(&c);
            }
        }
        CardCmd::Due { deck } => {
            let deck = resolve_deck(&*repo, owner, &deck).await?;
            let due = repo.due_cards(deck.id, Utc::now()).await?;
            if due.is_empty() {
                println!("no cards due");
            }
            for c in due {
                print_card_line(&c);
            }
        }
        CardCmd::Show { card_id } => {
            let c = repo.get_card(parse_uuid(&card_id)?).await?;
            println!("{}", serde_json::to_string_pretty(&c)?);
        }
        CardCmd::History { card_id } => {
            let id = parse_uuid(&card_id)?;
            repo.get_card(id).await?;
            for r in repo.list_reviews_for_card(id).await? {
                println!(
                    "{}\t{}\tinterval={}d\tease={:.2}",
                    r.reviewed_at.to_rfc3339(),
                    r.grade,
                    r.interval_days,
                    r.ease_factor
                );
            }
        }
        CardCmd::Rm { card_id } => {
            repo.delete_card(parse_uuid(&card_id)?).await?;
            println!("ok");
        }
        CardCmd::Edit(e) => {
            let edit = spacedeck_core::CardEdit {
                front: e.front,
                back: e.back,
            };
            if edit.is_empty() {
                bail!("nothing to edit: pass --front and/or --back");
            }
            repo.edit_card(parse_uuid(&e.card_id)?, &edit).await?;
            println!("ok");
        }
    }
    Ok(())
}

async fn review_cmd(repo: Arc<dyn Repository>, owner: &str, cmd: ReviewCmd) -> Result<()> {
    let deck = resolve_deck(&*repo, owner, &cmd.deck).await?;
    let pool = repo.due_cards(deck.id, Utc::now()).await?;
    if pool.is_empty() {
        println!("no cards due");
        return Ok(());
    }

    let total = pool.len().min(cmd.max);
    let mut count = 0usize;
    for card in pool.into_iter().take(cmd.max) {
        count += 1;
        println!("\n[{}/{}] {}", count, total, card.id);
        println!("Q: {}", card.front);
        prompt_enter("[enter=show]")?;
        println!("A: {}", card.back);
        println!("[0=Again, 1=Hard, 3=Medium, 4=Easy, 5=Very Easy, s=skip, q=quit]");
        let g = loop {
            let line = read_line("grade> ")?;
            match line.trim().to_lowercase().as_str() {
                "s" | "skip" => break None,
                "q" | "quit" => return Ok(()),
                other => match parse_grade_input(other) {
                    Some(g) => break Some(g),
                    None => println!("enter 0/1/3/4/5, s, or q"),
                },
            }
        };

        if let Some(grade) = g {
            let update = CardUpdate::Grade(grade.label().to_string());
            let updated = apply_update(&*repo, card.id, update, Utc::now()).await?;
            println!("→ next due in {} day(s)", updated.interval_days);
        }
    }

    println!("\nreviewed {}", count);
    Ok(())
}

async fn grade_cmd(repo: Arc<dyn Repository>, cmd: GradeCmd) -> Result<()> {
    let id = parse_uuid(&cmd.card_id)?;
    // Shortcuts map onto canonical labels; anything else is passed through verbatim.
    let label = match parse_grade_input(&cmd.grade.to_lowercase()) {
        Some(g) => g.label().to_string(),
        None => cmd.grade,
    };
    let c = apply_update(&*repo, id, CardUpdate::Grade(label), Utc::now()).await?;
    println!(
        "repetitions={}\tinterval={}d\tease={:.2}\tdue={}",
        c.repetitions,
        c.interval_days,
        c.ease_factor,
        c.due_at.to_rfc3339()
    );
    Ok(())
}

async fn export_cmd(repo: Arc<dyn Repository>, owner: &str, cmd: ExportCmd) -> Result<()> {
    match cmd {
        ExportCmd::Json { path } => {
            let decks = repo.list_decks(Some(owner)).await?;
            let mut cards = Vec::new();
            for d in &decks {
                cards.extend(repo.list_cards(Some(d.id)).await?);
            }
            let bundle = ExportBundle {
                version: 1,
                decks,
                cards,
            };
            let s = serde_json::to_string_pretty(&bundle)?;
            std::fs::write(&path, s)?;
            println!("wrote {}", path.display());
        }
    }
    Ok(())
}

async fn import_cmd(repo: Arc<dyn Repository>, owner: &str, cmd: ImportCmd) -> Result<()> {
    match cmd {
        ImportCmd::Json { path } => {
            let data = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let bundle: ExportBundle = serde_json::from_str(&data)?;
            if bundle.version != 1 {
                bail!("unsupported export version {}", bundle.version);
            }

            let mut deck_map: HashMap<DeckId, DeckId> = HashMap::new();
            for d in &bundle.decks {
                let target = ensure_deck_by_name(&*repo, owner, &d.name).await?;
                deck_map.insert(d.id, target.id);
            }

            let mut imported = 0usize;
            for c in bundle.cards {
                let Some(deck_id) = deck_map.get(&c.deck_id) else {
                    tracing::warn!(card_id = %c.id, "skipping card with unknown deck");
                    continue;
                };
                let content = NewCard {
                    front: c.front.clone(),
                    back: c.back.clone(),
                    language: c.language.clone(),
                };
                let fresh = repo.add_card(*deck_id, &content).await?;
                // keep the schedule and history the card had when exported
                let restored = Card {
                    id: fresh.id,
                    deck_id: fresh.deck_id,
                    ..c
                };
                repo.update_card(&restored).await?;
                imported += 1;
            }
            println!("imported {imported} card(s)");
        }
    }
    Ok(())
}

// ===== Helpers =====
fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|_| anyhow!("invalid uuid: {s}"))
}

/// Review-loop shortcuts and levels; full labels go through `Grade::from_label`.
fn parse_grade_input(s: &str) -> Option<Grade> {
    match s {
        "0" | "a" | "again" => Some(Grade::Again),
        "1" | "h" | "hard" => Some(Grade::Hard),
        "3" | "m" | "med" | "medium" => Some(Grade::Medium),
        "4" | "e" | "easy" => Some(Grade::Easy),
        "5" | "v" | "very easy" => Some(Grade::VeryEasy),
        _ => None,
    }
}

fn print_card_line(c: &Card) {
    println!(
        "{}\t{}\t{}\treps={}\tinterval={}d\tdue={}",
        c.id,
        c.front,
        c.back,
        c.repetitions,
        c.interval_days,
        c.due_at.to_rfc3339()
    );
}

async fn resolve_deck<R: Repository + ?Sized>(repo: &R, owner: &str, sel: &str) -> Result<Deck> {
    if let Ok(id) = Uuid::parse_str(sel) {
        if let Ok(d) = repo.get_deck(id).await {
            return Ok(d);
        }
    }
    let decks = repo.list_decks(Some(owner)).await?;
    if let Some(d) = decks.into_iter().find(|d| d.name.eq_ignore_ascii_case(sel.trim())) {
        return Ok(d);
    }
    bail!("deck not found: {}", sel)
}

async fn ensure_deck_by_name<R: Repository + ?Sized>(repo: &R, owner: &str, name: &str) -> Result<Deck> {
    let decks = repo.list_decks(Some(owner)).await?;
    if let Some(d) = decks.into_iter().find(|d| d.name.eq_ignore_ascii_case(name.trim())) {
        return Ok(d);
    }
    Ok(repo.create_deck(owner, name).await?)
}

fn prompt_enter(label: &str) -> Result<()> {
    read_line(label).map(|_| ())
}

fn read_line(prompt: &str) -> Result<String> {
    print!("{prompt}");
    stdout().flush().ok();
    let mut s = String::new();
    stdin().read_line(&mut s)?;
    Ok(s)
}

#[derive(serde::Serialize, serde::Deserialize)]
struct ExportBundle {
    version: u32,
    decks: Vec<Deck>,
    cards: Vec<Card>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use spacedeck_core::memory::MemoryRepo;

    #[test]
    fn shortcuts_map_to_grades() {
        assert_eq!(parse_grade_input("0"), Some(Grade::Again));
        assert_eq!(parse_grade_input("h"), Some(Grade::Hard));
        assert_eq!(parse_grade_input("2"), None);
        assert_eq!(parse_grade_input("very easy"), Some(Grade::VeryEasy));
    }

    #[tokio::test]
    async fn export_then_import_keeps_schedule() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.json");

        let src: Arc<dyn Repository> = Arc::new(MemoryRepo::new());
        let deck = src.create_deck("ana", "Rust").await.unwrap();
        let card = src.add_card(deck.id, &NewCard::new("a", "b")).await.unwrap();
        src.grade_card(card.id, "Easy", Utc::now()).await.unwrap();
        src.grade_card(card.id, "Easy", Utc::now()).await.unwrap();
        export_cmd(src, "ana", ExportCmd::Json { path: path.clone() })
            .await
            .unwrap();

        let dst: Arc<dyn Repository> = Arc::new(MemoryRepo::new());
        import_cmd(dst.clone(), "ben", ImportCmd::Json { path })
            .await
            .unwrap();

        let decks = dst.list_decks(Some("ben")).await.unwrap();
        assert_eq!(decks.len(), 1);
        let cards = dst.list_cards(Some(decks[0].id)).await.unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].repetitions, 2);
        assert_eq!(cards[0].interval_days, 6);
        assert_eq!(cards[0].total_reviews, 2);
    }
}
