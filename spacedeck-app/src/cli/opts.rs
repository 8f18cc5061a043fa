use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, ValueEnum)]
pub enum StoreKind {
    Json,
    Sqlite,
}

#[derive(Debug, Parser, Clone)]
#[command(name = "spacedeck", version, about = "SpaceDeck spaced-repetition CLI/API")]
pub struct Cli {
    /// Storage backend (applies to CLI and API)
    #[arg(long, value_enum, env = "SPACEDECK_STORE", default_value_t = StoreKind::Json)]
    pub store: StoreKind,

    /// SQLite DB path when --store sqlite (defaults to the data dir)
    #[arg(long, env = "SPACEDECK_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Directory for the JSON store and default SQLite file
    #[arg(long, env = "SPACEDECK_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Account that owns the decks managed from the CLI
    #[arg(long, env = "SPACEDECK_OWNER", default_value = "local")]
    pub owner: String,

    /// Log filter, e.g. "info" or "spacedeck=debug,tower_http=debug"
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log: String,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Deck operations
    #[command(subcommand)]
    Deck(DeckCmd),
    /// Card operations
    #[command(subcommand)]
    Card(CardCmd),
    /// Interactive review of due cards
    Review(ReviewCmd),
    /// Grade one card without the interactive loop
    Grade(GradeCmd),
    /// Export data
    #[command(subcommand)]
    Export(ExportCmd),
    /// Import data
    #[command(subcommand)]
    Import(ImportCmd),
    /// Launch Axum HTTP API
    Api(ApiCmd),
}

#[derive(Debug, Subcommand, Clone)]
pub enum DeckCmd {
    Add { name: String },
    List,
    Show { deck: String },
    Rm { deck: String },
}

#[derive(Debug, Subcommand, Clone)]
pub enum CardCmd {
    Add(CardAdd),
    List { #[arg(long)] deck: String },
    Due { #[arg(long)] deck: String },
    Show { card_id: String },
    History { card_id: String },
    Rm { card_id: String },
    Edit(CardEdit),
}

#[derive(Debug, Args, Clone)]
pub struct CardAdd {
    #[arg(long)]
    pub deck: String,
    #[arg(long)]
    pub front: String,
    #[arg(long)]
    pub back: String,
    /// Free-form tag such as a programming language
    #[arg(long)]
    pub language: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct CardEdit {
    pub card_id: String,
    #[arg(long)]
    pub front: Option<String>,
    #[arg(long)]
    pub back: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct ReviewCmd {
    #[arg(long)]
    pub deck: String,
    #[arg(long, default_value_t = 50)]
    pub max: usize,
}

#[derive(Debug, Args, Clone)]
pub struct GradeCmd {
    pub card_id: String,
    /// Grade label ("Review again!", "Hard", "Medium", "Easy", "Very Easy") or its shortcut
    pub grade: String,
}

#[derive(Debug, Subcommand, Clone)]
pub enum ExportCmd {
    Json { path: PathBuf },
}

#[derive(Debug, Subcommand, Clone)]
pub enum ImportCmd {
    Json { path: PathBuf },
}

#[derive(Debug, Args, Clone)]
pub struct ApiCmd {
    /// Bind address (host:port)
    #[arg(long, env = "SPACEDECK_ADDR", default_value = "127.0.0.1:8080")]
    pub addr: String,
}
