mod desk;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use newsroom_core::{ContentId, Lead, LeadKind, NewsRoomId};
use newsroom_engine::{Config, Engine, Journal};
use newsroom_ledger::StatusReport;
use newsroom_ledger_sqlite::SqliteLedger;

#[derive(Parser)]
#[command(name = "newsroom", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LeadKindArg {
    File,
    Question,
    Email,
}

impl From<LeadKindArg> for LeadKind {
    fn from(k: LeadKindArg) -> Self {
        match k {
            LeadKindArg::File => LeadKind::File,
            LeadKindArg::Question => LeadKind::Question,
            LeadKindArg::Email => LeadKind::Email,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Create .newsroom/ with a default config (basic newsroom) and ledger
    Init,

    /// Validate configured newsrooms against the built-in roles
    Check,

    /// Submit a lead and wait for the content item to finish
    Run {
        #[arg(long, default_value = desk::BASIC)]
        newsroom: String,
        #[arg(long, value_enum, default_value_t = LeadKindArg::Question)]
        kind: LeadKindArg,
        #[arg(long)]
        content: String,
    },

    /// Show the recorded status of a content item
    Status {
        #[arg(long)]
        id: String,
    },

    /// Print the ledger of a content item
    History {
        #[arg(long)]
        id: String,
    },

    /// Resume every unfinished content item found in the ledger
    Resume,
}

fn load_config(root: &Path) -> Result<Config> {
    let cfg_path = Config::config_path(root);
    if cfg_path.exists() {
        return Config::load_from(&cfg_path);
    }
    let desk_name = root.file_name().and_then(|s| s.to_str()).unwrap_or("desk");
    let mut cfg = Config::default_for_desk(desk_name);
    cfg.newsrooms.push(desk::basic_newsroom());
    cfg.save_to(&cfg_path)?;
    Ok(cfg)
}

fn open_engine(root: &Path) -> Result<Engine> {
    let cfg = load_config(root)?;
    let ledger = SqliteLedger::open(&cfg.ledger_path(root))?;
    let registry = desk::registry()?;
    let engine = Engine::compose(&registry, &cfg.newsrooms, Arc::new(ledger), cfg.engine.clone())
        .context("compose newsrooms")?;
    Ok(match cfg.journal_dir(root) {
        Some(dir) => engine.with_journal(Journal::new(dir)),
        None => engine,
    })
}

fn print_status(status: &StatusReport) {
    println!("{} [{}] newsroom={} revisions={}", status.content_id, status.state, status.newsroom, status.revision_count);
    println!("  lead: {}", status.lead.preview());
    if let Some(draft) = &status.draft {
        println!("  draft: {}", draft.title);
    }
    if let Some(message) = &status.last_message {
        println!("  last message: #{} {} from {}", message.sequence, message.kind(), message.sender);
    }
    if let Some(location) = &status.published_at {
        println!("  published at: {location}");
    }
    if let Some(reason) = &status.reason {
        println!("  reason: {reason}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let root = std::env::current_dir()?;

    match cli.cmd {
        Command::Init => {
            let cfg = load_config(&root)?;
            let _ = SqliteLedger::open(&cfg.ledger_path(&root))?;
            println!("Initialized newsroom in {}", root.display());
        }
        Command::Check => {
            let cfg = load_config(&root)?;
            let registry = desk::registry()?;
            let catalog = newsroom_roles::NewsRoomCatalog::compose(&cfg.newsrooms, &registry)?;
            for id in catalog.ids() {
                println!("- {id}: OK");
            }
            println!("{} newsroom(s), {} role(s)", cfg.newsrooms.len(), registry.len());
        }
        Command::Run { newsroom, kind, content } => {
            let engine = open_engine(&root)?;
            let id = engine.submit(&NewsRoomId::from_str(newsroom), Lead::new(kind.into(), content))?;
            println!("Submitted {id}");
            let status = engine.wait(&id).await?;
            print_status(&status);
        }
        Command::Status { id } => {
            let engine = open_engine(&root)?;
            print_status(&engine.get_status(&ContentId::from_str(id))?);
        }
        Command::History { id } => {
            let engine = open_engine(&root)?;
            for entry in engine.history(&ContentId::from_str(id))? {
                println!("{}", entry.summary());
            }
        }
        Command::Resume => {
            let engine = open_engine(&root)?;
            let ids = engine.resume_unfinished()?;
            println!("Resumed {} item(s)", ids.len());
            for id in ids {
                print_status(&engine.wait(&id).await?);
            }
        }
    }

    Ok(())
}
