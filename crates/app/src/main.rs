mod seed;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use prep_core::model::{CertificationId, UserId};
use services::{Clock, EngineConfig, StudyEngine};
use storage::Storage;

#[derive(Parser)]
#[command(name = "prep", version, about = "Certification study readiness engine")]
struct Cli {
    /// `SQLite` database URL or file path.
    #[arg(
        long,
        global = true,
        env = "PREP_DB_URL",
        default_value = "sqlite://prep.sqlite3"
    )]
    db: String,

    /// TOML file overriding engine tunables.
    #[arg(long, global = true, env = "PREP_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the demo certification and enroll a user in it
    Seed {
        #[arg(long, default_value_t = 1)]
        user: u64,
    },
    /// Print the readiness report for a user and certification
    Readiness {
        #[arg(long)]
        user: u64,
        #[arg(long, default_value_t = seed::DEMO_CERTIFICATION)]
        cert: u64,
    },
    /// Print today's study plan
    Plan {
        #[arg(long)]
        user: u64,
    },
    /// List SRS cards due now
    Due {
        #[arg(long)]
        user: u64,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Draw a blueprint-weighted practice exam
    Simulate {
        #[arg(long, default_value_t = seed::DEMO_CERTIFICATION)]
        cert: u64,
        #[arg(long)]
        size: Option<u32>,
    },
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("prep=info,services=info,storage=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(Cli::parse()).await {
        eprintln!("error: {err:#}");
        std::process::exit(2);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => EngineConfig::default(),
    };

    // Open + migrate SQLite at startup so the services stay storage-agnostic.
    let db_url = normalize_sqlite_url(&cli.db);
    prepare_sqlite_file(&db_url)?;
    let storage = Storage::sqlite(&db_url)
        .await
        .with_context(|| format!("opening {db_url}"))?;
    let clock = Clock::default_clock();
    let engine = StudyEngine::new(&storage, clock, config);

    match cli.command {
        Commands::Seed { user } => seed::seed_demo(&storage, clock, UserId::new(user)).await,
        Commands::Readiness { user, cert } => {
            let report = engine
                .compute_readiness(UserId::new(user), CertificationId::new(cert))
                .await?;
            print_json(&report)
        }
        Commands::Plan { user } => {
            let plan = engine.build_session_plan(UserId::new(user)).await?;
            print_json(&plan)
        }
        Commands::Due { user, limit } => {
            let cards = engine.due_cards(UserId::new(user), limit).await?;
            print_json(&cards)
        }
        Commands::Simulate { cert, size } => {
            let questions = engine
                .build_simulation(CertificationId::new(cert), size, &mut rand::rng())
                .await?;
            print_json(&questions)
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed == "sqlite::memory:" || trimmed.starts_with("sqlite://") {
        return trimmed.to_string();
    }

    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<()> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let Some(path) = db_url.strip_prefix("sqlite://") else {
        bail!("invalid --db value: {db_url}");
    };
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        bail!("invalid --db value: {db_url}");
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("creating {}", path.display()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_urls_pass_through() {
        assert_eq!(normalize_sqlite_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(
            normalize_sqlite_url("sqlite:///tmp/prep.db"),
            "sqlite:///tmp/prep.db"
        );
    }

    #[test]
    fn bare_paths_become_absolute_urls() {
        assert_eq!(normalize_sqlite_url("/var/prep.db"), "sqlite:///var/prep.db");
        assert_eq!(normalize_sqlite_url("sqlite:/var/prep.db"), "sqlite:///var/prep.db");
        let relative = normalize_sqlite_url("prep.db");
        assert!(relative.starts_with("sqlite:///"));
        assert!(relative.ends_with("/prep.db"));
    }

    #[test]
    fn rejects_non_file_urls() {
        assert!(prepare_sqlite_file("postgres://localhost/prep").is_err());
        assert!(prepare_sqlite_file("sqlite://").is_err());
        assert!(prepare_sqlite_file("sqlite::memory:").is_ok());
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["prep", "--db", "x.db", "due", "--user", "3", "--limit", "5"])
            .unwrap();
        assert_eq!(cli.db, "x.db");
        assert!(matches!(
            cli.command,
            Commands::Due {
                user: 3,
                limit: Some(5)
            }
        ));
    }
}
