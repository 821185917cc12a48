// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{bail, Context, Result};
use rusqlite::Connection;
use std::env;
use std::path::{Path, PathBuf};

// Use library instead of local modules
use wellness_chat::db::count_knowledge_entries;
use wellness_chat::{load_qna_csv, replace_knowledge_base, setup_database, AppConfig, ChatEngine};

/// Parsed command line
#[derive(Debug, PartialEq)]
enum Command {
    Import { csv: Option<PathBuf> },
    History { username: String, limit: Option<usize> },
    Chat { user: Option<String>, language: Option<String> },
}

fn parse_args(args: &[String]) -> Result<Command> {
    let mut rest = args.iter().skip(1).map(String::as_str).peekable();

    let command = match rest.peek().copied() {
        Some("import") => {
            rest.next();
            Command::Import {
                csv: rest.next().map(PathBuf::from),
            }
        }
        Some("history") => {
            rest.next();
            let username = rest
                .next()
                .context("usage: wellness-chat history <username> [--limit N]")?
                .to_string();
            let mut limit = None;
            while let Some(flag) = rest.next() {
                match flag {
                    "--limit" => {
                        let value = rest.next().context("--limit needs a number")?;
                        limit = Some(value.parse().context("--limit needs a number")?);
                    }
                    other => bail!("unknown option: {}", other),
                }
            }
            Command::History { username, limit }
        }
        _ => {
            if rest.peek().copied() == Some("chat") {
                rest.next();
            }
            let mut user = None;
            let mut language = None;
            while let Some(flag) = rest.next() {
                match flag {
                    "--user" => user = Some(rest.next().context("--user needs a name")?.to_string()),
                    "--lang" => language = Some(rest.next().context("--lang needs a code")?.to_string()),
                    other => bail!("unknown option: {}", other),
                }
            }
            Command::Chat { user, language }
        }
    };

    Ok(command)
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let command = parse_args(&args)?;
    let config = AppConfig::load().context("failed to load configuration")?;

    match command {
        Command::Import { csv } => {
            init_logging();
            run_import(&config, csv)
        }
        Command::History { username, limit } => {
            init_logging();
            run_history(&config, &username, limit)
        }
        // UI mode (default); logging would draw over the terminal
        Command::Chat { user, language } => run_ui_mode(&config, user, language),
    }
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_import(config: &AppConfig, csv: Option<PathBuf>) -> Result<()> {
    println!("🗄️  Knowledge Import - CSV → SQLite + WAL");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // Paths
    let csv_path = csv.unwrap_or_else(|| PathBuf::from(&config.knowledge.csv_path));
    let db_path = Path::new(&config.database.path);

    // 1. Load CSV
    println!("\n📂 Loading {}...", csv_path.display());
    let records = load_qna_csv(&csv_path)?;
    println!("✓ Loaded {} question/answer pairs from CSV", records.len());

    // 2. Setup database
    println!("\n🔧 Setting up database...");
    let conn = Connection::open(db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;
    setup_database(&conn)?;
    println!("✓ Database initialized with WAL mode");

    // 3. Replace knowledge base
    println!("\n💾 Replacing knowledge base...");
    let stats = replace_knowledge_base(&conn, &records)?;

    // 4. Verify count
    println!("\n🔍 Verifying database...");
    let count = count_knowledge_entries(&conn)?;
    println!("✓ Database contains {} entries", count);

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ Import complete!");
    println!("✓ Inserted: {}", stats.inserted);
    if stats.duplicates > 0 {
        println!("✓ Duplicates skipped: {}", stats.duplicates);
    }

    Ok(())
}

fn run_history(config: &AppConfig, username: &str, limit: Option<usize>) -> Result<()> {
    let conn = open_existing_db(config)?;
    let engine = ChatEngine::new(config, std::sync::Arc::new(wellness_chat::translation::DisabledTranslator))?;

    let history = engine.history(&conn, username, limit)?;
    println!(
        "🗂️  {} ({}) - {} turns",
        history.user.username,
        history.user.language,
        history.turns.len()
    );
    for turn in history.turns {
        println!(
            "[{}] {:>4}: {}",
            turn.timestamp.format("%Y-%m-%d %H:%M"),
            turn.sender.as_str(),
            turn.message
        );
    }

    Ok(())
}

fn open_existing_db(config: &AppConfig) -> Result<Connection> {
    let db_path = Path::new(&config.database.path);

    if !db_path.exists() {
        eprintln!("❌ Database not found!");
        eprintln!("   Run: wellness-chat import");
        eprintln!("   to load the knowledge base first.");
        std::process::exit(1);
    }

    let conn = Connection::open(db_path)?;
    setup_database(&conn)?;
    Ok(conn)
}

#[cfg(feature = "tui")]
fn run_ui_mode(config: &AppConfig, user: Option<String>, language: Option<String>) -> Result<()> {
    println!("🖥️  Loading Wellness Chat...\n");

    let conn = open_existing_db(config)?;

    println!("📚 Loading knowledge base...");
    let knowledge = wellness_chat::KnowledgeBase::load(&conn)?;
    println!("✓ Loaded {} entries\n", knowledge.len());

    let translator = wellness_chat::translation::from_config(&config.translation)?;
    let engine = ChatEngine::new(config, translator)?;

    println!("Starting chat... (Press Esc to quit)\n");

    let mut app = ui::App::new(engine, conn, knowledge, user, language);
    ui::run_ui(&mut app)?;

    println!("\n✅ Chat closed");

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_config: &AppConfig, _user: Option<String>, _language: Option<String>) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the API: cargo run --bin wellness-server --features server");
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("wellness-chat")
            .chain(list.iter().copied())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_default_is_guest_chat() {
        assert_eq!(
            parse_args(&args(&[])).unwrap(),
            Command::Chat {
                user: None,
                language: None
            }
        );
    }

    #[test]
    fn test_chat_flags() {
        assert_eq!(
            parse_args(&args(&["chat", "--user", "alice", "--lang", "hi"])).unwrap(),
            Command::Chat {
                user: Some("alice".to_string()),
                language: Some("hi".to_string())
            }
        );
        // "chat" is optional
        assert!(matches!(
            parse_args(&args(&["--user", "bob"])).unwrap(),
            Command::Chat { user: Some(_), .. }
        ));
    }

    #[test]
    fn test_import_with_and_without_path() {
        assert_eq!(
            parse_args(&args(&["import"])).unwrap(),
            Command::Import { csv: None }
        );
        assert_eq!(
            parse_args(&args(&["import", "data/qna.csv"])).unwrap(),
            Command::Import {
                csv: Some(PathBuf::from("data/qna.csv"))
            }
        );
    }

    #[test]
    fn test_history_arguments() {
        assert_eq!(
            parse_args(&args(&["history", "alice", "--limit", "5"])).unwrap(),
            Command::History {
                username: "alice".to_string(),
                limit: Some(5)
            }
        );
        assert!(parse_args(&args(&["history"])).is_err());
        assert!(parse_args(&args(&["history", "alice", "--limit", "many"])).is_err());
        assert!(parse_args(&args(&["chat", "--verbose"])).is_err());
    }
}
