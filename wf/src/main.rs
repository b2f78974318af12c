//! Wayfinder - conversational strategy-discovery coach
//!
//! CLI entry point: an interactive coaching REPL plus read commands over the
//! session store.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::{debug, info};

use wayfinder::cli::{Cli, Command, OutputFormat};
use wayfinder::config::Config;
use wayfinder::llm::create_client;
use wayfinder::service::{CoachService, TurnReply};
use wayfinder::state::SessionManager;

fn setup_logging(cli_log_level: Option<&str>) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wayfinder")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let level = match cli_log_level.map(|s| s.to_uppercase()) {
        Some(s) => match s.as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            other => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", other);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("wayfinder.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!(has_command = cli.command.is_some(), "main: dispatching command");
    match cli.command {
        Some(Command::Sessions { format }) => cmd_sessions(&config, format).await,
        Some(Command::Show { id, format }) => cmd_show(&config, &id, format).await,
        Some(Command::Chat { session }) => cmd_chat(&config, session).await,
        None => cmd_chat(&config, None).await,
    }
}

fn spawn_manager(config: &Config) -> Result<SessionManager> {
    let store_dir = PathBuf::from(&config.storage.store_dir);
    SessionManager::spawn_sqlite(&store_dir).context("Failed to open session store")
}

/// Interactive coaching REPL
async fn cmd_chat(config: &Config, resume: Option<String>) -> Result<()> {
    debug!(?resume, "cmd_chat: called");

    // Fail fast on a missing API key before entering the loop
    config
        .llm
        .get_api_key()
        .context("LLM API key not found. Check api-key-env in your config.")?;

    let manager = spawn_manager(config)?;
    let llm = create_client(&config.llm).context("Failed to create LLM client")?;
    let service = CoachService::new(manager, llm, config.methodology.clone());

    let session_id = match resume {
        Some(id) => {
            let session = service
                .get_session(&id)
                .await
                .context(format!("Cannot resume session '{}'", id))?;
            println!("Resuming session {} ({}/{})\n", session.id, session.phase, session.stage);
            // Replay the last coach message so the user knows where they left off
            if let Some(last) = session.messages.last() {
                println!("{}\n", last.content.cyan());
            }
            session.id
        }
        None => {
            let session = service.start_session(HashMap::new()).await?;
            println!("Session {}\n", session.id);
            if let Some(greeting) = session.messages.first() {
                println!("{}\n", greeting.content.cyan());
            }
            session.id
        }
    };

    let mut editor = DefaultEditor::new().context("Failed to start line editor")?;
    println!("{}", "Type your answer, or 'exit' to leave. Your session is saved after every turn.".dimmed());

    loop {
        let line = match editor.readline("you> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("Saved. Resume any time with: wf chat --session {}", session_id);
                break;
            }
            Err(e) => return Err(e).context("Readline failure"),
        };

        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if message.eq_ignore_ascii_case("exit") || message.eq_ignore_ascii_case("quit") {
            println!("Saved. Resume any time with: wf chat --session {}", session_id);
            break;
        }
        let _ = editor.add_history_entry(message);

        let reply = service.process_turn(&session_id, message).await?;
        print_reply(&reply);

        if reply.concluded {
            println!("{}", "The journey is complete. See the full record with: wf show".dimmed());
            break;
        }
    }

    Ok(())
}

fn print_reply(reply: &TurnReply) {
    println!("\n{}\n", reply.reply.cyan());
    let mut status = format!("[{}/{}]", reply.phase, reply.stage);
    if reply.phase_complete && !reply.concluded {
        status.push_str("  phase complete - say \"ready\" to move on");
    }
    println!("{}", status.dimmed());
}

/// List stored sessions
async fn cmd_sessions(config: &Config, format: OutputFormat) -> Result<()> {
    debug!(?format, "cmd_sessions: called");
    let manager = spawn_manager(config)?;
    let sessions = manager.list().await?;

    match format {
        OutputFormat::Json => {
            let entries: Vec<serde_json::Value> = sessions
                .iter()
                .map(|s| {
                    serde_json::json!({
                        "id": s.id,
                        "version": s.version,
                        "updated_at": s.updated_at,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        OutputFormat::Text => {
            if sessions.is_empty() {
                println!("No stored sessions.");
                return Ok(());
            }
            println!("{:<40} {:>8}  {}", "ID", "TURNS", "UPDATED");
            println!("{}", "-".repeat(75));
            for session in sessions {
                let updated = chrono::DateTime::from_timestamp_millis(session.updated_at)
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                    .unwrap_or_else(|| session.updated_at.to_string());
                println!("{:<40} {:>8}  {}", session.id, session.version, updated);
            }
        }
    }

    Ok(())
}

/// Show one session's transcript and state
async fn cmd_show(config: &Config, id: &str, format: OutputFormat) -> Result<()> {
    debug!(%id, ?format, "cmd_show: called");
    let manager = spawn_manager(config)?;

    let session = match manager.get(id).await? {
        Some(session) => session,
        None => {
            eprintln!("No such session: {}", id);
            std::process::exit(1);
        }
    };

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&session)?);
        }
        OutputFormat::Text => {
            println!("Session {}", session.id);
            println!(
                "Phase: {}/{}  turns: {}  complete: {}  concluded: {}",
                session.phase, session.stage, session.interaction_count, session.phase_complete, session.concluded
            );
            for phase_output in [
                ("WHY", &session.why_output),
                ("HOW", &session.how_output),
                ("WHAT", &session.what_output),
            ] {
                if let (label, Some(output)) = phase_output {
                    println!("\n{} output:\n{}", label, output.summary());
                }
            }
            println!("\nTranscript:");
            for message in &session.messages {
                let role = match message.role {
                    wayfinder::domain::Role::User => "you".bold(),
                    wayfinder::domain::Role::Assistant => "coach".cyan(),
                    wayfinder::domain::Role::System => "system".dimmed(),
                };
                println!("{}: {}", role, message.content);
            }
        }
    }

    Ok(())
}
