//! Interactive command loop.
//!
//! Each line read from standard input is parsed into a [`Command`]. Commands
//! that change the session are forwarded as [`SessionEvent`]s, the rest only
//! render state.

use crate::agent::AgentFactory;
use crate::catalog::Category;
use crate::cli::OutputFormat;
use crate::dataset::PREVIEW_ROWS;
use crate::progress::SpinnerObserver;
use crate::report::{render_panels, render_preview, render_summary, write_report};
use crate::session::{EventOutcome, Session, SessionEvent, StartOutcome};
use anyhow::Result;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

const HELP: &str = "\
Commands:
  load <file>       Load a CSV file of posts
  categories        List analysis categories
  select <category> Select a category (name, label or number)
  start             Run the analysis for the selected category
  status            Show session state
  ask <question>    Ask a follow-up question about the data
  preview           Show the first rows of the dataset
  panels            Show the question panels and summary
  save [file]       Write the report
  help              Show this help
  quit              Leave";

/// One parsed line of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Load(PathBuf),
    Categories,
    Select(Category),
    Start,
    Status,
    Ask(String),
    Preview,
    Panels,
    Save(Option<PathBuf>),
    Help,
    Quit,
}

impl Command {
    /// Parse one input line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Command>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word.to_lowercase().as_str() {
            "load" | "upload" => {
                if rest.is_empty() {
                    return Err("usage: load <file>".to_string());
                }
                Command::Load(PathBuf::from(rest))
            }
            "categories" => Command::Categories,
            "select" => {
                if rest.is_empty() {
                    return Err("usage: select <category>".to_string());
                }
                Command::Select(rest.parse().map_err(|e| format!("{}", e))?)
            }
            "start" | "run" => Command::Start,
            "status" => Command::Status,
            "ask" => {
                if rest.is_empty() {
                    return Err("usage: ask <question>".to_string());
                }
                Command::Ask(rest.to_string())
            }
            "preview" => Command::Preview,
            "panels" | "show" => Command::Panels,
            "save" => Command::Save((!rest.is_empty()).then(|| PathBuf::from(rest))),
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(format!("unknown command '{}' (try 'help')", other)),
        };

        Ok(Some(command))
    }
}

/// Read commands from standard input until `quit` or end of input.
pub async fn run<F: AgentFactory>(
    session: &mut Session<F>,
    format: OutputFormat,
    default_output: PathBuf,
    quiet: bool,
) -> Result<()> {
    println!("postlens interactive mode. Type 'help' for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("⚠️  {}", e);
                continue;
            }
        };
        debug!("Command: {:?}", command);

        match command {
            Command::Quit => break,
            Command::Help => println!("{}", HELP),
            Command::Categories => print_categories(session.category()),
            Command::Status => print_status(session),
            Command::Preview => match session.dataset() {
                Some(dataset) => print!("{}", render_preview(&dataset.preview(PREVIEW_ROWS))),
                None => println!("⚠️  No dataset loaded. Use 'load <file>'."),
            },
            Command::Panels => print_panels(session),
            Command::Save(path) => {
                let path = path.unwrap_or_else(|| default_output.clone());
                match write_report(&session.report(), format, &path) {
                    Ok(()) => println!("✅ Report saved to: {}", path.display()),
                    Err(e) => println!("⚠️  {:#}", e),
                }
            }
            Command::Load(path) => dispatch(session, SessionEvent::Upload(path), quiet).await,
            Command::Select(category) => {
                dispatch(session, SessionEvent::SelectCategory(category), quiet).await
            }
            Command::Start => dispatch(session, SessionEvent::Start, quiet).await,
            Command::Ask(question) => dispatch(session, SessionEvent::Ask(question), quiet).await,
        }
    }

    Ok(())
}

/// Forward an event to the session and print what it changed.
async fn dispatch<F: AgentFactory>(session: &mut Session<F>, event: SessionEvent, quiet: bool) {
    let mut observer = SpinnerObserver::new(!quiet);
    let outcome = match session.handle(event, &mut observer).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!("Event rejected: {}", e);
            println!("⚠️  {}", e);
            return;
        }
    };
    drop(observer);

    match outcome {
        EventOutcome::Loaded(preview) => {
            println!("✅ Loaded {}", preview.file_name);
            print!("{}", render_preview(&preview));
        }
        EventOutcome::CategorySelected { changed: true } => {
            if let Some(category) = session.category() {
                println!("✅ Selected {}", category);
            }
        }
        EventOutcome::CategorySelected { changed: false } => {
            println!("Category unchanged; results kept.");
        }
        EventOutcome::Started(StartOutcome::Completed { invoked }) => {
            println!("\n✅ Analysis complete ({} agent calls)\n", invoked + 1);
            print_panels(session);
        }
        EventOutcome::Started(StartOutcome::AlreadyStarted(state)) => {
            println!(
                "Analysis already {} for this category. Select another category or load new data to rerun.",
                state.to_string().to_lowercase()
            );
        }
        EventOutcome::Answered(outcome) => {
            if outcome.is_error() {
                println!("⚠️  {}", outcome);
            } else {
                println!("{}", outcome);
            }
        }
    }
}

fn print_categories(selected: Option<Category>) {
    for (i, category) in Category::ALL.iter().enumerate() {
        let marker = if selected == Some(*category) { "*" } else { " " };
        println!(
            "{} {}. {} ({})",
            marker,
            i + 1,
            category,
            category.metrics().join(", ")
        );
    }
}

fn print_status<F: AgentFactory>(session: &Session<F>) {
    match session.dataset() {
        Some(dataset) => println!(
            "Dataset:  {} ({} rows, {} columns)",
            dataset.source(),
            dataset.row_count(),
            dataset.column_count()
        ),
        None => println!("Dataset:  (none)"),
    }
    match session.category() {
        Some(category) => println!("Category: {}", category),
        None => println!("Category: (none)"),
    }
    println!("State:    {} (epoch {})", session.state(), session.epoch());

    let results = session.results();
    println!(
        "Results:  {} answered, {} failed",
        results.len() - results.error_count(),
        results.error_count()
    );
    if !session.followups().is_empty() {
        println!("Follow-ups: {}", session.followups().len());
    }
    if let Some(error) = session.agent_error() {
        println!("Agent:    unavailable ({})", error);
    }
}

fn print_panels<F: AgentFactory>(session: &Session<F>) {
    let panels = session.panels();
    if panels.is_empty() {
        println!("No category selected. Use 'select <category>'.");
        return;
    }

    print!("{}", render_panels(&panels));
    if let Some(summary) = session.summary() {
        print!("{}", render_summary(summary));
    }
}
