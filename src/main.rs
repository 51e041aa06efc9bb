//! postlens - LLM-powered social media post analyzer
//!
//! A CLI tool that loads a CSV export of post metrics, asks an LLM agent a
//! canned set of questions for the selected analysis category, and
//! summarizes the answers into actionable conclusions.
//!
//! Exit codes:
//!   0 - Success (individual question failures are reported, not fatal)
//!   1 - Runtime error (invalid arguments, config, dataset or agent setup)

mod agent;
mod analysis;
mod catalog;
mod cli;
mod config;
mod dataset;
mod interactive;
mod models;
mod progress;
mod report;
mod session;

use agent::{AgentFactory, OpenAiAgentFactory};
use anyhow::{anyhow, Context, Result};
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE};
use dataset::{DatasetLoader, DatasetPreview, PREVIEW_ROWS};
use progress::SpinnerObserver;
use session::{Session, StartOutcome};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Name used for datasets read from standard input.
const STDIN_NAME: &str = "stdin.csv";

#[tokio::main]
async fn main() -> Result<()> {
    // Credentials may live in a .env file
    dotenv::dotenv().ok();

    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    let mut config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    // Initialize logging
    init_logging(&args, &config);

    info!("postlens v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    let outcome = if args.preview {
        handle_preview(&args)
    } else if args.interactive {
        run_interactive(&args, &config).await
    } else {
        run_batch(&args, &config).await
    };

    if let Err(e) = outcome {
        error!("Run failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .postlens.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to customize model, endpoint, default category, and more.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args, config: &Config) {
    let mut level = args.log_level();
    if config.general.verbose && !args.quiet {
        level = tracing::Level::DEBUG;
    }

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok(config),
        Ok(None) => Ok(Config::default()),
        Err(e) => {
            eprintln!("⚠️  Ignoring {}: {:#}", CONFIG_FILE, e);
            Ok(Config::default())
        }
    }
}

/// Report path: `--output`, else the configured default. JSON reports
/// swap a default `.md` extension for `.json`.
fn output_path(args: &Args, config: &Config) -> PathBuf {
    let path = PathBuf::from(&config.general.output);
    if args.output.is_none()
        && args.format == OutputFormat::Json
        && path.extension().is_some_and(|ext| ext == "md")
    {
        return path.with_extension("json");
    }
    path
}

fn is_stdin(path: &Path) -> bool {
    path.as_os_str() == "-"
}

fn read_stdin() -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    std::io::stdin()
        .read_to_end(&mut buf)
        .context("Failed to read dataset from standard input")?;
    Ok(buf)
}

/// Load `data` into the session, building its agent.
fn load_into<F: AgentFactory>(session: &mut Session<F>, data: &Path) -> Result<DatasetPreview> {
    let preview = if is_stdin(data) {
        let bytes = read_stdin()?;
        session.upload_bytes(STDIN_NAME, &bytes)?
    } else {
        session.upload(data)?
    };
    Ok(preview)
}

fn build_factory(config: &Config) -> OpenAiAgentFactory {
    let factory =
        OpenAiAgentFactory::from_env(config.agent_settings(), &config.model.api_key_env);
    if factory.has_credential() {
        debug!("Credential found in {}", config.model.api_key_env);
    } else {
        warn!("{} is not set", config.model.api_key_env);
    }
    factory
}

fn print_agent_settings(factory: &OpenAiAgentFactory) {
    let settings = factory.settings();
    println!("🤖 Agent settings:");
    println!("   Model: {}", settings.model_name);
    println!("   Endpoint: {}", settings.api_url);
    println!("   Temperature: {}", settings.temperature);
    println!("   Timeout: {}s", settings.timeout_seconds);
    println!("   Context rows: {}", settings.max_context_rows);
}

/// Handle --preview: load the dataset, show its first rows, exit.
fn handle_preview(args: &Args) -> Result<()> {
    let data = args
        .data
        .as_deref()
        .ok_or_else(|| anyhow!("--preview needs --data"))?;

    let mut loader = DatasetLoader::new();
    let dataset = if is_stdin(data) {
        loader.load_bytes(STDIN_NAME, &read_stdin()?)?
    } else {
        loader.load_path(data)?
    };

    println!("{}", report::render_preview(&dataset.preview(PREVIEW_ROWS)));
    println!("Columns: {}", dataset.columns().join(", "));
    println!("\n✅ Preview complete. No LLM calls were made.");
    Ok(())
}

/// Run the load, select, start workflow once and write the report.
async fn run_batch(args: &Args, config: &Config) -> Result<()> {
    let start_time = Instant::now();

    let data = args
        .data
        .as_deref()
        .ok_or_else(|| anyhow!("--data is required in batch mode"))?;
    let category = config.general.default_category.ok_or_else(|| {
        anyhow!("No analysis category given. Use --category or set general.default_category")
    })?;

    let factory = build_factory(config);
    if !args.quiet {
        print_agent_settings(&factory);
    }
    let mut session = Session::new(factory);

    // Step 1: Load the dataset and bind an agent to it
    println!("\n📥 Loading dataset: {}", data.display());
    let preview = load_into(&mut session, data)?;
    if !args.quiet {
        println!("{}", report::render_preview(&preview));
    }

    // Step 2: Run every question of the category, then the summary
    session.select_category(category);
    println!("🔬 Running analysis: {}\n", category);

    let mut observer = SpinnerObserver::new(!args.quiet);
    let invoked = match session.start(&mut observer).await? {
        StartOutcome::Completed { invoked } => invoked,
        StartOutcome::AlreadyStarted(state) => {
            return Err(anyhow!("analysis unexpectedly already {}", state));
        }
    };
    drop(observer);
    info!("{} question calls made", invoked);

    // Step 3: Show the results
    println!();
    print!("{}", report::render_panels(&session.panels()));
    if let Some(summary) = session.summary() {
        print!("{}", report::render_summary(summary));
    }

    // Step 4: Save the report
    let output = output_path(args, config);
    report::write_report(&session.report(), args.format, &output)?;

    let results = session.results();
    let failed = results.error_count();
    println!("\n📊 Analysis Summary:");
    println!("   Category: {}", category);
    println!("   Questions answered: {}", results.len() - failed);
    if failed > 0 {
        println!("   Questions failed: {}", failed);
    }
    println!("   Duration: {:.1}s", start_time.elapsed().as_secs_f64());
    println!(
        "\n✅ Analysis complete! Report saved to: {}",
        output.display()
    );

    Ok(())
}

/// Preload anything given on the command line, then hand over to the command loop.
async fn run_interactive(args: &Args, config: &Config) -> Result<()> {
    let factory = build_factory(config);
    if !args.quiet {
        print_agent_settings(&factory);
    }
    let mut session = Session::new(factory);

    if let Some(ref data) = args.data {
        match load_into(&mut session, data) {
            Ok(preview) => println!("✅ Loaded {}", preview.file_name),
            Err(e) => println!("⚠️  {:#}", e),
        }
    }
    if let Some(category) = config.general.default_category {
        session.select_category(category);
        println!("✅ Selected {}", category);
    }

    interactive::run(&mut session, args.format, output_path(args, config), args.quiet).await
}
