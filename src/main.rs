use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::io::Read;
use std::path::PathBuf;

use triage::classifier::ErrorClassifier;
use triage::config::Config;
use triage::context::{CodebaseContext, ContextAnalyzer, ContextBuilder};
use triage::export::{self, OutputFormat};
use triage::learning::{FixOutcome, JsonFileStorage, PatternStore, RecordContext};
use triage::parser::ErrorParser;

#[derive(Parser)]
#[command(name = "triage", about = "Parse, classify, and learn from linter and compiler output")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse raw tool output into structured errors
    Parse {
        /// Input file; reads stdin when omitted
        input: Option<PathBuf>,
        /// Source profile name, or "auto" to sniff one
        #[arg(long, default_value = "auto")]
        source: String,
        #[arg(long, default_value = "summary")]
        format: String,
    },
    /// Parse and classify tool output
    Classify {
        input: Option<PathBuf>,
        #[arg(long, default_value = "auto")]
        source: String,
        #[arg(long, default_value = "summary")]
        format: String,
        /// Record the classified errors into the learning store
        #[arg(long)]
        record: bool,
    },
    /// Parse, classify, and estimate blast radius against a codebase
    Analyze {
        input: Option<PathBuf>,
        #[arg(long, default_value = "auto")]
        source: String,
        #[arg(long, default_value = "summary")]
        format: String,
        /// Project root to build the dependency graph from
        #[arg(long)]
        project_root: Option<PathBuf>,
        #[arg(long)]
        record: bool,
    },
    /// Query accumulated cross-session insights
    Insights {
        #[arg(long, default_value = "summary")]
        format: String,
    },
    /// Report the outcome of a fix attempt back into the learning store
    RecordFix {
        /// The diagnostic line the fix addressed
        input: Option<PathBuf>,
        #[arg(long, default_value = "auto")]
        source: String,
        #[arg(long)]
        fix_method: String,
        #[arg(long)]
        success: bool,
        #[arg(long, default_value_t = 0)]
        duration_ms: u64,
        #[arg(long)]
        auto_applied: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_target(false)
        .init();

    let config = Config::ensure_config_exists().unwrap_or_default();
    let cli = Cli::parse();

    let result = run(cli, &config).await;
    if let Err(e) = &result {
        eprintln!("{}: {:#}", "Error".red().bold(), e);
    }
    result
}

async fn run(cli: Cli, config: &Config) -> Result<()> {
    match cli.command {
        Command::Parse {
            input,
            source,
            format,
        } => {
            let text = read_input(input)?;
            let format: OutputFormat = format.parse()?;
            let result = ErrorParser::new()?.parse(&text, &source)?;
            print!("{}", export::render_parse(&result, format)?);
        }
        Command::Classify {
            input,
            source,
            format,
            record,
        } => {
            let text = read_input(input)?;
            let format: OutputFormat = format.parse()?;
            let parsed = ErrorParser::new()?.parse(&text, &source)?;
            let result = ErrorClassifier::new()?.classify(&parsed.errors);

            if record {
                record_errors(config, &result.errors).await?;
            }
            print!("{}", export::render_classification(&result, format)?);
        }
        Command::Analyze {
            input,
            source,
            format,
            project_root,
            record,
        } => {
            let text = read_input(input)?;
            let format: OutputFormat = format.parse()?;
            let parsed = ErrorParser::new()?.parse(&text, &source)?;
            let classified = ErrorClassifier::new()?.classify(&parsed.errors);

            let context = match project_root {
                Some(root) => ContextBuilder::new(root)?.build()?,
                None => CodebaseContext::empty(),
            };
            let analyzer = ContextAnalyzer::new(config.analysis.max_related_files);
            let result = analyzer.analyze(&classified.errors, &context);

            if record {
                record_errors(config, &classified.errors).await?;
            }
            print!("{}", export::render_context(&result, format)?);
        }
        Command::Insights { format } => {
            let format: OutputFormat = format.parse()?;
            let mut store = open_store(config)?;
            store.load().await?;
            let insights = store.analyze_patterns();
            print!("{}", export::render_insights(&insights, format)?);
        }
        Command::RecordFix {
            input,
            source,
            fix_method,
            success,
            duration_ms,
            auto_applied,
        } => {
            let text = read_input(input)?;
            let parsed = ErrorParser::new()?.parse(&text, &source)?;
            let classified = ErrorClassifier::new()?.classify(&parsed.errors);
            let error = classified
                .errors
                .first()
                .context("no diagnostic found in the input")?;

            let mut store = open_store(config)?;
            store.load().await?;
            store.record_fix_attempt(
                error,
                &FixOutcome {
                    fix_method,
                    success,
                    confidence: error.confidence as f64 / 100.0,
                    duration_ms,
                    was_auto_applied: auto_applied,
                },
                &RecordContext::default(),
            );
            store.save().await?;
            println!("{}", "Fix outcome recorded".green());
        }
    }

    Ok(())
}

fn open_store(config: &Config) -> Result<PatternStore> {
    let path = config.store_path()?;
    PatternStore::new(
        Box::new(JsonFileStorage::new(path)),
        config.analysis.clone(),
    )
}

async fn record_errors(
    config: &Config,
    errors: &[triage::classifier::ClassifiedError],
) -> Result<()> {
    let mut store = open_store(config)?;
    store.load().await?;
    let context = RecordContext::default();
    for error in errors {
        store.record_error(error, &context);
    }
    // A failed save is reported but does not invalidate the output above.
    if let Err(e) = store.save().await {
        eprintln!("{}: failed to persist patterns: {:#}", "Warning".yellow(), e);
    }
    Ok(())
}

fn read_input(path: Option<PathBuf>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            Ok(text)
        }
    }
}
