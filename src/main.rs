use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn, Level};

use starindex::dictionary::StaticDictionary;
use starindex::index_advisor::{duplicate_key_check, AdviceReport, AdvisorConfig, IndexAdvisor};
use starindex::types::IndexCandidate;

#[derive(Parser)]
#[command(name = "starindex")]
#[command(about = "Index advisor for MySQL queries based on three-star index design")]
#[command(version)]
#[command(long_about = "Starindex reads SQL statements and proposes secondary indexes for them. With a schema snapshot it builds composite indexes ordered by column selectivity, bounds key length, and reconciles the advice with existing indexes. Without one it suggests single-column indexes from the statement text alone.")]
#[command(after_help = "EXAMPLES:
    # Advise on a single query without schema information
    starindex advise -q \"SELECT * FROM orders WHERE status = 'paid'\"

    # Use a schema snapshot for composite, length-checked advice
    starindex advise -s schema.json -f slow_queries.sql --format json

    # Allow proposals that drop indexes made redundant by the advice
    starindex advise -s schema.json -q \"SELECT ...\" --allow-drop-index

    # Report existing indexes that duplicate each other
    starindex duplicate-keys -s schema.json -d shop")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Set log level explicitly
    #[arg(long, global = true, value_enum)]
    log_level: Option<LogLevel>,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(ValueEnum, Clone, Debug)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Propose indexes for SQL statements
    #[command(long_about = "Propose ALTER TABLE statements that add (and optionally drop) indexes for the given SQL. Queries passed with --query are advised in parallel; a --file is advised as one script.")]
    Advise {
        /// SQL statement to advise on, may be repeated
        #[arg(short, long, value_name = "SQL")]
        query: Vec<String>,

        /// File containing SQL statements
        #[arg(short, long, value_name = "FILE")]
        file: Option<PathBuf>,

        /// JSON schema snapshot used as data dictionary
        #[arg(short, long, value_name = "FILE")]
        schema: Option<PathBuf>,

        /// JSON advisor configuration
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Database assumed for unqualified tables
        #[arg(short, long)]
        database: Option<String>,

        /// Propose dropping existing indexes that the advice makes redundant
        #[arg(long)]
        allow_drop_index: bool,

        /// Output format for the advice report
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Write the report to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Find existing indexes that duplicate each other
    #[command(long_about = "Scan the indexes of a schema snapshot and report every index whose columns lead another index of the same table.")]
    DuplicateKeys {
        /// JSON schema snapshot used as data dictionary
        #[arg(short, long, value_name = "FILE")]
        schema: PathBuf,

        /// Databases to scan, defaults to the snapshot's default database
        #[arg(short, long)]
        database: Vec<String>,

        /// Output format for the findings
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

#[derive(ValueEnum, Clone, Debug)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_logging(&cli)?;

    info!("Starting starindex v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Advise {
            query,
            file,
            schema,
            config,
            database,
            allow_drop_index,
            format,
            output,
        } => {
            let result = execute_advise(
                query,
                file.as_deref(),
                schema.as_deref(),
                config.as_deref(),
                database,
                allow_drop_index,
                format,
                output.as_deref(),
            );
            if let Err(e) = result {
                eprintln!("Advice failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Commands::DuplicateKeys { schema, database, format } => {
            if let Err(e) = execute_duplicate_keys(&schema, &database, format) {
                eprintln!("Duplicate key check failed: {:#}", e);
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn execute_advise(
    queries: Vec<String>,
    file: Option<&Path>,
    schema: Option<&Path>,
    config: Option<&Path>,
    database: Option<String>,
    allow_drop_index: bool,
    format: OutputFormat,
    output: Option<&Path>,
) -> Result<()> {
    let mut config = match config {
        Some(path) => AdvisorConfig::from_file(path).with_context(|| format!("cannot load config {:?}", path))?,
        None => AdvisorConfig::default(),
    };
    if let Some(database) = database {
        config.default_database = database;
    }
    config.allow_drop_index |= allow_drop_index;
    config.validate()?;

    let advisor = match schema {
        Some(path) => {
            let dictionary =
                StaticDictionary::from_file(path).with_context(|| format!("cannot load schema {:?}", path))?;
            IndexAdvisor::with_dictionary(config.clone(), Arc::new(dictionary))
        }
        None => {
            info!("No schema snapshot given, advising single-column indexes only");
            IndexAdvisor::new(config.clone())
        }
    };

    if queries.is_empty() && file.is_none() {
        anyhow::bail!("nothing to advise on, pass --query or --file");
    }

    let mut candidates: Vec<IndexCandidate> = Vec::new();
    let mut failed = 0;
    for advice in advisor.advise_batch(&queries) {
        match advice.error {
            Some(error) => {
                warn!("Query not advised: {}", error);
                failed += 1;
            }
            None => candidates.extend(advice.candidates),
        }
    }
    if let Some(path) = file {
        let sql = fs::read_to_string(path).with_context(|| format!("cannot read {:?}", path))?;
        candidates.extend(advisor.advise_sql(&sql)?);
    }

    let report = AdviceReport::build(&candidates, config.sampling);
    info!("Produced {} advice item(s), {} query(ies) failed", report.items.len(), failed);

    let rendered = match format {
        OutputFormat::Text => report.to_text(),
        OutputFormat::Json => report.to_json()?,
    };
    match output {
        Some(path) => {
            fs::write(path, rendered)?;
            info!("Report written to {:?}", path);
        }
        None => print!("{}", rendered),
    }

    if failed > 0 && failed == queries.len() && file.is_none() {
        anyhow::bail!("none of the {} queries could be parsed", failed);
    }
    Ok(())
}

fn execute_duplicate_keys(schema: &Path, databases: &[String], format: OutputFormat) -> Result<()> {
    let dictionary = StaticDictionary::from_file(schema).with_context(|| format!("cannot load schema {:?}", schema))?;
    let findings = duplicate_key_check(&dictionary, databases);

    match format {
        OutputFormat::Text => {
            if findings.is_empty() {
                println!("No duplicate indexes found.");
            }
            for finding in &findings {
                println!(
                    "`{}`.`{}`: index `{}` ({}) is covered by `{}` ({})",
                    finding.database,
                    finding.table,
                    finding.key,
                    finding.columns.join(", "),
                    finding.covered_by,
                    finding.covered_by_columns.join(", ")
                );
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&findings)?),
    }
    Ok(())
}

/// Initialize logging based on CLI options. Logs go to stderr so reports stay clean on stdout.
fn initialize_logging(cli: &Cli) -> Result<()> {
    let log_level = if let Some(level) = &cli.log_level {
        level.clone().into()
    } else if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };

    if cli.json_logs {
        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_target(false)
            .with_thread_ids(cli.verbose)
            .with_file(cli.verbose)
            .with_line_number(cli.verbose)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_target(false)
            .with_thread_ids(cli.verbose)
            .with_file(cli.verbose)
            .with_line_number(cli.verbose)
            .with_writer(std::io::stderr)
            .init();
    }

    Ok(())
}
