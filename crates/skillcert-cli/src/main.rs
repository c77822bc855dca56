//! skillcert CLI — grade answer sheets, take timed attempts, and print
//! progress dashboards.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "skillcert", version, about = "Certification scoring and prerequisite gating")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate catalog TOML files
    Validate {
        /// Path to catalog file or directory
        #[arg(long)]
        catalog: PathBuf,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Score an answer sheet against an evaluation
    Grade {
        /// Catalog TOML file
        #[arg(long)]
        catalog: PathBuf,

        /// Evaluation id (defaults to the one named in the answer sheet)
        #[arg(long)]
        evaluation: Option<u64>,

        /// Answer sheet TOML file
        #[arg(long)]
        answers: PathBuf,

        /// Seconds left on the clock at submission
        #[arg(long)]
        remaining_secs: Option<u64>,

        /// Result log JSON to check gating against and append to
        #[arg(long)]
        results: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Take a timed attempt, reading commands from stdin
    Take {
        /// Catalog TOML file
        #[arg(long)]
        catalog: PathBuf,

        /// Evaluation id
        #[arg(long)]
        evaluation: u64,

        /// Result log JSON (defaults to the configured path)
        #[arg(long)]
        results: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print category progress and evaluation unlock status
    Progress {
        /// Catalog TOML file
        #[arg(long)]
        catalog: PathBuf,

        /// Result log JSON (defaults to the configured path)
        #[arg(long)]
        results: Option<PathBuf>,

        /// Output format: text, markdown, json
        #[arg(long, default_value = "text")]
        format: String,

        /// Also save the dashboard as JSON to this file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create starter config and example catalog
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn,skillcert=info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { catalog, config } => commands::validate::execute(catalog, config),
        Commands::Grade {
            catalog,
            evaluation,
            answers,
            remaining_secs,
            results,
            config,
        } => commands::grade::execute(catalog, evaluation, answers, remaining_secs, results, config),
        Commands::Take {
            catalog,
            evaluation,
            results,
            config,
        } => commands::take::execute(catalog, evaluation, results, config).await,
        Commands::Progress {
            catalog,
            results,
            format,
            output,
            config,
        } => commands::progress::execute(catalog, results, format, output, config),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
