use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use textmill::config::Config;
use tracing::{debug, error, trace};

/// Scatter-gather text analytics over an in-process pipeline
#[derive(Parser)]
#[command(name = "textmill")]
#[command(about = "Textmill - split, transform, and aggregate documents", long_about = None)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to a TOML configuration file
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline over a document and write final reports
    Run {
        /// Path to the source document
        #[arg(short, long)]
        input: PathBuf,

        /// Number of section transformation workers
        #[arg(long)]
        workers: Option<usize>,

        /// Number of aggregator dispatch loops
        #[arg(long)]
        dispatch_workers: Option<usize>,

        /// Entries to keep in ranked word lists
        #[arg(long)]
        top_words: Option<usize>,

        /// Directory for final reports (default: results)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Sentiment lexicon JSON file (default: built-in list)
        #[arg(long)]
        lexicon: Option<PathBuf>,

        /// Name replacement JSON file (default: none)
        #[arg(long)]
        replacements: Option<PathBuf>,
    },
    /// Show how a document would be split into sections
    Split {
        /// Path to the source document
        #[arg(short, long)]
        input: PathBuf,

        /// Print the first line of each section
        #[arg(long)]
        preview: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        2 => "trace",
        _ => "trace,tokio=debug", // -vvv shows everything including dependencies
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(cli.verbose >= 2) // Show target module for -vv and above
        .with_thread_ids(cli.verbose >= 3) // Show thread IDs for -vvv
        .with_line_number(cli.verbose >= 3) // Show line numbers for -vvv
        .init();

    debug!("Textmill started with verbosity level: {}", cli.verbose);
    trace!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());

    let result = match cli.command {
        Commands::Run {
            input,
            workers,
            dispatch_workers,
            top_words,
            output,
            lexicon,
            replacements,
        } => {
            run_pipeline_command(
                cli.config,
                input,
                workers,
                dispatch_workers,
                top_words,
                output,
                lexicon,
                replacements,
            )
            .await
        }
        Commands::Split { input, preview } => run_split_command(input, preview),
    };

    if let Err(e) = result {
        error!("Fatal error: {}", e);
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_pipeline_command(
    config_path: Option<PathBuf>,
    input: PathBuf,
    workers: Option<usize>,
    dispatch_workers: Option<usize>,
    top_words: Option<usize>,
    output: Option<PathBuf>,
    lexicon: Option<PathBuf>,
    replacements: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut config = Config::load(config_path.as_deref())?;
    if let Some(workers) = workers {
        config.workers = workers;
    }
    if let Some(dispatch_workers) = dispatch_workers {
        config.dispatch_workers = dispatch_workers;
    }
    if let Some(top_words) = top_words {
        config.top_words = top_words;
    }
    if let Some(output) = output {
        config.output_dir = output;
    }
    if let Some(lexicon) = lexicon {
        config.lexicon_file = Some(lexicon);
    }
    if let Some(replacements) = replacements {
        config.replacements_file = Some(replacements);
    }

    let summary = textmill::pipeline::run_pipeline(&config, &input).await?;

    println!(
        "Job {} complete: {} section(s), {} report(s) written to {} in {}ms",
        summary.job_id,
        summary.sections,
        summary.reports_written,
        config.output_dir.display(),
        summary.duration().num_milliseconds()
    );
    Ok(())
}

fn run_split_command(input: PathBuf, preview: bool) -> anyhow::Result<()> {
    let document = std::fs::read_to_string(&input)
        .with_context(|| format!("failed to read document {}", input.display()))?;
    let sections = textmill::producer::split_into_sections(&document);

    println!("{} section(s) in {}", sections.len(), input.display());
    if preview {
        for (index, section) in sections.iter().enumerate() {
            let first_line = section.lines().next().unwrap_or_default();
            println!(
                "  [{index}] {} chars: {first_line}",
                section.chars().count()
            );
        }
    }
    Ok(())
}
