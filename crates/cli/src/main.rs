//! Corpus enrichment CLI
//!
//! One subcommand per pipeline stage. Every stage reads the previous
//! stage's directory and writes one JSON file per id into its own.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use enrich_core::{Benchmark, Chunk};
use enrich_pipeline::corpus::{chunk_set_name, load_chunks, load_documents, load_raw_documents};
use enrich_pipeline::{
    ingest_corpus, list_missing, BatchReport, BoilerplateRules, ChunkMetadataExtractor,
    CleanStage, DocumentEnricher, FailureLog, LlmSettings, OpenAiClient, ParagraphFrequencyIndex,
    PipelineConfig, RelevanceScorer, ValidationFilter, DEFAULT_THRESHOLD,
};
use enrich_store::{JsonDirStore, MemoryStore};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_QA_PATH: &str = "benchmark/benchmark_qa.json";
const DEFAULT_META_ROOT: &str = "benchmark/metadata";
const DEFAULT_SCORE_ROOT: &str = "benchmark/score";
const FAILURES_DIR: &str = "failures";

/// Stage directories created by `init`
const LAYOUT: &[&str] = &[
    "data",
    "data_cleaned/raw",
    "data_cleaned/advanced",
    "data_cleaned/advanced_validated",
    "benchmark/metadata",
    "benchmark/score",
    "subsample/semantic_chunk",
    "logs",
];

/// Enrich - incremental, resumable corpus enrichment
#[derive(Parser)]
#[command(name = "enrich")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert extracted .txt/.md files into raw document JSON
    Ingest {
        input_dir: PathBuf,
        output_dir: PathBuf,
    },

    /// Remove boilerplate paragraphs and enrich every document
    Clean {
        input_dir: PathBuf,
        output_dir: PathBuf,

        /// Paragraphs found in at least this many documents are removed
        #[arg(short, long, default_value_t = DEFAULT_THRESHOLD)]
        threshold: usize,

        /// File of boilerplate regexes, one per line (replaces the defaults)
        #[arg(long)]
        patterns: Option<PathBuf>,
    },

    /// Keep only documents with content left after cleaning
    Validate {
        input_dir: PathBuf,
        output_dir: PathBuf,
    },

    /// Extract structured metadata for every chunk not yet processed
    ExtractMetadata {
        /// Directory of chunk JSON files
        #[arg(long)]
        chunks: PathBuf,

        /// Output directory (defaults to benchmark/metadata/<chunk set>)
        #[arg(long)]
        meta_dir: Option<PathBuf>,
    },

    /// Score chunks against the benchmark questions
    Score {
        /// Directory of chunk JSON files
        #[arg(long)]
        chunks: PathBuf,

        /// Benchmark question file
        #[arg(long, default_value = DEFAULT_QA_PATH)]
        qa_path: PathBuf,

        /// Output directory (defaults to benchmark/score/<chunk set>)
        #[arg(long)]
        score_dir: Option<PathBuf>,

        /// Only report unscored chunk/question pairs; makes no service calls
        #[arg(long)]
        list_missing: bool,

        /// Withhold reference answers from the scoring prompt
        #[arg(long)]
        no_answer: bool,
    },

    /// Create the stage directory layout
    Init {
        /// Root directory
        #[arg(default_value = ".")]
        root: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env if present.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Ingest {
            input_dir,
            output_dir,
        } => cmd_ingest(input_dir, output_dir).await,
        Commands::Clean {
            input_dir,
            output_dir,
            threshold,
            patterns,
        } => cmd_clean(input_dir, output_dir, threshold, patterns).await,
        Commands::Validate {
            input_dir,
            output_dir,
        } => cmd_validate(input_dir, output_dir).await,
        Commands::ExtractMetadata { chunks, meta_dir } => {
            cmd_extract_metadata(chunks, meta_dir).await
        }
        Commands::Score {
            chunks,
            qa_path,
            score_dir,
            list_missing,
            no_answer,
        } => cmd_score(chunks, qa_path, score_dir, list_missing, !no_answer).await,
        Commands::Init { root } => cmd_init(root),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_report(report: &BatchReport) {
    println!("✓ {report}");
    for failure in &report.failed {
        println!("  • {} [{}]: {}", failure.unit_id, failure.kind, failure.cause);
    }
}

/// Credential check for the LLM stages, done before anything is read
fn llm_client() -> Result<Arc<OpenAiClient>> {
    let settings = LlmSettings::from_env()?;
    info!(model = %settings.model, base_url = %settings.base_url, "Using LLM service");
    Ok(Arc::new(OpenAiClient::new(&settings)?))
}

async fn open_store(dir: &Path) -> Result<Arc<JsonDirStore>> {
    let store = JsonDirStore::open(dir)
        .await
        .with_context(|| format!("Failed to open output directory {}", dir.display()))?;
    Ok(Arc::new(store))
}

async fn cmd_ingest(input_dir: PathBuf, output_dir: PathBuf) -> Result<()> {
    enrich_pipeline::corpus::require_dir(&input_dir)?;
    let output = open_store(&output_dir).await?;

    let report = ingest_corpus(&input_dir, &*output).await?;
    print_report(&report);
    Ok(())
}

async fn cmd_clean(
    input_dir: PathBuf,
    output_dir: PathBuf,
    threshold: usize,
    patterns: Option<PathBuf>,
) -> Result<()> {
    let rules = match &patterns {
        Some(path) => BoilerplateRules::from_file(path)?,
        None => BoilerplateRules::default(),
    };
    let loaded = load_raw_documents(&input_dir)?;
    info!(
        documents = loaded.len(),
        rejected = loaded.rejected.len(),
        rules = rules.len(),
        "Loaded raw documents"
    );
    let output = open_store(&output_dir).await?;

    let stage = CleanStage::new(
        ParagraphFrequencyIndex::new(threshold, rules),
        DocumentEnricher::heuristic(),
    );
    let mut report = stage.run(&loaded.items, &*output).await?;
    report.failed.extend(loaded.rejected);
    print_report(&report);
    Ok(())
}

async fn cmd_validate(input_dir: PathBuf, output_dir: PathBuf) -> Result<()> {
    let loaded = load_documents(&input_dir)?;
    let output = open_store(&output_dir).await?;

    let mut report = ValidationFilter::run(&loaded.items, &*output).await?;
    report.failed.extend(loaded.rejected);
    print_report(&report);
    Ok(())
}

async fn cmd_extract_metadata(chunks_dir: PathBuf, meta_dir: Option<PathBuf>) -> Result<()> {
    let client = llm_client()?;
    let config = PipelineConfig::from_env()?;

    let chunks = load_chunks(&chunks_dir)?;
    let meta_dir = meta_dir
        .unwrap_or_else(|| Path::new(DEFAULT_META_ROOT).join(chunk_set_name(&chunks_dir)));
    let store = open_store(&meta_dir).await?;
    let failures = FailureLog::new(open_store(&meta_dir.join(FAILURES_DIR)).await?);
    info!(chunks = chunks.len(), meta_dir = %meta_dir.display(), "Extracting metadata");

    let extractor = ChunkMetadataExtractor::new(client, store)
        .with_config(&config)
        .with_failure_log(failures);
    let mut report = extractor.extract_all(&chunks.items).await?;
    report.failed.extend(chunks.rejected);
    print_report(&report);
    Ok(())
}

async fn cmd_score(
    chunks_dir: PathBuf,
    qa_path: PathBuf,
    score_dir: Option<PathBuf>,
    only_list_missing: bool,
    reveal_answer: bool,
) -> Result<()> {
    let client = if only_list_missing {
        None
    } else {
        Some(llm_client()?)
    };

    let benchmark = Benchmark::load(&qa_path)
        .with_context(|| format!("Failed to load benchmark {}", qa_path.display()))?;
    let chunks = load_chunks(&chunks_dir)?;
    let score_dir = score_dir
        .unwrap_or_else(|| Path::new(DEFAULT_SCORE_ROOT).join(chunk_set_name(&chunks_dir)));

    let Some(client) = client else {
        return report_missing(&score_dir, &chunks.items, &benchmark).await;
    };

    let config = PipelineConfig::from_env()?;
    let store = open_store(&score_dir).await?;
    let failures = FailureLog::new(open_store(&score_dir.join(FAILURES_DIR)).await?);
    info!(
        chunks = chunks.len(),
        questions = benchmark.len(),
        reveal_answer,
        score_dir = %score_dir.display(),
        "Scoring"
    );

    let scorer = RelevanceScorer::new(client, store)
        .with_config(&config)
        .with_failure_log(failures);
    let mut report = scorer
        .score_all(&chunks.items, &benchmark, reveal_answer)
        .await?;
    report.failed.extend(chunks.rejected);
    print_report(&report);
    Ok(())
}

/// Print every unscored pair. Reads only; a missing score directory means
/// nothing has been scored yet.
async fn report_missing(score_dir: &Path, chunks: &[Chunk], benchmark: &Benchmark) -> Result<()> {
    let missing = if score_dir.is_dir() {
        let store = JsonDirStore::open(score_dir).await?;
        list_missing(&store, chunks, benchmark).await?
    } else {
        list_missing(&MemoryStore::new(), chunks, benchmark).await?
    };

    for pair in &missing {
        println!("{}\tq{}", pair.chunk_id, pair.question_id);
    }
    let chunk_count = missing
        .iter()
        .map(|pair| pair.chunk_id.as_str())
        .collect::<BTreeSet<_>>()
        .len();
    println!(
        "{} missing pairs across {} of {} chunks ({} questions)",
        missing.len(),
        chunk_count,
        chunks.len(),
        benchmark.len()
    );
    Ok(())
}

fn cmd_init(root: PathBuf) -> Result<()> {
    for dir in LAYOUT {
        let path = root.join(dir);
        std::fs::create_dir_all(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        println!("✓ {}", path.display());
    }
    Ok(())
}
