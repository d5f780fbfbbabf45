use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use dotenv::dotenv;
use pdf_chatbot::config::{
    AppConfig, ConfigError, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, DEFAULT_COLLECTION,
    DEFAULT_TOP_K,
};
use pdf_chatbot::database::{QdrantVectorStore, VectorDB};
use pdf_chatbot::providers::OpenAIProvider;
use pdf_chatbot::{
    load_and_split, DirectoryLoader, PipelineError, PipelineOptions, RagPipeline,
    RecursiveCharacterSplitter, StuffQaChain,
};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use validator::Validate;

/// Ask one question about a directory of PDFs.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory searched recursively for *.pdf files
    #[arg(long, default_value = "./docs")]
    docs_dir: PathBuf,

    /// Vector database collection, dropped and rebuilt on every run
    #[arg(long, default_value = DEFAULT_COLLECTION)]
    collection: String,

    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    #[arg(long, default_value_t = DEFAULT_CHUNK_OVERLAP)]
    chunk_overlap: usize,

    /// Number of chunks retrieved for the answer
    #[arg(short = 'k', long, default_value_t = DEFAULT_TOP_K)]
    top_k: usize,

    /// Drop retrieved chunks scoring below this similarity
    #[arg(long)]
    score_threshold: Option<f32>,

    /// Ask this instead of prompting on stdin
    #[arg(short, long)]
    query: Option<String>,

    /// Skip PDFs that fail to extract instead of aborting
    #[arg(long)]
    silent_errors: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables
    dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    // PDFs are read and split before any configuration is required, so the
    // first two stops work without credentials or a running database.
    let splitter = RecursiveCharacterSplitter::new(args.chunk_size, args.chunk_overlap)?;
    let loader = DirectoryLoader::new(&args.docs_dir).silent_errors(args.silent_errors);
    let chunks = match report(load_and_split(&loader, &splitter).await)? {
        Some(chunks) => chunks,
        None => return Ok(()),
    };

    let config = build_config(&args)?;

    let openai = Arc::new(OpenAIProvider::new(&config.openai)?);
    let vector_db = VectorDB::new(&config.qdrant)?;
    let store = QdrantVectorStore::new(vector_db, openai.clone(), config.collection.clone())
        .with_score_threshold(config.score_threshold);

    let pipeline = RagPipeline::new(
        Arc::new(store),
        StuffQaChain::new(openai),
        PipelineOptions::from(&config),
    )?;

    if report(pipeline.ingest_chunks(&chunks).await)?.is_none() {
        return Ok(());
    }

    let query = match args.query {
        Some(query) => query,
        None => read_query()?,
    };

    if let Some(answer) = report(pipeline.answer(&query).await)? {
        println!("{}", answer);
    }
    Ok(())
}

fn build_config(args: &Args) -> Result<AppConfig> {
    let mut config = AppConfig::from_env().context("Failed to read configuration")?;
    config.docs_dir = args.docs_dir.clone();
    config.collection = args.collection.clone();
    config.chunk_size = args.chunk_size;
    config.chunk_overlap = args.chunk_overlap;
    config.top_k = args.top_k;
    config.score_threshold = args.score_threshold;

    config.validate().map_err(ConfigError::from)?;
    Ok(config)
}

/// Prints an empty-result stop and turns it into `None`; real errors pass through.
fn report<T>(result: Result<T, PipelineError>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_diagnostic() => {
            println!("{}", e);
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

fn read_query() -> Result<String> {
    let mut rl = Editor::<(), DefaultHistory>::new()?;
    match rl.readline("Enter your Query:") {
        Ok(line) => Ok(line),
        Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => bail!("No query entered"),
        Err(err) => Err(err.into()),
    }
}
