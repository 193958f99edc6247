use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use log::{info, warn};

use portfolio_rag::content::ContentData;
use portfolio_rag::database::{QdrantConfig, VectorStore};
use portfolio_rag::document::Document;
use portfolio_rag::error::RagError;
use portfolio_rag::gemini::{GeminiClient, GeminiConfig};
use portfolio_rag::processor::DocumentProcessor;
use portfolio_rag::rag::{ConversationTurn, RagConfig, RagService, Role};
use portfolio_rag::retry::RetryPolicy;

/// RAG backend for a portfolio chat assistant: ingest portfolio content
/// into a vector store and answer questions grounded in it.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest structured content and document directories into the store
    Ingest {
        /// Path to the structured content JSON file (projects, experience,
        /// education, about)
        #[arg(long)]
        content: Option<PathBuf>,
        /// Directories containing loose documents (text or PDF); may be
        /// repeated
        #[arg(long = "dir")]
        dirs: Vec<PathBuf>,
    },
    /// Interactive chat against the ingested corpus
    Chat,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    let gemini_config = GeminiConfig::from_env()?;
    let qdrant_config = QdrantConfig::from_env()?;
    let rag_config = RagConfig::from_env()?;

    let gemini = GeminiClient::new(gemini_config, RetryPolicy::default())?;
    let store = VectorStore::connect(qdrant_config)
        .await
        .context("Failed to initialize vector store")?;
    let service = RagService::new(gemini, store, rag_config);

    match args.command {
        Command::Ingest { content, dirs } => run_ingest(&service, content, dirs).await,
        Command::Chat => run_chat(&service).await,
    }
}

async fn run_ingest(
    service: &RagService,
    content: Option<PathBuf>,
    dirs: Vec<PathBuf>,
) -> Result<()> {
    let processor = DocumentProcessor::new();
    let mut documents: Vec<Document> = Vec::new();

    if let Some(path) = content {
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read content file {}", path.display()))?;
        let data: ContentData = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid content JSON in {}", path.display()))?;
        documents.extend(processor.process_structured_data(&data, "website"));
    }

    for dir in dirs {
        match processor.process_directory(&dir) {
            Ok(docs) => documents.extend(docs),
            Err(e) => warn!("Skipping directory {}: {}", dir.display(), e),
        }
    }

    if documents.is_empty() {
        warn!("Nothing to ingest; pass --content and/or --dir");
        return Ok(());
    }

    info!("Ingesting {} documents", documents.len());
    let summary = service.ingest_documents(&documents).await;

    println!(
        "Ingestion complete: {} documents processed, {} chunks written",
        summary.documents_processed, summary.chunks_written
    );
    for failure in &summary.errors {
        println!("  failed: {} ({})", failure.document_id, failure.reason);
    }

    Ok(())
}

async fn run_chat(service: &RagService) -> Result<()> {
    println!("Ask about the portfolio. Type 'exit' to quit.");

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut buffer = String::new();
    let mut history: Vec<ConversationTurn> = Vec::new();

    loop {
        print!("\nYour question: ");
        stdout.flush()?;

        buffer.clear();
        if stdin.read_line(&mut buffer)? == 0 {
            break;
        }

        let question = buffer.trim();
        if question.eq_ignore_ascii_case("exit") {
            println!("Goodbye!");
            break;
        }

        match service.query(question, &history).await {
            Ok(answer) => {
                println!("\n{}", answer.response);
                history.push(ConversationTurn {
                    role: Role::User,
                    text: question.to_string(),
                });
                history.push(ConversationTurn {
                    role: Role::Assistant,
                    text: answer.response,
                });
            }
            Err(RagError::InvalidQuery(_)) => continue,
            Err(e @ RagError::Configuration(_)) => {
                // Operator problem; retrying the question cannot help.
                eprintln!("The assistant is not configured: {}", e);
                break;
            }
            Err(e) => {
                warn!("Query failed: {}", e);
                println!("Something went wrong, please try again.");
            }
        }
    }

    Ok(())
}
