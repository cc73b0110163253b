use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use colored::*;
use futures::StreamExt;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sr_cli::{ChatSession, display_banner};
use sr_cohere::CohereClient;
use sr_core::{ConversationContext, LanguageFlag, Metadata, MetadataFilter, VectorStore};
use sr_ingest::{IngestionPipeline, SourceDocument, StructureMode, convert_file};
use sr_rag::{PromptTemplate, RagConfig, RagEngine};
use sr_vector::{HuggingFaceEmbedder, QdrantConfig, QdrantVectorStore};

#[derive(Parser)]
#[command(name = "supportrag")]
#[command(about = "Customer-support assistant grounded in your own documents", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Structure, chunk and index HTML documents
    Ingest {
        /// HTML files to ingest
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Document name stored with every chunk (defaults to the file stem)
        #[arg(long)]
        name: Option<String>,

        /// Document date (defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Mark the documents as inactive
        #[arg(long)]
        inactive: bool,

        /// Split on `div.post` blocks instead of headings
        #[arg(long)]
        posts: bool,

        /// Delete existing chunks with the same name before indexing
        #[arg(long)]
        replace: bool,
    },

    /// Convert an HTML document into structured JSON without indexing it
    Convert {
        file: PathBuf,

        /// Output path (defaults to the input with a .json extension)
        #[arg(short, long)]
        out: Option<PathBuf>,

        #[arg(long)]
        posts: bool,
    },

    /// Ask a single question
    Ask {
        question: String,

        /// Continue an existing conversation
        #[arg(long)]
        conversation: Option<String>,

        /// The question is not in the corpus language; translate in and out
        #[arg(long)]
        bridged: bool,

        /// Print the answer as it is generated
        #[arg(long)]
        stream: bool,

        /// Number of documents to retrieve
        #[arg(short, long)]
        k: Option<usize>,
    },

    /// Start an interactive chat
    Chat {
        #[arg(long)]
        conversation: Option<String>,

        #[arg(long)]
        bridged: bool,

        #[arg(short, long)]
        k: Option<usize>,
    },

    /// List the distinct documents in the store
    Sources,

    /// Show the chunks whose metadata matches
    Find {
        /// Metadata property: name, active or date
        #[arg(long)]
        property: String,

        /// Exact value, `*fragment*` for a substring, or true/false for `active`
        #[arg(long)]
        value: String,

        #[arg(long, default_value = "50")]
        limit: usize,
    },

    /// Delete every chunk whose metadata matches
    Delete {
        #[arg(long)]
        property: String,

        #[arg(long)]
        value: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

const DELETE_PREVIEW_LIMIT: usize = 10_000;

fn language(bridged: bool) -> LanguageFlag {
    if bridged {
        LanguageFlag::Bridged
    } else {
        LanguageFlag::Native
    }
}

fn structure_mode(posts: bool) -> StructureMode {
    if posts {
        StructureMode::Posts
    } else {
        StructureMode::Sections
    }
}

async fn connect_store() -> Result<Arc<dyn VectorStore>> {
    let embedder = Arc::new(HuggingFaceEmbedder::from_env()?);
    let config = QdrantConfig::from_env()?;
    let store = QdrantVectorStore::connect(&config, embedder)
        .await
        .with_context(|| format!("could not connect to Qdrant at {}", config.url))?;
    info!(collection = %store.collection(), "connected to vector store");
    Ok(Arc::new(store))
}

async fn build_engine() -> Result<RagEngine> {
    let config = RagConfig::from_env()?;
    let template = PromptTemplate::load(config.template_path.as_deref()).await?;
    let store = connect_store().await?;
    let llm = Arc::new(CohereClient::from_env()?);
    Ok(RagEngine::new(store, llm, template, config))
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} {} [y/N]: ", "?".cyan(), prompt);
    io::stdout().flush()?;

    let mut response = String::new();
    io::stdin().read_line(&mut response)?;
    let response = response.trim().to_lowercase();
    Ok(response == "y" || response == "yes")
}

async fn ingest(
    files: Vec<PathBuf>,
    name: Option<String>,
    date: Option<String>,
    active: bool,
    mode: StructureMode,
    replace: bool,
) -> Result<()> {
    let store = connect_store().await?;
    let date = date.unwrap_or_else(|| chrono::Local::now().format("%Y-%m-%d").to_string());

    let documents: Vec<SourceDocument> = files
        .into_iter()
        .map(|path| {
            let name = name.clone().unwrap_or_else(|| {
                path.file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string())
            });
            SourceDocument {
                metadata: Metadata::new(name, active, date.clone()),
                path,
            }
        })
        .collect();

    let pipeline = IngestionPipeline::new(store)
        .with_mode(mode)
        .with_replace(replace);
    let report = pipeline.ingest_batch(documents).await;

    for error in &report.errors {
        eprintln!("{} {}", "✗".red(), error);
    }
    println!(
        "{} {} document(s) indexed, {} chunk(s) written, {} failed",
        if report.is_success() { "✓".green() } else { "!".yellow() },
        report.documents_indexed,
        report.chunks_indexed,
        report.documents_failed
    );

    if !report.is_success() {
        bail!("{} document(s) failed to ingest", report.documents_failed);
    }
    Ok(())
}

async fn ask(
    question: String,
    conversation: Option<String>,
    bridged: bool,
    stream: bool,
    k: Option<usize>,
) -> Result<()> {
    let engine = build_engine().await?;
    let k = k.unwrap_or(engine.config().top_k);
    let conversation_id = conversation.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let context = ConversationContext::new(conversation_id, language(bridged));

    if stream {
        let mut fragments = engine.stream(&question, &context, k).await?;
        while let Some(fragment) = fragments.next().await {
            print!("{}", fragment?);
            io::stdout().flush()?;
        }
        println!();
    } else {
        let answer = engine.answer(&question, &context, k).await?;
        println!("{}", answer.text);
        info!(documents = answer.documents.len(), "answer grounded on retrieved documents");
    }

    eprintln!("{} {}", "conversation:".dimmed(), context.conversation_id.dimmed());
    Ok(())
}

async fn chat(conversation: Option<String>, bridged: bool, k: Option<usize>) -> Result<()> {
    let engine = build_engine().await?;
    let k = k.unwrap_or(engine.config().top_k);

    let mut session = ChatSession::new(Arc::new(engine), language(bridged), k);
    if let Some(id) = conversation {
        session = session.resume(id);
    }

    display_banner(session.context().language);
    session.run().await?;
    Ok(())
}

async fn sources() -> Result<()> {
    let store = connect_store().await?;
    let documents = store.list_unique_by_property("name").await?;
    let total = store.count().await?;

    if documents.is_empty() {
        println!("{}", "No documents indexed yet.".yellow());
        return Ok(());
    }

    println!("{}", "Indexed documents:".bold());
    for document in &documents {
        let status = if document.active {
            "active".green()
        } else {
            "inactive".dimmed()
        };
        println!("  {} ({}, {})", document.name.cyan(), status, document.date);
    }
    println!("{} document(s), {} chunk(s)", documents.len(), total);
    Ok(())
}

async fn find(property: String, value: String, limit: usize) -> Result<()> {
    let store = connect_store().await?;
    let filter = MetadataFilter::parse(&property, &value)?;
    let chunks = store.find_by_metadata(&filter, limit).await?;

    for chunk in &chunks {
        println!("{}", serde_json::to_string_pretty(chunk)?);
    }
    println!("{} chunk(s) matched", chunks.len());
    Ok(())
}

async fn delete(property: String, value: String, yes: bool) -> Result<()> {
    let store = connect_store().await?;
    let filter = MetadataFilter::parse(&property, &value)?;

    let matched = store.find_by_metadata(&filter, DELETE_PREVIEW_LIMIT).await?.len();
    if matched == 0 {
        println!("{}", "Nothing matched; no chunks deleted.".yellow());
        return Ok(());
    }
    if !yes && !confirm(&format!("Delete {} chunk(s) where {} = {}?", matched, property, value))? {
        println!("Aborted.");
        return Ok(());
    }

    store.delete_by_metadata(&filter).await?;
    println!("{} deleted {} chunk(s)", "✓".green(), matched);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ingest {
            files,
            name,
            date,
            inactive,
            posts,
            replace,
        } => ingest(files, name, date, !inactive, structure_mode(posts), replace).await,
        Commands::Convert { file, out, posts } => {
            let target = convert_file(&file, out.as_deref(), structure_mode(posts)).await?;
            println!("{} wrote {}", "✓".green(), target.display());
            Ok(())
        }
        Commands::Ask {
            question,
            conversation,
            bridged,
            stream,
            k,
        } => ask(question, conversation, bridged, stream, k).await,
        Commands::Chat {
            conversation,
            bridged,
            k,
        } => chat(conversation, bridged, k).await,
        Commands::Sources => sources().await,
        Commands::Find {
            property,
            value,
            limit,
        } => find(property, value, limit).await,
        Commands::Delete {
            property,
            value,
            yes,
        } => delete(property, value, yes).await,
    }
}
