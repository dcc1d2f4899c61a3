use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use rag_chatbot::application::DocumentService;
use rag_chatbot::domain::ports::VectorStore;
use rag_chatbot::infrastructure::extract::SUPPORTED_EXTENSIONS;
use rag_chatbot::infrastructure::{
    embedder_from_config, AppConfig, DocumentExtractor, PersistedVectorStore,
};
use tracing::{info, warn};
use walkdir::WalkDir;

/// Batch-ingests a directory of documents into the vector store.
#[derive(Parser, Debug)]
#[command(name = "ingest")]
struct Args {
    /// Directory to scan recursively
    #[arg(value_name = "DIR")]
    dir: PathBuf,

    /// Config file (defaults to `APP_CONFIG` or config/app.yaml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ingest=info,rag_chatbot=info".into()),
        )
        .init();

    let config = match &args.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };

    let storage = &config.config.storage;
    let store = Arc::new(PersistedVectorStore::open(
        &storage.index_file,
        &storage.meta_file,
        embedder_from_config(&config.config.embedding),
    )?);
    let rag = &config.config.rag;
    let service = DocumentService::new(store.clone(), Arc::new(DocumentExtractor))
        .with_chunking(rag.chunk_size, rag.chunk_overlap);

    let files = collect_documents(&args.dir);
    info!(dir = %args.dir.display(), files = files.len(), "ingesting directory");

    let mut total = 0usize;
    for path in &files {
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        match service.ingest_file(path, &source, None).await {
            Ok(added) => total += added,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "ingest failed");
                return Err(e.into());
            }
        }
    }

    info!(records = store.len().await, "store updated");
    println!("Ingested {total} chunks from {} file(s)", files.len());
    Ok(())
}

/// Supported files under `root`, sorted by path for a deterministic order.
fn collect_documents(root: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|x| x.to_str())
                .is_some_and(|x| SUPPORTED_EXTENSIONS.contains(&x.to_ascii_lowercase().as_str()))
        })
        .map(|e| e.into_path())
        .collect();
    paths.sort();
    paths
}
