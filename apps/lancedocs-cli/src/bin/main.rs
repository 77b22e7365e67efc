use std::env;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;

use lancedocs_core::config::{expand_path, Config};
use lancedocs_core::{Document, Filter, Meta, MetadataSchema};
use lancedocs_retrieve::{EmbeddingRetriever, FtsRetriever};
use lancedocs_store::{DuplicatePolicy, ExistsPolicy, LanceDocumentStore};

/// One line of an ingest file. The id is optional; when absent it is
/// derived from content + metadata. Embeddings come pre-computed from an
/// upstream stage -- this tool never generates them.
#[derive(Deserialize)]
struct IngestRecord {
    #[serde(default)]
    id: Option<String>,
    content: String,
    #[serde(default)]
    meta: Meta,
    #[serde(default)]
    embedding: Option<Vec<f32>>,
}

struct StoreSettings {
    db_path: PathBuf,
    table_name: String,
    embedding_dims: usize,
    schema: MetadataSchema,
}

fn load_settings(config: &Config) -> anyhow::Result<StoreSettings> {
    let db_path = expand_path(
        config
            .get::<String>("store.db_path")
            .unwrap_or_else(|_| "./data/lancedb".to_string()),
    );
    let table_name = config
        .get("store.table_name")
        .unwrap_or_else(|_| "documents".to_string());
    let embedding_dims = config.get("store.embedding_dims").unwrap_or(384usize);
    let schema = match config.get::<String>("store.schema_path") {
        Ok(path) => {
            let file = File::open(expand_path(&path))?;
            serde_json::from_reader(file)?
        }
        Err(_) => MetadataSchema::default(),
    };
    Ok(StoreSettings {
        db_path,
        table_name,
        embedding_dims,
        schema,
    })
}

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().collect();
    let prog = args.remove(0);
    if args.is_empty() {
        eprintln!("Usage: {} <ingest|count|filter|search|vector-search|build-fts> [args...]", prog);
        std::process::exit(1);
    }
    let cmd = args.remove(0);
    (cmd, args)
}

fn parse_top_k(arg: Option<&String>) -> anyhow::Result<Option<NonZeroUsize>> {
    match arg {
        Some(raw) => {
            let k: usize = raw.parse()?;
            Ok(Some(
                NonZeroUsize::new(k).ok_or_else(|| anyhow::anyhow!("top-k must be positive"))?,
            ))
        }
        None => Ok(None),
    }
}

fn print_hits(docs: &[Document]) {
    for doc in docs {
        let score = doc
            .score
            .map(|s| format!("{s:.4}"))
            .unwrap_or_else(|| "-".to_string());
        let preview: String = doc.content.chars().take(80).collect();
        println!("{score}\t{}\t{preview}", doc.id);
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {}", e);
        e
    })?;
    let settings = load_settings(&config)?;
    let (cmd, args) = parse_args();
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run(&cmd, &args, settings))
}

async fn run(cmd: &str, args: &[String], settings: StoreSettings) -> anyhow::Result<()> {
    let store = Arc::new(
        LanceDocumentStore::open(
            &settings.db_path,
            &settings.table_name,
            settings.schema,
            settings.embedding_dims,
            ExistsPolicy::Validate,
        )
        .await?,
    );

    match cmd {
        "ingest" => {
            let path = args
                .first()
                .ok_or_else(|| anyhow::anyhow!("Usage: lancedocs ingest <documents.jsonl>"))?;
            let file = BufReader::new(File::open(expand_path(path))?);
            let mut docs = Vec::new();
            for line in file.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let record: IngestRecord = serde_json::from_str(&line)?;
                let mut doc = match record.id {
                    Some(id) => Document::with_id(id, record.content, record.meta),
                    None => Document::new(record.content, record.meta),
                };
                if let Some(embedding) = record.embedding {
                    doc = doc.with_embedding(embedding);
                }
                docs.push(doc);
            }

            let pb = ProgressBar::new(docs.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} docs ({percent}%)")
                    .expect("progress template")
                    .progress_chars("#>-"),
            );
            let mut written = 0usize;
            for chunk in docs.chunks(1000) {
                written += store
                    .write_documents(chunk, DuplicatePolicy::Overwrite)
                    .await?;
                pb.inc(chunk.len() as u64);
            }
            pb.finish();
            println!("Ingested {} documents into '{}'", written, store.table_name());
        }
        "count" => {
            println!("{}", store.count_documents(None).await?);
        }
        "filter" => {
            let raw = args
                .first()
                .ok_or_else(|| anyhow::anyhow!("Usage: lancedocs filter '<filter json>'"))?;
            let filter: Filter = serde_json::from_str(raw)?;
            let docs = store.filter_documents(Some(&filter)).await?;
            print_hits(&docs);
            println!("{} matching document(s)", docs.len());
        }
        "search" => {
            let query = args
                .first()
                .ok_or_else(|| anyhow::anyhow!("Usage: lancedocs search \"<query>\" [top-k]"))?;
            let retriever = FtsRetriever::new(store);
            let hits = retriever
                .retrieve(query, parse_top_k(args.get(1))?, None)
                .await?;
            print_hits(&hits);
        }
        "vector-search" => {
            let path = args.first().ok_or_else(|| {
                anyhow::anyhow!("Usage: lancedocs vector-search <query-vector.json> [top-k]")
            })?;
            let query: Vec<f32> = serde_json::from_reader(File::open(expand_path(path))?)?;
            let retriever = EmbeddingRetriever::new(store);
            let hits = retriever
                .retrieve(&query, parse_top_k(args.get(1))?, None)
                .await?;
            print_hits(&hits);
        }
        "build-fts" => {
            store.create_fts_index("content").await?;
            println!("Full-text index ready on 'content'");
        }
        _ => {
            eprintln!("Unknown command: {}", cmd);
            std::process::exit(1);
        }
    }
    Ok(())
}
