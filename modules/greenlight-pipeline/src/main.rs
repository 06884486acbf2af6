use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use greenlight_common::{CandidateTopic, GreenlightConfig, ProviderKeys};
use greenlight_pipeline::dedup::{
    Deduplicator, FingerprintStore, HashEmbedder, JsonlFingerprintStore, MemoryFingerprintStore,
    RemoteEmbedder, TextEmbedder,
};
use greenlight_pipeline::images::{
    ImagePipeline, ImageProvider, ImageUsageLedger, OpenverseProvider, PexelsProvider,
};
use greenlight_pipeline::notify::LogNotifier;
use greenlight_pipeline::run::{DirPublisher, FileDrafter, LogPublisher, PipelineRunner, Publisher};

#[derive(Parser, Debug)]
#[command(name = "greenlight", about = "Content quality assurance pipeline")]
struct Args {
    /// JSON file with the candidate topics for this run.
    topics: PathBuf,

    /// Pipeline configuration (JSON). Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured number of concurrent topic loops.
    #[arg(long)]
    concurrency: Option<usize>,

    /// Run the full loop but log instead of publishing; dedup state stays
    /// in memory.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("greenlight=info".parse()?))
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => GreenlightConfig::from_file(path)?,
        None => GreenlightConfig::default(),
    };
    if let Some(concurrency) = args.concurrency {
        config.run.concurrency = concurrency;
    }
    config.validate()?;

    let raw = std::fs::read_to_string(&args.topics)
        .with_context(|| format!("reading topics {}", args.topics.display()))?;
    let topics: Vec<CandidateTopic> =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", args.topics.display()))?;
    info!(topics = topics.len(), "Loaded candidate topics");

    let keys = ProviderKeys::from_env();

    let embedder: Arc<dyn TextEmbedder> = match &keys.embed_api_key {
        Some(api_key) => {
            info!("Remote embeddings enabled");
            let model = keys.embed_model.as_deref().unwrap_or("text-embedding-3-small");
            let mut remote = RemoteEmbedder::new(api_key, model);
            if let Some(base_url) = &keys.embed_base_url {
                remote = remote.with_base_url(base_url);
            }
            Arc::new(remote)
        }
        None => {
            info!("No EMBED_API_KEY set, using local hashed embeddings");
            Arc::new(HashEmbedder)
        }
    };

    let store: Arc<dyn FingerprintStore> = match (&config.run.fingerprint_path, args.dry_run) {
        (Some(path), false) => Arc::new(JsonlFingerprintStore::open(path)?),
        _ => {
            info!("Dedup state is in-memory only");
            Arc::new(MemoryFingerprintStore::new())
        }
    };
    let dedup = Deduplicator::new(Arc::clone(&embedder), store);

    let mut providers: Vec<Arc<dyn ImageProvider>> = vec![Arc::new(OpenverseProvider::new())];
    if let Some(api_key) = &keys.pexels_api_key {
        info!("Pexels image search enabled");
        providers.push(Arc::new(PexelsProvider::new(api_key)));
    }
    let ledger = Arc::new(ImageUsageLedger::new(config.images.reuse_cap));
    let images = ImagePipeline::new(providers, embedder, ledger, config.images.clone());

    let drafter = Arc::new(FileDrafter::new(&config.run.drafts_dir));
    let publisher: Arc<dyn Publisher> = if args.dry_run {
        Arc::new(LogPublisher)
    } else {
        Arc::new(DirPublisher::new(&config.run.out_dir))
    };

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, finishing in-flight topics");
                cancel.store(true, Ordering::Relaxed);
            }
        });
    }

    let runner = PipelineRunner::new(
        config,
        dedup,
        images,
        drafter,
        publisher,
        Arc::new(LogNotifier),
        cancel,
    );
    let report = runner.run(topics).await?;

    info!("Pipeline complete. {report}");
    Ok(())
}
