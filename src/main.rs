//! GenVN backend entrypoint: serve the HTTP gateway, or run asset ingestion
//! once from the command line.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};

use genvn_assets::{
    AssetIndexer, AssetSearcher, IndexerConfig, SearchOptions, SearcherConfig,
};
use genvn_core::Config;
use genvn_embed::Embedder;
use genvn_embed::siglip::{SiglipEmbedder, parse_device};
use genvn_gateway::{AppState, GatewayServer};
use genvn_llm::ChatModel;
use genvn_llm::ollama::OllamaAdapter;
use genvn_store::AssetStore;
use genvn_store::qdrant::QdrantAssetStore;
use genvn_story::{StaticLore, StoryConfig, StoryEngine};

#[derive(Parser)]
#[command(
    name = "genvn",
    version,
    about = "Backend for a generative visual-novel engine"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "genvn.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP gateway (the default).
    Serve,
    /// Run asset ingestion once and print the report as JSON.
    LoadAssets {
        /// Override the configured captioning default.
        #[arg(long)]
        infer_metadata: Option<bool>,
    },
}

struct Services {
    indexer: Arc<AssetIndexer>,
    searcher: Arc<AssetSearcher>,
    story: Arc<StoryEngine>,
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

async fn build_services(config: &Config) -> anyhow::Result<Services> {
    // Model load is fatal at startup; nothing can run without the embedder.
    let device = parse_device(&config.embedding.device)?;
    let model_id = config.embedding.model_id.clone();
    tracing::info!(model = %model_id, "loading embedding model");
    let embedder = tokio::task::spawn_blocking(move || SiglipEmbedder::load(&model_id, &device))
        .await
        .context("embedder load task panicked")??;
    anyhow::ensure!(
        embedder.dimension() == config.embedding.dimension,
        "embedding model outputs {} dimensions but the config declares {}",
        embedder.dimension(),
        config.embedding.dimension,
    );
    let embedder: Arc<dyn Embedder> = Arc::new(embedder);

    let store: Arc<dyn AssetStore> = Arc::new(QdrantAssetStore::connect(
        &config.store.url,
        config.collection_spec(),
    )?);

    let mut adapter = OllamaAdapter::new(&config.llm.base_url, config.llm.model.clone())
        .with_max_retries(config.llm.max_retries)
        .with_timeouts(
            Duration::from_secs(config.llm.connect_timeout_secs),
            Duration::from_secs(config.llm.request_timeout_secs),
            Duration::from_secs(config.llm.stream_read_timeout_secs),
        );
    if let Some(vision) = &config.llm.vision_model {
        adapter = adapter.with_vision_model(vision.clone());
    }
    let chat: Arc<dyn ChatModel> = Arc::new(adapter);

    let mut indexer_config = IndexerConfig::new(config.assets.root.clone());
    indexer_config.caption_weight = config.assets.caption_weight;
    indexer_config.index = config.assets.index;

    let indexer = Arc::new(AssetIndexer::new(
        store.clone(),
        embedder.clone(),
        chat.clone(),
        indexer_config,
    ));
    let searcher = Arc::new(AssetSearcher::new(
        store,
        embedder,
        chat.clone(),
        SearcherConfig {
            max_rewrite_len: config.assets.max_rewrite_len,
        },
    ));
    let story = Arc::new(StoryEngine::new(
        chat,
        Arc::new(StaticLore::new(config.story.lore.clone())),
        StoryConfig {
            lore_limit: config.story.lore_limit,
        },
    ));

    Ok(Services {
        indexer,
        searcher,
        story,
    })
}

async fn serve(config: &Config, services: Services) -> anyhow::Result<()> {
    let state = AppState::new(
        services.indexer,
        services.searcher,
        services.story,
        config.assets.infer_metadata,
        SearchOptions {
            rewrite: false,
            k: config.assets.search_k,
            search_breadth: config.assets.search_breadth,
        },
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    GatewayServer::new(&config.gateway.bind, config.gateway.port, state, shutdown_rx)
        .serve()
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;
    let services = build_services(&config).await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&config, services).await?,
        Command::LoadAssets { infer_metadata } => {
            let report = services
                .indexer
                .load_assets(infer_metadata.unwrap_or(config.assets.infer_metadata))
                .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
