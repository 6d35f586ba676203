use anyhow::{Context, Result};
use clap::Parser;
use podcast_studio::{
    create_router, AppState, Config, CosmicStore, InputFactory, MemoryStore, ObjectStore,
};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "podcast-studio")]
#[command(about = "Podcast production dashboard service", long_about = None)]
struct Args {
    /// Config file path, without the .toml extension
    #[arg(short, long, default_value = "config/podcast-studio")]
    config: String,

    /// Override the HTTP port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let mut cfg = Config::load(&args.config)?;
    if let Some(port) = args.port {
        cfg.service.http.port = port;
    }

    info!("Podcast Studio v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);

    let store: Arc<dyn ObjectStore> = match &cfg.cosmic {
        Some(cosmic) => {
            info!("Object store: bucket {}", cosmic.bucket_slug);
            if cosmic.write_key.is_none() {
                warn!("No write key configured; session updates and uploads will fail");
            }
            Arc::new(CosmicStore::new(
                cosmic.bucket_slug.clone(),
                cosmic.read_key.clone(),
                cosmic.write_key.clone(),
            ))
        }
        None => {
            warn!("No bucket configured; using the in-memory object store");
            Arc::new(MemoryStore::new())
        }
    };

    let input = InputFactory::create(&cfg.recording.input);
    info!("Audio input: {}", input.name());

    let state = AppState::new(store, input, cfg.recording.options.clone());
    let app = create_router(state);

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app).await.context("HTTP server failed")?;

    Ok(())
}
