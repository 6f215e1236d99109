use anyhow::Result;
use clap::Parser;
use meetscribe::{
    build_engine, AppState, CaptureManager, Config, SenderManager, TaskRegistry,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "meetscribe", about = "Meeting capture and transcription backend")]
struct Args {
    /// Path to the configuration file (TOML, extension omitted)
    #[arg(long, default_value = "config/meetscribe")]
    config: String,

    /// Override the configured HTTP port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let mut cfg = Config::load(&args.config)?;
    if let Some(port) = args.port {
        cfg.service.http.port = port;
    }

    info!("{} starting", cfg.service.name);
    info!(
        "Audio target: {}Hz, {} channel(s), {}ms mix tick",
        cfg.audio.sample_rate, cfg.audio.channels, cfg.audio.mix_tick_ms
    );
    info!("Engine: {:?} at {}", cfg.engine.kind, cfg.engine.base_url);

    let engine = build_engine(&cfg.engine);
    let tasks = Arc::new(TaskRegistry::new(Duration::from_secs(
        cfg.tasks.retention_secs,
    )));
    Arc::clone(&tasks).spawn_eviction_sweep(Duration::from_secs(cfg.tasks.evict_interval_secs));

    let state = AppState::new(
        Arc::new(CaptureManager::new()),
        Arc::new(SenderManager::new()),
        tasks,
        engine,
        cfg.audio.clone(),
    );

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, meetscribe::create_router(state)).await?;

    Ok(())
}
