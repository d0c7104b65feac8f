mod app;
mod http;
mod theme;
mod widgets;

use std::sync::Arc;

use preview_core::{
    spawn_engine_forwarder, DeezerCatalog, EngineEvent, MpvEngine, SessionCore, SessionEvent,
};
use preview_proto::config::Config;
use preview_proto::protocol::SessionBroadcast;
use preview_proto::state::ViewStore;
use tokio::sync::{broadcast, mpsc};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let data_dir = preview_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;

    let log_path = data_dir.join("previewer.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // HTTP client internals are far too chatty at debug.
    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "debug,hyper_util=warn,reqwest=warn,hyper=warn".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    eprintln!("previewer log: {}", log_path.display());

    tracing::info!("previewer starting…");

    // ── Load config ──────────────────────────────────────────────────────────
    let config = Config::load().unwrap_or_default();

    // ── Channels ─────────────────────────────────────────────────────────────
    let (broadcast_tx, broadcast_rx) = broadcast::channel::<SessionBroadcast>(1024);
    let (event_tx, event_rx) = mpsc::channel::<SessionEvent>(1024);
    let (engine_tx, engine_rx) = mpsc::channel::<EngineEvent>(256);

    // ── Build SessionCore ────────────────────────────────────────────────────
    let view = Arc::new(ViewStore::new());
    let catalog = DeezerCatalog::new(&config.catalog)
        .map_err(|e| anyhow::anyhow!("catalog client: {}", e))?;
    let engine = MpvEngine::new(config.player.volume, engine_tx);
    spawn_engine_forwarder(engine_rx, event_tx.clone());

    let session_core = SessionCore::new(
        &config,
        Arc::new(catalog),
        engine,
        view.clone(),
        event_tx.clone(),
        broadcast_tx.clone(),
    );

    // ── HTTP server ──────────────────────────────────────────────────────────
    if config.http.enabled {
        http::start_server(
            config.http.bind_address.clone(),
            config.http.port,
            view.clone(),
            event_tx.clone(),
        );
    }

    // The broadcast channel only carries changes; push one so the first
    // frame is drawn from a fresh snapshot.
    let _ = broadcast_tx.send(SessionBroadcast::StateUpdated);
    // The core owns the only sender from here on, so the TUI sees the
    // channel close when the core stops.
    drop(broadcast_tx);

    // ── Spawn SessionCore event loop ─────────────────────────────────────────
    let core_task = tokio::spawn(async move { session_core.run(event_rx).await });

    // ── Run TUI ──────────────────────────────────────────────────────────────
    let initial = view.get_state().await;
    let app = app::App::new(event_tx, view, initial, config.session.state_file.clone());
    app.run(broadcast_rx).await?;

    match core_task.await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            tracing::error!("SessionCore exited with error: {}", e);
            eprintln!("previewer: {}", e);
            Err(e.into())
        }
        Err(e) => {
            tracing::error!("SessionCore task failed: {}", e);
            Err(e.into())
        }
    }
}
