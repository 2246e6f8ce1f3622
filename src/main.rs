use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tagged_todos::config::AppConfig;
use tagged_todos::seed;
use tagged_todos::service::TodoService;
use tagged_todos::store::Store;
use tagged_todos::web::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env().context("reading configuration")?;

    eprintln!("Tagged Todos v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Database: {}", config.db_path.display());
    eprintln!("   HTTP: http://0.0.0.0:{}", config.port);

    // ── Database ─────────────────────────────────────────────────────────
    let store = Arc::new(
        Store::new_local(&config.db_path)
            .await
            .with_context(|| format!("opening database at {}", config.db_path.display()))?,
    );

    let service = TodoService::new(store);
    if config.seed_demo {
        if let Some(account) = seed::seed_demo(&service).await.context("seeding demo data")? {
            eprintln!("   Seeded demo account '{}'", account.username);
        }
    }

    // ── HTTP ─────────────────────────────────────────────────────────────
    let app = web::app(AppState::new(service), &config);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(port = config.port, "HTTP server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown requested");
        })
        .await
        .context("serving HTTP")?;

    Ok(())
}
