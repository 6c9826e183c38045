use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;

use reservas_gate::api::{HttpApi, RemoteApi};
use reservas_gate::config::GateConfig;
use reservas_gate::gate::PermissionGate;
use reservas_gate::navigation::{HistoryNavigator, Navigator};
use reservas_gate::onboarding::{
    OnboardingRouteState, PostLoginRouter, ValidationCache, onboarding_routes,
};
use reservas_gate::session::SessionResolver;
use reservas_gate::store::{KeyValueStore, LibSqlStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = GateConfig::from_env().context("invalid gate configuration")?;

    let addr = SocketAddr::new(config.bind_addr, config.port);
    if !config.bind_addr.is_loopback() {
        tracing::warn!(%addr, "Listening beyond loopback; the gate holds a single session");
    }

    eprintln!("Reservas gate v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Backend: {}", config.api_url);
    eprintln!("   Store:   {}", config.db_path.display());
    eprintln!("   Listen:  http://{}", addr);

    // ── Storage ──────────────────────────────────────────────────────────
    let store: Arc<dyn KeyValueStore> = Arc::new(
        LibSqlStore::new_local(&config.db_path)
            .await
            .with_context(|| format!("failed to open store at {}", config.db_path.display()))?,
    );

    // ── Gate components ──────────────────────────────────────────────────
    let api: Arc<dyn RemoteApi> = Arc::new(HttpApi::new(config.api_url.clone()));
    let navigator: Arc<dyn Navigator> = Arc::new(HistoryNavigator::new());

    let sessions = Arc::new(SessionResolver::new(
        Arc::clone(&api),
        Arc::clone(&store),
        config.remote_timeout,
    ));
    match sessions.restore().await {
        Ok(Some(session)) => {
            tracing::info!(user_id = %session.user_id, "Restored stored session");
        }
        Ok(None) => tracing::info!("No stored session"),
        Err(e) => tracing::warn!(error = %e, "Could not restore stored session"),
    }

    let cache = Arc::new(ValidationCache::new(Arc::clone(&store)));
    let gate = Arc::new(PermissionGate::new(
        Arc::clone(&api),
        Arc::clone(&sessions),
        Arc::clone(&navigator),
        config.clone(),
    ));
    let router = Arc::new(PostLoginRouter::new(
        api,
        sessions,
        cache,
        Arc::clone(&gate),
        navigator,
        config.clone(),
    ));

    // ── HTTP server ──────────────────────────────────────────────────────
    let app = onboarding_routes(OnboardingRouteState::new(router, gate, &config));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "Gate server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await
        .context("server error")?;

    Ok(())
}
