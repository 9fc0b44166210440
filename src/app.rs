use std::sync::Arc;

use axum::{middleware, routing::get, Router};
use tower_cookies::CookieManagerLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{
    cache::MemoryClientCache,
    clients::ClientRegistry,
    codes::ExchangeCodes,
    google::{GoogleProvider, IdentityProvider},
    session::SessionManager,
    tokens::{TokenService, TokenStores},
};
use crate::config::{AppConfig, TokenStoreMode};
use crate::repos::{self, BrokerRepo};
use crate::tasks::BackgroundTasks;
use crate::telemetry::{self, Telemetry};

/// Everything a handler may touch. Built once at start-up and cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub repo: Arc<dyn BrokerRepo>,
    pub sessions: SessionManager,
    pub clients: ClientRegistry,
    pub codes: ExchangeCodes,
    pub tokens: TokenService,
    pub provider: Arc<dyn IdentityProvider>,
    pub telemetry: Telemetry,
    pub tasks: BackgroundTasks,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        repo: Arc<dyn BrokerRepo>,
        token_stores: TokenStores,
        provider: Arc<dyn IdentityProvider>,
        telemetry: Telemetry,
        tasks: BackgroundTasks,
    ) -> Self {
        let clients = ClientRegistry::new(
            repo.clone(),
            Arc::new(MemoryClientCache::new()),
            tasks.clone(),
            telemetry.clone(),
            &config.cache,
        );
        Self {
            sessions: SessionManager::new(repo.clone(), telemetry.clone()),
            codes: ExchangeCodes::new(repo.clone(), telemetry.clone()),
            tokens: TokenService::new(token_stores, provider.clone(), telemetry.clone()),
            clients,
            config: Arc::new(config),
            repo,
            provider,
            telemetry,
            tasks,
        }
    }
}

/// Opens the durable store and the token stores the configured mode asks for.
pub async fn connect(config: &AppConfig, telemetry: &Telemetry) -> anyhow::Result<(Arc<dyn BrokerRepo>, TokenStores)> {
    let (repo, primary) = repos::open_durable(&config.db.url)?;
    let mode = config.db.token_store_mode();
    let legacy_url = || {
        config
            .db
            .legacy_url
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("token store mode {mode:?} requires a legacy database url"))
    };
    let stores = match mode {
        TokenStoreMode::Primary => TokenStores::primary_only(primary, telemetry.clone()),
        TokenStoreMode::Dual => {
            let legacy = repos::open_legacy(legacy_url()?, &config.db).await?;
            TokenStores::dual(primary, legacy, telemetry.clone())
        }
        TokenStoreMode::Legacy => {
            let legacy = repos::open_legacy(legacy_url()?, &config.db).await?;
            TokenStores::legacy_only(legacy, telemetry.clone())
        }
    };
    tracing::info!(?mode, "token stores ready");
    Ok((repo, stores))
}

pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let telemetry = Telemetry::tracing();
    let (repo, token_stores) = connect(&config, &telemetry).await?;
    let provider: Arc<dyn IdentityProvider> = Arc::new(GoogleProvider::from_config(&config)?);
    let tasks = BackgroundTasks::new();

    let addr = config.server.bind_addr.clone();
    let state = AppState::new(config, repo, token_stores, provider, telemetry, tasks.clone());
    let app = build_router(state);

    tracing::info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!(pending = tasks.pending(), "draining background tasks");
    tasks.drain().await;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    use crate::web::handlers::{account, auth, oauth};

    Router::new()
        .route("/", get(auth::authorize))
        .route("/callback", get(auth::callback))
        .route("/token", axum::routing::post(oauth::token))
        .route("/revoke", get(account::revoke).post(account::revoke_json))
        .route("/info", get(account::info))
        .route("/healthz", get(|| async { "ok" }))
        .with_state(state)
        .layer(middleware::from_fn(telemetry::edge_info_layer))
        .layer(CookieManagerLayer::new())
        .layer(TraceLayer::new_for_http())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = ?e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = ?e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutting down");
}
