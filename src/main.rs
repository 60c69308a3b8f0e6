use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{delete, get, post},
};
use tokio::signal;
use tracing_subscriber::EnvFilter;

use fraudguard_gate::api::{AppState, admin, auth, health};
use fraudguard_gate::security::api_keys::KEY_PREFIX;
use fraudguard_gate::security::{
    ApiKeyStore, PermissionChecker, SecurityGate, TokenIssuer, rate_limiter, security_layer,
};
use fraudguard_gate::{Config, Error};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Configuration errors are fatal here and nowhere else.
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_new(&config.server.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(
        environment = ?config.auth.environment,
        "starting fraudguard-gate"
    );

    let limiter = rate_limiter::build(&config.rate_limit);
    let keys = Arc::new(ApiKeyStore::new());
    let tokens = Arc::new(TokenIssuer::from_config(&config.auth)?);
    let permissions = Arc::new(PermissionChecker::default());

    // Operator-supplied bootstrap credential; nothing is generated or
    // printed, only the digest of what the operator already knows.
    if let Some(bootstrap) = &config.auth.bootstrap_admin_key {
        if !bootstrap.starts_with(KEY_PREFIX) {
            return Err(Error::Config(format!(
                "BOOTSTRAP_ADMIN_KEY must start with the {KEY_PREFIX} prefix"
            ))
            .into());
        }
        let summary = keys
            .import_key("bootstrap-admin", bootstrap, vec!["admin".to_string()])
            .await?;
        tracing::info!(key_id = %summary.key_id, "bootstrap admin key registered");
    }

    let gate = Arc::new(SecurityGate::new(
        limiter,
        Arc::clone(&keys),
        Arc::clone(&tokens),
        permissions,
    ));
    let sweeper = gate.start_sweeper(&config.rate_limit);

    let state = AppState {
        gate: Arc::clone(&gate),
        keys,
        tokens,
    };

    let app = Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(admin::gate_metrics))
        .route("/admin/keys", post(admin::create_key).get(admin::list_keys))
        .route("/admin/keys/{key_id}", delete(admin::revoke_key))
        .route(
            "/admin/rate-limit/reset/{client_id}",
            post(admin::reset_rate_limit),
        )
        .route("/auth/token", post(auth::issue_token))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&gate),
            security_layer,
        ))
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!(%addr, "gate listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!(error = %e, "server error");
                sweeper.abort();
                return Err(e.into());
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
    }

    sweeper.abort();
    tracing::info!("gate shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
