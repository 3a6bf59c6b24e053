use toiletpass_backend::api;
use toiletpass_backend::auth::IntrospectionVerifier;
use toiletpass_backend::config::AppConfig;
use toiletpass_backend::database::reservation_repository::PgReservationStore;
use toiletpass_backend::database::wallet_repository::PgWalletStore;
use toiletpass_backend::database::{init_pool, PoolConfig};
use toiletpass_backend::health::{HealthChecker, HealthStatus};
use toiletpass_backend::logging::init_tracing;
use toiletpass_backend::middleware::logging::{request_logging_middleware, UuidRequestId};
use toiletpass_backend::payments::providers::StripeGateway;
use toiletpass_backend::services::notification::EmailNotificationService;
use toiletpass_backend::services::orchestrator::{OrchestratorConfig, PaymentOrchestrator};
use toiletpass_backend::services::reservation::ReservationWriter;
use axum::{
    routing::{get, post},
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::{error, info};

/// Graceful shutdown signal handler
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

    info!("Shutdown signal received, starting graceful shutdown");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().map_err(|e| anyhow::anyhow!("configuration error: {e}"))?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("configuration error: {e}"))?;

    init_tracing(&config.logging);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        "🚀 Starting ToiletPass backend service"
    );

    info!(
        host = %config.server.host,
        port = config.server.port,
        "Server configuration loaded"
    );

    info!("📊 Initializing database connection pool...");
    let pool_config = PoolConfig {
        max_connections: config.database.max_connections,
        min_connections: config.database.min_connections,
        connection_timeout: Duration::from_secs(config.database.connection_timeout),
        ..PoolConfig::default()
    };
    let db_pool = init_pool(&config.database.url, Some(pool_config))
        .await
        .map_err(|e| {
            error!("Failed to initialize database pool: {}", e);
            anyhow::anyhow!("database init failed: {e}")
        })?;
    info!(
        max_connections = config.database.max_connections,
        "✅ Database connection pool initialized"
    );

    info!("💳 Initializing payment gateway...");
    let gateway = Arc::new(StripeGateway::new(config.stripe.clone()).map_err(|e| {
        error!("❌ Failed to initialize payment gateway: {}", e);
        anyhow::anyhow!("payment gateway init failed: {e}")
    })?);
    info!("✅ Payment gateway initialized");

    info!("🔐 Initializing identity verifier...");
    let verifier = Arc::new(IntrospectionVerifier::new(config.auth.clone()).map_err(|e| {
        error!("❌ Failed to initialize identity verifier: {}", e);
        anyhow::anyhow!("identity verifier init failed: {e}")
    })?);

    info!("📧 Initializing notification service...");
    let notifier = Arc::new(EmailNotificationService::new(&config.email).map_err(|e| {
        error!("❌ Failed to initialize notification service: {}", e);
        anyhow::anyhow!("notification init failed: {e}")
    })?);

    let reservation_writer =
        ReservationWriter::new(Arc::new(PgReservationStore::new(db_pool.clone())));
    let wallet = Arc::new(PgWalletStore::new(db_pool.clone()));

    let orchestrator = Arc::new(PaymentOrchestrator::new(
        gateway,
        reservation_writer,
        wallet,
        notifier,
        OrchestratorConfig {
            reservation_max_amount: config.limits.reservation_max_amount,
            topup_min_amount: config.limits.topup_min_amount,
            topup_max_amount: config.limits.topup_max_amount,
        },
    ));

    let health_checker = HealthChecker::new(db_pool.clone());

    info!("🛣️  Setting up application routes...");

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(
            config
                .server
                .cors_allowed_origins
                .iter()
                .filter_map(|o| o.parse().ok()),
        ))
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let payments_state = api::payments::PaymentsState {
        orchestrator: orchestrator.clone(),
        verifier,
    };
    let webhook_state = api::webhooks::WebhookState {
        orchestrator: orchestrator.clone(),
    };

    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .route("/health/live", get(liveness))
        .with_state(AppState { health_checker })
        .merge(
            Router::new()
                .route("/api/payments", post(api::payments::create_reservation_payment))
                .route(
                    "/api/payments/topup",
                    post(api::payments::create_topup_payment),
                )
                .with_state(payments_state),
        )
        .merge(
            Router::new()
                .route("/api/payments/webhook", post(api::webhooks::handle_webhook))
                .with_state(webhook_state),
        )
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                .layer(axum::middleware::from_fn(request_logging_middleware))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(cors),
        );

    info!("✅ Routes configured");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("❌ Failed to bind to address {}: {}", addr, e);
        e
    })?;

    info!(
        address = %addr,
        "🚀 Server listening on http://{}",
        addr
    );
    info!("✅ Server is ready to accept connections");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Server shutdown complete");

    Ok(())
}

// Application state for the health endpoints
#[derive(Clone)]
struct AppState {
    health_checker: HealthChecker,
}

// Handlers
async fn root() -> &'static str {
    "ToiletPass Backend API"
}

async fn health(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Result<Json<HealthStatus>, (axum::http::StatusCode, String)> {
    let status = state.health_checker.check_health().await;
    if status.is_healthy() {
        Ok(Json(status))
    } else {
        Err((
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            "unhealthy".to_string(),
        ))
    }
}

async fn readiness(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Result<&'static str, (axum::http::StatusCode, String)> {
    let status = state.health_checker.check_health().await;
    if status.is_healthy() {
        Ok("ready")
    } else {
        Err((
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            "not ready".to_string(),
        ))
    }
}

async fn liveness() -> &'static str {
    "alive"
}
