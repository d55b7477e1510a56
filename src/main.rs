use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::http::HeaderValue;
use sqlx::migrate::Migrator;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wanderpay::adapters::memory::{InMemoryBookings, InMemoryLedger, InMemoryWallets};
use wanderpay::adapters::postgres::{PostgresBookings, PostgresLedger, PostgresWallets};
use wanderpay::config::Config;
use wanderpay::ports::{
    BookingStore, DisabledGateway, PaymentGateway, TransactionLedger, WalletLedger,
};
use wanderpay::processor::ProcessorClient;
use wanderpay::services::EscrowCoordinator;
use wanderpay::{AppState, create_app, db, startup};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Setup logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Storage: Postgres when configured, in-memory otherwise.
    let pool = match &config.database_url {
        Some(url) => {
            let pool = db::create_pool(url).await?;
            let migrator = Migrator::new(Path::new("./migrations")).await?;
            migrator.run(&pool).await?;
            tracing::info!("Database migrations completed");
            Some(pool)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; running on in-memory storage");
            None
        }
    };

    let report = startup::validate_environment(&config, pool.as_ref()).await;
    report.log();
    if !report.is_valid() {
        anyhow::bail!("startup validation failed");
    }

    let (ledger, bookings, wallets): (
        Arc<dyn TransactionLedger>,
        Arc<dyn BookingStore>,
        Arc<dyn WalletLedger>,
    ) = match &pool {
        Some(pool) => (
            Arc::new(PostgresLedger::new(pool.clone())),
            Arc::new(PostgresBookings::new(pool.clone())),
            Arc::new(PostgresWallets::new(pool.clone())),
        ),
        None => (
            Arc::new(InMemoryLedger::new()),
            Arc::new(InMemoryBookings::new()),
            Arc::new(InMemoryWallets::new()),
        ),
    };

    let gateway: Arc<dyn PaymentGateway> = match config.processor_credentials() {
        Some((url, key)) => {
            tracing::info!("Payment processor client initialized with URL: {url}");
            Arc::new(ProcessorClient::new(url.to_string(), key.to_string()))
        }
        None => {
            tracing::warn!("payment processor not configured; escrow operations will fail fast");
            Arc::new(DisabledGateway)
        }
    };

    let coordinator = Arc::new(EscrowCoordinator::new(ledger, bookings, wallets, gateway));

    let state = AppState {
        coordinator,
        db: pool,
        webhook_secret: config.processor_webhook_secret.clone(),
    };

    let app = create_app(state).layer(cors_layer(config.cors_allowed_origins.as_deref()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn cors_layer(allowed_origins: Option<&str>) -> CorsLayer {
    match allowed_origins {
        None | Some("*") => CorsLayer::permissive(),
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|o| o.trim().parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    }
}
