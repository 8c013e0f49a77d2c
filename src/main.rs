use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use payment_webhooks::adapters::http::{webhook_router, CorsPolicy, WebhookAdapterRegistry, WebhookAppState};
use payment_webhooks::adapters::{
    HttpTokenWalletService, PostgresRecordStore, StripeConfig, StripeGateway, WalletServiceConfig,
};
use payment_webhooks::application::{
    CatalogSyncService, GatewayWebhookHandler, LedgerService, SubscriptionSyncService,
};
use payment_webhooks::config::{AppConfig, ServerConfig};
use payment_webhooks::ports::{RecordStore, TokenWalletService};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    init_tracing(&config.server);
    config.validate()?;

    tracing::info!(
        environment = ?config.server.environment,
        livemode = config.payment.require_livemode,
        "Starting payment webhooks"
    );

    let pool = config.database.pool_options().connect(&config.database.url).await?;
    if config.database.run_migrations {
        tracing::info!("Running migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;
    }
    let store: Arc<dyn RecordStore> = Arc::new(PostgresRecordStore::new(pool));

    let mut stripe_config = StripeConfig::from_secrets(
        config.payment.stripe_api_key.clone(),
        config.payment.stripe_webhook_secret.clone(),
    )
    .with_require_livemode(config.payment.require_livemode);
    if let Some(base_url) = &config.payment.stripe_api_base_url {
        stripe_config = stripe_config.with_base_url(base_url.clone());
    }

    let wallet: Arc<dyn TokenWalletService> = Arc::new(HttpTokenWalletService::new(
        WalletServiceConfig::new(config.wallet.base_url.clone(), config.wallet.api_key.clone()),
    ));

    let stripe = GatewayWebhookHandler::new(
        Arc::new(StripeGateway::new(stripe_config)),
        LedgerService::new(store.clone(), wallet),
        CatalogSyncService::new(store.clone(), config.payment.free_plan_price_id.clone()),
        SubscriptionSyncService::new(store),
    );
    let registry = WebhookAdapterRegistry::new().with_handler(stripe);
    tracing::info!(sources = ?registry.sources(), "Webhook sources registered");

    let app = webhook_router(
        WebhookAppState::new(registry),
        CorsPolicy::new(config.server.cors_origins_list()),
    );

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// `RUST_LOG` wins over `server.log_level`. JSON output in production.
fn init_tracing(server: &ServerConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&server.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    if server.is_production() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
