//! Billing webhooks server.
//!
//! Wires configuration, storage, the entitlement client and the HTTP
//! router, then serves until Ctrl+C.

use std::error::Error;
use std::sync::Arc;

use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use billing_webhooks::adapters::http::{
    app_router, ConfigurationStatus, HealthState, WebhookAppState,
};
use billing_webhooks::adapters::{
    postgres, HttpEntitlementClient, InMemoryIdempotencyStore, InMemoryPaymentRepository,
    InMemorySubscriptionRepository, PostgresIdempotencyStore, PostgresPaymentRepository,
    PostgresSubscriptionRepository,
};
use billing_webhooks::application::{
    DownstreamNotifier, IdempotencyJanitor, ProcessWebhookHandler, RetryPolicy,
};
use billing_webhooks::config::AppConfig;
use billing_webhooks::domain::billing::SignatureVerifier;
use billing_webhooks::ports::{IdempotencyStore, PaymentRepository, SubscriptionRepository};

type BoxError = Box<dyn Error + Send + Sync>;

struct Stores {
    idempotency: Arc<dyn IdempotencyStore>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    payments: Arc<dyn PaymentRepository>,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = AppConfig::load()?;
    init_tracing(&config);
    config.validate()?;

    tracing::info!(
        environment = ?config.server.environment,
        webhook_configured = config.webhook.is_configured(),
        entitlement_configured = config.entitlement.is_configured(),
        "Starting billing webhooks"
    );

    let stores = open_stores(&config).await?;

    let api = Arc::new(HttpEntitlementClient::new(&config.entitlement)?);
    let notifier = DownstreamNotifier::new(
        api,
        RetryPolicy::from(&config.entitlement),
        config.entitlement.deadline(),
    );

    let verifier = config.webhook.secret.clone().map(|secret| {
        SignatureVerifier::new(secret, config.webhook.clock_skew_tolerance_secs)
    });
    if verifier.is_none() {
        tracing::warn!("Webhook secret not configured; deliveries will be refused with 503");
    }

    let handler = ProcessWebhookHandler::new(
        verifier,
        stores.idempotency.clone(),
        stores.subscriptions,
        stores.payments,
        notifier,
        config.webhook.revocation_policy,
    );

    // Background purge of expired idempotency records
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let janitor = IdempotencyJanitor::new(
        stores.idempotency,
        config.webhook.retention(),
        config.webhook.purge_interval(),
    );
    let janitor_task = tokio::spawn(async move { janitor.run(shutdown_rx).await });

    let app = app_router(
        WebhookAppState {
            handler: Arc::new(handler),
        },
        HealthState {
            configuration: ConfigurationStatus::from_config(&config),
        },
        config.server.request_timeout(),
    );

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Billing webhooks listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Err(e) = janitor_task.await {
        tracing::warn!(error = %e, "Idempotency janitor did not stop cleanly");
    }

    tracing::info!("Billing webhooks stopped");
    Ok(())
}

/// JSON logs in production, human-readable logs elsewhere. `RUST_LOG`
/// overrides the configured filter.
fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.is_production() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().pretty()).init();
    }
}

async fn open_stores(config: &AppConfig) -> Result<Stores, BoxError> {
    let Some(database) = &config.database else {
        tracing::warn!("No database configured; using in-memory storage");
        return Ok(Stores {
            idempotency: Arc::new(InMemoryIdempotencyStore::with_lease(
                config.webhook.processing_lease(),
            )),
            subscriptions: Arc::new(InMemorySubscriptionRepository::new()),
            payments: Arc::new(InMemoryPaymentRepository::new()),
        });
    };

    let pool = postgres::connect(database).await?;
    if database.run_migrations {
        postgres::run_migrations(&pool).await?;
    }

    Ok(Stores {
        idempotency: Arc::new(PostgresIdempotencyStore::new(
            pool.clone(),
            config.webhook.processing_lease(),
        )),
        subscriptions: Arc::new(PostgresSubscriptionRepository::new(pool.clone())),
        payments: Arc::new(PostgresPaymentRepository::new(pool)),
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, stopping server...");
}
