use std::sync::Arc;

use anyhow::Context;
use rust_decimal::Decimal;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

use order_lifecycle::domain::order::{
    NewOrder, OrderStatus, OrderType, PaymentStatus, TransitionOrderStatus,
};
use order_lifecycle::metrics::{self, Metrics};
use order_lifecycle::store::{MemoryOrderStore, OrderStore, PgOrderStore};
use order_lifecycle::{EngineConfig, OrderLifecycle};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::from_filename(".env.local");

    // Initialize structured logging with environment-based filtering
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,order_lifecycle=debug")),
        )
        .init();

    tracing::info!("Starting order lifecycle engine");

    let config = EngineConfig::from_env().context("loading engine configuration")?;

    // === 1. Select the store ===
    let store: Arc<dyn OrderStore> = match &config.database_url {
        Some(url) => {
            tracing::info!("Connecting to Postgres...");
            Arc::new(
                PgOrderStore::connect(url, 10)
                    .await
                    .context("connecting to the order database")?,
            )
        }
        None => {
            tracing::info!("No database configured, using the in-memory store");
            Arc::new(MemoryOrderStore::new())
        }
    };

    // === 2. Initialize Prometheus metrics ===
    let metrics = Arc::new(Metrics::new()?);
    tracing::info!("Metrics registry created with {} metrics", metrics.registry().gather().len());

    let metrics_registry = Arc::new(metrics.registry().clone());
    let metrics_port = config.metrics_port;
    actix_web::rt::spawn(async move {
        if let Err(e) = metrics::start_metrics_server(metrics_registry, metrics_port).await {
            tracing::error!("Metrics server error: {}", e);
        }
    });

    // === 3. Build the engine ===
    let engine = OrderLifecycle::new(store, &config, metrics.clone());

    // === 4. Demo: walk orders through their lifecycle ===
    run_demo(&engine).await?;

    tracing::info!("Press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");

    Ok(())
}

async fn run_demo(engine: &OrderLifecycle) -> anyhow::Result<()> {
    let stamp = chrono::Utc::now().format("%Y%m%d%H%M%S");
    let mut ids = Vec::new();
    for (i, (order_type, cents)) in [
        (OrderType::Sales, 12_999),
        (OrderType::Rental, 4_500),
        (OrderType::Sales, 89_000),
    ]
    .into_iter()
    .enumerate()
    {
        let order = engine
            .register_order(NewOrder {
                order_number: format!("ORD-{stamp}-{:04}", i + 1),
                order_type,
                total_amount: Decimal::new(cents, 2),
                payment_status: PaymentStatus::Paid,
            })
            .await?;
        tracing::info!(order_id = %order.id, order_number = %order.order_number, "Registered demo order");
        ids.push(order.id);
    }

    let first = ids[0];
    for target in [OrderStatus::Confirmed, OrderStatus::Shipped, OrderStatus::Completed] {
        engine
            .transition_order_status(first, &TransitionOrderStatus::new(target, "demo"))
            .await?;
    }

    let mut batch_ids = ids[1..].to_vec();
    batch_ids.push(Uuid::new_v4());
    let result = engine
        .batch_transition_order_status(
            &batch_ids,
            &TransitionOrderStatus::new(OrderStatus::Confirmed, "demo").with_note("bulk confirm"),
        )
        .await?;
    tracing::info!(
        result = %serde_json::to_string(&result)?,
        "Batch result"
    );

    for entry in engine.get_order_status_history(first).await? {
        tracing::info!(sequence = entry.sequence, at = %entry.recorded_at, "{}", entry.summary());
    }

    let totals = engine.order_totals().await?;
    tracing::info!(
        total_orders = totals.total_orders,
        completion_rate = %totals.completion_rate(),
        average_order_value = %totals.average_order_value(),
        "Order totals"
    );

    Ok(())
}
