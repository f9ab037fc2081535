//! Kasira API Server
//!
//! Main entry point for the Kasira wallet rule engine service.

use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kasira_api::{AppState, create_router};
use kasira_core::compliance::ComplianceVerificationService;
use kasira_core::customer::{Customer, CustomerDirectory};
use kasira_core::events::EventSink;
use kasira_shared::AppConfig;
use kasira_shared::types::CustomerId;
use kasira_store::{EngineService, InMemoryCustomerDirectory, StaticComplianceService};

/// Event sink that logs every engine event as a structured trace line.
struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: kasira_core::events::EngineEvent) {
        info!(event = event.name(), payload = ?event, "engine event");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kasira=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = AppConfig::load().map_err(|err| anyhow::anyhow!("configuration error: {err}"))?;

    // Wire the external seams. The verification service and customer
    // directory are in-memory stand-ins here; production deployments
    // adapt their providers behind the same traits.
    let verifier = Arc::new(StaticComplianceService::new());
    let directory = Arc::new(InMemoryCustomerDirectory::new());
    seed_demo_customer(&directory);

    let service = EngineService::new(
        &config.engine,
        Arc::clone(&verifier) as Arc<dyn ComplianceVerificationService>,
        Arc::clone(&directory) as Arc<dyn CustomerDirectory>,
        Arc::new(TracingEventSink) as Arc<dyn EventSink>,
    );
    info!(
        kyc_required_threshold = config.engine.kyc_required_threshold,
        concurrency_retry_limit = config.engine.concurrency_retry_limit,
        "engine configured"
    );

    // Create application state
    let state = AppState {
        service: Arc::new(service),
    };

    // Create router
    let app = create_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Seeds one well-known customer so a fresh instance is usable
/// immediately; its id is logged at startup.
fn seed_demo_customer(directory: &InMemoryCustomerDirectory) {
    let customer = Customer {
        id: CustomerId::new(),
        display_name: "Demo Customer".to_string(),
        kyc_verified_up_to: Some(Decimal::from(1_000_000)),
        risk_flagged: false,
    };
    info!(customer_id = %customer.id, "seeded demo customer");
    directory.upsert(customer);
}
