//! Payme Ledger service
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌──────────┐    ┌──────────┐
//! │ Provider │───▶│ /rpc     │───▶│   FSM    │───▶│ Postgres │
//! │ (Payme)  │    │(Auth+RPC)│    │  (CAS)   │    │ (ledger) │
//! └──────────┘    └──────────┘    └────┬─────┘    └──────────┘
//!                                      │ try_send
//!                                 ┌────▼─────┐
//!                                 │ Notifier │
//!                                 └──────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use payme_ledger::auth::CredentialStore;
use payme_ledger::config::AppConfig;
use payme_ledger::db::{Database, schema};
use payme_ledger::gateway::{self, state::AppState};
use payme_ledger::logging;
use payme_ledger::notify::{self, NotificationWorker, RetryPolicy, WebhookNotifier};
use payme_ledger::payment::{
    InMemoryPaymentStore, PaymentStore, PgPaymentStore, TransactionStateMachine, ledger,
};

// ============================================================
// CLI
// ============================================================

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

// ============================================================
// MAIN
// ============================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let mut config = AppConfig::load(&env).with_context(|| format!("loading config '{}'", env))?;
    if let Some(port) = get_port_override() {
        config.gateway.port = port;
    }

    let _guard = logging::init_logging(&config);
    tracing::info!(env = %env, "Starting payme_ledger");

    let (store, db): (Arc<dyn PaymentStore>, Option<Arc<Database>>) = match &config.postgres_url {
        Some(url) => {
            let db = Database::connect(url, &config.storage)
                .await
                .context("connecting to PostgreSQL")?;
            schema::init_schema(db.pool())
                .await
                .context("initialising schema")?;
            let (size, idle) = db.pool_size();
            tracing::info!(size, idle, "Schema ready");
            let store = PgPaymentStore::new(db.pool().clone());
            (Arc::new(store), Some(Arc::new(db)))
        }
        None => {
            tracing::warn!("postgres_url not set, using in-memory store (data is not persisted)");
            (Arc::new(InMemoryPaymentStore::new()), None)
        }
    };

    let mut machine = TransactionStateMachine::new(
        store,
        Duration::from_millis(config.storage.timeout_ms),
    )
    .with_ledger_offset(ledger::ledger_offset(config.ledger.utc_offset_minutes));

    if config.notifier.enabled {
        let notifier =
            WebhookNotifier::from_config(&config.notifier).context("building notifier")?;
        let (sender, receiver) = notify::notification_channel(config.notifier.queue_size);
        let worker = NotificationWorker::new(
            Arc::new(notifier),
            RetryPolicy::from_config(&config.notifier),
        );
        tokio::spawn(async move {
            worker.run(receiver).await;
        });
        machine = machine.with_notifier(sender);
        tracing::info!(queue_size = config.notifier.queue_size, "Payment notifications enabled");
    } else {
        tracing::info!("Payment notifications disabled");
    }

    let credentials = Arc::new(CredentialStore::from_config(&config.merchant));
    let state = Arc::new(AppState::new(Arc::new(machine), credentials, db));

    gateway::run_server(&config.gateway, state)
        .await
        .context("gateway server")?;
    Ok(())
}
