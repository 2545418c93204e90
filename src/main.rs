use std::sync::Arc;

use lastmile_ledger::api;
use lastmile_ledger::config::Config;
use lastmile_ledger::engine::jobs::{self, Job};
use lastmile_ledger::error::AppError;
use lastmile_ledger::evidence::LocalEvidenceStore;
use lastmile_ledger::notify::SmsGateway;
use lastmile_ledger::state::AppState;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let mut app_state = AppState::new(config.event_buffer_size)
        .with_evidence_store(Arc::new(LocalEvidenceStore::new(&config.evidence_dir)));

    match &config.sms_gateway_url {
        Some(url) => {
            let gateway = SmsGateway::new(url.clone(), config.sms_timeout)
                .map_err(|err| AppError::Internal(format!("failed to build sms client: {err}")))?;
            app_state = app_state.with_sms_transport(Arc::new(gateway));
            tracing::info!(url = %url, "sms gateway configured");
        }
        None => tracing::warn!("SMS_GATEWAY_URL not set, sms notifications will not be sent"),
    }

    let shared_state = Arc::new(app_state);

    let job_handles = [
        jobs::spawn(shared_state.clone(), Job::Overdue, config.overdue_interval),
        jobs::spawn(shared_state.clone(), Job::Cleanup, config.cleanup_interval),
        jobs::spawn(shared_state.clone(), Job::Tiers, config.tier_interval),
    ];

    let app = api::rest::router(shared_state);

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = config.http_port, "http server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    for handle in job_handles {
        handle.abort();
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
