mod confirm;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use prometheus::{Encoder, Registry, TextEncoder};
use tokio::signal;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ticketgate_core::{
    load_config, metrics, validate_config, CancelToken, Config, FlowOutcome, HttpTicketingApi,
    LoggingObserver, PositionAnchorStore, ResourceId, SanitizedConfig, TicketFlow,
};

use confirm::StdinConfirmer;

/// Exit code when the flow was interrupted with Ctrl-C.
const EXIT_CANCELLED: i32 = 130;

#[tokio::main]
async fn main() {
    match run().await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("Fatal error: {:#}", e);
            std::process::exit(1);
        }
    }
}

async fn run() -> Result<i32> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let resource = parse_resource(std::env::args().skip(1))?;

    // Determine config path
    let config_path = std::env::var("TICKETGATE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    info!("Loading configuration from {:?}", config_path);
    let config = load_and_validate(&config_path)?;
    let sanitized = SanitizedConfig::from(&config);
    info!("Backend: {}", sanitized.api.base_url);
    if !sanitized.api.session_cookie_configured {
        warn!("No session cookie configured; the backend will ask for a login");
    }

    let registry = Registry::new();
    for metric in metrics::all_metrics() {
        registry
            .register(metric)
            .context("Failed to register metrics")?;
    }

    let api = Arc::new(HttpTicketingApi::new(&config.api).context("Failed to create API client")?);
    let flow = TicketFlow::new(api, PositionAnchorStore::new(), &config);

    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, leaving the purchase flow");
            on_interrupt.cancel();
        }
    });

    let outcome = flow
        .run(
            resource,
            &StdinConfirmer::new(),
            Arc::new(LoggingObserver),
            &cancel,
        )
        .await;

    log_metrics(&registry);
    Ok(report(resource, &outcome))
}

/// Parse `<festival_id> <ticket_id>`.
fn parse_resource(mut args: impl Iterator<Item = String>) -> Result<ResourceId> {
    let (Some(festival), Some(ticket)) = (args.next(), args.next()) else {
        bail!("usage: ticketgate <festival_id> <ticket_id>");
    };
    if args.next().is_some() {
        bail!("usage: ticketgate <festival_id> <ticket_id>");
    }

    let festival_id = festival
        .parse()
        .with_context(|| format!("Invalid festival id: {}", festival))?;
    let ticket_id = ticket
        .parse()
        .with_context(|| format!("Invalid ticket id: {}", ticket))?;
    Ok(ResourceId::new(festival_id, ticket_id))
}

fn load_and_validate(path: &Path) -> Result<Config> {
    let config =
        load_config(path).with_context(|| format!("Failed to load config from {:?}", path))?;
    validate_config(&config).context("Configuration validation failed")?;
    Ok(config)
}

/// Log the outcome and map it to a process exit code.
fn report(resource: ResourceId, outcome: &FlowOutcome) -> i32 {
    match outcome {
        FlowOutcome::Purchased(attempt) => {
            info!("Purchased {} (payment {})", resource, attempt.payment_id);
            0
        }
        FlowOutcome::SoldOut => {
            warn!("{} is sold out", resource);
            1
        }
        FlowOutcome::Redirect(redirect) => {
            warn!(
                "Login required: sign in at {} and return to {}",
                redirect.login_path, redirect.return_path
            );
            1
        }
        FlowOutcome::Failed(failure) => {
            if failure.retryable {
                warn!("{} Run again to retry.", failure);
            } else {
                warn!("{}", failure);
            }
            1
        }
        FlowOutcome::Declined => {
            info!("Purchase declined");
            1
        }
        FlowOutcome::Cancelled => {
            info!("Purchase flow cancelled");
            EXIT_CANCELLED
        }
    }
}

fn log_metrics(registry: &Registry) {
    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&registry.gather(), &mut buffer) {
        debug!("Failed to encode metrics: {}", e);
        return;
    }
    debug!("Metrics:\n{}", String::from_utf8_lossy(&buffer));
}
