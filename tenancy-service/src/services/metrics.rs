use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

// Global registry
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

// HTTP
pub static HTTP_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static HTTP_REQUEST_DURATION_SECONDS: OnceLock<HistogramVec> = OnceLock::new();

// Domain
pub static ACCOUNTS_REGISTERED_TOTAL: OnceLock<IntCounter> = OnceLock::new();
pub static ORGANIZATIONS_CREATED_TOTAL: OnceLock<IntCounter> = OnceLock::new();
pub static INVITATIONS_SENT_TOTAL: OnceLock<IntCounter> = OnceLock::new();
pub static INVITATIONS_ACCEPTED_TOTAL: OnceLock<IntCounter> = OnceLock::new();

/// Registers all collectors. Calling it again is a no-op.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    if REGISTRY.get().is_some() {
        return Ok(());
    }

    let registry = Registry::new();

    let requests_total = IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests"),
        &["method", "path", "status"],
    )?;
    let request_duration = HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds",
        ),
        &["method", "path", "status"],
    )?;
    let accounts_registered = IntCounter::new(
        "accounts_registered_total",
        "Accounts created, registered or unregistered",
    )?;
    let organizations_created =
        IntCounter::new("organizations_created_total", "Organizations created")?;
    let invitations_sent = IntCounter::new(
        "invitations_sent_total",
        "Invitation mails sent, resends included",
    )?;
    let invitations_accepted =
        IntCounter::new("invitations_accepted_total", "Invitations accepted")?;

    registry.register(Box::new(requests_total.clone()))?;
    registry.register(Box::new(request_duration.clone()))?;
    registry.register(Box::new(accounts_registered.clone()))?;
    registry.register(Box::new(organizations_created.clone()))?;
    registry.register(Box::new(invitations_sent.clone()))?;
    registry.register(Box::new(invitations_accepted.clone()))?;

    let _ = REGISTRY.set(registry);
    let _ = HTTP_REQUESTS_TOTAL.set(requests_total);
    let _ = HTTP_REQUEST_DURATION_SECONDS.set(request_duration);
    let _ = ACCOUNTS_REGISTERED_TOTAL.set(accounts_registered);
    let _ = ORGANIZATIONS_CREATED_TOTAL.set(organizations_created);
    let _ = INVITATIONS_SENT_TOTAL.set(invitations_sent);
    let _ = INVITATIONS_ACCEPTED_TOTAL.set(invitations_accepted);

    Ok(())
}

/// Increments `counter` when metrics are initialized.
pub fn inc(counter: &OnceLock<IntCounter>) {
    if let Some(counter) = counter.get() {
        counter.inc();
    }
}

pub fn get_metrics() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();

    let registry = match REGISTRY.get() {
        Some(r) => r,
        None => {
            tracing::error!("Metrics registry not initialized");
            return "# Metrics registry not initialized\n".to_string();
        }
    };

    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return format!("# Failed to encode metrics: {}\n", e);
    }

    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to convert metrics to UTF-8: {}", e);
            format!("# Failed to convert metrics to UTF-8: {}\n", e)
        }
    }
}
