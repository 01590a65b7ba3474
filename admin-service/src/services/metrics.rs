use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

// Global registry
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

// Metrics
pub static CHALLENGES_ISSUED_TOTAL: OnceLock<IntCounter> = OnceLock::new();
pub static CHALLENGE_VERIFY_FAILURES_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static CHALLENGE_DELIVERY_FALLBACKS_TOTAL: OnceLock<IntCounter> = OnceLock::new();
pub static AUDIT_WRITE_FAILURES_TOTAL: OnceLock<IntCounter> = OnceLock::new();

pub fn init_metrics() {
    let registry = Registry::new();

    let challenges_issued = match IntCounter::new(
        "challenges_issued_total",
        "Total number of confirmation challenges issued",
    ) {
        Ok(metric) => metric,
        Err(e) => {
            tracing::error!("Failed to create challenges_issued_total metric: {}", e);
            panic!("Failed to initialize metrics: {}", e);
        }
    };

    let verify_failures = match IntCounterVec::new(
        Opts::new(
            "challenge_verify_failures_total",
            "Total number of failed challenge verifications",
        ),
        &["kind"],
    ) {
        Ok(metric) => metric,
        Err(e) => {
            tracing::error!(
                "Failed to create challenge_verify_failures_total metric: {}",
                e
            );
            panic!("Failed to initialize metrics: {}", e);
        }
    };

    let delivery_fallbacks = match IntCounter::new(
        "challenge_delivery_fallbacks_total",
        "Total number of challenge codes delivered via in-app notification fallback",
    ) {
        Ok(metric) => metric,
        Err(e) => {
            tracing::error!(
                "Failed to create challenge_delivery_fallbacks_total metric: {}",
                e
            );
            panic!("Failed to initialize metrics: {}", e);
        }
    };

    let audit_write_failures = match IntCounter::new(
        "audit_write_failures_total",
        "Total number of audit entries that could not be persisted",
    ) {
        Ok(metric) => metric,
        Err(e) => {
            tracing::error!("Failed to create audit_write_failures_total metric: {}", e);
            panic!("Failed to initialize metrics: {}", e);
        }
    };

    if let Err(e) = registry.register(Box::new(challenges_issued.clone())) {
        tracing::error!("Failed to register challenges_issued_total collector: {}", e);
        panic!("Failed to initialize metrics: {}", e);
    }

    if let Err(e) = registry.register(Box::new(verify_failures.clone())) {
        tracing::error!(
            "Failed to register challenge_verify_failures_total collector: {}",
            e
        );
        panic!("Failed to initialize metrics: {}", e);
    }

    if let Err(e) = registry.register(Box::new(delivery_fallbacks.clone())) {
        tracing::error!(
            "Failed to register challenge_delivery_fallbacks_total collector: {}",
            e
        );
        panic!("Failed to initialize metrics: {}", e);
    }

    if let Err(e) = registry.register(Box::new(audit_write_failures.clone())) {
        tracing::error!(
            "Failed to register audit_write_failures_total collector: {}",
            e
        );
        panic!("Failed to initialize metrics: {}", e);
    }

    // Initialize globals
    let _ = REGISTRY.set(registry);
    let _ = CHALLENGES_ISSUED_TOTAL.set(challenges_issued);
    let _ = CHALLENGE_VERIFY_FAILURES_TOTAL.set(verify_failures);
    let _ = CHALLENGE_DELIVERY_FALLBACKS_TOTAL.set(delivery_fallbacks);
    let _ = AUDIT_WRITE_FAILURES_TOTAL.set(audit_write_failures);
}

// Increment helpers tolerate an uninitialized registry so service code and
// tests never have to care whether init_metrics ran.

pub fn inc_challenges_issued() {
    if let Some(counter) = CHALLENGES_ISSUED_TOTAL.get() {
        counter.inc();
    }
}

pub fn inc_challenge_verify_failure(kind: &str) {
    if let Some(counter) = CHALLENGE_VERIFY_FAILURES_TOTAL.get() {
        counter.with_label_values(&[kind]).inc();
    }
}

pub fn inc_challenge_delivery_fallback() {
    if let Some(counter) = CHALLENGE_DELIVERY_FALLBACKS_TOTAL.get() {
        counter.inc();
    }
}

pub fn inc_audit_write_failure() {
    if let Some(counter) = AUDIT_WRITE_FAILURES_TOTAL.get() {
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

    let metric_families = registry.gather();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
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
