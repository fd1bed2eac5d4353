//! Liveness and readiness probes for orchestrators and load balancers.
//!
//! Liveness only reflects the process flag. Readiness additionally checks
//! every registered dependency (scheduling store, cache) on each probe, so a
//! lost backend takes the instance out of rotation until it recovers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use actix_web::{HttpResponse, get, http::header, web};
use async_trait::async_trait;
use futures_util::future::join_all;
use tracing::warn;

/// A backend the service cannot serve traffic without.
#[async_trait]
pub trait DependencyProbe: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Check the dependency; `Err` carries the failure reason.
    async fn check(&self) -> Result<(), String>;
}

/// Shared probe state.
pub struct HealthState {
    ready: AtomicBool,
    live: AtomicBool,
    dependencies: Vec<Arc<dyn DependencyProbe>>,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl HealthState {
    /// Start live but not ready, with the given dependency checks.
    pub fn new(dependencies: Vec<Arc<dyn DependencyProbe>>) -> Self {
        Self {
            ready: AtomicBool::new(false),
            live: AtomicBool::new(true),
            dependencies,
        }
    }

    /// Mark start-up as finished.
    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    /// Fail liveness so orchestrators see the drain during shutdown.
    pub fn mark_unhealthy(&self) {
        self.live.store(false, Ordering::Release);
    }

    /// Whether start-up has finished.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Whether the process reports itself alive.
    pub fn is_alive(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Ready flag set, process alive, and every dependency answering.
    pub async fn check_ready(&self) -> bool {
        if !self.is_ready() || !self.is_alive() {
            return false;
        }
        let results = join_all(self.dependencies.iter().map(|probe| async move {
            probe
                .check()
                .await
                .map_err(|reason| (probe.name(), reason))
        }))
        .await;

        let mut healthy = true;
        for result in results {
            if let Err((dependency, reason)) = result {
                warn!(dependency, reason = %reason, "readiness dependency failing");
                healthy = false;
            }
        }
        healthy
    }

    fn probe_response(probe_ok: bool) -> HttpResponse {
        let mut response = if probe_ok {
            HttpResponse::Ok()
        } else {
            HttpResponse::ServiceUnavailable()
        };

        response
            .insert_header((header::CACHE_CONTROL, "no-store"))
            .finish()
    }
}

/// Readiness probe: 200 when start-up finished and dependencies answer,
/// 503 otherwise.
#[get("/health/ready")]
pub async fn ready(state: web::Data<HealthState>) -> HttpResponse {
    HealthState::probe_response(state.check_ready().await)
}

/// Liveness probe: 200 while alive, 503 once draining.
#[get("/health/live")]
pub async fn live(state: web::Data<HealthState>) -> HttpResponse {
    HealthState::probe_response(state.is_alive())
}
