use hireflow::workflows::marketplace::{InMemoryMarketplace, Marketplace, PageLimits};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Marketplace services over a fresh process-local store.
pub(crate) fn in_memory_marketplace(limits: PageLimits) -> Arc<Marketplace<InMemoryMarketplace>> {
    Arc::new(Marketplace::new(
        Arc::new(InMemoryMarketplace::new()),
        limits,
    ))
}
