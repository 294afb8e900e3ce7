use std::sync::Arc;

use super::applications::ApplicationWorkflowService;
use super::domain::PageLimits;
use super::invoices::InvoiceService;
use super::jobs::JobLifecycleService;
use super::repository::MarketplaceStore;

/// Service bundle sharing one backing store, handed to the request-handling layer.
pub struct Marketplace<S> {
    jobs: JobLifecycleService<S>,
    applications: ApplicationWorkflowService<S>,
    invoices: InvoiceService<S>,
}

impl<S> Marketplace<S>
where
    S: MarketplaceStore,
{
    pub fn new(store: Arc<S>, limits: PageLimits) -> Self {
        Self {
            jobs: JobLifecycleService::new(store.clone(), limits),
            applications: ApplicationWorkflowService::new(store.clone(), limits),
            invoices: InvoiceService::new(store, limits),
        }
    }

    pub fn jobs(&self) -> &JobLifecycleService<S> {
        &self.jobs
    }

    pub fn applications(&self) -> &ApplicationWorkflowService<S> {
        &self.applications
    }

    pub fn invoices(&self) -> &InvoiceService<S> {
        &self.invoices
    }
}
