use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use super::billing;
use super::domain::{Invoice, InvoiceId, InvoiceState, JobId, PageLimits, PageRequest, UserId};
use super::error::{MarketplaceError, StateViolation};
use super::policy;
use super::repository::{load_invoice, load_job, InvoiceRepository, JobRepository};

static INVOICE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_invoice_id() -> InvoiceId {
    let id = INVOICE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    InvoiceId(format!("invoice-{id:06}"))
}

/// Raises invoices interval by interval and settles them.
pub struct InvoiceService<S> {
    store: Arc<S>,
    limits: PageLimits,
}

impl<S> InvoiceService<S> {
    pub fn new(store: Arc<S>, limits: PageLimits) -> Self {
        Self { store, limits }
    }
}

impl<S> InvoiceService<S>
where
    S: JobRepository + InvoiceRepository,
{
    /// Bill the next interval of an ongoing job.
    ///
    /// `adjustment` is added to `rate * hours`; the resulting value never drops below zero.
    pub fn create_invoice(
        &self,
        job_id: &JobId,
        caller: &UserId,
        adjustment: Option<i64>,
    ) -> Result<Invoice, MarketplaceError> {
        let job = load_job(&*self.store, job_id)?;
        policy::require_ongoing_job(&job)?;
        policy::require_contractor(&job, caller)?;

        let last_interval = self.store.max_interval_for_job(job_id)?;
        let quote = billing::quote_next_interval(&job, last_interval, adjustment.unwrap_or(0))?;

        let now = Utc::now();
        let invoice = Invoice {
            id: next_invoice_id(),
            job_id: job.id.clone(),
            interval_number: quote.interval_number,
            value: quote.value,
            state: InvoiceState::Waiting,
            created_at: now,
            updated_at: now,
        };

        let stored = self.store.insert_invoice(invoice)?;
        info!(
            invoice_id = %stored.id,
            job_id = %job.id,
            interval = quote.interval_number,
            of = quote.max_intervals,
            hours = quote.hours,
            value = quote.value,
            "invoice raised"
        );
        Ok(stored)
    }

    pub fn get_invoice(
        &self,
        invoice_id: &InvoiceId,
        caller: &UserId,
    ) -> Result<Invoice, MarketplaceError> {
        let invoice = load_invoice(&*self.store, invoice_id)?;
        let job = load_job(&*self.store, &invoice.job_id)?;
        policy::require_job_party(&job, caller)?;
        Ok(invoice)
    }

    /// Invoices of a job in interval order.
    pub fn list_by_job(
        &self,
        job_id: &JobId,
        caller: &UserId,
        state: Option<InvoiceState>,
        page: PageRequest,
    ) -> Result<Vec<Invoice>, MarketplaceError> {
        let job = load_job(&*self.store, job_id)?;
        policy::require_job_party(&job, caller)?;

        let invoices = self
            .store
            .list_invoices(job_id, state, self.limits.resolve(page))?;
        debug!(job_id = %job_id, count = invoices.len(), "listed invoices");
        Ok(invoices)
    }

    /// Settle an invoice. Only `Waiting -> Complete` exists.
    pub fn update_state(
        &self,
        invoice_id: &InvoiceId,
        caller: &UserId,
        target: InvoiceState,
    ) -> Result<Invoice, MarketplaceError> {
        let mut invoice = load_invoice(&*self.store, invoice_id)?;
        let job = load_job(&*self.store, &invoice.job_id)?;
        policy::require_invoice_transition(&invoice, target)?;
        policy::require_contractor(&job, caller)?;

        let observed = invoice.state;
        invoice.state = target;
        invoice.updated_at = Utc::now();

        let updated = self.store.update_invoice(invoice, observed)?;
        info!(invoice_id = %updated.id, to = target.label(), "invoice state changed");
        Ok(updated)
    }

    /// Withdraw the most recent, still unsettled invoice of a job.
    pub fn delete_invoice(
        &self,
        invoice_id: &InvoiceId,
        caller: &UserId,
    ) -> Result<(), MarketplaceError> {
        let invoice = load_invoice(&*self.store, invoice_id)?;
        let job = load_job(&*self.store, &invoice.job_id)?;
        policy::require_waiting_invoice(&invoice)?;
        if self.store.max_interval_for_job(&job.id)? != invoice.interval_number {
            return Err(StateViolation::InvoiceNotLatest.into());
        }
        policy::require_contractor(&job, caller)?;

        self.store.delete_invoice(invoice_id, invoice.state)?;
        info!(
            invoice_id = %invoice_id,
            job_id = %job.id,
            interval = invoice.interval_number,
            "invoice deleted"
        );
        Ok(())
    }
}
