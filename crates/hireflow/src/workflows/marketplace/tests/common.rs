use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::response::Response;
use serde_json::Value;

use crate::workflows::marketplace::domain::{
    ApplicationId, ApplicationScope, ApplicationState, Invoice, InvoiceId, InvoiceState, Job,
    JobApplication, JobFilter, JobId, JobScope, JobState, NewJob, Page, PageLimits, UserId,
};
use crate::workflows::marketplace::memory::{InMemoryMarketplace, MemoryTransaction};
use crate::workflows::marketplace::repository::{
    ApplicationRepository, InvoiceRepository, JobRepository, RepositoryError, StoreTransaction,
    TransactionalStore,
};
use crate::workflows::marketplace::{marketplace_router, Marketplace};

pub(super) fn employer() -> UserId {
    UserId("employer-e".to_string())
}

pub(super) fn other_employer() -> UserId {
    UserId("employer-f".to_string())
}

pub(super) fn contractor_x() -> UserId {
    UserId("contractor-x".to_string())
}

pub(super) fn contractor_y() -> UserId {
    UserId("contractor-y".to_string())
}

pub(super) fn stranger() -> UserId {
    UserId("stranger-z".to_string())
}

pub(super) fn terms(rate: u64, duration: u32, invoice_interval: u32) -> NewJob {
    NewJob {
        rate,
        duration,
        invoice_interval,
    }
}

pub(super) fn build_marketplace() -> (Marketplace<InMemoryMarketplace>, InMemoryMarketplace) {
    let store = InMemoryMarketplace::new();
    let marketplace = Marketplace::new(Arc::new(store.clone()), PageLimits::default());
    (marketplace, store)
}

pub(super) fn post_job(marketplace: &Marketplace<InMemoryMarketplace>, terms: NewJob) -> Job {
    marketplace
        .jobs()
        .create_job(&employer(), terms)
        .expect("job posts")
}

pub(super) fn apply(
    marketplace: &Marketplace<InMemoryMarketplace>,
    job: &Job,
    contractor: &UserId,
) -> JobApplication {
    marketplace
        .applications()
        .apply(&job.id, contractor)
        .expect("application submits")
}

/// Posts a job and assigns `contractor_x` to it.
pub(super) fn ongoing_job(marketplace: &Marketplace<InMemoryMarketplace>, terms: NewJob) -> Job {
    let job = post_job(marketplace, terms);
    let application = apply(marketplace, &job, &contractor_x());
    marketplace
        .applications()
        .accept(&application.id, &employer())
        .expect("employer accepts")
}

pub(super) fn stored_job(store: &InMemoryMarketplace, id: &JobId) -> Job {
    store
        .fetch_job(id)
        .expect("fetch succeeds")
        .expect("job present")
}

pub(super) fn stored_application(
    store: &InMemoryMarketplace,
    id: &ApplicationId,
) -> JobApplication {
    store
        .fetch_application(id)
        .expect("fetch succeeds")
        .expect("application present")
}

pub(super) fn everything() -> Page {
    Page {
        limit: usize::MAX,
        offset: 0,
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) fn router_with(marketplace: Marketplace<InMemoryMarketplace>) -> axum::Router {
    marketplace_router(Arc::new(marketplace))
}

/// Store whose every read and write fails as if the database were offline.
pub(super) struct UnavailableStore;

impl JobRepository for UnavailableStore {
    fn insert_job(&self, _job: Job) -> Result<Job, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch_job(&self, _id: &JobId) -> Result<Option<Job>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update_job(&self, _job: Job, _expected: JobState) -> Result<Job, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn delete_job(&self, _id: &JobId) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list_jobs(
        &self,
        _scope: &JobScope,
        _filter: &JobFilter,
        _page: Page,
    ) -> Result<Vec<Job>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

/// Wraps the in-memory store so the bulk sibling rejection fails mid-transaction.
pub(super) struct SiblingFailureStore {
    pub(super) inner: InMemoryMarketplace,
}

impl TransactionalStore for SiblingFailureStore {
    type Transaction<'a> = SiblingFailure<'a>
    where
        Self: 'a;

    fn begin(&self) -> Result<Self::Transaction<'_>, RepositoryError> {
        Ok(SiblingFailure {
            inner: self.inner.begin()?,
        })
    }
}

pub(super) struct SiblingFailure<'a> {
    inner: MemoryTransaction<'a>,
}

impl StoreTransaction for SiblingFailure<'_> {
    fn jobs(&self) -> &dyn JobRepository {
        self.inner.jobs()
    }

    fn applications(&self) -> &dyn ApplicationRepository {
        self
    }

    fn invoices(&self) -> &dyn InvoiceRepository {
        self.inner.invoices()
    }

    fn commit(self) -> Result<(), RepositoryError> {
        self.inner.commit()
    }
}

impl ApplicationRepository for SiblingFailure<'_> {
    fn insert_application(
        &self,
        application: JobApplication,
    ) -> Result<JobApplication, RepositoryError> {
        self.inner.applications().insert_application(application)
    }

    fn fetch_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<JobApplication>, RepositoryError> {
        self.inner.applications().fetch_application(id)
    }

    fn find_application(
        &self,
        job_id: &JobId,
        contractor_id: &UserId,
    ) -> Result<Option<JobApplication>, RepositoryError> {
        self.inner
            .applications()
            .find_application(job_id, contractor_id)
    }

    fn update_application(
        &self,
        application: JobApplication,
        expected: ApplicationState,
    ) -> Result<JobApplication, RepositoryError> {
        self.inner
            .applications()
            .update_application(application, expected)
    }

    fn update_state_by_job_id(
        &self,
        _job_id: &JobId,
        _state: ApplicationState,
        _exclude: Option<&ApplicationId>,
    ) -> Result<usize, RepositoryError> {
        Err(RepositoryError::Unavailable("connection reset".to_string()))
    }

    fn list_applications(
        &self,
        scope: &ApplicationScope,
        state: Option<ApplicationState>,
        page: Page,
    ) -> Result<Vec<JobApplication>, RepositoryError> {
        self.inner
            .applications()
            .list_applications(scope, state, page)
    }

    fn count_applications(
        &self,
        job_id: &JobId,
        state: Option<ApplicationState>,
    ) -> Result<usize, RepositoryError> {
        self.inner.applications().count_applications(job_id, state)
    }

    fn delete_applications_by_job(&self, job_id: &JobId) -> Result<usize, RepositoryError> {
        self.inner.applications().delete_applications_by_job(job_id)
    }
}

/// What [`InterferingStore`] does behind the service's back, once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Interference {
    /// Settles the invoice right after it has been read.
    SettleAfterFetch,
    /// Bills the next interval right after the latest interval has been looked up.
    BillAfterLatestLookup,
    /// Reports one interval fewer than has been billed, as a lagging replica would.
    StaleLatestInterval,
}

/// Wraps the in-memory store and lets a concurrent writer land between a service's reads and
/// its write.
pub(super) struct InterferingStore {
    pub(super) inner: InMemoryMarketplace,
    interference: Interference,
    fired: AtomicBool,
}

impl InterferingStore {
    pub(super) fn new(inner: InMemoryMarketplace, interference: Interference) -> Self {
        Self {
            inner,
            interference,
            fired: AtomicBool::new(false),
        }
    }

    fn fire(&self, interference: Interference) -> bool {
        self.interference == interference && !self.fired.swap(true, Ordering::SeqCst)
    }
}

impl JobRepository for InterferingStore {
    fn insert_job(&self, job: Job) -> Result<Job, RepositoryError> {
        self.inner.insert_job(job)
    }

    fn fetch_job(&self, id: &JobId) -> Result<Option<Job>, RepositoryError> {
        self.inner.fetch_job(id)
    }

    fn update_job(&self, job: Job, expected: JobState) -> Result<Job, RepositoryError> {
        self.inner.update_job(job, expected)
    }

    fn delete_job(&self, id: &JobId) -> Result<(), RepositoryError> {
        self.inner.delete_job(id)
    }

    fn list_jobs(
        &self,
        scope: &JobScope,
        filter: &JobFilter,
        page: Page,
    ) -> Result<Vec<Job>, RepositoryError> {
        self.inner.list_jobs(scope, filter, page)
    }
}

impl InvoiceRepository for InterferingStore {
    fn insert_invoice(&self, invoice: Invoice) -> Result<Invoice, RepositoryError> {
        self.inner.insert_invoice(invoice)
    }

    fn fetch_invoice(&self, id: &InvoiceId) -> Result<Option<Invoice>, RepositoryError> {
        let fetched = self.inner.fetch_invoice(id)?;
        if let Some(invoice) = &fetched {
            if self.fire(Interference::SettleAfterFetch) {
                let mut settled = invoice.clone();
                settled.state = InvoiceState::Complete;
                self.inner.update_invoice(settled, InvoiceState::Waiting)?;
            }
        }
        Ok(fetched)
    }

    fn update_invoice(
        &self,
        invoice: Invoice,
        expected: InvoiceState,
    ) -> Result<Invoice, RepositoryError> {
        self.inner.update_invoice(invoice, expected)
    }

    fn delete_invoice(
        &self,
        id: &InvoiceId,
        expected: InvoiceState,
    ) -> Result<(), RepositoryError> {
        self.inner.delete_invoice(id, expected)
    }

    fn list_invoices(
        &self,
        job_id: &JobId,
        state: Option<InvoiceState>,
        page: Page,
    ) -> Result<Vec<Invoice>, RepositoryError> {
        self.inner.list_invoices(job_id, state, page)
    }

    fn max_interval_for_job(&self, job_id: &JobId) -> Result<u32, RepositoryError> {
        let latest = self.inner.max_interval_for_job(job_id)?;
        if self.fire(Interference::BillAfterLatestLookup) {
            let billed = self.inner.list_invoices(job_id, None, everything())?;
            if let Some(last) = billed.last() {
                let mut next = last.clone();
                next.id = InvoiceId(format!("{}-next", last.id));
                next.interval_number += 1;
                self.inner.insert_invoice(next)?;
            }
        }
        if self.fire(Interference::StaleLatestInterval) {
            return Ok(latest.saturating_sub(1));
        }
        Ok(latest)
    }
}
