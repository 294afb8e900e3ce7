use super::domain::{
    ApplicationId, ApplicationScope, ApplicationState, Invoice, InvoiceId, InvoiceState, Job,
    JobApplication, JobFilter, JobId, JobScope, JobState, Page, UserId,
};
use super::error::{EntityKind, MarketplaceError};

/// Error enumeration for store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    /// Uniqueness violation, or a conditional write that lost against a concurrent one.
    #[error("conflicting write: {0}")]
    Conflict(String),
    #[error("{entity} {id} not found")]
    NotFound { entity: EntityKind, id: String },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Durable storage for job postings.
pub trait JobRepository {
    fn insert_job(&self, job: Job) -> Result<Job, RepositoryError>;
    fn fetch_job(&self, id: &JobId) -> Result<Option<Job>, RepositoryError>;
    /// Replaces the stored job only while it is still in the `expected` state.
    fn update_job(&self, job: Job, expected: JobState) -> Result<Job, RepositoryError>;
    fn delete_job(&self, id: &JobId) -> Result<(), RepositoryError>;
    /// Newest first.
    fn list_jobs(
        &self,
        scope: &JobScope,
        filter: &JobFilter,
        page: Page,
    ) -> Result<Vec<Job>, RepositoryError>;
}

/// Durable storage for job applications. `(job_id, contractor_id)` is unique.
pub trait ApplicationRepository {
    fn insert_application(
        &self,
        application: JobApplication,
    ) -> Result<JobApplication, RepositoryError>;
    fn fetch_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<JobApplication>, RepositoryError>;
    fn find_application(
        &self,
        job_id: &JobId,
        contractor_id: &UserId,
    ) -> Result<Option<JobApplication>, RepositoryError>;
    /// Replaces the stored application only while it is still in the `expected` state.
    fn update_application(
        &self,
        application: JobApplication,
        expected: ApplicationState,
    ) -> Result<JobApplication, RepositoryError>;
    /// Moves every `Waiting` application of `job_id` (except `exclude`) to `state`.
    fn update_state_by_job_id(
        &self,
        job_id: &JobId,
        state: ApplicationState,
        exclude: Option<&ApplicationId>,
    ) -> Result<usize, RepositoryError>;
    /// Newest first.
    fn list_applications(
        &self,
        scope: &ApplicationScope,
        state: Option<ApplicationState>,
        page: Page,
    ) -> Result<Vec<JobApplication>, RepositoryError>;
    fn count_applications(
        &self,
        job_id: &JobId,
        state: Option<ApplicationState>,
    ) -> Result<usize, RepositoryError>;
    fn delete_applications_by_job(&self, job_id: &JobId) -> Result<usize, RepositoryError>;
}

/// Durable storage for invoices. `(job_id, interval_number)` is unique.
pub trait InvoiceRepository {
    /// Fails with `Conflict` unless the invoice takes the next free interval of its job.
    fn insert_invoice(&self, invoice: Invoice) -> Result<Invoice, RepositoryError>;
    fn fetch_invoice(&self, id: &InvoiceId) -> Result<Option<Invoice>, RepositoryError>;
    /// Replaces the stored invoice only while it is still in the `expected` state.
    fn update_invoice(
        &self,
        invoice: Invoice,
        expected: InvoiceState,
    ) -> Result<Invoice, RepositoryError>;
    /// Removes the invoice only while it is still in the `expected` state and still holds the
    /// highest interval of its job.
    fn delete_invoice(&self, id: &InvoiceId, expected: InvoiceState) -> Result<(), RepositoryError>;
    /// Ascending by interval number.
    fn list_invoices(
        &self,
        job_id: &JobId,
        state: Option<InvoiceState>,
        page: Page,
    ) -> Result<Vec<Invoice>, RepositoryError>;
    /// Highest interval number billed for the job, `0` when nothing has been billed.
    fn max_interval_for_job(&self, job_id: &JobId) -> Result<u32, RepositoryError>;
}

/// Stores bound to one open transaction.
///
/// Dropping the value without calling [`StoreTransaction::commit`] rolls every write back.
pub trait StoreTransaction {
    fn jobs(&self) -> &dyn JobRepository;
    fn applications(&self) -> &dyn ApplicationRepository;
    fn invoices(&self) -> &dyn InvoiceRepository;
    fn commit(self) -> Result<(), RepositoryError>;
}

/// Store capable of opening transactions.
///
/// An open transaction excludes every other transaction that touches the same job rows, so the
/// state read at the start of the scope stays valid until commit.
pub trait TransactionalStore: Send + Sync {
    type Transaction<'a>: StoreTransaction
    where
        Self: 'a;

    fn begin(&self) -> Result<Self::Transaction<'_>, RepositoryError>;
}

/// Everything the marketplace facade needs from one backing store.
pub trait MarketplaceStore:
    JobRepository + ApplicationRepository + InvoiceRepository + TransactionalStore + 'static
{
}

impl<T> MarketplaceStore for T where
    T: JobRepository + ApplicationRepository + InvoiceRepository + TransactionalStore + 'static
{
}

pub(crate) fn load_job<R>(jobs: &R, id: &JobId) -> Result<Job, MarketplaceError>
where
    R: JobRepository + ?Sized,
{
    jobs.fetch_job(id)?
        .ok_or_else(|| MarketplaceError::not_found(EntityKind::Job, id))
}

pub(crate) fn load_application<R>(
    applications: &R,
    id: &ApplicationId,
) -> Result<JobApplication, MarketplaceError>
where
    R: ApplicationRepository + ?Sized,
{
    applications
        .fetch_application(id)?
        .ok_or_else(|| MarketplaceError::not_found(EntityKind::Application, id))
}

pub(crate) fn load_invoice<R>(invoices: &R, id: &InvoiceId) -> Result<Invoice, MarketplaceError>
where
    R: InvoiceRepository + ?Sized,
{
    invoices
        .fetch_invoice(id)?
        .ok_or_else(|| MarketplaceError::not_found(EntityKind::Invoice, id))
}
