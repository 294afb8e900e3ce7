use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;

use super::domain::{
    ApplicationId, ApplicationScope, ApplicationState, Invoice, InvoiceId, InvoiceState, Job,
    JobApplication, JobFilter, JobId, JobScope, JobState, Page, UserId,
};
use super::error::EntityKind;
use super::repository::{
    ApplicationRepository, InvoiceRepository, JobRepository, RepositoryError, StoreTransaction,
    TransactionalStore,
};

#[derive(Debug, Default, Clone)]
struct MarketState {
    jobs: HashMap<JobId, Job>,
    applications: HashMap<ApplicationId, JobApplication>,
    invoices: HashMap<InvoiceId, Invoice>,
}

fn latest_interval(state: &MarketState, job_id: &JobId) -> u32 {
    state
        .invoices
        .values()
        .filter(|invoice| invoice.job_id == *job_id)
        .map(|invoice| invoice.interval_number)
        .max()
        .unwrap_or(0)
}

fn paginate<T>(items: Vec<T>, page: Page) -> Vec<T> {
    items
        .into_iter()
        .skip(page.offset)
        .take(page.limit)
        .collect()
}

/// Process-local store backing the API service, the CLI demo, and tests.
///
/// A transaction takes the store lock for its whole scope and writes to a staged copy of the
/// data; commit swaps the copy in.
#[derive(Debug, Default, Clone)]
pub struct InMemoryMarketplace {
    state: Arc<Mutex<MarketState>>,
}

impl InMemoryMarketplace {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MarketState> {
        // Committed data is only ever replaced wholesale, so a panic while the lock was held
        // cannot have left it half written.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn staged(state: MarketState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }
}

impl JobRepository for InMemoryMarketplace {
    fn insert_job(&self, job: Job) -> Result<Job, RepositoryError> {
        let mut guard = self.lock();
        if guard.jobs.contains_key(&job.id) {
            return Err(RepositoryError::Conflict(format!(
                "job {} already exists",
                job.id
            )));
        }
        guard.jobs.insert(job.id.clone(), job.clone());
        Ok(job)
    }

    fn fetch_job(&self, id: &JobId) -> Result<Option<Job>, RepositoryError> {
        Ok(self.lock().jobs.get(id).cloned())
    }

    fn update_job(&self, job: Job, expected: JobState) -> Result<Job, RepositoryError> {
        let mut guard = self.lock();
        let current = guard
            .jobs
            .get(&job.id)
            .ok_or_else(|| RepositoryError::NotFound {
                entity: EntityKind::Job,
                id: job.id.to_string(),
            })?;
        if current.state != expected {
            return Err(RepositoryError::Conflict(format!(
                "job {} moved to {} concurrently",
                job.id,
                current.state.label()
            )));
        }
        guard.jobs.insert(job.id.clone(), job.clone());
        Ok(job)
    }

    fn delete_job(&self, id: &JobId) -> Result<(), RepositoryError> {
        match self.lock().jobs.remove(id) {
            Some(_) => Ok(()),
            None => Err(RepositoryError::NotFound {
                entity: EntityKind::Job,
                id: id.to_string(),
            }),
        }
    }

    fn list_jobs(
        &self,
        scope: &JobScope,
        filter: &JobFilter,
        page: Page,
    ) -> Result<Vec<Job>, RepositoryError> {
        let guard = self.lock();
        let mut jobs: Vec<Job> = guard
            .jobs
            .values()
            .filter(|job| scope.contains(job) && filter.matches(job))
            .cloned()
            .collect();
        jobs.sort_by_key(|job| Reverse((job.created_at, job.id.clone())));
        Ok(paginate(jobs, page))
    }
}

impl ApplicationRepository for InMemoryMarketplace {
    fn insert_application(
        &self,
        application: JobApplication,
    ) -> Result<JobApplication, RepositoryError> {
        let mut guard = self.lock();
        if guard.applications.contains_key(&application.id) {
            return Err(RepositoryError::Conflict(format!(
                "application {} already exists",
                application.id
            )));
        }
        let duplicate = guard.applications.values().any(|existing| {
            existing.job_id == application.job_id
                && existing.contractor_id == application.contractor_id
        });
        if duplicate {
            return Err(RepositoryError::Conflict(format!(
                "{} already applied to job {}",
                application.contractor_id, application.job_id
            )));
        }
        guard
            .applications
            .insert(application.id.clone(), application.clone());
        Ok(application)
    }

    fn fetch_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<JobApplication>, RepositoryError> {
        Ok(self.lock().applications.get(id).cloned())
    }

    fn find_application(
        &self,
        job_id: &JobId,
        contractor_id: &UserId,
    ) -> Result<Option<JobApplication>, RepositoryError> {
        Ok(self
            .lock()
            .applications
            .values()
            .find(|application| {
                application.job_id == *job_id && application.contractor_id == *contractor_id
            })
            .cloned())
    }

    fn update_application(
        &self,
        application: JobApplication,
        expected: ApplicationState,
    ) -> Result<JobApplication, RepositoryError> {
        let mut guard = self.lock();
        let current =
            guard
                .applications
                .get(&application.id)
                .ok_or_else(|| RepositoryError::NotFound {
                    entity: EntityKind::Application,
                    id: application.id.to_string(),
                })?;
        if current.state != expected {
            return Err(RepositoryError::Conflict(format!(
                "application {} moved to {} concurrently",
                application.id,
                current.state.label()
            )));
        }
        guard
            .applications
            .insert(application.id.clone(), application.clone());
        Ok(application)
    }

    fn update_state_by_job_id(
        &self,
        job_id: &JobId,
        state: ApplicationState,
        exclude: Option<&ApplicationId>,
    ) -> Result<usize, RepositoryError> {
        let mut guard = self.lock();
        let now = Utc::now();
        let mut updated = 0;
        for application in guard.applications.values_mut() {
            if application.job_id != *job_id
                || application.state != ApplicationState::Waiting
                || exclude == Some(&application.id)
            {
                continue;
            }
            application.state = state;
            application.updated_at = now;
            updated += 1;
        }
        Ok(updated)
    }

    fn list_applications(
        &self,
        scope: &ApplicationScope,
        state: Option<ApplicationState>,
        page: Page,
    ) -> Result<Vec<JobApplication>, RepositoryError> {
        let guard = self.lock();
        let mut applications: Vec<JobApplication> = guard
            .applications
            .values()
            .filter(|application| {
                scope.contains(application) && state.map_or(true, |s| application.state == s)
            })
            .cloned()
            .collect();
        applications.sort_by_key(|application| {
            Reverse((application.created_at, application.id.clone()))
        });
        Ok(paginate(applications, page))
    }

    fn count_applications(
        &self,
        job_id: &JobId,
        state: Option<ApplicationState>,
    ) -> Result<usize, RepositoryError> {
        Ok(self
            .lock()
            .applications
            .values()
            .filter(|application| {
                application.job_id == *job_id && state.map_or(true, |s| application.state == s)
            })
            .count())
    }

    fn delete_applications_by_job(&self, job_id: &JobId) -> Result<usize, RepositoryError> {
        let mut guard = self.lock();
        let before = guard.applications.len();
        guard
            .applications
            .retain(|_, application| application.job_id != *job_id);
        Ok(before - guard.applications.len())
    }
}

impl InvoiceRepository for InMemoryMarketplace {
    fn insert_invoice(&self, invoice: Invoice) -> Result<Invoice, RepositoryError> {
        let mut guard = self.lock();
        if guard.invoices.contains_key(&invoice.id) {
            return Err(RepositoryError::Conflict(format!(
                "invoice {} already exists",
                invoice.id
            )));
        }
        let duplicate = guard.invoices.values().any(|existing| {
            existing.job_id == invoice.job_id && existing.interval_number == invoice.interval_number
        });
        if duplicate {
            return Err(RepositoryError::Conflict(format!(
                "job {} already has an invoice for interval {}",
                invoice.job_id, invoice.interval_number
            )));
        }
        let next = latest_interval(&guard, &invoice.job_id) + 1;
        if invoice.interval_number != next {
            return Err(RepositoryError::Conflict(format!(
                "job {} bills interval {next} next, not {}",
                invoice.job_id, invoice.interval_number
            )));
        }
        guard.invoices.insert(invoice.id.clone(), invoice.clone());
        Ok(invoice)
    }

    fn fetch_invoice(&self, id: &InvoiceId) -> Result<Option<Invoice>, RepositoryError> {
        Ok(self.lock().invoices.get(id).cloned())
    }

    fn update_invoice(
        &self,
        invoice: Invoice,
        expected: InvoiceState,
    ) -> Result<Invoice, RepositoryError> {
        let mut guard = self.lock();
        let current = guard
            .invoices
            .get(&invoice.id)
            .ok_or_else(|| RepositoryError::NotFound {
                entity: EntityKind::Invoice,
                id: invoice.id.to_string(),
            })?;
        if current.state != expected {
            return Err(RepositoryError::Conflict(format!(
                "invoice {} moved to {} concurrently",
                invoice.id,
                current.state.label()
            )));
        }
        guard.invoices.insert(invoice.id.clone(), invoice.clone());
        Ok(invoice)
    }

    fn delete_invoice(
        &self,
        id: &InvoiceId,
        expected: InvoiceState,
    ) -> Result<(), RepositoryError> {
        let mut guard = self.lock();
        let current = guard
            .invoices
            .get(id)
            .ok_or_else(|| RepositoryError::NotFound {
                entity: EntityKind::Invoice,
                id: id.to_string(),
            })?;
        if current.state != expected {
            return Err(RepositoryError::Conflict(format!(
                "invoice {id} moved to {} concurrently",
                current.state.label()
            )));
        }
        if latest_interval(&guard, &current.job_id) != current.interval_number {
            return Err(RepositoryError::Conflict(format!(
                "invoice {id} is no longer the latest of job {}",
                current.job_id
            )));
        }
        guard.invoices.remove(id);
        Ok(())
    }

    fn list_invoices(
        &self,
        job_id: &JobId,
        state: Option<InvoiceState>,
        page: Page,
    ) -> Result<Vec<Invoice>, RepositoryError> {
        let guard = self.lock();
        let mut invoices: Vec<Invoice> = guard
            .invoices
            .values()
            .filter(|invoice| {
                invoice.job_id == *job_id && state.map_or(true, |s| invoice.state == s)
            })
            .cloned()
            .collect();
        invoices.sort_by_key(|invoice| invoice.interval_number);
        Ok(paginate(invoices, page))
    }

    fn max_interval_for_job(&self, job_id: &JobId) -> Result<u32, RepositoryError> {
        Ok(latest_interval(&self.lock(), job_id))
    }
}

/// Open transaction over an [`InMemoryMarketplace`].
pub struct MemoryTransaction<'a> {
    committed: MutexGuard<'a, MarketState>,
    staged: InMemoryMarketplace,
}

impl StoreTransaction for MemoryTransaction<'_> {
    fn jobs(&self) -> &dyn JobRepository {
        &self.staged
    }

    fn applications(&self) -> &dyn ApplicationRepository {
        &self.staged
    }

    fn invoices(&self) -> &dyn InvoiceRepository {
        &self.staged
    }

    fn commit(self) -> Result<(), RepositoryError> {
        let MemoryTransaction {
            mut committed,
            staged,
        } = self;
        let changes = std::mem::take(&mut *staged.lock());
        *committed = changes;
        Ok(())
    }
}

impl TransactionalStore for InMemoryMarketplace {
    type Transaction<'a> = MemoryTransaction<'a>
    where
        Self: 'a;

    fn begin(&self) -> Result<Self::Transaction<'_>, RepositoryError> {
        let committed = self.lock();
        let staged = Self::staged(committed.clone());
        Ok(MemoryTransaction { committed, staged })
    }
}
