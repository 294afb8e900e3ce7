use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use super::domain::{
    ApplicationState, Job, JobDetailsUpdate, JobFilter, JobId, JobScope, JobState, NewJob,
    PageLimits, PageRequest, UserId,
};
use super::error::{MarketplaceError, StateViolation};
use super::policy;
use super::repository::{load_job, JobRepository, StoreTransaction, TransactionalStore};

static JOB_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_job_id() -> JobId {
    let id = JOB_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    JobId(format!("job-{id:06}"))
}

fn require_positive(field: &str, value: u64) -> Result<(), MarketplaceError> {
    if value == 0 {
        Err(MarketplaceError::Validation(format!(
            "{field} must be greater than zero"
        )))
    } else {
        Ok(())
    }
}

fn validate_filter(filter: &JobFilter) -> Result<(), MarketplaceError> {
    match (filter.min_rate, filter.max_rate) {
        (Some(min), Some(max)) if min > max => Err(MarketplaceError::Validation(format!(
            "min_rate {min} exceeds max_rate {max}"
        ))),
        _ => Ok(()),
    }
}

/// Owns job creation, the job state machine, and detail edits.
pub struct JobLifecycleService<S> {
    store: Arc<S>,
    limits: PageLimits,
}

impl<S> JobLifecycleService<S> {
    pub fn new(store: Arc<S>, limits: PageLimits) -> Self {
        Self { store, limits }
    }
}

impl<S> JobLifecycleService<S>
where
    S: JobRepository,
{
    /// Post a new job in `Waiting` with no contractor.
    pub fn create_job(&self, employer: &UserId, terms: NewJob) -> Result<Job, MarketplaceError> {
        require_positive("rate", terms.rate)?;
        require_positive("duration", u64::from(terms.duration))?;
        require_positive("invoice_interval", u64::from(terms.invoice_interval))?;

        let now = Utc::now();
        let job = Job {
            id: next_job_id(),
            employer_id: employer.clone(),
            contractor_id: None,
            rate: terms.rate,
            duration: terms.duration,
            invoice_interval: terms.invoice_interval,
            state: JobState::Waiting,
            created_at: now,
            updated_at: now,
        };

        let stored = self.store.insert_job(job)?;
        info!(job_id = %stored.id, employer = %stored.employer_id, "job posted");
        Ok(stored)
    }

    pub fn get_job(&self, job_id: &JobId) -> Result<Job, MarketplaceError> {
        load_job(&*self.store, job_id)
    }

    /// Change rate and/or duration while the job is still open.
    pub fn update_details(
        &self,
        job_id: &JobId,
        caller: &UserId,
        update: JobDetailsUpdate,
    ) -> Result<Job, MarketplaceError> {
        if update.is_empty() {
            return Err(MarketplaceError::Validation(
                "provide at least one of rate or duration".to_string(),
            ));
        }
        if let Some(rate) = update.rate {
            require_positive("rate", rate)?;
        }
        if let Some(duration) = update.duration {
            require_positive("duration", u64::from(duration))?;
        }

        let mut job = load_job(&*self.store, job_id)?;
        policy::require_detail_editor(&job, caller)?;

        let observed = job.state;
        if let Some(rate) = update.rate {
            job.rate = rate;
        }
        if let Some(duration) = update.duration {
            job.duration = duration;
        }
        job.updated_at = Utc::now();

        let updated = self.store.update_job(job, observed)?;
        info!(
            job_id = %updated.id,
            rate = updated.rate,
            duration = updated.duration,
            "job details updated"
        );
        Ok(updated)
    }

    /// Step the job one state forward. `Ongoing` is only reachable by accepting an application.
    pub fn update_state(
        &self,
        job_id: &JobId,
        caller: &UserId,
        target: JobState,
    ) -> Result<Job, MarketplaceError> {
        let mut job = load_job(&*self.store, job_id)?;
        policy::require_job_transition(&job, target)?;
        policy::require_job_party(&job, caller)?;

        let observed = job.state;
        job.state = target;
        job.updated_at = Utc::now();

        let updated = self.store.update_job(job, observed)?;
        info!(
            job_id = %updated.id,
            from = observed.label(),
            to = target.label(),
            caller = %caller,
            "job state changed"
        );
        Ok(updated)
    }

    /// Open jobs that nobody has been assigned to yet.
    pub fn list_available(
        &self,
        filter: JobFilter,
        page: PageRequest,
    ) -> Result<Vec<Job>, MarketplaceError> {
        self.list(&JobScope::Available, filter, page)
    }

    /// Jobs posted by `caller`.
    pub fn list_by_employer(
        &self,
        caller: &UserId,
        filter: JobFilter,
        page: PageRequest,
    ) -> Result<Vec<Job>, MarketplaceError> {
        self.list(&JobScope::Employer(caller.clone()), filter, page)
    }

    /// Jobs `caller` has been assigned to.
    pub fn list_by_contractor(
        &self,
        caller: &UserId,
        filter: JobFilter,
        page: PageRequest,
    ) -> Result<Vec<Job>, MarketplaceError> {
        self.list(&JobScope::Contractor(caller.clone()), filter, page)
    }

    fn list(
        &self,
        scope: &JobScope,
        filter: JobFilter,
        page: PageRequest,
    ) -> Result<Vec<Job>, MarketplaceError> {
        validate_filter(&filter)?;
        let page = self.limits.resolve(page);
        let jobs = self.store.list_jobs(scope, &filter, page)?;
        debug!(?scope, count = jobs.len(), "listed jobs");
        Ok(jobs)
    }
}

impl<S> JobLifecycleService<S>
where
    S: TransactionalStore,
{
    /// Remove an open job together with its rejected and withdrawn applications.
    ///
    /// Refused while any invoice or waiting application still references the job.
    pub fn delete_job(&self, job_id: &JobId, caller: &UserId) -> Result<(), MarketplaceError> {
        let tx = self.store.begin()?;

        let job = load_job(tx.jobs(), job_id)?;
        policy::require_open_job(&job)?;
        policy::require_employer(&job, caller)?;

        let pending = tx
            .applications()
            .count_applications(job_id, Some(ApplicationState::Waiting))?;
        let billed = tx.invoices().max_interval_for_job(job_id)?;
        if pending > 0 || billed > 0 {
            debug!(job_id = %job_id, pending, billed, "job delete refused");
            return Err(StateViolation::JobHasDependents.into());
        }

        let removed = tx.applications().delete_applications_by_job(job_id)?;
        tx.jobs().delete_job(job_id)?;
        tx.commit()?;

        info!(job_id = %job_id, removed_applications = removed, "job deleted");
        Ok(())
    }
}
