use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use super::domain::{
    ApplicationId, ApplicationScope, ApplicationState, Job, JobApplication, JobId, JobState,
    PageLimits, PageRequest, UserId,
};
use super::error::MarketplaceError;
use super::policy;
use super::repository::{
    load_application, load_job, ApplicationRepository, JobRepository, StoreTransaction,
    TransactionalStore,
};

static APPLICATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_application_id() -> ApplicationId {
    let id = APPLICATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ApplicationId(format!("application-{id:06}"))
}

/// Coordinates apply, accept, reject, and withdraw.
pub struct ApplicationWorkflowService<S> {
    store: Arc<S>,
    limits: PageLimits,
}

impl<S> ApplicationWorkflowService<S> {
    pub fn new(store: Arc<S>, limits: PageLimits) -> Self {
        Self { store, limits }
    }
}

impl<S> ApplicationWorkflowService<S>
where
    S: JobRepository + ApplicationRepository,
{
    /// Submit `contractor`'s application for an open job.
    pub fn apply(
        &self,
        job_id: &JobId,
        contractor: &UserId,
    ) -> Result<JobApplication, MarketplaceError> {
        let job = load_job(&*self.store, job_id)?;
        policy::require_open_job(&job)?;
        policy::require_not_employer(&job, contractor)?;

        if let Some(existing) = self.store.find_application(job_id, contractor)? {
            return Err(MarketplaceError::Conflict(format!(
                "{contractor} already applied to job {job_id} ({})",
                existing.id
            )));
        }

        let now = Utc::now();
        let application = JobApplication {
            id: next_application_id(),
            job_id: job.id.clone(),
            contractor_id: contractor.clone(),
            state: ApplicationState::Waiting,
            created_at: now,
            updated_at: now,
        };

        let stored = self.store.insert_application(application)?;
        info!(
            application_id = %stored.id,
            job_id = %job.id,
            contractor = %contractor,
            "application submitted"
        );
        Ok(stored)
    }

    /// Employer declines a waiting application.
    pub fn reject(
        &self,
        application_id: &ApplicationId,
        caller: &UserId,
    ) -> Result<JobApplication, MarketplaceError> {
        let application = load_application(&*self.store, application_id)?;
        let job = load_job(&*self.store, &application.job_id)?;
        policy::require_waiting_application(&application)?;
        policy::require_employer(&job, caller)?;

        self.finish(application, ApplicationState::Rejected)
    }

    /// Applicant pulls a waiting application.
    pub fn withdraw(
        &self,
        application_id: &ApplicationId,
        caller: &UserId,
    ) -> Result<JobApplication, MarketplaceError> {
        let application = load_application(&*self.store, application_id)?;
        policy::require_waiting_application(&application)?;
        policy::require_applicant(&application, caller)?;

        self.finish(application, ApplicationState::Withdrawn)
    }

    pub fn get_application(
        &self,
        application_id: &ApplicationId,
        caller: &UserId,
    ) -> Result<JobApplication, MarketplaceError> {
        let application = load_application(&*self.store, application_id)?;
        let job = load_job(&*self.store, &application.job_id)?;
        policy::require_applicant_or_employer(&application, &job, caller)?;
        Ok(application)
    }

    /// Applications submitted by `caller`, newest first.
    pub fn list_by_contractor(
        &self,
        caller: &UserId,
        state: Option<ApplicationState>,
        page: PageRequest,
    ) -> Result<Vec<JobApplication>, MarketplaceError> {
        let scope = ApplicationScope::Contractor(caller.clone());
        let applications = self
            .store
            .list_applications(&scope, state, self.limits.resolve(page))?;
        debug!(contractor = %caller, count = applications.len(), "listed applications");
        Ok(applications)
    }

    /// Applications received for a job, newest first. Employer only.
    pub fn list_by_job(
        &self,
        job_id: &JobId,
        caller: &UserId,
        state: Option<ApplicationState>,
        page: PageRequest,
    ) -> Result<Vec<JobApplication>, MarketplaceError> {
        let job = load_job(&*self.store, job_id)?;
        policy::require_employer(&job, caller)?;

        let scope = ApplicationScope::Job(job.id.clone());
        let applications = self
            .store
            .list_applications(&scope, state, self.limits.resolve(page))?;
        debug!(job_id = %job.id, count = applications.len(), "listed applications");
        Ok(applications)
    }

    fn finish(
        &self,
        mut application: JobApplication,
        target: ApplicationState,
    ) -> Result<JobApplication, MarketplaceError> {
        application.state = target;
        application.updated_at = Utc::now();

        let updated = self
            .store
            .update_application(application, ApplicationState::Waiting)?;
        info!(application_id = %updated.id, to = target.label(), "application closed");
        Ok(updated)
    }
}

impl<S> ApplicationWorkflowService<S>
where
    S: TransactionalStore,
{
    /// Accept one application and hand its job to the applicant.
    ///
    /// In a single transaction: the application becomes `Accepted`, the job becomes `Ongoing`
    /// with the applicant as contractor, and every other waiting application for the job is
    /// rejected. Nothing is written unless all three succeed.
    pub fn accept(
        &self,
        application_id: &ApplicationId,
        caller: &UserId,
    ) -> Result<Job, MarketplaceError> {
        let tx = self.store.begin()?;

        let mut application = load_application(tx.applications(), application_id)?;
        let mut job = load_job(tx.jobs(), &application.job_id)?;
        policy::require_open_job(&job)?;
        policy::require_waiting_application(&application)?;
        policy::require_employer(&job, caller)?;

        let now = Utc::now();
        application.state = ApplicationState::Accepted;
        application.updated_at = now;
        let application = tx
            .applications()
            .update_application(application, ApplicationState::Waiting)?;

        job.contractor_id = Some(application.contractor_id.clone());
        job.state = JobState::Ongoing;
        job.updated_at = now;
        let job = tx.jobs().update_job(job, JobState::Waiting)?;

        let rejected = tx.applications().update_state_by_job_id(
            &job.id,
            ApplicationState::Rejected,
            Some(&application.id),
        )?;

        tx.commit()?;

        info!(
            application_id = %application.id,
            job_id = %job.id,
            contractor = %application.contractor_id,
            rejected_siblings = rejected,
            "application accepted"
        );
        Ok(job)
    }
}
