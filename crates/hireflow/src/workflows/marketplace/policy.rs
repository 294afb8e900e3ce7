//! Authorization and state-legality predicates consulted before every mutation.
//!
//! Each check is pure: it inspects the caller identity and already-loaded entities and never
//! touches a store.

use super::domain::{ApplicationState, Invoice, InvoiceState, Job, JobApplication, JobState, UserId};
use super::error::{EntityKind, MarketplaceError, StateViolation};

pub fn require_employer(job: &Job, caller: &UserId) -> Result<(), MarketplaceError> {
    if job.is_employer(caller) {
        Ok(())
    } else {
        Err(MarketplaceError::Forbidden("only the job's employer may do this"))
    }
}

pub fn require_contractor(job: &Job, caller: &UserId) -> Result<(), MarketplaceError> {
    if job.is_contractor(caller) {
        Ok(())
    } else {
        Err(MarketplaceError::Forbidden("only the job's assigned contractor may do this"))
    }
}

/// Employer or assigned contractor.
pub fn require_job_party(job: &Job, caller: &UserId) -> Result<(), MarketplaceError> {
    if job.is_party(caller) {
        Ok(())
    } else {
        Err(MarketplaceError::Forbidden(
            "caller is neither the employer nor the contractor of this job",
        ))
    }
}

pub fn require_not_employer(job: &Job, caller: &UserId) -> Result<(), MarketplaceError> {
    if job.is_employer(caller) {
        Err(MarketplaceError::Forbidden("employers cannot apply to their own job"))
    } else {
        Ok(())
    }
}

pub fn require_applicant(
    application: &JobApplication,
    caller: &UserId,
) -> Result<(), MarketplaceError> {
    if application.contractor_id == *caller {
        Ok(())
    } else {
        Err(MarketplaceError::Forbidden("only the applicant may do this"))
    }
}

pub fn require_applicant_or_employer(
    application: &JobApplication,
    job: &Job,
    caller: &UserId,
) -> Result<(), MarketplaceError> {
    if application.contractor_id == *caller || job.is_employer(caller) {
        Ok(())
    } else {
        Err(MarketplaceError::Forbidden(
            "only the applicant or the job's employer may view this application",
        ))
    }
}

/// Terms may only change while the employer still owns an unassigned, waiting job. Every
/// failure here is `Forbidden`, whether identity or state is at fault.
pub fn require_detail_editor(job: &Job, caller: &UserId) -> Result<(), MarketplaceError> {
    if !job.is_employer(caller) {
        return Err(MarketplaceError::Forbidden("only the job's employer may edit its details"));
    }
    if !job.is_open() {
        return Err(MarketplaceError::Forbidden(
            "job details are locked once the job leaves waiting",
        ));
    }
    Ok(())
}

pub fn require_open_job(job: &Job) -> Result<(), MarketplaceError> {
    if job.is_open() {
        Ok(())
    } else {
        Err(StateViolation::JobNotOpen.into())
    }
}

pub fn require_ongoing_job(job: &Job) -> Result<(), MarketplaceError> {
    if job.state == JobState::Ongoing {
        Ok(())
    } else {
        Err(StateViolation::JobNotOngoing.into())
    }
}

pub fn require_waiting_application(application: &JobApplication) -> Result<(), MarketplaceError> {
    if application.state == ApplicationState::Waiting {
        Ok(())
    } else {
        Err(StateViolation::ApplicationNotWaiting.into())
    }
}

pub fn require_waiting_invoice(invoice: &Invoice) -> Result<(), MarketplaceError> {
    if invoice.state == InvoiceState::Waiting {
        Ok(())
    } else {
        Err(StateViolation::InvoiceNotWaiting.into())
    }
}

/// Callers may only step a job one state forward, and never into `Ongoing`: that edge belongs
/// to accepting an application.
pub fn require_job_transition(job: &Job, target: JobState) -> Result<(), MarketplaceError> {
    let legal = target != JobState::Ongoing && job.state.successor() == Some(target);
    if legal {
        Ok(())
    } else {
        Err(MarketplaceError::InvalidTransition {
            entity: EntityKind::Job,
            from: job.state.label(),
            to: target.label(),
        })
    }
}

pub fn require_invoice_transition(
    invoice: &Invoice,
    target: InvoiceState,
) -> Result<(), MarketplaceError> {
    if invoice.state == InvoiceState::Waiting && target == InvoiceState::Complete {
        Ok(())
    } else {
        Err(MarketplaceError::InvalidTransition {
            entity: EntityKind::Invoice,
            from: invoice.state.label(),
            to: target.label(),
        })
    }
}
