use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque identity of an authenticated marketplace user (employer or contractor).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Identifier wrapper for job postings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub String);

/// Identifier wrapper for job applications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

/// Identifier wrapper for invoices.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InvoiceId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Job lifecycle: `Waiting -> Ongoing -> Complete -> Archived`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Waiting,
    Ongoing,
    Complete,
    Archived,
}

impl JobState {
    pub const fn label(self) -> &'static str {
        match self {
            JobState::Waiting => "waiting",
            JobState::Ongoing => "ongoing",
            JobState::Complete => "complete",
            JobState::Archived => "archived",
        }
    }

    /// The only state this one may move to, if any.
    pub const fn successor(self) -> Option<JobState> {
        match self {
            JobState::Waiting => Some(JobState::Ongoing),
            JobState::Ongoing => Some(JobState::Complete),
            JobState::Complete => Some(JobState::Archived),
            JobState::Archived => None,
        }
    }

    pub const fn is_terminal(self) -> bool {
        self.successor().is_none()
    }
}

/// Application lifecycle. Every state other than `Waiting` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationState {
    Waiting,
    Accepted,
    Rejected,
    Withdrawn,
}

impl ApplicationState {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationState::Waiting => "waiting",
            ApplicationState::Accepted => "accepted",
            ApplicationState::Rejected => "rejected",
            ApplicationState::Withdrawn => "withdrawn",
        }
    }

    pub const fn is_terminal(self) -> bool {
        !matches!(self, ApplicationState::Waiting)
    }
}

/// Invoice lifecycle: `Waiting -> Complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceState {
    Waiting,
    Complete,
}

impl InvoiceState {
    pub const fn label(self) -> &'static str {
        match self {
            InvoiceState::Waiting => "waiting",
            InvoiceState::Complete => "complete",
        }
    }
}

/// A posted job. `contractor_id` is only ever set by accepting an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub employer_id: UserId,
    pub contractor_id: Option<UserId>,
    /// Currency units per hour.
    pub rate: u64,
    /// Total billable hours.
    pub duration: u32,
    /// Hours covered by one invoice.
    pub invoice_interval: u32,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Waiting and not yet assigned to anyone.
    pub fn is_open(&self) -> bool {
        self.state == JobState::Waiting && self.contractor_id.is_none()
    }

    pub fn is_employer(&self, user: &UserId) -> bool {
        self.employer_id == *user
    }

    pub fn is_contractor(&self, user: &UserId) -> bool {
        self.contractor_id.as_ref() == Some(user)
    }

    pub fn is_party(&self, user: &UserId) -> bool {
        self.is_employer(user) || self.is_contractor(user)
    }
}

/// A contractor's bid for a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobApplication {
    pub id: ApplicationId,
    pub job_id: JobId,
    pub contractor_id: UserId,
    pub state: ApplicationState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A bill for one interval of an ongoing job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub job_id: JobId,
    pub interval_number: u32,
    pub value: u64,
    pub state: InvoiceState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Employer supplied terms for a new posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewJob {
    pub rate: u64,
    pub duration: u32,
    pub invoice_interval: u32,
}

/// Partial update of a job's commercial terms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDetailsUpdate {
    #[serde(default)]
    pub rate: Option<u64>,
    #[serde(default)]
    pub duration: Option<u32>,
}

impl JobDetailsUpdate {
    pub fn is_empty(&self) -> bool {
        self.rate.is_none() && self.duration.is_none()
    }
}

/// Optional narrowing applied to job listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFilter {
    #[serde(default)]
    pub min_rate: Option<u64>,
    #[serde(default)]
    pub max_rate: Option<u64>,
    #[serde(default)]
    pub state: Option<JobState>,
}

impl JobFilter {
    pub fn matches(&self, job: &Job) -> bool {
        self.min_rate.map_or(true, |min| job.rate >= min)
            && self.max_rate.map_or(true, |max| job.rate <= max)
            && self.state.map_or(true, |state| job.state == state)
    }
}

/// Which population of jobs a listing draws from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobScope {
    /// Waiting jobs with no contractor assigned.
    Available,
    Employer(UserId),
    Contractor(UserId),
}

impl JobScope {
    pub fn contains(&self, job: &Job) -> bool {
        match self {
            JobScope::Available => job.is_open(),
            JobScope::Employer(user) => job.is_employer(user),
            JobScope::Contractor(user) => job.is_contractor(user),
        }
    }
}

/// Which population of applications a listing draws from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplicationScope {
    Job(JobId),
    Contractor(UserId),
}

impl ApplicationScope {
    pub fn contains(&self, application: &JobApplication) -> bool {
        match self {
            ApplicationScope::Job(job_id) => application.job_id == *job_id,
            ApplicationScope::Contractor(user) => application.contractor_id == *user,
        }
    }
}

pub const DEFAULT_PAGE_LIMIT: usize = 10;
pub const DEFAULT_MAX_PAGE_LIMIT: usize = 100;

/// Raw pagination input as supplied by a caller; values may be missing or negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

impl PageRequest {
    pub fn new(limit: i64, offset: i64) -> Self {
        Self {
            limit: Some(limit),
            offset: Some(offset),
        }
    }
}

/// Normalized pagination window handed to the stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: usize,
    pub offset: usize,
}

/// Defaults and ceiling used to normalize [`PageRequest`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    default_limit: usize,
    max_limit: usize,
}

impl PageLimits {
    pub fn new(default_limit: usize, max_limit: usize) -> Self {
        let default_limit = if default_limit == 0 {
            DEFAULT_PAGE_LIMIT
        } else {
            default_limit
        };

        Self {
            default_limit,
            max_limit: max_limit.max(default_limit),
        }
    }

    pub fn default_limit(&self) -> usize {
        self.default_limit
    }

    pub fn max_limit(&self) -> usize {
        self.max_limit
    }

    /// Missing, zero, or negative limits fall back to the default; negative offsets to zero.
    pub fn resolve(&self, request: PageRequest) -> Page {
        let limit = match request.limit {
            Some(limit) if limit > 0 => usize::try_from(limit)
                .unwrap_or(self.max_limit)
                .min(self.max_limit),
            _ => self.default_limit,
        };
        let offset = match request.offset {
            Some(offset) if offset > 0 => usize::try_from(offset).unwrap_or(0),
            _ => 0,
        };

        Page { limit, offset }
    }
}

impl Default for PageLimits {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_LIMIT, DEFAULT_MAX_PAGE_LIMIT)
    }
}
