//! Job, application, and invoice lifecycle engine.
//!
//! Services load entities from the stores, consult [`policy`] for state legality and caller
//! identity, then write back. Accepting an application is the one operation that spans several
//! entities and runs inside a store transaction.

pub mod applications;
pub mod billing;
pub mod domain;
pub mod error;
pub mod invoices;
pub mod jobs;
pub mod memory;
pub mod policy;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use applications::ApplicationWorkflowService;
pub use billing::IntervalQuote;
pub use domain::{
    ApplicationId, ApplicationScope, ApplicationState, Invoice, InvoiceId, InvoiceState, Job,
    JobApplication, JobDetailsUpdate, JobFilter, JobId, JobScope, JobState, NewJob, Page,
    PageLimits, PageRequest, UserId,
};
pub use error::{EntityKind, ErrorKind, MarketplaceError, StateViolation};
pub use invoices::InvoiceService;
pub use jobs::JobLifecycleService;
pub use memory::{InMemoryMarketplace, MemoryTransaction};
pub use repository::{
    ApplicationRepository, InvoiceRepository, JobRepository, MarketplaceStore, RepositoryError,
    StoreTransaction, TransactionalStore,
};
pub use router::{marketplace_router, ApiError, Caller, CALLER_HEADER};
pub use service::Marketplace;
