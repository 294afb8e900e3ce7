use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{
    ApplicationId, ApplicationState, Invoice, InvoiceId, InvoiceState, Job, JobApplication,
    JobDetailsUpdate, JobFilter, JobId, JobState, NewJob, PageRequest, UserId,
};
use super::error::{ErrorKind, MarketplaceError};
use super::repository::MarketplaceStore;
use super::service::Marketplace;

/// Header carrying the identity an upstream gateway has already authenticated.
pub const CALLER_HEADER: &str = "x-user-id";

/// Router builder exposing the job, application, and invoice lifecycle over HTTP.
pub fn marketplace_router<S>(marketplace: Arc<Marketplace<S>>) -> Router
where
    S: MarketplaceStore,
{
    Router::new()
        .route(
            "/api/v1/jobs",
            post(create_job::<S>).get(list_available_jobs::<S>),
        )
        .route(
            "/api/v1/jobs/:job_id",
            get(get_job::<S>)
                .patch(update_job_details::<S>)
                .delete(delete_job::<S>),
        )
        .route("/api/v1/jobs/:job_id/state", put(update_job_state::<S>))
        .route(
            "/api/v1/jobs/:job_id/applications",
            post(apply_to_job::<S>).get(list_job_applications::<S>),
        )
        .route(
            "/api/v1/jobs/:job_id/invoices",
            post(create_invoice::<S>).get(list_job_invoices::<S>),
        )
        .route("/api/v1/employer/jobs", get(list_employer_jobs::<S>))
        .route("/api/v1/contractor/jobs", get(list_contractor_jobs::<S>))
        .route(
            "/api/v1/contractor/applications",
            get(list_contractor_applications::<S>),
        )
        .route(
            "/api/v1/applications/:application_id",
            get(get_application::<S>),
        )
        .route(
            "/api/v1/applications/:application_id/accept",
            post(accept_application::<S>),
        )
        .route(
            "/api/v1/applications/:application_id/reject",
            post(reject_application::<S>),
        )
        .route(
            "/api/v1/applications/:application_id/withdraw",
            post(withdraw_application::<S>),
        )
        .route(
            "/api/v1/invoices/:invoice_id",
            get(get_invoice::<S>).delete(delete_invoice::<S>),
        )
        .route(
            "/api/v1/invoices/:invoice_id/state",
            put(update_invoice_state::<S>),
        )
        .with_state(marketplace)
}

/// HTTP status for each engine error kind.
pub fn status_for(error: &MarketplaceError) -> StatusCode {
    match error.kind() {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::InvalidState | ErrorKind::InvalidTransition | ErrorKind::Conflict => {
            StatusCode::CONFLICT
        }
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Error returned by marketplace handlers.
#[derive(Debug)]
pub enum ApiError {
    MissingCaller,
    Marketplace(MarketplaceError),
}

impl From<MarketplaceError> for ApiError {
    fn from(value: MarketplaceError) -> Self {
        Self::Marketplace(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::MissingCaller => {
                let payload = json!({
                    "error": format!("missing {CALLER_HEADER} header"),
                    "kind": "unauthenticated",
                });
                (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
            }
            ApiError::Marketplace(error) => {
                let payload = json!({
                    "error": error.to_string(),
                    "kind": error.kind(),
                });
                (status_for(&error), Json(payload)).into_response()
            }
        }
    }
}

/// Authenticated caller identity taken from [`CALLER_HEADER`].
#[derive(Debug, Clone)]
pub struct Caller(pub UserId);

#[async_trait]
impl<T> FromRequestParts<T> for Caller
where
    T: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &T) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(CALLER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| Caller(UserId(value.to_string())))
            .ok_or(ApiError::MissingCaller)
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct JobListQuery {
    min_rate: Option<u64>,
    max_rate: Option<u64>,
    state: Option<JobState>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl JobListQuery {
    fn split(self) -> (JobFilter, PageRequest) {
        let filter = JobFilter {
            min_rate: self.min_rate,
            max_rate: self.max_rate,
            state: self.state,
        };
        let page = PageRequest {
            limit: self.limit,
            offset: self.offset,
        };
        (filter, page)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct StateListQuery<T> {
    state: Option<T>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl<T> StateListQuery<T> {
    fn split(self) -> (Option<T>, PageRequest) {
        let page = PageRequest {
            limit: self.limit,
            offset: self.offset,
        };
        (self.state, page)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct JobStateChange {
    state: JobState,
}

#[derive(Debug, Deserialize)]
pub(crate) struct InvoiceStateChange {
    state: InvoiceState,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct InvoiceRequest {
    #[serde(default)]
    adjustment: Option<i64>,
}

type Market<S> = State<Arc<Marketplace<S>>>;

pub(crate) async fn create_job<S: MarketplaceStore>(
    State(market): Market<S>,
    Caller(caller): Caller,
    Json(terms): Json<NewJob>,
) -> Result<(StatusCode, Json<Job>), ApiError> {
    let job = market.jobs().create_job(&caller, terms)?;
    Ok((StatusCode::CREATED, Json(job)))
}

pub(crate) async fn list_available_jobs<S: MarketplaceStore>(
    State(market): Market<S>,
    Query(query): Query<JobListQuery>,
) -> Result<Json<Vec<Job>>, ApiError> {
    let (filter, page) = query.split();
    Ok(Json(market.jobs().list_available(filter, page)?))
}

pub(crate) async fn list_employer_jobs<S: MarketplaceStore>(
    State(market): Market<S>,
    Caller(caller): Caller,
    Query(query): Query<JobListQuery>,
) -> Result<Json<Vec<Job>>, ApiError> {
    let (filter, page) = query.split();
    Ok(Json(market.jobs().list_by_employer(&caller, filter, page)?))
}

pub(crate) async fn list_contractor_jobs<S: MarketplaceStore>(
    State(market): Market<S>,
    Caller(caller): Caller,
    Query(query): Query<JobListQuery>,
) -> Result<Json<Vec<Job>>, ApiError> {
    let (filter, page) = query.split();
    Ok(Json(market.jobs().list_by_contractor(&caller, filter, page)?))
}

pub(crate) async fn get_job<S: MarketplaceStore>(
    State(market): Market<S>,
    Path(job_id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    Ok(Json(market.jobs().get_job(&JobId(job_id))?))
}

pub(crate) async fn update_job_details<S: MarketplaceStore>(
    State(market): Market<S>,
    Caller(caller): Caller,
    Path(job_id): Path<String>,
    Json(update): Json<JobDetailsUpdate>,
) -> Result<Json<Job>, ApiError> {
    let job = market
        .jobs()
        .update_details(&JobId(job_id), &caller, update)?;
    Ok(Json(job))
}

pub(crate) async fn update_job_state<S: MarketplaceStore>(
    State(market): Market<S>,
    Caller(caller): Caller,
    Path(job_id): Path<String>,
    Json(change): Json<JobStateChange>,
) -> Result<Json<Job>, ApiError> {
    let job = market
        .jobs()
        .update_state(&JobId(job_id), &caller, change.state)?;
    Ok(Json(job))
}

pub(crate) async fn delete_job<S: MarketplaceStore>(
    State(market): Market<S>,
    Caller(caller): Caller,
    Path(job_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    market.jobs().delete_job(&JobId(job_id), &caller)?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn apply_to_job<S: MarketplaceStore>(
    State(market): Market<S>,
    Caller(caller): Caller,
    Path(job_id): Path<String>,
) -> Result<(StatusCode, Json<JobApplication>), ApiError> {
    let application = market.applications().apply(&JobId(job_id), &caller)?;
    Ok((StatusCode::CREATED, Json(application)))
}

pub(crate) async fn list_job_applications<S: MarketplaceStore>(
    State(market): Market<S>,
    Caller(caller): Caller,
    Path(job_id): Path<String>,
    Query(query): Query<StateListQuery<ApplicationState>>,
) -> Result<Json<Vec<JobApplication>>, ApiError> {
    let (state, page) = query.split();
    let applications = market
        .applications()
        .list_by_job(&JobId(job_id), &caller, state, page)?;
    Ok(Json(applications))
}

pub(crate) async fn list_contractor_applications<S: MarketplaceStore>(
    State(market): Market<S>,
    Caller(caller): Caller,
    Query(query): Query<StateListQuery<ApplicationState>>,
) -> Result<Json<Vec<JobApplication>>, ApiError> {
    let (state, page) = query.split();
    let applications = market
        .applications()
        .list_by_contractor(&caller, state, page)?;
    Ok(Json(applications))
}

pub(crate) async fn get_application<S: MarketplaceStore>(
    State(market): Market<S>,
    Caller(caller): Caller,
    Path(application_id): Path<String>,
) -> Result<Json<JobApplication>, ApiError> {
    let application = market
        .applications()
        .get_application(&ApplicationId(application_id), &caller)?;
    Ok(Json(application))
}

pub(crate) async fn accept_application<S: MarketplaceStore>(
    State(market): Market<S>,
    Caller(caller): Caller,
    Path(application_id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    let job = market
        .applications()
        .accept(&ApplicationId(application_id), &caller)?;
    Ok(Json(job))
}

pub(crate) async fn reject_application<S: MarketplaceStore>(
    State(market): Market<S>,
    Caller(caller): Caller,
    Path(application_id): Path<String>,
) -> Result<Json<JobApplication>, ApiError> {
    let application = market
        .applications()
        .reject(&ApplicationId(application_id), &caller)?;
    Ok(Json(application))
}

pub(crate) async fn withdraw_application<S: MarketplaceStore>(
    State(market): Market<S>,
    Caller(caller): Caller,
    Path(application_id): Path<String>,
) -> Result<Json<JobApplication>, ApiError> {
    let application = market
        .applications()
        .withdraw(&ApplicationId(application_id), &caller)?;
    Ok(Json(application))
}

pub(crate) async fn create_invoice<S: MarketplaceStore>(
    State(market): Market<S>,
    Caller(caller): Caller,
    Path(job_id): Path<String>,
    request: Option<Json<InvoiceRequest>>,
) -> Result<(StatusCode, Json<Invoice>), ApiError> {
    let adjustment = request.and_then(|Json(request)| request.adjustment);
    let invoice = market
        .invoices()
        .create_invoice(&JobId(job_id), &caller, adjustment)?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

pub(crate) async fn list_job_invoices<S: MarketplaceStore>(
    State(market): Market<S>,
    Caller(caller): Caller,
    Path(job_id): Path<String>,
    Query(query): Query<StateListQuery<InvoiceState>>,
) -> Result<Json<Vec<Invoice>>, ApiError> {
    let (state, page) = query.split();
    let invoices = market
        .invoices()
        .list_by_job(&JobId(job_id), &caller, state, page)?;
    Ok(Json(invoices))
}

pub(crate) async fn get_invoice<S: MarketplaceStore>(
    State(market): Market<S>,
    Caller(caller): Caller,
    Path(invoice_id): Path<String>,
) -> Result<Json<Invoice>, ApiError> {
    let invoice = market
        .invoices()
        .get_invoice(&InvoiceId(invoice_id), &caller)?;
    Ok(Json(invoice))
}

pub(crate) async fn update_invoice_state<S: MarketplaceStore>(
    State(market): Market<S>,
    Caller(caller): Caller,
    Path(invoice_id): Path<String>,
    Json(change): Json<InvoiceStateChange>,
) -> Result<Json<Invoice>, ApiError> {
    let invoice = market
        .invoices()
        .update_state(&InvoiceId(invoice_id), &caller, change.state)?;
    Ok(Json(invoice))
}

pub(crate) async fn delete_invoice<S: MarketplaceStore>(
    State(market): Market<S>,
    Caller(caller): Caller,
    Path(invoice_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    market
        .invoices()
        .delete_invoice(&InvoiceId(invoice_id), &caller)?;
    Ok(StatusCode::NO_CONTENT)
}
