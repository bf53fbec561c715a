use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::audit::AuditWriter;
use crate::notify::NotificationFanout;
use crate::registry::domain::UserId;
use crate::registry::repository::RegistryRepository;
use crate::store::PageRequest;

use super::domain::{
    DistributionDraft, DistributionId, EventId, EventStatus, NewRewardEvent, RewardRule,
};
use super::eligibility::{EligibilityResolver, EligibilitySummary};
use super::generator::{RewardGenerator, TierRewardTable};
use super::ledger::{DistributionLedger, EventLedgerSummary, RegistrationRequest, RewardsError};
use super::repository::RewardRepository;

/// Shared state for the rewards routes: the three collaborating services
/// built over one registry and one reward store.
pub struct RewardsState<R, W, A, N> {
    pub ledger: Arc<DistributionLedger<R, W, A, N>>,
    pub generator: Arc<RewardGenerator<R, W, A>>,
    pub resolver: Arc<EligibilityResolver<R, W>>,
}

impl<R, W, A, N> Clone for RewardsState<R, W, A, N> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
            generator: Arc::clone(&self.generator),
            resolver: Arc::clone(&self.resolver),
        }
    }
}

impl<R, W, A, N> RewardsState<R, W, A, N>
where
    R: RegistryRepository + 'static,
    W: RewardRepository + 'static,
    A: AuditWriter + 'static,
    N: NotificationFanout + 'static,
{
    pub fn new(registry: Arc<R>, rewards: Arc<W>, audit: Arc<A>, fanout: Arc<N>) -> Self {
        Self {
            ledger: Arc::new(DistributionLedger::new(
                Arc::clone(&registry),
                Arc::clone(&rewards),
                Arc::clone(&audit),
                fanout,
            )),
            generator: Arc::new(RewardGenerator::new(
                Arc::clone(&registry),
                Arc::clone(&rewards),
                audit,
            )),
            resolver: Arc::new(EligibilityResolver::new(registry, rewards)),
        }
    }
}

pub fn rewards_router<R, W, A, N>(state: RewardsState<R, W, A, N>) -> Router
where
    R: RegistryRepository + 'static,
    W: RewardRepository + 'static,
    A: AuditWriter + 'static,
    N: NotificationFanout + 'static,
{
    Router::new()
        .route("/api/v1/rewards/events", post(create_event_handler::<R, W, A, N>))
        .route(
            "/api/v1/rewards/events/:id/status",
            post(transition_event_handler::<R, W, A, N>),
        )
        .route(
            "/api/v1/rewards/events/:id/eligible",
            get(eligible_handler::<R, W, A, N>),
        )
        .route(
            "/api/v1/rewards/events/:id/summary",
            get(event_summary_handler::<R, W, A, N>),
        )
        .route(
            "/api/v1/rewards/events/:id/households",
            get(household_breakdown_handler::<R, W, A, N>),
        )
        .route(
            "/api/v1/rewards/distributions",
            post(register_handler::<R, W, A, N>),
        )
        .route(
            "/api/v1/rewards/distributions/bulk",
            post(bulk_create_handler::<R, W, A, N>),
        )
        .route(
            "/api/v1/rewards/distributions/distribute",
            post(distribute_handler::<R, W, A, N>),
        )
        .route(
            "/api/v1/rewards/distributions/:id/cancel",
            post(cancel_handler::<R, W, A, N>),
        )
        .route(
            "/api/v1/rewards/events/:id/generate/achievements",
            post(generate_achievements_handler::<R, W, A, N>),
        )
        .route(
            "/api/v1/rewards/events/:id/generate/age-range",
            post(generate_age_range_handler::<R, W, A, N>),
        )
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub status: EventStatus,
    #[serde(default)]
    pub actor: Option<UserId>,
}

/// Paging plus an optional reference-date override for eligibility reads.
#[derive(Debug, Default, Deserialize)]
pub struct EligibleQuery {
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub per_page: Option<usize>,
    #[serde(default)]
    pub on: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct DistributeRequest {
    pub ids: Vec<DistributionId>,
    #[serde(default)]
    pub actor: Option<UserId>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub actor: Option<UserId>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateAchievementsRequest {
    pub school_year: String,
    pub table: TierRewardTable,
    #[serde(default)]
    pub overwrite: bool,
}

#[derive(Debug, Deserialize)]
pub struct GenerateAgeRangeRequest {
    pub min_age: u32,
    pub max_age: u32,
    pub reward: RewardRule,
    #[serde(default)]
    pub overwrite: bool,
    #[serde(default)]
    pub on: Option<NaiveDate>,
}

/// Eligibility and ledger figures side by side, as the officers read them.
#[derive(Debug, Serialize)]
pub struct EventSummaryResponse {
    pub eligibility: EligibilitySummary,
    pub ledger: EventLedgerSummary,
}

pub(crate) async fn create_event_handler<R, W, A, N>(
    State(state): State<RewardsState<R, W, A, N>>,
    Json(payload): Json<NewRewardEvent>,
) -> Response
where
    R: RegistryRepository + 'static,
    W: RewardRepository + 'static,
    A: AuditWriter + 'static,
    N: NotificationFanout + 'static,
{
    match state.ledger.create_event(payload) {
        Ok(event) => (StatusCode::CREATED, Json(event)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn transition_event_handler<R, W, A, N>(
    State(state): State<RewardsState<R, W, A, N>>,
    Path(id): Path<String>,
    Json(payload): Json<TransitionRequest>,
) -> Response
where
    R: RegistryRepository + 'static,
    W: RewardRepository + 'static,
    A: AuditWriter + 'static,
    N: NotificationFanout + 'static,
{
    match state
        .ledger
        .transition_event(&EventId(id), payload.status, payload.actor.as_ref())
    {
        Ok(event) => (StatusCode::OK, Json(event)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn eligible_handler<R, W, A, N>(
    State(state): State<RewardsState<R, W, A, N>>,
    Path(id): Path<String>,
    Query(query): Query<EligibleQuery>,
) -> Response
where
    R: RegistryRepository + 'static,
    W: RewardRepository + 'static,
    A: AuditWriter + 'static,
    N: NotificationFanout + 'static,
{
    let today = query.on.unwrap_or_else(|| Utc::now().date_naive());
    let mut request = PageRequest::default();
    if let Some(page) = query.page {
        request.page = page;
    }
    if let Some(per_page) = query.per_page {
        request.per_page = per_page;
    }
    match state.resolver.list(&EventId(id), today, request) {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn event_summary_handler<R, W, A, N>(
    State(state): State<RewardsState<R, W, A, N>>,
    Path(id): Path<String>,
    Query(query): Query<EligibleQuery>,
) -> Response
where
    R: RegistryRepository + 'static,
    W: RewardRepository + 'static,
    A: AuditWriter + 'static,
    N: NotificationFanout + 'static,
{
    let id = EventId(id);
    let today = query.on.unwrap_or_else(|| Utc::now().date_naive());
    let eligibility = match state.resolver.summary(&id, today) {
        Ok(summary) => summary,
        Err(err) => return error_response(err),
    };
    match state.ledger.summarize_event(&id) {
        Ok(ledger) => (
            StatusCode::OK,
            Json(EventSummaryResponse { eligibility, ledger }),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn household_breakdown_handler<R, W, A, N>(
    State(state): State<RewardsState<R, W, A, N>>,
    Path(id): Path<String>,
) -> Response
where
    R: RegistryRepository + 'static,
    W: RewardRepository + 'static,
    A: AuditWriter + 'static,
    N: NotificationFanout + 'static,
{
    match state.ledger.household_breakdown(&EventId(id)) {
        Ok(entries) => (StatusCode::OK, Json(entries)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn register_handler<R, W, A, N>(
    State(state): State<RewardsState<R, W, A, N>>,
    Json(payload): Json<RegistrationRequest>,
) -> Response
where
    R: RegistryRepository + 'static,
    W: RewardRepository + 'static,
    A: AuditWriter + 'static,
    N: NotificationFanout + 'static,
{
    match state.ledger.register(payload, Utc::now().date_naive()) {
        Ok(row) => (StatusCode::CREATED, Json(row)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn bulk_create_handler<R, W, A, N>(
    State(state): State<RewardsState<R, W, A, N>>,
    Json(payload): Json<Vec<DistributionDraft>>,
) -> Response
where
    R: RegistryRepository + 'static,
    W: RewardRepository + 'static,
    A: AuditWriter + 'static,
    N: NotificationFanout + 'static,
{
    match state.ledger.bulk_create(payload) {
        Ok(created) => (StatusCode::CREATED, Json(json!({ "created": created }))).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn distribute_handler<R, W, A, N>(
    State(state): State<RewardsState<R, W, A, N>>,
    Json(payload): Json<DistributeRequest>,
) -> Response
where
    R: RegistryRepository + 'static,
    W: RewardRepository + 'static,
    A: AuditWriter + 'static,
    N: NotificationFanout + 'static,
{
    match state.ledger.distribute(
        &payload.ids,
        payload.actor.as_ref(),
        payload.note.as_deref(),
    ) {
        Ok(count) => (StatusCode::OK, Json(json!({ "distributed": count }))).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn cancel_handler<R, W, A, N>(
    State(state): State<RewardsState<R, W, A, N>>,
    Path(id): Path<String>,
    Json(payload): Json<CancelRequest>,
) -> Response
where
    R: RegistryRepository + 'static,
    W: RewardRepository + 'static,
    A: AuditWriter + 'static,
    N: NotificationFanout + 'static,
{
    match state
        .ledger
        .cancel(&DistributionId(id), payload.actor.as_ref(), payload.reason)
    {
        Ok(row) => (StatusCode::OK, Json(row)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn generate_achievements_handler<R, W, A, N>(
    State(state): State<RewardsState<R, W, A, N>>,
    Path(id): Path<String>,
    Json(payload): Json<GenerateAchievementsRequest>,
) -> Response
where
    R: RegistryRepository + 'static,
    W: RewardRepository + 'static,
    A: AuditWriter + 'static,
    N: NotificationFanout + 'static,
{
    match state.generator.from_achievements(
        &EventId(id),
        &payload.school_year,
        &payload.table,
        payload.overwrite,
    ) {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn generate_age_range_handler<R, W, A, N>(
    State(state): State<RewardsState<R, W, A, N>>,
    Path(id): Path<String>,
    Json(payload): Json<GenerateAgeRangeRequest>,
) -> Response
where
    R: RegistryRepository + 'static,
    W: RewardRepository + 'static,
    A: AuditWriter + 'static,
    N: NotificationFanout + 'static,
{
    let today = payload.on.unwrap_or_else(|| Utc::now().date_naive());
    match state.generator.from_age_range(
        &EventId(id),
        payload.min_age,
        payload.max_age,
        payload.reward,
        payload.overwrite,
        today,
    ) {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(err) => error_response(err),
    }
}

fn error_response(error: RewardsError) -> Response {
    let status = error.kind().status_code();
    (status, Json(json!({ "error": error.to_string() }))).into_response()
}
