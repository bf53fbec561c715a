use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use crate::audit::AuditWriter;
use crate::notify::NotificationFanout;

use super::domain::{CitizenId, HouseholdId, NewCitizen};
use super::repository::RegistryRepository;
use super::service::{CreateHouseholdRequest, MembershipError, MembershipService, MoveRequest};
use super::split::SplitRequest;

pub fn registry_router<R, A, N>(service: Arc<MembershipService<R, A, N>>) -> Router
where
    R: RegistryRepository + 'static,
    A: AuditWriter + 'static,
    N: NotificationFanout + 'static,
{
    Router::new()
        .route(
            "/api/v1/registry/citizens",
            post(register_citizen_handler::<R, A, N>),
        )
        .route(
            "/api/v1/registry/citizens/:id/household",
            post(move_citizen_handler::<R, A, N>),
        )
        .route(
            "/api/v1/registry/households",
            post(create_household_handler::<R, A, N>),
        )
        .route(
            "/api/v1/registry/households/:id",
            get(household_handler::<R, A, N>).delete(delete_household_handler::<R, A, N>),
        )
        .route(
            "/api/v1/registry/households/:id/split",
            post(split_household_handler::<R, A, N>),
        )
        .with_state(service)
}

pub(crate) async fn register_citizen_handler<R, A, N>(
    State(service): State<Arc<MembershipService<R, A, N>>>,
    Json(payload): Json<NewCitizen>,
) -> Response
where
    R: RegistryRepository + 'static,
    A: AuditWriter + 'static,
    N: NotificationFanout + 'static,
{
    match service.register_citizen(payload) {
        Ok(citizen) => (StatusCode::CREATED, Json(citizen)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn create_household_handler<R, A, N>(
    State(service): State<Arc<MembershipService<R, A, N>>>,
    Json(payload): Json<CreateHouseholdRequest>,
) -> Response
where
    R: RegistryRepository + 'static,
    A: AuditWriter + 'static,
    N: NotificationFanout + 'static,
{
    match service.create_household(payload) {
        Ok(household) => (StatusCode::CREATED, Json(household)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn household_handler<R, A, N>(
    State(service): State<Arc<MembershipService<R, A, N>>>,
    Path(id): Path<String>,
) -> Response
where
    R: RegistryRepository + 'static,
    A: AuditWriter + 'static,
    N: NotificationFanout + 'static,
{
    match service.household_view(&HouseholdId(id)) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn delete_household_handler<R, A, N>(
    State(service): State<Arc<MembershipService<R, A, N>>>,
    Path(id): Path<String>,
) -> Response
where
    R: RegistryRepository + 'static,
    A: AuditWriter + 'static,
    N: NotificationFanout + 'static,
{
    match service.delete_household(&HouseholdId(id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn split_household_handler<R, A, N>(
    State(service): State<Arc<MembershipService<R, A, N>>>,
    Path(id): Path<String>,
    Json(payload): Json<SplitRequest>,
) -> Response
where
    R: RegistryRepository + 'static,
    A: AuditWriter + 'static,
    N: NotificationFanout + 'static,
{
    match service.split_household(&HouseholdId(id), payload) {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn move_citizen_handler<R, A, N>(
    State(service): State<Arc<MembershipService<R, A, N>>>,
    Path(id): Path<String>,
    Json(payload): Json<MoveRequest>,
) -> Response
where
    R: RegistryRepository + 'static,
    A: AuditWriter + 'static,
    N: NotificationFanout + 'static,
{
    match service.move_citizen(&CitizenId(id), payload) {
        Ok(citizen) => (StatusCode::OK, Json(citizen)).into_response(),
        Err(err) => error_response(err),
    }
}

fn error_response(error: MembershipError) -> Response {
    let status = error.kind().status_code();
    (status, Json(json!({ "error": error.to_string() }))).into_response()
}
