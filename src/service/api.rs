//! Front-door HTTP routes
//!
//! Kiosks and staff terminals reach the queue manager through these routes,
//! served by the same axum server as the health endpoints. Tickets are
//! addressed by their printed label (`A-042`).

use crate::error::QueueError;
use crate::metrics::health::{not_initialized, HealthServerState};
use crate::queue::QueueManager;
use crate::types::{CheckInRequest, QueueEntry, ServiceRequest, TicketNumber};
use crate::utils::current_timestamp;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error};

#[derive(Debug, Deserialize)]
pub struct ServicesUpdate {
    pub requested_services: Vec<ServiceRequest>,
}

#[derive(Debug, Deserialize)]
pub struct ContactUpdate {
    pub name: String,
    pub phone: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResolveRequest {
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub counter: String,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub feedback: String,
}

/// Routes for check-in, visitor updates and staff actions
pub fn routes() -> Router<HealthServerState> {
    Router::new()
        .route("/tickets", post(check_in_handler))
        .route("/tickets/{label}", get(ticket_handler))
        .route("/tickets/{label}/services", put(services_handler))
        .route("/tickets/{label}/contact", put(contact_handler))
        .route("/tickets/{label}/resolve", post(resolve_handler))
        .route("/tickets/{label}/transfer", post(transfer_handler))
        .route("/tickets/{label}/feedback", post(feedback_handler))
        .route("/estimate", get(estimate_handler))
}

type ApiResponse = (StatusCode, Json<Value>);

fn manager(state: &HealthServerState) -> Option<Arc<QueueManager>> {
    state
        .probe
        .as_ref()
        .map(|probe| probe.queue_manager.clone())
}

/// Map a manager failure onto an HTTP status
fn error_response(err: anyhow::Error) -> ApiResponse {
    let (status, kind) = match err.downcast_ref::<QueueError>() {
        Some(queue_err) => {
            let status = match queue_err {
                QueueError::UnknownTicket { .. } | QueueError::UnknownCounter { .. } => {
                    StatusCode::NOT_FOUND
                }
                QueueError::InvalidServiceRequest { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                QueueError::InvalidTransition { .. }
                | QueueError::CounterUnavailable { .. }
                | QueueError::WriteConflict { .. } => StatusCode::CONFLICT,
                QueueError::QueueFull { .. } => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, queue_err.kind())
        }
        None => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!("Request failed: {}", err);
    } else {
        debug!("Request rejected ({}): {}", kind, err);
    }

    (status, Json(json!({ "error": kind, "message": err.to_string() })))
}

fn parse_label(label: &str) -> Result<TicketNumber, anyhow::Error> {
    label.trim().parse().map_err(|_| {
        QueueError::UnknownTicket {
            ticket: label.to_string(),
        }
        .into()
    })
}

fn entry_response(status: StatusCode, result: anyhow::Result<QueueEntry>) -> ApiResponse {
    match result {
        Ok(entry) => (status, Json(json!(entry))),
        Err(e) => error_response(e),
    }
}

async fn check_in_handler(
    State(state): State<HealthServerState>,
    Json(request): Json<CheckInRequest>,
) -> impl IntoResponse {
    let Some(manager) = manager(&state) else {
        return not_initialized();
    };

    let entry = match manager.check_in(request).await {
        Ok(entry) => entry,
        Err(e) => return error_response(e),
    };
    let position = manager
        .queue_position(entry.ticket_number)
        .await
        .ok()
        .flatten();

    (
        StatusCode::CREATED,
        Json(json!({ "entry": entry, "position": position })),
    )
}

async fn ticket_handler(
    State(state): State<HealthServerState>,
    Path(label): Path<String>,
) -> impl IntoResponse {
    let Some(manager) = manager(&state) else {
        return not_initialized();
    };

    let entry = match manager.find_ticket_label(&label).await {
        Ok(entry) => entry,
        Err(e) => return error_response(e),
    };
    let position = manager
        .queue_position(entry.ticket_number)
        .await
        .ok()
        .flatten();

    (
        StatusCode::OK,
        Json(json!({ "entry": entry, "position": position })),
    )
}

async fn services_handler(
    State(state): State<HealthServerState>,
    Path(label): Path<String>,
    Json(update): Json<ServicesUpdate>,
) -> impl IntoResponse {
    let Some(manager) = manager(&state) else {
        return not_initialized();
    };
    let ticket = match parse_label(&label) {
        Ok(ticket) => ticket,
        Err(e) => return error_response(e),
    };

    entry_response(
        StatusCode::OK,
        manager
            .update_services(ticket, update.requested_services)
            .await,
    )
}

async fn contact_handler(
    State(state): State<HealthServerState>,
    Path(label): Path<String>,
    Json(update): Json<ContactUpdate>,
) -> impl IntoResponse {
    let Some(manager) = manager(&state) else {
        return not_initialized();
    };
    let ticket = match parse_label(&label) {
        Ok(ticket) => ticket,
        Err(e) => return error_response(e),
    };

    entry_response(
        StatusCode::OK,
        manager
            .update_contact(ticket, &update.name, &update.phone)
            .await,
    )
}

async fn resolve_handler(
    State(state): State<HealthServerState>,
    Path(label): Path<String>,
    Json(request): Json<ResolveRequest>,
) -> impl IntoResponse {
    let Some(manager) = manager(&state) else {
        return not_initialized();
    };
    let ticket = match parse_label(&label) {
        Ok(ticket) => ticket,
        Err(e) => return error_response(e),
    };

    entry_response(
        StatusCode::OK,
        manager
            .resolve(ticket, request.notes, current_timestamp())
            .await,
    )
}

async fn transfer_handler(
    State(state): State<HealthServerState>,
    Path(label): Path<String>,
    Json(request): Json<TransferRequest>,
) -> impl IntoResponse {
    let Some(manager) = manager(&state) else {
        return not_initialized();
    };
    let ticket = match parse_label(&label) {
        Ok(ticket) => ticket,
        Err(e) => return error_response(e),
    };

    entry_response(
        StatusCode::OK,
        manager
            .transfer(ticket, &request.counter, current_timestamp())
            .await,
    )
}

async fn feedback_handler(
    State(state): State<HealthServerState>,
    Path(label): Path<String>,
    Json(request): Json<FeedbackRequest>,
) -> impl IntoResponse {
    let Some(manager) = manager(&state) else {
        return not_initialized();
    };
    let ticket = match parse_label(&label) {
        Ok(ticket) => ticket,
        Err(e) => return error_response(e),
    };

    entry_response(
        StatusCode::OK,
        manager.add_feedback(ticket, &request.feedback).await,
    )
}

/// Wait estimate for a visitor checking in now
async fn estimate_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    let Some(manager) = manager(&state) else {
        return not_initialized();
    };

    match manager.estimate_wait(Utc::now()).await {
        Ok(estimate) => (StatusCode::OK, Json(json!(estimate))),
        Err(e) => error_response(e),
    }
}
