//! HTTP/JSON API surface served to kiosks, displays, and the doctor console.

/// API error type and status mapping.
pub mod error;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::{
    record::{Clinic, OperationLogEntry, Patient, WaitingEntry},
    runtime::handle::QueueHandle,
    types::ClinicId,
};

use self::error::{ApiError, ApiResult};

const DEFAULT_LOG_LIMIT: usize = 50;

/// Builds the API router with `handle` as shared state.
pub fn create_router(handle: QueueHandle) -> Router {
    Router::new()
        .route("/api/clinics", get(list_clinics))
        .route("/api/patients/{id}", get(get_patient))
        .route("/api/checkin", post(check_in))
        .route("/api/call-next", post(call_next))
        .route("/api/logs", get(get_logs))
        .route("/api/checkins/{clinic_id}", get(list_checkins))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(handle)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckinBody {
    patient_id: Option<String>,
    clinic_id: Option<ClinicId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallNextBody {
    clinic_id: Option<ClinicId>,
}

#[derive(Debug, Deserialize)]
struct LogsParams {
    limit: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckinResponse {
    success: bool,
    ticket_number: u32,
    clinic: Clinic,
    patient: PatientSummary,
}

#[derive(Debug, Serialize)]
struct PatientSummary {
    id: String,
    name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CallNextResponse {
    success: bool,
    current: u32,
    waiting: u32,
    clinic: Clinic,
}

async fn list_clinics(State(handle): State<QueueHandle>) -> ApiResult<Json<Vec<Clinic>>> {
    let clinics = handle.clinics().await?;
    Ok(Json(clinics))
}

async fn get_patient(
    State(handle): State<QueueHandle>,
    Path(id): Path<String>,
) -> ApiResult<Json<Patient>> {
    let patient = handle
        .patient(&id)
        .await?
        .ok_or_else(|| ApiError::from(crate::core::store::StoreError::MissingPatient(id)))?;
    Ok(Json(patient))
}

async fn check_in(
    State(handle): State<QueueHandle>,
    Json(body): Json<CheckinBody>,
) -> ApiResult<Json<CheckinResponse>> {
    let patient_id = body
        .patient_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::invalid_input("Missing required fields"))?;
    let clinic_id = body
        .clinic_id
        .ok_or_else(|| ApiError::invalid_input("Missing required fields"))?;

    let receipt = handle.check_in(patient_id, clinic_id).await?;
    info!(
        clinic_id,
        ticket = receipt.ticket_number,
        "check-in accepted"
    );

    Ok(Json(CheckinResponse {
        success: true,
        ticket_number: receipt.ticket_number,
        clinic: receipt.clinic,
        patient: PatientSummary {
            id: receipt.patient.id,
            name: receipt.patient.name,
        },
    }))
}

async fn call_next(
    State(handle): State<QueueHandle>,
    Json(body): Json<CallNextBody>,
) -> ApiResult<Json<CallNextResponse>> {
    let clinic_id = body
        .clinic_id
        .ok_or_else(|| ApiError::invalid_input("Missing clinic ID"))?;

    let outcome = handle.call_next(clinic_id).await?;
    info!(clinic_id, current = outcome.current, "number called");

    Ok(Json(CallNextResponse {
        success: true,
        current: outcome.current,
        waiting: outcome.waiting,
        clinic: outcome.clinic,
    }))
}

async fn get_logs(
    State(handle): State<QueueHandle>,
    Query(params): Query<LogsParams>,
) -> ApiResult<Json<Vec<OperationLogEntry>>> {
    // Non-numeric or absent limit falls back to the default.
    let limit = params
        .limit
        .and_then(|raw| raw.parse::<usize>().ok())
        .unwrap_or(DEFAULT_LOG_LIMIT);
    let logs = handle.recent_logs(limit).await?;
    Ok(Json(logs))
}

async fn list_checkins(
    State(handle): State<QueueHandle>,
    Path(clinic_id): Path<ClinicId>,
) -> ApiResult<Json<Vec<WaitingEntry>>> {
    let entries = handle.waiting_list(clinic_id).await?;
    Ok(Json(entries))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "OK",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
