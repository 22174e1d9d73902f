//! Patient, clinic, check-in, and operation-log record types.
//!
//! All records serialize in camelCase so the HTTP layer can return them
//! directly with the wire field names (`ticketNumber`, `calledAtMs`, ...).

use serde::{Deserialize, Serialize};

use crate::types::{CheckinId, CheckinStatus, ClinicId, LogAction, LogId, TicketNumber};

/// Registered patient. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    /// Externally validated patient identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Contact phone number.
    pub phone: String,
    /// Creation timestamp in milliseconds since epoch.
    pub created_at_ms: u64,
}

/// Clinic queue state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clinic {
    /// Stable clinic identifier.
    pub id: ClinicId,
    /// Doctor or clinic display name.
    pub name: String,
    /// Department label shown on displays and matched by the sync client.
    pub dept: String,
    /// Last ticket number called ("now serving").
    pub current: TicketNumber,
    /// Count of patients with an active (uncalled) check-in.
    pub waiting: u32,
    /// Highest ticket number ever issued. Never decreases, never reused.
    pub last_ticket: TicketNumber,
}

/// Durable fact that a patient holds a ticket at a clinic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckinRecord {
    /// Monotonic record identifier.
    pub id: CheckinId,
    /// Patient holding the ticket.
    pub patient_id: String,
    /// Clinic the ticket belongs to.
    pub clinic_id: ClinicId,
    /// Issued ticket number.
    pub ticket_number: TicketNumber,
    /// Lifecycle status; transitions `Waiting -> Called` exactly once.
    pub status: CheckinStatus,
    /// Creation timestamp in milliseconds since epoch.
    pub created_at_ms: u64,
    /// Call timestamp, set when the record transitions to `Called`.
    pub called_at_ms: Option<u64>,
}

/// Append-only audit entry written alongside every successful mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationLogEntry {
    /// Monotonic entry identifier.
    pub id: LogId,
    /// What happened.
    pub action: LogAction,
    /// Clinic the operation targeted.
    pub clinic_id: ClinicId,
    /// Patient involved, when the operation has one.
    pub patient_id: Option<String>,
    /// Ticket number issued or called.
    pub ticket_number: TicketNumber,
    /// Human-readable summary.
    pub details: String,
    /// Entry timestamp in milliseconds since epoch.
    pub created_at_ms: u64,
}

/// Waiting-list row: a check-in record joined with the patient's name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitingEntry {
    /// The waiting check-in record, flattened into this row.
    #[serde(flatten)]
    pub record: CheckinRecord,
    /// Joined patient name, or `"Unknown"` when the patient is missing.
    pub patient_name: String,
}

/// Sentinel used when a waiting record's patient cannot be resolved.
pub const UNKNOWN_PATIENT: &str = "Unknown";
