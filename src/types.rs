//! Shared primitive IDs and queue-related enums.

use serde::{Deserialize, Serialize};

/// Clinic identifier.
pub type ClinicId = u32;
/// Per-clinic ticket number.
pub type TicketNumber = u32;
/// Monotonic check-in record identifier.
pub type CheckinId = u64;
/// Monotonic operation-log entry identifier.
pub type LogId = u64;
/// Monotonic operation sequence number.
pub type OpSeq = u64;

/// Maximum number of patients a clinic may have waiting at once.
pub const CAPACITY_LIMIT: u32 = 10;

/// Lifecycle of a check-in record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckinStatus {
    /// Ticket issued, patient not yet called.
    Waiting,
    /// Ticket called by the doctor console.
    Called,
}

/// Kind of state-changing operation recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogAction {
    /// A patient checked in and received a ticket.
    Checkin,
    /// A clinic advanced its now-serving counter.
    CallNext,
}
