//! Mutation operation model and persistence wrappers.
//!
//! Every successful mutation produces exactly one [`Op`], carrying the
//! fully materialized records it created or transitioned, so journal
//! replay reproduces the store byte-for-byte without re-running any
//! business checks. The audit-log entry rides inside the op: a check-in
//! and its log line are one atomic journal row.

use serde::{Deserialize, Serialize};

use crate::{
    record::{CheckinRecord, Clinic, OperationLogEntry, Patient},
    types::{ClinicId, OpSeq, TicketNumber},
};

/// Version number for serialized [`StoredOpEnvelope`] payloads.
pub const OP_FORMAT_VERSION: u16 = 1;

/// Immutable operation appended to the journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    /// Seed a clinic into an empty roster (startup only).
    SeedClinic {
        /// Seeded clinic state.
        clinic: Clinic,
    },
    /// Seed a sample patient (startup only).
    SeedPatient {
        /// Seeded patient.
        patient: Patient,
    },
    /// A patient checked in: new waiting record plus its audit entry.
    CheckIn {
        /// Materialized check-in record.
        record: CheckinRecord,
        /// Audit entry written with the check-in.
        log: OperationLogEntry,
    },
    /// A clinic advanced its now-serving counter.
    CallNext {
        /// Clinic whose counter advanced.
        clinic_id: ClinicId,
        /// The ticket number that became "now serving".
        ticket_number: TicketNumber,
        /// Call timestamp stamped onto the matching record, if any.
        called_at_ms: u64,
        /// Audit entry written with the call.
        log: OperationLogEntry,
    },
}

/// Journal row metadata plus operation payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredOp {
    /// Monotonic operation sequence.
    pub seq: OpSeq,
    /// Operation timestamp in milliseconds.
    pub ts_ms: u64,
    /// Operation body.
    pub op: Op,
}

/// Versioned wrapper for stable on-disk payload decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredOpEnvelope {
    /// Payload format version.
    pub format_version: u16,
    /// Wrapped operation.
    pub stored: StoredOp,
}

impl StoredOpEnvelope {
    /// Constructs an envelope using [`OP_FORMAT_VERSION`].
    pub fn new(stored: StoredOp) -> Self {
        Self {
            format_version: OP_FORMAT_VERSION,
            stored,
        }
    }
}
