//! Runtime event stream payloads.

use crate::types::{ClinicId, OpSeq, TicketNumber};

/// Events emitted from the single-writer runtime loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
    /// A patient checked in and received a ticket.
    CheckedIn {
        /// Clinic the ticket was issued for.
        clinic_id: ClinicId,
        /// Issued ticket number.
        ticket_number: TicketNumber,
    },
    /// A clinic advanced its now-serving counter.
    NumberCalled {
        /// Clinic whose counter advanced.
        clinic_id: ClinicId,
        /// Ticket number now being served.
        ticket_number: TicketNumber,
    },
    /// Persistence has reached at least this op sequence.
    DurableUpTo {
        /// Highest sequence known durable.
        op_seq: OpSeq,
    },
}
