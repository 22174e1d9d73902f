use std::time::{SystemTime, UNIX_EPOCH};

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::{
    core::indices::WaitingIndex,
    op::{Op, StoredOp},
    record::{CheckinRecord, Clinic, OperationLogEntry, Patient, UNKNOWN_PATIENT, WaitingEntry},
    types::{
        CAPACITY_LIMIT, CheckinId, CheckinStatus, ClinicId, LogAction, LogId, OpSeq, TicketNumber,
    },
};

/// Business-rule and lookup failures raised by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No patient registered under the given identifier.
    MissingPatient(String),
    /// No clinic with the given identifier.
    MissingClinic(ClinicId),
    /// The patient already holds an uncalled ticket at this clinic.
    DuplicateCheckin {
        /// Patient holding the outstanding ticket.
        patient_id: String,
        /// Clinic the ticket belongs to.
        clinic_id: ClinicId,
    },
    /// The clinic's waiting count has reached [`CAPACITY_LIMIT`].
    ClinicFull(ClinicId),
    /// A clinic with this id is already seeded.
    ClinicExists(ClinicId),
    /// A patient with this id is already seeded.
    PatientExists(String),
    /// A check-in record with this id already exists (replay conflict).
    CheckinExists(CheckinId),
}

/// Serialized whole-store state: the four record collections plus counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshotV1 {
    /// Next check-in record id to allocate.
    pub next_checkin_id: CheckinId,
    /// Next operation-log entry id to allocate.
    pub next_log_id: LogId,
    /// Next op sequence to allocate.
    pub next_op_seq: OpSeq,
    /// Patients in insertion order.
    pub patients: Vec<Patient>,
    /// Clinics in insertion order.
    pub clinics: Vec<Clinic>,
    /// Check-in records in insertion order.
    pub checkins: Vec<CheckinRecord>,
    /// Operation log in append order.
    pub logs: Vec<OperationLogEntry>,
}

/// Successful check-in result: the issued ticket plus fresh snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckinReceipt {
    /// Newly issued ticket number (the clinic's new `last_ticket`).
    pub ticket_number: TicketNumber,
    /// Clinic state after the check-in.
    pub clinic: Clinic,
    /// The checked-in patient.
    pub patient: Patient,
}

/// Successful call result: the advanced counter plus a fresh clinic snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOutcome {
    /// The ticket number now being served.
    pub current: TicketNumber,
    /// Waiting count after the call (clamped at zero).
    pub waiting: u32,
    /// Clinic state after the call.
    pub clinic: Clinic,
}

/// Authoritative in-memory queue state.
///
/// Owns the four record collections, enforces the admission and call
/// invariants, and emits one [`StoredOp`] per successful mutation into a
/// pending buffer for the persistence layer to drain.
#[derive(Debug, Default)]
pub struct QueueStore {
    patients: HashMap<String, Patient>,
    patient_order: Vec<String>,
    clinics: HashMap<ClinicId, Clinic>,
    clinic_order: Vec<ClinicId>,
    checkins: HashMap<CheckinId, CheckinRecord>,
    checkin_order: Vec<CheckinId>,
    // Active waiting record per (patient, clinic) pair: the duplicate guard.
    active: HashMap<(String, ClinicId), CheckinId>,
    waiting_by_clinic: WaitingIndex,
    logs: Vec<OperationLogEntry>,
    pending_ops: Vec<StoredOp>,
    next_checkin_id: CheckinId,
    next_log_id: LogId,
    next_op_seq: OpSeq,
}

impl QueueStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            next_checkin_id: 1,
            next_log_id: 1,
            next_op_seq: 1,
            ..Self::default()
        }
    }

    /// Rebuilds a store, including all secondary indexes, from a snapshot.
    pub fn from_snapshot(snapshot: StoreSnapshotV1) -> Result<Self, StoreError> {
        let mut store = Self {
            next_checkin_id: snapshot.next_checkin_id,
            next_log_id: snapshot.next_log_id,
            next_op_seq: snapshot.next_op_seq,
            logs: snapshot.logs,
            ..Self::default()
        };

        for patient in snapshot.patients {
            store.patient_order.push(patient.id.clone());
            store.patients.insert(patient.id.clone(), patient);
        }

        for clinic in snapshot.clinics {
            store.clinic_order.push(clinic.id);
            store.clinics.insert(clinic.id, clinic);
        }

        for rec in snapshot.checkins {
            store.index_checkin(&rec);
            store.checkin_order.push(rec.id);
            store.checkins.insert(rec.id, rec);
        }

        Ok(store)
    }

    /// Exports the full store state in insertion order.
    pub fn export_snapshot(&self) -> StoreSnapshotV1 {
        StoreSnapshotV1 {
            next_checkin_id: self.next_checkin_id,
            next_log_id: self.next_log_id,
            next_op_seq: self.next_op_seq,
            patients: self
                .patient_order
                .iter()
                .filter_map(|id| self.patients.get(id).cloned())
                .collect(),
            clinics: self
                .clinic_order
                .iter()
                .filter_map(|id| self.clinics.get(id).cloned())
                .collect(),
            checkins: self
                .checkin_order
                .iter()
                .filter_map(|id| self.checkins.get(id).cloned())
                .collect(),
            logs: self.logs.clone(),
        }
    }

    /// Adds a clinic to the roster. Used by startup seeding only.
    pub fn add_clinic(&mut self, clinic: Clinic) -> Result<StoredOp, StoreError> {
        if self.clinics.contains_key(&clinic.id) {
            return Err(StoreError::ClinicExists(clinic.id));
        }
        let seq = self.take_next_op_seq();
        self.apply_seed_clinic_with_seq(clinic.clone(), seq)?;
        let stored = StoredOp {
            seq,
            ts_ms: now_ms(),
            op: Op::SeedClinic { clinic },
        };
        self.pending_ops.push(stored.clone());
        Ok(stored)
    }

    /// Adds a patient. Used by startup seeding only.
    pub fn add_patient(&mut self, patient: Patient) -> Result<StoredOp, StoreError> {
        if self.patients.contains_key(&patient.id) {
            return Err(StoreError::PatientExists(patient.id));
        }
        let seq = self.take_next_op_seq();
        self.apply_seed_patient_with_seq(patient.clone(), seq)?;
        let stored = StoredOp {
            seq,
            ts_ms: now_ms(),
            op: Op::SeedPatient { patient },
        };
        self.pending_ops.push(stored.clone());
        Ok(stored)
    }

    /// Checks a patient into a clinic queue and issues the next ticket.
    ///
    /// Checks run in order and the first failure wins: patient exists,
    /// clinic exists, no outstanding ticket for the pair, clinic below
    /// capacity. On success the new record, the clinic counter updates,
    /// and the audit entry are committed as a single [`Op::CheckIn`].
    pub fn check_in(
        &mut self,
        patient_id: &str,
        clinic_id: ClinicId,
    ) -> Result<(CheckinReceipt, StoredOp), StoreError> {
        let patient = self
            .patients
            .get(patient_id)
            .cloned()
            .ok_or_else(|| StoreError::MissingPatient(patient_id.to_string()))?;
        let clinic = self
            .clinics
            .get(&clinic_id)
            .ok_or(StoreError::MissingClinic(clinic_id))?;

        if self
            .active
            .contains_key(&(patient_id.to_string(), clinic_id))
        {
            return Err(StoreError::DuplicateCheckin {
                patient_id: patient_id.to_string(),
                clinic_id,
            });
        }
        if clinic.waiting >= CAPACITY_LIMIT {
            return Err(StoreError::ClinicFull(clinic_id));
        }

        let now = now_ms();
        let ticket_number = clinic.last_ticket + 1;
        let record = CheckinRecord {
            id: self.next_checkin_id,
            patient_id: patient_id.to_string(),
            clinic_id,
            ticket_number,
            status: CheckinStatus::Waiting,
            created_at_ms: now,
            called_at_ms: None,
        };
        let log = OperationLogEntry {
            id: self.next_log_id,
            action: LogAction::Checkin,
            clinic_id,
            patient_id: Some(patient_id.to_string()),
            ticket_number,
            details: format!("Patient {} checked in to {}", patient.name, clinic.dept),
            created_at_ms: now,
        };

        let seq = self.take_next_op_seq();
        self.apply_check_in_with_seq(record.clone(), log.clone(), seq)?;

        let stored = StoredOp {
            seq,
            ts_ms: now,
            op: Op::CheckIn { record, log },
        };
        self.pending_ops.push(stored.clone());

        let clinic = self.clinics[&clinic_id].clone();
        Ok((
            CheckinReceipt {
                ticket_number,
                clinic,
                patient,
            },
            stored,
        ))
    }

    /// Advances a clinic's now-serving counter by one.
    ///
    /// The counter advances even when nobody is waiting: `waiting` clamps
    /// at zero and a missing matching record is tolerated (reference
    /// behavior, kept deliberately).
    pub fn call_next(
        &mut self,
        clinic_id: ClinicId,
    ) -> Result<(CallOutcome, StoredOp), StoreError> {
        let clinic = self
            .clinics
            .get(&clinic_id)
            .ok_or(StoreError::MissingClinic(clinic_id))?;

        let now = now_ms();
        let ticket_number = clinic.current + 1;
        let log = OperationLogEntry {
            id: self.next_log_id,
            action: LogAction::CallNext,
            clinic_id,
            patient_id: None,
            ticket_number,
            details: format!("Called number {ticket_number} in {}", clinic.dept),
            created_at_ms: now,
        };

        let seq = self.take_next_op_seq();
        self.apply_call_next_with_seq(clinic_id, ticket_number, now, log.clone(), seq)?;

        let stored = StoredOp {
            seq,
            ts_ms: now,
            op: Op::CallNext {
                clinic_id,
                ticket_number,
                called_at_ms: now,
                log,
            },
        };
        self.pending_ops.push(stored.clone());

        let clinic = self.clinics[&clinic_id].clone();
        Ok((
            CallOutcome {
                current: clinic.current,
                waiting: clinic.waiting,
                clinic,
            },
            stored,
        ))
    }

    /// Applies a journaled op during replay, bypassing business checks.
    pub fn apply_replayed_op(&mut self, stored: StoredOp) -> Result<(), StoreError> {
        let seq = stored.seq;
        match stored.op {
            Op::SeedClinic { clinic } => self.apply_seed_clinic_with_seq(clinic, seq),
            Op::SeedPatient { patient } => self.apply_seed_patient_with_seq(patient, seq),
            Op::CheckIn { record, log } => self.apply_check_in_with_seq(record, log, seq),
            Op::CallNext {
                clinic_id,
                ticket_number,
                called_at_ms,
                log,
            } => self.apply_call_next_with_seq(clinic_id, ticket_number, called_at_ms, log, seq),
        }
    }

    /// All clinics in insertion order.
    pub fn clinics_cloned(&self) -> Vec<Clinic> {
        self.clinic_order
            .iter()
            .filter_map(|id| self.clinics.get(id).cloned())
            .collect()
    }

    /// Looks up a clinic by id.
    pub fn clinic(&self, id: ClinicId) -> Option<&Clinic> {
        self.clinics.get(&id)
    }

    /// Looks up a patient by id.
    pub fn patient(&self, id: &str) -> Option<&Patient> {
        self.patients.get(id)
    }

    /// Looks up a patient by id, cloned.
    pub fn patient_cloned(&self, id: &str) -> Option<Patient> {
        self.patient(id).cloned()
    }

    /// Looks up a check-in record by id.
    pub fn checkin(&self, id: CheckinId) -> Option<&CheckinRecord> {
        self.checkins.get(&id)
    }

    /// Waiting-status records for a clinic joined with patient names,
    /// ascending by ticket number.
    pub fn waiting_list(&self, clinic_id: ClinicId) -> Vec<WaitingEntry> {
        let mut out: Vec<WaitingEntry> = self
            .waiting_by_clinic
            .get(&clinic_id)
            .into_iter()
            .flat_map(|ids| ids.iter())
            .filter_map(|id| self.checkins.get(id))
            .map(|rec| WaitingEntry {
                record: rec.clone(),
                patient_name: self
                    .patients
                    .get(&rec.patient_id)
                    .map(|p| p.name.clone())
                    .unwrap_or_else(|| UNKNOWN_PATIENT.to_string()),
            })
            .collect();
        out.sort_by_key(|entry| entry.record.ticket_number);
        out
    }

    /// At most `limit` most recent audit entries, newest first.
    pub fn recent_logs(&self, limit: usize) -> Vec<OperationLogEntry> {
        self.logs.iter().rev().take(limit).cloned().collect()
    }

    /// Total number of audit entries ever written.
    pub fn log_count(&self) -> usize {
        self.logs.len()
    }

    /// Number of registered patients.
    pub fn patient_count(&self) -> usize {
        self.patients.len()
    }

    /// Number of clinics in the roster.
    pub fn clinic_count(&self) -> usize {
        self.clinics.len()
    }

    /// Takes all ops accumulated since the last drain.
    pub fn drain_pending_ops(&mut self) -> Vec<StoredOp> {
        std::mem::take(&mut self.pending_ops)
    }

    /// Highest op sequence applied so far.
    pub fn latest_op_seq(&self) -> OpSeq {
        self.next_op_seq.saturating_sub(1)
    }

    fn apply_seed_clinic_with_seq(&mut self, clinic: Clinic, seq: OpSeq) -> Result<(), StoreError> {
        if self.clinics.contains_key(&clinic.id) {
            return Err(StoreError::ClinicExists(clinic.id));
        }
        self.clinic_order.push(clinic.id);
        self.clinics.insert(clinic.id, clinic);
        self.bump_next_seq_from(seq);
        Ok(())
    }

    fn apply_seed_patient_with_seq(
        &mut self,
        patient: Patient,
        seq: OpSeq,
    ) -> Result<(), StoreError> {
        if self.patients.contains_key(&patient.id) {
            return Err(StoreError::PatientExists(patient.id));
        }
        self.patient_order.push(patient.id.clone());
        self.patients.insert(patient.id.clone(), patient);
        self.bump_next_seq_from(seq);
        Ok(())
    }

    fn apply_check_in_with_seq(
        &mut self,
        record: CheckinRecord,
        log: OperationLogEntry,
        seq: OpSeq,
    ) -> Result<(), StoreError> {
        if self.checkins.contains_key(&record.id) {
            return Err(StoreError::CheckinExists(record.id));
        }
        let clinic = self
            .clinics
            .get_mut(&record.clinic_id)
            .ok_or(StoreError::MissingClinic(record.clinic_id))?;

        clinic.last_ticket = clinic.last_ticket.max(record.ticket_number);
        clinic.waiting += 1;

        self.next_checkin_id = self.next_checkin_id.max(record.id.saturating_add(1));
        self.index_checkin(&record);
        self.checkin_order.push(record.id);
        self.checkins.insert(record.id, record);
        self.push_log(log);
        self.bump_next_seq_from(seq);
        Ok(())
    }

    fn apply_call_next_with_seq(
        &mut self,
        clinic_id: ClinicId,
        ticket_number: TicketNumber,
        called_at_ms: u64,
        log: OperationLogEntry,
        seq: OpSeq,
    ) -> Result<(), StoreError> {
        let clinic = self
            .clinics
            .get_mut(&clinic_id)
            .ok_or(StoreError::MissingClinic(clinic_id))?;

        clinic.current = ticket_number;
        clinic.waiting = clinic.waiting.saturating_sub(1);

        let matched = self.waiting_by_clinic.get(&clinic_id).and_then(|ids| {
            ids.iter().copied().find(|id| {
                self.checkins
                    .get(id)
                    .is_some_and(|rec| rec.ticket_number == ticket_number)
            })
        });

        match matched {
            Some(id) => {
                let rec = self
                    .checkins
                    .get_mut(&id)
                    .ok_or(StoreError::CheckinExists(id))?;
                rec.status = CheckinStatus::Called;
                rec.called_at_ms = Some(called_at_ms);
                let patient_id = rec.patient_id.clone();
                if let Some(ids) = self.waiting_by_clinic.get_mut(&clinic_id)
                    && let Some(pos) = ids.iter().position(|x| *x == id)
                {
                    ids.remove(pos);
                }
                self.active.remove(&(patient_id, clinic_id));
            }
            None => {
                // Ticket was never issued (skipped number); counter advances anyway.
                tracing::warn!(clinic_id, ticket_number, "call with no matching waiting record");
            }
        }

        self.push_log(log);
        self.bump_next_seq_from(seq);
        Ok(())
    }

    fn index_checkin(&mut self, rec: &CheckinRecord) {
        if rec.status == CheckinStatus::Waiting {
            self.active
                .insert((rec.patient_id.clone(), rec.clinic_id), rec.id);
            self.waiting_by_clinic
                .entry(rec.clinic_id)
                .or_default()
                .push(rec.id);
        }
    }

    fn push_log(&mut self, log: OperationLogEntry) {
        self.next_log_id = self.next_log_id.max(log.id.saturating_add(1));
        self.logs.push(log);
    }

    fn take_next_op_seq(&mut self) -> OpSeq {
        let seq = self.next_op_seq;
        self.next_op_seq += 1;
        seq
    }

    fn bump_next_seq_from(&mut self, seq: OpSeq) {
        self.next_op_seq = self.next_op_seq.max(seq.saturating_add(1));
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
