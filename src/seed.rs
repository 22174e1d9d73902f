//! Initial clinic roster and sample patients.
//!
//! Seeding is idempotent: each collection is filled only when it is empty,
//! so reloading a journaled database never duplicates or overwrites data.

use crate::{
    core::store::{QueueStore, StoreError},
    record::{Clinic, Patient},
};

/// Default clinic roster inserted when the clinic collection is empty.
pub fn default_clinics() -> Vec<Clinic> {
    let roster = [
        (1, "李大衛 醫師", "內科一診", 12, 3, 15),
        (2, "陳淑芬 醫師", "內科二診", 8, 5, 13),
        (3, "王建國 醫師", "外科一診", 25, 1, 26),
        (4, "林美玲 醫師", "外科二診", 18, 4, 22),
        (5, "張小寶 醫師", "兒科一診", 5, 8, 13),
        (6, "劉光明 醫師", "眼科一診", 30, 2, 32),
    ];
    roster
        .into_iter()
        .map(|(id, name, dept, current, waiting, last_ticket)| Clinic {
            id,
            name: name.to_string(),
            dept: dept.to_string(),
            current,
            waiting,
            last_ticket,
        })
        .collect()
}

/// Sample patients inserted when the patient collection is empty.
pub fn default_patients(now_ms: u64) -> Vec<Patient> {
    let samples = [
        ("A123456789", "陳小美", "0912345678"),
        ("B234567890", "林志豪", "0923456789"),
        ("C345678901", "張雅婷", "0934567890"),
        ("D456789012", "王大明", "0945678901"),
        ("E567890123", "李國華", "0956789012"),
    ];
    samples
        .into_iter()
        .map(|(id, name, phone)| Patient {
            id: id.to_string(),
            name: name.to_string(),
            phone: phone.to_string(),
            created_at_ms: now_ms,
        })
        .collect()
}

/// Seeds whichever of the two collections are empty. No-op otherwise.
pub fn seed_if_empty(store: &mut QueueStore, now_ms: u64) -> Result<(), StoreError> {
    if store.clinic_count() == 0 {
        for clinic in default_clinics() {
            store.add_clinic(clinic)?;
        }
    }
    if store.patient_count() == 0 {
        for patient in default_patients(now_ms) {
            store.add_patient(patient)?;
        }
    }
    Ok(())
}
