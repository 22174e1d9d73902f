use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use clinicq::{
    core::store::QueueStore,
    persist::OpSink,
    record::{Clinic, Patient},
    runtime::{
        events::QueueEvent,
        handle::{RuntimeConfig, RuntimeError, spawn_queue_runtime},
    },
    types::OpSeq,
};

fn seeded_store(clinics: u32, patients: u8) -> QueueStore {
    let mut store = QueueStore::new();
    for id in 1..=clinics {
        store
            .add_clinic(Clinic {
                id,
                name: format!("Doctor {id}"),
                dept: format!("Dept {id}"),
                current: 0,
                waiting: 0,
                last_ticket: 0,
            })
            .expect("clinic");
    }
    for p in 0..patients {
        store
            .add_patient(Patient {
                id: format!("P{p}"),
                name: format!("Patient {p}"),
                phone: "0900000000".to_string(),
                created_at_ms: 1,
            })
            .expect("patient");
    }
    store
}

struct SlowSink {
    seen: Arc<Mutex<Vec<OpSeq>>>,
    delay: Duration,
}

impl OpSink for SlowSink {
    fn append_ops(&mut self, ops: &[clinicq::op::StoredOp]) -> clinicq::persist::PersistResult<OpSeq> {
        std::thread::sleep(self.delay);
        let mut seen = self.seen.lock().expect("lock");
        for op in ops {
            seen.push(op.seq);
        }
        Ok(ops.last().map(|o| o.seq).unwrap_or(0))
    }
}

#[tokio::test]
async fn runtime_check_in_call_query_and_events_ordered() {
    let handle = spawn_queue_runtime(seeded_store(1, 2), None, RuntimeConfig::default());
    let mut sub = handle.subscribe();

    let receipt = handle.check_in("P0", 1).await.expect("check in");
    assert_eq!(receipt.ticket_number, 1);

    let outcome = handle.call_next(1).await.expect("call");
    assert_eq!(outcome.current, 1);
    assert_eq!(outcome.waiting, 0);

    let clinics = handle.clinics().await.expect("clinics");
    assert_eq!(clinics.len(), 1);
    assert_eq!(clinics[0].current, 1);

    let patient = handle.patient("P0").await.expect("patient");
    assert_eq!(patient.expect("present").name, "Patient 0");
    assert!(handle.patient("missing").await.expect("query").is_none());

    let mut seen = Vec::new();
    for _ in 0..6 {
        let evt = tokio::time::timeout(Duration::from_secs(1), sub.recv())
            .await
            .expect("event")
            .expect("recv");
        if !matches!(evt, QueueEvent::DurableUpTo { .. }) {
            seen.push(evt);
        }
        if seen.len() == 2 {
            break;
        }
    }

    assert_eq!(
        seen[0],
        QueueEvent::CheckedIn {
            clinic_id: 1,
            ticket_number: 1,
        }
    );
    assert_eq!(
        seen[1],
        QueueEvent::NumberCalled {
            clinic_id: 1,
            ticket_number: 1,
        }
    );

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn business_rejections_leave_runtime_usable() {
    let handle = spawn_queue_runtime(seeded_store(1, 2), None, RuntimeConfig::default());

    handle.check_in("P0", 1).await.expect("first");
    let dup = handle.check_in("P0", 1).await;
    assert!(matches!(dup, Err(RuntimeError::Store(_))));

    // The rejection did not wedge the writer.
    let receipt = handle.check_in("P1", 1).await.expect("second");
    assert_eq!(receipt.ticket_number, 2);
    assert_eq!(receipt.clinic.waiting, 2);

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn durable_event_advances_and_slow_sink_surfaces_queue_pressure() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = SlowSink {
        seen: Arc::clone(&seen),
        delay: Duration::from_millis(250),
    };

    let cfg = RuntimeConfig {
        flush_on_mutation: true,
        batch_max_ops: 16,
        batch_max_latency_ms: 500,
        persist_queue_bound: 1,
        snapshot_every_ops: 0,
        compact_after_snapshot: false,
    };

    let handle = spawn_queue_runtime(seeded_store(3, 5), Some(Box::new(sink)), cfg);
    let mut sub = handle.subscribe();

    let receipt = handle.check_in("P0", 1).await.expect("check in");
    assert_eq!(receipt.ticket_number, 1);

    let mut durable_seen = false;
    for _ in 0..5 {
        let evt = tokio::time::timeout(Duration::from_secs(1), sub.recv())
            .await
            .expect("recv timeout")
            .expect("recv");
        if matches!(evt, QueueEvent::DurableUpTo { .. }) {
            durable_seen = true;
            break;
        }
    }
    assert!(durable_seen, "expected DurableUpTo event");

    let mut queue_error_seen = false;
    'outer: for clinic in 1..=3u32 {
        for p in 0..5u8 {
            let r = handle.check_in(format!("P{p}"), clinic).await;
            if let Err(RuntimeError::Persist(_)) = r {
                queue_error_seen = true;
                break 'outer;
            }
        }
    }
    assert!(
        queue_error_seen,
        "expected persistence queue pressure to surface as error"
    );

    handle.shutdown().await.expect("shutdown");
    assert!(!seen.lock().expect("lock").is_empty());
}
