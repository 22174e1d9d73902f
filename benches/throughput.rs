use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use clinicq::{
    core::store::QueueStore,
    record::{Clinic, Patient},
};

fn seeded(clinics: u32, patients: u32) -> QueueStore {
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

fn bench_checkin_call_cycle(c: &mut Criterion) {
    c.bench_function("checkin_call_cycle_10k", |b| {
        b.iter(|| {
            let mut store = seeded(1, 1);
            for _ in 0..10_000u32 {
                let _ = store.check_in("P0", 1).expect("check in");
                let _ = store.call_next(1).expect("call");
                store.drain_pending_ops();
            }
        });
    });
}

fn bench_waiting_list(c: &mut Criterion) {
    let mut group = c.benchmark_group("waiting_list");
    let mut store = seeded(1, 10);
    for p in 0..10u32 {
        let _ = store.check_in(&format!("P{p}"), 1).expect("check in");
    }

    group.bench_function("full_clinic", |b| {
        b.iter(|| {
            let _ = store.waiting_list(1);
        });
    });

    group.finish();
}

fn bench_clinics_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("clinics_query");

    for n in [10u32, 100u32, 1000u32] {
        let store = seeded(n, 0);
        group.bench_with_input(BenchmarkId::from_parameter(n), &store, |b, store| {
            b.iter(|| {
                let _ = store.clinics_cloned();
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_checkin_call_cycle,
    bench_waiting_list,
    bench_clinics_query
);
criterion_main!(benches);
