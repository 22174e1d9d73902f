use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use clinicq::{
    record::Clinic,
    sync::{
        feed::{ClinicFeed, FeedError},
        poller::{MyTicket, SyncConfig, SyncEvent, spawn_status_poller, turn_matches},
    },
};

fn clinic(dept: &str, current: u32) -> Clinic {
    Clinic {
        id: 1,
        name: "Doctor".to_string(),
        dept: dept.to_string(),
        current,
        waiting: 0,
        last_ticket: current,
    }
}

fn ticket(number: u32, dept: &str) -> MyTicket {
    MyTicket {
        ticket_number: number,
        dept: dept.to_string(),
    }
}

/// Replays a scripted sequence of poll results; the last entry repeats
/// once the script runs out.
struct ScriptFeed {
    script: Arc<Mutex<VecDeque<Result<Vec<Clinic>, u16>>>>,
}

impl ScriptFeed {
    fn new(script: Vec<Result<Vec<Clinic>, u16>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
        }
    }
}

impl ClinicFeed for ScriptFeed {
    async fn fetch_clinics(&self) -> Result<Vec<Clinic>, FeedError> {
        let mut script = self.script.lock().expect("lock");
        let result = if script.len() > 1 {
            script.pop_front().expect("scripted result")
        } else {
            script.front().cloned().expect("scripted result")
        };
        result.map_err(FeedError::Status)
    }
}

fn fast() -> SyncConfig {
    SyncConfig {
        poll_interval: Duration::from_millis(10),
    }
}

async fn next_event(sub: &mut tokio::sync::broadcast::Receiver<SyncEvent>) -> SyncEvent {
    tokio::time::timeout(Duration::from_secs(1), sub.recv())
        .await
        .expect("event timeout")
        .expect("recv")
}

#[test]
fn turn_matches_is_exact_on_dept_and_current() {
    let clinics = vec![clinic("Dept 1", 5), clinic("Dept 2", 9)];

    assert!(turn_matches(&clinics, &ticket(5, "Dept 1")));
    assert!(!turn_matches(&clinics, &ticket(5, "Dept 2")));
    // A counter already past the target never matches.
    assert!(!turn_matches(&clinics, &ticket(4, "Dept 1")));
    assert!(!turn_matches(&clinics, &ticket(6, "Dept 1")));
}

#[tokio::test]
async fn alert_fires_exactly_once() {
    let feed = ScriptFeed::new(vec![
        Ok(vec![clinic("Dept 1", 4)]),
        Ok(vec![clinic("Dept 1", 5)]),
        Ok(vec![clinic("Dept 1", 5)]),
    ]);
    let handle = spawn_status_poller(feed, Some(ticket(5, "Dept 1")), fast());
    let mut sub = handle.subscribe();

    // First cycle: no match yet, snapshot only.
    assert!(matches!(next_event(&mut sub).await, SyncEvent::Snapshot { .. }));

    // Second cycle: the alert precedes the snapshot that triggered it.
    assert_eq!(
        next_event(&mut sub).await,
        SyncEvent::TurnReached {
            ticket_number: 5,
            dept: "Dept 1".to_string(),
        }
    );
    assert!(matches!(next_event(&mut sub).await, SyncEvent::Snapshot { .. }));

    // The counter stays matched but the alert never re-fires.
    for _ in 0..3 {
        assert!(matches!(next_event(&mut sub).await, SyncEvent::Snapshot { .. }));
    }

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn alert_requires_matching_dept() {
    let feed = ScriptFeed::new(vec![Ok(vec![clinic("Dept 2", 5)])]);
    let handle = spawn_status_poller(feed, Some(ticket(5, "Dept 1")), fast());
    let mut sub = handle.subscribe();

    for _ in 0..4 {
        assert!(matches!(next_event(&mut sub).await, SyncEvent::Snapshot { .. }));
    }

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn counter_already_past_target_never_fires() {
    let feed = ScriptFeed::new(vec![Ok(vec![clinic("Dept 1", 7)])]);
    let handle = spawn_status_poller(feed, Some(ticket(5, "Dept 1")), fast());
    let mut sub = handle.subscribe();

    for _ in 0..4 {
        assert!(matches!(next_event(&mut sub).await, SyncEvent::Snapshot { .. }));
    }

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn failed_cycle_reports_and_recovers() {
    let feed = ScriptFeed::new(vec![
        Err(500),
        Err(500),
        Ok(vec![clinic("Dept 1", 3)]),
    ]);
    let handle = spawn_status_poller(feed, None, fast());
    let mut sub = handle.subscribe();

    assert_eq!(next_event(&mut sub).await, SyncEvent::FetchFailed);
    assert_eq!(next_event(&mut sub).await, SyncEvent::FetchFailed);
    assert_eq!(
        next_event(&mut sub).await,
        SyncEvent::Snapshot {
            clinics: vec![clinic("Dept 1", 3)],
        }
    );

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn ticket_set_after_spawn_fires() {
    let feed = ScriptFeed::new(vec![Ok(vec![clinic("Dept 1", 5)])]);
    let handle = spawn_status_poller(feed, None, fast());
    let mut sub = handle.subscribe();

    // Nothing watched yet.
    assert!(matches!(next_event(&mut sub).await, SyncEvent::Snapshot { .. }));

    handle.set_ticket(ticket(5, "Dept 1")).await.expect("set");
    let mut fired = false;
    for _ in 0..5 {
        if matches!(next_event(&mut sub).await, SyncEvent::TurnReached { .. }) {
            fired = true;
            break;
        }
    }
    assert!(fired, "expected alert after set_ticket");

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn cleared_ticket_stays_silent() {
    let feed = ScriptFeed::new(vec![Ok(vec![clinic("Dept 1", 4)])]);
    let script = Arc::clone(&feed.script);
    let handle = spawn_status_poller(feed, Some(ticket(5, "Dept 1")), fast());
    let mut sub = handle.subscribe();

    handle.clear_ticket().await.expect("clear");
    // Let the clear land before the counter reaches the target.
    tokio::time::sleep(Duration::from_millis(50)).await;
    script
        .lock()
        .expect("lock")
        .push_back(Ok(vec![clinic("Dept 1", 5)]));

    let deadline = tokio::time::Instant::now() + Duration::from_millis(150);
    while tokio::time::Instant::now() < deadline {
        if let Ok(Ok(SyncEvent::TurnReached { .. })) =
            tokio::time::timeout(Duration::from_millis(20), sub.recv()).await
        {
            panic!("alert fired after clear_ticket");
        }
    }

    handle.shutdown().await.expect("shutdown");
}
