use tokio::{
    sync::{broadcast, mpsc, oneshot},
    time::{Duration, MissedTickBehavior, interval},
};

use crate::{record::Clinic, types::TicketNumber};

use super::feed::ClinicFeed;

/// Locally remembered ticket, set at check-in time and cleared after the
/// alert fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MyTicket {
    /// Ticket number to watch for.
    pub ticket_number: TicketNumber,
    /// Department the ticket was issued in.
    pub dept: String,
}

/// Events broadcast by the polling loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A refresh succeeded; local state was replaced wholesale.
    Snapshot {
        /// The fetched clinic list.
        clinics: Vec<Clinic>,
    },
    /// The watched ticket is now being served. Fired at most once.
    TurnReached {
        /// The matched ticket number.
        ticket_number: TicketNumber,
        /// The matched department.
        dept: String,
    },
    /// A poll cycle failed; displayed data is stale until the next success.
    FetchFailed,
}

/// Poller tuning.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Fixed interval between refreshes.
    pub poll_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
        }
    }
}

/// Returns true when any clinic's now-serving number matches the ticket.
///
/// Level-triggered on purpose: a `current` already past the target never
/// matches, mirroring the kiosk's original alert behavior.
pub fn turn_matches(clinics: &[Clinic], ticket: &MyTicket) -> bool {
    clinics
        .iter()
        .any(|c| c.dept == ticket.dept && c.current == ticket.ticket_number)
}

enum SyncCommand {
    SetTicket(MyTicket),
    ClearTicket,
    Shutdown { resp: oneshot::Sender<()> },
}

/// Failure surfaced by [`SyncHandle`] methods.
#[derive(Debug)]
pub enum SyncError {
    /// The poller task has shut down.
    ChannelClosed,
}

/// Cloneable handle to a running status poller.
pub struct SyncHandle {
    cmd_tx: mpsc::Sender<SyncCommand>,
    events_tx: broadcast::Sender<SyncEvent>,
}

impl Clone for SyncHandle {
    fn clone(&self) -> Self {
        Self {
            cmd_tx: self.cmd_tx.clone(),
            events_tx: self.events_tx.clone(),
        }
    }
}

impl SyncHandle {
    /// Subscribes to poller events.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events_tx.subscribe()
    }

    /// Stores the ticket to watch. Replaces any previous one.
    pub async fn set_ticket(&self, ticket: MyTicket) -> Result<(), SyncError> {
        self.cmd_tx
            .send(SyncCommand::SetTicket(ticket))
            .await
            .map_err(|_| SyncError::ChannelClosed)
    }

    /// Clears the watched ticket without firing.
    pub async fn clear_ticket(&self) -> Result<(), SyncError> {
        self.cmd_tx
            .send(SyncCommand::ClearTicket)
            .await
            .map_err(|_| SyncError::ChannelClosed)
    }

    /// Stops the polling task.
    pub async fn shutdown(&self) -> Result<(), SyncError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(SyncCommand::Shutdown { resp: tx })
            .await
            .map_err(|_| SyncError::ChannelClosed)?;
        rx.await.map_err(|_| SyncError::ChannelClosed)
    }
}

/// Spawns the polling loop as an explicit task with a cancellation handle.
///
/// Every tick the full clinic list is re-fetched and replaces local state
/// wholesale. A failed cycle is logged and reported as [`SyncEvent::FetchFailed`];
/// the loop simply tries again next tick.
pub fn spawn_status_poller<F: ClinicFeed>(
    feed: F,
    ticket: Option<MyTicket>,
    config: SyncConfig,
) -> SyncHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<SyncCommand>(16);
    let (events_tx, _) = broadcast::channel::<SyncEvent>(64);
    let events_tx_loop = events_tx.clone();

    tokio::spawn(async move {
        let mut ticket = ticket;
        let mut stale = false;
        let mut ticker = interval(config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(SyncCommand::SetTicket(t)) => ticket = Some(t),
                        Some(SyncCommand::ClearTicket) => ticket = None,
                        Some(SyncCommand::Shutdown { resp }) => {
                            let _ = resp.send(());
                            break;
                        }
                        None => break,
                    }
                }
                _ = ticker.tick() => {
                    match feed.fetch_clinics().await {
                        Ok(clinics) => {
                            if stale {
                                tracing::info!("status feed recovered");
                                stale = false;
                            }
                            if let Some(t) = &ticket
                                && turn_matches(&clinics, t)
                            {
                                let _ = events_tx_loop.send(SyncEvent::TurnReached {
                                    ticket_number: t.ticket_number,
                                    dept: t.dept.clone(),
                                });
                                // One-shot: never re-fire for the same ticket.
                                ticket = None;
                            }
                            let _ = events_tx_loop.send(SyncEvent::Snapshot { clinics });
                        }
                        Err(err) => {
                            tracing::warn!("status poll failed: {err:?}");
                            stale = true;
                            let _ = events_tx_loop.send(SyncEvent::FetchFailed);
                        }
                    }
                }
            }
        }
    });

    SyncHandle { cmd_tx, events_tx }
}
