use std::sync::Arc;

use tokio::{
    sync::{Mutex, broadcast, mpsc, oneshot},
    time::{Duration, Instant},
};

use crate::{
    core::store::{CallOutcome, CheckinReceipt, QueueStore, StoreError},
    op::StoredOp,
    persist::{OpSink, PersistError},
    record::{Clinic, OperationLogEntry, Patient, WaitingEntry},
    types::{ClinicId, OpSeq},
};

use super::events::QueueEvent;

/// Failures surfaced to runtime callers.
#[derive(Debug)]
pub enum RuntimeError {
    /// Business-rule or lookup failure from the store.
    Store(StoreError),
    /// Persistence failure, including journal queue pressure.
    Persist(PersistError),
    /// The runtime task has shut down.
    ChannelClosed,
}

impl From<StoreError> for RuntimeError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<PersistError> for RuntimeError {
    fn from(value: PersistError) -> Self {
        Self::Persist(value)
    }
}

/// Tuning knobs for the runtime and its persistence worker.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Flush the journal immediately after each mutation.
    pub flush_on_mutation: bool,
    /// Flush once this many ops are buffered.
    pub batch_max_ops: usize,
    /// Flush once the oldest buffered op is this old.
    pub batch_max_latency_ms: u64,
    /// Bound on the persistence queue; pressure surfaces as an error.
    pub persist_queue_bound: usize,
    /// Write a snapshot every N mutations (0 disables).
    pub snapshot_every_ops: usize,
    /// Delete journaled ops covered by each snapshot.
    pub compact_after_snapshot: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            flush_on_mutation: true,
            batch_max_ops: 32,
            batch_max_latency_ms: 75,
            persist_queue_bound: 64,
            snapshot_every_ops: 2000,
            compact_after_snapshot: false,
        }
    }
}

/// Cloneable handle to the single-writer queue runtime.
///
/// All mutations funnel through one task that owns the [`QueueStore`],
/// so admission-control and duplicate-ticket invariants hold under
/// concurrent callers. Reads answer from the same task and only ever
/// observe fully committed state.
pub struct QueueHandle {
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<QueueEvent>,
}

impl Clone for QueueHandle {
    fn clone(&self) -> Self {
        Self {
            cmd_tx: self.cmd_tx.clone(),
            events_tx: self.events_tx.clone(),
        }
    }
}

enum Command {
    CheckIn {
        patient_id: String,
        clinic_id: ClinicId,
        resp: oneshot::Sender<Result<CheckinReceipt, RuntimeError>>,
    },
    CallNext {
        clinic_id: ClinicId,
        resp: oneshot::Sender<Result<CallOutcome, RuntimeError>>,
    },
    Clinics {
        resp: oneshot::Sender<Vec<Clinic>>,
    },
    Patient {
        id: String,
        resp: oneshot::Sender<Option<Patient>>,
    },
    WaitingList {
        clinic_id: ClinicId,
        resp: oneshot::Sender<Vec<WaitingEntry>>,
    },
    RecentLogs {
        limit: usize,
        resp: oneshot::Sender<Vec<OperationLogEntry>>,
    },
    Flush {
        resp: oneshot::Sender<Result<OpSeq, RuntimeError>>,
    },
    Checkpoint {
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
    Shutdown {
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
}

enum PersistMsg {
    Op(StoredOp),
    Flush {
        resp: oneshot::Sender<Result<OpSeq, PersistError>>,
    },
    Checkpoint {
        snapshot: crate::core::store::StoreSnapshotV1,
        last_seq: OpSeq,
        compact: bool,
        resp: oneshot::Sender<Result<(), PersistError>>,
    },
    Shutdown {
        resp: oneshot::Sender<()>,
    },
}

/// Spawns the runtime task (and persistence worker when a sink is given).
pub fn spawn_queue_runtime(
    store: QueueStore,
    sink: Option<Box<dyn OpSink>>,
    config: RuntimeConfig,
) -> QueueHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(256);
    let (events_tx, _) = broadcast::channel::<QueueEvent>(1024);

    let (persist_tx_opt, mut durable_rx) = if let Some(sink) = sink {
        let (persist_tx, persist_rx) = mpsc::channel::<PersistMsg>(config.persist_queue_bound);
        let (durable_tx, durable_rx) = mpsc::unbounded_channel::<Result<OpSeq, PersistError>>();
        spawn_persistence_worker(sink, persist_rx, durable_tx, config.clone());
        (Some(persist_tx), Some(durable_rx))
    } else {
        (None, None)
    };

    let events_tx_loop = events_tx.clone();

    tokio::spawn(async move {
        let mut store = store;
        let mut ops_since_snapshot = 0usize;

        // Ops accumulated before spawn (startup seeding) still need journaling.
        if let Some(tx) = persist_tx_opt.as_ref() {
            for stored in store.drain_pending_ops() {
                if tx.send(PersistMsg::Op(stored)).await.is_err() {
                    break;
                }
            }
        }

        loop {
            if let Some(rx) = durable_rx.as_mut() {
                tokio::select! {
                    cmd = cmd_rx.recv() => {
                        let Some(cmd) = cmd else { break; };
                        let done = handle_command(
                            cmd,
                            &mut store,
                            &events_tx_loop,
                            persist_tx_opt.as_ref(),
                            &config,
                            &mut ops_since_snapshot,
                        ).await;

                        if done {
                            break;
                        }
                    }
                    durable = rx.recv() => {
                        if let Some(Ok(op_seq)) = durable {
                            let _ = events_tx_loop.send(QueueEvent::DurableUpTo { op_seq });
                        }
                    }
                }
            } else {
                let Some(cmd) = cmd_rx.recv().await else { break };
                let done = handle_command(
                    cmd,
                    &mut store,
                    &events_tx_loop,
                    persist_tx_opt.as_ref(),
                    &config,
                    &mut ops_since_snapshot,
                )
                .await;
                if done {
                    break;
                }
            }
        }
    });

    QueueHandle { cmd_tx, events_tx }
}

impl QueueHandle {
    /// Subscribes to the runtime event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.events_tx.subscribe()
    }

    /// Checks a patient into a clinic queue.
    pub async fn check_in(
        &self,
        patient_id: impl Into<String>,
        clinic_id: ClinicId,
    ) -> Result<CheckinReceipt, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::CheckIn {
                patient_id: patient_id.into(),
                clinic_id,
                resp: tx,
            })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Advances a clinic's now-serving counter.
    pub async fn call_next(&self, clinic_id: ClinicId) -> Result<CallOutcome, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::CallNext {
                clinic_id,
                resp: tx,
            })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// All clinics in insertion order.
    pub async fn clinics(&self) -> Result<Vec<Clinic>, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Clinics { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Looks up a patient by id.
    pub async fn patient(&self, id: impl Into<String>) -> Result<Option<Patient>, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Patient {
                id: id.into(),
                resp: tx,
            })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Waiting records for a clinic, joined with patient names.
    pub async fn waiting_list(
        &self,
        clinic_id: ClinicId,
    ) -> Result<Vec<WaitingEntry>, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::WaitingList {
                clinic_id,
                resp: tx,
            })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// At most `limit` most recent audit entries, newest first.
    pub async fn recent_logs(&self, limit: usize) -> Result<Vec<OperationLogEntry>, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::RecentLogs { limit, resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Forces the journal to durable storage.
    pub async fn flush(&self) -> Result<OpSeq, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Flush { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Writes a snapshot now (and compacts if configured).
    pub async fn checkpoint(&self) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Checkpoint { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Flushes outstanding ops and stops the runtime task.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Shutdown { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }
}

async fn handle_command(
    cmd: Command,
    store: &mut QueueStore,
    events_tx: &broadcast::Sender<QueueEvent>,
    persist_tx: Option<&mpsc::Sender<PersistMsg>>,
    config: &RuntimeConfig,
    ops_since_snapshot: &mut usize,
) -> bool {
    match cmd {
        Command::CheckIn {
            patient_id,
            clinic_id,
            resp,
        } => {
            let res = store
                .check_in(&patient_id, clinic_id)
                .map_err(RuntimeError::from)
                .and_then(|(receipt, stored)| {
                    if let Some(tx) = persist_tx {
                        enqueue_persist(tx, stored)?;
                    } else {
                        let _ = events_tx.send(QueueEvent::DurableUpTo {
                            op_seq: store.latest_op_seq(),
                        });
                    }
                    let _ = events_tx.send(QueueEvent::CheckedIn {
                        clinic_id,
                        ticket_number: receipt.ticket_number,
                    });
                    Ok(receipt)
                });
            if res.is_ok() {
                // Already enqueued above; keep the buffer from growing.
                store.drain_pending_ops();
                *ops_since_snapshot += 1;
                maybe_auto_checkpoint(store, persist_tx, config, ops_since_snapshot).await;
            }
            let _ = resp.send(res);
        }
        Command::CallNext { clinic_id, resp } => {
            let res = store
                .call_next(clinic_id)
                .map_err(RuntimeError::from)
                .and_then(|(outcome, stored)| {
                    if let Some(tx) = persist_tx {
                        enqueue_persist(tx, stored)?;
                    } else {
                        let _ = events_tx.send(QueueEvent::DurableUpTo {
                            op_seq: store.latest_op_seq(),
                        });
                    }
                    let _ = events_tx.send(QueueEvent::NumberCalled {
                        clinic_id,
                        ticket_number: outcome.current,
                    });
                    Ok(outcome)
                });
            if res.is_ok() {
                store.drain_pending_ops();
                *ops_since_snapshot += 1;
                maybe_auto_checkpoint(store, persist_tx, config, ops_since_snapshot).await;
            }
            let _ = resp.send(res);
        }
        Command::Clinics { resp } => {
            let _ = resp.send(store.clinics_cloned());
        }
        Command::Patient { id, resp } => {
            let _ = resp.send(store.patient_cloned(&id));
        }
        Command::WaitingList { clinic_id, resp } => {
            let _ = resp.send(store.waiting_list(clinic_id));
        }
        Command::RecentLogs { limit, resp } => {
            let _ = resp.send(store.recent_logs(limit));
        }
        Command::Flush { resp } => {
            let out = if let Some(tx) = persist_tx {
                let (flush_tx, flush_rx) = oneshot::channel();
                if tx.send(PersistMsg::Flush { resp: flush_tx }).await.is_err() {
                    Err(RuntimeError::ChannelClosed)
                } else {
                    flush_rx
                        .await
                        .map_err(|_| RuntimeError::ChannelClosed)
                        .and_then(|r| r.map_err(RuntimeError::from))
                }
            } else {
                Ok(store.latest_op_seq())
            };
            let _ = resp.send(out);
        }
        Command::Checkpoint { resp } => {
            let out = if let Some(tx) = persist_tx {
                let snapshot = store.export_snapshot();
                let last_seq = store.latest_op_seq();
                let (cp_tx, cp_rx) = oneshot::channel();
                if tx
                    .send(PersistMsg::Checkpoint {
                        snapshot,
                        last_seq,
                        compact: config.compact_after_snapshot,
                        resp: cp_tx,
                    })
                    .await
                    .is_err()
                {
                    Err(RuntimeError::ChannelClosed)
                } else {
                    cp_rx
                        .await
                        .map_err(|_| RuntimeError::ChannelClosed)
                        .and_then(|r| r.map_err(RuntimeError::from))
                }
            } else {
                Ok(())
            };
            let _ = resp.send(out);
        }
        Command::Shutdown { resp } => {
            let out = if let Some(tx) = persist_tx {
                let (done_tx, done_rx) = oneshot::channel();
                let send_res = tx.send(PersistMsg::Shutdown { resp: done_tx }).await;
                if send_res.is_err() {
                    Err(RuntimeError::ChannelClosed)
                } else {
                    match done_rx.await {
                        Ok(()) => Ok(()),
                        Err(_) => Err(RuntimeError::ChannelClosed),
                    }
                }
            } else {
                Ok(())
            };
            let _ = resp.send(out);
            return true;
        }
    }

    false
}

fn spawn_persistence_worker(
    sink: Box<dyn OpSink>,
    mut rx: mpsc::Receiver<PersistMsg>,
    durable_tx: mpsc::UnboundedSender<Result<OpSeq, PersistError>>,
    config: RuntimeConfig,
) {
    let sink = Arc::new(Mutex::new(sink));
    tokio::spawn(async move {
        let mut buf = Vec::<StoredOp>::new();
        let mut deadline = Instant::now() + Duration::from_millis(config.batch_max_latency_ms);
        let mut last_durable: OpSeq = 0;

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    let Some(msg) = msg else {
                        let _ = flush_buf(&sink, &mut buf, &mut last_durable, &durable_tx, true).await;
                        break;
                    };

                    match msg {
                        PersistMsg::Op(stored) => {
                            buf.push(stored);

                            if buf.len() >= config.batch_max_ops || config.flush_on_mutation {
                                let _ = flush_buf(&sink, &mut buf, &mut last_durable, &durable_tx, true).await;
                                deadline = Instant::now() + Duration::from_millis(config.batch_max_latency_ms);
                            }
                        }
                        PersistMsg::Flush { resp } => {
                            let result = flush_buf(&sink, &mut buf, &mut last_durable, &durable_tx, true).await;
                            let _ = resp.send(result.map(|_| last_durable));
                            deadline = Instant::now() + Duration::from_millis(config.batch_max_latency_ms);
                        }
                        PersistMsg::Checkpoint { snapshot, last_seq, compact, resp } => {
                            let flush_result = flush_buf(&sink, &mut buf, &mut last_durable, &durable_tx, true).await;
                            let result = if let Err(err) = flush_result {
                                Err(err)
                            } else {
                                let sink_ref = Arc::clone(&sink);
                                match tokio::task::spawn_blocking(move || {
                                    let mut sink = sink_ref.blocking_lock();
                                    sink.write_snapshot(&snapshot, last_seq)?;
                                    if compact {
                                        let _ = sink.compact_through(last_seq)?;
                                    }
                                    Result::<(), PersistError>::Ok(())
                                }).await {
                                    Ok(inner) => inner,
                                    Err(e) => Err(PersistError::Message(format!("join error: {e}"))),
                                }
                            };
                            let _ = resp.send(result);
                            deadline = Instant::now() + Duration::from_millis(config.batch_max_latency_ms);
                        }
                        PersistMsg::Shutdown { resp } => {
                            let _ = flush_buf(&sink, &mut buf, &mut last_durable, &durable_tx, true).await;
                            let _ = resp.send(());
                            break;
                        }
                    }
                }
                _ = tokio::time::sleep_until(deadline), if !buf.is_empty() => {
                    let _ = flush_buf(&sink, &mut buf, &mut last_durable, &durable_tx, false).await;
                    deadline = Instant::now() + Duration::from_millis(config.batch_max_latency_ms);
                }
            }
        }
    });
}

async fn flush_buf(
    sink: &Arc<Mutex<Box<dyn OpSink>>>,
    buf: &mut Vec<StoredOp>,
    last_durable: &mut OpSeq,
    durable_tx: &mpsc::UnboundedSender<Result<OpSeq, PersistError>>,
    call_flush: bool,
) -> Result<(), PersistError> {
    if buf.is_empty() {
        if call_flush {
            let sink_ref = Arc::clone(sink);
            tokio::task::spawn_blocking(move || {
                let mut sink = sink_ref.blocking_lock();
                sink.flush()
            })
            .await
            .map_err(|e| PersistError::Message(format!("join error: {e}")))??;
        }
        return Ok(());
    }

    let ops = std::mem::take(buf);
    let sink_ref = Arc::clone(sink);
    let append_res: Result<OpSeq, PersistError> = tokio::task::spawn_blocking(move || {
        let mut sink = sink_ref.blocking_lock();
        let seq = sink.append_ops(&ops)?;
        if call_flush {
            sink.flush()?;
        }
        Ok(seq)
    })
    .await
    .map_err(|e| PersistError::Message(format!("join error: {e}")))?;

    match append_res {
        Ok(seq) => {
            *last_durable = (*last_durable).max(seq);
            let _ = durable_tx.send(Ok(*last_durable));
            Ok(())
        }
        Err(err) => {
            let _ = durable_tx.send(Err(PersistError::Message(format!("append failed: {err:?}"))));
            Err(err)
        }
    }
}

async fn maybe_auto_checkpoint(
    store: &QueueStore,
    persist_tx: Option<&mpsc::Sender<PersistMsg>>,
    config: &RuntimeConfig,
    ops_since_snapshot: &mut usize,
) {
    if config.snapshot_every_ops == 0 || *ops_since_snapshot < config.snapshot_every_ops {
        return;
    }

    let Some(tx) = persist_tx else {
        return;
    };

    let snapshot = store.export_snapshot();
    let last_seq = store.latest_op_seq();
    let (cp_tx, cp_rx) = oneshot::channel();
    if tx
        .send(PersistMsg::Checkpoint {
            snapshot,
            last_seq,
            compact: config.compact_after_snapshot,
            resp: cp_tx,
        })
        .await
        .is_ok()
    {
        let _ = cp_rx.await;
        *ops_since_snapshot = 0;
    }
}

fn enqueue_persist(tx: &mpsc::Sender<PersistMsg>, stored: StoredOp) -> Result<(), RuntimeError> {
    tx.try_send(PersistMsg::Op(stored)).map_err(|err| {
        RuntimeError::Persist(PersistError::Message(format!("persist queue error: {err}")))
    })
}
