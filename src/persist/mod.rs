//! Persistence abstraction and SQLite implementation.

/// SQLite-backed journal sink.
pub mod sqlite;

use crate::{core::store::StoreSnapshotV1, op::StoredOp, types::OpSeq};

/// Failures raised by the persistence layer.
#[derive(Debug)]
pub enum PersistError {
    /// Underlying SQLite failure.
    Sqlite(rusqlite::Error),
    /// Payload (de)serialization failure.
    Serde(serde_json::Error),
    /// Any other failure, described in text.
    Message(String),
}

impl From<rusqlite::Error> for PersistError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<serde_json::Error> for PersistError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serde(value)
    }
}

impl From<crate::core::store::StoreError> for PersistError {
    fn from(value: crate::core::store::StoreError) -> Self {
        Self::Message(format!("store error: {value:?}"))
    }
}

/// Shorthand result for persistence operations.
pub type PersistResult<T> = Result<T, PersistError>;

/// Durable destination for journaled operations.
pub trait OpSink: Send {
    /// Appends ops in order and returns the highest sequence written.
    fn append_ops(&mut self, ops: &[StoredOp]) -> PersistResult<OpSeq>;
    /// Forces buffered writes to stable storage.
    fn flush(&mut self) -> PersistResult<()> {
        Ok(())
    }
    /// Records a whole-store snapshot covering ops up to `last_seq`.
    fn write_snapshot(
        &mut self,
        _snapshot: &StoreSnapshotV1,
        _last_seq: OpSeq,
    ) -> PersistResult<()> {
        Ok(())
    }
    /// Deletes journaled ops at or below `seq`; returns how many.
    fn compact_through(&mut self, _seq: OpSeq) -> PersistResult<usize> {
        Ok(0)
    }
}
