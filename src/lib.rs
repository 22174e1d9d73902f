//! Clinic self-check-in queue engine with append-only SQLite journaling.
//!
//! Patients check themselves into a clinic queue and receive a ticket,
//! the doctor console calls the next number, and waiting displays poll
//! live status. All mutations run on a single-writer runtime so capacity
//! and duplicate-ticket invariants hold under concurrent requests.
//!
//! # Examples
//!
//! In-memory usage with [`core::store::QueueStore`]:
//! ```
//! use clinicq::{core::store::QueueStore, seed};
//!
//! let mut store = QueueStore::new();
//! seed::seed_if_empty(&mut store, 0).expect("seed");
//! let (receipt, _op) = store.check_in("A123456789", 1).expect("check in");
//! assert_eq!(receipt.ticket_number, 16);
//! assert_eq!(receipt.clinic.waiting, 4);
//! ```
//!
//! Runtime usage with SQLite sink:
//! ```no_run
//! use clinicq::{
//!     core::store::QueueStore,
//!     persist::sqlite::SqliteOpSink,
//!     runtime::handle::{RuntimeConfig, spawn_queue_runtime},
//!     seed,
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let sink = SqliteOpSink::open("clinicq.db").expect("open sqlite");
//! let mut store = sink.load_store().expect("load");
//! seed::seed_if_empty(&mut store, 0).expect("seed");
//! let handle = spawn_queue_runtime(store, Some(Box::new(sink)), RuntimeConfig::default());
//! let receipt = handle.check_in("A123456789", 1).await.expect("check in");
//! println!("ticket {}", receipt.ticket_number);
//! handle.shutdown().await.expect("shutdown");
//! # }
//! ```
#![deny(missing_docs)]

/// Core in-memory store and index helpers.
pub mod core;
/// HTTP/JSON API router and error mapping.
pub mod http;
/// Mutation op model and persistence wrapper types.
pub mod op;
/// Persistence abstraction and SQLite implementation.
pub mod persist;
/// Patient, clinic, check-in, and audit-log record types.
pub mod record;
/// Single-writer runtime handle and events.
pub mod runtime;
/// Idempotent startup seed data.
pub mod seed;
/// Consumer-side polling and turn alerts.
pub mod sync;
/// Shared primitive types and enums.
pub mod types;
