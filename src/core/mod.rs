//! In-memory authoritative store and index helpers.

/// Helper index aliases.
pub mod indices;
/// Authoritative queue store: admission, call, audit, and read projections.
pub mod store;
