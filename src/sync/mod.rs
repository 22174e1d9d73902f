//! Consumer-side synchronization: polling feed and "your turn" alerts.

/// Clinic snapshot sources (HTTP implementation included).
pub mod feed;
/// Polling loop, alert matcher, and handle.
pub mod poller;
