use hashbrown::HashMap;

use crate::types::{CheckinId, ClinicId};

/// Waiting check-in ids per clinic, in issue order.
pub type WaitingIndex = HashMap<ClinicId, Vec<CheckinId>>;
