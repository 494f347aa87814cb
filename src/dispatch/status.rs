//! Session identity and observable dispatcher state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::phase::DispatchPhase;

/// Identity of one dispatcher session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Unique id for this session.
    pub session_id: Uuid,
    /// Wall-clock time the dispatcher was created.
    pub started_at: DateTime<Utc>,
}

impl SessionInfo {
    pub(crate) fn generate() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            started_at: Utc::now(),
        }
    }
}

/// Snapshot of the dispatcher as seen from outside.
///
/// Serializable so host applications can surface or archive it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DispatchStatus {
    pub session: SessionInfo,
    pub phase: DispatchPhase,
    /// Index of the trial currently executing or about to start.
    pub trial: usize,
    /// Records appended to the event log so far.
    pub events_logged: usize,
    /// Output channels currently asserted, by label.
    pub outputs_on: Vec<String>,
}
