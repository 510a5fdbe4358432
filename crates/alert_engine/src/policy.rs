//! Warning-issued policy.

use chrono::{DateTime, Utc};
use common::WarningState;

/// True only when the state, its update time, and the cutoff are all known
/// and the update is strictly after the cutoff.
pub fn is_newly_issued_since(state: Option<&WarningState>, since: Option<DateTime<Utc>>) -> bool {
    match (state.and_then(|s| s.updated_at), since) {
        (Some(updated_at), Some(since)) => updated_at > since,
        _ => false,
    }
}
