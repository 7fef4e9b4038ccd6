use std::collections::HashSet;

use hangar_types::PendingQueueSnapshot;

use crate::queue::InFlightKey;
use crate::session::SessionTable;

/// The in-memory state DRIVER owns exclusively: live sessions, the most
/// recent queue snapshot from ARCH, and the set of (package, version, abi)
/// triples already handed to a builder but not yet recorded by ORACLE.
pub struct DriverState {
    pub sessions: SessionTable,
    pub queue: PendingQueueSnapshot,
    pub in_flight: HashSet<InFlightKey>,
    pub upstream_url: String,
    pub paused: bool,
    /// Set once SUPERVISOR orders a `Quit`. ARCH has already stopped feeding
    /// the queue by this point; DRIVER keeps serving in-flight sessions
    /// until they finish (or `shutdown_grace` elapses) rather than dropping
    /// them immediately.
    pub shutting_down: bool,
}

impl DriverState {
    pub fn new(upstream_url: impl Into<String>) -> Self {
        DriverState {
            sessions: SessionTable::new(),
            queue: PendingQueueSnapshot::default(),
            in_flight: HashSet::new(),
            upstream_url: upstream_url.into(),
            paused: false,
            shutting_down: false,
        }
    }

    /// Replace the queue snapshot with ARCH's latest publish. In-flight
    /// entries are preserved across the swap: ARCH doesn't yet know about
    /// them (its view comes from ORACLE, updated only after a build
    /// finishes), so they would otherwise be re-offered every tick.
    pub fn adopt_queue(&mut self, snapshot: PendingQueueSnapshot) {
        self.queue = snapshot;
    }

    pub fn record_file_verified(&mut self, slave_id: u64, filename: &str) {
        if let Some(session) = self.sessions.get_mut(slave_id) {
            session.verified.insert(filename.to_string());
        }
    }

    pub fn record_file_rejected(&mut self, slave_id: u64, filename: &str) {
        if let Some(session) = self.sessions.get_mut(slave_id) {
            session.rejected.insert(filename.to_string());
            *session.rejection_counts.entry(filename.to_string()).or_insert(0) += 1;
        }
    }

    /// Connected builder count, for BIG_BRO's composite statistics.
    pub fn active_slave_count(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hangar_types::BuilderCaps;
    use std::time::Duration;

    fn caps() -> BuilderCaps {
        BuilderCaps {
            interpreter: "cp311".into(),
            abi: "cp311_armv7l".into(),
            platform: "linux_armv7l".into(),
            label: "pi-07".into(),
            os_name: "raspbian".into(),
            os_version: "12".into(),
            board_revision: "4B".into(),
        }
    }

    #[test]
    fn repeated_rejections_of_the_same_file_accumulate_strikes() {
        let mut state = DriverState::new("u");
        let slave_id = state.sessions.allocate(caps(), Duration::from_secs(60));

        state.record_file_rejected(slave_id, "numpy-1.26.0.whl");
        state.record_file_rejected(slave_id, "numpy-1.26.0.whl");
        state.record_file_rejected(slave_id, "numpy-1.26.0.whl");

        let session = state.sessions.get(slave_id).unwrap();
        assert_eq!(session.rejection_counts.get("numpy-1.26.0.whl"), Some(&3));
        assert!(session.rejected.contains("numpy-1.26.0.whl"));
    }

    #[test]
    fn rejection_counts_are_tracked_per_filename() {
        let mut state = DriverState::new("u");
        let slave_id = state.sessions.allocate(caps(), Duration::from_secs(60));

        state.record_file_rejected(slave_id, "a.whl");
        state.record_file_rejected(slave_id, "b.whl");
        state.record_file_rejected(slave_id, "a.whl");

        let session = state.sessions.get(slave_id).unwrap();
        assert_eq!(session.rejection_counts.get("a.whl"), Some(&2));
        assert_eq!(session.rejection_counts.get("b.whl"), Some(&1));
    }
}
