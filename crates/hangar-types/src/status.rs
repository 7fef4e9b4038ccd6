use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// BIG_BRO's periodic composite snapshot: ORACLE's SQL-aggregated counters
/// plus the two figures only available in-process — ARCH's per-ABI queue
/// depth and DRIVER's live builder count. Published to SCRIBE (to trigger a
/// home-page refresh) and to the SUPERVISOR status channel for monitors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FarmStatus {
    pub total_packages: i64,
    pub total_versions: i64,
    pub total_files: i64,
    pub total_builds: i64,
    pub disk_usage_bytes: i64,
    pub queue_by_abi: BTreeMap<String, usize>,
    pub active_slaves: usize,
}

impl FarmStatus {
    pub fn total_pending(&self) -> usize {
        self.queue_by_abi.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_pending_sums_every_abi() {
        let mut status = FarmStatus::default();
        status.queue_by_abi.insert("cp311".into(), 3);
        status.queue_by_abi.insert("cp312".into(), 5);
        assert_eq!(status.total_pending(), 8);
    }

    #[test]
    fn default_status_has_no_pending_work() {
        assert_eq!(FarmStatus::default().total_pending(), 0);
    }
}
