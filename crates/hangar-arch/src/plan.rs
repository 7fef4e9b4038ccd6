use hangar_types::PendingQueueSnapshot;

/// Keep only the first `top_k` rows of every ABI's queue. ORACLE's
/// `pending_queue` view already returns rows ordered oldest-release-first
/// within each ABI, so truncation here is a prefix take, not a re-sort.
///
/// Returns the truncated snapshot and the number of rows dropped per ABI,
/// so the caller can log what was cut rather than silently discarding it.
pub fn truncate_top_k(mut snapshot: PendingQueueSnapshot, top_k: usize) -> (PendingQueueSnapshot, Vec<(String, usize)>) {
    let mut dropped = Vec::new();
    for (abi, rows) in snapshot.by_abi.iter_mut() {
        if rows.len() > top_k {
            let cut = rows.len() - top_k;
            rows.truncate(top_k);
            dropped.push((abi.clone(), cut));
        }
    }
    (snapshot, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hangar_types::PendingQueueRow;
    use std::collections::BTreeMap;

    fn row(abi: &str, pos: u32) -> PendingQueueRow {
        PendingQueueRow {
            abi: abi.into(),
            package: "numpy".into(),
            version: format!("1.{pos}.0"),
            position: pos,
        }
    }

    #[test]
    fn under_the_limit_is_untouched() {
        let mut by_abi = BTreeMap::new();
        by_abi.insert("cp311_armv7l".to_string(), vec![row("cp311_armv7l", 0), row("cp311_armv7l", 1)]);
        let snapshot = PendingQueueSnapshot { by_abi };

        let (truncated, dropped) = truncate_top_k(snapshot, 10);
        assert_eq!(truncated.len(), 2);
        assert!(dropped.is_empty());
    }

    #[test]
    fn over_the_limit_is_truncated_and_reported() {
        let mut by_abi = BTreeMap::new();
        by_abi.insert("cp311_armv7l".to_string(), (0..5).map(|i| row("cp311_armv7l", i)).collect());
        let snapshot = PendingQueueSnapshot { by_abi };

        let (truncated, dropped) = truncate_top_k(snapshot, 3);
        assert_eq!(truncated.rows_for("cp311_armv7l").len(), 3);
        assert_eq!(dropped, vec![("cp311_armv7l".to_string(), 2)]);
    }

    #[test]
    fn truncation_is_independent_per_abi() {
        let mut by_abi = BTreeMap::new();
        by_abi.insert("cp311_armv7l".to_string(), (0..5).map(|i| row("cp311_armv7l", i)).collect());
        by_abi.insert("cp39_aarch64".to_string(), vec![row("cp39_aarch64", 0)]);
        let snapshot = PendingQueueSnapshot { by_abi };

        let (truncated, dropped) = truncate_top_k(snapshot, 3);
        assert_eq!(truncated.rows_for("cp311_armv7l").len(), 3);
        assert_eq!(truncated.rows_for("cp39_aarch64").len(), 1);
        assert_eq!(dropped, vec![("cp311_armv7l".to_string(), 2)]);
    }
}
