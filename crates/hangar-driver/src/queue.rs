use std::collections::HashSet;

use hangar_types::PendingQueueSnapshot;

/// Key identifying one (package, version, abi) attempt, used to track which
/// rows DRIVER has already handed out so ARCH's next snapshot doesn't
/// re-offer them before ORACLE's view catches up.
pub type InFlightKey = (String, String, String);

/// Pop the first not-yet-in-flight row for `abi`, marking it in-flight.
/// Returns `None` if the ABI's queue is empty or every row is already out.
pub fn pop_for_abi(
    queue: &PendingQueueSnapshot,
    abi: &str,
    in_flight: &mut HashSet<InFlightKey>,
) -> Option<(String, String)> {
    let row = queue.rows_for(abi).iter().find(|row| {
        !in_flight.contains(&(row.package.clone(), row.version.clone(), row.abi.clone()))
    })?;
    in_flight.insert((row.package.clone(), row.version.clone(), row.abi.clone()));
    Some((row.package.clone(), row.version.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hangar_types::PendingQueueRow;
    use std::collections::BTreeMap;

    fn snapshot() -> PendingQueueSnapshot {
        let mut by_abi = BTreeMap::new();
        by_abi.insert(
            "cp311_armv7l".to_string(),
            vec![
                PendingQueueRow { abi: "cp311_armv7l".into(), package: "numpy".into(), version: "1.26.0".into(), position: 0 },
                PendingQueueRow { abi: "cp311_armv7l".into(), package: "scipy".into(), version: "1.11.0".into(), position: 1 },
            ],
        );
        PendingQueueSnapshot { by_abi }
    }

    #[test]
    fn pops_the_head_of_the_abi_queue() {
        let mut in_flight = HashSet::new();
        let popped = pop_for_abi(&snapshot(), "cp311_armv7l", &mut in_flight);
        assert_eq!(popped, Some(("numpy".to_string(), "1.26.0".to_string())));
        assert!(in_flight.contains(&("numpy".to_string(), "1.26.0".to_string(), "cp311_armv7l".to_string())));
    }

    #[test]
    fn skips_rows_already_in_flight() {
        let mut in_flight = HashSet::new();
        in_flight.insert(("numpy".to_string(), "1.26.0".to_string(), "cp311_armv7l".to_string()));
        let popped = pop_for_abi(&snapshot(), "cp311_armv7l", &mut in_flight);
        assert_eq!(popped, Some(("scipy".to_string(), "1.11.0".to_string())));
    }

    #[test]
    fn empty_queue_yields_nothing() {
        let mut in_flight = HashSet::new();
        assert_eq!(pop_for_abi(&PendingQueueSnapshot::default(), "cp311_armv7l", &mut in_flight), None);
    }
}
