use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::{Build, BuildAbi, BuildFile, Package, Version, NONE_ABI};

/// One row of the derived pending-build queue: a (package, version) pair
/// still needing an attempt against `abi`, at `position` within that ABI's
/// ordering (oldest release first).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingQueueRow {
    pub abi: String,
    pub package: String,
    pub version: String,
    pub position: u32,
}

/// A point-in-time snapshot ARCH publishes to DRIVER: every active ABI's
/// ordered queue, keyed by ABI tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingQueueSnapshot {
    pub by_abi: BTreeMap<String, Vec<PendingQueueRow>>,
}

impl PendingQueueSnapshot {
    pub fn len(&self) -> usize {
        self.by_abi.values().map(|rows| rows.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn rows_for(&self, abi: &str) -> &[PendingQueueRow] {
        self.by_abi.get(abi).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Compute the pending-build queue: for every active (package, version) and
/// every active `BuildAbi`, decide whether a build attempt is still owed.
///
/// A (package, version) pair is satisfied for ABI `A` when:
///
/// 1. it has a successful build that produced a file tagged [`NONE_ABI`] —
///    a universal artifact satisfies every ABI at once, or
/// 2. it has a successful build against `A` that produced a file tagged
///    `A`, or
/// 3. it has any build (successful or failed) against `A` — the attempt
///    was made and is not retried.
///
/// Rules 2 and 3 both reduce to "any build recorded against `A`" once rule
/// 1 has already been checked: a successful build against `A` without a
/// universal file is indistinguishable, for queueing purposes, from a
/// failed one — both mean `A` has been tried and is settled.
///
/// Of the ABIs still unsatisfied for a pair, the lexicographically smallest
/// is queued — at most one entry per pending pair per call, so a version
/// needing three ABIs appears once per tick, not three times at once.
/// Within an ABI's queue, rows are ordered by release timestamp ascending.
pub fn compute_pending_queue(
    abis: &[BuildAbi],
    packages: &[Package],
    versions: &[Version],
    builds: &[Build],
    files: &[BuildFile],
) -> PendingQueueSnapshot {
    let active_abis: Vec<&str> = {
        let mut tags: Vec<&str> = abis.iter().filter(|a| a.is_active()).map(|a| a.tag.as_str()).collect();
        tags.sort_unstable();
        tags
    };

    let active_packages: BTreeSet<&str> = packages.iter().filter(|p| p.is_active()).map(|p| p.name.as_str()).collect();

    let mut file_abis_by_build: HashMap<i64, Vec<&str>> = HashMap::new();
    for file in files {
        file_abis_by_build.entry(file.build_id).or_default().push(file.tags.abi.as_str());
    }

    let mut staged: BTreeMap<String, Vec<(DateTime<Utc>, String, String)>> = BTreeMap::new();

    for version in versions {
        if !version.is_active() || !active_packages.contains(version.package.as_str()) {
            continue;
        }

        let pair_builds: Vec<&Build> =
            builds.iter().filter(|b| b.package == version.package && b.version == version.version).collect();

        let universal_satisfied = pair_builds.iter().any(|b| {
            b.success && file_abis_by_build.get(&b.id).is_some_and(|tags| tags.iter().any(|t| *t == NONE_ABI))
        });
        if universal_satisfied {
            continue;
        }

        let chosen = active_abis.iter().find(|abi| !pair_builds.iter().any(|b| b.abi == **abi));
        if let Some(abi) = chosen {
            staged.entry(abi.to_string()).or_default().push((
                version.released_at,
                version.package.clone(),
                version.version.clone(),
            ));
        }
    }

    let mut snapshot = PendingQueueSnapshot::default();
    for (abi, mut rows) in staged {
        rows.sort_by_key(|(released_at, ..)| *released_at);
        let queue = rows
            .into_iter()
            .enumerate()
            .map(|(position, (_, package, version))| PendingQueueRow {
                abi: abi.clone(),
                package,
                version,
                position: position as u32,
            })
            .collect();
        snapshot.by_abi.insert(abi, queue);
    }
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_snapshot_has_zero_length() {
        let snap = PendingQueueSnapshot::default();
        assert!(snap.is_empty());
        assert_eq!(snap.len(), 0);
    }

    #[test]
    fn rows_for_unknown_abi_is_empty_slice() {
        let snap = PendingQueueSnapshot::default();
        assert!(snap.rows_for("cp311_armv7l").is_empty());
    }

    #[test]
    fn len_sums_across_all_abis() {
        let mut snap = PendingQueueSnapshot::default();
        snap.by_abi.insert(
            "a1".into(),
            vec![PendingQueueRow {
                abi: "a1".into(),
                package: "p".into(),
                version: "1.0".into(),
                position: 0,
            }],
        );
        snap.by_abi.insert(
            "a2".into(),
            vec![
                PendingQueueRow {
                    abi: "a2".into(),
                    package: "p".into(),
                    version: "1.0".into(),
                    position: 0,
                },
                PendingQueueRow {
                    abi: "a2".into(),
                    package: "q".into(),
                    version: "2.0".into(),
                    position: 1,
                },
            ],
        );
        assert_eq!(snap.len(), 3);
    }

    fn abis(tags: &[&str]) -> Vec<BuildAbi> {
        tags.iter().map(|tag| BuildAbi { tag: (*tag).into(), skip_reason: String::new(), description: None }).collect()
    }

    fn package(name: &str) -> Package {
        Package { name: name.into(), skip_reason: String::new(), description: None }
    }

    fn version(package: &str, version: &str, released_at: DateTime<Utc>) -> Version {
        Version { package: package.into(), version: version.into(), released_at, skip_reason: String::new(), yanked: false }
    }

    fn build(id: i64, package: &str, version: &str, abi: &str, success: bool) -> Build {
        Build {
            id,
            package: package.into(),
            version: version.into(),
            abi: abi.into(),
            builder_id: "builder-1".into(),
            started_at: Utc::now(),
            duration: std::time::Duration::from_secs(1),
            success,
        }
    }

    fn file(build_id: i64, abi_tag: &str) -> BuildFile {
        BuildFile {
            filename: format!("file-{build_id}-{abi_tag}.whl"),
            build_id,
            size: 1,
            sha256: "0".repeat(64),
            tags: crate::FileTags {
                package: "p".into(),
                version: "1.0".into(),
                interpreter: "cp311".into(),
                abi: abi_tag.into(),
                platform: "linux".into(),
            },
            requires_python: None,
        }
    }

    fn released_2024_01_01() -> DateTime<Utc> {
        "2024-01-01T00:00:00Z".parse().unwrap()
    }

    #[test]
    fn fresh_queue_offers_only_the_smallest_abi() {
        let snapshot = compute_pending_queue(
            &abis(&["a1", "a2"]),
            &[package("p")],
            &[version("p", "1.0", released_2024_01_01())],
            &[],
            &[],
        );
        assert_eq!(snapshot.rows_for("a1").len(), 1);
        assert!(snapshot.rows_for("a2").is_empty());
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn universal_artifact_satisfies_every_abi() {
        let snapshot = compute_pending_queue(
            &abis(&["a1", "a2"]),
            &[package("p")],
            &[version("p", "1.0", released_2024_01_01())],
            &[build(1, "p", "1.0", "a1", true)],
            &[file(1, NONE_ABI)],
        );
        assert!(snapshot.is_empty());
    }

    #[test]
    fn specific_artifact_only_satisfies_its_own_abi() {
        let snapshot = compute_pending_queue(
            &abis(&["a1", "a2"]),
            &[package("p")],
            &[version("p", "1.0", released_2024_01_01())],
            &[build(1, "p", "1.0", "a1", true)],
            &[file(1, "a1")],
        );
        assert!(snapshot.rows_for("a1").is_empty());
        assert_eq!(snapshot.rows_for("a2").len(), 1);
        assert_eq!(snapshot.rows_for("a2")[0].package, "p");
    }

    #[test]
    fn failure_does_not_requeue_its_own_abi() {
        let snapshot = compute_pending_queue(
            &abis(&["a1", "a2"]),
            &[package("p")],
            &[version("p", "1.0", released_2024_01_01())],
            &[build(1, "p", "1.0", "a1", false)],
            &[],
        );
        assert!(snapshot.rows_for("a1").is_empty());
        assert_eq!(snapshot.rows_for("a2").len(), 1);
    }

    #[test]
    fn queue_is_idempotent_without_intervening_mutation() {
        let abis = abis(&["a1", "a2"]);
        let packages = [package("p")];
        let versions = [version("p", "1.0", released_2024_01_01())];
        let builds = [build(1, "p", "1.0", "a1", false)];

        let first = compute_pending_queue(&abis, &packages, &versions, &builds, &[]);
        let second = compute_pending_queue(&abis, &packages, &versions, &builds, &[]);
        assert_eq!(first, second);
    }

    #[test]
    fn each_pair_appears_in_at_most_one_abi_per_snapshot() {
        let snapshot = compute_pending_queue(
            &abis(&["a1", "a2", "a3"]),
            &[package("p")],
            &[version("p", "1.0", released_2024_01_01())],
            &[],
            &[],
        );
        let total: usize = snapshot.by_abi.values().filter(|rows| rows.iter().any(|r| r.package == "p" && r.version == "1.0")).count();
        assert_eq!(total, 1);
    }

    #[test]
    fn ordering_within_an_abi_is_oldest_release_first() {
        let snapshot = compute_pending_queue(
            &abis(&["a1"]),
            &[package("p"), package("q")],
            &[
                version("p", "2.0", "2024-06-01T00:00:00Z".parse().unwrap()),
                version("q", "1.0", released_2024_01_01()),
            ],
            &[],
            &[],
        );
        let rows = snapshot.rows_for("a1");
        assert_eq!(rows[0].package, "q");
        assert_eq!(rows[1].package, "p");
    }
}
