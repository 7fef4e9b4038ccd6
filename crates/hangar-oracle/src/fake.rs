//! An in-memory stand-in for the database, used by tests that exercise
//! [`OracleOp`] dispatch without a running Postgres instance.
//!
//! `FakeOracle` mirrors the handful of tables ORACLE's stored functions
//! would otherwise operate on and dispatches the same [`OracleOp`] enum a
//! real [`crate::OracleClient`] would send to a worker. It is the harness
//! the pending-queue satisfaction scenarios are tested against.

use std::sync::Mutex;

use chrono::{DateTime, Utc};

use hangar_types::{
    Build, BuildAbi, BuildFile, Configuration, Dependency, Package, PendingQueueSnapshot, RewritePending, Version,
};

use crate::error::OracleError;
use crate::op::{OracleOp, OracleReply, ProjectData, Statistics};

#[derive(Debug)]
struct Store {
    packages: Vec<Package>,
    versions: Vec<Version>,
    builds: Vec<Build>,
    files: Vec<BuildFile>,
    dependencies: Vec<Dependency>,
    abis: Vec<BuildAbi>,
    rewrites_pending: Vec<RewritePending>,
    configuration: Configuration,
    next_build_id: i64,
}

/// An in-memory ORACLE. `abis` is seeded at construction since no
/// [`OracleOp`] variant manages `BuildAbi` lifecycle — that set is treated
/// as operator-provisioned configuration, same as in production.
pub struct FakeOracle {
    store: Mutex<Store>,
}

impl FakeOracle {
    pub fn new(abis: Vec<BuildAbi>) -> FakeOracle {
        FakeOracle {
            store: Mutex::new(Store {
                packages: Vec::new(),
                versions: Vec::new(),
                builds: Vec::new(),
                files: Vec::new(),
                dependencies: Vec::new(),
                abis,
                rewrites_pending: Vec::new(),
                configuration: Configuration::initial("0"),
                next_build_id: 1,
            }),
        }
    }

    /// Dispatch one operation against the in-memory store, the same way a
    /// real worker thread would run it against Postgres.
    pub fn dispatch(&self, op: OracleOp) -> Result<OracleReply, OracleError> {
        let mut store = self.store.lock().expect("fake oracle store poisoned");
        match op {
            OracleOp::AddPackage { name } => {
                if !store.packages.iter().any(|p| p.name == name) {
                    store.packages.push(Package { name, skip_reason: String::new(), description: None });
                }
                Ok(OracleReply::Unit)
            }
            OracleOp::AddVersion { package, version, released_at } => {
                if !store.versions.iter().any(|v| v.package == package && v.version == version) {
                    store.versions.push(Version { package, version, released_at, skip_reason: String::new(), yanked: false });
                }
                Ok(OracleReply::Unit)
            }
            OracleOp::AddAlias { .. } => Ok(OracleReply::Unit),
            OracleOp::DeletePackage { package } => {
                let before = store.packages.len();
                store.packages.retain(|p| p.name != package);
                not_found_unless(before != store.packages.len(), || format!("package {package:?}"))
            }
            OracleOp::DeleteVersion { package, version } => {
                let before = store.versions.len();
                store.versions.retain(|v| !(v.package == package && v.version == version));
                not_found_unless(before != store.versions.len(), || format!("{package}=={version}"))
            }
            OracleOp::YankVersion { package, version, yanked } => {
                match store.versions.iter_mut().find(|v| v.package == package && v.version == version) {
                    Some(v) => {
                        v.yanked = yanked;
                        Ok(OracleReply::Unit)
                    }
                    None => Err(OracleError::NotFound(format!("{package}=={version}"))),
                }
            }
            OracleOp::SetVersionSkip { package, version, reason } => {
                match store.versions.iter_mut().find(|v| v.package == package && v.version == version) {
                    Some(v) => {
                        v.skip_reason = reason;
                        Ok(OracleReply::Unit)
                    }
                    None => Err(OracleError::NotFound(format!("{package}=={version}"))),
                }
            }
            OracleOp::GetPendingQueue => {
                let snapshot = hangar_types::queue::compute_pending_queue(
                    &store.abis,
                    &store.packages,
                    &store.versions,
                    &store.builds,
                    &store.files,
                );
                Ok(OracleReply::Queue(snapshot))
            }
            OracleOp::ListPackages => Ok(OracleReply::Packages(store.packages.clone())),
            OracleOp::LogBuildSuccess { build, files, dependencies } => {
                if files.is_empty() {
                    return Err(OracleError::Integrity(format!(
                        "successful build of {}=={} on {} reported zero files",
                        build.package, build.version, build.abi
                    )));
                }
                let build_id = store.next_build_id;
                store.next_build_id += 1;
                store.builds.push(Build { id: build_id, ..build });
                for mut file in files {
                    file.build_id = build_id;
                    store.files.push(file);
                }
                store.dependencies.extend(dependencies);
                Ok(OracleReply::BuildId(build_id))
            }
            OracleOp::LogBuildFailure { package, version, abi, builder_id, started_at, duration_millis, .. } => {
                let build_id = store.next_build_id;
                store.next_build_id += 1;
                store.builds.push(Build {
                    id: build_id,
                    package,
                    version,
                    abi,
                    builder_id,
                    started_at,
                    duration: std::time::Duration::from_millis(duration_millis.max(0) as u64),
                    success: false,
                });
                Ok(OracleReply::BuildId(build_id))
            }
            OracleOp::DeleteBuild { build_id } => {
                let before = store.builds.len();
                store.builds.retain(|b| b.id != build_id);
                store.files.retain(|f| f.build_id != build_id);
                not_found_unless(before != store.builds.len(), || format!("build {build_id}"))
            }
            OracleOp::GetProjectData { package } => {
                let versions = store.versions.iter().filter(|v| v.package == package).cloned().collect();
                let build_ids: Vec<i64> = store.builds.iter().filter(|b| b.package == package).map(|b| b.id).collect();
                let files = store.files.iter().filter(|f| build_ids.contains(&f.build_id)).cloned().collect();
                Ok(OracleReply::Project(ProjectData { package, versions, files }))
            }
            OracleOp::SaveRewritesPending { rows } => {
                store.rewrites_pending = rows;
                Ok(OracleReply::Unit)
            }
            OracleOp::LoadRewritesPending => Ok(OracleReply::Rewrites(store.rewrites_pending.clone())),
            OracleOp::GetStatistics => {
                let disk_usage_bytes: i64 = store.files.iter().map(|f| f.size as i64).sum();
                Ok(OracleReply::Stats(Statistics {
                    total_packages: store.packages.len() as i64,
                    total_versions: store.versions.len() as i64,
                    total_files: store.files.len() as i64,
                    total_builds: store.builds.len() as i64,
                    disk_usage_bytes,
                }))
            }
            OracleOp::GetConfiguration => Ok(OracleReply::Config(store.configuration.clone())),
            OracleOp::SetPypiSerial { serial } => {
                if serial < store.configuration.pypi_serial {
                    return Err(OracleError::Integrity(format!("pypi_serial would go backwards: rejected {serial}")));
                }
                store.configuration.pypi_serial = serial;
                Ok(OracleReply::Unit)
            }
        }
    }
}

fn not_found_unless(condition: bool, message: impl FnOnce() -> String) -> Result<OracleReply, OracleError> {
    if condition {
        Ok(OracleReply::Unit)
    } else {
        Err(OracleError::NotFound(message()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hangar_types::{FileTags, NONE_ABI};

    fn abi(tag: &str) -> BuildAbi {
        BuildAbi { tag: tag.into(), skip_reason: String::new(), description: None }
    }

    fn released(ts: &str) -> DateTime<Utc> {
        ts.parse().expect("valid timestamp literal")
    }

    fn seed_package_and_version(oracle: &FakeOracle, package: &str, version: &str, released_at: &str) {
        oracle.dispatch(OracleOp::AddPackage { name: package.into() }).unwrap();
        oracle
            .dispatch(OracleOp::AddVersion { package: package.into(), version: version.into(), released_at: released(released_at) })
            .unwrap();
    }

    fn queue_of(reply: OracleReply) -> PendingQueueSnapshot {
        match reply {
            OracleReply::Queue(snapshot) => snapshot,
            other => panic!("expected OracleReply::Queue, got {other:?}"),
        }
    }

    #[test]
    fn fresh_queue_offers_only_the_smallest_abi() {
        let oracle = FakeOracle::new(vec![abi("a1"), abi("a2")]);
        seed_package_and_version(&oracle, "numpy", "1.26.0", "2024-01-01T00:00:00Z");

        let snapshot = queue_of(oracle.dispatch(OracleOp::GetPendingQueue).unwrap());
        let rows = snapshot.rows_for("a1");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].package, "numpy");
        assert_eq!(rows[0].version, "1.26.0");
        assert!(snapshot.rows_for("a2").is_empty());
    }

    #[test]
    fn universal_artifact_satisfies_every_abi() {
        let oracle = FakeOracle::new(vec![abi("a1"), abi("a2")]);
        seed_package_and_version(&oracle, "numpy", "1.26.0", "2024-01-01T00:00:00Z");

        let build = Build {
            id: 0,
            package: "numpy".into(),
            version: "1.26.0".into(),
            abi: "a1".into(),
            builder_id: "pi-07".into(),
            started_at: Utc::now(),
            duration: std::time::Duration::from_secs(10),
            success: true,
        };
        let file = BuildFile {
            filename: "numpy-1.26.0-cp311-none-any.whl".into(),
            build_id: 0,
            size: 1024,
            sha256: "0".repeat(64),
            tags: FileTags { package: "numpy".into(), version: "1.26.0".into(), interpreter: "cp311".into(), abi: NONE_ABI.into(), platform: "any".into() },
            requires_python: None,
        };
        oracle.dispatch(OracleOp::LogBuildSuccess { build, files: vec![file], dependencies: vec![] }).unwrap();

        let snapshot = queue_of(oracle.dispatch(OracleOp::GetPendingQueue).unwrap());
        assert!(snapshot.is_empty());
    }

    #[test]
    fn specific_artifact_only_satisfies_its_own_abi() {
        let oracle = FakeOracle::new(vec![abi("a1"), abi("a2")]);
        seed_package_and_version(&oracle, "numpy", "1.26.0", "2024-01-01T00:00:00Z");

        let build = Build {
            id: 0,
            package: "numpy".into(),
            version: "1.26.0".into(),
            abi: "a1".into(),
            builder_id: "pi-07".into(),
            started_at: Utc::now(),
            duration: std::time::Duration::from_secs(10),
            success: true,
        };
        let file = BuildFile {
            filename: "numpy-1.26.0-cp311-a1-armv7l.whl".into(),
            build_id: 0,
            size: 1024,
            sha256: "0".repeat(64),
            tags: FileTags { package: "numpy".into(), version: "1.26.0".into(), interpreter: "cp311".into(), abi: "a1".into(), platform: "armv7l".into() },
            requires_python: None,
        };
        oracle.dispatch(OracleOp::LogBuildSuccess { build, files: vec![file], dependencies: vec![] }).unwrap();

        let snapshot = queue_of(oracle.dispatch(OracleOp::GetPendingQueue).unwrap());
        assert!(snapshot.rows_for("a1").is_empty());
        assert_eq!(snapshot.rows_for("a2").len(), 1);
    }

    #[test]
    fn failure_does_not_requeue_its_own_abi() {
        let oracle = FakeOracle::new(vec![abi("a1"), abi("a2")]);
        seed_package_and_version(&oracle, "numpy", "1.26.0", "2024-01-01T00:00:00Z");

        oracle
            .dispatch(OracleOp::LogBuildFailure {
                package: "numpy".into(),
                version: "1.26.0".into(),
                abi: "a1".into(),
                builder_id: "pi-07".into(),
                started_at: Utc::now(),
                duration_millis: 500,
                output: "compile error".into(),
            })
            .unwrap();

        let snapshot = queue_of(oracle.dispatch(OracleOp::GetPendingQueue).unwrap());
        assert!(snapshot.rows_for("a1").is_empty());
        assert_eq!(snapshot.rows_for("a2").len(), 1);
    }

    #[test]
    fn yanking_a_version_does_not_remove_it_from_project_data() {
        let oracle = FakeOracle::new(vec![abi("a1")]);
        seed_package_and_version(&oracle, "numpy", "1.26.0", "2024-01-01T00:00:00Z");
        oracle.dispatch(OracleOp::YankVersion { package: "numpy".into(), version: "1.26.0".into(), yanked: true }).unwrap();

        match oracle.dispatch(OracleOp::GetProjectData { package: "numpy".into() }).unwrap() {
            OracleReply::Project(data) => {
                assert_eq!(data.versions.len(), 1);
                assert!(data.versions[0].yanked);
            }
            other => panic!("expected OracleReply::Project, got {other:?}"),
        }
    }

    #[test]
    fn deleting_an_unknown_package_is_not_found() {
        let oracle = FakeOracle::new(vec![]);
        let err = oracle.dispatch(OracleOp::DeletePackage { package: "ghost".into() }).unwrap_err();
        assert!(matches!(err, OracleError::NotFound(_)));
    }

    #[test]
    fn pypi_serial_cannot_go_backwards() {
        let oracle = FakeOracle::new(vec![]);
        oracle.dispatch(OracleOp::SetPypiSerial { serial: 100 }).unwrap();
        let err = oracle.dispatch(OracleOp::SetPypiSerial { serial: 50 }).unwrap_err();
        assert!(matches!(err, OracleError::Integrity(_)));
    }
}
