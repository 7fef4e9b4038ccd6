use std::collections::HashSet;

use chrono::Utc;

use hangar_oracle::{OracleClient, OracleOp, OracleReply};

use crate::client::CatalogueEntry;
use crate::error::GazerError;

/// Diff the full upstream catalogue against ORACLE's current view and apply
/// whatever the event stream might have missed. This catches gaps left by a
/// dropped event (upstream outages, log retention limits) that strict
/// serial-following would otherwise silently miss forever.
pub fn reconcile(oracle: &OracleClient, upstream: &[CatalogueEntry], package: &str) -> Result<(), GazerError> {
    let entry = match upstream.iter().find(|e| e.package == package) {
        Some(e) => e,
        None => return Ok(()),
    };

    let known = match oracle.submit(OracleOp::GetProjectData { package: package.to_string() })? {
        OracleReply::Project(project) => project,
        _ => unreachable!("GetProjectData always returns OracleReply::Project"),
    };

    let known_versions: HashSet<&str> = known.versions.iter().map(|v| v.version.as_str()).collect();

    for version in &entry.versions {
        if !known_versions.contains(version.as_str()) {
            tracing::info!(package, version, "reconciliation found a version the event stream missed");
            oracle.submit(OracleOp::AddVersion {
                package: package.to_string(),
                version: version.clone(),
                released_at: Utc::now(),
            })?;
        }
    }

    Ok(())
}

/// Run reconciliation across every package the upstream catalogue lists.
pub fn reconcile_all(oracle: &OracleClient, upstream: &[CatalogueEntry]) -> Result<(), GazerError> {
    for entry in upstream {
        reconcile(oracle, upstream, &entry.package)?;
    }
    Ok(())
}
