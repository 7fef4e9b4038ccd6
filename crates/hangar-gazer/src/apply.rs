use hangar_oracle::{OracleClient, OracleOp};

use crate::error::GazerError;
use crate::event::{UpstreamAction, UpstreamEvent};

/// Translate one upstream event into the ORACLE operation(s) it implies,
/// execute them, then advance the stored serial. Every operation GAZER
/// issues here is idempotent, so a crash-and-replay of the same serial is
/// always safe up until the final `SetPypiSerial`.
pub fn apply_event(oracle: &OracleClient, event: &UpstreamEvent) -> Result<(), GazerError> {
    match &event.action {
        UpstreamAction::CreatePackage => {
            oracle.submit(OracleOp::AddPackage { name: event.package.clone() })?;
        }
        UpstreamAction::NewRelease { version, released_at } => {
            oracle.submit(OracleOp::AddPackage { name: event.package.clone() })?;
            oracle.submit(OracleOp::AddVersion {
                package: event.package.clone(),
                version: version.clone(),
                released_at: *released_at,
            })?;
        }
        UpstreamAction::Yank { version } => {
            oracle.submit(OracleOp::YankVersion {
                package: event.package.clone(),
                version: version.clone(),
                yanked: true,
            })?;
        }
        UpstreamAction::Unyank { version } => {
            oracle.submit(OracleOp::YankVersion {
                package: event.package.clone(),
                version: version.clone(),
                yanked: false,
            })?;
        }
        UpstreamAction::RemoveRelease { version } => {
            oracle.submit(OracleOp::DeleteVersion {
                package: event.package.clone(),
                version: version.clone(),
            })?;
        }
        UpstreamAction::RemovePackage => {
            oracle.submit(OracleOp::DeletePackage { package: event.package.clone() })?;
        }
        UpstreamAction::Rename { old_name } => {
            oracle.submit(OracleOp::AddAlias {
                canonical_name: event.package.clone(),
                alias: old_name.clone(),
            })?;
        }
    }

    match oracle.submit(OracleOp::SetPypiSerial { serial: event.serial }) {
        Ok(_) => Ok(()),
        Err(hangar_oracle::OracleError::Integrity(_)) => {
            Err(GazerError::NonIncreasingSerial { serial: event.serial })
        }
        Err(e) => Err(GazerError::Oracle(e)),
    }
}
