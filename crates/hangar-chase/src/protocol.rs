use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use sha2::{Digest, Sha256};

use hangar_oracle::{OracleClient, OracleOp};
use hangar_types::{Build, BuildFile, FileTags, RenderCommand, NONE_ABI};

use crate::error::ChaseError;

/// Derive `{package, version, interpreter, abi, platform}` from a wheel
/// filename (`name-version-pytag-abitag-platform.whl`). Non-wheel artifacts
/// (source tarballs) get `"none"` interpreter/abi/platform tags, matching
/// the reserved-tag convention used for files compatible with every ABI.
fn parse_file_tags(filename: &str, fallback_package: &str, fallback_version: &str) -> FileTags {
    let stem = filename.strip_suffix(".whl");
    match stem {
        Some(stem) => {
            let parts: Vec<&str> = stem.split('-').collect();
            if parts.len() >= 5 {
                return FileTags {
                    package: parts[0].to_string(),
                    version: parts[1].to_string(),
                    interpreter: parts[2].to_string(),
                    abi: parts[3].to_string(),
                    platform: parts[4].to_string(),
                };
            }
            FileTags {
                package: fallback_package.to_string(),
                version: fallback_version.to_string(),
                interpreter: NONE_ABI.to_string(),
                abi: NONE_ABI.to_string(),
                platform: NONE_ABI.to_string(),
            }
        }
        None => FileTags {
            package: fallback_package.to_string(),
            version: fallback_version.to_string(),
            interpreter: NONE_ABI.to_string(),
            abi: NONE_ABI.to_string(),
            platform: NONE_ABI.to_string(),
        },
    }
}

fn hash_file(path: &Path) -> Result<(u64, String), std::io::Error> {
    let file = File::open(path)?;
    let size = file.metadata()?.len();
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 65_536];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    let digest = hasher.finalize();
    let hex = digest.iter().map(|b| format!("{b:02x}")).collect();
    Ok((size, hex))
}

/// IMPORT: register a synthetic build from files already sitting on local
/// disk, skipping the FETCH/CHUNK wire protocol entirely.
pub fn handle_import(
    oracle: &OracleClient,
    packages_dir: &Path,
    package: String,
    version: String,
    abi: String,
    success: bool,
    output: String,
    filenames: Vec<String>,
) -> Result<(), ChaseError> {
    if !success {
        oracle.submit(OracleOp::LogBuildFailure {
            package,
            version,
            abi,
            builder_id: "chase-import".to_string(),
            started_at: Utc::now(),
            duration_millis: 0,
            output,
        })?;
        return Ok(());
    }

    let mut files = Vec::with_capacity(filenames.len());
    for filename in &filenames {
        let path = packages_dir.join(filename);
        let (size, sha256) = hash_file(&path).map_err(|source| ChaseError::Io { filename: filename.clone(), source })?;
        files.push(BuildFile {
            filename: filename.clone(),
            build_id: 0,
            size,
            sha256,
            tags: parse_file_tags(filename, &package, &version),
            requires_python: None,
        });
    }

    let build = Build {
        id: 0,
        package,
        version,
        abi,
        builder_id: "chase-import".to_string(),
        started_at: Utc::now(),
        duration: Duration::ZERO,
        success: true,
    };

    oracle.submit(OracleOp::LogBuildSuccess { build, files, dependencies: Vec::new() })?;
    Ok(())
}

/// REMOVE: delete a version (or whole package, when `version` is empty)
/// outright, or mark it skipped without deleting history.
pub fn handle_remove(oracle: &OracleClient, package: String, version: String, skip: bool) -> Result<(), ChaseError> {
    if skip {
        if version.is_empty() {
            return Err(ChaseError::BadRequest("skip requires a version, not a whole package".into()));
        }
        oracle.submit(OracleOp::SetVersionSkip { package, version, reason: "removed via admin".to_string() })?;
        return Ok(());
    }

    if version.is_empty() {
        oracle.submit(OracleOp::DeletePackage { package })?;
    } else {
        oracle.submit(OracleOp::DeleteVersion { package, version })?;
    }
    Ok(())
}

/// REBUILD: parse the requested command and validate it against `package`.
/// `Home`/`Search` are site-wide and may be requested with an empty
/// package; `Project`/`Both` need one to re-render.
pub fn parse_rebuild(package: &str, command: &str) -> Result<RenderCommand, ChaseError> {
    let command = match command {
        "Home" => RenderCommand::Home,
        "Search" => RenderCommand::Search,
        "Project" => RenderCommand::Project,
        "Both" => RenderCommand::Both,
        other => return Err(ChaseError::BadRequest(format!("unknown rebuild command {other:?}"))),
    };
    if package.is_empty() && matches!(command, RenderCommand::Project | RenderCommand::Both) {
        return Err(ChaseError::BadRequest("Project/Both rebuild requires a package name".into()));
    }
    Ok(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wheel_filename_yields_its_embedded_tags() {
        let tags = parse_file_tags("numpy-1.26.0-cp311-cp311-linux_armv7l.whl", "numpy", "1.26.0");
        assert_eq!(tags.interpreter, "cp311");
        assert_eq!(tags.abi, "cp311");
        assert_eq!(tags.platform, "linux_armv7l");
    }

    #[test]
    fn sdist_filename_falls_back_to_none_tags() {
        let tags = parse_file_tags("numpy-1.26.0.tar.gz", "numpy", "1.26.0");
        assert_eq!(tags.interpreter, NONE_ABI);
        assert_eq!(tags.abi, NONE_ABI);
        assert_eq!(tags.platform, NONE_ABI);
        assert_eq!(tags.package, "numpy");
    }

    #[test]
    fn rebuild_home_allows_empty_package() {
        assert_eq!(parse_rebuild("", "Home").unwrap(), RenderCommand::Home);
    }

    #[test]
    fn rebuild_project_requires_a_package() {
        let err = parse_rebuild("", "Project").unwrap_err();
        assert!(matches!(err, ChaseError::BadRequest(_)));
    }

    #[test]
    fn rebuild_unknown_command_is_rejected() {
        let err = parse_rebuild("numpy", "Nonsense").unwrap_err();
        assert!(matches!(err, ChaseError::BadRequest(_)));
    }
}
