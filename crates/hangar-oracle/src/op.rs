use chrono::{DateTime, Utc};
use postgres::Client;
use serde::{Deserialize, Serialize};

use hangar_types::{
    Build, BuildFile, Configuration, Dependency, DependencyTool, Package, PendingQueueRow, PendingQueueSnapshot,
    RenderCommand, RewritePending, Version,
};

use crate::error::OracleError;

/// A snapshot of one package's public-facing data, assembled for SCRIBE's
/// project-page render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectData {
    pub package: String,
    pub versions: Vec<Version>,
    pub files: Vec<BuildFile>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Statistics {
    pub total_packages: i64,
    pub total_versions: i64,
    pub total_files: i64,
    pub total_builds: i64,
    pub disk_usage_bytes: i64,
}

/// The fixed, closed set of database operations the master ever performs.
/// Each variant carries its own parameters; [`OracleOp::execute`] runs it as
/// one transaction against a pooled connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OracleOp {
    AddPackage { name: String },
    AddVersion { package: String, version: String, released_at: DateTime<Utc> },
    AddAlias { canonical_name: String, alias: String },
    DeletePackage { package: String },
    DeleteVersion { package: String, version: String },
    YankVersion { package: String, version: String, yanked: bool },
    SetVersionSkip { package: String, version: String, reason: String },
    GetPendingQueue,
    ListPackages,
    LogBuildSuccess { build: Build, files: Vec<BuildFile>, dependencies: Vec<Dependency> },
    LogBuildFailure { package: String, version: String, abi: String, builder_id: String, started_at: DateTime<Utc>, duration_millis: i64, output: String },
    DeleteBuild { build_id: i64 },
    GetProjectData { package: String },
    SaveRewritesPending { rows: Vec<RewritePending> },
    LoadRewritesPending,
    GetStatistics,
    GetConfiguration,
    SetPypiSerial { serial: i64 },
}

/// The structured result of one [`OracleOp`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OracleReply {
    Unit,
    BuildId(i64),
    Queue(PendingQueueSnapshot),
    Packages(Vec<Package>),
    Project(ProjectData),
    Rewrites(Vec<RewritePending>),
    Stats(Statistics),
    Config(Configuration),
}

fn dependency_tool_tag(tool: DependencyTool) -> &'static str {
    match tool {
        DependencyTool::Apt => "apt",
        DependencyTool::Pip => "pip",
        DependencyTool::None => "",
    }
}

fn render_command_tag(command: RenderCommand) -> &'static str {
    match command {
        RenderCommand::Home => "home",
        RenderCommand::Search => "search",
        RenderCommand::Project => "project",
        RenderCommand::Both => "both",
    }
}

fn render_command_from_tag(tag: &str) -> RenderCommand {
    match tag {
        "home" => RenderCommand::Home,
        "search" => RenderCommand::Search,
        "project" => RenderCommand::Project,
        _ => RenderCommand::Both,
    }
}

impl OracleOp {
    /// Run this operation as one transaction against a pooled connection.
    ///
    /// Every arm calls a named, pre-existing `security definer` SQL
    /// function rather than touching a table directly (see §6/§9 of this
    /// workspace's design notes): the master's database role holds no DML
    /// grants of its own, only `EXECUTE` on this closed function set, so a
    /// compromised or buggy master can never run arbitrary SQL against the
    /// application schema.
    pub fn execute(&self, client: &mut Client) -> Result<OracleReply, OracleError> {
        let mut tx = client.transaction()?;
        let reply = match self {
            OracleOp::AddPackage { name } => {
                tx.execute("SELECT add_package($1)", &[name])?;
                OracleReply::Unit
            }
            OracleOp::AddVersion { package, version, released_at } => {
                tx.execute("SELECT add_version($1, $2, $3)", &[package, version, released_at])?;
                OracleReply::Unit
            }
            OracleOp::AddAlias { canonical_name, alias } => {
                tx.execute("SELECT add_alias($1, $2)", &[canonical_name, alias])?;
                OracleReply::Unit
            }
            OracleOp::DeletePackage { package } => {
                let row = tx.query_one("SELECT delete_package($1)", &[package])?;
                let existed: bool = row.get(0);
                if !existed {
                    return Err(OracleError::NotFound(format!("package {package:?}")));
                }
                OracleReply::Unit
            }
            OracleOp::DeleteVersion { package, version } => {
                let row = tx.query_one("SELECT delete_version($1, $2)", &[package, version])?;
                let existed: bool = row.get(0);
                if !existed {
                    return Err(OracleError::NotFound(format!("{package}=={version}")));
                }
                OracleReply::Unit
            }
            OracleOp::YankVersion { package, version, yanked } => {
                let row = tx.query_one("SELECT yank_version($1, $2, $3)", &[package, version, yanked])?;
                let existed: bool = row.get(0);
                if !existed {
                    return Err(OracleError::NotFound(format!("{package}=={version}")));
                }
                OracleReply::Unit
            }
            OracleOp::SetVersionSkip { package, version, reason } => {
                let row = tx.query_one("SELECT set_version_skip($1, $2, $3)", &[package, version, reason])?;
                let existed: bool = row.get(0);
                if !existed {
                    return Err(OracleError::NotFound(format!("{package}=={version}")));
                }
                OracleReply::Unit
            }
            OracleOp::GetPendingQueue => {
                let rows = tx.query("SELECT abi, package, version, position FROM get_pending_queue()", &[])?;
                let mut snapshot = PendingQueueSnapshot::default();
                for row in rows {
                    let abi: String = row.get(0);
                    snapshot.by_abi.entry(abi.clone()).or_default().push(PendingQueueRow {
                        abi,
                        package: row.get(1),
                        version: row.get(2),
                        position: row.get::<_, i32>(3) as u32,
                    });
                }
                OracleReply::Queue(snapshot)
            }
            OracleOp::ListPackages => {
                let rows = tx.query("SELECT name, skip_reason, description FROM list_packages()", &[])?;
                let packages = rows
                    .iter()
                    .map(|row| Package {
                        name: row.get(0),
                        skip_reason: row.get(1),
                        description: row.get(2),
                    })
                    .collect();
                OracleReply::Packages(packages)
            }
            OracleOp::LogBuildSuccess { build, files, dependencies } => {
                if files.is_empty() {
                    return Err(OracleError::Integrity(format!(
                        "successful build of {}=={} on {} reported zero files",
                        build.package, build.version, build.abi
                    )));
                }
                let row = tx.query_one(
                    "SELECT build_id FROM log_build_success($1, $2, $3, $4, $5, $6)",
                    &[
                        &build.package,
                        &build.version,
                        &build.abi,
                        &build.builder_id,
                        &build.started_at,
                        &(build.duration.as_millis() as i64),
                    ],
                )?;
                let build_id: i64 = row.get(0);
                for file in files {
                    tx.execute(
                        "SELECT add_build_file($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
                        &[
                            &build_id, &file.filename, &(file.size as i64), &file.sha256,
                            &file.tags.package, &file.tags.version, &file.tags.interpreter,
                            &file.tags.abi, &file.tags.platform, &file.requires_python,
                        ],
                    )?;
                }
                for dep in dependencies {
                    tx.execute(
                        "SELECT add_build_dependency($1, $2, $3)",
                        &[&dep.filename, &dependency_tool_tag(dep.tool), &dep.name],
                    )?;
                }
                OracleReply::BuildId(build_id)
            }
            OracleOp::LogBuildFailure { package, version, abi, builder_id, started_at, duration_millis, output } => {
                let row = tx.query_one(
                    "SELECT build_id FROM log_build_failure($1, $2, $3, $4, $5, $6, $7)",
                    &[package, version, abi, builder_id, started_at, duration_millis, output],
                )?;
                OracleReply::BuildId(row.get(0))
            }
            OracleOp::DeleteBuild { build_id } => {
                let row = tx.query_one("SELECT delete_build($1)", &[build_id])?;
                let existed: bool = row.get(0);
                if !existed {
                    return Err(OracleError::NotFound(format!("build {build_id}")));
                }
                OracleReply::Unit
            }
            OracleOp::GetProjectData { package } => {
                let version_rows = tx.query(
                    "SELECT package, version, released_at, skip_reason, yanked FROM get_project_versions($1)",
                    &[package],
                )?;
                let versions = version_rows
                    .iter()
                    .map(|row| Version {
                        package: row.get(0),
                        version: row.get(1),
                        released_at: row.get(2),
                        skip_reason: row.get(3),
                        yanked: row.get(4),
                    })
                    .collect();

                let file_rows = tx.query(
                    "SELECT filename, build_id, size, sha256, package, version, interpreter, abi, platform, requires_python \
                     FROM get_project_files($1)",
                    &[package],
                )?;
                let files = file_rows
                    .iter()
                    .map(|row| BuildFile {
                        filename: row.get(0),
                        build_id: row.get(1),
                        size: row.get::<_, i64>(2) as u64,
                        sha256: row.get(3),
                        tags: hangar_types::FileTags {
                            package: row.get(4),
                            version: row.get(5),
                            interpreter: row.get(6),
                            abi: row.get(7),
                            platform: row.get(8),
                        },
                        requires_python: row.get(9),
                    })
                    .collect();

                OracleReply::Project(ProjectData { package: package.clone(), versions, files })
            }
            OracleOp::SaveRewritesPending { rows } => {
                tx.execute("SELECT clear_rewrites_pending()", &[])?;
                for row in rows {
                    let command = render_command_tag(row.command);
                    tx.execute("SELECT save_rewrite_pending($1, $2, $3)", &[&row.package, &row.added_at, &command])?;
                }
                OracleReply::Unit
            }
            OracleOp::LoadRewritesPending => {
                let rows = tx.query("SELECT package, added_at, command FROM load_rewrites_pending()", &[])?;
                let rewrites = rows
                    .iter()
                    .map(|row| {
                        let command_str: String = row.get(2);
                        RewritePending {
                            package: row.get(0),
                            added_at: row.get(1),
                            command: render_command_from_tag(&command_str),
                        }
                    })
                    .collect();
                OracleReply::Rewrites(rewrites)
            }
            OracleOp::GetStatistics => {
                let row = tx.query_one(
                    "SELECT total_packages, total_versions, total_files, total_builds, disk_usage_bytes \
                     FROM get_statistics()",
                    &[],
                )?;
                OracleReply::Stats(Statistics {
                    total_packages: row.get(0),
                    total_versions: row.get(1),
                    total_files: row.get(2),
                    total_builds: row.get(3),
                    disk_usage_bytes: row.get(4),
                })
            }
            OracleOp::GetConfiguration => {
                let row = tx.query_one("SELECT schema_version, pypi_serial FROM get_configuration()", &[])?;
                OracleReply::Config(Configuration { schema_version: row.get(0), pypi_serial: row.get(1) })
            }
            OracleOp::SetPypiSerial { serial } => {
                let row = tx.query_one("SELECT set_pypi_serial($1)", &[serial])?;
                let applied: bool = row.get(0);
                if !applied {
                    return Err(OracleError::Integrity(format!("pypi_serial would go backwards: rejected {serial}")));
                }
                OracleReply::Unit
            }
        };
        tx.commit()?;
        Ok(reply)
    }
}
