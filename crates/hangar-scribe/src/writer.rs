use std::path::PathBuf;

use hangar_oracle::{OracleClient, OracleOp, OracleReply, ProjectData, Statistics};
use hangar_types::{Package, RenderCommand};

use crate::atomic::write_atomic;
use crate::error::ScribeError;
use crate::render;

/// Filesystem layout under the configured output path:
/// `simple/index.html`, `simple/<package>/index.html`,
/// `project/<package>/index.html`, `project/<package>/json`,
/// `index.html`, `packages.json`.
pub struct Scribe {
    oracle: OracleClient,
    output_dir: PathBuf,
}

impl Scribe {
    pub fn new(oracle: OracleClient, output_dir: PathBuf) -> Self {
        Scribe { oracle, output_dir }
    }

    fn list_packages(&self) -> Result<Vec<Package>, ScribeError> {
        match self.oracle.submit(OracleOp::ListPackages)? {
            OracleReply::Packages(packages) => Ok(packages),
            _ => Err(ScribeError::UnexpectedReply),
        }
    }

    fn project_data(&self, package: &str) -> Result<ProjectData, ScribeError> {
        match self.oracle.submit(OracleOp::GetProjectData { package: package.to_string() })? {
            OracleReply::Project(data) => Ok(data),
            _ => Err(ScribeError::UnexpectedReply),
        }
    }

    fn statistics(&self) -> Result<Statistics, ScribeError> {
        match self.oracle.submit(OracleOp::GetStatistics)? {
            OracleReply::Stats(stats) => Ok(stats),
            _ => Err(ScribeError::UnexpectedReply),
        }
    }

    /// Home page and the simple-index root both just need the full package
    /// list, so a `Home` render regenerates both in one pass.
    pub fn render_home(&self) -> Result<(), ScribeError> {
        let packages = self.list_packages()?;
        let stats = self.statistics()?;
        write_atomic(&self.output_dir.join("index.html"), &render::home_page(&packages, &stats))?;
        write_atomic(&self.output_dir.join("simple").join("index.html"), &render::simple_index_root(&packages))?;
        Ok(())
    }

    pub fn render_search(&self) -> Result<(), ScribeError> {
        let packages = self.list_packages()?;
        write_atomic(&self.output_dir.join("packages.json"), &render::search_index(&packages))
    }

    /// `Project`: just the project page and its JSON API sibling.
    pub fn render_project(&self, package: &str) -> Result<(), ScribeError> {
        let data = self.project_data(package)?;
        write_atomic(&self.output_dir.join("project").join(package).join("index.html"), &render::project_page(&data))?;
        write_atomic(&self.output_dir.join("project").join(package).join("json"), &render::json_api(&data))?;
        Ok(())
    }

    /// `Both`: the project page plus the package's own simple-index page.
    pub fn render_both(&self, package: &str) -> Result<(), ScribeError> {
        let data = self.project_data(package)?;
        write_atomic(&self.output_dir.join("project").join(package).join("index.html"), &render::project_page(&data))?;
        write_atomic(&self.output_dir.join("project").join(package).join("json"), &render::json_api(&data))?;
        write_atomic(&self.output_dir.join("simple").join(package).join("index.html"), &render::simple_index_package(package, &data))?;
        Ok(())
    }

    pub fn render(&self, package: &str, command: RenderCommand) -> Result<(), ScribeError> {
        match command {
            RenderCommand::Home => self.render_home(),
            RenderCommand::Search => self.render_search(),
            RenderCommand::Project => self.render_project(package),
            RenderCommand::Both => self.render_both(package),
        }
    }
}
