//! Core domain types shared across every hangar master task.
//!
//! These are plain data types with no I/O: ORACLE reads and writes them,
//! TRANSPORT serializes the wire-facing subset of them, and every other
//! component (ARCH, DRIVER, SCRIBE, ...) passes them between tasks over
//! channels. Kept dependency-free of any single component so it can sit
//! underneath all of them.

pub mod access;
pub mod build;
pub mod builder;
pub mod configuration;
pub mod error;
pub mod package;
pub mod queue;
pub mod render;
pub mod status;

pub use access::{AccessEvent, AccessKind};
pub use build::{Build, BuildAbi, BuildFile, Dependency, DependencyTool, FileTags, PreinstalledDep};
pub use builder::{BuilderCaps, BuilderStats, FileInfo};
pub use configuration::Configuration;
pub use error::ErrorKind;
pub use package::{Package, PackageAlias, Version};
pub use queue::{PendingQueueRow, PendingQueueSnapshot};
pub use render::{RenderCommand, RewritePending};
pub use status::FarmStatus;

/// The reserved ABI tag meaning "compatible with every ABI". Never a valid
/// `BuildAbi` identifier, but a valid `FileTags::abi` value.
pub const NONE_ABI: &str = "none";
