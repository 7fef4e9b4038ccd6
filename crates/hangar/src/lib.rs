//! # Hangar
//!
//! The control plane for a distributed binary-artifact build farm: a
//! coordinator that watches an upstream package index, plans a pending-build
//! queue, dispatches builds to remote builders over a length-prefixed wire
//! protocol, ingests the resulting artifacts, and publishes a static
//! simple-index website.
//!
//! This crate is a thin facade over the workspace's component crates; the
//! `hangar-master` binary (in `hangar-cli`) wires them together into a
//! running daemon. Embedders who want programmatic access to one component
//! (e.g. just the queue-planning logic for a test harness) can depend on the
//! `hangar-*` crate directly instead.
//!
//! ## Components
//!
//! - [`oracle`] — pooled Postgres access behind a load-balanced worker pool
//! - [`gazer`] — upstream package-index watcher
//! - [`arch`] — pending-build queue planner
//! - [`driver`] — builder-protocol coordinator
//! - [`juggler`] — pipelined file transfer and verification
//! - [`chase`] — local admin/import endpoint
//! - [`scribe`] — static page rendering and render-request debouncing
//! - [`bigbro`] — periodic statistics collection
//! - [`supervisor`] — pause/resume/kill control and status broadcast
//! - [`transport`] — the wire protocol substrate every component speaks
//! - [`config`] — `hangar.toml` loading and merging
//! - [`types`] — shared domain types crossing component boundaries

pub use hangar_config as config;
pub use hangar_oracle as oracle;
pub use hangar_schema as schema;
pub use hangar_transport as transport;
pub use hangar_types as types;

pub use hangar_arch as arch;
pub use hangar_bigbro as bigbro;
pub use hangar_chase as chase;
pub use hangar_driver as driver;
pub use hangar_gazer as gazer;
pub use hangar_juggler as juggler;
pub use hangar_scribe as scribe;
pub use hangar_supervisor as supervisor;
