//! imagebuilder-lib: application type and instance builder
//!
//! This crate turns declarative application types into versioned,
//! validated application instances:
//! - `InstanceAssembler`: fetch, resolve, build, validate and persist an instance
//! - `ArtifactStore`: the keyed document store everything is read from and written to
//! - `Canonical`: order normalization so equal trees serialize identically
//! - `ValidatorRegistry`: type-level and instance-level manifest rules
//! - `upgrade_cluster`: decides whether a cluster upgrade only changes configuration

pub mod assemble;
pub mod canonical;
pub mod config;
pub mod consts;
pub mod context;
pub mod deadline;
pub mod error;
pub mod manifest;
pub mod params;
pub mod progress;
pub mod store;
pub mod upgrade;
pub mod util;
pub mod validate;
pub mod version;

pub use assemble::{AssembleError, InstanceAssembler};
pub use deadline::Deadline;
pub use error::ErrorKind;
