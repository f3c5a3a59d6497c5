//! Typed manifest documents.
//!
//! These are the documents the builder reads from and writes to an
//! [`ArtifactStore`](crate::store::ArtifactStore):
//!
//! - `ApplicationManifest` / `ServiceManifest`: the declarative type definition
//! - `ApplicationInstance` / `ApplicationPackage` / `ServicePackage`: the
//!   generated, versioned instance documents
//! - `ClusterManifest`: the cluster settings compared during upgrade
//!
//! Attributes that may carry a parameter token (`[Name]`) are kept as
//! strings; typed interpretation happens in [`crate::validate`].

mod application;
mod cluster;
mod diagnostics;
mod instance;
mod principals;
mod service;

pub use application::*;
pub use cluster::*;
pub use diagnostics::*;
pub use instance::*;
pub use principals::*;
pub use service::*;
