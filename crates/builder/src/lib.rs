#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]
//! Build pipeline for avbuild
//!
//! This crate turns a subject node of an open scene document into a
//! platform bundle: validation, workspace snapshot, compile steps,
//! sanitization, prefab serialization and packaging, with rollback on any
//! failure.

pub mod coordinator;
pub mod naming;
pub mod packaging;
pub mod prerequisites;
pub mod request;
pub mod sanitize;
pub mod steps;

pub use coordinator::BuildCoordinator;
pub use naming::{sanitize_scene_name, ArtifactNamer};
pub use packaging::{
    backend_by_name, backends_from_names, ArchiveBackend, Artifact, BundleJob, BundleManifest,
    ManifestEntry, Packager, PackagingBackend, ZipBackend, PREFAB_FILE, PRIMARY_ADDRESS,
};
pub use prerequisites::{
    resolve_subject, HostEnvironment, PrerequisiteValidator, Rejection, StaticHost, Validated,
};
pub use request::{BuildRequest, BuildSettings, BundleOptions, SubjectRef};
pub use sanitize::{GraphSanitizer, Offender, SanitizeReport};
pub use steps::StepRunner;

// Re-exported so callers do not need a direct tokio-util dependency
pub use tokio_util::sync::CancellationToken;
