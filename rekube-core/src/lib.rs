//! Crate with the types shared by every stage of cluster-aware resource
//! version negotiation.
//!
//! This crate is client-less: everything here operates on previously
//! collected, in-memory data (a cluster capability matrix and type-erased
//! resource objects). The negotiation engine itself lives in `rekube`.

pub mod gvk;
pub use gvk::{GroupVersion, GroupVersionKind, ParseGroupVersionError};

pub mod version;
pub use version::Version;

pub mod metadata;
pub use metadata::{ObjectMeta, TypeMeta};

pub mod dynamic;
pub use dynamic::DynamicObject;

pub mod cluster;
pub use cluster::{ClusterMetadata, ClusterMetadataSpec};

mod error;
pub use error::Error;

pub mod diagnostics;
pub use diagnostics::Diagnostic;

/// Convenient alias for `Result<T, Error>`
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The reserved version string for internal (pivot) representations.
///
/// Objects tagged with this version only ever exist as conversion
/// intermediates and are never serialized into output manifests.
pub const INTERNAL_VERSION: &str = "__internal";
