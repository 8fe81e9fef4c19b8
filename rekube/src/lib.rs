//! Resource compatibility and version negotiation for migrated manifests.
//!
//! Given an intermediate application model (or already-parsed manifests)
//! and a previously collected capability matrix describing what a target
//! cluster supports, this crate decides which concrete resource kind to
//! emit for each workload, converts objects between equivalent kinds while
//! preserving semantics, and negotiates the API group/version each object
//! is serialized at, degrading to best-effort output with structured
//! diagnostics rather than failing a run.
//!
//! The negotiation registry ([`Scheme`]) is built once and read-only
//! thereafter; every conversion call is a pure function of its inputs, so
//! resources can be processed in parallel without coordination.
//!
//! ```
//! use rekube::{Scheme, core::ClusterMetadata};
//! use rekube::scheme::convert::convert_to_supported_version;
//!
//! let scheme = Scheme::default_scheme();
//! let cluster = ClusterMetadata::kubernetes();
//! # let obj = rekube::core::DynamicObject::new(
//! #     "web",
//! #     &rekube::core::GroupVersion::gv("apps", "v1").with_kind("Deployment"),
//! # );
//! let (negotiated, warnings) = convert_to_supported_version(&scheme, &obj, &cluster.spec);
//! assert_eq!(negotiated.types.api_version, "apps/v1");
//! assert!(warnings.is_empty());
//! ```

pub use rekube_core as core;

pub mod scheme;
pub use scheme::{Scheme, SchemeBuilder};

pub mod ir;
pub use ir::EnhancedIr;

pub mod apiresource;
pub use apiresource::{ApiResource, ApiResourceKind};

pub mod fixer;

pub mod emit;
pub use emit::{transform_ir_and_persist, transform_objects_and_persist};

pub use rekube_core::{Diagnostic, DynamicObject, Error, Result};
