use thiserror::Error;

use crate::gvk::{GroupVersion, GroupVersionKind};

/// Possible errors from negotiation and emission
///
/// Only `CapabilityMatrixEmpty` and the I/O wrappers are fatal to a run;
/// per-object conversion errors are recoverable and the callers degrade to
/// best-effort output plus a [`Diagnostic`](crate::Diagnostic).
#[derive(Error, Debug)]
pub enum Error {
    /// The requested kind is absent from the capability matrix
    #[error("kind {kind} unsupported in target cluster")]
    KindUnsupported {
        /// Kind that had no capability entry
        kind: String,
    },

    /// No direct or pivot-mediated conversion exists between two versions
    #[error("no conversion path from {from} to {to}")]
    NoConversionPath {
        /// Source object tag
        from: GroupVersionKind,
        /// Requested target group/version
        to: GroupVersion,
    },

    /// A semantically undefined cross-kind conversion was requested
    #[error("invalid conversion from {from} to {to}: {reason}")]
    CrossKindConversionInvalid {
        /// Source kind
        from: String,
        /// Target kind
        to: String,
        /// Why the conversion is undefined
        reason: String,
    },

    /// The capability matrix lists no kinds at all
    #[error("capability matrix has no supported kinds; nothing can be emitted")]
    CapabilityMatrixEmpty,

    /// A `"group/version"` string failed to parse
    #[error(transparent)]
    ParseGroupVersion(#[from] crate::gvk::ParseGroupVersionError),

    /// An object body could not be serialized or deserialized
    #[error("failed to serialize object body: {0}")]
    Serde(#[from] serde_json::Error),

    /// A YAML document could not be read or written
    #[error("failed to process yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Filesystem access during emission failed
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
