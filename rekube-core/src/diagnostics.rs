//! Structured warnings surfaced alongside best-effort output.
//!
//! The engine never aborts a run for a single resource: every degradation
//! decision is captured as a [`Diagnostic`] the caller can surface or
//! ignore, instead of being an opaque log line.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::gvk::{GroupVersion, GroupVersionKind};

/// A non-fatal degradation decision made during negotiation
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum Diagnostic {
    /// A kind had to be substituted (or kept despite being unsupported)
    KindDegraded {
        /// The kind that was requested
        kind: String,
        /// The kind emitted instead; equals `kind` when the object was
        /// emitted anyway because no legal substitute exists
        fallback: String,
    },
    /// No supported or preferred version converted; original kept
    VersionNotFound {
        /// The object's kind
        kind: String,
        /// The group/version the object was left at
        group_version: String,
    },
    /// A conversion hop failed; the source object was kept
    ConversionFailed {
        /// Source tag
        from: GroupVersionKind,
        /// Requested target
        to: GroupVersion,
    },
    /// A cross-kind conversion was semantically undefined and skipped
    InvalidKindConversion {
        /// Source kind
        from: String,
        /// Target kind
        to: String,
        /// Why the conversion is undefined
        reason: String,
    },
    /// A fallback value was substituted for missing data
    DefaultSubstituted {
        /// The object or field affected
        subject: String,
        /// The substituted value
        value: String,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::KindDegraded { kind, fallback } if kind == fallback => {
                write!(f, "kind {kind} is not supported by the target cluster; emitting it anyway")
            }
            Diagnostic::KindDegraded { kind, fallback } => {
                write!(f, "kind {kind} is not supported by the target cluster; emitting {fallback} instead")
            }
            Diagnostic::VersionNotFound { kind, group_version } => {
                write!(f, "could not find a supported version for {kind}; kept at {group_version}")
            }
            Diagnostic::ConversionFailed { from, to } => {
                write!(f, "could not convert {from} to {to}; kept the original object")
            }
            Diagnostic::InvalidKindConversion { from, to, reason } => {
                write!(f, "conversion from {from} to {to} skipped: {reason}")
            }
            Diagnostic::DefaultSubstituted { subject, value } => {
                write!(f, "substituted default {value} for {subject}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Diagnostic;

    #[test]
    fn degradation_messages() {
        let kept = Diagnostic::KindDegraded {
            kind: "DaemonSet".into(),
            fallback: "DaemonSet".into(),
        };
        assert!(kept.to_string().contains("emitting it anyway"));

        let swapped = Diagnostic::KindDegraded {
            kind: "Deployment".into(),
            fallback: "ReplicationController".into(),
        };
        assert!(swapped.to_string().contains("ReplicationController instead"));
    }
}
