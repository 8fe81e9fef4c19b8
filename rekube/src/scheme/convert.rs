//! Version selection and conversion against a capability matrix.
//!
//! Selection is best-effort throughout: a failed conversion is recoverable
//! and the caller keeps the original object, so a run always produces an
//! artifact set. Only hop mechanics return hard errors, and those stay
//! inside this module's retry loops.
use tracing::{debug, warn};

use rekube_core::{
    ClusterMetadataSpec, Diagnostic, DynamicObject, Error, GroupVersion, Result, INTERNAL_VERSION,
};

use super::{groups, Scheme, KNATIVE_SERVING_GROUP};

/// Negotiate the best group/version the target cluster supports
///
/// Walks the capability matrix entry for the object's kind in precedence
/// order and returns the first version a conversion path exists for. When
/// nothing in the entry converts (or the kind has no entry), falls back to
/// preferred-version mode, and finally to returning the object unchanged
/// with a [`Diagnostic::VersionNotFound`].
pub fn convert_to_supported_version(
    scheme: &Scheme,
    obj: &DynamicObject,
    cluster: &ClusterMetadataSpec,
) -> (DynamicObject, Vec<Diagnostic>) {
    let mut diags = Vec::new();
    let gvk = obj.gvk();
    debug!(kind = %gvk.kind, "converting to a supported version");

    // serverless add-on resources are self-consistent and never downgraded
    if gvk.kind == "Service" && gvk.group == KNATIVE_SERVING_GROUP {
        return (obj.clone(), diags);
    }

    if let Some(versions) = cluster.supported_versions(&gvk.kind) {
        for gv in groups::prioritize(versions) {
            if gvk.kind == "Service" && gv.group == KNATIVE_SERVING_GROUP {
                continue;
            }
            match convert_to_version(scheme, obj, &gv) {
                Ok(newobj) => return (newobj, diags),
                Err(err) => debug!(%err, target = %gv, "supported version did not convert"),
            }
        }
    } else {
        debug!(kind = %gvk.kind, "kind unsupported in target cluster");
    }

    match convert_to_preferred_version(scheme, obj, cluster) {
        Ok(newobj) => (newobj, diags),
        Err(err) => {
            warn!(%err, kind = %gvk.kind, "could not find a version to convert to; keeping original");
            diags.push(Diagnostic::VersionNotFound {
                kind: gvk.kind.clone(),
                group_version: gvk.group_version().api_version(),
            });
            (obj.clone(), diags)
        }
    }
}

/// Convert to the highest-priority version of any group the cluster or the
/// object itself knows the kind under
///
/// The candidate groups come from the capability matrix entry for the kind
/// merged with the object's own group; each group's registered versions
/// are tried descending.
pub fn convert_to_preferred_version(
    scheme: &Scheme,
    obj: &DynamicObject,
    cluster: &ClusterMetadataSpec,
) -> Result<DynamicObject> {
    let gvk = obj.gvk();
    debug!(kind = %gvk.kind, "converting to a preferred version");
    let mut candidate_groups: Vec<String> = Vec::new();
    if let Some(versions) = cluster.api_kind_version_map.get(&gvk.kind) {
        for gv in versions {
            match gv.parse::<GroupVersion>() {
                Ok(gv) => {
                    if !candidate_groups.contains(&gv.group) {
                        candidate_groups.push(gv.group);
                    }
                }
                Err(err) => debug!(%err, "skipping malformed group version"),
            }
        }
    }
    if !candidate_groups.contains(&gvk.group) {
        candidate_groups.push(gvk.group.clone());
    }
    for group in &candidate_groups {
        for gv in scheme.prioritized_versions_for_group(group) {
            match convert_to_version(scheme, obj, &gv) {
                Ok(newobj) => return Ok(newobj),
                Err(err) => debug!(%err, target = %gv, "preferred version did not convert"),
            }
        }
    }
    Err(Error::NoConversionPath {
        from: gvk,
        to: obj.group_version(),
    })
}

/// Convert an object to an exact group/version
///
/// Identity first, then a direct registered conversion, then the pivot
/// bridge across every family sharing the kind name: a best-effort hop to
/// the source group's internal version, a hop into the family pivot, and a
/// hop from the pivot to the target. Any hop failure abandons that family,
/// not the negotiation; the returned error is always recoverable.
pub fn convert_to_version(
    scheme: &Scheme,
    obj: &DynamicObject,
    target: &GroupVersion,
) -> Result<DynamicObject> {
    let src = obj.group_version();
    debug!(from = %src, to = %target, kind = obj.kind(), "attempting conversion");
    match check_and_convert(scheme, obj, target) {
        Ok(newobj) => return Ok(newobj),
        Err(err) => debug!(%err, "no direct conversion"),
    }
    for family in scheme.families(obj.kind()) {
        let mut bridged = obj.clone();
        if src.group != target.group {
            let igv = GroupVersion::gv(&src.group, INTERNAL_VERSION);
            match check_and_convert(scheme, &bridged, &igv) {
                Ok(newobj) => bridged = newobj,
                // best effort; continue from the original representation
                Err(err) => debug!(%err, "could not reach the source group's internal version"),
            }
        }
        let pivoted = match check_and_convert(scheme, &bridged, &family.pivot) {
            Ok(newobj) => newobj,
            Err(err) => {
                debug!(%err, pivot = %family.pivot, "could not reach the family pivot");
                continue;
            }
        };
        match check_and_convert(scheme, &pivoted, target) {
            Ok(newobj) => return Ok(newobj),
            Err(err) => debug!(%err, pivot = %family.pivot, "pivot did not convert to target"),
        }
    }
    Err(Error::NoConversionPath {
        from: obj.gvk(),
        to: target.clone(),
    })
}

/// One conversion hop: identity, or a registered direct function plus retag
fn check_and_convert(
    scheme: &Scheme,
    obj: &DynamicObject,
    target: &GroupVersion,
) -> Result<DynamicObject> {
    if obj.group_version() == *target {
        return Ok(obj.clone());
    }
    let convert = scheme
        .converter(&obj.gvk(), target)
        .ok_or_else(|| Error::NoConversionPath {
            from: obj.gvk(),
            to: target.clone(),
        })?;
    let body = convert(obj.data.clone())?;
    let mut newobj = obj.clone();
    newobj.data = body;
    newobj.retag(target);
    Ok(newobj)
}
