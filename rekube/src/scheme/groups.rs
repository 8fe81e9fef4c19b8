//! Fixed precedence ordering of API groups.
//!
//! When a capability matrix entry is not already priority-ordered, the
//! selector ranks it: infrastructure-domain groups first, then `apps`,
//! `policy`, `extensions`, platform-specific groups, other named groups,
//! and finally the core (empty) group. Within one group, versions are
//! ordered descending by Kubernetes version priority. New groups always
//! land in the other-named-groups band; the table itself is a source
//! change.
use std::cmp::Reverse;

use rekube_core::{GroupVersion, Version};

/// Precedence band of an API group; lower ranks are preferred
pub fn group_rank(group: &str) -> u8 {
    if group.len() > ".k8s.io".len() && group.ends_with(".k8s.io") {
        0
    } else if group == "apps" {
        1
    } else if group == "policy" {
        2
    } else if group == "extensions" {
        3
    } else if group.len() > ".openshift.io".len() && group.ends_with(".openshift.io") {
        4
    } else if !group.is_empty() {
        5
    } else {
        6
    }
}

/// Order a capability matrix entry by group precedence and version priority
///
/// Unparseable entries are dropped with a debug log, matching the
/// collector's tolerance for malformed profile data. The sort is stable,
/// so hand-ordered profiles keep their relative order within equal ranks.
pub fn prioritize(group_versions: &[String]) -> Vec<GroupVersion> {
    let mut gvs: Vec<GroupVersion> = group_versions
        .iter()
        .filter_map(|gv| match gv.parse::<GroupVersion>() {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                tracing::debug!(%err, "skipping malformed group version in capability matrix");
                None
            }
        })
        .collect();
    gvs.sort_by_cached_key(|gv| {
        (
            group_rank(&gv.group),
            gv.group.clone(),
            Reverse(Version::parse(&gv.version)),
        )
    });
    gvs
}
