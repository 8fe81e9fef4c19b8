//! Priority ordering for the version half of capability-matrix entries.
use std::cmp::Ordering;

/// Parsed form of a Kubernetes API version string
///
/// Ordering follows [Kubernetes version priority](https://kubernetes.io/docs/tasks/extend-kubernetes/custom-resources/custom-resource-definition-versioning/#version-priority):
/// GA releases outrank betas, betas outrank alphas, and higher numbers win
/// within a class. Sorting a matrix entry's versions descending therefore
/// puts the most desirable negotiation target first:
///
/// ```
/// use rekube_core::Version;
/// use std::cmp::Reverse;
/// let mut entry = vec!["v1alpha1", "v1", "v2beta2", "v1beta1", "v2"];
/// entry.sort_by_cached_key(|v| Reverse(Version::parse(v)));
/// assert_eq!(entry, vec!["v2", "v1", "v2beta2", "v1beta1", "v1alpha1"]);
/// ```
///
/// Matrices are often hand-written, so strings outside the
/// `v<major>[alpha|beta<minor>]` shape are accepted too: they rank below
/// everything conformant and among themselves alphabetically, keeping the
/// selector deterministic for arbitrary custom-resource versions.
#[derive(PartialEq, Eq, Debug, Clone)]
pub enum Version {
    /// A major/GA release
    Stable(u32),
    /// A beta release for a specific major version
    Beta(u32, Option<u32>),
    /// An alpha release for a specific major version
    Alpha(u32, Option<u32>),
    /// A version string outside the Kubernetes naming scheme
    Nonconformant(String),
}

impl Version {
    /// Parse a version string; never fails
    ///
    /// ```
    /// use rekube_core::Version;
    /// assert_eq!(Version::parse("v1beta3"), Version::Beta(1, Some(3)));
    /// ```
    pub fn parse(v: &str) -> Version {
        Self::parse_conformant(v).unwrap_or_else(|| Version::Nonconformant(v.to_string()))
    }

    fn parse_conformant(v: &str) -> Option<Version> {
        let rest = v.strip_prefix('v')?;
        let digits = rest.chars().take_while(char::is_ascii_digit).count();
        let major: u32 = rest.get(..digits)?.parse().ok()?;
        let tail = &rest[digits..];
        if tail.is_empty() {
            return Some(Version::Stable(major));
        }
        let (build, minor) = if let Some(m) = tail.strip_prefix("alpha") {
            (Version::Alpha as fn(u32, Option<u32>) -> Version, m)
        } else if let Some(m) = tail.strip_prefix("beta") {
            (Version::Beta as fn(u32, Option<u32>) -> Version, m)
        } else {
            return None;
        };
        if minor.is_empty() {
            Some(build(major, None))
        } else {
            Some(build(major, Some(minor.parse().ok()?)))
        }
    }

    fn rank(&self) -> (u8, u32, Option<u32>) {
        match self {
            Version::Stable(major) => (3, *major, None),
            Version::Beta(major, minor) => (2, *major, *minor),
            Version::Alpha(major, minor) => (1, *major, *minor),
            Version::Nonconformant(_) => (0, 0, None),
        }
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            // reversed so that sorting descending yields alphabetical order
            (Version::Nonconformant(a), Version::Nonconformant(b)) => b.cmp(a),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::Version;
    use std::cmp::Reverse;

    fn prioritize(mut entry: Vec<&str>) -> Vec<&str> {
        entry.sort_by_cached_key(|v| Reverse(Version::parse(v)));
        entry
    }

    #[test]
    fn conformant_strings_parse_by_shape() {
        assert_eq!(Version::parse("v1"), Version::Stable(1));
        assert_eq!(Version::parse("v10"), Version::Stable(10));
        assert_eq!(Version::parse("v1beta"), Version::Beta(1, None));
        assert_eq!(Version::parse("v2alpha1"), Version::Alpha(2, Some(1)));
        assert_eq!(Version::parse("v10beta12"), Version::Beta(10, Some(12)));
    }

    #[test]
    fn anything_else_is_nonconformant() {
        for odd in ["", "foo", "v", "v-1", "vbeta3", "vv1", "v1beta1x", "v1gamma2"] {
            assert_eq!(Version::parse(odd), Version::Nonconformant(odd.to_string()));
        }
    }

    #[test]
    fn class_dominates_major_number() {
        assert!(Version::parse("v2") > Version::parse("v1"));
        assert!(Version::parse("v1") > Version::parse("v2beta2"));
        assert!(Version::parse("v1beta1") > Version::parse("v2alpha3"));
        assert!(Version::parse("v1alpha1") > Version::parse("crd-v3"));
    }

    #[test]
    fn minor_numbers_break_ties_within_a_class() {
        assert!(Version::parse("v1beta2") > Version::parse("v1beta1"));
        assert!(Version::parse("v1beta1") > Version::parse("v1beta"));
        assert!(Version::parse("v2alpha1") > Version::parse("v1alpha2"));
    }

    #[test]
    fn a_mixed_matrix_entry_sorts_to_negotiation_order() {
        assert_eq!(
            prioritize(vec!["v1beta1", "prod", "v1", "v2alpha1", "dev", "v1beta2"]),
            vec!["v1", "v1beta2", "v1beta1", "v2alpha1", "dev", "prod"]
        );
    }
}
