use std::{
    cmp::Ordering, convert::Infallible, fmt::Display, ops::Deref, str::FromStr, sync::LazyLock,
};

use regex::Regex;

/// Separates the versions listed in a contract label value.
pub const VERSION_SEPARATOR: char = '_';

static KUBE_VERSION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^v(?P<major>\d+)(?:(?P<maturity>alpha|beta)(?P<minor>\d+))?$")
        .expect("failed to compile kube-aware version regex")
});

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
enum Maturity {
    Alpha,
    Beta,
    Stable,
}

// Field order matters: the derived Ord compares maturity first, then major and
// minor.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
struct Conformant {
    maturity: Maturity,
    major: u64,
    minor: u64,
}

impl Conformant {
    fn parse(input: &str) -> Option<Self> {
        let captures = KUBE_VERSION_REGEX.captures(input)?;
        let major = captures.name("major")?.as_str().parse().ok()?;

        let (maturity, minor) = match captures.name("maturity").as_ref().map(regex::Match::as_str) {
            Some("alpha") => (Maturity::Alpha, captures.name("minor")?.as_str().parse().ok()?),
            Some("beta") => (Maturity::Beta, captures.name("minor")?.as_str().parse().ok()?),
            Some(_) => return None,
            None => (Maturity::Stable, 0),
        };

        Some(Self {
            maturity,
            major,
            minor,
        })
    }
}

/// A Kubernetes API version string, ordered the way the API server orders
/// versions of a resource.
///
/// Versions following the `v<MAJOR>(alpha|beta<MINOR>)` format are
/// *conformant*. Any string is accepted though, as CRDs can use arbitrary
/// version names. The ordering is:
///
/// - GA versions are greater than beta versions, which are greater than alpha
///   versions, regardless of their major versions (`v1 > v2beta1`).
/// - Versions of the same maturity are compared by major and then by minor
///   version.
/// - Every conformant version is greater than every non-conformant one.
/// - Non-conformant versions are compared in reverse lexicographic order
///   (`foo1 > foo10`).
///
/// ```
/// use crd_conversion::KubeAwareVersion;
///
/// let mut versions: Vec<KubeAwareVersion> = [
///     "v10beta3", "v2", "foo10", "v1", "v3beta1", "v11alpha2", "foo1",
/// ]
/// .into_iter()
/// .map(KubeAwareVersion::from)
/// .collect();
/// versions.sort();
/// versions.reverse();
///
/// let versions: Vec<&str> = versions.iter().map(KubeAwareVersion::as_str).collect();
/// assert_eq!(versions, ["v2", "v1", "v10beta3", "v3beta1", "v11alpha2", "foo1", "foo10"]);
/// ```
///
/// The original spelling is retained and returned by [`as_str`](Self::as_str)
/// and the [`Display`] implementation.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct KubeAwareVersion {
    raw: String,
    conformant: Option<Conformant>,
}

impl KubeAwareVersion {
    pub fn new(version: impl Into<String>) -> Self {
        let raw = version.into();
        let conformant = Conformant::parse(&raw);

        Self { raw, conformant }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns `true` if the version follows the `v<MAJOR>(alpha|beta<MINOR>)`
    /// format.
    pub fn is_conformant(&self) -> bool {
        self.conformant.is_some()
    }
}

impl FromStr for KubeAwareVersion {
    type Err = Infallible;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(input))
    }
}

impl From<&str> for KubeAwareVersion {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for KubeAwareVersion {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl PartialEq<str> for KubeAwareVersion {
    fn eq(&self, other: &str) -> bool {
        self.raw == other
    }
}

impl PartialOrd for KubeAwareVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KubeAwareVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let ordering = match (&self.conformant, &other.conformant) {
            (Some(lhs), Some(rhs)) => lhs.cmp(rhs),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => other.raw.cmp(&self.raw),
        };

        // Different spellings of the same version (v1 and v01) must not be
        // equal, otherwise Ord would disagree with Eq.
        ordering.then_with(|| self.raw.cmp(&other.raw))
    }
}

impl Display for KubeAwareVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// A list of [`KubeAwareVersion`]s, usually parsed from the value of a
/// contract label like `v1alpha4_v1beta1`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KubeAwareVersions(Vec<KubeAwareVersion>);

impl KubeAwareVersions {
    /// Splits a contract label value on [`VERSION_SEPARATOR`].
    pub fn from_label_value(value: &str) -> Self {
        Self(value.split(VERSION_SEPARATOR).map(KubeAwareVersion::from).collect())
    }

    /// Sorts the versions in ascending order, the latest version comes last.
    pub fn sort(&mut self) {
        self.0.sort();
    }

    /// Returns the greatest version of the list, if any.
    pub fn latest(&self) -> Option<&KubeAwareVersion> {
        self.0.iter().max()
    }

    pub fn into_inner(self) -> Vec<KubeAwareVersion> {
        self.0
    }
}

impl FromStr for KubeAwareVersions {
    type Err = Infallible;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_label_value(input))
    }
}

impl FromIterator<KubeAwareVersion> for KubeAwareVersions {
    fn from_iter<I: IntoIterator<Item = KubeAwareVersion>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Deref for KubeAwareVersions {
    type Target = [KubeAwareVersion];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for KubeAwareVersions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (index, version) in self.0.iter().enumerate() {
            if index > 0 {
                write!(f, "{VERSION_SEPARATOR}")?;
            }
            write!(f, "{version}")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("v2", "v1", Ordering::Greater)]
    #[case("v1", "v1beta1", Ordering::Greater)]
    #[case("v1", "v2beta1", Ordering::Greater)]
    #[case("v1beta1", "v1alpha1", Ordering::Greater)]
    #[case("v1alpha1", "v2alpha1", Ordering::Less)]
    #[case("v1beta2", "v1beta10", Ordering::Less)]
    #[case("v1alpha1", "v1alpha1", Ordering::Equal)]
    #[case("v1alpha1", "foo1", Ordering::Greater)]
    #[case("foo1", "foo10", Ordering::Greater)]
    #[case("v1alpha", "v1alpha1", Ordering::Less)]
    #[case("v01", "v1", Ordering::Less)]
    fn ordering(#[case] input: &str, #[case] other: &str, #[case] expected: Ordering) {
        let input = KubeAwareVersion::new(input);
        let other = KubeAwareVersion::new(other);

        assert_eq!(input.cmp(&other), expected);
        assert_eq!(other.cmp(&input), expected.reverse());
    }

    #[rstest]
    #[case("v1", true)]
    #[case("v12beta3", true)]
    #[case("v1alpha", false)]
    #[case("v1gamma1", false)]
    #[case("1beta1", false)]
    #[case("v99999999999999999999999", false)]
    #[case("", false)]
    fn conformance(#[case] input: &str, #[case] expected: bool) {
        assert_eq!(KubeAwareVersion::new(input).is_conformant(), expected);
    }

    #[rstest]
    #[case("v1_v1beta1_v2", "v2")]
    #[case("v2_v1beta1_v1", "v2")]
    #[case("v1beta1_v2_v1", "v2")]
    #[case("v1alpha1_v1beta1_v1", "v1")]
    #[case("v1alpha4", "v1alpha4")]
    #[case("v1alpha3_v1alpha4", "v1alpha4")]
    #[case("v1_custom", "v1")]
    fn latest_from_label_value(#[case] value: &str, #[case] expected: &str) {
        let versions = KubeAwareVersions::from_label_value(value);
        let latest = versions.latest().expect("label value must contain versions");

        assert_eq!(latest, expected);
    }

    #[test]
    fn sort_ascending() {
        let mut versions = KubeAwareVersions::from_label_value("v1_foo_v1alpha2_v2beta1_v1beta3");
        versions.sort();

        assert_eq!(versions.to_string(), "foo_v1alpha2_v1beta3_v2beta1_v1");
        assert_eq!(versions.last(), versions.latest());
    }
}
