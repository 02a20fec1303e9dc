//! Semantic version parsing and ordering.
//!
//! Accepts `[v]MAJOR.MINOR.PATCH[-PRERELEASE][+METADATA]`. Ordering follows
//! the numeric triple, with a prerelease sorting below its stable release.
//! Two distinct prerelease strings compare by plain lexicographic order, not
//! semver 2.0.0 dot-segment precedence; build metadata never participates.

use std::cmp::Ordering;
use std::fmt;

use crate::error::UpdateError;

/// A parsed semantic version. Immutable after parsing.
#[derive(Debug, Clone, Default)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub prerelease: String,
    pub build_metadata: String,
}

impl Version {
    /// Parse a version string, tolerating one leading `v`.
    pub fn parse(text: &str) -> Result<Self, UpdateError> {
        let trimmed = text.trim();
        let stripped = trimmed.strip_prefix('v').unwrap_or(trimmed);
        if stripped.is_empty() {
            return Err(UpdateError::parse(text, "empty version string"));
        }

        let (rest, build_metadata) = match stripped.split_once('+') {
            Some((head, meta)) => (head, meta.to_string()),
            None => (stripped, String::new()),
        };
        let (core, prerelease) = match rest.split_once('-') {
            Some((head, pre)) => (head, pre.to_string()),
            None => (rest, String::new()),
        };

        let parts: Vec<&str> = core.split('.').collect();
        if parts.len() != 3 {
            return Err(UpdateError::parse(
                text,
                format!(
                    "expected MAJOR.MINOR.PATCH, found {} component(s) in {:?}",
                    parts.len(),
                    core
                ),
            ));
        }

        Ok(Version {
            major: parse_component(text, parts[0], "major")?,
            minor: parse_component(text, parts[1], "minor")?,
            patch: parse_component(text, parts[2], "patch")?,
            prerelease,
            build_metadata,
        })
    }

    pub fn is_prerelease(&self) -> bool {
        !self.prerelease.is_empty()
    }

    pub fn is_newer_than(&self, other: &Version) -> bool {
        self.cmp(other) == Ordering::Greater
    }

    pub fn is_older_than(&self, other: &Version) -> bool {
        self.cmp(other) == Ordering::Less
    }
}

fn parse_component(input: &str, segment: &str, name: &str) -> Result<u64, UpdateError> {
    segment.parse::<u64>().map_err(|_| {
        UpdateError::parse(
            input,
            format!("{} component {:?} is not a non-negative integer", name, segment),
        )
    })
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| {
                match (self.prerelease.is_empty(), other.prerelease.is_empty()) {
                    (true, true) => Ordering::Equal,
                    // A stable release outranks its prereleases.
                    (true, false) => Ordering::Greater,
                    (false, true) => Ordering::Less,
                    (false, false) => self.prerelease.cmp(&other.prerelease),
                }
            })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if !self.prerelease.is_empty() {
            write!(f, "-{}", self.prerelease)?;
        }
        if !self.build_metadata.is_empty() {
            write!(f, "+{}", self.build_metadata)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_version() {
        let v = Version::parse("1.2.3-beta.1+build.42").unwrap();
        assert_eq!(v.major, 1);
        assert_eq!(v.minor, 2);
        assert_eq!(v.patch, 3);
        assert_eq!(v.prerelease, "beta.1");
        assert_eq!(v.build_metadata, "build.42");
    }

    #[test]
    fn strips_leading_v() {
        let v = Version::parse("v3.9.1").unwrap();
        assert_eq!(v.to_string(), "3.9.1");
    }

    #[test]
    fn round_trips() {
        for s in ["0.0.1", "1.2.3-rc.2", "1.2.3+b1", "10.20.30-alpha+sha.5114f85"] {
            assert_eq!(Version::parse(s).unwrap().to_string(), s);
        }
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(Version::parse("").is_err());
        assert!(Version::parse("1.2").is_err());
        assert!(Version::parse("1.2.3.4").is_err());
        assert!(Version::parse("1.x.3").is_err());
        assert!(Version::parse("abc").is_err());
        assert!(Version::parse("1..3").is_err());
    }

    #[test]
    fn orders_by_numeric_triple() {
        let a = Version::parse("0.9.9").unwrap();
        let b = Version::parse("1.0.0").unwrap();
        let c = Version::parse("1.0.1").unwrap();
        assert!(b.is_newer_than(&a));
        assert!(c.is_newer_than(&b));
        assert!(a.is_older_than(&c));
    }

    #[test]
    fn stable_outranks_prerelease() {
        let stable = Version::parse("1.0.0").unwrap();
        let beta = Version::parse("1.0.0-beta").unwrap();
        assert!(stable.is_newer_than(&beta));
        assert!(beta.is_prerelease());
        assert!(!stable.is_prerelease());
    }

    #[test]
    fn prereleases_compare_lexicographically() {
        let alpha = Version::parse("1.0.0-alpha").unwrap();
        let beta = Version::parse("1.0.0-beta").unwrap();
        assert!(beta.is_newer_than(&alpha));
    }

    #[test]
    fn build_metadata_is_ignored() {
        let a = Version::parse("1.2.3+b1").unwrap();
        let b = Version::parse("1.2.3+b2").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.cmp(&b), Ordering::Equal);
    }

    #[test]
    fn comparison_is_antisymmetric() {
        let pairs = [
            ("1.0.0", "2.0.0"),
            ("1.0.0-beta", "1.0.0"),
            ("1.0.0-alpha", "1.0.0-beta"),
            ("1.2.3", "1.2.3"),
        ];
        for (x, y) in pairs {
            let a = Version::parse(x).unwrap();
            let b = Version::parse(y).unwrap();
            assert_eq!(a.cmp(&b), b.cmp(&a).reverse());
        }
    }
}
