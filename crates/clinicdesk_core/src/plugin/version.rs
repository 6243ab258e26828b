//! Four-part host version and plugin compatibility validation.
//!
//! # Invariants
//! - Ordering is lexicographic over `major, minor, build, revision`.
//! - `Exact` matches only when all four components are equal.
//! - `Minimum` matches when the host is greater than or equal to the
//!   declared version.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

static VERSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+)\.(\d+)(?:\.(\d+))?(?:\.(\d+))?$").expect("valid version regex")
});

/// Host or plugin version in `major.minor.build.revision` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct HostVersion {
    pub major: u32,
    pub minor: u32,
    pub build: u32,
    pub revision: u32,
}

impl HostVersion {
    pub const fn new(major: u32, minor: u32, build: u32, revision: u32) -> Self {
        Self {
            major,
            minor,
            build,
            revision,
        }
    }

    /// Parses `major.minor[.build[.revision]]`; omitted components are 0.
    pub fn parse(value: &str) -> Result<Self, VersionParseError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(VersionParseError::Empty);
        }
        let caps = VERSION_RE
            .captures(trimmed)
            .ok_or_else(|| VersionParseError::Malformed(trimmed.to_string()))?;

        let component = |index: usize| -> Result<u32, VersionParseError> {
            match caps.get(index) {
                Some(m) => m
                    .as_str()
                    .parse::<u32>()
                    .map_err(|_| VersionParseError::ComponentOverflow(trimmed.to_string())),
                None => Ok(0),
            }
        };

        Ok(Self {
            major: component(1)?,
            minor: component(2)?,
            build: component(3)?,
            revision: component(4)?,
        })
    }
}

impl Display for HostVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

impl FromStr for HostVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Version parse failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionParseError {
    Empty,
    Malformed(String),
    ComponentOverflow(String),
}

impl Display for VersionParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "version must not be empty"),
            Self::Malformed(value) => write!(
                f,
                "version is malformed: {value} (expected major.minor[.build[.revision]])"
            ),
            Self::ComponentOverflow(value) => {
                write!(f, "version component is out of range: {value}")
            }
        }
    }
}

impl Error for VersionParseError {}

/// How a plugin's declared version is compared against the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    Exact,
    Minimum,
}

impl ValidationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Minimum => "minimum",
        }
    }
}

/// Compatibility check for one declared version.
pub fn validate(declared: HostVersion, host: HostVersion, mode: ValidationMode) -> bool {
    match mode {
        ValidationMode::Exact => declared == host,
        ValidationMode::Minimum => host >= declared,
    }
}

/// Declared `(version, mode)` pair carried by every plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PluginValidator {
    pub declared: HostVersion,
    pub mode: ValidationMode,
}

impl PluginValidator {
    pub fn new(declared: HostVersion, mode: ValidationMode) -> Self {
        Self { declared, mode }
    }

    pub fn minimum(declared: HostVersion) -> Self {
        Self::new(declared, ValidationMode::Minimum)
    }

    pub fn exact(declared: HostVersion) -> Self {
        Self::new(declared, ValidationMode::Exact)
    }

    pub fn is_compatible_with(&self, host: HostVersion) -> bool {
        validate(self.declared, host, self.mode)
    }
}

#[cfg(test)]
mod tests {
    use super::{validate, HostVersion, PluginValidator, ValidationMode, VersionParseError};

    fn v(value: &str) -> HostVersion {
        HostVersion::parse(value).expect("test version parses")
    }

    #[test]
    fn parses_short_forms_with_zero_fill() {
        assert_eq!(v("3.0"), HostVersion::new(3, 0, 0, 0));
        assert_eq!(v("3.1.2"), HostVersion::new(3, 1, 2, 0));
        assert_eq!(v(" 3.1.2.7 "), HostVersion::new(3, 1, 2, 7));
        assert_eq!(v("3.1.2.7").to_string(), "3.1.2.7");
    }

    #[test]
    fn rejects_malformed_versions() {
        assert_eq!(HostVersion::parse("  "), Err(VersionParseError::Empty));
        assert!(matches!(
            HostVersion::parse("3"),
            Err(VersionParseError::Malformed(_))
        ));
        assert!(matches!(
            HostVersion::parse("v3.0.0.0"),
            Err(VersionParseError::Malformed(_))
        ));
        assert!(matches!(
            HostVersion::parse("3.0.0.0.1"),
            Err(VersionParseError::Malformed(_))
        ));
        assert!(matches!(
            HostVersion::parse("3.99999999999"),
            Err(VersionParseError::ComponentOverflow(_))
        ));
    }

    #[test]
    fn ordering_is_lexicographic_by_component() {
        assert!(v("3.0.0.10") > v("3.0.0.9"));
        assert!(v("3.1.0.0") > v("3.0.9.9"));
        assert!(v("4.0.0.0") > v("3.99.99.99"));
        assert!(v("3.0.1.0") < v("3.0.1.1"));
    }

    #[test]
    fn minimum_mode_matches_iff_host_is_not_older() {
        let declared = v("3.0.0.0");
        assert!(validate(declared, v("3.0.0.0"), ValidationMode::Minimum));
        assert!(validate(declared, v("3.2.0.0"), ValidationMode::Minimum));
        assert!(!validate(declared, v("2.9.9.9"), ValidationMode::Minimum));
    }

    #[test]
    fn exact_mode_requires_all_four_components() {
        let declared = v("3.0.1.4");
        assert!(validate(declared, v("3.0.1.4"), ValidationMode::Exact));
        assert!(!validate(declared, v("3.0.1.5"), ValidationMode::Exact));
        assert!(!validate(declared, v("3.0.2.4"), ValidationMode::Exact));
    }

    #[test]
    fn minimum_mode_agrees_with_ordering_over_a_grid() {
        let samples = ["2.9", "3.0", "3.0.0.1", "3.0.1", "3.1", "4.0"];
        for declared in samples {
            for host in samples {
                let expected = v(host) >= v(declared);
                let validator = PluginValidator::minimum(v(declared));
                assert_eq!(
                    validator.is_compatible_with(v(host)),
                    expected,
                    "declared={declared} host={host}"
                );
                assert_eq!(
                    PluginValidator::exact(v(declared)).is_compatible_with(v(host)),
                    v(host) == v(declared)
                );
            }
        }
    }
}
