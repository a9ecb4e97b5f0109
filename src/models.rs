use crate::error::GvmSwitchError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Prefix `go` onto a raw version string unless it already has it.
pub fn normalize_go_version(raw: &str) -> String {
    if raw.starts_with("go") {
        raw.to_string()
    } else {
        format!("go{}", raw)
    }
}

/// Go toolchain version in the form gvm expects, always `go<digits and dots>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GoVersion(String);

impl GoVersion {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn is_valid(normalized: &str) -> bool {
        normalized
            .strip_prefix("go")
            .map(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit() || c == '.'))
            .unwrap_or(false)
    }
}

impl fmt::Display for GoVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for GoVersion {
    type Err = GvmSwitchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(GvmSwitchError::NoVersionFound);
        }

        let normalized = normalize_go_version(trimmed);
        if Self::is_valid(&normalized) {
            Ok(GoVersion(normalized))
        } else {
            Err(GvmSwitchError::ConfigError(format!(
                "'{}' is not a Go version",
                trimmed
            )))
        }
    }
}

impl TryFrom<String> for GoVersion {
    type Error = GvmSwitchError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<GoVersion> for String {
    fn from(version: GoVersion) -> Self {
        version.0
    }
}

/// Which workspace file the version came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VersionSource {
    GoVersionFile,
    GoMod,
}

impl VersionSource {
    pub fn file_name(&self) -> &'static str {
        match self {
            VersionSource::GoVersionFile => ".go-version",
            VersionSource::GoMod => "go.mod",
        }
    }
}

/// Desired toolchain for a workspace, recomputed from disk on every call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub version: Option<GoVersion>,
    pub pkgset: Option<String>,
    pub source: Option<VersionSource>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PkgsetState {
    /// No pkgset was requested
    None,
    Applied(String),
    Failed(String),
}

impl PkgsetState {
    pub fn applied(&self) -> Option<&str> {
        match self {
            PkgsetState::Applied(name) => Some(name),
            _ => None,
        }
    }
}

/// Terminal state reached by one switch attempt.
#[derive(Debug)]
pub enum SwitchOutcome {
    Succeeded {
        version: GoVersion,
        pkgset: PkgsetState,
    },
    Failed(GvmSwitchError),
}

impl SwitchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SwitchOutcome::Succeeded { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_prefixes_go() {
        for raw in ["1.22.0", "1.21", "1", ""] {
            assert_eq!(normalize_go_version(raw), format!("go{}", raw));
        }
    }

    #[test]
    fn test_normalize_is_identity_with_prefix() {
        for raw in ["go1.22.0", "go1.21", "go"] {
            assert_eq!(normalize_go_version(raw), raw);
        }
    }

    #[test]
    fn test_version_parsing() {
        assert_eq!("1.22.0".parse::<GoVersion>().unwrap().as_str(), "go1.22.0");
        assert_eq!("go1.21".parse::<GoVersion>().unwrap().as_str(), "go1.21");
        assert_eq!(" 1.20 ".parse::<GoVersion>().unwrap().as_str(), "go1.20");
    }

    #[test]
    fn test_version_rejects_non_numeric() {
        assert!("".parse::<GoVersion>().is_err());
        assert!("go".parse::<GoVersion>().is_err());
        assert!("1.22; rm -rf ~".parse::<GoVersion>().is_err());
        assert!("go1.22rc1".parse::<GoVersion>().is_err());
        assert!("master".parse::<GoVersion>().is_err());
    }

    #[test]
    fn test_resolution_json_shape() {
        let resolution = Resolution {
            version: Some("1.22.0".parse().unwrap()),
            pkgset: Some("myset".to_string()),
            source: Some(VersionSource::GoVersionFile),
        };
        let json = serde_json::to_string(&resolution).unwrap();
        assert_eq!(
            json,
            r#"{"version":"go1.22.0","pkgset":"myset","source":"go-version-file"}"#
        );
    }
}
