use crate::models::{GoVersion, Resolution, VersionSource};
use regex::Regex;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};

pub const GO_VERSION_FILE: &str = ".go-version";
pub const GO_PKGSET_FILE: &str = ".go-pkgset";
pub const GO_MOD_FILE: &str = "go.mod";

/// Files whose creation, change or removal can change the resolution
pub const TRACKED_FILES: [&str; 3] = [GO_VERSION_FILE, GO_PKGSET_FILE, GO_MOD_FILE];

/// Version files are only ever a single short line
const FIRST_LINE_LIMIT: u64 = 256;

/// Result of looking only at go.mod
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GoModLookup {
    Missing,
    NoDirective(PathBuf),
    Found { path: PathBuf, version: GoVersion },
}

/// Works out which Go version and pkgset a workspace asks for.
///
/// Every lookup goes back to disk. Read failures are treated the same as a
/// missing file so that one bad file never blocks the switch.
pub struct TargetResolver;

impl TargetResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve(&self, roots: &[PathBuf]) -> Resolution {
        let mut resolution = Resolution::default();

        if let Some(path) = find_in_workspace(roots, GO_VERSION_FILE) {
            resolution.version = read_first_line(&path).and_then(|raw| parse_version(&path, &raw));
            if resolution.version.is_some() {
                resolution.source = Some(VersionSource::GoVersionFile);
            }
        }

        if let Some(path) = find_in_workspace(roots, GO_PKGSET_FILE) {
            resolution.pkgset = read_first_line(&path);
        }

        if resolution.version.is_none() {
            if let GoModLookup::Found { version, .. } = self.resolve_from_go_mod(roots) {
                resolution.version = Some(version);
                resolution.source = Some(VersionSource::GoMod);
            }
        }

        debug!(
            "Resolved version={:?} pkgset={:?} source={:?}",
            resolution.version, resolution.pkgset, resolution.source
        );
        resolution
    }

    /// Look at go.mod alone, ignoring .go-version and .go-pkgset.
    pub fn resolve_from_go_mod(&self, roots: &[PathBuf]) -> GoModLookup {
        let Some(path) = find_in_workspace(roots, GO_MOD_FILE) else {
            return GoModLookup::Missing;
        };

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                debug!("Could not read {}: {}", path.display(), e);
                return GoModLookup::NoDirective(path);
            }
        };

        match parse_go_directive(&content).and_then(|raw| parse_version(&path, &raw)) {
            Some(version) => GoModLookup::Found { path, version },
            None => GoModLookup::NoDirective(path),
        }
    }
}

impl Default for TargetResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// First workspace root that contains `file_name`.
pub fn find_in_workspace(roots: &[PathBuf], file_name: &str) -> Option<PathBuf> {
    roots
        .iter()
        .map(|root| root.join(file_name))
        .find(|path| path.exists())
}

/// Trimmed first line of a file, or `None` when it is unreadable or blank.
pub fn read_first_line(path: &Path) -> Option<String> {
    let mut buffer = Vec::new();
    let read = std::fs::File::open(path)
        .and_then(|file| file.take(FIRST_LINE_LIMIT).read_to_end(&mut buffer));

    if let Err(e) = read {
        debug!("Could not read {}: {}", path.display(), e);
        return None;
    }

    let content = String::from_utf8_lossy(&buffer);
    let line = content.split('\n').next().unwrap_or("").trim();

    if line.is_empty() {
        None
    } else {
        Some(line.to_string())
    }
}

/// Version captured from the first `go <version>` directive.
pub fn parse_go_directive(content: &str) -> Option<String> {
    static GO_DIRECTIVE: OnceLock<Regex> = OnceLock::new();
    let re = GO_DIRECTIVE.get_or_init(|| Regex::new(r"(?m)^go\s+([0-9.]+)").unwrap());

    re.captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn parse_version(path: &Path, raw: &str) -> Option<GoVersion> {
    match raw.parse::<GoVersion>() {
        Ok(version) => Some(version),
        Err(e) => {
            warn!("Ignoring version in {}: {}", path.display(), e);
            None
        }
    }
}
