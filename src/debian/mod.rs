pub mod files;

pub use self::files::create_missing_files;

use regex::Regex;
use std::sync::OnceLock;

pub const ORIG_TARBALL_EXTENSION: &str = ".orig.tar.gz";

/// The name of the directory which `dpkg-source` expects to find the source tree in.
pub fn staged_dirname(source: &str, upstream_version: &str) -> String {
    [source, "-", upstream_version].concat()
}

pub fn orig_tarball_name(source: &str, upstream_version: &str) -> String {
    [source, "_", upstream_version, ORIG_TARBALL_EXTENSION].concat()
}

/// Converts a Python project name into the form Debian permits for source package names.
pub fn debianize_name(name: &str) -> String {
    name.to_lowercase().replace('_', "-").replace('.', "-")
}

fn source_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9+.-]+$").expect("source name pattern is valid"))
}

pub fn is_valid_source_name(name: &str) -> bool {
    source_name_pattern().is_match(name)
}
