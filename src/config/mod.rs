use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use toml::{self, de};

mod fetch;

pub use self::fetch::ConfigFetch;

/// Searched for in the project root; its values apply before any `--extra-cfg-file`.
pub const CONFIG_FILE: &str = "sdist-dsc.toml";

/// Values in this table apply to every project, and are overridden by the project's own table.
pub const DEFAULT_SECTION: &str = "DEFAULT";

#[derive(Debug, Fail)]
pub enum ConfigError {
    #[fail(display = "error reading {:?}: {}", file, why)]
    File { file: PathBuf, why: io::Error },
    #[fail(display = "failed to parse TOML syntax in {:?}: {}", file, why)]
    Toml { file: PathBuf, why: de::Error },
    #[fail(display = "provided config key was not found: {}", key)]
    InvalidKey { key: String },
    #[fail(display = "invalid value for {}: {}", key, value)]
    InvalidValue { key: String, value: String },
}

/// A single table of Debian packaging settings.
///
/// Keys follow the spelling of Debian control fields, so that a config table reads like the
/// control file it will eventually describe.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Section {
    #[serde(rename = "Source")]
    pub source: Option<String>,
    #[serde(rename = "Package")]
    pub package: Option<String>,
    #[serde(rename = "Debian-Version")]
    pub debian_version: Option<String>,
    #[serde(rename = "Suite")]
    pub suite: Option<String>,
    #[serde(rename = "Maintainer")]
    pub maintainer: Option<String>,
    #[serde(rename = "Section")]
    pub section: Option<String>,
    #[serde(rename = "Depends")]
    pub depends: Option<String>,
    #[serde(rename = "Build-Depends")]
    pub build_depends: Option<String>,
    #[serde(rename = "Patch-File")]
    pub patch_file: Option<String>,
    #[serde(rename = "Patch-Level")]
    pub patch_level: Option<u32>,
    #[serde(rename = "Upstream-Version-Prefix")]
    pub upstream_version_prefix: Option<String>,
    #[serde(rename = "Upstream-Version-Suffix")]
    pub upstream_version_suffix: Option<String>,
}

impl Section {
    /// Overlays every field that is set in `other`.
    pub fn merge(&mut self, other: &Section) {
        macro_rules! overlay {
            ($($field:ident),*) => {$(
                if other.$field.is_some() {
                    self.$field = other.$field.clone();
                }
            )*};
        }

        overlay!(
            source,
            package,
            debian_version,
            suite,
            maintainer,
            section,
            depends,
            build_depends,
            patch_file,
            patch_level,
            upstream_version_prefix,
            upstream_version_suffix
        );
    }
}

/// An in-memory representation of one config file.
#[derive(Debug, Default)]
pub struct ConfigFile {
    sections: BTreeMap<String, Section>,
}

impl ConfigFile {
    pub fn open(path: &Path) -> Result<ConfigFile, ConfigError> {
        fs::read_to_string(path)
            .map_err(|why| ConfigError::File { file: path.to_path_buf(), why })
            .and_then(|buffer| {
                toml::from_str(&buffer)
                    .map(|sections| ConfigFile { sections })
                    .map_err(|why| ConfigError::Toml { file: path.to_path_buf(), why })
            })
    }

    /// The `[DEFAULT]` table with the table named after `project` layered on top.
    pub fn section_for(&self, project: &str) -> Section {
        let mut section = self.sections.get(DEFAULT_SECTION).cloned().unwrap_or_default();
        if let Some(specific) = self.sections.get(project) {
            section.merge(specific);
        }

        section
    }
}

/// Lists the config files which apply to a project, in the order in which they are merged.
pub fn discover(project_dir: &Path, extra: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let local = project_dir.join(CONFIG_FILE);
    if local.exists() {
        files.push(local);
    }

    files.extend(extra.map(Path::to_path_buf));
    files
}

/// Reads each config file in turn, with later files overriding earlier ones.
pub fn load(files: &[PathBuf], project: &str) -> Result<Section, ConfigError> {
    let mut section = Section::default();
    for file in files {
        debug!("reading config from {}", file.display());
        section.merge(&ConfigFile::open(file)?.section_for(project));
    }

    Ok(section)
}

/// Splits a comma-separated Debian relationship field.
pub fn split_list(value: Option<&str>) -> Vec<String> {
    value.map_or_else(Vec::new, |value| {
        value.split(',')
            .map(str::trim)
            .filter(|x| !x.is_empty())
            .map(String::from)
            .collect()
    })
}

fn borrowed<'a>(value: &'a Option<String>) -> Option<Cow<'a, str>> {
    value.as_ref().map(|x| Cow::Borrowed(x.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::misc;
    use tempfile::tempdir;

    const EXAMPLE: &str = r#"[DEFAULT]
    Suite = "bionic"
    Maintainer = "Packagers <pkg@example.com>"

    [foo]
    Source = "python-foo"
    Depends = "python3-bar, python3-baz (>= 1.0)"
    Patch-Level = 1

    [other]
    Suite = "buster""#;

    #[test]
    fn project_section_overrides_default() {
        let config = ConfigFile { sections: toml::from_str(EXAMPLE).unwrap() };
        let section = config.section_for("foo");

        assert_eq!(section.suite.as_ref().unwrap(), "bionic");
        assert_eq!(section.source.as_ref().unwrap(), "python-foo");
        assert_eq!(section.patch_level, Some(1));
        assert_eq!(
            split_list(section.depends.as_ref().map(|x| x.as_str())),
            vec!["python3-bar".to_owned(), "python3-baz (>= 1.0)".to_owned()]
        );

        let section = config.section_for("unlisted");
        assert_eq!(section.suite.as_ref().unwrap(), "bionic");
        assert!(section.source.is_none());
    }

    #[test]
    fn later_files_win() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("first.toml");
        let second = dir.path().join("second.toml");
        misc::write(&first, EXAMPLE).unwrap();
        misc::write(&second, "[foo]\nSuite = \"focal\"\n").unwrap();

        let section = load(&[first, second], "foo").unwrap();
        assert_eq!(section.suite.as_ref().unwrap(), "focal");
        assert_eq!(section.maintainer.as_ref().unwrap(), "Packagers <pkg@example.com>");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("bad.toml");
        misc::write(&file, "[DEFAULT]\nSuit = \"typo\"\n").unwrap();

        match load(&[file], "foo") {
            Err(ConfigError::Toml { .. }) => (),
            other => panic!("expected a TOML error, got {:?}", other),
        }
    }

    #[test]
    fn discover_local_and_extra() {
        let dir = tempdir().unwrap();
        let extra = dir.path().join("extra.toml");
        assert_eq!(discover(dir.path(), Some(&extra)), vec![extra.clone()]);

        misc::write(dir.path().join(CONFIG_FILE), "").unwrap();
        assert_eq!(
            discover(dir.path(), Some(&extra)),
            vec![dir.path().join(CONFIG_FILE), extra]
        );
    }
}
