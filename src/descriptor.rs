//! Assembly of the immutable description of the source package being produced.

use std::path::PathBuf;

use crate::config::{self, ConfigError, ConfigFetch, Section};
use crate::debian;
use crate::metadata::ProjectMetadata;

pub const UNKNOWN_MAINTAINER: &str = "unknown <unknown@unknown>";
pub const DEFAULT_DISTRIBUTION: &str = "unstable";
pub const DEFAULT_DEBIAN_VERSION: &str = "1";
pub const DEFAULT_SECTION: &str = "python";
pub const BINARY_PACKAGE_PREFIX: &str = "python3-";

/// Debian policy limits the synopsis line of a package description.
pub const MAX_DESCRIPTION: usize = 60;

#[derive(Debug, Fail)]
pub enum DescriptorError {
    #[fail(display = "a patch was already applied, but another patch is requested: {}", patch)]
    ConfigConflict { patch: String },
    #[fail(display = "'{}' is not a valid Debian source package name", name)]
    InvalidSourceName { name: String },
    #[fail(display = "{}", why)]
    Config { why: ConfigError },
}

impl From<ConfigError> for DescriptorError {
    fn from(why: ConfigError) -> DescriptorError { DescriptorError::Config { why } }
}

/// Values supplied by the caller, which take precedence over config files and metadata.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub maintainer: Option<String>,
    pub distribution: Option<String>,
    pub patch_file: Option<String>,
    pub patch_level: Option<u32>,
    pub patch_already_applied: bool,
    /// Raw `KEY=VALUE` assignments, applied to the merged config table.
    pub settings: Vec<(String, String)>,
}

/// Every field of a descriptor, before its invariants have been checked.
#[derive(Clone, Debug, Default)]
pub struct DescriptorFields {
    pub source: String,
    pub package: String,
    pub upstream_version: String,
    pub debian_version: String,
    pub maintainer: String,
    pub description: String,
    pub long_description: String,
    pub distribution: String,
    pub section: String,
    pub depends: Vec<String>,
    pub build_depends: Vec<String>,
    pub patch_file: Option<String>,
    pub patch_level: Option<u32>,
    pub patch_already_applied: bool,
    pub directories: Vec<String>,
    pub has_ext_modules: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PackageDescriptor {
    source: String,
    package: String,
    upstream_version: String,
    debian_version: String,
    maintainer: String,
    description: String,
    long_description: String,
    distribution: String,
    section: String,
    depends: Vec<String>,
    build_depends: Vec<String>,
    patch_file: Option<String>,
    patch_level: Option<u32>,
    patch_already_applied: bool,
    directories: Vec<String>,
    has_ext_modules: bool,
}

impl PackageDescriptor {
    /// Checks the invariants of a descriptor before allowing it to exist.
    pub fn new(fields: DescriptorFields) -> Result<PackageDescriptor, DescriptorError> {
        let patch_file = fields.patch_file.filter(|x| !x.is_empty());

        if fields.patch_already_applied {
            if let Some(ref patch) = patch_file {
                return Err(DescriptorError::ConfigConflict { patch: patch.clone() });
            }
        }

        if !debian::is_valid_source_name(&fields.source) {
            return Err(DescriptorError::InvalidSourceName { name: fields.source });
        }

        Ok(PackageDescriptor {
            source: fields.source,
            package: fields.package,
            upstream_version: fields.upstream_version,
            debian_version: fields.debian_version,
            maintainer: fields.maintainer,
            description: fields.description.chars().take(MAX_DESCRIPTION).collect(),
            long_description: fields.long_description,
            distribution: fields.distribution,
            section: fields.section,
            depends: fields.depends,
            build_depends: fields.build_depends,
            patch_file,
            patch_level: fields.patch_level,
            patch_already_applied: fields.patch_already_applied,
            directories: fields.directories,
            has_ext_modules: fields.has_ext_modules,
        })
    }

    pub fn source(&self) -> &str { &self.source }

    pub fn package(&self) -> &str { &self.package }

    pub fn upstream_version(&self) -> &str { &self.upstream_version }

    pub fn debian_version(&self) -> &str { &self.debian_version }

    /// The version recorded in the changelog: `upstream-debian`.
    pub fn full_version(&self) -> String {
        [self.upstream_version.as_str(), "-", &self.debian_version].concat()
    }

    pub fn staged_dirname(&self) -> String {
        debian::staged_dirname(&self.source, &self.upstream_version)
    }

    pub fn orig_tarball_name(&self) -> String {
        debian::orig_tarball_name(&self.source, &self.upstream_version)
    }

    pub fn maintainer(&self) -> &str { &self.maintainer }

    pub fn description(&self) -> &str { &self.description }

    pub fn long_description(&self) -> &str { &self.long_description }

    pub fn distribution(&self) -> &str { &self.distribution }

    pub fn section(&self) -> &str { &self.section }

    pub fn depends(&self) -> &[String] { &self.depends }

    pub fn build_depends(&self) -> &[String] { &self.build_depends }

    pub fn patch_file(&self) -> Option<&str> { self.patch_file.as_ref().map(|x| x.as_str()) }

    pub fn patch_level(&self) -> Option<u32> { self.patch_level }

    pub fn patch_already_applied(&self) -> bool { self.patch_already_applied }

    /// Directories holding importable code, relative to the package root.
    pub fn directories(&self) -> &[String] { &self.directories }

    pub fn has_ext_modules(&self) -> bool { self.has_ext_modules }
}

/// Reads the config files, applies the caller's `KEY=VALUE` settings to the result, and
/// resolves the descriptor.
pub fn assemble<M: ProjectMetadata>(
    config_files: &[PathBuf],
    metadata: &M,
    overrides: &Overrides,
) -> Result<PackageDescriptor, DescriptorError> {
    let mut section = config::load(config_files, metadata.name())?;
    for &(ref key, ref value) in &overrides.settings {
        section.update(key, value.clone())?;
    }

    resolve(&section, metadata, overrides)
}

/// Layers the merged config table and the caller's overrides on top of values derived from
/// the project metadata.
pub fn resolve<M: ProjectMetadata>(
    section: &Section,
    metadata: &M,
    overrides: &Overrides,
) -> Result<PackageDescriptor, DescriptorError> {
    let debianized = debian::debianize_name(metadata.name());

    let maintainer = overrides.maintainer.clone()
        .or_else(|| section.maintainer.clone())
        .or_else(|| metadata.maintainer().map(|x| x.to_string()))
        .or_else(|| metadata.author().map(|x| x.to_string()))
        .unwrap_or_else(|| UNKNOWN_MAINTAINER.to_owned());

    let upstream_version = [
        section.upstream_version_prefix.as_ref().map_or("", |x| x.as_str()),
        metadata.version(),
        section.upstream_version_suffix.as_ref().map_or("", |x| x.as_str()),
    ].concat();

    let fields = DescriptorFields {
        source: section.source.clone().unwrap_or_else(|| debianized.clone()),
        package: section.package.clone()
            .unwrap_or_else(|| [BINARY_PACKAGE_PREFIX, &debianized].concat()),
        upstream_version,
        debian_version: section.debian_version.clone()
            .unwrap_or_else(|| DEFAULT_DEBIAN_VERSION.to_owned()),
        maintainer,
        description: metadata.description().to_owned(),
        long_description: metadata.long_description().to_owned(),
        distribution: overrides.distribution.clone()
            .or_else(|| section.suite.clone())
            .unwrap_or_else(|| DEFAULT_DISTRIBUTION.to_owned()),
        section: section.section.clone().unwrap_or_else(|| DEFAULT_SECTION.to_owned()),
        depends: config::split_list(section.depends.as_ref().map(|x| x.as_str())),
        build_depends: config::split_list(section.build_depends.as_ref().map(|x| x.as_str())),
        patch_file: overrides.patch_file.clone().or_else(|| section.patch_file.clone()),
        patch_level: overrides.patch_level.or(section.patch_level),
        patch_already_applied: overrides.patch_already_applied,
        directories: metadata.packages().iter().map(|x| x.replace('.', "/")).collect(),
        has_ext_modules: metadata.has_ext_modules(),
    };

    PackageDescriptor::new(fields)
}
