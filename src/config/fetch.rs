use std::borrow::Cow;

use super::{borrowed, ConfigError, Section};

/// Methods for fetching and updating values of a config table by their key.
pub trait ConfigFetch {
    /// Fetches the value of a given key, if the key is known and set.
    fn fetch<'a>(&'a self, key: &str) -> Option<Cow<'a, str>>;

    /// Updates a given key with a specified value.
    fn update(&mut self, key: &str, value: String) -> Result<(), ConfigError>;
}

impl ConfigFetch for Section {
    fn fetch<'a>(&'a self, key: &str) -> Option<Cow<'a, str>> {
        match key {
            "Source" => borrowed(&self.source),
            "Package" => borrowed(&self.package),
            "Debian-Version" => borrowed(&self.debian_version),
            "Suite" => borrowed(&self.suite),
            "Maintainer" => borrowed(&self.maintainer),
            "Section" => borrowed(&self.section),
            "Depends" => borrowed(&self.depends),
            "Build-Depends" => borrowed(&self.build_depends),
            "Patch-File" => borrowed(&self.patch_file),
            "Patch-Level" => self.patch_level.map(|x| Cow::Owned(x.to_string())),
            "Upstream-Version-Prefix" => borrowed(&self.upstream_version_prefix),
            "Upstream-Version-Suffix" => borrowed(&self.upstream_version_suffix),
            _ => None,
        }
    }

    fn update(&mut self, key: &str, value: String) -> Result<(), ConfigError> {
        match key {
            "Source" => self.source = Some(value),
            "Package" => self.package = Some(value),
            "Debian-Version" => self.debian_version = Some(value),
            "Suite" => self.suite = Some(value),
            "Maintainer" => self.maintainer = Some(value),
            "Section" => self.section = Some(value),
            "Depends" => self.depends = Some(value),
            "Build-Depends" => self.build_depends = Some(value),
            "Patch-File" => self.patch_file = Some(value),
            "Patch-Level" => {
                let level = value.parse::<u32>().map_err(|_| ConfigError::InvalidValue {
                    key: key.to_owned(),
                    value: value.clone(),
                })?;
                self.patch_level = Some(level);
            }
            "Upstream-Version-Prefix" => self.upstream_version_prefix = Some(value),
            "Upstream-Version-Suffix" => self.upstream_version_suffix = Some(value),
            _ => return Err(ConfigError::InvalidKey { key: key.to_owned() }),
        }

        Ok(())
    }
}
