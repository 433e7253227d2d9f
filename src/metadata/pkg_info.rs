use glob::glob;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::{find_packages, Contact, ProjectMetadata};

/// Locations searched for `PKG-INFO`, relative to the project root, in order of preference.
const SEARCH: &[&str] = &["PKG-INFO", "*.egg-info/PKG-INFO", "src/*.egg-info/PKG-INFO"];

#[derive(Debug, Fail)]
pub enum MetadataError {
    #[fail(display = "no PKG-INFO found in {:?}; generate it with `python setup.py egg_info`", root)]
    Missing { root: PathBuf },
    #[fail(display = "failed to read {:?}: {}", file, why)]
    Read { file: PathBuf, why: io::Error },
    #[fail(display = "{:?} does not declare the {} field", file, field)]
    Field { file: PathBuf, field: &'static str },
}

/// Project metadata read from a Python core metadata file (`PKG-INFO`).
#[derive(Clone, Debug, Default)]
pub struct PkgInfo {
    pub name: String,
    pub version: String,
    pub summary: String,
    pub description: String,
    pub author: Option<Contact>,
    pub maintainer: Option<Contact>,
    pub packages: Vec<String>,
    pub has_ext_modules: bool,
}

impl PkgInfo {
    /// Finds and parses the project's `PKG-INFO`, then discovers its packages.
    pub fn load(project_dir: &Path) -> Result<PkgInfo, MetadataError> {
        let file = locate(project_dir)
            .ok_or_else(|| MetadataError::Missing { root: project_dir.to_path_buf() })?;

        info!("reading project metadata from {}", file.display());
        let contents = fs::read_to_string(&file)
            .map_err(|why| MetadataError::Read { file: file.clone(), why })?;

        let mut info = PkgInfo::parse(&contents)
            .map_err(|field| MetadataError::Field { file: file.clone(), field })?;

        let packages = find_packages(project_dir);
        info.packages = packages.names;
        info.has_ext_modules = packages.has_ext_modules;
        Ok(info)
    }

    /// Parses the RFC 822 style header block, and the message body which newer metadata
    /// versions use for the long description.
    ///
    /// Returns the name of the first required field which is missing.
    pub fn parse(contents: &str) -> Result<PkgInfo, &'static str> {
        let mut fields: BTreeMap<String, String> = BTreeMap::new();
        let mut body = String::new();
        let mut lines = contents.lines().peekable();

        while let Some(line) = lines.next() {
            if line.is_empty() {
                // The header block ends at the first blank line.
                for line in lines.by_ref() {
                    body.push_str(line);
                    body.push('\n');
                }
                break;
            }

            if let Some(pos) = line.find(':') {
                let (key, value) = line.split_at(pos);
                let mut value = value[1..].trim().to_owned();

                while let Some(next_line) = lines.peek() {
                    if next_line.starts_with(' ') || next_line.starts_with('\t') {
                        value.push('\n');
                        value.push_str(strip_continuation(next_line));
                    } else {
                        break;
                    }

                    let _ = lines.next();
                }

                fields.entry(key.to_owned()).or_insert(value);
            }
        }

        let name = fields.remove("Name").ok_or("Name")?;
        let version = fields.remove("Version").ok_or("Version")?;

        let description = match fields.remove("Description") {
            Some(ref description) if description.trim() != super::UNKNOWN => description.clone(),
            _ => body.trim_end().to_owned(),
        };

        let author = Contact::from_fields(
            fields.get("Author").map(|x| x.as_str()),
            fields.get("Author-email").map(|x| x.as_str()),
        );

        let maintainer = Contact::from_fields(
            fields.get("Maintainer").map(|x| x.as_str()),
            fields.get("Maintainer-email").map(|x| x.as_str()),
        );

        Ok(PkgInfo {
            name,
            version,
            summary: fields.remove("Summary").unwrap_or_default(),
            description,
            author,
            maintainer,
            packages: Vec::new(),
            has_ext_modules: false,
        })
    }
}

/// Continuation lines are indented by eight spaces, or by seven spaces and a `|`.
fn strip_continuation(line: &str) -> &str {
    let trimmed = line.trim_start();
    if trimmed.starts_with('|') {
        &trimmed[1..]
    } else if line.starts_with("        ") {
        &line[8..]
    } else {
        trimmed
    }
}

fn locate(project_dir: &Path) -> Option<PathBuf> {
    SEARCH.iter().find_map(|pattern| {
        let pattern = project_dir.join(pattern);
        glob(pattern.to_str()?)
            .ok()?
            .flat_map(|x| x.ok())
            .find(|x| x.is_file())
    })
}

impl ProjectMetadata for PkgInfo {
    fn name(&self) -> &str { &self.name }

    fn version(&self) -> &str { &self.version }

    fn maintainer(&self) -> Option<Contact> { self.maintainer.clone() }

    fn author(&self) -> Option<Contact> { self.author.clone() }

    fn description(&self) -> &str { &self.summary }

    fn long_description(&self) -> &str { &self.description }

    fn has_ext_modules(&self) -> bool { self.has_ext_modules }

    fn packages(&self) -> &[String] { &self.packages }
}
