//! Premade source distributions: expanding them, and repacking them under a new top-level
//! directory when `dpkg-source` would not accept them as they are.

mod extract;
mod repack;

pub use self::extract::expand;
pub use self::repack::repack;

use chrono::NaiveDate;
use itertools::Itertools;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Fail)]
pub enum ArchiveError {
    #[fail(display = "{:?} is not a .zip, .tar.gz, or .tgz archive", path)]
    UnsupportedArchive { path: PathBuf },
    #[fail(display = "failed to read archive at {:?}: {}", path, why)]
    ArchiveCorrupt { path: PathBuf, why: String },
    #[fail(display = "archive at {:?} has no contents", path)]
    EmptyArchive { path: PathBuf },
    #[fail(display = "archive at {:?} has more than one top-level entry: {}", path, entries)]
    MultipleTopLevelEntries { path: PathBuf, entries: String },
    #[fail(display = "the top-level entry of archive at {:?} is not a directory: {}", path, entry)]
    NotADirectory { path: PathBuf, entry: String },
    #[fail(display = "unable to repack entry {:?}: {}", entry, why)]
    Repack { entry: PathBuf, why: &'static str },
    #[fail(display = "I/O error with {:?}: {}", path, why)]
    Io { path: PathBuf, why: io::Error },
}

impl ArchiveError {
    pub(crate) fn corrupt<E: ToString>(path: &Path, why: E) -> ArchiveError {
        ArchiveError::ArchiveCorrupt { path: path.to_path_buf(), why: why.to_string() }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ArchiveKind {
    Zip,
    GzipTar,
}

impl ArchiveKind {
    /// Determines the kind of archive from the file name, ignoring case.
    pub fn detect(path: &Path) -> Option<ArchiveKind> {
        let name = path.file_name()?.to_str()?.to_lowercase();
        if name.ends_with(".zip") {
            Some(ArchiveKind::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(ArchiveKind::GzipTar)
        } else {
            None
        }
    }
}

/// A premade source distribution, after it has been expanded into a scratch directory.
#[derive(Clone, Debug, PartialEq)]
pub struct PremadeArchive {
    pub path: PathBuf,
    pub kind: ArchiveKind,
    pub top_level: String,
}

impl PremadeArchive {
    /// Expands the archive at `path` into `scratch`, and records its top-level directory.
    pub fn inspect(path: &Path, scratch: &Path) -> Result<PremadeArchive, ArchiveError> {
        let kind = expand(path, scratch)?;
        let top_level = top_level_entry(scratch).map_err(|why| match why {
            ArchiveError::EmptyArchive { .. } => ArchiveError::EmptyArchive { path: path.to_path_buf() },
            ArchiveError::MultipleTopLevelEntries { entries, .. } => {
                ArchiveError::MultipleTopLevelEntries { path: path.to_path_buf(), entries }
            }
            ArchiveError::NotADirectory { entry, .. } => {
                ArchiveError::NotADirectory { path: path.to_path_buf(), entry }
            }
            other => other,
        })?;

        Ok(PremadeArchive { path: path.to_path_buf(), kind, top_level })
    }

    /// `dpkg-source` only accepts a gzipped tarball whose contents sit in `staged_name`.
    pub fn requires_repack(&self, staged_name: &str) -> bool {
        self.kind != ArchiveKind::GzipTar || self.top_level != staged_name
    }
}

/// The name of the only entry in `dir`, which must be a directory.
pub fn top_level_entry(dir: &Path) -> Result<String, ArchiveError> {
    let io_error = |why| ArchiveError::Io { path: dir.to_path_buf(), why };
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_error)? {
        let entry = entry.map_err(io_error)?;
        let is_dir = entry.file_type().map_err(io_error)?.is_dir();
        entries.push((entry.file_name().to_string_lossy().into_owned(), is_dir));
    }

    entries.sort();
    match entries.len() {
        0 => Err(ArchiveError::EmptyArchive { path: dir.to_path_buf() }),
        1 => {
            let (name, is_dir) = entries.remove(0);
            if is_dir {
                Ok(name)
            } else {
                Err(ArchiveError::NotADirectory { path: dir.to_path_buf(), entry: name })
            }
        }
        _ => Err(ArchiveError::MultipleTopLevelEntries {
            path: dir.to_path_buf(),
            entries: entries.iter().map(|x| x.0.as_str()).join(", "),
        }),
    }
}

/// Zip timestamps carry no time zone; they are read as UTC.
pub(crate) fn zip_timestamp(time: zip::DateTime) -> Option<u64> {
    let stamp = NaiveDate::from_ymd_opt(time.year() as i32, time.month() as u32, time.day() as u32)?
        .and_hms_opt(time.hour() as u32, time.minute() as u32, time.second() as u32)?
        .and_utc()
        .timestamp();

    if stamp < 0 { None } else { Some(stamp as u64) }
}

/// Symlinks in zip archives are regular entries whose mode carries `S_IFLNK`.
pub(crate) fn is_symlink_mode(mode: u32) -> bool {
    mode & 0o170_000 == 0o120_000
}
