//! Copies a project tree into the directory layout `dpkg-source` expects.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::os::unix::fs::symlink;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::misc;

/// Files which `dpkg-source` cannot package, as they are derived from the sources.
pub const COMPILED_SUFFIXES: &[&str] = &[".pyc", ".pyo"];

/// Version control metadata, pruned wherever it is found.
pub const VCS_DIRS: &[&str] = &[".svn", ".git", ".hg", ".bzr", "CVS"];

/// Build output, skipped when found at the top of the project.
pub const BUILD_DIRS: &[&str] = &["build", "dist"];

#[derive(Debug, Fail)]
pub enum StageError {
    #[fail(display = "failed to remove stale tree at {:?}: {}", path, why)]
    Remove { path: PathBuf, why: io::Error },
    #[fail(display = "failed to create directory at {:?}: {}", path, why)]
    Create { path: PathBuf, why: io::Error },
    #[fail(display = "failed to read directory at {:?}: {}", path, why)]
    Read { path: PathBuf, why: io::Error },
    #[fail(display = "failed to copy {:?} to {:?}: {}", src, dst, why)]
    Copy { src: PathBuf, dst: PathBuf, why: io::Error },
    #[fail(display = "failed to walk the staged tree: {}", why)]
    Walk { why: walkdir::Error },
    #[fail(display = "failed to remove excluded path {:?}: {}", path, why)]
    Purge { path: PathBuf, why: io::Error },
}

#[derive(Clone, Debug)]
pub struct Exclusions {
    /// Directory names removed at any depth.
    pub vcs_dirs: Vec<String>,
    /// Entry names skipped at the top of the project only.
    pub top_level: Vec<String>,
    /// File name suffixes removed at any depth.
    pub suffixes: Vec<String>,
}

impl Default for Exclusions {
    fn default() -> Self {
        let owned = |list: &[&str]| list.iter().map(|x| String::from(*x)).collect::<Vec<_>>();
        Exclusions {
            vcs_dirs: owned(VCS_DIRS),
            top_level: owned(BUILD_DIRS),
            suffixes: owned(COMPILED_SUFFIXES),
        }
    }
}

impl Exclusions {
    pub fn is_compiled(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|x| x.to_str())
            .map_or(false, |name| self.suffixes.iter().any(|x| name.ends_with(x.as_str())))
    }

    fn skips_top_level(&self, name: &OsString, staged: Option<&OsString>) -> bool {
        staged == Some(name)
            || name.to_str().map_or(false, |name| {
                self.top_level.iter().chain(self.vcs_dirs.iter()).any(|x| x == name)
            })
    }
}

pub struct StagingRequest<'a> {
    pub source_dir: &'a Path,
    pub output_dir: &'a Path,
    pub staged_name: &'a str,
    pub exclusions: &'a Exclusions,
}

impl<'a> StagingRequest<'a> {
    pub fn staged_path(&self) -> PathBuf {
        self.output_dir.join(self.staged_name)
    }

    /// The top-level entry of the source directory which holds the staged tree, if any. This
    /// is the staged tree itself when the output directory is the source directory.
    fn staged_entry(&self) -> Option<OsString> {
        let relative = |source: &Path, output: &Path| {
            output.strip_prefix(source).ok().and_then(|x| match x.components().next() {
                Some(Component::Normal(name)) => Some(name.to_os_string()),
                _ => None,
            })
        };

        let staged = self.staged_path();
        relative(self.source_dir, &staged).or_else(|| {
            let source = self.source_dir.canonicalize().ok()?;
            let staged = staged.canonicalize().ok()?;
            relative(&source, &staged)
        })
    }
}

/// Copies the project into `output_dir/staged_name`, replacing whatever was staged there
/// before, then strips compiled artifacts and version control directories from the copy.
pub fn stage(request: &StagingRequest) -> Result<PathBuf, StageError> {
    let staged = request.staged_path();
    if staged.exists() {
        info!("removing previously staged tree at {}", staged.display());
        fs::remove_dir_all(&staged)
            .map_err(|why| StageError::Remove { path: staged.clone(), why })?;
    }

    fs::create_dir_all(&staged)
        .map_err(|why| StageError::Create { path: staged.clone(), why })?;

    let staged_entry = request.staged_entry();
    let entries = fs::read_dir(request.source_dir)
        .map_err(|why| StageError::Read { path: request.source_dir.to_path_buf(), why })?;

    info!("staging {} in {}", request.source_dir.display(), staged.display());
    for entry in entries {
        let entry = entry
            .map_err(|why| StageError::Read { path: request.source_dir.to_path_buf(), why })?;
        let name = entry.file_name();

        if request.exclusions.skips_top_level(&name, staged_entry.as_ref()) {
            debug!("skipping {}", entry.path().display());
            continue;
        }

        copy_entry(&entry.path(), &staged.join(&name))?;
    }

    purge(&staged, request.exclusions)?;
    Ok(staged)
}

fn copy_entry(src: &Path, dst: &Path) -> Result<(), StageError> {
    let copy_error = |why| StageError::Copy { src: src.to_path_buf(), dst: dst.to_path_buf(), why };
    let meta = src.symlink_metadata().map_err(copy_error)?;
    let file_type = meta.file_type();

    if file_type.is_dir() {
        copy_tree(src, dst)
    } else if file_type.is_symlink() {
        fs::read_link(src).and_then(|target| symlink(target, dst)).map_err(copy_error)
    } else {
        fs::copy(src, dst)
            .and_then(|_| misc::copy_metadata(&meta, dst))
            .map_err(copy_error)
    }
}

fn copy_tree(src: &Path, dst: &Path) -> Result<(), StageError> {
    let mut directories = Vec::new();

    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|why| StageError::Walk { why })?;
        let relative = match entry.path().strip_prefix(src) {
            Ok(relative) => relative,
            Err(_) => continue,
        };

        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .map_err(|why| StageError::Create { path: target.clone(), why })?;
            directories.push((entry.path().to_path_buf(), target));
        } else {
            copy_entry(entry.path(), &target)?;
        }
    }

    // Deepest first, as populating a directory would otherwise bump the restored times.
    for (src, dst) in directories.into_iter().rev() {
        src.symlink_metadata()
            .and_then(|meta| misc::copy_metadata(&meta, &dst))
            .map_err(|why| StageError::Copy { src, dst, why })?;
    }

    Ok(())
}

/// Removes compiled artifacts and version control directories from anywhere in the tree.
pub fn purge(root: &Path, exclusions: &Exclusions) -> Result<(), StageError> {
    let mut walker = WalkDir::new(root).min_depth(1).into_iter();

    while let Some(entry) = walker.next() {
        let entry = entry.map_err(|why| StageError::Walk { why })?;
        let path = entry.path();

        if entry.file_type().is_dir() {
            if misc::file_name_matches(path, &exclusions.vcs_dirs) {
                debug!("removing {}", path.display());
                fs::remove_dir_all(path)
                    .map_err(|why| StageError::Purge { path: path.to_path_buf(), why })?;
                walker.skip_current_dir();
            }
        } else if exclusions.is_compiled(path) {
            debug!("removing {}", path.display());
            fs::remove_file(path)
                .map_err(|why| StageError::Purge { path: path.to_path_buf(), why })?;
        }
    }

    Ok(())
}

/// Lists every compiled artifact beneath `root`.
pub fn compiled_artifacts(root: &Path, exclusions: &Exclusions) -> Result<Vec<PathBuf>, StageError> {
    let mut found = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|why| StageError::Walk { why })?;
        if !entry.file_type().is_dir() && exclusions.is_compiled(entry.path()) {
            found.push(entry.path().to_path_buf());
        }
    }

    Ok(found)
}
