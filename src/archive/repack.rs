use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use tar::{Archive, Builder, EntryType, Header};
use zip::ZipArchive;

use super::{is_symlink_mode, zip_timestamp, ArchiveError, ArchiveKind};
use crate::compress::{self, GzWriter};

/// Writes a gzipped tarball to `output` holding every entry of `original`, with the leading
/// `old_top` directory of each entry renamed to `new_top`.
pub fn repack(original: &Path, output: &Path, new_top: &str, old_top: &str) -> Result<(), ArchiveError> {
    let kind = ArchiveKind::detect(original)
        .ok_or_else(|| ArchiveError::UnsupportedArchive { path: original.to_path_buf() })?;

    info!(
        "repacking {} to {}, renaming {} to {}",
        original.display(),
        output.display(),
        old_top,
        new_top
    );

    let write_error = |why| ArchiveError::Io { path: output.to_path_buf(), why };
    let mut builder = Builder::new(compress::gzip_writer(output).map_err(write_error)?);
    builder.follow_symlinks(false);

    let rename = Rename { original, output, new_top, old_top };
    match kind {
        ArchiveKind::GzipTar => rename.copy_tarball(&mut builder)?,
        ArchiveKind::Zip => rename.copy_zip(&mut builder)?,
    }

    builder
        .into_inner()
        .and_then(compress::gzip_finish)
        .map_err(write_error)
}

struct Rename<'a> {
    original: &'a Path,
    output: &'a Path,
    new_top: &'a str,
    old_top: &'a str,
}

impl<'a> Rename<'a> {
    fn corrupt<E: ToString>(&self, why: E) -> ArchiveError {
        ArchiveError::corrupt(self.original, why)
    }

    fn write_error(&self, why: io::Error) -> ArchiveError {
        ArchiveError::Io { path: self.output.to_path_buf(), why }
    }

    fn path(&self, path: &Path) -> Result<Option<PathBuf>, ArchiveError> {
        rewrite(path, self.new_top, self.old_top)
            .map_err(|why| ArchiveError::Repack { entry: path.to_path_buf(), why })
    }

    fn copy_tarball(&self, builder: &mut Builder<GzWriter>) -> Result<(), ArchiveError> {
        let mut archive = Archive::new(compress::gzip_reader(self.original).map_err(|why| self.corrupt(why))?);

        for entry in archive.entries().map_err(|why| self.corrupt(why))? {
            let mut entry = entry.map_err(|why| self.corrupt(why))?;
            let entry_type = entry.header().entry_type();
            if entry_type.is_pax_global_extensions() {
                continue;
            }

            let original_path = entry.path().map_err(|why| self.corrupt(why))?.into_owned();
            let path = match self.path(&original_path)? {
                Some(path) => path,
                None => continue,
            };

            let mut header = entry.header().clone();
            let written = if entry_type.is_symlink() || entry_type.is_hard_link() {
                let target = entry
                    .link_name()
                    .map_err(|why| self.corrupt(why))?
                    .ok_or_else(|| self.corrupt("link entry has no target"))?
                    .into_owned();

                // Hard links name another entry of the archive, which is being renamed too.
                let target = if entry_type.is_hard_link() {
                    self.path(&target)?.unwrap_or_else(|| PathBuf::from(self.new_top))
                } else {
                    target
                };

                builder.append_link(&mut header, &path, &target)
            } else {
                builder.append_data(&mut header, &path, &mut entry)
            };

            written.map_err(|why| self.write_error(why))?;
        }

        Ok(())
    }

    fn copy_zip(&self, builder: &mut Builder<GzWriter>) -> Result<(), ArchiveError> {
        let file = File::open(self.original).map_err(|why| self.corrupt(why))?;
        let mut archive = ZipArchive::new(file).map_err(|why| self.corrupt(why))?;

        for id in 0..archive.len() {
            let mut entry = archive.by_index(id).map_err(|why| self.corrupt(why))?;
            let original_path = entry.enclosed_name().ok_or_else(|| ArchiveError::Repack {
                entry: PathBuf::from(entry.name()),
                why: "entry path escapes the archive",
            })?;

            let path = match self.path(&original_path)? {
                Some(path) => path,
                None => continue,
            };

            let mode = entry.unix_mode();
            let mut header = Header::new_gnu();
            header.set_mtime(entry.last_modified().and_then(zip_timestamp).unwrap_or(0));

            let written = if entry.is_dir() {
                header.set_entry_type(EntryType::Directory);
                header.set_mode(mode.map_or(0o755, |x| x & 0o7777));
                header.set_size(0);
                builder.append_data(&mut header, directory_name(path), io::empty())
            } else if mode.map_or(false, is_symlink_mode) {
                let mut target = String::new();
                entry.read_to_string(&mut target).map_err(|why| self.corrupt(why))?;
                header.set_entry_type(EntryType::Symlink);
                header.set_mode(0o777);
                header.set_size(0);
                builder.append_link(&mut header, &path, &target)
            } else {
                header.set_entry_type(EntryType::Regular);
                header.set_mode(mode.map_or(0o644, |x| x & 0o7777));
                header.set_size(entry.size());
                builder.append_data(&mut header, &path, &mut entry)
            };

            written.map_err(|why| self.write_error(why))?;
        }

        Ok(())
    }
}

/// Replaces the leading `old_top` component of `path` with `new_top`.
///
/// Leading `./` components are ignored, and a trailing `/` is kept. Returns `None` for the
/// archive root itself.
fn rewrite(path: &Path, new_top: &str, old_top: &str) -> Result<Option<PathBuf>, &'static str> {
    let mut components = path.components().skip_while(|x| *x == Component::CurDir);

    match components.next() {
        None => return Ok(None),
        Some(Component::Normal(top)) if top == OsStr::new(old_top) => (),
        Some(Component::Normal(_)) => return Err("entry is outside of the top-level directory"),
        Some(Component::ParentDir) => return Err("entry path escapes the archive"),
        Some(_) => return Err("entry has an absolute path"),
    }

    let mut rewritten = PathBuf::from(new_top);
    for component in components {
        match component {
            Component::Normal(part) => rewritten.push(part),
            Component::CurDir => (),
            Component::ParentDir => return Err("entry path escapes the archive"),
            _ => return Err("entry has an absolute path"),
        }
    }

    if ends_with_slash(path) {
        rewritten = directory_name(rewritten);
    }

    Ok(Some(rewritten))
}

/// Tar marks directories by a trailing `/` on their names.
fn directory_name(path: PathBuf) -> PathBuf {
    if ends_with_slash(&path) {
        return path;
    }

    let mut name = path.into_os_string();
    name.push("/");
    PathBuf::from(name)
}

fn ends_with_slash(path: &Path) -> bool {
    path.as_os_str().as_bytes().ends_with(b"/")
}
