use std::fs::{self, File, Metadata};
use std::io::{self, Write};
use std::os::unix::fs::MetadataExt;
use std::path::Path;

pub fn write<P: AsRef<Path>, C: AsRef<[u8]>>(path: P, contents: C) -> io::Result<()> {
    File::create(path)?.write_all(contents.as_ref())
}

/// Writes `contents` to `path` only if nothing exists there yet.
pub fn nonexistent_then_write(path: &Path, contents: &[u8]) -> io::Result<bool> {
    if path.exists() {
        Ok(false)
    } else {
        write(path, contents).map(|_| true)
    }
}

/// Applies the permissions and access / modification times of `meta` to `dst`.
///
/// Symlinks are skipped, as neither call can target the link itself.
pub fn copy_metadata(meta: &Metadata, dst: &Path) -> io::Result<()> {
    if meta.file_type().is_symlink() {
        return Ok(());
    }

    fs::set_permissions(dst, meta.permissions())?;
    set_times(dst, meta.atime().max(0) as u64, meta.mtime().max(0) as u64)
}

pub fn set_times(path: &Path, accessed: u64, modified: u64) -> io::Result<()> {
    utime::set_file_times(path, accessed as i64, modified as i64)
}

pub fn file_name_matches(path: &Path, names: &[String]) -> bool {
    path.file_name()
        .and_then(|x| x.to_str())
        .map_or(false, |name| names.iter().any(|x| x == name))
}
