use std::cmp::Reverse;
use std::fs::{self, File};
use std::io::{self, Read};
use std::os::unix::fs::{symlink, PermissionsExt};
use std::path::{Component, Path, PathBuf};
use tar::Archive;
use zip::ZipArchive;

use super::{is_symlink_mode, zip_timestamp, ArchiveError, ArchiveKind};
use crate::compress;
use crate::misc;

/// Extracts the archive at `src` into the `dst` directory, creating it if necessary.
pub fn expand(src: &Path, dst: &Path) -> Result<ArchiveKind, ArchiveError> {
    let kind = ArchiveKind::detect(src)
        .ok_or_else(|| ArchiveError::UnsupportedArchive { path: src.to_path_buf() })?;

    fs::create_dir_all(dst)
        .map_err(|why| ArchiveError::Io { path: dst.to_path_buf(), why })?;

    info!("expanding {} into {}", src.display(), dst.display());
    match kind {
        ArchiveKind::GzipTar => untar(src, dst).map_err(|why| ArchiveError::corrupt(src, why))?,
        ArchiveKind::Zip => unzip(src, dst)?,
    }

    Ok(kind)
}

fn untar(src: &Path, dst: &Path) -> io::Result<()> {
    let mut archive = Archive::new(compress::gzip_reader(src)?);
    archive.set_preserve_permissions(true);
    archive.set_preserve_mtime(true);
    archive.unpack(dst)
}

fn unzip(src: &Path, dst: &Path) -> Result<(), ArchiveError> {
    let corrupt = |why: String| ArchiveError::corrupt(src, why);
    let file = File::open(src).map_err(|why| corrupt(why.to_string()))?;
    let mut archive = ZipArchive::new(file).map_err(|why| corrupt(why.to_string()))?;
    let mut directories = Vec::new();

    for id in 0..archive.len() {
        let mut entry = archive.by_index(id).map_err(|why| corrupt(why.to_string()))?;
        let relative = entry
            .enclosed_name()
            .ok_or_else(|| corrupt(format!("entry escapes the archive: {}", entry.name())))?;

        if let Some(link) = linked_ancestor(dst, &relative) {
            return Err(corrupt(format!(
                "entry {} would be written through the symlink {}",
                relative.display(),
                link.display()
            )));
        }

        let path = dst.join(&relative);
        let mode = entry.unix_mode();
        let mtime = entry.last_modified().and_then(zip_timestamp);

        let written = if entry.is_dir() {
            directories.push((path.clone(), mode, mtime));
            fs::create_dir_all(&path)
        } else if mode.map_or(false, is_symlink_mode) {
            let mut target = String::new();
            entry.read_to_string(&mut target).map_err(|why| corrupt(why.to_string()))?;
            if !stays_within(&relative, Path::new(&target)) {
                return Err(corrupt(format!(
                    "symlink {} points outside the archive: {}",
                    relative.display(),
                    target
                )));
            }

            create_parent(&path).and_then(|_| symlink(&target, &path))
        } else {
            create_parent(&path)
                .and_then(|_| File::create(&path))
                .and_then(|mut file| io::copy(&mut entry, &mut file))
                .and_then(|_| restore(&path, mode, mtime))
        };

        written.map_err(|why| ArchiveError::Io { path, why })?;
    }

    // Parents are restored after their children, which would otherwise update their times.
    directories.sort_by_key(|x| Reverse(x.0.components().count()));
    for (path, mode, mtime) in directories {
        restore(&path, mode, mtime).map_err(|why| ArchiveError::Io { path, why })?;
    }

    Ok(())
}

fn create_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) => fs::create_dir_all(parent),
        None => Ok(()),
    }
}

/// The first path from `dst` down to `dst/relative` which already exists as a symlink.
fn linked_ancestor(dst: &Path, relative: &Path) -> Option<PathBuf> {
    let mut path = dst.to_path_buf();
    for component in relative.components() {
        path.push(component);
        match fs::symlink_metadata(&path) {
            Ok(ref meta) if meta.file_type().is_symlink() => return Some(path),
            Ok(_) => (),
            Err(_) => return None,
        }
    }

    None
}

/// Whether a symlink at `link`, relative to the archive root, resolves to a path inside it.
fn stays_within(link: &Path, target: &Path) -> bool {
    let mut depth = link.components().count().saturating_sub(1);
    for component in target.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => (),
            Component::ParentDir if depth > 0 => depth -= 1,
            _ => return false,
        }
    }

    true
}

fn restore(path: &Path, mode: Option<u32>, mtime: Option<u64>) -> io::Result<()> {
    if let Some(mode) = mode {
        fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777))?;
    }

    if let Some(mtime) = mtime {
        misc::set_times(path, mtime, mtime)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::fixtures;
    use std::os::unix::fs::MetadataExt;
    use std::io::Write;
    use tempfile::tempdir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    /// Writes a zip whose entries are `(name, symlink target)` pairs; names ending in `/` are
    /// directories, and entries without a target are empty files.
    fn write_entries(path: &Path, entries: &[(&str, Option<&str>)]) {
        let options = SimpleFileOptions::default();
        let mut writer = ZipWriter::new(File::create(path).unwrap());
        for &(name, target) in entries {
            match target {
                Some(target) => writer.add_symlink(name, target, options).unwrap(),
                None if name.ends_with('/') => writer.add_directory(name, options).unwrap(),
                None => {
                    writer.start_file(name, options).unwrap();
                    writer.write_all(b"x").unwrap();
                }
            }
        }
        writer.finish().unwrap();
    }

    fn expect_corrupt(archive: &Path, target: &Path) {
        match expand(archive, target) {
            Err(ArchiveError::ArchiveCorrupt { .. }) => (),
            other => panic!("expected the archive to be rejected, got {:?}", other),
        }
    }

    #[test]
    fn expand_zip() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("foo-1.0.zip");
        let target = dir.path().join("expanded");
        fixtures::write_zip(&archive, "foo-1.0");

        assert_eq!(expand(&archive, &target).unwrap(), ArchiveKind::Zip);

        let setup = target.join("foo-1.0/setup.py");
        assert_eq!(fs::read_to_string(&setup).unwrap(), fixtures::SETUP_PY);
        assert_eq!(setup.metadata().unwrap().mode() & 0o777, 0o755);
        assert_eq!(setup.metadata().unwrap().mtime(), fixtures::ZIP_MTIME);
        assert_eq!(target.join("foo-1.0/foo").metadata().unwrap().mtime(), fixtures::ZIP_MTIME);
        assert_eq!(
            fs::read_link(target.join("foo-1.0/foo/alias.py")).unwrap(),
            Path::new("__init__.py")
        );
    }

    #[test]
    fn no_writes_through_symlinks() {
        let dir = tempdir().unwrap();
        let outside = dir.path().join("outside");
        fs::create_dir(&outside).unwrap();

        let absolute = dir.path().join("absolute.zip");
        let outside_str = outside.to_str().unwrap();
        write_entries(&absolute, &[
            ("foo-1.0/", None),
            ("foo-1.0/link", Some(outside_str)),
            ("foo-1.0/link/pwned", None),
        ]);
        expect_corrupt(&absolute, &dir.path().join("absolute"));

        let relative = dir.path().join("relative.zip");
        write_entries(&relative, &[
            ("foo-1.0/", None),
            ("foo-1.0/link", Some("../../outside")),
            ("foo-1.0/link/pwned", None),
        ]);
        expect_corrupt(&relative, &dir.path().join("relative"));

        let internal = dir.path().join("internal.zip");
        write_entries(&internal, &[
            ("foo-1.0/", None),
            ("foo-1.0/sub/", None),
            ("foo-1.0/link", Some("sub")),
            ("foo-1.0/link/pwned", None),
        ]);
        expect_corrupt(&internal, &dir.path().join("internal"));

        assert!(!outside.join("pwned").exists());
        assert!(!dir.path().join("internal/foo-1.0/sub/pwned").exists());
    }

    #[test]
    fn escaping_names_are_rejected() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("foo-1.0.zip");
        write_entries(&archive, &[("foo-1.0/", None), ("../evil.py", None)]);

        expect_corrupt(&archive, &dir.path().join("expanded"));
        assert!(!dir.path().join("evil.py").exists());
    }

    #[test]
    fn link_targets() {
        assert!(stays_within(Path::new("foo-1.0/foo/alias.py"), Path::new("__init__.py")));
        assert!(stays_within(Path::new("foo-1.0/foo/alias.py"), Path::new("../../foo-1.0/setup.py")));
        assert!(!stays_within(Path::new("foo-1.0/alias.py"), Path::new("../../setup.py")));
        assert!(!stays_within(Path::new("foo-1.0/alias.py"), Path::new("/etc/passwd")));
    }

    #[test]
    fn expand_tarball() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("foo-1.0.tar.gz");
        let target = dir.path().join("expanded");
        fixtures::write_tarball(&archive, &[("foo-1.0/", ""), ("foo-1.0/PKG-INFO", "abc")]);

        assert_eq!(expand(&archive, &target).unwrap(), ArchiveKind::GzipTar);

        let meta = target.join("foo-1.0/PKG-INFO").metadata().unwrap();
        assert_eq!(fs::read_to_string(target.join("foo-1.0/PKG-INFO")).unwrap(), "abc");
        assert_eq!(meta.mode() & 0o777, 0o640);
        assert_eq!(meta.mtime(), fixtures::TAR_MTIME);
    }

    #[test]
    fn unsupported_and_corrupt() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("expanded");

        let bzip = dir.path().join("foo-1.0.tar.bz2");
        misc::write(&bzip, "").unwrap();
        match expand(&bzip, &target) {
            Err(ArchiveError::UnsupportedArchive { .. }) => (),
            other => panic!("expected an unsupported archive, got {:?}", other),
        }

        let garbage = dir.path().join("foo-1.0.zip");
        misc::write(&garbage, "not a zip").unwrap();
        match expand(&garbage, &target) {
            Err(ArchiveError::ArchiveCorrupt { .. }) => (),
            other => panic!("expected a corrupt archive, got {:?}", other),
        }
    }
}
