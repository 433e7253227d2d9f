//! The final step of a run: turning a staged tree into a Debian source package.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use tar::Builder;

use crate::compress;
use crate::debian;
use crate::descriptor::PackageDescriptor;

#[derive(Debug, Fail)]
pub enum BuildError {
    #[fail(display = "failed to create the original tarball at {:?}: {}", path, why)]
    OrigTarball { path: PathBuf, why: io::Error },
    #[fail(display = "failed to apply patch {:?}: {}", patch, why)]
    Patch { patch: PathBuf, why: io::Error },
    #[fail(display = "failed to write Debian files in {:?}: {}", path, why)]
    DebianFiles { path: PathBuf, why: io::Error },
    #[fail(display = "dpkg-source failed to build {:?}: {}", path, why)]
    DpkgSource { path: PathBuf, why: io::Error },
    #[fail(display = "failed to remove the staged tree at {:?}: {}", path, why)]
    Remove { path: PathBuf, why: io::Error },
}

/// Everything a builder needs to produce the source package.
pub struct BuildRequest<'a> {
    pub descriptor: &'a PackageDescriptor,
    pub output_dir: &'a Path,
    pub staged_tree: &'a Path,
    /// A tarball to use as the original tarball, rather than generating one from the tree.
    pub original_tarball: Option<&'a Path>,
    pub patch_posix: bool,
    pub remove_staged_tree: bool,
}

pub trait PackageBuilder {
    fn build(&self, request: &BuildRequest) -> Result<(), BuildError>;
}

/// Writes a minimal `debian/` directory into the staged tree, and hands it to `dpkg-source -b`.
pub struct DpkgSource;

impl PackageBuilder for DpkgSource {
    fn build(&self, request: &BuildRequest) -> Result<(), BuildError> {
        let descriptor = request.descriptor;

        let orig = place_orig_tarball(request)?;
        info!("original tarball is at {}", orig.display());

        if let Some(patch) = descriptor.patch_file() {
            apply_patch(
                request.staged_tree,
                Path::new(patch),
                descriptor.patch_level().unwrap_or(0),
                request.patch_posix,
            )?;
        }

        let debian_dir = request.staged_tree.join("debian");
        debian::create_missing_files(&debian_dir, descriptor)
            .map_err(|why| BuildError::DebianFiles { path: debian_dir.clone(), why })?;

        dpkg_source(request.output_dir, &descriptor.staged_dirname())?;

        if request.remove_staged_tree {
            info!("removing {}", request.staged_tree.display());
            fs::remove_dir_all(request.staged_tree).map_err(|why| BuildError::Remove {
                path: request.staged_tree.to_path_buf(),
                why,
            })?;
        }

        Ok(())
    }
}

/// Ensures `<output>/<source>_<version>.orig.tar.gz` exists, copying the supplied tarball there
/// or generating one from the staged tree.
pub fn place_orig_tarball(request: &BuildRequest) -> Result<PathBuf, BuildError> {
    let descriptor = request.descriptor;
    let destination = request.output_dir.join(descriptor.orig_tarball_name());
    let error = |why| BuildError::OrigTarball { path: destination.clone(), why };

    match request.original_tarball {
        Some(original) => {
            if !is_same_file(original, &destination) {
                info!("copying {} to {}", original.display(), destination.display());
                fs::copy(original, &destination).map_err(error)?;
            }
        }
        None => write_orig_tarball(request.staged_tree, &descriptor.staged_dirname(), &destination)
            .map_err(error)?,
    }

    Ok(destination)
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Archives `tree` into a gzipped tarball whose entries all sit beneath `prefix`.
pub fn write_orig_tarball(tree: &Path, prefix: &str, destination: &Path) -> io::Result<()> {
    info!("generating {} from {}", destination.display(), tree.display());
    let mut builder = Builder::new(compress::gzip_writer(destination)?);
    builder.follow_symlinks(false);
    builder.append_dir_all(prefix, tree)?;
    builder.into_inner().and_then(compress::gzip_finish)
}

pub fn apply_patch(tree: &Path, patch: &Path, level: u32, posix: bool) -> Result<(), BuildError> {
    let error = |why| BuildError::Patch { patch: patch.to_path_buf(), why };
    let patch = env::current_dir().map_err(error)?.join(patch);

    info!("applying {} to {}", patch.display(), tree.display());
    let mut command = Command::new("patch");
    command.arg(format!("-p{}", level));
    if posix {
        command.arg("--posix");
    }

    let exit_status = command
        .arg("-i")
        .arg(&patch)
        .current_dir(tree)
        .status()
        .map_err(error)?;

    if exit_status.success() {
        Ok(())
    } else {
        Err(error(io::Error::new(io::ErrorKind::Other, format!("patch exited with {}", exit_status))))
    }
}

/// Runs `dpkg-source -b` on the staged directory from within the output directory.
pub fn dpkg_source(output_dir: &Path, staged_dirname: &str) -> Result<(), BuildError> {
    let error = |why| BuildError::DpkgSource { path: output_dir.join(staged_dirname), why };

    info!("running dpkg-source -b {} in {}", staged_dirname, output_dir.display());
    let exit_status = Command::new("dpkg-source")
        .args(&["-b", staged_dirname])
        .current_dir(output_dir)
        .status()
        .map_err(error)?;

    if exit_status.success() {
        Ok(())
    } else {
        Err(error(io::Error::new(
            io::ErrorKind::Other,
            format!("dpkg-source exited with {}", exit_status),
        )))
    }
}
