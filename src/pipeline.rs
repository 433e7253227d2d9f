//! Drives a single run, from assembling the descriptor to handing the staged tree to a builder.

use itertools::Itertools;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempdir::TempDir;

use crate::archive::{self, ArchiveError, PremadeArchive};
use crate::builder::{BuildError, BuildRequest, PackageBuilder};
use crate::descriptor::{self, DescriptorError, Overrides, PackageDescriptor};
use crate::metadata::ProjectMetadata;
use crate::stage::{self, Exclusions, StageError, StagingRequest};

/// Prefix of the scratch directory which premade archives are expanded into.
pub const EXPANDED_PREFIX: &str = "tmp_sdist_dsc";
/// Prefix of the scratch directory which holds a repacked tarball.
pub const REPACK_PREFIX: &str = "tmp_repacking_dir";
pub const REPACKED_TARBALL: &str = "repacked_sdist.tar.gz";

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum State {
    Init,
    DescriptorBuilt,
    TreeStaged,
    ArchiveValidated,
    ArchiveSkipped,
    BuiltDsc,
    CleanedUp,
    Failed,
}

#[derive(Debug, Fail)]
pub enum PipelineError {
    #[fail(display = "{}", why)]
    Descriptor { why: DescriptorError },
    #[fail(display = "{}", why)]
    Stage { why: StageError },
    #[fail(display = "{}", why)]
    Archive { why: ArchiveError },
    #[fail(display = "{}", why)]
    Build { why: BuildError },
    #[fail(display = "the original source distribution cannot contain compiled files: {}", paths)]
    RuntimeInvariant { paths: String },
    #[fail(display = "failed to manage scratch directory in {:?}: {}", path, why)]
    Scratch { path: PathBuf, why: io::Error },
}

impl From<DescriptorError> for PipelineError {
    fn from(why: DescriptorError) -> Self { PipelineError::Descriptor { why } }
}

impl From<StageError> for PipelineError {
    fn from(why: StageError) -> Self { PipelineError::Stage { why } }
}

impl From<ArchiveError> for PipelineError {
    fn from(why: ArchiveError) -> Self { PipelineError::Archive { why } }
}

impl From<BuildError> for PipelineError {
    fn from(why: BuildError) -> Self { PipelineError::Build { why } }
}

/// The inputs of a run.
pub struct Job<'a> {
    pub project_dir: &'a Path,
    pub output_dir: &'a Path,
    pub config_files: &'a [PathBuf],
    pub overrides: &'a Overrides,
    /// A premade `.zip` or `.tar.gz` source distribution to use as the original tarball.
    pub premade: Option<&'a Path>,
    pub patch_posix: bool,
    pub remove_staged_tree: bool,
    pub exclusions: &'a Exclusions,
}

#[derive(Debug)]
pub struct Report {
    pub descriptor: PackageDescriptor,
    pub staged_tree: PathBuf,
    /// Every state the run passed through, in order.
    pub history: Vec<State>,
}

/// Runs the job to completion. Scratch directories are removed whether or not it succeeds.
pub fn run<M: ProjectMetadata, B: PackageBuilder>(
    job: &Job,
    metadata: &M,
    builder: &B,
) -> Result<Report, PipelineError> {
    let mut run = Run { job, history: vec![State::Init], scratch: Vec::new() };

    match run.execute(metadata, builder) {
        Ok((descriptor, staged_tree)) => {
            run.cleanup()?;
            run.transition(State::CleanedUp);
            Ok(Report { descriptor, staged_tree, history: run.history })
        }
        Err(why) => {
            run.transition(State::Failed);
            if let Err(cleanup) = run.cleanup() {
                error!("{}", cleanup);
            }

            Err(why)
        }
    }
}

struct Run<'a> {
    job: &'a Job<'a>,
    history: Vec<State>,
    scratch: Vec<TempDir>,
}

impl<'a> Run<'a> {
    fn transition(&mut self, next: State) {
        if let Some(current) = self.history.last() {
            debug!("{:?} -> {:?}", current, next);
        }

        self.history.push(next);
    }

    fn scratch_dir(&mut self, prefix: &str) -> Result<PathBuf, PipelineError> {
        let output_dir = self.job.output_dir;
        let dir = fs::create_dir_all(output_dir)
            .and_then(|_| TempDir::new_in(output_dir, prefix))
            .map_err(|why| PipelineError::Scratch { path: output_dir.to_path_buf(), why })?;

        let path = dir.path().to_path_buf();
        self.scratch.push(dir);
        Ok(path)
    }

    fn cleanup(&mut self) -> Result<(), PipelineError> {
        let mut result = Ok(());
        for dir in self.scratch.drain(..) {
            let path = dir.path().to_path_buf();
            debug!("removing scratch directory {}", path.display());
            if let Err(why) = dir.close() {
                result = Err(PipelineError::Scratch { path, why });
            }
        }

        result
    }

    fn execute<M: ProjectMetadata, B: PackageBuilder>(
        &mut self,
        metadata: &M,
        builder: &B,
    ) -> Result<(PackageDescriptor, PathBuf), PipelineError> {
        let job = self.job;

        let descriptor = descriptor::assemble(job.config_files, metadata, job.overrides)?;
        self.transition(State::DescriptorBuilt);

        let staged_name = descriptor.staged_dirname();
        let staged_tree = stage::stage(&StagingRequest {
            source_dir: job.project_dir,
            output_dir: job.output_dir,
            staged_name: &staged_name,
            exclusions: job.exclusions,
        })?;
        self.transition(State::TreeStaged);

        let original_tarball = match job.premade {
            Some(premade) => {
                let tarball = self.validate_premade(premade, &staged_name, &staged_tree)?;
                self.transition(State::ArchiveValidated);
                Some(tarball)
            }
            None => {
                self.transition(State::ArchiveSkipped);
                None
            }
        };

        builder.build(&BuildRequest {
            descriptor: &descriptor,
            output_dir: job.output_dir,
            staged_tree: &staged_tree,
            original_tarball: original_tarball.as_ref().map(|x| x.as_path()),
            patch_posix: job.patch_posix,
            remove_staged_tree: job.remove_staged_tree,
        })?;
        self.transition(State::BuiltDsc);

        Ok((descriptor, staged_tree))
    }

    /// Returns the tarball to use as the original tarball: the premade archive itself when
    /// `dpkg-source` will accept it, or a repacked copy of it otherwise.
    fn validate_premade(
        &mut self,
        premade: &Path,
        staged_name: &str,
        staged_tree: &Path,
    ) -> Result<PathBuf, PipelineError> {
        let expanded = self.scratch_dir(EXPANDED_PREFIX)?;
        let archive = PremadeArchive::inspect(premade, &expanded)?;

        let tarball = if archive.requires_repack(staged_name) {
            if archive.top_level != staged_name {
                warn!(
                    "the .orig.tar.gz will be generated from {}, as the directory name inside it \
                     ({}) differs from the Debianized directory name ({})",
                    premade.display(),
                    archive.top_level,
                    staged_name
                );
            } else {
                warn!(
                    "the .orig.tar.gz will be generated from {}, as it is not a gzipped tarball",
                    premade.display()
                );
            }

            let repacked = self.scratch_dir(REPACK_PREFIX)?.join(REPACKED_TARBALL);
            archive::repack(premade, &repacked, staged_name, &archive.top_level)?;
            repacked
        } else {
            premade.to_path_buf()
        };

        // The premade archive becomes the original tarball, so compiled files in either tree
        // would end up in the diff between them.
        let exclusions = self.job.exclusions;
        let mut compiled = stage::compiled_artifacts(staged_tree, exclusions)?;
        compiled.extend(stage::compiled_artifacts(&expanded, exclusions)?);
        if !compiled.is_empty() {
            return Err(PipelineError::RuntimeInvariant {
                paths: compiled.iter().map(|x| x.display()).join(", "),
            });
        }

        Ok(tarball)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::fixtures;
    use crate::compress;
    use crate::metadata::PkgInfo;
    use crate::misc;
    use std::cell::RefCell;
    use tempfile::{tempdir, TempDir as TestDir};

    /// What a builder saw when it was invoked.
    #[derive(Debug, Default)]
    struct Seen {
        original_tarball: Option<PathBuf>,
        tarball_entries: Vec<String>,
        staged_tree: PathBuf,
    }

    #[derive(Default)]
    struct RecordingBuilder {
        seen: RefCell<Vec<Seen>>,
    }

    impl PackageBuilder for RecordingBuilder {
        fn build(&self, request: &BuildRequest) -> Result<(), BuildError> {
            let tarball_entries = match request.original_tarball {
                Some(tarball) => {
                    let mut archive = tar::Archive::new(compress::gzip_reader(tarball).unwrap());
                    archive
                        .entries()
                        .unwrap()
                        .map(|x| x.unwrap().path().unwrap().display().to_string())
                        .collect()
                }
                None => Vec::new(),
            };

            self.seen.borrow_mut().push(Seen {
                original_tarball: request.original_tarball.map(Path::to_path_buf),
                tarball_entries,
                staged_tree: request.staged_tree.to_path_buf(),
            });

            Ok(())
        }
    }

    fn metadata() -> PkgInfo {
        PkgInfo {
            name: "foo".into(),
            version: "1.0".into(),
            summary: "Foo".into(),
            packages: vec!["foo".into()],
            ..PkgInfo::default()
        }
    }

    fn project() -> TestDir {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("foo/.svn")).unwrap();
        misc::write(dir.path().join("setup.py"), fixtures::SETUP_PY).unwrap();
        misc::write(dir.path().join("foo/__init__.py"), "").unwrap();
        misc::write(dir.path().join("foo/__init__.pyc"), "").unwrap();
        misc::write(dir.path().join("foo/.svn/entries"), "").unwrap();
        dir
    }

    fn scratch_dirs(output: &Path) -> Vec<String> {
        fs::read_dir(output)
            .unwrap()
            .map(|x| x.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|x| x.starts_with("tmp_"))
            .collect()
    }

    fn run_with(
        project: &Path,
        overrides: &Overrides,
        premade: Option<&Path>,
        builder: &RecordingBuilder,
    ) -> Result<Report, PipelineError> {
        let output = project.join("deb_dist");
        let exclusions = Exclusions::default();
        let job = Job {
            project_dir: project,
            output_dir: &output,
            config_files: &[],
            overrides,
            premade,
            patch_posix: false,
            remove_staged_tree: false,
            exclusions: &exclusions,
        };

        run(&job, &metadata(), builder)
    }

    #[test]
    fn stages_without_premade() {
        let project = project();
        let builder = RecordingBuilder::default();
        let report = run_with(project.path(), &Overrides::default(), None, &builder).unwrap();

        assert_eq!(report.history, vec![
            State::Init,
            State::DescriptorBuilt,
            State::TreeStaged,
            State::ArchiveSkipped,
            State::BuiltDsc,
            State::CleanedUp,
        ]);

        let staged = project.path().join("deb_dist/foo-1.0");
        assert_eq!(report.staged_tree, staged);
        assert!(staged.join("setup.py").exists());
        assert!(staged.join("foo/__init__.py").exists());
        assert!(!staged.join("foo/__init__.pyc").exists());
        assert!(!staged.join("foo/.svn").exists());
        assert!(!staged.join("deb_dist").exists());

        let seen = builder.seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].original_tarball, None);
        assert_eq!(seen[0].staged_tree, staged);
    }

    #[test]
    fn conflict_touches_nothing() {
        let project = project();
        let builder = RecordingBuilder::default();
        let overrides = Overrides {
            patch_file: Some("fix.patch".into()),
            patch_already_applied: true,
            ..Overrides::default()
        };

        match run_with(project.path(), &overrides, None, &builder) {
            Err(PipelineError::Descriptor { why: DescriptorError::ConfigConflict { .. } }) => (),
            other => panic!("expected a config conflict, got {:?}", other),
        }

        assert!(!project.path().join("deb_dist").exists());
        assert!(builder.seen.borrow().is_empty());
    }

    #[test]
    fn premade_used_directly() {
        let project = project();
        fs::remove_file(project.path().join("foo/__init__.pyc")).unwrap();
        let premade = project.path().join("dist/foo-1.0.tar.gz");
        fs::create_dir_all(project.path().join("dist")).unwrap();
        fixtures::write_tarball(&premade, &[("foo-1.0/", ""), ("foo-1.0/setup.py", fixtures::SETUP_PY)]);

        let builder = RecordingBuilder::default();
        let report = run_with(project.path(), &Overrides::default(), Some(&premade), &builder).unwrap();

        assert!(report.history.contains(&State::ArchiveValidated));
        assert_eq!(builder.seen.borrow()[0].original_tarball, Some(premade));
        assert!(scratch_dirs(&project.path().join("deb_dist")).is_empty());
    }

    #[test]
    fn premade_repacked_on_name_mismatch() {
        let project = project();
        fs::remove_file(project.path().join("foo/__init__.pyc")).unwrap();
        let premade = project.path().join("foo-upstream-1.0.tar.gz");
        fixtures::write_tarball(
            &premade,
            &[("foo-upstream-1.0/", ""), ("foo-upstream-1.0/setup.py", fixtures::SETUP_PY)],
        );

        let builder = RecordingBuilder::default();
        run_with(project.path(), &Overrides::default(), Some(&premade), &builder).unwrap();

        let seen = builder.seen.borrow();
        let tarball = seen[0].original_tarball.as_ref().unwrap();
        assert_eq!(tarball.file_name().unwrap(), REPACKED_TARBALL);
        assert!(tarball.parent().unwrap().file_name().unwrap().to_str().unwrap().starts_with(REPACK_PREFIX));
        assert_eq!(seen[0].tarball_entries, vec!["foo-1.0/", "foo-1.0/setup.py"]);
        assert!(!tarball.exists());
        assert!(scratch_dirs(&project.path().join("deb_dist")).is_empty());
    }

    #[test]
    fn premade_zip_repacked() {
        let project = project();
        fs::remove_file(project.path().join("foo/__init__.pyc")).unwrap();
        let premade = project.path().join("foo-1.0.zip");
        fixtures::write_zip(&premade, "foo-1.0");

        let builder = RecordingBuilder::default();
        run_with(project.path(), &Overrides::default(), Some(&premade), &builder).unwrap();

        let seen = builder.seen.borrow();
        assert_ne!(seen[0].original_tarball, Some(premade.clone()));
        assert!(seen[0].tarball_entries.contains(&"foo-1.0/setup.py".to_owned()));
        assert!(seen[0].tarball_entries.iter().all(|x| x.starts_with("foo-1.0")));
    }

    #[test]
    fn multiple_top_level_entries() {
        let project = project();
        let premade = project.path().join("foo-1.0.tar.gz");
        fixtures::write_tarball(&premade, &[("foo-1.0/setup.py", ""), ("other/setup.py", "")]);

        let builder = RecordingBuilder::default();
        match run_with(project.path(), &Overrides::default(), Some(&premade), &builder) {
            Err(PipelineError::Archive { why: ArchiveError::MultipleTopLevelEntries { .. } }) => (),
            other => panic!("expected multiple top-level entries, got {:?}", other),
        }

        assert!(builder.seen.borrow().is_empty());
        assert!(scratch_dirs(&project.path().join("deb_dist")).is_empty());
    }

    #[test]
    fn premade_with_compiled_files() {
        let project = project();
        fs::remove_file(project.path().join("foo/__init__.pyc")).unwrap();
        let premade = project.path().join("foo-1.0.tar.gz");
        fixtures::write_tarball(&premade, &[("foo-1.0/", ""), ("foo-1.0/foo.pyc", "")]);

        let builder = RecordingBuilder::default();
        match run_with(project.path(), &Overrides::default(), Some(&premade), &builder) {
            Err(PipelineError::RuntimeInvariant { ref paths }) => assert!(paths.ends_with("foo.pyc")),
            other => panic!("expected compiled files to be rejected, got {:?}", other),
        }

        assert!(builder.seen.borrow().is_empty());
        assert!(scratch_dirs(&project.path().join("deb_dist")).is_empty());
    }

    #[test]
    fn failed_repack_removes_scratch() {
        let project = project();
        fs::remove_file(project.path().join("foo/__init__.pyc")).unwrap();
        let premade = project.path().join("foo-upstream-1.0.tar.gz");

        // Expansion drops the `..` entry, but repacking refuses it.
        let mut builder = tar::Builder::new(compress::gzip_writer(&premade).unwrap());
        let entries = [
            ("foo-upstream-1.0/setup.py", fixtures::SETUP_PY),
            ("foo-upstream-1.0/../escape.py", "x"),
        ];

        for &(name, contents) in &entries {
            let mut header = tar::Header::new_gnu();
            header.as_old_mut().name[..name.len()].copy_from_slice(name.as_bytes());
            header.set_entry_type(tar::EntryType::Regular);
            header.set_mode(0o644);
            header.set_size(contents.len() as u64);
            header.set_cksum();
            builder.append(&header, contents.as_bytes()).unwrap();
        }
        compress::gzip_finish(builder.into_inner().unwrap()).unwrap();

        let recorder = RecordingBuilder::default();
        match run_with(project.path(), &Overrides::default(), Some(&premade), &recorder) {
            Err(PipelineError::Archive { why: ArchiveError::Repack { ref entry, .. } }) => {
                assert_eq!(entry, Path::new("foo-upstream-1.0/../escape.py"))
            }
            other => panic!("expected a repack error, got {:?}", other),
        }

        assert!(recorder.seen.borrow().is_empty());
        assert!(!project.path().join("escape.py").exists());
        assert!(scratch_dirs(&project.path().join("deb_dist")).is_empty());
    }

    #[test]
    fn empty_premade_removes_scratch() {
        let project = project();
        let premade = project.path().join("foo-1.0.tar.gz");
        fixtures::write_tarball(&premade, &[]);

        let builder = RecordingBuilder::default();
        match run_with(project.path(), &Overrides::default(), Some(&premade), &builder) {
            Err(PipelineError::Archive { why: ArchiveError::EmptyArchive { ref path } }) => {
                assert_eq!(path, &premade)
            }
            other => panic!("expected an empty archive, got {:?}", other),
        }

        assert!(builder.seen.borrow().is_empty());
        assert!(scratch_dirs(&project.path().join("deb_dist")).is_empty());
    }
}
