extern crate chrono;
extern crate deflate;
extern crate failure;
extern crate fern;
extern crate glob;
extern crate itertools;
extern crate libflate;
extern crate regex;
extern crate serde;
extern crate tar;
extern crate tempdir;
extern crate toml;
extern crate utime;
extern crate walkdir;
extern crate zip;

#[macro_use]
extern crate clap;
#[macro_use]
extern crate failure_derive;
#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;

mod archive;
mod builder;
mod cli;
mod compress;
pub mod config;
pub mod debian;
mod descriptor;
mod metadata;
mod misc;
mod options;
mod pipeline;
mod stage;

use log::LevelFilter;
use std::{io, process::exit};

use builder::DpkgSource;
use cli::{Action, Invocation};
use config::{ConfigError, ConfigFetch};
use metadata::{MetadataError, PkgInfo, ProjectMetadata};
use pipeline::{Job, PipelineError};
use stage::Exclusions;

fn main() {
    let matches = cli::app().get_matches();
    let invocation = match Invocation::from_matches(&matches) {
        Ok(invocation) => invocation,
        Err(why) => {
            eprintln!("sdist-dsc: {}", why);
            exit(1);
        }
    };

    if let Err(why) = setup_logging(invocation.verbosity) {
        eprintln!("sdist-dsc: failed to set up logging: {}", why);
    }

    if let Err(why) = run(&invocation) {
        error!("{}", why);
        exit(1);
    }
}

fn setup_logging(verbosity: u64) -> Result<(), log::SetLoggerError> {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!("sdist-dsc [{}] {}", record.level(), message))
        })
        .level(level)
        .chain(io::stderr())
        .apply()
}

#[derive(Debug, Fail)]
pub enum AppError {
    #[fail(display = "{}", why)]
    Metadata { why: MetadataError },
    #[fail(display = "{}", why)]
    Config { why: ConfigError },
    #[fail(display = "config field not found: {}", key)]
    ConfigKey { key: String },
    #[fail(display = "{}", why)]
    Pipeline { why: PipelineError },
}

impl From<MetadataError> for AppError {
    fn from(why: MetadataError) -> Self { AppError::Metadata { why } }
}

impl From<ConfigError> for AppError {
    fn from(why: ConfigError) -> Self { AppError::Config { why } }
}

impl From<PipelineError> for AppError {
    fn from(why: PipelineError) -> Self { AppError::Pipeline { why } }
}

fn run(invocation: &Invocation) -> Result<(), AppError> {
    let project = &invocation.project;
    let metadata = PkgInfo::load(project)?;
    let config_files = config::discover(project, invocation.extra_cfg_file.as_ref().map(|x| x.as_path()));

    match invocation.action {
        Action::Fetch(ref key) => {
            let mut section = config::load(&config_files, metadata.name())?;
            for &(ref key, ref value) in &invocation.overrides.settings {
                section.update(key, value.clone())?;
            }

            match section.fetch(key) {
                Some(value) => println!("{}: {}", key, value),
                None => return Err(AppError::ConfigKey { key: key.clone() }),
            }
        }
        Action::Build => {
            let output_dir = project.join(&invocation.dist_dir);
            let exclusions = Exclusions::default();
            let job = Job {
                project_dir: project,
                output_dir: &output_dir,
                config_files: &config_files,
                overrides: &invocation.overrides,
                premade: invocation.premade.as_ref().map(|x| x.as_path()),
                patch_posix: invocation.patch_posix,
                remove_staged_tree: invocation.remove_staged_tree,
                exclusions: &exclusions,
            };

            let report = pipeline::run(&job, &metadata, &DpkgSource)?;
            info!(
                "built {} {} from {}",
                report.descriptor.source(),
                report.descriptor.full_version(),
                report.staged_tree.display()
            );
        }
    }

    Ok(())
}
