use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use std::path::PathBuf;

use crate::descriptor::Overrides;
use crate::options::{self, OptionKind, OptionSpec, OPTIONS};

pub const CONFIG_SUBCOMMAND: &str = "config";

#[derive(Debug, Fail)]
pub enum CliError {
    #[fail(display = "expected KEY=VALUE, found '{}'", arg)]
    Assignment { arg: String },
    #[fail(display = "invalid patch level: {}", value)]
    PatchLevel { value: String },
}

#[derive(Debug, PartialEq)]
pub enum Action {
    Build,
    /// Print the merged value of a config key.
    Fetch(String),
}

/// Everything the command line asked for.
#[derive(Debug)]
pub struct Invocation {
    pub action: Action,
    pub project: PathBuf,
    pub dist_dir: PathBuf,
    pub extra_cfg_file: Option<PathBuf>,
    pub premade: Option<PathBuf>,
    pub overrides: Overrides,
    pub patch_posix: bool,
    pub remove_staged_tree: bool,
    pub verbosity: u64,
}

pub fn app() -> App<'static, 'static> {
    App::new("sdist-dsc")
        .version(crate_version!())
        .about("Stages a Python project as a Debian source package")
        .setting(AppSettings::ArgsNegateSubcommands)
        .args(&OPTIONS.iter().map(argument).collect::<Vec<_>>())
        .subcommand(
            SubCommand::with_name(CONFIG_SUBCOMMAND)
                .about("Prints the merged value of a config key")
                .arg(Arg::with_name("KEY").required(true)),
        )
}

fn argument(spec: &OptionSpec) -> Arg<'static, 'static> {
    let mut arg = Arg::with_name(spec.name).help(spec.effect);
    if spec.kind != OptionKind::Positional {
        arg = arg.long(spec.name);
    }

    if let Some(short) = spec.short {
        arg = arg.short(short);
    }

    if let Some(default) = spec.default {
        arg = arg.default_value(default);
    }

    match spec.kind {
        OptionKind::Positional => arg.index(1),
        OptionKind::Value => arg.takes_value(true),
        OptionKind::Integer => arg.takes_value(true).validator(|value| {
            value.parse::<u32>().map(|_| ()).map_err(|_| format!("'{}' is not an integer", value))
        }),
        OptionKind::Flag => arg,
        OptionKind::Counted => arg.multiple(true),
        OptionKind::Repeated => arg.takes_value(true).multiple(true).number_of_values(1),
    }
}

impl Invocation {
    pub fn from_matches(matches: &ArgMatches) -> Result<Invocation, CliError> {
        let action = match matches.subcommand() {
            (CONFIG_SUBCOMMAND, Some(config)) => {
                Action::Fetch(config.value_of("KEY").unwrap_or_default().to_owned())
            }
            _ => Action::Build,
        };

        let path = |name: &str| matches.value_of(name).map(PathBuf::from);
        let string = |name: &str| matches.value_of(name).map(String::from);

        let patch_level = match matches.value_of(options::PATCH_LEVEL) {
            Some(value) => Some(
                value.parse::<u32>().map_err(|_| CliError::PatchLevel { value: value.to_owned() })?,
            ),
            None => None,
        };

        let settings = matches
            .values_of(options::SET)
            .into_iter()
            .flatten()
            .map(parse_assignment)
            .collect::<Result<Vec<_>, _>>()?;

        // A distribution given on the command line outranks the config files; its default does not.
        let distribution = if matches.occurrences_of(options::DEFAULT_DISTRIBUTION) > 0 {
            string(options::DEFAULT_DISTRIBUTION)
        } else {
            None
        };

        Ok(Invocation {
            action,
            project: path(options::PROJECT).unwrap_or_else(|| PathBuf::from(".")),
            dist_dir: path(options::DIST_DIR)
                .or_else(|| options::find(options::DIST_DIR).and_then(|x| x.default).map(PathBuf::from))
                .unwrap_or_default(),
            extra_cfg_file: path(options::EXTRA_CFG_FILE),
            premade: path(options::USE_PREMADE_DISTFILE),
            overrides: Overrides {
                maintainer: string(options::DEFAULT_MAINTAINER),
                distribution,
                patch_file: string(options::PATCH_FILE),
                patch_level,
                patch_already_applied: matches.is_present(options::PATCH_ALREADY_APPLIED),
                settings,
            },
            patch_posix: matches.is_present(options::PATCH_POSIX),
            remove_staged_tree: matches.is_present(options::REMOVE_EXPANDED_SOURCE_DIR),
            verbosity: matches.occurrences_of(options::VERBOSE),
        })
    }
}

fn parse_assignment(arg: &str) -> Result<(String, String), CliError> {
    match arg.find('=') {
        Some(pos) if pos > 0 => Ok((arg[..pos].trim().to_owned(), arg[pos + 1..].trim().to_owned())),
        _ => Err(CliError::Assignment { arg: arg.to_owned() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invocation(args: &[&str]) -> Invocation {
        let args = ["sdist-dsc"].iter().chain(args.iter()).cloned().collect::<Vec<_>>();
        let matches = app().get_matches_from_safe(args).unwrap();
        Invocation::from_matches(&matches).unwrap()
    }

    #[test]
    fn defaults() {
        let invocation = invocation(&[]);
        assert_eq!(invocation.action, Action::Build);
        assert_eq!(invocation.project, PathBuf::from("."));
        assert_eq!(invocation.dist_dir, PathBuf::from("deb_dist"));
        assert_eq!(invocation.overrides.distribution, None);
        assert_eq!(invocation.overrides.patch_level, None);
        assert!(!invocation.overrides.patch_already_applied);
        assert_eq!(invocation.verbosity, 0);
    }

    #[test]
    fn every_option() {
        let invocation = invocation(&[
            "project",
            "-d", "out",
            "-z", "bionic",
            "-m", "Jane Doe <jane@x.com>",
            "-x", "extra.toml",
            "-p", "fix.patch",
            "-l", "1",
            "--patch-posix",
            "-r",
            "-P", "dist/foo-1.0.zip",
            "--set", "Debian-Version=0ubuntu1",
            "--set", "Depends = python3-six",
            "-vv",
        ]);

        assert_eq!(invocation.project, PathBuf::from("project"));
        assert_eq!(invocation.dist_dir, PathBuf::from("out"));
        assert_eq!(invocation.extra_cfg_file, Some(PathBuf::from("extra.toml")));
        assert_eq!(invocation.premade, Some(PathBuf::from("dist/foo-1.0.zip")));
        assert!(invocation.patch_posix);
        assert!(invocation.remove_staged_tree);
        assert_eq!(invocation.verbosity, 2);

        let overrides = invocation.overrides;
        assert_eq!(overrides.distribution.as_ref().map(|x| x.as_str()), Some("bionic"));
        assert_eq!(overrides.maintainer.as_ref().map(|x| x.as_str()), Some("Jane Doe <jane@x.com>"));
        assert_eq!(overrides.patch_file.as_ref().map(|x| x.as_str()), Some("fix.patch"));
        assert_eq!(overrides.patch_level, Some(1));
        assert_eq!(overrides.settings, vec![
            ("Debian-Version".to_owned(), "0ubuntu1".to_owned()),
            ("Depends".to_owned(), "python3-six".to_owned()),
        ]);
    }

    #[test]
    fn config_subcommand() {
        let invocation = invocation(&["config", "Suite"]);
        assert_eq!(invocation.action, Action::Fetch("Suite".into()));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(app().get_matches_from_safe(vec!["sdist-dsc", "-l", "one"]).is_err());

        let matches = app().get_matches_from_safe(vec!["sdist-dsc", "--set", "Suite"]).unwrap();
        match Invocation::from_matches(&matches) {
            Err(CliError::Assignment { ref arg }) if arg == "Suite" => (),
            other => panic!("expected a bad assignment, got {:?}", other),
        }
    }
}
