//! Every option the command line accepts, as data.

pub const PROJECT: &str = "project";
pub const DIST_DIR: &str = "dist-dir";
pub const DEFAULT_DISTRIBUTION: &str = "default-distribution";
pub const DEFAULT_MAINTAINER: &str = "default-maintainer";
pub const EXTRA_CFG_FILE: &str = "extra-cfg-file";
pub const PATCH_FILE: &str = "patch-file";
pub const PATCH_LEVEL: &str = "patch-level";
pub const PATCH_POSIX: &str = "patch-posix";
pub const PATCH_ALREADY_APPLIED: &str = "patch-already-applied";
pub const REMOVE_EXPANDED_SOURCE_DIR: &str = "remove-expanded-source-dir";
pub const USE_PREMADE_DISTFILE: &str = "use-premade-distfile";
pub const SET: &str = "set";
pub const VERBOSE: &str = "verbose";

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum OptionKind {
    /// The first positional argument.
    Positional,
    /// Takes a single value.
    Value,
    /// Takes a single non-negative integer.
    Integer,
    Flag,
    /// A flag which may be repeated, and is counted.
    Counted,
    /// Takes a value, and may be given more than once.
    Repeated,
}

#[derive(Clone, Copy, Debug)]
pub struct OptionSpec {
    pub name: &'static str,
    pub short: Option<&'static str>,
    pub kind: OptionKind,
    pub default: Option<&'static str>,
    pub effect: &'static str,
}

pub const OPTIONS: &[OptionSpec] = &[
    OptionSpec {
        name: PROJECT,
        short: None,
        kind: OptionKind::Positional,
        default: Some("."),
        effect: "root directory of the Python project",
    },
    OptionSpec {
        name: DIST_DIR,
        short: Some("d"),
        kind: OptionKind::Value,
        default: Some("deb_dist"),
        effect: "directory to put the source package in, relative to the project",
    },
    OptionSpec {
        name: DEFAULT_DISTRIBUTION,
        short: Some("z"),
        kind: OptionKind::Value,
        default: Some("unstable"),
        effect: "distribution written to the changelog, unless a config file sets a Suite",
    },
    OptionSpec {
        name: DEFAULT_MAINTAINER,
        short: Some("m"),
        kind: OptionKind::Value,
        default: None,
        effect: "maintainer name and email, overriding config files and project metadata",
    },
    OptionSpec {
        name: EXTRA_CFG_FILE,
        short: Some("x"),
        kind: OptionKind::Value,
        default: None,
        effect: "additional config file, applied after the project's own",
    },
    OptionSpec {
        name: PATCH_FILE,
        short: Some("p"),
        kind: OptionKind::Value,
        default: None,
        effect: "patch to apply to the staged tree",
    },
    OptionSpec {
        name: PATCH_LEVEL,
        short: Some("l"),
        kind: OptionKind::Integer,
        default: None,
        effect: "number of leading path components patch strips (-p)",
    },
    OptionSpec {
        name: PATCH_POSIX,
        short: None,
        kind: OptionKind::Flag,
        default: None,
        effect: "apply the patch with --posix",
    },
    OptionSpec {
        name: PATCH_ALREADY_APPLIED,
        short: Some("a"),
        kind: OptionKind::Flag,
        default: None,
        effect: "the project tree is already patched",
    },
    OptionSpec {
        name: REMOVE_EXPANDED_SOURCE_DIR,
        short: Some("r"),
        kind: OptionKind::Flag,
        default: None,
        effect: "remove the staged tree once the source package is built",
    },
    OptionSpec {
        name: USE_PREMADE_DISTFILE,
        short: Some("P"),
        kind: OptionKind::Value,
        default: None,
        effect: "premade .zip or .tar.gz source distribution to use as the original tarball",
    },
    OptionSpec {
        name: SET,
        short: None,
        kind: OptionKind::Repeated,
        default: None,
        effect: "override a config key, as KEY=VALUE",
    },
    OptionSpec {
        name: VERBOSE,
        short: Some("v"),
        kind: OptionKind::Counted,
        default: None,
        effect: "log more; may be repeated",
    },
];

pub fn find(name: &str) -> Option<&'static OptionSpec> {
    OPTIONS.iter().find(|x| x.name == name)
}
