use itertools::Itertools;
use std::fmt::Write;
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use crate::descriptor::PackageDescriptor;
use crate::misc::nonexistent_then_write;

pub const SOURCE_FORMAT: &str = "1.0";
pub const COMPAT: &str = "9";
pub const STANDARDS_VERSION: &str = "3.9.8";

/// Writes the files `dpkg-source` requires into `debian_dir`. Files which already exist are
/// left as they are, so that a project may ship its own.
pub fn create_missing_files(debian_dir: &Path, descriptor: &PackageDescriptor) -> io::Result<()> {
    let source_dir = debian_dir.join("source");
    if !source_dir.exists() {
        fs::create_dir_all(&source_dir)?;
    }

    nonexistent_then_write(&source_dir.join("format"), [SOURCE_FORMAT, "\n"].concat().as_bytes())?;
    nonexistent_then_write(&debian_dir.join("compat"), [COMPAT, "\n"].concat().as_bytes())?;
    nonexistent_then_write(&debian_dir.join("control"), control(descriptor).as_bytes())?;

    let changelog = changelog(descriptor, &chrono::Local::now().to_rfc2822());
    nonexistent_then_write(&debian_dir.join("changelog"), changelog.as_bytes())?;

    let rules_path = debian_dir.join("rules");
    if nonexistent_then_write(&rules_path, rules(descriptor).as_bytes())? {
        fs::set_permissions(&rules_path, fs::Permissions::from_mode(0o755))?;
    }

    Ok(())
}

pub fn control(descriptor: &PackageDescriptor) -> String {
    let python = if descriptor.has_ext_modules() { "python3-all-dev" } else { "python3-all" };
    let build_depends = ["debhelper (>= 9)", "dh-python", python, "python3-setuptools"]
        .iter()
        .cloned()
        .chain(descriptor.build_depends().iter().map(|x| x.as_str()))
        .join(",\n ");

    let mut depends = vec!["${misc:Depends}", "${python3:Depends}"];
    if descriptor.has_ext_modules() {
        depends.push("${shlibs:Depends}");
    }

    let depends = depends
        .into_iter()
        .chain(descriptor.depends().iter().map(|x| x.as_str()))
        .join(",\n ");

    let mut control = String::new();
    let _ = writeln!(control, "Source: {}", descriptor.source());
    let _ = writeln!(control, "Maintainer: {}", descriptor.maintainer());
    let _ = writeln!(control, "Section: {}", descriptor.section());
    let _ = writeln!(control, "Priority: optional");
    let _ = writeln!(control, "Build-Depends:\n {}", build_depends);
    let _ = writeln!(control, "Standards-Version: {}", STANDARDS_VERSION);
    let _ = writeln!(control, "\nPackage: {}", descriptor.package());
    let _ = writeln!(control, "Architecture: {}", if descriptor.has_ext_modules() { "any" } else { "all" });
    let _ = writeln!(control, "Depends:\n {}", depends);
    write_description(&mut control, descriptor.description(), descriptor.long_description());
    control
}

/// The first line of a description is its synopsis; every following line is indented by one
/// space, and blank lines become ` .`.
fn write_description(out: &mut String, summary: &str, long_description: &str) {
    let _ = writeln!(out, "Description: {}", summary.lines().next().unwrap_or("").trim());
    for line in long_description.trim().lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            let _ = writeln!(out, " .");
        } else {
            let _ = writeln!(out, " {}", line);
        }
    }
}

pub fn changelog(descriptor: &PackageDescriptor, date: &str) -> String {
    format!(
        concat!(
            "{} ({}) {}; urgency=low\n\n",
            "  * source package automatically created by sdist-dsc\n\n",
            " -- {}  {}\n"
        ),
        descriptor.source(),
        descriptor.full_version(),
        descriptor.distribution(),
        descriptor.maintainer(),
        date
    )
}

pub fn rules(descriptor: &PackageDescriptor) -> String {
    let mut rules = String::from("#!/usr/bin/make -f\n\n%:\n\tdh $@ --with python3 --buildsystem=pybuild\n");

    // Compiled files left behind by a build must not end up in the diff.
    if !descriptor.directories().is_empty() {
        let _ = write!(
            rules,
            "\noverride_dh_auto_clean:\n\tdh_auto_clean\n\tfind {} -name '*.py[co]' -delete\n",
            descriptor.directories().iter().join(" ")
        );
    }

    rules
}
