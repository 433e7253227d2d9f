use std::path::Path;
use walkdir::{DirEntry, WalkDir};

/// Source suffixes which indicate compiled extension modules.
const EXTENSION_SOURCES: &[&str] = &[".c", ".cc", ".cpp", ".cxx", ".pyx"];

/// Directories which may hold top-level packages: the project root, and a `src/` layout.
const PACKAGE_ROOTS: &[&str] = &["", "src"];

#[derive(Debug, Default, PartialEq)]
pub struct Packages {
    pub names: Vec<String>,
    pub has_ext_modules: bool,
}

fn is_package(entry: &DirEntry) -> bool {
    entry.file_type().is_dir() && entry.path().join("__init__.py").is_file()
}

fn is_extension_source(entry: &DirEntry) -> bool {
    entry.file_type().is_file()
        && entry.file_name().to_str().map_or(false, |name| {
            EXTENSION_SOURCES.iter().any(|ext| name.ends_with(ext))
        })
}

/// Discovers importable packages beneath the project, the way `setuptools.find_packages` does:
/// a directory is a package when it holds an `__init__.py`, and every directory above it up to
/// the package root is a package too.
pub fn find_packages(project_dir: &Path) -> Packages {
    let mut packages = Packages::default();

    for root in PACKAGE_ROOTS.iter().map(|x| project_dir.join(x)) {
        if !root.is_dir() {
            continue;
        }

        let walker = WalkDir::new(&root)
            .min_depth(1)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()))
            .into_iter()
            .filter_entry(|e| !e.file_type().is_dir() || is_package(e));

        for entry in walker.flat_map(|e| e.ok()) {
            if is_extension_source(&entry) {
                packages.has_ext_modules = true;
                continue;
            }

            if !entry.file_type().is_dir() {
                continue;
            }

            if let Ok(relative) = entry.path().strip_prefix(&root) {
                let name = relative
                    .components()
                    .filter_map(|x| x.as_os_str().to_str())
                    .collect::<Vec<_>>()
                    .join(".");
                packages.names.push(name);
            }
        }
    }

    packages
}
