//! Package catalog and selection.
//!
//! A package descriptor is one `name=location` line. Blank lines and lines
//! starting with a space or `#` are ignored; anything else without an `=`
//! is rejected.
//!
//! Selection merges user descriptors over the built-in catalog, then picks
//! the packages named on the command line. With no selectors at all, every
//! known package is selected.

use crate::error::{Result, SetupError};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Built-in packages needed for the compiler bootstrap.
pub const DEFAULT_PACKAGES: [(&str, &str); 3] = [
    (
        "binutils",
        "https://ftp.gnu.org/gnu/binutils/binutils-2.43.tar.xz",
    ),
    (
        "mingw-w64",
        "https://downloads.sourceforge.net/project/mingw-w64/mingw-w64/mingw-w64-release/mingw-w64-v12.0.0.tar.bz2",
    ),
    ("gcc", "https://ftp.gnu.org/gnu/gcc/gcc-14.2.0/gcc-14.2.0.tar.xz"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDescriptor {
    pub name: String,
    /// HTTP(S) URL of an archive, or `git+<url>` for a repository
    pub location: String,
}

impl PackageDescriptor {
    pub fn new(name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
        }
    }

    pub fn parse(line: &str) -> Result<Self> {
        match line.split_once('=') {
            Some((name, location)) if !name.is_empty() => Ok(Self::new(name, location)),
            _ => Err(SetupError::selection(format!(
                "Invalid package description: {:?} (expecting NAME=URL)",
                line
            ))),
        }
    }
}

/// True for lines that must be descriptors.
pub fn is_descriptor_line(line: &str) -> bool {
    !line.is_empty() && !line.starts_with([' ', '#'])
}

pub fn parse_descriptors(text: &str) -> Result<Vec<PackageDescriptor>> {
    text.lines()
        .filter(|l| is_descriptor_line(l))
        .map(PackageDescriptor::parse)
        .collect()
}

/// Name-unique list of descriptors, kept in first-insertion order.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<PackageDescriptor>,
}

impl Catalog {
    pub fn builtin() -> Self {
        let mut c = Catalog::default();
        c.merge(
            DEFAULT_PACKAGES
                .iter()
                .map(|(n, l)| PackageDescriptor::new(*n, *l)),
        );
        c
    }

    /// Add descriptors; a name already present keeps its position but takes the new location.
    pub fn merge(&mut self, descriptors: impl IntoIterator<Item = PackageDescriptor>) {
        for d in descriptors {
            match self.entries.iter_mut().find(|e| e.name == d.name) {
                Some(existing) => existing.location = d.location,
                None => self.entries.push(d),
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&PackageDescriptor> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PackageDescriptor> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One positional argument of the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// `name=location`
    Literal(String),
    /// Path to a file of descriptor lines
    File(PathBuf),
    /// Bare package name
    Name(String),
}

impl Selector {
    pub fn classify(arg: &str) -> Self {
        if arg.contains('=') {
            Selector::Literal(arg.to_string())
        } else if Path::new(arg).exists() {
            Selector::File(PathBuf::from(arg))
        } else {
            Selector::Name(arg.to_string())
        }
    }
}

/// Merge selector descriptors into `catalog` and return the selected packages
/// in catalog order.
///
/// Literal and file descriptors are selected as well as merged. Bare names
/// must exist in the merged catalog.
pub fn resolve_selection(
    mut catalog: Catalog,
    selectors: &[Selector],
) -> Result<Vec<PackageDescriptor>> {
    let mut wanted: Vec<String> = Vec::new();
    let mut names: Vec<&str> = Vec::new();

    for s in selectors {
        match s {
            Selector::Literal(text) => {
                let descs = parse_descriptors(text)?;
                wanted.extend(descs.iter().map(|d| d.name.clone()));
                catalog.merge(descs);
            }
            Selector::File(path) => {
                let text = fs::read_to_string(path).map_err(|e| {
                    SetupError::filesystem(format!(
                        "Cannot read package list {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                let descs = parse_descriptors(&text)?;
                wanted.extend(descs.iter().map(|d| d.name.clone()));
                catalog.merge(descs);
            }
            Selector::Name(n) => names.push(n),
        }
    }

    for n in names {
        if !catalog.contains(n) {
            return Err(SetupError::selection(format!("No such package: {:?}", n)));
        }
        wanted.push(n.to_string());
    }

    if selectors.is_empty() {
        return Ok(catalog.entries);
    }

    let wanted: HashSet<String> = wanted.into_iter().collect();
    Ok(catalog
        .entries
        .into_iter()
        .filter(|d| wanted.contains(&d.name))
        .collect())
}

/// A selected package together with where its sources live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPackage {
    pub descriptor: PackageDescriptor,
    pub source_path: PathBuf,
}

impl ResolvedPackage {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn location(&self) -> &str {
        &self.descriptor.location
    }
}

/// The resolved selection, keyed by name in selection order.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    packages: Vec<ResolvedPackage>,
}

impl Selection {
    /// Attach `<src_root>/<name>` as the source path of every descriptor.
    pub fn locate(descriptors: Vec<PackageDescriptor>, src_root: &Path) -> Self {
        let packages = descriptors
            .into_iter()
            .map(|d| ResolvedPackage {
                source_path: src_root.join(&d.name),
                descriptor: d,
            })
            .collect();
        Self { packages }
    }

    pub fn get(&self, name: &str) -> Option<&ResolvedPackage> {
        self.packages.iter().find(|p| p.name() == name)
    }

    pub fn require(&self, name: &str) -> Result<&ResolvedPackage> {
        self.get(name)
            .ok_or_else(|| SetupError::filesystem(format!("Package is missing: {}", name)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedPackage> {
        self.packages.iter()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}
