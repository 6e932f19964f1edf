//! Source acquisition.
//!
//! For every selected package without local sources:
//!
//! 1. fetch the archive over HTTP(S), or clone a `git+` location
//! 2. unpack the archive in a throw-away directory, which must yield exactly one entry
//! 3. move that entry next to the archive, backing up whatever was there
//! 4. point `<src>/<name>` at the unpacked tree with a symlink
//! 5. run `autoreconf -i` for autotools trees that ship no `configure`
//!
//! Anything already at a destination path is renamed to `<path>.del` first.
//! Only one backup generation is kept.

use crate::build::uses_autotools;
use crate::catalog::{ResolvedPackage, Selection};
use crate::context::BuildContext;
use crate::error::{Result, SetupError};
use crate::runner::{Exec, Invocation};
use crate::ui;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

const GIT_PREFIX: &str = "git+";

/// Moves bytes from a location to the local disk.
pub trait Transport {
    /// Download `url` into the file `dest`.
    fn download(&self, url: &str, dest: &Path) -> Result<()>;

    /// Clone the repository at `url` into the directory `dest`.
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<()>;
}

/// HTTP via `ureq`, git via `git2`.
pub struct NetTransport;

impl Transport for NetTransport {
    fn download(&self, url: &str, dest: &Path) -> Result<()> {
        println!("{} Downloading {}", "⬇".blue(), url);
        let response = ureq::get(url)
            .call()
            .map_err(|e| SetupError::acquisition(format!("Download failed: {}: {}", url, e)))?;

        let total_size = response
            .headers()
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);

        let pb = ProgressBar::new(total_size);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.blue} [{elapsed_precise}] [{bar:40.green/black}] {bytes}/{total_bytes} ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("━━╸"),
        );

        let mut file = File::create(dest)?;
        let mut reader = response.into_body().into_reader();
        let mut buffer = [0; 8192];
        loop {
            let n = reader.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            file.write_all(&buffer[..n])?;
            pb.inc(n as u64);
        }

        pb.finish_and_clear();
        ui::success(format!("Downloaded {}", dest.display()));
        Ok(())
    }

    fn clone_repo(&self, url: &str, dest: &Path) -> Result<()> {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.blue} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("Cloning {}...", url));
        pb.enable_steady_tick(Duration::from_millis(100));

        match git2::Repository::clone(url, dest) {
            Ok(_) => {
                pb.finish_with_message(format!("{} Cloned {}", "✓".green(), url));
                Ok(())
            }
            Err(e) => {
                pb.finish_with_message(format!("{} Failed {}", "x".red(), url));
                Err(SetupError::acquisition(format!(
                    "Failed to clone {}: {}",
                    url, e
                )))
            }
        }
    }
}

/// How a location string is fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location<'a> {
    Archive(&'a str),
    Git(&'a str),
}

pub fn classify_location(location: &str) -> Result<Location<'_>> {
    if location.starts_with("http://") || location.starts_with("https://") {
        Ok(Location::Archive(location))
    } else if let Some(url) = location.strip_prefix(GIT_PREFIX) {
        Ok(Location::Git(url))
    } else {
        Err(SetupError::acquisition(format!(
            "Unrecognized URL: {:?}",
            location
        )))
    }
}

/// Last path segment of a URL, without query or fragment.
fn url_basename(url: &str) -> Option<&str> {
    let url = url.split(['?', '#']).next().unwrap_or(url);
    url.rsplit('/').next().filter(|s| !s.is_empty())
}

/// Which selected packages have sources and which must be fetched.
#[derive(Debug, Default)]
pub struct AcquisitionPlan<'a> {
    pub already_present: Vec<&'a ResolvedPackage>,
    pub needs_download: Vec<&'a ResolvedPackage>,
}

impl<'a> AcquisitionPlan<'a> {
    pub fn compute(selection: &'a Selection, ctx: &BuildContext) -> Self {
        let mut plan = AcquisitionPlan::default();
        for p in selection.iter() {
            if p.source_path.exists() {
                plan.already_present.push(p);
            } else {
                plan.needs_download.push(p);
            }
        }
        if ctx.force && ctx.only_download {
            plan.needs_download = selection.iter().collect();
        }
        plan
    }
}

/// Rename `path` to `<path>.del`, deleting an older backup first.
pub fn backup(path: &Path) -> Result<()> {
    if fs::symlink_metadata(path).is_err() {
        return Ok(());
    }
    let mut b = path.as_os_str().to_owned();
    b.push(".del");
    let b = PathBuf::from(b);

    if let Ok(meta) = fs::symlink_metadata(&b) {
        ui::warn(format!("Delete old backup: {}", b.display()));
        if meta.is_dir() {
            fs::remove_dir_all(&b)?;
        } else {
            fs::remove_file(&b)?;
        }
    }
    ui::info(format!(
        "Rename to backup: {} -> {}",
        path.display(),
        b.display()
    ));
    fs::rename(path, &b)?;
    Ok(())
}

/// Extract `archive` next to itself and return the extracted top-level directory.
///
/// A `.git` path is a clone and is returned unchanged.
pub fn unpack(exec: &mut dyn Exec, ctx: &BuildContext, archive: &Path) -> Result<PathBuf> {
    if archive.extension().is_some_and(|e| e == "git") {
        return Ok(archive.to_path_buf());
    }
    let parent = archive.parent().ok_or_else(|| {
        SetupError::filesystem(format!("No parent directory: {}", archive.display()))
    })?;

    let tmp = tempfile::Builder::new()
        .prefix("tmp_unpack_")
        .tempdir_in(parent)?;
    ui::info(format!("Unpacking {} ...", archive.display()));
    exec.run(
        ctx,
        &Invocation::new("tar", tmp.path())
            .arg("-axvf")
            .arg(archive.to_string_lossy()),
    )?;

    let entries: Vec<_> = fs::read_dir(tmp.path())?
        .filter_map(|e| e.ok())
        .map(|e| e.file_name())
        .collect();
    if entries.len() != 1 {
        let listing: Vec<String> = entries
            .iter()
            .map(|e| e.to_string_lossy().to_string())
            .collect();
        return Err(SetupError::acquisition(format!(
            "Expecting 1 new directory in {} not {}:\n  {}",
            tmp.path().display(),
            entries.len(),
            listing.join("\n  ")
        )));
    }

    let extracted = tmp.path().join(&entries[0]);
    let dest = parent.join(&entries[0]);
    backup(&dest)?;
    fs::rename(&extracted, &dest)?;
    tmp.close()?;
    Ok(dest)
}

/// Fetch and unpack one package, returning the tree its source path should point at.
pub fn fetch_package(
    exec: &mut dyn Exec,
    transport: &dyn Transport,
    ctx: &BuildContext,
    pkg: &ResolvedPackage,
) -> Result<PathBuf> {
    let location = classify_location(pkg.location())?;
    let basename = match location {
        Location::Archive(url) | Location::Git(url) => url_basename(url).ok_or_else(|| {
            SetupError::acquisition(format!("Cannot derive a file name from {:?}", url))
        })?,
    };

    let fetched = match location {
        Location::Archive(url) => {
            let out = ctx.src_root.join(basename);
            backup(&out)?;
            transport.download(url, &out)?;
            if !out.exists() {
                return Err(SetupError::acquisition(format!(
                    "Expected file not found: {}",
                    out.display()
                )));
            }
            out
        }
        Location::Git(url) => {
            let name = basename.strip_suffix(".git").unwrap_or(basename);
            let out = ctx.src_root.join(format!("{}.git", name));
            backup(&out)?;
            transport.clone_repo(url, &out)?;
            out
        }
    };
    unpack(exec, ctx, &fetched)
}

#[cfg(unix)]
fn link_dir(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn link_dir(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_dir(target, link)
}

/// Point `pkg.source_path` at `tree`.
pub fn link_sources(tree: &Path, pkg: &ResolvedPackage) -> Result<()> {
    if tree == pkg.source_path {
        return Ok(());
    }
    backup(&pkg.source_path)?;
    link_dir(tree, &pkg.source_path).map_err(|e| {
        SetupError::filesystem(format!(
            "Cannot link {} -> {}: {}",
            pkg.source_path.display(),
            tree.display(),
            e
        ))
    })?;
    Ok(())
}

/// Generate `configure` for autotools trees that only ship `configure.ac`.
pub fn autoreconf(exec: &mut dyn Exec, ctx: &BuildContext, src: &Path) -> Result<()> {
    if !uses_autotools(src) || src.join("configure").exists() {
        return Ok(());
    }
    exec.run(ctx, &Invocation::new("autoreconf", src).arg("-i"))
}

/// Fetch, unpack and link every package in `plan.needs_download`.
pub fn acquire_sources(
    exec: &mut dyn Exec,
    transport: &dyn Transport,
    ctx: &BuildContext,
    plan: &AcquisitionPlan<'_>,
) -> Result<()> {
    fs::create_dir_all(&ctx.src_root)?;
    let forced = ctx.force && ctx.only_download;

    for pkg in &plan.needs_download {
        if pkg.source_path.exists() && !forced {
            ui::warn(format!(
                "Skipping download of {} because source directory exists: {}",
                pkg.name(),
                pkg.source_path.display()
            ));
            continue;
        }
        let tree = fetch_package(exec, transport, ctx, pkg)?;
        link_sources(&tree, pkg)?;
        autoreconf(exec, ctx, &pkg.source_path)?;
        exec.clear_output();
    }
    Ok(())
}
