//! Run-wide configuration.
//!
//! `BuildContext` is resolved once at startup from CLI flags and the optional
//! defaults file, then passed by reference to every component. The search
//! path prefix and the cross environment wrapper are the only fields that
//! change during a run, and both only grow.

use crate::config::Defaults;
use crate::error::{Result, SetupError};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Packages that make up the compiler bootstrap, in bootstrap order.
pub const COMPILER_PACKAGES: [&str; 3] = ["binutils", "mingw-w64", "gcc"];

pub const CROSS_SCRIPT_NAME: &str = "cross.env";
pub const CMAKE_TOOLCHAIN_NAME: &str = "toolchain.cmake";

const DEFAULT_ARCH: &str = "i686";

/// Whether to emit ANSI colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    On,
    Off,
    Auto,
}

impl ColorMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "y" | "yes" | "1" | "on" => Some(ColorMode::On),
            "n" | "no" | "0" | "off" => Some(ColorMode::Off),
            "a" | "auto" | "maybe" | "m" | "?" => Some(ColorMode::Auto),
            _ => None,
        }
    }

    /// Resolve `Auto` from the `COLORTERM` and `TERM` values.
    pub fn enabled(&self, colorterm: Option<&str>, term: Option<&str>) -> bool {
        match self {
            ColorMode::On => true,
            ColorMode::Off => false,
            ColorMode::Auto => {
                colorterm.is_some_and(|v| !v.is_empty())
                    || term.is_some_and(|t| t.contains("color"))
            }
        }
    }

    pub fn apply(&self) {
        let colorterm = std::env::var("COLORTERM").ok();
        let term = std::env::var("TERM").ok();
        colored::control::set_override(self.enabled(colorterm.as_deref(), term.as_deref()));
    }
}

/// Values taken from the command line. `None` falls back to the defaults file.
#[derive(Debug, Default, Clone)]
pub struct ContextOptions {
    pub arch: Option<String>,
    pub build: Option<PathBuf>,
    pub src: Option<PathBuf>,
    pub sysroot: Option<PathBuf>,
    pub jobs: Option<usize>,
    pub force: bool,
    pub verbose: bool,
    pub yes: bool,
    pub only_download: bool,
}

#[derive(Debug, Clone)]
pub struct BuildContext {
    pub arch: String,
    /// Target triple, e.g. `i686-w64-mingw32`
    pub host: String,
    pub src_root: PathBuf,
    pub build_root: PathBuf,
    pub sysroot: PathBuf,
    pub jobs: usize,
    pub force: bool,
    pub verbose: bool,
    pub yes: bool,
    pub only_download: bool,
    cross_env: Option<PathBuf>,
    path_prefix: Vec<PathBuf>,
}

pub fn host_for_arch(arch: &str) -> String {
    format!("{}-w64-mingw32", arch)
}

impl BuildContext {
    pub fn resolve(opts: ContextOptions, defaults: &Defaults) -> Result<Self> {
        let arch = opts
            .arch
            .or_else(|| defaults.arch.clone())
            .unwrap_or_else(|| DEFAULT_ARCH.to_string());
        let host = host_for_arch(&arch);

        let src = opts
            .src
            .or_else(|| defaults.src.clone())
            .unwrap_or_else(|| PathBuf::from("./src"));
        let build = opts
            .build
            .or_else(|| defaults.build.clone())
            .unwrap_or_else(|| PathBuf::from(format!("./build.{}", host)));
        let sysroot = opts
            .sysroot
            .or_else(|| defaults.sysroot.clone())
            .unwrap_or_else(|| PathBuf::from(format!("./sys.{}", host)));

        let jobs = opts.jobs.or(defaults.jobs).unwrap_or(1).max(1);

        Ok(Self {
            arch,
            host,
            src_root: absolute(&src)?,
            build_root: absolute(&build)?,
            sysroot: absolute(&sysroot)?,
            jobs,
            force: opts.force,
            verbose: opts.verbose,
            yes: opts.yes,
            only_download: opts.only_download,
            cross_env: None,
            path_prefix: Vec::new(),
        })
    }

    /// The generated environment script that wraps commands once active.
    pub fn cross_env(&self) -> Option<&Path> {
        self.cross_env.as_deref()
    }

    pub fn activate_cross_env(&mut self, script: PathBuf) {
        self.cross_env = Some(script);
    }

    pub fn cross_script_path(&self) -> PathBuf {
        self.sysroot.join(CROSS_SCRIPT_NAME)
    }

    pub fn cmake_toolchain_path(&self) -> PathBuf {
        self.sysroot.join(CMAKE_TOOLCHAIN_NAME)
    }

    pub fn sysroot_bin(&self) -> PathBuf {
        self.sysroot.join("bin")
    }

    /// Prepend `dir` to the search path given to child processes.
    /// Returns false when it is already there.
    pub fn add_to_search_path(&mut self, dir: &Path) -> bool {
        if self.path_prefix.iter().any(|p| p == dir) {
            return false;
        }
        self.path_prefix.insert(0, dir.to_path_buf());
        true
    }

    pub fn search_path_prefix(&self) -> &[PathBuf] {
        &self.path_prefix
    }

    /// `PATH` for child processes, or `None` when nothing was prepended.
    pub fn child_search_path(&self) -> Option<OsString> {
        if self.path_prefix.is_empty() {
            return None;
        }
        let inherited = std::env::var_os("PATH").unwrap_or_default();
        let mut dirs: Vec<PathBuf> = self.path_prefix.clone();
        dirs.extend(std::env::split_paths(&inherited).filter(|p| !self.path_prefix.contains(p)));
        std::env::join_paths(dirs).ok()
    }
}

fn absolute(p: &Path) -> Result<PathBuf> {
    std::path::absolute(p)
        .map_err(|e| SetupError::filesystem(format!("Cannot resolve {}: {}", p.display(), e)))
}

#[cfg(test)]
pub(crate) fn test_context(root: &Path) -> BuildContext {
    BuildContext {
        arch: DEFAULT_ARCH.to_string(),
        host: host_for_arch(DEFAULT_ARCH),
        src_root: root.join("src"),
        build_root: root.join("build"),
        sysroot: root.join("sys"),
        jobs: 1,
        force: false,
        verbose: false,
        yes: true,
        only_download: false,
        cross_env: None,
        path_prefix: Vec::new(),
    }
}
