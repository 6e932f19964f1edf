//! # setupmingw - mingw-w64 cross toolchain bootstrapper
//!
//! Downloads, unpacks and builds a mingw-w64 cross compiler and a set of
//! static libraries from source, on a host that has neither.
//!
//! ## Quick Start
//!
//! ```bash
//! # Everything in the built-in catalog, 8 jobs, no questions
//! setupmingw -j8 -y
//!
//! # Just binutils from a mirror
//! setupmingw binutils=https://mirror/binutils-2.43.tar.xz
//! ```
//!
//! Re-running is the recovery path: finished bootstrap stages leave a marker
//! in their build directory and are skipped next time.
//!
//! ## Module Organization
//!
//! - [`catalog`] - Package descriptors and selection
//! - [`fetch`] - Download, unpack and link sources
//! - [`build`] - Compiler bootstrap, library strategies, environment files
//! - [`runner`] - External command execution with a live output tail

/// Package descriptors, the built-in catalog and selectors.
pub mod catalog;

/// Defaults file (`setupmingw.toml`).
pub mod config;

/// Run-wide settings passed to every component.
pub mod context;

/// Error kinds and the crate `Result`.
pub mod error;

/// Source acquisition.
pub mod fetch;

/// Compiler bootstrap, build strategies and the pipeline.
pub mod build;

/// Pre-flight report.
pub mod report;

/// External command execution.
pub mod runner;

/// Terminal UI utilities (tables, colors, prompts).
pub mod ui;
