//! # setupmingw CLI Entry Point
//!
//! Parses the command line, loads `setupmingw.toml` defaults and hands the
//! resolved selection to the pipeline. Every error ends up here and exits
//! with status 1.

use anyhow::{Result, bail};
use clap::Parser;
use std::path::PathBuf;

use setupmingw::build::{self, Registry};
use setupmingw::catalog::Selection;
use setupmingw::config;
use setupmingw::context::{BuildContext, ColorMode, ContextOptions};
use setupmingw::error::SetupError;
use setupmingw::fetch::NetTransport;
use setupmingw::runner::ProcessRunner;
use setupmingw::ui;

#[cfg(windows)]
#[link(name = "kernel32")]
unsafe extern "system" {
    fn SetConsoleOutputCP(wCodePageID: u32) -> i32;
}

#[cfg(windows)]
fn enable_utf8_console() {
    unsafe {
        SetConsoleOutputCP(65001);
    }
}

#[cfg(not(windows))]
fn enable_utf8_console() {}

#[derive(Parser)]
#[command(name = "setupmingw")]
#[command(about = "Download and build a mingw-w64 cross compiler and libs", version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// i686 for 32-bit, else x86_64
    #[arg(short, long, value_name = "ARCH")]
    arch: Option<String>,

    /// Configure and compile here
    #[arg(short, long, value_name = "PATH")]
    build: Option<PathBuf>,

    /// Use term colors in messages (y|n|a)
    #[arg(short, long, value_name = "y|n|a")]
    colors: Option<String>,

    /// Just download and unpack sources
    #[arg(short = 'd', long)]
    only_download: bool,

    /// Never skip any build steps (or downloads with -d)
    #[arg(short, long)]
    force: bool,

    /// Install everything here
    #[arg(short = 'i', long, value_name = "PATH")]
    sysroot: Option<PathBuf>,

    /// Value of N for "make -jN ..."
    #[arg(short, long, value_name = "N")]
    jobs: Option<usize>,

    /// Download and unpack source packages here
    #[arg(short, long, value_name = "PATH")]
    src: Option<PathBuf>,

    /// Do not abbreviate command output
    #[arg(short, long)]
    verbose_output: bool,

    /// Do not ask for confirmation
    #[arg(short, long)]
    yes: bool,

    /// Defaults file [default: ./setupmingw.toml when present]
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// NAME, NAME=URL or a file of NAME=URL lines
    #[arg(value_name = "PKG")]
    pkgs: Vec<String>,
}

fn run(cli: Cli) -> Result<()> {
    let settings = config::load_settings(cli.config.as_deref())?;

    let colors = cli
        .colors
        .or_else(|| settings.defaults.colors.clone())
        .unwrap_or_else(|| "auto".to_string());
    let Some(mode) = ColorMode::parse(&colors) else {
        bail!("Invalid color mode: {:?} (expecting y, n or a)", colors);
    };
    mode.apply();

    let descriptors = build::select_packages(&settings.packages, &cli.pkgs)?;
    let opts = ContextOptions {
        arch: cli.arch,
        build: cli.build,
        src: cli.src,
        sysroot: cli.sysroot,
        jobs: cli.jobs,
        force: cli.force,
        verbose: cli.verbose_output,
        yes: cli.yes,
        only_download: cli.only_download,
    };
    let mut ctx = BuildContext::resolve(opts, &settings.defaults)?;
    let selection = Selection::locate(descriptors, &ctx.src_root);

    build::run(
        &mut ProcessRunner::new(),
        &NetTransport,
        &mut ctx,
        &selection,
        &Registry::builtin(),
    )?;
    Ok(())
}

fn main() {
    enable_utf8_console();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        match e.downcast_ref::<SetupError>() {
            Some(err) if err.is_cancelled() => eprintln!("{}", err.message),
            Some(err) => ui::error(err.to_string()),
            None => ui::error(format!("{:#}", e)),
        }
        std::process::exit(1);
    }
}
