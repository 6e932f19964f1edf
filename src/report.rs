//! Pre-flight report and confirmation.

use crate::catalog::Selection;
use crate::context::BuildContext;
use crate::error::{Result, SetupError};
use crate::fetch::AcquisitionPlan;
use crate::ui::{self, Table};
use colored::*;
use std::env;
use std::fs;
use std::path::Path;

const FLAG_VARS: [&str; 2] = ["CFLAGS", "CXXFLAGS"];

/// True when there is nothing to download and nothing will be built.
pub fn nothing_to_do(ctx: &BuildContext, selection: &Selection, plan: &AcquisitionPlan<'_>) -> bool {
    plan.needs_download.is_empty() && (ctx.only_download || selection.is_empty())
}

/// `path` with the source root replaced by `$s`, symlinks resolved.
pub fn display_source(path: &Path, src_root: &Path) -> String {
    let real = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let roots = [fs::canonicalize(src_root).ok(), Some(src_root.to_path_buf())];
    match roots.iter().flatten().find_map(|r| real.strip_prefix(r).ok()) {
        Some(rel) if rel.as_os_str().is_empty() => "$s".to_string(),
        Some(rel) => format!("$s/{}", rel.display()),
        None => real.display().to_string(),
    }
}

pub fn download_table(plan: &AcquisitionPlan<'_>) -> Table {
    let mut table = Table::new(&["Package", "Location"]);
    for p in &plan.needs_download {
        table.add_row(vec![p.name().to_string(), p.location().to_string()]);
    }
    table
}

pub fn build_table(ctx: &BuildContext, selection: &Selection) -> Table {
    let mut table = Table::new(&["Package", "Sources"]);
    for p in selection.iter() {
        table.add_row(vec![
            p.name().to_string(),
            display_source(&p.source_path, &ctx.src_root),
        ]);
    }
    table
}

/// Print what is about to happen and ask to proceed.
pub fn preflight(ctx: &BuildContext, selection: &Selection, plan: &AcquisitionPlan<'_>) -> Result<()> {
    println!("{} Cross compilation host: {}", "→".blue(), ctx.host.green().bold());
    println!("  Source path:      {} = {}", "$s".cyan(), ctx.src_root.display());
    println!("  Build path:       {}", ctx.build_root.display());
    println!("  Install sysroot:  {}", ctx.sysroot.display());
    if ctx.jobs > 1 {
        println!("  Maximum parallel jobs (when safe): {}", ctx.jobs.to_string().yellow());
    }
    for var in FLAG_VARS {
        match env::var(var) {
            Ok(v) if !v.is_empty() => println!("  {:<8} = {}", var.green(), v),
            _ => ui::warn(format!("  {} not set", var)),
        }
    }

    println!();
    println!("Packages to download: {}", plan.needs_download.len().to_string().yellow());
    let downloads = download_table(plan);
    if !downloads.is_empty() {
        downloads.print();
    }

    if !ctx.only_download {
        println!("Packages to build:    {}", selection.len().to_string().yellow());
        let builds = build_table(ctx, selection);
        if !builds.is_empty() {
            builds.print();
        }
    }

    if nothing_to_do(ctx, selection, plan) {
        return Err(SetupError::cancelled("Nothing to do"));
    }
    println!();
    ui::confirm("Proceed?", ctx.yes)
}
