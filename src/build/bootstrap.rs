//! The fixed compiler bootstrap.
//!
//! ```text
//! binutils -> mingw-w64 headers -> gcc stage1 (C/C++) -> mingw-w64 runtime -> gcc stage2
//! ```
//!
//! The order comes from the toolchain itself and is not computed. Each stage
//! writes a marker in its build directory when it finishes; a later run skips
//! every stage whose marker exists (unless forced), so an interrupted run
//! resumes at the first unfinished stage. Inside a stage, individual steps are
//! also skipped when their output files already exist.

use super::env;
use super::steps::{Evidence, StepRunner, Workspace, mark_done, marker_file_name};
use crate::catalog::Selection;
use crate::context::{BuildContext, COMPILER_PACKAGES};
use crate::error::Result;
use crate::runner::Exec;
use crate::ui;
use colored::*;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Binutils,
    Headers,
    Stage1,
    Runtime,
    Stage2,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Binutils,
        Stage::Headers,
        Stage::Stage1,
        Stage::Runtime,
        Stage::Stage2,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Binutils => "binutils",
            Stage::Headers => "headers",
            Stage::Stage1 => "stage1",
            Stage::Runtime => "runtime",
            Stage::Stage2 => "stage2",
        }
    }

    /// Catalog package that provides the sources.
    pub fn package(&self) -> &'static str {
        match self {
            Stage::Binutils => "binutils",
            Stage::Headers | Stage::Runtime => "mingw-w64",
            Stage::Stage1 | Stage::Stage2 => "gcc",
        }
    }

    pub fn build_dir_name(&self) -> &'static str {
        match self {
            Stage::Binutils => "binutils",
            Stage::Headers => "mingw-w64-headers",
            Stage::Stage1 | Stage::Stage2 => "gcc",
            Stage::Runtime => "mingw-w64",
        }
    }

    pub fn label(&self) -> String {
        match self {
            Stage::Binutils => "binutils".to_string(),
            _ => format!("{} {}", self.package(), self.name()),
        }
    }

    pub fn marker_path(&self, build_root: &Path) -> PathBuf {
        build_root
            .join(self.build_dir_name())
            .join(marker_file_name(self.name()))
    }

    fn source(&self, selection: &Selection) -> Result<PathBuf> {
        let pkg = selection.require(self.package())?;
        Ok(match self {
            Stage::Headers => pkg.source_path.join("mingw-w64-headers"),
            _ => pkg.source_path.clone(),
        })
    }

    /// Stages after which `<sysroot>/bin` holds tools the next stages call.
    fn exposes_binaries(&self) -> bool {
        matches!(self, Stage::Binutils | Stage::Stage1)
    }

    fn run_steps(&self, steps: &mut StepRunner<'_>) -> Result<()> {
        let (ctx, ws) = (steps.ctx, steps.ws);
        let (h, i) = (ctx.host.as_str(), &ctx.sysroot);
        let prefix = format!("--prefix={}", i.display());
        let target_prefix = format!("--prefix={}", i.join(h).display());
        let none: [&str; 0] = [];

        match self {
            Stage::Binutils => {
                steps.configure([prefix, format!("--target={}", h), "--disable-multilib".into()])?;
                steps.make(none, true, &Evidence::File(ws.in_build("ld/ld-new")))?;
                let objdump = i.join("bin").join(format!("{}-objdump", h));
                steps.make(["install"], true, &Evidence::File(objdump))
            }
            Stage::Headers => {
                steps.configure([target_prefix, format!("--host={}", h)])?;
                let header = i.join(h).join("include").join("scardssp_i.c");
                steps.make(["install"], true, &Evidence::File(header))
            }
            Stage::Stage1 => {
                steps.configure([
                    prefix,
                    format!("--target={}", h),
                    "--disable-multilib".into(),
                    "--enable-languages=c,c++".into(),
                ])?;
                steps.make(["all-gcc"], true, &Evidence::Nothing)?;
                steps.make(["install-gcc"], false, &Evidence::Nothing)
            }
            Stage::Runtime => {
                steps.configure([target_prefix, format!("--host={}", h)])?;
                let crt = ws.in_build("mingw-w64-crt/lib32/libsynchronization.a");
                steps.make(none, false, &Evidence::File(crt))?;
                let lib = i.join(h).join("lib").join("libmingwthrd.a");
                steps.make(["install"], true, &Evidence::File(lib))
            }
            Stage::Stage2 => {
                steps.make(none, true, &Evidence::Nothing)?;
                steps.make(["install"], true, &Evidence::Nothing)
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct BootstrapOutcome {
    pub ran: Vec<Stage>,
    pub skipped: Vec<Stage>,
    /// Set once the compiler is complete and the environment files were written
    pub env_script: Option<PathBuf>,
}

/// Run every bootstrap stage whose package is selected, in the fixed order.
///
/// Once gcc stage2 is reached, the environment files are written and the
/// context starts wrapping commands through the environment script.
pub fn run_bootstrap(
    exec: &mut dyn Exec,
    ctx: &mut BuildContext,
    selection: &Selection,
) -> Result<BootstrapOutcome> {
    let mut outcome = BootstrapOutcome::default();
    if !COMPILER_PACKAGES.iter().any(|p| selection.contains(p)) {
        return Ok(outcome);
    }

    println!("{} {}", "🔧".cyan(), format!("Bootstrapping {} compiler", ctx.host).bold());
    fs::create_dir_all(&ctx.build_root)?;
    fs::create_dir_all(&ctx.sysroot)?;

    for stage in Stage::ALL {
        if selection.contains(stage.package()) {
            let ws = Workspace::enter(ctx, stage.build_dir_name(), stage.source(selection)?)?;
            let marker = Evidence::Marker(ws.marker(stage.name()));
            let mut steps = StepRunner::new(&mut *exec, ctx, &ws);

            if steps.skip(&stage.label(), &marker) {
                outcome.skipped.push(stage);
            } else {
                ui::info(format!("Stage {}", stage.label().bold()));
                stage.run_steps(&mut steps)?;
                mark_done(&ws.marker(stage.name()))?;
                outcome.ran.push(stage);
            }
            exec.clear_output();
        }

        if stage.exposes_binaries() {
            let bin = ctx.sysroot_bin();
            if ctx.add_to_search_path(&bin) {
                ui::warn(format!("Prepended to PATH: {}", bin.display()));
            }
        }
    }

    if selection.contains("gcc") {
        let script = env::emit(ctx)?;
        ctx.activate_cross_env(script.clone());
        outcome.env_script = Some(script);
    }
    Ok(outcome)
}
