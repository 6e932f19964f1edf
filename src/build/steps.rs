//! configure / make / cmake steps shared by the bootstrap and the library builds.
//!
//! Each step can be guarded by an [`Evidence`]: a path whose existence means
//! the step already ran. Force mode ignores all evidence.

use crate::context::BuildContext;
use crate::error::Result;
use crate::runner::{Exec, Invocation};
use crate::ui;
use std::fs;
use std::path::{Path, PathBuf};

/// File name of a stage marker inside its build directory.
pub fn marker_file_name(stage: &str) -> String {
    format!("setupmingw.{}.progress", stage)
}

/// What proves a step is already done.
///
/// This is the single place that answers "has this step run". Artifact
/// existence is a weak proxy for completion (a crash mid-install leaves the
/// artifact behind), so keep new checks going through here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evidence {
    /// Always run
    Nothing,
    /// An output file of the step
    File(PathBuf),
    /// A stage marker written after the step succeeded
    Marker(PathBuf),
}

impl Evidence {
    /// The existing path that allows skipping, or `None` if the step must run.
    pub fn found(&self, force: bool) -> Option<&Path> {
        if force {
            return None;
        }
        match self {
            Evidence::Nothing => None,
            Evidence::File(p) | Evidence::Marker(p) => p.exists().then_some(p.as_path()),
        }
    }
}

/// Write the marker for a finished stage.
pub fn mark_done(marker: &Path) -> Result<()> {
    fs::write(marker, "done\n")?;
    Ok(())
}

/// Source and build directories of the package being built.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub name: String,
    pub src: PathBuf,
    pub build: PathBuf,
}

impl Workspace {
    /// Create `<build_root>/<name>` and describe it.
    pub fn enter(ctx: &BuildContext, name: &str, src: PathBuf) -> Result<Self> {
        let build = ctx.build_root.join(name);
        fs::create_dir_all(&build)?;
        Ok(Self {
            name: name.to_string(),
            src,
            build,
        })
    }

    pub fn in_build(&self, rel: &str) -> PathBuf {
        self.build.join(rel)
    }

    pub fn marker(&self, stage: &str) -> PathBuf {
        self.build.join(marker_file_name(stage))
    }
}

/// Runs steps for one workspace.
pub struct StepRunner<'a> {
    pub exec: &'a mut dyn Exec,
    pub ctx: &'a BuildContext,
    pub ws: &'a Workspace,
}

impl<'a> StepRunner<'a> {
    pub fn new(exec: &'a mut dyn Exec, ctx: &'a BuildContext, ws: &'a Workspace) -> Self {
        Self { exec, ctx, ws }
    }

    /// Log and return true when `evidence` allows skipping `what`.
    pub fn skip(&self, what: &str, evidence: &Evidence) -> bool {
        match evidence.found(self.ctx.force) {
            Some(p) => {
                let reason = match evidence {
                    Evidence::Marker(_) => "mark exists",
                    _ => "file exists",
                };
                ui::warn(format!(
                    "Skipping '{}' because {}: {}",
                    what,
                    reason,
                    p.display()
                ));
                true
            }
            None => false,
        }
    }

    /// Run any command in the build directory.
    pub fn command(&mut self, inv: Invocation) -> Result<()> {
        self.exec.run(self.ctx, &inv)
    }

    /// `<src>/configure <args>`, skipped once a `Makefile` exists.
    pub fn configure<I, S>(&mut self, args: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let unless = Evidence::File(self.ws.in_build("Makefile"));
        self.configure_unless(args, &unless)
    }

    pub fn configure_unless<I, S>(&mut self, args: I, unless: &Evidence) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.skip("configure", unless) {
            return Ok(());
        }
        let inv = configure_invocation(self.ctx, self.ws, args);
        self.command(inv)
    }

    /// `make [-jN] <args>` unless `unless` proves it already ran.
    pub fn make<I, S>(&mut self, args: I, parallel_safe: bool, unless: &Evidence) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let inv = make_invocation(self.ctx, self.ws, args, parallel_safe);
        let what = inv.command_line();
        if self.skip(&what, unless) {
            return Ok(());
        }
        self.command(inv)
    }

    /// Configure with cmake and the generated toolchain file.
    pub fn cmake<I, S>(&mut self, args: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let unless = Evidence::File(self.ws.in_build("CMakeCache.txt"));
        if self.skip("cmake", &unless) {
            return Ok(());
        }
        let inv = cmake_invocation(self.ctx, self.ws, args);
        self.command(inv)
    }
}

pub fn configure_invocation<I, S>(ctx: &BuildContext, ws: &Workspace, args: I) -> Invocation
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let args: Vec<String> = args.into_iter().map(Into::into).collect();
    let configure = ws.src.join("configure");
    let mut inv = Invocation::new(configure.to_string_lossy(), &ws.build);
    if ctx.cross_env().is_some() {
        if !args.iter().any(|a| a.starts_with("--prefix=")) {
            inv = inv.arg(format!("--prefix={}", ctx.sysroot.display()));
        }
        if !args.iter().any(|a| a.starts_with("--host=")) {
            inv = inv.arg(format!("--host={}", ctx.host));
        }
    }
    inv.args(args)
}

pub fn make_invocation<I, S>(
    ctx: &BuildContext,
    ws: &Workspace,
    args: I,
    parallel_safe: bool,
) -> Invocation
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let args: Vec<String> = args.into_iter().map(Into::into).collect();
    let mut inv = Invocation::new("make", &ws.build);
    // installs race in most makefiles
    if ctx.jobs > 1 && parallel_safe && !args.iter().any(|a| a == "install") {
        inv = inv.arg(format!("-j{}", ctx.jobs));
    }
    inv.args(args)
}

pub fn cmake_invocation<I, S>(ctx: &BuildContext, ws: &Workspace, args: I) -> Invocation
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Invocation::new("cmake", &ws.build)
        .arg("-GUnix Makefiles")
        .arg("-B.")
        .arg(format!("-S{}", ws.src.display()))
        .arg(format!(
            "-DCMAKE_TOOLCHAIN_FILE={}",
            ctx.cmake_toolchain_path().display()
        ))
        .arg("-DCMAKE_BUILD_TYPE=Release")
        .arg(format!("-DCMAKE_INSTALL_PREFIX={}", ctx.sysroot.display()))
        .arg("-DCMAKE_VERBOSE_MAKEFILE=ON")
        .arg("-Wno-dev")
        .args(args)
}
