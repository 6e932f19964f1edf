//! Build strategies for the library packages.
//!
//! A package is built by the first match of:
//!
//! 1. a recipe registered under its name
//! 2. autotools, when the tree has `configure`, `configure.ac` or `configure.in`
//! 3. cmake, when the tree has `CMakeLists.txt`
//!
//! Anything else is an unrecognized build system.

use super::steps::{Evidence, StepRunner};
use crate::catalog::ResolvedPackage;
use crate::context::BuildContext;
use crate::error::{Result, SetupError};
use crate::runner::Invocation;
use crate::ui;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub fn uses_autotools(src: &Path) -> bool {
    ["configure", "configure.ac", "configure.in"]
        .iter()
        .any(|f| src.join(f).exists())
}

pub fn uses_cmake(src: &Path) -> bool {
    src.join("CMakeLists.txt").exists()
}

/// The three phases every strategy goes through.
pub trait BuildStrategy {
    fn configure(&self, steps: &mut StepRunner<'_>) -> Result<()>;
    fn build(&self, steps: &mut StepRunner<'_>) -> Result<()>;
    fn install(&self, steps: &mut StepRunner<'_>) -> Result<()>;

    fn run(&self, steps: &mut StepRunner<'_>) -> Result<()> {
        self.configure(steps)?;
        self.build(steps)?;
        self.install(steps)
    }
}

/// `configure && make && make install` with optional skip evidence.
#[derive(Debug, Clone)]
pub struct Autotools {
    pub configure_args: Vec<String>,
    /// Relative to the build directory
    pub built: Option<String>,
    pub installed: Option<PathBuf>,
}

impl Autotools {
    pub fn with_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut configure_args = vec!["--enable-static".to_string()];
        configure_args.extend(args.into_iter().map(Into::into));
        Self {
            configure_args,
            built: None,
            installed: None,
        }
    }
}

impl BuildStrategy for Autotools {
    fn configure(&self, steps: &mut StepRunner<'_>) -> Result<()> {
        steps.configure(self.configure_args.iter().cloned())
    }

    fn build(&self, steps: &mut StepRunner<'_>) -> Result<()> {
        let unless = match &self.built {
            Some(rel) => Evidence::File(steps.ws.in_build(rel)),
            None => Evidence::Nothing,
        };
        let none: [&str; 0] = [];
        steps.make(none, true, &unless)
    }

    fn install(&self, steps: &mut StepRunner<'_>) -> Result<()> {
        let unless = match &self.installed {
            Some(p) => Evidence::File(p.clone()),
            None => Evidence::Nothing,
        };
        steps.make(["install"], true, &unless)
    }
}

/// cmake configure with the generated toolchain file, then make.
#[derive(Debug, Clone, Default)]
pub struct Cmake {
    pub defines: Vec<String>,
}

impl BuildStrategy for Cmake {
    fn configure(&self, steps: &mut StepRunner<'_>) -> Result<()> {
        steps.cmake(self.defines.iter().cloned())
    }

    fn build(&self, steps: &mut StepRunner<'_>) -> Result<()> {
        let none: [&str; 0] = [];
        steps.make(none, true, &Evidence::Nothing)
    }

    fn install(&self, steps: &mut StepRunner<'_>) -> Result<()> {
        steps.make(["install"], true, &Evidence::Nothing)
    }
}

/// zlib builds in-tree with its own win32 makefile.
#[derive(Debug, Clone, Default)]
pub struct Zlib;

impl BuildStrategy for Zlib {
    fn configure(&self, steps: &mut StepRunner<'_>) -> Result<()> {
        let ws = steps.ws;
        if !ws.in_build("zlib.h").exists() {
            copy_tree(&ws.src, &ws.build)?;
        }
        // zlib ships a placeholder Makefile, so only its configure.log proves a run
        if steps.skip("configure", &Evidence::File(ws.in_build("configure.log"))) {
            return Ok(());
        }
        let configure = ws.in_build("configure");
        steps.command(
            Invocation::new(configure.to_string_lossy(), &ws.build)
                .arg(format!("--prefix={}", steps.ctx.sysroot.display()))
                .arg("--static"),
        )
    }

    fn build(&self, _steps: &mut StepRunner<'_>) -> Result<()> {
        // the install target below builds everything
        Ok(())
    }

    fn install(&self, steps: &mut StepRunner<'_>) -> Result<()> {
        let ctx = steps.ctx;
        let i = ctx.sysroot.display();
        let args = vec![
            "-f".to_string(),
            "win32/Makefile.gcc".to_string(),
            "install".to_string(),
            format!("DESTDIR={}/", i),
            format!("PREFIX={}-", ctx.host),
            format!("prefix={}", i),
            "SHARED_MODE=1".to_string(),
            "INCLUDE_PATH=include".to_string(),
            "BINARY_PATH=bin".to_string(),
            "LIBRARY_PATH=lib".to_string(),
        ];
        let unless = Evidence::File(ctx.sysroot.join("lib").join("libz.a"));
        steps.make(args, true, &unless)
    }
}

/// Copy the contents of `src` into `dst`, merging with what is there.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    let src = fs::canonicalize(src)?;
    ui::info(format!("Copying {} to {}", src.display(), dst.display()));
    for entry in WalkDir::new(&src) {
        let entry = entry.map_err(|e| SetupError::filesystem(e.to_string()))?;
        let rel = entry
            .path()
            .strip_prefix(&src)
            .map_err(|e| SetupError::filesystem(e.to_string()))?;
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Where a chosen strategy came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyOrigin {
    Recipe,
    Autotools,
    Cmake,
}

impl StrategyOrigin {
    pub fn label(&self) -> &'static str {
        match self {
            StrategyOrigin::Recipe => "custom recipe",
            StrategyOrigin::Autotools => "autotools",
            StrategyOrigin::Cmake => "cmake",
        }
    }
}

pub struct SelectedStrategy {
    pub origin: StrategyOrigin,
    pub strategy: Box<dyn BuildStrategy>,
}

/// Builds the strategy for one package given the run context.
pub type Recipe = fn(&BuildContext) -> Box<dyn BuildStrategy>;

/// Package name to bespoke build recipe.
pub struct Registry {
    recipes: HashMap<&'static str, Recipe>,
}

impl Registry {
    pub fn empty() -> Self {
        Self {
            recipes: HashMap::new(),
        }
    }

    /// Recipes for libraries that need non-standard flags or layout.
    pub fn builtin() -> Self {
        let mut r = Self::empty();
        r.register("zlib", |_| Box::new(Zlib));
        r.register("libxml2", |ctx| {
            let i = ctx.sysroot.display();
            Box::new(Autotools {
                built: Some("libxml2_la-xmlschemas.o".into()),
                installed: Some(ctx.sysroot.join("lib").join("libxml2.a")),
                ..Autotools::with_args([
                    "--disable-silent-rules".to_string(),
                    format!("--with-iconv={}", i),
                    "--without-catalog".to_string(),
                    "--without-python".to_string(),
                    "--without-icu".to_string(),
                ])
            })
        });
        r.register("libpng", |ctx| {
            let (h, i) = (&ctx.host, ctx.sysroot.display());
            Box::new(Autotools {
                built: Some("libpng.sym".into()),
                installed: Some(ctx.sysroot.join("lib").join("libpng.a")),
                ..Autotools::with_args([
                    format!("CC={}-gcc", h),
                    format!("STRIP={}-strip", h),
                    format!("CPPFLAGS=-I{}/include", i),
                    format!("LDFLAGS=-L{}/lib", i),
                ])
            })
        });
        r.register("openal", |_| {
            Box::new(Cmake {
                defines: [
                    "-DLIBTYPE=STATIC",
                    "-DALSOFT_EXAMPLES=OFF",
                    "-DALSOFT_INSTALL_EXAMPLES=OFF",
                    "-DALSOFT_UTILS=OFF",
                ]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            })
        });
        r.register("sdl_image", |ctx| {
            Box::new(Autotools::with_args([format!(
                "CPPFLAGS=-I{}/include -Wno-incompatible-pointer-types",
                ctx.sysroot.display()
            )]))
        });
        r
    }

    pub fn register(&mut self, name: &'static str, recipe: Recipe) {
        self.recipes.insert(name, recipe);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.recipes.contains_key(name)
    }

    /// Pick the strategy for `pkg`, looking at its source tree when no recipe matches.
    pub fn select(&self, pkg: &ResolvedPackage, ctx: &BuildContext) -> Result<SelectedStrategy> {
        if let Some(recipe) = self.recipes.get(pkg.name()) {
            return Ok(SelectedStrategy {
                origin: StrategyOrigin::Recipe,
                strategy: recipe(ctx),
            });
        }
        if uses_autotools(&pkg.source_path) {
            return Ok(SelectedStrategy {
                origin: StrategyOrigin::Autotools,
                strategy: Box::new(Autotools::with_args(Vec::<String>::new())),
            });
        }
        if uses_cmake(&pkg.source_path) {
            return Ok(SelectedStrategy {
                origin: StrategyOrigin::Cmake,
                strategy: Box::new(Cmake::default()),
            });
        }
        Err(SetupError::filesystem(format!(
            "Unrecognized build system: {}",
            pkg.source_path.display()
        )))
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::steps::Workspace;
    use crate::catalog::{PackageDescriptor, Selection};
    use crate::context::test_context;
    use crate::runner::testing::RecordingRunner;

    fn package(ctx: &BuildContext, name: &str, files: &[&str]) -> ResolvedPackage {
        let src = ctx.src_root.join(name);
        fs::create_dir_all(&src).unwrap();
        for f in files {
            fs::write(src.join(f), "").unwrap();
        }
        let sel = Selection::locate(
            vec![PackageDescriptor::new(name, "https://example.org/x.tar.gz")],
            &ctx.src_root,
        );
        sel.get(name).unwrap().clone()
    }

    #[test]
    fn test_cmake_tree_without_configure_uses_cmake() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path());
        let pkg = package(&ctx, "glfw", &["CMakeLists.txt"]);
        let sel = Registry::builtin().select(&pkg, &ctx).unwrap();
        assert_eq!(sel.origin, StrategyOrigin::Cmake);
    }

    #[test]
    fn test_autotools_preferred_over_cmake() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path());
        let pkg = package(&ctx, "libogg", &["configure.ac", "CMakeLists.txt"]);
        let sel = Registry::builtin().select(&pkg, &ctx).unwrap();
        assert_eq!(sel.origin, StrategyOrigin::Autotools);
    }

    #[test]
    fn test_recipe_takes_priority() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path());
        let pkg = package(&ctx, "openal", &["CMakeLists.txt", "configure"]);
        let sel = Registry::builtin().select(&pkg, &ctx).unwrap();
        assert_eq!(sel.origin, StrategyOrigin::Recipe);
        assert_eq!(sel.origin.label(), "custom recipe");
    }

    #[test]
    fn test_unknown_build_system() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path());
        let pkg = package(&ctx, "mystery", &["build.zig"]);
        let err = Registry::builtin().select(&pkg, &ctx).err().unwrap();
        assert!(err.message.contains("Unrecognized build system"));
    }

    #[test]
    fn test_register_custom_recipe() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path());
        let mut reg = Registry::empty();
        assert!(!reg.contains("mystery"));
        reg.register("mystery", |_| Box::new(Cmake::default()));
        let pkg = package(&ctx, "mystery", &[]);
        assert_eq!(reg.select(&pkg, &ctx).unwrap().origin, StrategyOrigin::Recipe);
    }

    #[test]
    fn test_libxml2_recipe_skips_on_evidence() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path());
        let pkg = package(&ctx, "libxml2", &["configure"]);
        let ws = Workspace::enter(&ctx, "libxml2", pkg.source_path.clone()).unwrap();
        fs::write(ws.in_build("Makefile"), "").unwrap();
        fs::write(ws.in_build("libxml2_la-xmlschemas.o"), "").unwrap();

        let mut exec = RecordingRunner::new();
        let sel = Registry::builtin().select(&pkg, &ctx).unwrap();
        sel.strategy
            .run(&mut StepRunner::new(&mut exec, &ctx, &ws))
            .unwrap();
        assert_eq!(exec.command_lines(), vec!["make install"]);
    }

    #[test]
    fn test_zlib_recipe_copies_tree_and_installs() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path());
        let pkg = package(&ctx, "zlib", &["zlib.h", "configure"]);
        fs::create_dir_all(pkg.source_path.join("win32")).unwrap();
        fs::write(pkg.source_path.join("win32").join("Makefile.gcc"), "").unwrap();
        let ws = Workspace::enter(&ctx, "zlib", pkg.source_path.clone()).unwrap();

        let mut exec = RecordingRunner::new();
        Zlib.run(&mut StepRunner::new(&mut exec, &ctx, &ws)).unwrap();

        assert!(ws.in_build("zlib.h").exists());
        assert!(ws.in_build("win32").join("Makefile.gcc").exists());
        let lines = exec.command_lines();
        assert_eq!(lines.len(), 2);
        let expected = format!("configure --prefix={} --static", ctx.sysroot.display());
        assert!(lines[0].ends_with(&expected), "{}", lines[0]);
        assert!(lines[1].starts_with("make -f win32/Makefile.gcc install DESTDIR="));
        assert!(lines[1].contains("PREFIX=i686-w64-mingw32-"));
    }

    #[test]
    fn test_zlib_configure_skipped_once_configured() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path());
        let pkg = package(&ctx, "zlib", &["zlib.h", "configure", "Makefile"]);
        let ws = Workspace::enter(&ctx, "zlib", pkg.source_path.clone()).unwrap();

        let mut exec = RecordingRunner::new();
        Zlib.configure(&mut StepRunner::new(&mut exec, &ctx, &ws)).unwrap();
        assert_eq!(exec.calls.len(), 1);

        fs::write(ws.in_build("configure.log"), "").unwrap();
        let mut exec = RecordingRunner::new();
        Zlib.configure(&mut StepRunner::new(&mut exec, &ctx, &ws)).unwrap();
        assert!(exec.calls.is_empty());

        let mut forced = test_context(dir.path());
        forced.force = true;
        let mut exec = RecordingRunner::new();
        Zlib.configure(&mut StepRunner::new(&mut exec, &forced, &ws)).unwrap();
        assert_eq!(exec.calls.len(), 1);
    }

    #[test]
    fn test_generic_autotools_adds_enable_static() {
        let a = Autotools::with_args(Vec::<String>::new());
        assert_eq!(a.configure_args, vec!["--enable-static"]);
    }
}
