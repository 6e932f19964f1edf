//! Top-level pipeline: selection, acquisition, compiler bootstrap, libraries.

use super::bootstrap::run_bootstrap;
use super::steps::{StepRunner, Workspace};
use super::strategy::Registry;
use crate::catalog::{
    Catalog, PackageDescriptor, ResolvedPackage, Selection, Selector, parse_descriptors,
    resolve_selection,
};
use crate::context::{BuildContext, COMPILER_PACKAGES};
use crate::error::{Result, SetupError};
use crate::fetch::{AcquisitionPlan, Transport, acquire_sources};
use crate::report;
use crate::runner::{Exec, Timer};
use crate::ui;
use colored::*;

/// Built-in catalog, overridden by descriptor lines from the config file,
/// then narrowed by the command-line selectors.
pub fn select_packages(config_lines: &[String], args: &[String]) -> Result<Vec<PackageDescriptor>> {
    let mut catalog = Catalog::builtin();
    catalog.merge(parse_descriptors(&config_lines.join("\n"))?);
    let selectors: Vec<Selector> = args.iter().map(|a| Selector::classify(a)).collect();
    resolve_selection(catalog, &selectors)
}

/// Library packages in selection order.
pub fn library_packages(selection: &Selection) -> impl Iterator<Item = &ResolvedPackage> {
    selection
        .iter()
        .filter(|p| !COMPILER_PACKAGES.contains(&p.name()))
}

/// Build every selected package that is not part of the compiler, through the
/// cross environment script.
pub fn build_libraries(
    exec: &mut dyn Exec,
    ctx: &mut BuildContext,
    selection: &Selection,
    registry: &Registry,
) -> Result<Vec<String>> {
    let mut built = Vec::new();
    if library_packages(selection).next().is_none() {
        return Ok(built);
    }

    let script = ctx.cross_script_path();
    if !script.exists() {
        return Err(SetupError::filesystem(format!(
            "Cross environment script not found: {} (build the compiler first)",
            script.display()
        )));
    }
    if ctx.cross_env().is_none() {
        ctx.activate_cross_env(script);
    }
    let ctx: &BuildContext = ctx;

    for pkg in library_packages(selection) {
        if !pkg.source_path.exists() {
            return Err(SetupError::filesystem(format!(
                "Sources not found: {}",
                pkg.source_path.display()
            )));
        }
        let ws = Workspace::enter(ctx, pkg.name(), pkg.source_path.clone())?;
        let selected = registry.select(pkg, ctx)?;
        ui::info(format!(
            "Building {} ({})",
            pkg.name().bold(),
            selected.origin.label()
        ));
        selected
            .strategy
            .run(&mut StepRunner::new(&mut *exec, ctx, &ws))?;
        exec.clear_output();
        built.push(pkg.name().to_string());
    }
    Ok(built)
}

/// Report, acquire sources, then build unless only downloading.
pub fn run(
    exec: &mut dyn Exec,
    transport: &dyn Transport,
    ctx: &mut BuildContext,
    selection: &Selection,
    registry: &Registry,
) -> Result<()> {
    let timer = Timer::start();
    let plan = AcquisitionPlan::compute(selection, ctx);
    report::preflight(ctx, selection, &plan)?;
    acquire_sources(exec, transport, ctx, &plan)?;

    if !ctx.only_download {
        run_bootstrap(exec, ctx, selection)?;
        build_libraries(exec, ctx, selection, registry)?;
    }
    ui::success(format!("All done in {}", timer.formatted()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::bootstrap::Stage;
    use crate::context::test_context;
    use crate::error::ErrorKind;
    use crate::runner::testing::RecordingRunner;
    use std::cell::RefCell;
    use std::fs;
    use std::path::Path;

    #[derive(Default)]
    struct ArchiveTransport {
        urls: RefCell<Vec<String>>,
    }

    impl Transport for ArchiveTransport {
        fn download(&self, url: &str, dest: &Path) -> Result<()> {
            self.urls.borrow_mut().push(url.to_string());
            fs::write(dest, b"archive")?;
            Ok(())
        }

        fn clone_repo(&self, url: &str, _dest: &Path) -> Result<()> {
            Err(SetupError::acquisition(format!("unexpected clone of {}", url)))
        }
    }

    /// `tar` creates a single `<name>-1.0` tree holding a `configure` script.
    fn unpacking_runner() -> RecordingRunner {
        RecordingRunner::new().with_effect(|inv| {
            if inv.program == "tar" {
                let archive = Path::new(&inv.args[1]);
                let name = archive.file_name().unwrap().to_string_lossy();
                let name = name.split('.').next().unwrap().to_string();
                let tree = inv.cwd.join(format!("{}-1.0", name));
                fs::create_dir_all(&tree).unwrap();
                fs::write(tree.join("configure"), "#!/bin/sh").unwrap();
            }
        })
    }

    fn with_cross_script(ctx: &BuildContext) {
        fs::create_dir_all(&ctx.sysroot).unwrap();
        fs::write(ctx.cross_script_path(), "#!/bin/sh\n").unwrap();
    }

    fn local_selection(ctx: &BuildContext, names: &[&str]) -> Selection {
        Selection::locate(
            names
                .iter()
                .map(|n| PackageDescriptor::new(*n, format!("https://x/{}.tar.xz", n)))
                .collect(),
            &ctx.src_root,
        )
    }

    #[test]
    fn test_select_packages_applies_config_overrides() {
        let config = vec!["gcc=https://mirror/gcc-15.tar.xz".to_string(), "# note".to_string()];
        let all = select_packages(&config, &[]).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[2].location, "https://mirror/gcc-15.tar.xz");

        let one = select_packages(&config, &["gcc".to_string()]).unwrap();
        assert_eq!(one.len(), 1);

        let err = select_packages(&config, &["nosuchpkg".to_string()]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Selection);

        let bad = vec!["not a descriptor".to_string()];
        assert_eq!(select_packages(&bad, &[]).unwrap_err().kind, ErrorKind::Selection);
    }

    #[test]
    fn test_cmake_only_tree_uses_cmake() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = test_context(dir.path());
        with_cross_script(&ctx);
        let sel = local_selection(&ctx, &["glfw"]);
        fs::create_dir_all(ctx.src_root.join("glfw")).unwrap();
        fs::write(ctx.src_root.join("glfw/CMakeLists.txt"), "project(glfw)").unwrap();

        let mut exec = RecordingRunner::new();
        let built = build_libraries(&mut exec, &mut ctx, &sel, &Registry::builtin()).unwrap();
        assert_eq!(built, vec!["glfw"]);
        assert_eq!(exec.programs(), vec!["cmake", "make", "make"]);
        assert_eq!(exec.calls[0].cwd, ctx.build_root.join("glfw"));
        // wrapped through the environment script
        assert_eq!(Path::new(&exec.argvs[0][0]), ctx.cross_script_path());
        assert_eq!(exec.clears, 1);
    }

    #[test]
    fn test_autotools_tree_configured_for_cross() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = test_context(dir.path());
        with_cross_script(&ctx);
        let sel = local_selection(&ctx, &["libogg"]);
        let src = ctx.src_root.join("libogg");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("configure"), "#!/bin/sh").unwrap();
        fs::write(src.join("CMakeLists.txt"), "project(ogg)").unwrap();

        let mut exec = RecordingRunner::new();
        build_libraries(&mut exec, &mut ctx, &sel, &Registry::builtin()).unwrap();
        let configure = &exec.calls[0];
        assert!(configure.program.ends_with("libogg/configure"));
        assert!(configure.args.contains(&"--host=i686-w64-mingw32".to_string()));
        assert!(configure.args.contains(&"--enable-static".to_string()));
    }

    #[test]
    fn test_libraries_require_cross_script() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = test_context(dir.path());
        let sel = local_selection(&ctx, &["zlib"]);
        let err = build_libraries(&mut RecordingRunner::new(), &mut ctx, &sel, &Registry::builtin())
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Filesystem);
        assert!(err.message.contains("cross.env"));
    }

    #[test]
    fn test_libraries_require_sources() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = test_context(dir.path());
        with_cross_script(&ctx);
        let sel = local_selection(&ctx, &["zlib"]);
        let err = build_libraries(&mut RecordingRunner::new(), &mut ctx, &sel, &Registry::builtin())
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Filesystem);
        assert!(err.message.starts_with("Sources not found"));
    }

    #[test]
    fn test_unrecognized_build_system() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = test_context(dir.path());
        with_cross_script(&ctx);
        let sel = local_selection(&ctx, &["mystery"]);
        fs::create_dir_all(ctx.src_root.join("mystery")).unwrap();
        let err = build_libraries(&mut RecordingRunner::new(), &mut ctx, &sel, &Registry::builtin())
            .unwrap_err();
        assert!(err.message.contains("Unrecognized build system"));
    }

    #[test]
    fn test_compiler_packages_are_not_libraries() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = test_context(dir.path());
        let sel = local_selection(&ctx, &["binutils", "mingw-w64", "gcc"]);
        let built = build_libraries(&mut RecordingRunner::new(), &mut ctx, &sel, &Registry::builtin())
            .unwrap();
        assert!(built.is_empty());
        assert!(ctx.cross_env().is_none());
    }

    #[test]
    fn test_binutils_only_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = test_context(dir.path());
        let descs = select_packages(&[], &["binutils=https://x/binutils.tar.xz".to_string()]).unwrap();
        let sel = Selection::locate(descs, &ctx.src_root);
        let plan = AcquisitionPlan::compute(&sel, &ctx);
        assert_eq!(plan.needs_download.len(), 1);

        let transport = ArchiveTransport::default();
        let mut exec = unpacking_runner();
        run(&mut exec, &transport, &mut ctx, &sel, &Registry::builtin()).unwrap();

        assert_eq!(*transport.urls.borrow(), vec!["https://x/binutils.tar.xz"]);
        let build_cmds: Vec<_> = exec
            .calls
            .iter()
            .filter(|c| c.cwd == ctx.build_root.join("binutils"))
            .map(|c| c.command_line())
            .collect();
        assert_eq!(build_cmds.len(), 3);
        assert!(build_cmds[0].contains("binutils/configure"));
        assert!(Stage::Binutils.marker_path(&ctx.build_root).exists());
        assert!(ctx.src_root.join("binutils/configure").exists());

        let transport = ArchiveTransport::default();
        let mut exec = unpacking_runner();
        let mut ctx = test_context(dir.path());
        run(&mut exec, &transport, &mut ctx, &sel, &Registry::builtin()).unwrap();
        assert!(transport.urls.borrow().is_empty());
        assert!(exec.calls.is_empty());
    }

    #[test]
    fn test_only_download_stops_after_acquisition() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = test_context(dir.path());
        ctx.only_download = true;
        let sel = local_selection(&ctx, &["binutils", "zlib"]);

        let transport = ArchiveTransport::default();
        let mut exec = unpacking_runner();
        run(&mut exec, &transport, &mut ctx, &sel, &Registry::builtin()).unwrap();
        assert_eq!(transport.urls.borrow().len(), 2);
        assert!(exec.programs().iter().all(|p| p == "tar"));
        assert!(!ctx.build_root.exists());
    }

    #[test]
    fn test_nothing_to_do_is_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = test_context(dir.path());
        ctx.only_download = true;
        let sel = local_selection(&ctx, &["zlib"]);
        fs::create_dir_all(ctx.src_root.join("zlib")).unwrap();

        let err = run(
            &mut RecordingRunner::new(),
            &ArchiveTransport::default(),
            &mut ctx,
            &sel,
            &Registry::builtin(),
        )
        .unwrap_err();
        assert!(err.is_cancelled());
    }
}
