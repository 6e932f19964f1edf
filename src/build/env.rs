//! Cross environment files written once the compiler is built.
//!
//! - `cross.env`: POSIX shell script exporting the cross tool names. With
//!   arguments it execs them inside that environment, which is how every
//!   later command gets wrapped.
//! - `toolchain.cmake`: toolchain file for cmake-based packages.

use crate::context::BuildContext;
use crate::error::Result;
use crate::ui;
use std::fs;
use std::path::{Path, PathBuf};

pub fn render_env_script(host: &str, sysroot: &Path) -> String {
    let i = sysroot.display();
    format!(
        r#"#!/bin/sh
h={host}
i={i}
export HOST=$h
export SYSROOT=$i
export CC=$h-gcc
export CXX=$h-g++
export CPP=$h-cpp
export RANLIB=$h-ranlib
export AR=$h-ar
export STRIP=$h-strip
export PKG_CONFIG_PATH="$i/lib/pkgconfig"
export PKG_CONFIG_LIBDIR="$i/lib/pkgconfig"
echo "$PATH" | grep -sqF "$i/bin" || export PATH="$i/bin:$PATH"
[ -z "$1" ] || exec "$@"
"#
    )
}

pub fn render_cmake_toolchain(host: &str, arch: &str, sysroot: &Path, file: &Path) -> String {
    format!(
        r#"# cmake -DCMAKE_TOOLCHAIN_FILE={file} ...
set(setupmingw_host "{host}")
set(setupmingw_sysroot "{sysroot}")
set(CMAKE_SYSTEM_NAME Windows)
set(CMAKE_SYSTEM_PROCESSOR {arch})
set(CMAKE_C_COMPILER ${{setupmingw_sysroot}}/bin/${{setupmingw_host}}-gcc)
set(CMAKE_RC_COMPILER ${{setupmingw_sysroot}}/bin/${{setupmingw_host}}-windres)
set(CMAKE_CXX_COMPILER ${{setupmingw_sysroot}}/bin/${{setupmingw_host}}-g++)
set(CMAKE_FIND_ROOT_PATH "${{setupmingw_sysroot}}")
set(CMAKE_FIND_ROOT_PATH_MODE_PROGRAM NEVER)
set(CMAKE_FIND_ROOT_PATH_MODE_LIBRARY ONLY)
set(CMAKE_FIND_ROOT_PATH_MODE_INCLUDE ONLY)
set(CMAKE_INSTALL_PREFIX "${{CMAKE_FIND_ROOT_PATH}}" CACHE STRING "Install path prefix, prepended onto install directories." FORCE)
set(ENV{{PKG_CONFIG_LIBDIR}} "${{CMAKE_INSTALL_PREFIX}}/lib/pkgconfig")
"#,
        file = file.display(),
        sysroot = sysroot.display(),
    )
}

#[cfg(unix)]
fn allow_execution(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    Ok(())
}

#[cfg(not(unix))]
fn allow_execution(_path: &Path) -> Result<()> {
    Ok(())
}

pub fn write_env_script(ctx: &BuildContext) -> Result<PathBuf> {
    fs::create_dir_all(&ctx.sysroot)?;
    let out = ctx.cross_script_path();
    fs::write(&out, render_env_script(&ctx.host, &ctx.sysroot))?;
    allow_execution(&out)?;
    ui::success(format!("Wrote env script: {}", out.display()));
    Ok(out)
}

pub fn write_cmake_toolchain(ctx: &BuildContext) -> Result<PathBuf> {
    fs::create_dir_all(&ctx.sysroot)?;
    let out = ctx.cmake_toolchain_path();
    fs::write(
        &out,
        render_cmake_toolchain(&ctx.host, &ctx.arch, &ctx.sysroot, &out),
    )?;
    ui::success(format!("Wrote cmake toolchain: {}", out.display()));
    Ok(out)
}

/// Write both files and return the path of the environment script.
pub fn emit(ctx: &BuildContext) -> Result<PathBuf> {
    let script = write_env_script(ctx)?;
    write_cmake_toolchain(ctx)?;
    Ok(script)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_context;

    #[test]
    fn test_env_script_contents() {
        let s = render_env_script("x86_64-w64-mingw32", Path::new("/opt/sys"));
        assert!(s.starts_with("#!/bin/sh\n"));
        assert!(s.contains("h=x86_64-w64-mingw32\n"));
        assert!(s.contains("i=/opt/sys\n"));
        for var in ["CC=$h-gcc", "CXX=$h-g++", "AR=$h-ar", "STRIP=$h-strip", "RANLIB=$h-ranlib"] {
            assert!(s.contains(&format!("export {}", var)), "missing {}", var);
        }
        assert!(s.contains(r#"grep -sqF "$i/bin" || export PATH="$i/bin:$PATH""#));
        assert!(s.trim_end().ends_with(r#"[ -z "$1" ] || exec "$@""#));
    }

    #[test]
    fn test_cmake_toolchain_contents() {
        let s = render_cmake_toolchain(
            "i686-w64-mingw32",
            "i686",
            Path::new("/opt/sys"),
            Path::new("/opt/sys/toolchain.cmake"),
        );
        assert!(s.starts_with("# cmake -DCMAKE_TOOLCHAIN_FILE=/opt/sys/toolchain.cmake"));
        assert!(s.contains("set(CMAKE_SYSTEM_NAME Windows)"));
        assert!(s.contains("set(CMAKE_SYSTEM_PROCESSOR i686)"));
        assert!(s.contains("set(CMAKE_C_COMPILER ${setupmingw_sysroot}/bin/${setupmingw_host}-gcc)"));
        assert!(s.contains("set(CMAKE_FIND_ROOT_PATH_MODE_PROGRAM NEVER)"));
        assert!(s.contains("set(CMAKE_FIND_ROOT_PATH_MODE_LIBRARY ONLY)"));
        assert!(s.contains("set(CMAKE_FIND_ROOT_PATH_MODE_INCLUDE ONLY)"));
        assert!(s.contains("set(ENV{PKG_CONFIG_LIBDIR}"));
    }

    #[cfg(unix)]
    #[test]
    fn test_emit_writes_executable_script() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path());
        let script = emit(&ctx).unwrap();
        assert_eq!(script, ctx.cross_script_path());
        let mode = fs::metadata(&script).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
        assert!(ctx.cmake_toolchain_path().exists());

        // rewriting is harmless
        emit(&ctx).unwrap();
    }
}
