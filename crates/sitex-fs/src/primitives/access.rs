//! Access probes answered by the kernel rather than by mode bits.

use std::path::Path;

#[cfg(unix)]
fn probe(path: &Path, flags: nix::unistd::AccessFlags) -> bool {
    nix::unistd::access(path, flags).is_ok()
}

#[cfg(unix)]
pub fn is_readable(path: &Path) -> bool {
    probe(path, nix::unistd::AccessFlags::R_OK)
}

#[cfg(unix)]
pub fn is_writable(path: &Path) -> bool {
    probe(path, nix::unistd::AccessFlags::W_OK)
}

#[cfg(unix)]
pub fn is_executable(path: &Path) -> bool {
    path.is_file() && probe(path, nix::unistd::AccessFlags::X_OK)
}

#[cfg(not(unix))]
pub fn is_readable(path: &Path) -> bool {
    if path.is_dir() {
        std::fs::read_dir(path).is_ok()
    } else {
        std::fs::File::open(path).is_ok()
    }
}

#[cfg(not(unix))]
pub fn is_writable(path: &Path) -> bool {
    path.metadata()
        .map(|m| !m.permissions().readonly())
        .unwrap_or(false)
}

#[cfg(not(unix))]
pub fn is_executable(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("exe"))
            .unwrap_or(false)
}
