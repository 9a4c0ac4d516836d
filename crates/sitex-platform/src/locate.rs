use std::path::{Path, PathBuf};

use tracing::warn;

use crate::command::Command;
use crate::error::{Error, Result};

/// An external tool and how to recognize it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ToolSpec {
    pub name: &'static str,
    pub version_flag: &'static str,
    /// Substring the version output must contain.
    pub identity: &'static str,
}

pub const WP_CLI: ToolSpec = ToolSpec {
    name: "wp",
    version_flag: "--version",
    identity: "WP-CLI",
};

/// Finds a tool by name. Implementations never take caller input beyond
/// the fixed tool name.
pub trait Locate: Send + Sync {
    fn locate(&self, name: &str) -> Option<PathBuf>;
}

/// Lookup through the process `PATH`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemPath;

impl Locate for SystemPath {
    fn locate(&self, name: &str) -> Option<PathBuf> {
        which::which(name).ok()
    }
}

/// Lookup restricted to a fixed list of directories.
#[derive(Clone, Debug, Default)]
pub struct SearchDirs(pub Vec<PathBuf>);

impl Locate for SearchDirs {
    fn locate(&self, name: &str) -> Option<PathBuf> {
        self.0
            .iter()
            .find_map(|dir| which::which_in(name, Some(dir), dir).ok())
    }
}

const SHELL_METACHARACTERS: &[char] = &[';', '|', '&', '$'];

/// Locate `tool` and check that the binary found is safe to launch and
/// really is the tool it claims to be.
pub fn discover(locator: &dyn Locate, tool: ToolSpec) -> Result<PathBuf> {
    let result = locator
        .locate(tool.name)
        .ok_or(Error::ToolNotFound(tool.name))
        .and_then(|path| check_binary(&path, tool));
    if let Err(e) = &result {
        warn!(target: "security", tool = tool.name, reason = %e, "tool discovery rejected");
    }
    result
}

fn check_binary(path: &Path, tool: ToolSpec) -> Result<PathBuf> {
    let text = path.to_string_lossy();
    if text.trim().is_empty() {
        return Err(Error::ToolNotFound(tool.name));
    }
    if !text.starts_with('/') {
        return Err(Error::NotAbsolute {
            tool: tool.name,
            path: text.into_owned(),
        });
    }
    if text.contains(SHELL_METACHARACTERS) {
        return Err(Error::Suspicious {
            tool: tool.name,
            path: text.into_owned(),
        });
    }
    if !path.exists() {
        return Err(Error::Missing {
            tool: tool.name,
            path: path.to_path_buf(),
        });
    }
    if !sitex_fs::is_executable(path) {
        return Err(Error::NotExecutable {
            tool: tool.name,
            path: path.to_path_buf(),
        });
    }
    verify_identity(path, tool)?;
    Ok(path.to_path_buf())
}

fn verify_identity(path: &Path, tool: ToolSpec) -> Result<()> {
    let mismatch = || Error::IdentityMismatch {
        tool: tool.name,
        path: path.to_path_buf(),
    };
    let output = Command::new(path)
        .arg(tool.version_flag)
        .output()
        .map_err(|_| mismatch())?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    if stdout.contains(tool.identity) {
        Ok(())
    } else {
        Err(mismatch())
    }
}
