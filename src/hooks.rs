//! Optional `preinstall` / `postinstall` scripts in the working directory.

use std::{
    fs,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
    process::Command,
};

use tracing::{debug, info};

use crate::{
    error::{Error, Result},
    resolve::ConnectionTarget,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    Preinstall,
    Postinstall,
}

impl Hook {
    pub fn filename(self) -> &'static str {
        match self {
            Hook::Preinstall => "preinstall",
            Hook::Postinstall => "postinstall",
        }
    }
}

/// Finds and runs hooks in one directory.
#[derive(Debug, Clone)]
pub struct HookRunner {
    dir: PathBuf,
}

impl HookRunner {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The hook's path, if it exists as an executable file.
    pub fn find(&self, hook: Hook) -> Option<PathBuf> {
        let path = self.dir.join(hook.filename());
        is_executable(&path).then_some(path)
    }

    /// Runs the hook with inherited stdio. Returns whether it ran; a missing
    /// hook is not an error, a failing one is.
    pub fn run(&self, hook: Hook, target: &ConnectionTarget) -> Result<bool> {
        let Some(path) = self.find(hook) else {
            debug!(hook = hook.filename(), dir = %self.dir.display(), "no hook");
            return Ok(false);
        };

        info!(hook = hook.filename(), path = %path.display(), "running hook");

        let status = Command::new(&path)
            .current_dir(&self.dir)
            .env("DOKKU_HOST", &target.host)
            .env("DOKKU_APP", &target.app)
            .status()
            .map_err(|source| Error::HookSpawn {
                hook: hook.filename(),
                source,
            })?;

        if !status.success() {
            return Err(Error::HookFailed {
                hook: hook.filename(),
                status: status.code().unwrap_or(-1),
            });
        }

        Ok(true)
    }
}

fn is_executable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}
