use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Compiler flags enabling LLVM source-based coverage. Warnings are
/// suppressed so the instrumented build does not drown the test output.
const RUSTFLAGS: &str = "-Cinstrument-coverage -Awarnings";

/// Per-process (%p) and per-module (%m) placeholders keep concurrent
/// test processes from overwriting each other's profile data.
const PROFILE_TEMPLATE: &str = "cargo-test-%p-%m.profraw";

/// Environment for an instrumented `cargo test` run. Applied to the
/// spawned child only, never to our own process environment.
#[derive(Debug, Clone)]
pub struct InstrumentEnv {
    rustflags: String,
    profile_file: String,
}

impl InstrumentEnv {
    pub fn new(profile_dir: &Path) -> Self {
        Self {
            rustflags: RUSTFLAGS.to_string(),
            profile_file: profile_dir.join(PROFILE_TEMPLATE).display().to_string(),
        }
    }

    /// Variable pairs for `Command::envs`.
    pub fn vars(&self) -> [(&'static str, &str); 2] {
        [
            ("RUSTFLAGS", self.rustflags.as_str()),
            ("LLVM_PROFILE_FILE", self.profile_file.as_str()),
        ]
    }
}

/// Find raw instrumentation files under `profile_dir`. A directory that
/// does not exist yields an empty list, not an error.
pub fn find_profraw(profile_dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = profile_dir.join("**").join("*.profraw");
    let pattern = pattern.to_string_lossy().to_string();

    let mut files = Vec::new();
    for entry in glob::glob(&pattern)
        .with_context(|| format!("Invalid profraw glob pattern: {}", pattern))?
    {
        match entry {
            Ok(path) => files.push(path),
            Err(e) => log::warn!("Skipping unreadable profraw entry: {}", e),
        }
    }

    log::debug!("Found {} profraw file(s) under {}", files.len(), profile_dir.display());
    Ok(files)
}

/// Delete the instrumentation output directory. Absence is tolerated.
pub fn clean_profraw(profile_dir: &Path) -> Result<()> {
    match std::fs::remove_dir_all(profile_dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| {
            format!("Failed to remove profile directory: {}", profile_dir.display())
        }),
    }
}
