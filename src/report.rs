use crate::config::Config;
use crate::workflow::ToolFailed;
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;

/// Remove the report directory so the regenerated report reflects only
/// the current run. Absence is not an error.
pub fn reset_report_dir(report_dir: &Path) -> Result<()> {
    match std::fs::remove_dir_all(report_dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| {
            format!("Failed to remove report directory: {}", report_dir.display())
        }),
    }
}

/// Run the report generator, producing the HTML tree in the report
/// directory. Fatal on non-zero exit.
pub async fn generate(config: &Config) -> Result<()> {
    println!(
        "{} Generating HTML coverage report into {}...",
        "📊".blue(),
        config.report_dir.display().to_string().cyan()
    );

    let status = tokio::process::Command::new(&config.generator)
        .arg(".")
        .arg("--binary-path")
        .arg(&config.binary_path)
        .args(["-s", ".", "-t", "html", "--branch", "--ignore-not-existing"])
        .arg("-o")
        .arg(&config.report_dir)
        .status()
        .await
        .with_context(|| format!("Failed to run report generator: {}", config.generator))?;

    if !status.success() {
        return Err(ToolFailed {
            tool: config.generator.clone(),
            code: status.code().unwrap_or(1),
        }
        .into());
    }

    Ok(())
}

/// Open the report entry file in a browser. Best-effort: a missing
/// opener skips silently, a failing one only logs.
pub async fn open_report(config: &Config) {
    let candidate = match config.opener.as_deref() {
        Some(name) => name,
        None => default_opener(),
    };

    let opener = match which::which(candidate) {
        Ok(path) => path,
        Err(_) => {
            log::debug!("No browser opener ({}) available, skipping", candidate);
            return;
        }
    };

    let entry = config.entry_file();
    println!("{} Opening {}...", "🌐".blue(), entry.display());

    match tokio::process::Command::new(&opener).arg(&entry).status().await {
        Ok(status) if status.success() => {}
        Ok(status) => log::warn!("{} exited with {}", opener.display(), status),
        Err(e) => log::warn!("Failed to run {}: {}", opener.display(), e),
    }
}

fn default_opener() -> &'static str {
    if cfg!(target_os = "macos") {
        "open"
    } else if cfg!(target_os = "windows") {
        "explorer"
    } else {
        "xdg-open"
    }
}
