use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;

/// Tools the report stage depends on. grcov aggregates the profraw data
/// into HTML; rustfilt demangles symbol names in the output.
pub const REQUIRED_TOOLS: &[&str] = &["grcov", "rustfilt"];

/// Check whether a tool is invocable. Looks on PATH first, then in the
/// cargo bin directory: a tool installed by `cargo install` earlier in
/// the same session may not be on PATH yet.
pub fn is_installed(name: &str) -> bool {
    if which::which(name).is_ok() {
        return true;
    }
    cargo_bin_dir()
        .map(|dir| dir.join(name).is_file())
        .unwrap_or(false)
}

fn cargo_bin_dir() -> Option<PathBuf> {
    if let Ok(cargo_home) = std::env::var("CARGO_HOME") {
        return Some(PathBuf::from(cargo_home).join("bin"));
    }
    dirs::home_dir().map(|home| home.join(".cargo").join("bin"))
}

/// Install a tool if it is not already invocable. Idempotent: a present
/// tool is never reinstalled.
pub async fn ensure_tool(cargo: &str, name: &str) -> Result<()> {
    if is_installed(name) {
        println!("{} {} is already installed.", "✓".green(), name);
        return Ok(());
    }

    println!("{} Installing {}...", "⬇".yellow(), name.cyan());
    let status = tokio::process::Command::new(cargo)
        .args(["install", name])
        .status()
        .await
        .with_context(|| format!("Failed to run {} install {}", cargo, name))?;

    if !status.success() {
        anyhow::bail!("Failed to install {}", name);
    }

    println!("{} {} installed.", "✓".green(), name);
    Ok(())
}

/// Apply the check-then-install procedure to every required tool.
pub async fn ensure_tools(cargo: &str, names: &[String]) -> Result<()> {
    for name in names {
        ensure_tool(cargo, name).await?;
    }
    Ok(())
}
