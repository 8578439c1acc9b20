use crate::config::Config;
use crate::instrument::{self, InstrumentEnv};
use crate::report;
use crate::tools;
use anyhow::{Context, Result};
use colored::Colorize;

/// Fatal failure of an external tool. Carries the tool's exit code so
/// the process can terminate with the same status.
#[derive(Debug, thiserror::Error)]
#[error("{tool} exited with status {code}")]
pub struct ToolFailed {
    pub tool: String,
    pub code: i32,
}

/// Full coverage workflow: instrumented test run, artifact check, tool
/// check, report generation, cleanup, best-effort browser open.
///
/// Fail-fast: a failing test run stops everything before the report
/// stage, since its coverage data would be invalid.
pub async fn run_coverage(config: &Config) -> Result<()> {
    run_tests(config).await?;
    build_report(config).await
}

/// Report-only path: aggregate existing instrumentation data without
/// rerunning the tests.
pub async fn run_report(config: &Config) -> Result<()> {
    build_report(config).await
}

async fn run_tests(config: &Config) -> Result<()> {
    // 1. Instrumentation environment, scoped to the spawned process only
    let env = InstrumentEnv::new(&config.profile_dir);
    for (key, value) in env.vars() {
        log::debug!("{}={}", key, value);
    }

    // 2. Run the tests
    println!(
        "{} Running tests with coverage instrumentation...",
        "▶".green().bold()
    );
    let status = tokio::process::Command::new(&config.cargo)
        .args(["test", "--tests", "--", "--nocapture"])
        .envs(env.vars())
        .status()
        .await
        .with_context(|| format!("Failed to run test runner: {}", config.cargo))?;

    if !status.success() {
        return Err(ToolFailed {
            tool: format!("{} test", config.cargo),
            code: status.code().unwrap_or(1),
        }
        .into());
    }

    Ok(())
}

async fn build_report(config: &Config) -> Result<()> {
    // 3. Instrumentation artifacts gate report generation
    let profraw = instrument::find_profraw(&config.profile_dir)?;
    if profraw.is_empty() {
        anyhow::bail!(
            "No .profraw files found in {} — nothing to aggregate",
            config.profile_dir.display()
        );
    }
    println!(
        "{} Found {} instrumentation file(s).",
        "✓".green(),
        profraw.len()
    );

    // 4. The report reflects only this run
    report::reset_report_dir(&config.report_dir)?;

    // 5. Required tools, installed if missing
    tools::ensure_tools(&config.cargo, &config.tools).await?;

    // 6. Generate, then clean the transient artifacts unconditionally.
    // A generation failure still propagates, but never leaves the
    // profile directory behind.
    let generated = report::generate(config).await;
    let cleaned = instrument::clean_profraw(&config.profile_dir);
    generated?;
    cleaned?;

    println!(
        "{} Coverage report ready: {}",
        "✅".green().bold(),
        config.entry_file().display().to_string().cyan()
    );

    // 7. Best-effort open
    if config.open {
        report::open_report(config).await;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("covrun-wf-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[cfg(unix)]
    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    /// Fake cargo that honors LLVM_PROFILE_FILE the way a real
    /// instrumented test run would: writes a .profraw next to the
    /// templated path.
    #[cfg(unix)]
    fn passing_cargo(dir: &Path) -> PathBuf {
        write_script(
            dir,
            "cargo",
            "d=$(dirname \"$LLVM_PROFILE_FILE\")\nmkdir -p \"$d\"\ntouch \"$d/fake.profraw\"",
        )
    }

    #[cfg(unix)]
    fn fake_config(dir: &Path, cargo: &Path, generator: &Path) -> Config {
        Config {
            profile_dir: dir.join("coverage"),
            report_dir: dir.join("report"),
            binary_path: dir.join("debug"),
            cargo: cargo.display().to_string(),
            generator: generator.display().to_string(),
            tools: vec![generator.display().to_string()],
            opener: None,
            open: false,
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_tests_stop_the_workflow() {
        let dir = temp_dir();
        let cargo = write_script(&dir, "cargo", "exit 7");
        let marker = dir.join("generator-ran");
        let generator =
            write_script(&dir, "grcov", &format!("touch {}", marker.display()));

        let mut config = fake_config(&dir, &cargo, &generator);
        config.report_dir = dir.join("html");
        std::fs::create_dir_all(&config.report_dir).unwrap();
        std::fs::write(config.report_dir.join("index.html"), b"stale").unwrap();

        let err = run_coverage(&config).await.unwrap_err();
        let failed = err.downcast_ref::<ToolFailed>().unwrap();
        assert_eq!(failed.code, 7);

        // Report stage never reached: no generator run, old report intact
        assert!(!marker.exists());
        let stale = std::fs::read(config.report_dir.join("index.html")).unwrap();
        assert_eq!(stale, b"stale");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_successful_run_produces_report_and_cleans_up() {
        let dir = temp_dir();
        let cargo = passing_cargo(&dir);
        let report_dir = dir.join("report");
        let generator = write_script(
            &dir,
            "grcov",
            &format!(
                "mkdir -p {r}\necho report > {r}/index.html",
                r = report_dir.display()
            ),
        );
        let record = dir.join("opened.log");
        let opener = write_script(&dir, "opener", &format!("echo \"$@\" >> {}", record.display()));

        let mut config = fake_config(&dir, &cargo, &generator);
        config.opener = Some(opener.display().to_string());
        config.open = true;

        run_coverage(&config).await.unwrap();

        assert!(config.entry_file().is_file());
        assert!(!config.profile_dir.exists(), "profraw dir must be cleaned");

        let logged = std::fs::read_to_string(&record).unwrap();
        let lines: Vec<&str> = logged.lines().collect();
        assert_eq!(lines.len(), 1, "opener must run exactly once");
        assert_eq!(lines[0], config.entry_file().display().to_string());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_rerun_replaces_report_contents() {
        let dir = temp_dir();
        let cargo = passing_cargo(&dir);
        let report_dir = dir.join("report");
        let generator = write_script(
            &dir,
            "grcov",
            &format!(
                "mkdir -p {r}\necho report > {r}/index.html",
                r = report_dir.display()
            ),
        );

        let config = fake_config(&dir, &cargo, &generator);

        run_coverage(&config).await.unwrap();
        std::fs::write(config.report_dir.join("leftover.html"), b"old").unwrap();
        run_coverage(&config).await.unwrap();

        assert!(config.entry_file().is_file());
        assert!(!config.report_dir.join("leftover.html").exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_no_profraw_is_fatal_before_generation() {
        let dir = temp_dir();
        // Passes but produces no instrumentation data
        let cargo = write_script(&dir, "cargo", "exit 0");
        let marker = dir.join("generator-ran");
        let generator =
            write_script(&dir, "grcov", &format!("touch {}", marker.display()));

        let config = fake_config(&dir, &cargo, &generator);

        let err = run_coverage(&config).await.unwrap_err();
        assert!(err.to_string().contains("profraw"));
        assert!(!marker.exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_generator_failure_still_cleans_profraw() {
        let dir = temp_dir();
        let cargo = passing_cargo(&dir);
        let generator = write_script(&dir, "grcov", "exit 2");

        let config = fake_config(&dir, &cargo, &generator);

        let err = run_coverage(&config).await.unwrap_err();
        let failed = err.downcast_ref::<ToolFailed>().unwrap();
        assert_eq!(failed.code, 2);
        assert!(!config.profile_dir.exists(), "cleanup runs even on failure");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_missing_opener_does_not_fail_the_workflow() {
        let dir = temp_dir();
        let cargo = passing_cargo(&dir);
        let report_dir = dir.join("report");
        let generator = write_script(
            &dir,
            "grcov",
            &format!(
                "mkdir -p {r}\necho report > {r}/index.html",
                r = report_dir.display()
            ),
        );

        let mut config = fake_config(&dir, &cargo, &generator);
        config.opener = Some("covrun-no-such-opener-zz".to_string());
        config.open = true;

        // Opener absence is tolerated: the whole run still succeeds
        run_coverage(&config).await.unwrap();
        assert!(config.entry_file().is_file());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_report_only_path_skips_test_runner() {
        let dir = temp_dir();
        let cargo_marker = dir.join("cargo-ran");
        let cargo = write_script(&dir, "cargo", &format!("touch {}", cargo_marker.display()));
        let report_dir = dir.join("report");
        let generator = write_script(
            &dir,
            "grcov",
            &format!(
                "mkdir -p {r}\necho report > {r}/index.html",
                r = report_dir.display()
            ),
        );

        let config = fake_config(&dir, &cargo, &generator);
        std::fs::create_dir_all(&config.profile_dir).unwrap();
        std::fs::write(config.profile_dir.join("old.profraw"), b"x").unwrap();

        run_report(&config).await.unwrap();

        assert!(!cargo_marker.exists(), "report path must not run tests");
        assert!(config.entry_file().is_file());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
