use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Name of the optional config file looked up in the working directory.
pub const CONFIG_FILE: &str = "covrun.yaml";

/// Workflow configuration. Every external collaborator (test runner,
/// report generator, browser opener) and every path the workflow touches
/// comes from here, so tests can point the whole pipeline at stand-ins.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Where the test binaries write raw .profraw instrumentation data.
    /// Deleted at the end of every run.
    pub profile_dir: PathBuf,

    /// Where the HTML report tree is written. Recreated each run.
    pub report_dir: PathBuf,

    /// Where grcov finds the instrumented test binaries.
    pub binary_path: PathBuf,

    /// Test runner and tool installer program.
    pub cargo: String,

    /// Coverage report generator program.
    pub generator: String,

    /// Tools that must be invocable before report generation. Missing
    /// ones are installed with `cargo install`.
    pub tools: Vec<String>,

    /// Browser-opener program. When unset, a platform default is probed.
    pub opener: Option<String>,

    /// Open the report in a browser after generation.
    pub open: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            profile_dir: PathBuf::from("target/coverage"),
            report_dir: PathBuf::from("target/coverage-report"),
            binary_path: PathBuf::from("target/debug"),
            cargo: "cargo".to_string(),
            generator: "grcov".to_string(),
            tools: crate::tools::REQUIRED_TOOLS
                .iter()
                .map(|t| t.to_string())
                .collect(),
            opener: None,
            open: true,
        }
    }
}

impl Config {
    /// Load configuration. An explicitly given path must exist and parse;
    /// otherwise `covrun.yaml` in the working directory is used when
    /// present, and built-in defaults when not.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default = PathBuf::from(CONFIG_FILE);
                if !default.is_file() {
                    return Ok(Self::default());
                }
                default
            }
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// The report directory must not live inside the profile directory:
    /// the profile directory is deleted after report generation, which
    /// would take the freshly generated report with it.
    pub fn validate(&self) -> Result<()> {
        if self.report_dir.starts_with(&self.profile_dir) {
            anyhow::bail!(
                "report_dir {} is inside profile_dir {}; it would be deleted along with the instrumentation artifacts",
                self.report_dir.display(),
                self.profile_dir.display()
            );
        }
        Ok(())
    }

    /// Entry file of the generated HTML report.
    pub fn entry_file(&self) -> PathBuf {
        self.report_dir.join("index.html")
    }
}
