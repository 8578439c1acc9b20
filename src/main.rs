use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use covrun::{config::Config, report, tools, workflow, ToolFailed};

#[derive(Parser)]
#[command(name = "covrun")]
#[command(author = "NL Team")]
#[command(version = "0.1.0")]
#[command(about = "Cargo test-coverage workflow CLI", long_about = None)]
struct Cli {
    /// Path to a covrun.yaml config file (defaults to ./covrun.yaml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run tests with coverage instrumentation and generate the HTML report
    Run {
        /// Do not open the report in a browser afterwards
        #[arg(long, default_value = "false")]
        no_open: bool,
    },

    /// Generate the report from existing instrumentation data, without rerunning tests
    Report {
        /// Do not open the report in a browser afterwards
        #[arg(long, default_value = "false")]
        no_open: bool,
    },

    /// Check required tools, installing any that are missing
    Tools,

    /// Delete instrumentation artifacts and the report directory
    Clean,
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        eprintln!("{} {:#}", "❌".red().bold(), err);
        let code = err
            .downcast_ref::<ToolFailed>()
            .map(|failed| failed.code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Run { no_open: false }) {
        Commands::Run { no_open } => {
            if no_open {
                config.open = false;
            }
            println!("{} Coverage workflow", "▶".green().bold());
            println!("  Profile dir: {}", config.profile_dir.display().to_string().cyan());
            println!("  Report dir:  {}", config.report_dir.display().to_string().cyan());

            workflow::run_coverage(&config).await?;
        }

        Commands::Report { no_open } => {
            if no_open {
                config.open = false;
            }
            println!(
                "{} Generating report from existing instrumentation data...",
                "📊".blue()
            );
            workflow::run_report(&config).await?;
        }

        Commands::Tools => {
            println!("{}", "Checking required tools...".blue().bold());
            tools::ensure_tools(&config.cargo, &config.tools).await?;
            println!("\n{}", "All required tools are ready!".green().bold());
        }

        Commands::Clean => {
            println!("{} Cleaning coverage artifacts...", "🧹".blue());
            covrun::instrument::clean_profraw(&config.profile_dir)?;
            report::reset_report_dir(&config.report_dir)?;
            println!("{} Clean.", "✓".green());
        }
    }

    Ok(())
}
