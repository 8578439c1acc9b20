pub mod config;
pub mod instrument;
pub mod report;
pub mod tools;
pub mod workflow;

// Re-export common items
pub use config::Config;
pub use workflow::{run_coverage, ToolFailed};
