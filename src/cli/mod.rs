pub mod commands;
pub mod handlers;
pub mod output;

pub use commands::{ChatArgs, CliArgs, Commands, DetectArgs, HealthArgs, ReplArgs};
pub use output::{ChatReport, HealthStatus, OutputFormat, OutputFormatter};
