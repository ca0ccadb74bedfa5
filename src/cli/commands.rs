use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::ai::ProviderKind;

/// Conversational assistant for game and community chats
#[derive(Parser, Debug)]
#[command(
    name = "parley",
    about = "Conversational assistant with tool calling and response detection",
    version,
    author,
    long_about = "parley answers chat messages through Ollama, OpenAI or Anthropic, calls \
                  tools exposed by a JSON-RPC tool backend, and decides on its own which \
                  messages deserve an answer."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        short = 'c',
        long,
        global = true,
        value_name = "FILE",
        help = "Configuration file (defaults to $PARLEY_CONFIG or the user config dir)"
    )]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - only log errors"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Send one chat message and print the reply",
        long_about = "Runs detection and, if it decides to answer, a full conversation turn.\n\n\
                      Examples:\n  \
                      parley chat alex \"How do I craft a sword?\"\n  \
                      parley chat alex \"lol\" --force\n  \
                      parley chat alex \"hi\" --provider anthropic --format json"
    )]
    Chat(ChatArgs),

    #[command(
        about = "Show whether a message would be answered",
        long_about = "Runs response detection only; no conversation turn is started.\n\n\
                      Examples:\n  \
                      parley detect \"How do I craft a sword?\"\n  \
                      parley detect \"lol that's funny\" --format yaml"
    )]
    Detect(DetectArgs),

    #[command(
        about = "Check provider availability",
        long_about = "Checks configured providers and optionally runs an end-to-end self-test.\n\n\
                      Examples:\n  \
                      parley health\n  \
                      parley health --provider ollama --self-test"
    )]
    Health(HealthArgs),

    #[command(
        about = "Read `sender: message` lines from stdin and answer them",
        long_about = "Every line is handled concurrently; replies are printed as they finish.\n\
                      Lines without a `sender:` prefix are attributed to `player`.\n\n\
                      Examples:\n  \
                      parley repl\n  \
                      printf 'alex: @ai hello\\n' | parley repl"
    )]
    Repl(ReplArgs),
}

/// Overrides for the active provider
#[derive(Args, Debug, Clone, Default)]
pub struct ProviderOverride {
    #[arg(short = 'p', long, value_enum, help = "Provider to use instead of the configured one")]
    pub provider: Option<ProviderKind>,

    #[arg(short = 'm', long, value_name = "MODEL", help = "Model name for the provider")]
    pub model: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct ChatArgs {
    #[arg(value_name = "PARTICIPANT", help = "Who is speaking")]
    pub participant: String,

    #[arg(value_name = "MESSAGE", help = "The chat message")]
    pub message: String,

    #[arg(long, help = "Answer even if detection would ignore the message")]
    pub force: bool,

    #[command(flatten)]
    pub provider: ProviderOverride,

    #[arg(short = 'f', long, value_enum, default_value = "human", help = "Output format")]
    pub format: OutputFormatArg,
}

#[derive(Parser, Debug, Clone)]
pub struct DetectArgs {
    #[arg(value_name = "MESSAGE", help = "The chat message")]
    pub message: String,

    #[arg(long, default_value = "player", help = "Who is speaking")]
    pub participant: String,

    #[arg(long, help = "Consult the detection provider for ambiguous messages")]
    pub intelligent: bool,

    #[arg(short = 'f', long, value_enum, default_value = "human", help = "Output format")]
    pub format: OutputFormatArg,
}

#[derive(Parser, Debug, Clone)]
pub struct HealthArgs {
    #[arg(
        short = 'p',
        long,
        value_enum,
        help = "Specific provider to check (omit to check all)"
    )]
    pub provider: Option<ProviderKind>,

    #[arg(long, help = "Also run a bounded conversation turn against the active provider")]
    pub self_test: bool,

    #[arg(short = 'f', long, value_enum, default_value = "human", help = "Output format")]
    pub format: OutputFormatArg,
}

#[derive(Parser, Debug, Clone)]
pub struct ReplArgs {
    #[arg(long, help = "Answer every line, skipping detection")]
    pub force: bool,

    #[command(flatten)]
    pub provider: ProviderOverride,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Yaml,
    Human,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Yaml => super::output::OutputFormat::Yaml,
            OutputFormatArg::Human => super::output::OutputFormat::Human,
        }
    }
}
