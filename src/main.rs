use parley::cli::commands::{CliArgs, Commands};
use parley::cli::handlers::{handle_chat, handle_detect, handle_health, handle_repl, load_config};
use parley::util::logging::{init_logging, parse_level, LoggingConfig};
use parley::VERSION;

use clap::Parser;
use std::env;
use tracing::{debug, error, Level};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    let loaded = load_config(&args);
    let configured_level = loaded.as_ref().ok().map(|config| config.log_level.clone());
    init_logging(logging_from_args(&args, configured_level.as_deref()));

    debug!("parley v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(2);
        }
    };

    let exit_code = match &args.command {
        Commands::Chat(chat_args) => handle_chat(chat_args, config).await,
        Commands::Detect(detect_args) => handle_detect(detect_args, config).await,
        Commands::Health(health_args) => handle_health(health_args, config).await,
        Commands::Repl(repl_args) => handle_repl(repl_args, config).await,
    };

    std::process::exit(exit_code);
}

/// `--log-level`, then `-v`/`-q`, then the configured level (which already
/// reflects `PARLEY_LOG_LEVEL`)
fn logging_from_args(args: &CliArgs, configured_level: Option<&str>) -> LoggingConfig {
    let mut config = LoggingConfig::from_lookup(|key| env::var(key).ok());
    if let Some(level) = configured_level.and_then(parse_level) {
        config.level = level;
    }

    if let Some(level) = args.log_level.as_deref().and_then(parse_level) {
        config.level = level;
    } else if args.verbose {
        config.level = Level::DEBUG;
    } else if args.quiet {
        config.level = Level::ERROR;
    }

    config
}
