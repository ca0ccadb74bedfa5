//! Subcommand implementations
//!
//! Each handler returns the process exit code. Errors are reported here,
//! never propagated to `main`.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::commands::{ChatArgs, CliArgs, DetectArgs, HealthArgs, ProviderOverride, ReplArgs};
use super::output::{ChatReport, HealthStatus, OutputFormat, OutputFormatter};
use crate::ai::{ProviderFactory, ProviderKind};
use crate::assistant::{AssistantReply, ChatAssistant};
use crate::config::ParleyConfig;

const DEFAULT_SENDER: &str = "player";

/// Loads the configuration named by the global flags
pub fn load_config(args: &CliArgs) -> Result<ParleyConfig> {
    let config = ParleyConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    debug!("Loaded configuration:\n{}", config);
    Ok(config)
}

fn apply_override(config: &mut ParleyConfig, overrides: &ProviderOverride) {
    if let Some(kind) = overrides.provider {
        config.provider = kind.as_str().to_string();
    }
    if let Some(model) = &overrides.model {
        if let Ok(kind) = config.active_provider() {
            config.providers.get_mut(kind).model = Some(model.clone());
        }
    }
}

fn print_or_report(rendered: Result<String>) -> bool {
    match rendered {
        Ok(text) => {
            print!("{}", text);
            if !text.ends_with('\n') {
                println!();
            }
            true
        }
        Err(e) => {
            error!("Failed to format output: {:#}", e);
            false
        }
    }
}

pub async fn handle_chat(args: &ChatArgs, mut config: ParleyConfig) -> i32 {
    apply_override(&mut config, &args.provider);

    let assistant = match ChatAssistant::from_config(config) {
        Ok(assistant) => assistant,
        Err(e) => {
            error!("Failed to start assistant: {}", e);
            return 1;
        }
    };

    let reply = assistant
        .handle_chat_line(&args.participant, &args.message, args.force)
        .await;
    let report = ChatReport::new(&args.participant, &reply);
    assistant.shutdown();

    let formatter = OutputFormatter::new(args.format.into());
    if !print_or_report(formatter.format_chat(&report)) {
        return 1;
    }

    match reply {
        AssistantReply::Answered { outcome, .. } if !outcome.is_success() => 1,
        _ => 0,
    }
}

pub async fn handle_detect(args: &DetectArgs, mut config: ParleyConfig) -> i32 {
    if args.intelligent {
        config.detection.intelligent_detection = true;
    }

    let assistant = match ChatAssistant::from_config(config) {
        Ok(assistant) => assistant,
        Err(e) => {
            error!("Failed to start assistant: {}", e);
            return 1;
        }
    };

    let result = assistant.detect(&args.participant, &args.message).await;
    assistant.shutdown();

    let formatter = OutputFormatter::new(args.format.into());
    if print_or_report(formatter.format_detection(&result)) {
        0
    } else {
        1
    }
}

pub async fn handle_health(args: &HealthArgs, config: ParleyConfig) -> i32 {
    info!("Checking provider health");

    let kinds: Vec<ProviderKind> = match args.provider {
        Some(kind) => vec![kind],
        None => ProviderKind::ALL.to_vec(),
    };

    let factory = ProviderFactory::new();
    let mut results = BTreeMap::new();
    for kind in kinds {
        let status = check_provider(&factory, &config, kind).await;
        results.insert(kind.as_str().to_string(), status);
    }
    factory.clear();

    let formatter = OutputFormatter::new(args.format.into());
    if !print_or_report(formatter.format_health(&results)) {
        return 1;
    }

    let mut exit_code = if results.values().any(|s| s.available) { 0 } else { 1 };

    if args.self_test {
        let mut config = config;
        if let Some(kind) = args.provider {
            config.provider = kind.as_str().to_string();
        }
        exit_code = match run_self_test(config, &formatter).await {
            Ok(true) => exit_code,
            Ok(false) => 1,
            Err(e) => {
                error!("Self-test could not run: {:#}", e);
                1
            }
        };
    }

    exit_code
}

async fn check_provider(
    factory: &ProviderFactory,
    config: &ParleyConfig,
    kind: ProviderKind,
) -> HealthStatus {
    let settings = config.settings_for(kind);
    let endpoint = settings.endpoint_for(kind);

    if kind.requires_api_key() && !settings.has_api_key() {
        warn!("{} API key is not configured", kind);
        let var = match kind {
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
            _ => "OPENAI_API_KEY",
        };
        return HealthStatus::unavailable("API key not configured")
            .with_details(format!("Set {} environment variable", var));
    }

    let provider = match factory.get(kind, settings) {
        Ok(provider) => provider,
        Err(e) => return HealthStatus::unavailable(format!("Cannot create provider: {}", e)),
    };

    if provider.test_connection().await {
        info!("{} is available at {}", kind, endpoint);
        HealthStatus::available(format!("Connected to {}", endpoint))
            .with_details(format!("Model: {}", provider.model()))
    } else {
        warn!("{} is not available at {}", kind, endpoint);
        let status = HealthStatus::unavailable(format!("Cannot connect to {}", endpoint));
        match kind {
            ProviderKind::Ollama => status.with_details("Ensure Ollama is running: ollama serve"),
            _ => status,
        }
    }
}

async fn run_self_test(config: ParleyConfig, formatter: &OutputFormatter) -> Result<bool> {
    let assistant = ChatAssistant::from_config(config)?;
    let report = assistant.self_test().await;
    assistant.shutdown();
    print_or_report(formatter.format_self_test(&report));
    Ok(report.passed())
}

/// Splits `sender: text`; lines without a sender belong to `player`
pub fn parse_chat_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    match line.split_once(':') {
        Some((sender, text))
            if !sender.trim().is_empty() && !sender.trim().contains(char::is_whitespace) =>
        {
            let text = text.trim();
            (!text.is_empty()).then(|| (sender.trim().to_string(), text.to_string()))
        }
        _ => Some((DEFAULT_SENDER.to_string(), line.to_string())),
    }
}

pub async fn handle_repl(args: &ReplArgs, mut config: ParleyConfig) -> i32 {
    apply_override(&mut config, &args.provider);

    let assistant = match ChatAssistant::from_config(config) {
        Ok(assistant) => Arc::new(assistant),
        Err(e) => {
            error!("Failed to start assistant: {}", e);
            return 1;
        }
    };

    info!("Reading chat lines from stdin");

    let (tx, mut rx) = mpsc::unbounded_channel::<(String, AssistantReply)>();
    let mut tx = Some(tx);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let formatter = OutputFormatter::new(OutputFormat::Human);
    let force = args.force;

    loop {
        tokio::select! {
            line = lines.next_line(), if tx.is_some() => match line {
                Ok(Some(line)) => {
                    let Some((sender, text)) = parse_chat_line(&line) else {
                        continue;
                    };
                    if let Some(tx) = &tx {
                        let tx = tx.clone();
                        let assistant = Arc::clone(&assistant);
                        tokio::spawn(async move {
                            let reply = assistant.handle_chat_line(&sender, &text, force).await;
                            let _ = tx.send((sender, reply));
                        });
                    }
                }
                Ok(None) => {
                    debug!("stdin closed, waiting for pending replies");
                    tx = None;
                }
                Err(e) => {
                    error!("Failed to read stdin: {}", e);
                    tx = None;
                }
            },
            Some((sender, reply)) = rx.recv() => {
                if let Some(text) = reply.text() {
                    println!("[{}] {}", sender, text);
                } else {
                    let report = ChatReport::new(&sender, &reply);
                    if let Ok(rendered) = formatter.format_chat(&report) {
                        debug!("Ignored line from {}: {}", sender, rendered.trim());
                    }
                }
            }
            else => break,
        }
    }

    assistant.shutdown();
    0
}
