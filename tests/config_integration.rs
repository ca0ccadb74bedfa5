//! Loading configuration files from disk and layering environment overrides

use std::env;
use std::fs;

use parley::config::ConfigError;
use parley::{ParleyConfig, ProviderKind};
use serial_test::serial;
use tempfile::TempDir;

const OVERRIDE_VARS: &[&str] = &[
    "PARLEY_CONFIG",
    "PARLEY_PROVIDER",
    "PARLEY_MODEL",
    "PARLEY_TOOL_ENDPOINT",
    "PARLEY_LOG_LEVEL",
    "OLLAMA_HOST",
    "OPENAI_API_KEY",
    "OPENAI_API_BASE",
    "ANTHROPIC_API_KEY",
    "ANTHROPIC_BASE_URL",
];

fn clear_env() {
    for var in OVERRIDE_VARS {
        env::remove_var(var);
    }
}

const SAMPLE: &str = r#"
provider: openai
providers:
  openai:
    api_key: sk-from-file
    model: gpt-4o-mini
    max_retries: 1
conversation:
  max_tool_calls: 3
  per_participant_history: false
detection:
  agent_name: Steve
  intelligent_detection: true
  detection_provider: ollama
  confidence_threshold: 0.75
tools:
  endpoint: http://localhost:8765/rpc
log_level: debug
"#;

fn write_config(dir: &TempDir, text: &str) -> std::path::PathBuf {
    let path = dir.path().join("parley.yaml");
    fs::write(&path, text).unwrap();
    path
}

#[test]
#[serial]
fn test_load_explicit_file() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, SAMPLE);

    let config = ParleyConfig::load(Some(&path)).unwrap();

    assert_eq!(config.active_provider().unwrap(), ProviderKind::OpenAI);
    assert_eq!(config.detection_provider().unwrap(), ProviderKind::Ollama);
    let openai = config.settings_for(ProviderKind::OpenAI);
    assert_eq!(openai.api_key.as_deref(), Some("sk-from-file"));
    assert_eq!(openai.max_retries, 1);
    assert_eq!(config.conversation.max_tool_calls, 3);
    assert!(!config.conversation.per_participant_history);
    assert_eq!(config.detection.agent_name, "Steve");
    assert_eq!(config.detection.confidence_threshold, 0.75);
    // Unset knobs keep their defaults
    assert_eq!(config.detection.high_confidence_cutoff, 0.8);
    assert_eq!(config.conversation.max_history, 20);
    assert_eq!(config.log_level, "debug");
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn test_environment_wins_over_file() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, SAMPLE);

    env::set_var("OPENAI_API_KEY", "sk-from-env");
    env::set_var("PARLEY_MODEL", "gpt-4o");
    env::set_var("OLLAMA_HOST", "http://gpu-box:11434");
    let config = ParleyConfig::load(Some(&path));
    clear_env();
    let config = config.unwrap();

    let openai = config.settings_for(ProviderKind::OpenAI);
    assert_eq!(openai.api_key.as_deref(), Some("sk-from-env"));
    assert_eq!(openai.model.as_deref(), Some("gpt-4o"));
    assert_eq!(
        config.settings_for(ProviderKind::Ollama).endpoint.as_deref(),
        Some("http://gpu-box:11434")
    );
}

#[test]
#[serial]
fn test_default_path_from_environment() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "provider: anthropic\n");

    env::set_var("PARLEY_CONFIG", &path);
    let config = ParleyConfig::load(None);
    clear_env();
    let config = config.unwrap();

    assert_eq!(config.active_provider().unwrap(), ProviderKind::Anthropic);
    // No key configured for a hosted provider
    assert!(matches!(
        config.validate(),
        Err(ConfigError::ValidationFailed(_))
    ));
}

#[test]
#[serial]
fn test_missing_explicit_file_is_an_error() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let result = ParleyConfig::load(Some(&dir.path().join("absent.yaml")));
    assert!(matches!(result, Err(ConfigError::Io { .. })));
}

#[test]
#[serial]
fn test_malformed_file_is_a_parse_error() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "conversation: [not, a, map]\n");
    let result = ParleyConfig::load(Some(&path));
    assert!(matches!(result, Err(ConfigError::ParseError { .. })));
}
