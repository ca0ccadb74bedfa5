//! Output formatting for the CLI
//!
//! Everything the CLI prints goes through [`OutputFormatter`], which renders
//! JSON, YAML or human-readable text.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::assistant::{AssistantReply, SelfTestReport};
use crate::conversation::TurnStatus;
use crate::detection::DetectionResult;

const RULE: &str = "\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Yaml,
    Human,
}

/// Serializable view of one handled chat line
#[derive(Debug, Clone, Serialize)]
pub struct ChatReport {
    pub participant: String,
    pub responded: bool,
    pub reply: Option<String>,
    pub detection: Option<DetectionResult>,
    pub status: Option<String>,
    pub provider_requests: usize,
    pub tools_used: Vec<String>,
    pub elapsed_ms: u64,
}

impl ChatReport {
    pub fn new(participant: &str, reply: &AssistantReply) -> Self {
        match reply {
            AssistantReply::Ignored(detection) => Self {
                participant: participant.to_string(),
                responded: false,
                reply: None,
                detection: Some(detection.clone()),
                status: None,
                provider_requests: 0,
                tools_used: Vec::new(),
                elapsed_ms: 0,
            },
            AssistantReply::Answered { detection, outcome } => Self {
                participant: participant.to_string(),
                responded: true,
                reply: Some(outcome.reply.clone()),
                detection: detection.clone(),
                status: Some(status_label(&outcome.status)),
                provider_requests: outcome.provider_requests,
                tools_used: outcome.tools_used.clone(),
                elapsed_ms: outcome.elapsed.as_millis() as u64,
            },
        }
    }
}

fn status_label(status: &TurnStatus) -> String {
    match status {
        TurnStatus::Completed => "completed".to_string(),
        TurnStatus::ToolLimitReached => "tool_limit_reached".to_string(),
        TurnStatus::ProviderFailed(kind) => format!("provider_failed ({:?})", kind),
    }
}

/// Health of one provider
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub available: bool,
    pub message: String,
    pub details: Option<String>,
}

impl HealthStatus {
    pub fn available(message: impl Into<String>) -> Self {
        Self {
            available: true,
            message: message.into(),
            details: None,
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            available: false,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format_detection(&self, result: &DetectionResult) -> Result<String> {
        self.render(result, || {
            format!(
                "{} (confidence {:.2}, {})\n  Reason: {}\n",
                if result.should_respond {
                    "\u{2713} Would respond"
                } else {
                    "\u{2717} Would not respond"
                },
                result.confidence,
                result.method,
                result.reason
            )
        })
    }

    pub fn format_chat(&self, report: &ChatReport) -> Result<String> {
        self.render(report, || {
            let mut output = String::new();
            match &report.reply {
                Some(reply) => output.push_str(&format!("{}\n", reply)),
                None => output.push_str("(no response)\n"),
            }
            if let Some(detection) = &report.detection {
                output.push_str(&format!(
                    "  Detection: {} {:.2} via {} ({})\n",
                    if detection.should_respond { "respond" } else { "ignore" },
                    detection.confidence,
                    detection.method,
                    detection.reason
                ));
            }
            if report.responded {
                output.push_str(&format!(
                    "  Requests: {}  Tools: {}  Time: {}ms\n",
                    report.provider_requests,
                    if report.tools_used.is_empty() {
                        "none".to_string()
                    } else {
                        report.tools_used.join(", ")
                    },
                    report.elapsed_ms
                ));
            }
            output
        })
    }

    pub fn format_health(&self, results: &BTreeMap<String, HealthStatus>) -> Result<String> {
        self.render(results, || {
            let mut output = String::new();
            output.push_str("Provider Health Status\n");
            output.push_str(RULE);
            output.push_str("\n\n");

            for (provider, status) in results {
                let symbol = if status.available { "\u{2713}" } else { "\u{2717}" };
                output.push_str(&format!("{} {}\n", symbol, provider));
                output.push_str(&format!(
                    "  Status: {}\n",
                    if status.available {
                        "Available"
                    } else {
                        "Unavailable"
                    }
                ));
                output.push_str(&format!("  Message: {}\n", status.message));
                if let Some(details) = &status.details {
                    output.push_str(&format!("  Details: {}\n", details));
                }
                output.push('\n');
            }
            output
        })
    }

    pub fn format_self_test(&self, report: &SelfTestReport) -> Result<String> {
        self.render(report, || {
            let mark = |ok: bool| if ok { "\u{2713}" } else { "\u{2717}" };
            let mut output = String::new();
            output.push_str("Self-Test\n");
            output.push_str(RULE);
            output.push_str("\n\n");
            output.push_str(&format!(
                "{} Provider {} ({})\n",
                mark(report.provider_reachable),
                report.provider,
                report.model
            ));
            if let (Some(name), Some(ok)) = (&report.detection_provider, report.detection_reachable)
            {
                output.push_str(&format!("{} Detection provider {}\n", mark(ok), name));
            }
            match &report.tools_error {
                Some(error) => output.push_str(&format!("\u{2717} Tools: {}\n", error)),
                None => output.push_str(&format!(
                    "\u{2713} Tools: {} available\n",
                    report.tools_available
                )),
            }
            output.push_str(&format!(
                "{} Turn ({} requests): {}\n\n",
                mark(report.turn_succeeded),
                report.provider_requests,
                report.turn_reply
            ));
            output.push_str(if report.passed() { "PASSED\n" } else { "FAILED\n" });
            output
        })
    }

    fn render<T: Serialize + ?Sized>(&self, value: &T, human: impl FnOnce() -> String) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(value).context("Failed to serialize to JSON")
            }
            OutputFormat::Yaml => {
                serde_yaml::to_string(value).context("Failed to serialize to YAML")
            }
            OutputFormat::Human => Ok(human()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::DetectionMethod;

    fn detection() -> DetectionResult {
        DetectionResult::new(true, 0.7, "question", DetectionMethod::Pattern)
    }

    #[test]
    fn test_detection_json() {
        let output = OutputFormatter::new(OutputFormat::Json)
            .format_detection(&detection())
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["should_respond"], true);
        assert_eq!(value["method"], "pattern");
    }

    #[test]
    fn test_detection_yaml() {
        let output = OutputFormatter::new(OutputFormat::Yaml)
            .format_detection(&detection())
            .unwrap();
        assert!(output.contains("reason: question"));
    }

    #[test]
    fn test_ignored_chat_human() {
        let report = ChatReport::new(
            "alex",
            &AssistantReply::Ignored(DetectionResult::ignore(0.4, "no pattern matched")),
        );
        let output = OutputFormatter::new(OutputFormat::Human)
            .format_chat(&report)
            .unwrap();
        assert!(output.starts_with("(no response)"));
        assert!(output.contains("no pattern matched"));
    }

    #[test]
    fn test_health_human() {
        let mut results = BTreeMap::new();
        results.insert(
            "ollama".to_string(),
            HealthStatus::available("Connected to http://localhost:11434"),
        );
        results.insert(
            "openai".to_string(),
            HealthStatus::unavailable("API key not configured")
                .with_details("Set OPENAI_API_KEY environment variable"),
        );

        let output = OutputFormatter::new(OutputFormat::Human)
            .format_health(&results)
            .unwrap();
        assert!(output.contains("\u{2713} ollama"));
        assert!(output.contains("\u{2717} openai"));
        assert!(output.contains("Set OPENAI_API_KEY"));
    }
}
