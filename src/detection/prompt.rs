//! Prompt and reply format for AI-contextual detection

use regex::Regex;
use tracing::warn;

use super::context::{ContextEntry, Speaker};
use super::types::{clamp_confidence, DetectionError, DetectionMethod, DetectionResult};

/// System prompt sent with every classification request
pub const DETECTION_SYSTEM_PROMPT: &str = "You decide whether a chat assistant should reply to a message in a shared chat. \
Answer with exactly one line in the form YES|<confidence>|<reason> or NO|<confidence>|<reason>, \
where confidence is a number between 0.0 and 1.0. Do not add anything else.";

const REPLY_PATTERN: &str = r"(?i)\b(YES|NO)\s*\|\s*([-+]?\d*\.?\d+)\s*(?:\|\s*(.*))?";

pub fn build_classification_prompt(
    agent_name: &str,
    participant: &str,
    context: &[ContextEntry],
    message: &str,
) -> String {
    let mut prompt = format!(
        "You are helping \"{agent}\", an assistant in a multiplayer chat, decide whether to reply.\n\n\
Reply YES when the message:\n\
- asks {agent} or the chat a question the assistant can answer\n\
- asks for help, instructions or information\n\
- continues a conversation the assistant is already part of\n\n\
Reply NO when the message:\n\
- is casual chat between players\n\
- is a reaction, joke, or emote\n\
- is spam, a command, or addressed to someone else\n\n",
        agent = agent_name
    );

    if context.is_empty() {
        prompt.push_str("Recent conversation: (none)\n\n");
    } else {
        prompt.push_str("Recent conversation:\n");
        for entry in context {
            let speaker = match entry.speaker {
                Speaker::Participant => participant,
                Speaker::Assistant => agent_name,
            };
            prompt.push_str(&format!("{}: {}\n", speaker, entry.text));
        }
        prompt.push('\n');
    }

    prompt.push_str(&format!("New message from {}: {}\n\n", participant, message));
    prompt.push_str("Answer with YES|confidence|reason or NO|confidence|reason.");
    prompt
}

/// Parses a `YES|0.8|reason` style reply; fences and surrounding prose are tolerated
pub fn parse_classification(reply: &str) -> Result<DetectionResult, DetectionError> {
    let re = Regex::new(REPLY_PATTERN)?;
    let text = reply.trim().trim_matches('`').trim();

    let captures = re.captures(text).ok_or_else(|| {
        DetectionError::Unparsable(text.chars().take(120).collect::<String>())
    })?;

    let should_respond = captures[1].eq_ignore_ascii_case("yes");
    let raw: f32 = captures[2]
        .parse()
        .map_err(|_| DetectionError::Unparsable(format!("bad confidence '{}'", &captures[2])))?;
    let confidence = clamp_confidence(raw);
    if confidence != raw {
        warn!(
            "Confidence value {} was out of range, clamped to {}",
            raw, confidence
        );
    }

    let reason = captures
        .get(3)
        .map(|m| m.as_str().lines().next().unwrap_or_default().trim().to_string())
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| "AI classification".to_string());

    Ok(DetectionResult::new(
        should_respond,
        confidence,
        reason,
        DetectionMethod::AiContextual,
    ))
}
