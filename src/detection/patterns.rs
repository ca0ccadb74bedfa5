//! Pattern stage of response detection
//!
//! A fixed, ordered list of cheap classifiers. The first one that matches
//! decides; a message matching none is reported as ambiguous.
//!
//! | classifier      | decision | confidence |
//! |-----------------|----------|------------|
//! | trigger prefix  | respond  | 0.95 / 0.9 |
//! | spam shape      | ignore   | 0.95       |
//! | slash command   | ignore   | 0.85       |
//! | agent name      | respond  | 0.95       |
//! | help wording    | respond  | 0.8        |
//! | question        | respond  | 0.7        |
//! | greeting        | respond  | 0.65       |
//! | none            | ignore   | 0.4        |

use regex::Regex;

use super::types::DetectionResult;

pub const TRIGGER_WITH_TEXT_CONFIDENCE: f32 = 0.95;
pub const BARE_TRIGGER_CONFIDENCE: f32 = 0.9;
pub const SPAM_CONFIDENCE: f32 = 0.95;
pub const COMMAND_CONFIDENCE: f32 = 0.85;
pub const AGENT_NAME_CONFIDENCE: f32 = 0.95;
pub const HELP_CONFIDENCE: f32 = 0.8;
pub const QUESTION_CONFIDENCE: f32 = 0.7;
pub const GREETING_CONFIDENCE: f32 = 0.65;
pub const AMBIGUOUS_CONFIDENCE: f32 = 0.4;

/// Same character repeated this many times in a row reads as spam
const SPAM_RUN_LENGTH: usize = 6;

const HELP_PATTERN: &str = r"(?i)\b(help|assist|assistance|support|stuck|tutorial|guide)\b";
const QUESTION_PATTERN: &str =
    r"(?i)^(what|how|why|when|where|who|whom|whose|which|can|could|would|should|will|is|are|does|do|did)\b";
const GREETING_PATTERN: &str =
    r"(?i)^(hi|hello|hey|hiya|howdy|greetings|yo|sup|good (morning|afternoon|evening))\b";

#[derive(Debug, Clone)]
pub struct PatternMatcher {
    trigger_prefixes: Vec<String>,
    agent_name: Option<Regex>,
    help: Regex,
    question: Regex,
    greeting: Regex,
}

impl PatternMatcher {
    pub fn new(agent_name: &str, trigger_prefixes: &[String]) -> Result<Self, regex::Error> {
        let agent_name = agent_name.trim();
        let agent_name = if agent_name.is_empty() {
            None
        } else {
            Some(Regex::new(&format!(
                r"(?i)(?:^|\W){}(?:\W|$)",
                regex::escape(agent_name)
            ))?)
        };

        Ok(Self {
            trigger_prefixes: trigger_prefixes
                .iter()
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
            agent_name,
            help: Regex::new(HELP_PATTERN)?,
            question: Regex::new(QUESTION_PATTERN)?,
            greeting: Regex::new(GREETING_PATTERN)?,
        })
    }

    pub fn classify(&self, message: &str) -> DetectionResult {
        let text = message.trim();

        if let Some(rest) = self.strip_trigger(text) {
            return if rest.trim().is_empty() {
                DetectionResult::respond(BARE_TRIGGER_CONFIDENCE, "bare trigger prefix")
            } else {
                DetectionResult::respond(TRIGGER_WITH_TEXT_CONFIDENCE, "explicit trigger prefix")
            };
        }

        if is_spam(text) {
            return DetectionResult::ignore(SPAM_CONFIDENCE, "spam or nonsense");
        }

        if text.starts_with('/') {
            return DetectionResult::ignore(COMMAND_CONFIDENCE, "slash command");
        }

        if self.agent_name.as_ref().is_some_and(|re| re.is_match(text)) {
            return DetectionResult::respond(AGENT_NAME_CONFIDENCE, "agent mentioned by name");
        }

        if self.help.is_match(text) {
            return DetectionResult::respond(HELP_CONFIDENCE, "help request");
        }

        if text.ends_with('?') || self.question.is_match(text) {
            return DetectionResult::respond(QUESTION_CONFIDENCE, "question");
        }

        if self.greeting.is_match(text) {
            return DetectionResult::respond(GREETING_CONFIDENCE, "greeting");
        }

        DetectionResult::ignore(AMBIGUOUS_CONFIDENCE, "no pattern matched")
    }

    /// Text after a trigger prefix, if the message starts with one
    fn strip_trigger<'a>(&self, text: &'a str) -> Option<&'a str> {
        let lower = text.to_lowercase();
        self.trigger_prefixes
            .iter()
            .find(|prefix| lower.starts_with(prefix.as_str()))
            .and_then(|prefix| text.get(prefix.len()..))
    }
}

fn is_spam(text: &str) -> bool {
    if !text.chars().any(char::is_alphanumeric) {
        return true;
    }

    let mut run = 0;
    let mut previous = None;
    for c in text.chars().filter(|c| !c.is_whitespace()) {
        if Some(c) == previous {
            run += 1;
        } else {
            run = 1;
            previous = Some(c);
        }
        if run >= SPAM_RUN_LENGTH {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    fn matcher() -> PatternMatcher {
        PatternMatcher::new("Steve", &["@ai".to_string(), "!ai".to_string()]).unwrap()
    }

    #[parameterized(
        trigger_with_text = { "@ai what time is it", true, 0.95 },
        trigger_uppercase = { "!AI give me bread", true, 0.95 },
        bare_trigger = { "@ai", true, 0.9 },
        punctuation_only = { "?!?!", false, 0.95 },
        repeated_chars = { "aaaaaaaaa", false, 0.95 },
        slash_command = { "/home set", false, 0.85 },
        agent_name = { "thanks steve", true, 0.95 },
        help_request = { "i'm stuck in this cave", true, 0.8 },
        question_mark = { "How do I craft a sword?", true, 0.7 },
        question_word = { "where is the village", true, 0.7 },
        greeting = { "hey everyone", true, 0.65 },
        casual_chat = { "lol that's funny", false, 0.4 },
    )]
    fn test_classify(message: &str, should_respond: bool, confidence: f32) {
        let result = matcher().classify(message);
        assert_eq!(result.should_respond, should_respond, "{}", result);
        assert_eq!(result.confidence, confidence, "{}", result);
    }

    #[test]
    fn test_agent_name_needs_word_boundary() {
        let result = matcher().classify("stevenson built a house");
        assert_eq!(result.confidence, AMBIGUOUS_CONFIDENCE);
    }

    #[test]
    fn test_trigger_wins_over_command_shape() {
        let matcher = PatternMatcher::new("Steve", &["/ask".to_string()]).unwrap();
        assert!(matcher.classify("/ask where am i").should_respond);
        assert!(!matcher.classify("/spawn").should_respond);
    }

    #[test]
    fn test_empty_agent_name_is_ignored() {
        let matcher = PatternMatcher::new("  ", &[]).unwrap();
        assert_eq!(matcher.classify("just building").confidence, AMBIGUOUS_CONFIDENCE);
    }

    #[test]
    fn test_empty_message_is_spam() {
        assert!(!matcher().classify("   ").should_respond);
    }
}
