//! Per-participant conversation context for detection prompts
//!
//! Separate from the generation history: a short ring buffer per
//! participant, only read when building the AI classification prompt.

use std::collections::VecDeque;

use dashmap::DashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    Participant,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextEntry {
    pub speaker: Speaker,
    pub text: String,
}

#[derive(Debug)]
pub struct ConversationContext {
    entries: DashMap<String, VecDeque<ContextEntry>>,
    capacity: usize,
}

impl ConversationContext {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn record_message(&self, participant: &str, text: &str) {
        self.push(participant, Speaker::Participant, text);
    }

    pub fn record_reply(&self, participant: &str, text: &str) {
        self.push(participant, Speaker::Assistant, text);
    }

    /// Oldest-first copy of the participant's recent exchange
    pub fn recent(&self, participant: &str) -> Vec<ContextEntry> {
        self.entries
            .get(participant)
            .map(|ring| ring.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn clear(&self, participant: Option<&str>) {
        match participant {
            Some(name) => {
                self.entries.remove(name);
            }
            None => self.entries.clear(),
        }
    }

    fn push(&self, participant: &str, speaker: Speaker, text: &str) {
        if self.capacity == 0 {
            return;
        }
        let mut ring = self.entries.entry(participant.to_string()).or_default();
        ring.push_back(ContextEntry {
            speaker,
            text: text.to_string(),
        });
        while ring.len() > self.capacity {
            ring.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_keeps_latest() {
        let context = ConversationContext::new(3);
        context.record_message("alex", "one");
        context.record_reply("alex", "two");
        context.record_message("alex", "three");
        context.record_message("alex", "four");

        let recent = context.recent("alex");
        let texts: Vec<&str> = recent.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["two", "three", "four"]);
        assert_eq!(recent[0].speaker, Speaker::Assistant);
    }

    #[test]
    fn test_participants_are_separate() {
        let context = ConversationContext::new(5);
        context.record_message("alex", "hi");
        context.record_message("sam", "yo");
        context.clear(Some("alex"));

        assert!(context.recent("alex").is_empty());
        assert_eq!(context.recent("sam").len(), 1);
    }

    #[test]
    fn test_zero_capacity_records_nothing() {
        let context = ConversationContext::new(0);
        context.record_message("alex", "hi");
        assert!(context.recent("alex").is_empty());
    }
}
