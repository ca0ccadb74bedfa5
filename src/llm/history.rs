//! Bounded conversation history
//!
//! A `MessageHistory` is shared by every turn that runs for the same
//! conversation scope. Appends and FIFO eviction happen under one lock so the
//! bound holds no matter how many workers push concurrently.
//!
//! Eviction never leaves the history starting on an assistant reply or a
//! tool result: after the bound is enforced, messages are dropped from the
//! front until a user message leads.

use std::collections::VecDeque;
use std::sync::Mutex;

use super::types::{ChatMessage, MessageRole};

/// Default number of messages retained per conversation scope
pub const DEFAULT_MAX_HISTORY: usize = 20;

#[derive(Debug)]
pub struct MessageHistory {
    messages: Mutex<VecDeque<ChatMessage>>,
    max_length: usize,
}

impl MessageHistory {
    pub fn new(max_length: usize) -> Self {
        let max_length = max_length.max(1);
        Self {
            messages: Mutex::new(VecDeque::with_capacity(max_length)),
            max_length,
        }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Appends a message, evicting the oldest ones past the bound
    pub fn push(&self, message: ChatMessage) {
        let mut messages = self.lock();
        messages.push_back(message);
        evict(&mut messages, self.max_length);
    }

    /// Appends several messages atomically with respect to other writers
    pub fn extend(&self, batch: impl IntoIterator<Item = ChatMessage>) {
        let mut messages = self.lock();
        for message in batch {
            messages.push_back(message);
        }
        evict(&mut messages, self.max_length);
    }

    /// Returns a copy of the current contents, oldest first
    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    // A poisoned lock still guards a structurally valid deque.
    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<ChatMessage>> {
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn evict(messages: &mut VecDeque<ChatMessage>, max_length: usize) {
    if messages.len() <= max_length {
        return;
    }
    while messages.len() > max_length {
        messages.pop_front();
    }
    while messages
        .front()
        .is_some_and(|message| message.role != MessageRole::User)
    {
        messages.pop_front();
    }
}

impl Default for MessageHistory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}
