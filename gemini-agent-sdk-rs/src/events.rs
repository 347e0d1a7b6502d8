use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::execution::ExecutionLevel;

pub const USER_SOURCE: &str = "user";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    Message(MessageEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEvent {
    /// `user`, or the name of the agent that answered.
    pub source: String,
    pub content: String,
    pub level: ExecutionLevel,
    pub timestamp: DateTime<Local>,
}

impl Event {
    pub fn message(source: impl Into<String>, content: impl Into<String>, level: ExecutionLevel) -> Self {
        Event::Message(MessageEvent {
            source: source.into(),
            content: content.into(),
            level,
            timestamp: Local::now(),
        })
    }

    pub fn is_user(&self) -> bool {
        match self {
            Event::Message(m) => m.source == USER_SOURCE,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Event::Message(m) => &m.content,
        }
    }
}

/// Bounded conversation log; the oldest events are dropped first.
#[derive(Debug, Clone)]
pub struct History {
    events: VecDeque<Event>,
    limit: usize,
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self {
            events: VecDeque::new(),
            limit,
        }
    }

    pub fn push(&mut self, event: Event) {
        self.events.push_back(event);
        while self.events.len() > self.limit {
            self.events.pop_front();
        }
    }

    /// The last `n` events, oldest first.
    pub fn tail(&self, n: usize) -> Vec<Event> {
        let skip = self.events.len().saturating_sub(n);
        self.events.iter().skip(skip).cloned().collect()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_drops_oldest_beyond_limit() {
        let mut history = History::new(3);
        for i in 0..5 {
            history.push(Event::message(USER_SOURCE, format!("q{i}"), ExecutionLevel::AgentLevel));
        }
        assert_eq!(history.len(), 3);
        let contents: Vec<_> = history.events().iter().map(|e| e.content().to_string()).collect();
        assert_eq!(contents, vec!["q2", "q3", "q4"]);
    }

    #[test]
    fn test_tail_returns_most_recent_in_order() {
        let mut history = History::new(10);
        history.push(Event::message(USER_SOURCE, "hi", ExecutionLevel::GlobalLevel));
        history.push(Event::message("Agent", "hello", ExecutionLevel::GlobalLevel));
        history.push(Event::message(USER_SOURCE, "bye", ExecutionLevel::GlobalLevel));

        let tail = history.tail(2);
        assert_eq!(tail.len(), 2);
        assert!(!tail[0].is_user());
        assert_eq!(tail[1].content(), "bye");
        assert_eq!(history.tail(50).len(), 3);
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = Event::message("Agent", "ok", ExecutionLevel::RunLevel);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Message");
        assert_eq!(json["level"], "run_level");
    }
}
