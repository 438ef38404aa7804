use serde::{Deserialize, Serialize};

/// Position of an action inside a trigger program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionLocation {
    /// Index of the event in declaration order.
    pub event: usize,
    /// Index of the action inside the event, `None` for the event itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<usize>,
}

impl ActionLocation {
    /// Creates a location pointing at an event header.
    pub fn event(event: usize) -> Self {
        Self { event, action: None }
    }

    /// Creates a location pointing at one action of an event.
    pub fn action(event: usize, action: usize) -> Self {
        Self { event, action: Some(action) }
    }
}

impl std::fmt::Display for ActionLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.action {
            Some(action) => write!(f, "event {} action {}", self.event, action),
            None => write!(f, "event {}", self.event),
        }
    }
}
