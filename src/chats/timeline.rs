use std::collections::HashMap;

use crate::db::Message;

/// One open chat view's message list. Pushed inserts are merged by id, and
/// display order comes from `(created_at, seq)`, never arrival order.
#[derive(Debug, Default)]
pub struct Timeline {
    by_id: HashMap<String, Message>,
}

impl Timeline {
    pub fn seed(messages: impl IntoIterator<Item = Message>) -> Self {
        let mut timeline = Timeline::default();
        for message in messages {
            timeline.merge(message);
        }
        timeline
    }

    /// Adds `message` unless its id is already present. Returns whether it was new.
    pub fn merge(&mut self, message: Message) -> bool {
        if self.by_id.contains_key(&message.id) {
            return false;
        }
        self.by_id.insert(message.id.clone(), message);
        true
    }

    pub fn sorted(&self) -> Vec<&Message> {
        let mut messages: Vec<&Message> = self.by_id.values().collect();
        messages.sort_by_key(|m| (m.created_at, m.seq));
        messages
    }
}
