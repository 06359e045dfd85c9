use std::collections::VecDeque;

use bevy::prelude::*;

const MAX_MESSAGES: usize = 500;

#[derive(Clone, Debug)]
pub struct ChatMessage {
    pub recipient: Entity,
    pub text: String,
    pub frame: u64,
}

/// Outgoing chat messages, newest last. The network layer drains it; the
/// headless host only keeps a bounded backlog.
#[derive(Resource, Default)]
pub struct ChatLog {
    pub recent: VecDeque<ChatMessage>,
    pub frame: u64,
    pub dropped_messages: u64,
    last_overflow_log_frame: Option<u64>,
}

impl ChatLog {
    pub fn send(&mut self, recipient: Entity, text: impl Into<String>) {
        let text = text.into();
        debug!("[Slapper chat] -> {recipient:?}: {text}");
        self.recent.push_back(ChatMessage {
            recipient,
            text,
            frame: self.frame,
        });
        if self.recent.len() > MAX_MESSAGES {
            let excess = self.recent.len() - MAX_MESSAGES;
            for _ in 0..excess {
                self.recent.pop_front();
            }
            self.dropped_messages = self.dropped_messages.saturating_add(excess as u64);
            let due = self
                .last_overflow_log_frame
                .map_or(true, |last| self.frame.saturating_sub(last) >= 60);
            if due {
                self.last_overflow_log_frame = Some(self.frame);
                warn!(
                    "[Slapper chat] Dropped {} buffered messages (total dropped: {})",
                    excess, self.dropped_messages
                );
            }
        }
    }

    /// Messages queued since the last frame tick.
    pub fn this_frame(&self) -> impl Iterator<Item = &ChatMessage> {
        let frame = self.frame;
        self.recent.iter().filter(move |m| m.frame == frame)
    }
}

#[cfg(test)]
impl ChatLog {
    pub fn messages_for(&self, recipient: Entity) -> impl Iterator<Item = &str> {
        self.recent
            .iter()
            .filter(move |m| m.recipient == recipient)
            .map(|m| m.text.as_str())
    }

    pub fn last_for(&self, recipient: Entity) -> Option<&str> {
        self.messages_for(recipient).last()
    }
}

/// A player used (right-clicked) an entity.
#[derive(Event, Clone, Copy, Debug)]
pub struct InteractEvent {
    pub player: Entity,
    pub target: Entity,
}

pub struct GameEventsPlugin;

impl Plugin for GameEventsPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ChatLog>()
            .add_event::<InteractEvent>()
            .add_systems(Last, tick_chat_frame);
    }
}

pub fn tick_chat_frame(mut chat: ResMut<ChatLog>) {
    chat.frame = chat.frame.saturating_add(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_log_tracks_dropped_messages() {
        let mut chat = ChatLog::default();
        let player = Entity::from_raw(7);
        for i in 0..(MAX_MESSAGES + 25) {
            chat.send(player, format!("message {i}"));
        }
        assert_eq!(chat.recent.len(), MAX_MESSAGES);
        assert_eq!(chat.dropped_messages, 25);
        assert_eq!(
            chat.last_for(player),
            Some(format!("message {}", MAX_MESSAGES + 24).as_str())
        );
    }

    #[test]
    fn messages_are_filtered_by_recipient() {
        let mut chat = ChatLog::default();
        let alex = Entity::from_raw(1);
        let steve = Entity::from_raw(2);
        chat.send(alex, "hello alex");
        chat.send(steve, "hello steve");
        chat.send(alex, "bye alex");

        let for_alex: Vec<&str> = chat.messages_for(alex).collect();
        assert_eq!(for_alex, vec!["hello alex", "bye alex"]);
        assert_eq!(chat.last_for(steve), Some("hello steve"));
    }

    #[test]
    fn frame_tick_separates_batches() {
        let mut chat = ChatLog::default();
        let alex = Entity::from_raw(1);
        chat.send(alex, "before");
        chat.frame += 1;
        chat.send(alex, "after");

        let current: Vec<&str> = chat.this_frame().map(|m| m.text.as_str()).collect();
        assert_eq!(current, vec!["after"]);
    }
}
