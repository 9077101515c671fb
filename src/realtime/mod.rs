//! In-process change feed: chat message inserts, per-chat presence, and
//! feed change notifications, fanned out over `tokio` broadcast channels.

mod presence;

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::db;

pub use presence::{typing_peers, PresenceMeta, TypingPeer};

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedEvent {
    Posts,
    Reactions,
}

struct ChatTopic {
    messages: broadcast::Sender<db::Message>,
    presence_tx: broadcast::Sender<Vec<PresenceMeta>>,
    // keyed by connection; uuid v7 keeps join order
    presence: BTreeMap<Uuid, PresenceMeta>,
}

impl ChatTopic {
    fn new() -> Self {
        Self {
            messages: broadcast::channel(CHANNEL_CAPACITY).0,
            presence_tx: broadcast::channel(CHANNEL_CAPACITY).0,
            presence: BTreeMap::new(),
        }
    }

    fn sync(&self) {
        let snapshot: Vec<PresenceMeta> = self.presence.values().cloned().collect();
        let _ = self.presence_tx.send(snapshot);
    }
}

struct Inner {
    chats: Mutex<HashMap<String, ChatTopic>>,
    feed: broadcast::Sender<FeedEvent>,
}

#[derive(Clone)]
pub struct Realtime {
    inner: Arc<Inner>,
}

impl Default for Realtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Realtime {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                chats: Mutex::new(HashMap::new()),
                feed: broadcast::channel(CHANNEL_CAPACITY).0,
            }),
        }
    }

    fn chats(&self) -> MutexGuard<'_, HashMap<String, ChatTopic>> {
        self.inner.chats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fans a freshly inserted message out to every open view of its chat.
    pub fn publish_message(&self, message: db::Message) {
        if let Some(topic) = self.chats().get(&message.chat_id) {
            let _ = topic.messages.send(message);
        }
    }

    /// Opens a view on `chat_id`: message inserts plus presence, with this
    /// view tracked as present and not typing.
    pub fn subscribe_chat(&self, chat_id: &str, user_id: &str, alias: &str) -> ChatSubscription {
        let conn_id = Uuid::now_v7();
        let mut chats = self.chats();
        let topic = chats.entry(chat_id.to_owned()).or_insert_with(ChatTopic::new);

        let messages = topic.messages.subscribe();
        let presence = topic.presence_tx.subscribe();
        topic.presence.insert(conn_id, PresenceMeta {
            user_id: user_id.to_owned(),
            alias: alias.to_owned(),
            typing: false,
        });
        topic.sync();
        debug!("chat {chat_id}: {user_id} joined as {conn_id}");

        ChatSubscription {
            messages,
            presence,
            handle: PresenceHandle {
                realtime: self.clone(),
                chat_id: chat_id.to_owned(),
                conn_id,
            },
        }
    }

    pub fn publish_feed(&self, event: FeedEvent) {
        let _ = self.inner.feed.send(event);
    }

    pub fn subscribe_feed(&self) -> broadcast::Receiver<FeedEvent> {
        self.inner.feed.subscribe()
    }

    /// Number of open views on a chat; zero once the topic is torn down.
    #[cfg(test)]
    pub fn viewers(&self, chat_id: &str) -> usize {
        self.chats().get(chat_id).map_or(0, |topic| topic.presence.len())
    }
}

pub struct ChatSubscription {
    pub messages: broadcast::Receiver<db::Message>,
    pub presence: broadcast::Receiver<Vec<PresenceMeta>>,
    pub handle: PresenceHandle,
}

/// A view's presence entry. Dropping it untracks the view, and the last
/// view out removes the chat topic.
pub struct PresenceHandle {
    realtime: Realtime,
    chat_id: String,
    conn_id: Uuid,
}

impl PresenceHandle {
    pub fn set_typing(&self, typing: bool) {
        let mut chats = self.realtime.chats();
        let Some(topic) = chats.get_mut(&self.chat_id) else {
            return;
        };
        let Some(meta) = topic.presence.get_mut(&self.conn_id) else {
            return;
        };
        if meta.typing != typing {
            meta.typing = typing;
            topic.sync();
        }
    }
}

impl Drop for PresenceHandle {
    fn drop(&mut self) {
        let mut chats = self.realtime.chats();
        let Some(topic) = chats.get_mut(&self.chat_id) else {
            return;
        };
        topic.presence.remove(&self.conn_id);
        if topic.presence.is_empty() {
            chats.remove(&self.chat_id);
            debug!("chat {}: last view closed", self.chat_id);
        } else {
            topic.sync();
        }
    }
}
