use std::time::Duration;

use axum::{
    debug_handler,
    extract::{ws::{Message as Frame, WebSocket}, Path, State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tokio::{sync::{broadcast::error::RecvError, mpsc}, time::Instant};
use tower_sessions::Session;
use tracing::{debug, warn};

use crate::{
    db,
    realtime::{typing_peers, ChatSubscription, PresenceHandle, Realtime, TypingPeer},
    session, AppResult, AppState,
};

use super::{access::{self, ChatAccess}, msg, timeline::Timeline};

/// Typing clears this long after the last keystroke.
pub const TYPING_TIMEOUT: Duration = Duration::from_secs(1);

const CHAT_CLOSED: &str = "This chat is closed";

#[derive(Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    Send { content: String },
    Typing,
    Idle,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    Message(db::Message),
    Typing { users: Vec<TypingPeer> },
    Error { message: String },
}

impl ServerEvent {
    fn frame(&self) -> Option<Frame> {
        serde_json::to_string(self).ok().map(|json| Frame::Text(json.into()))
    }
}

/// A socket's view of a chat. The subscription is taken before the backlog
/// is read, so every insert is in the backlog, the receiver, or both.
pub(crate) struct ChatView {
    pub(crate) subscription: ChatSubscription,
    pub(crate) timeline: Timeline,
}

impl ChatView {
    pub(crate) async fn open(
        db_pool: &SqlitePool,
        realtime: &Realtime,
        chat_id: &str,
        viewer: &db::Profile,
    ) -> AppResult<Self> {
        let subscription = realtime.subscribe_chat(chat_id, &viewer.id, viewer.display_alias());
        let timeline = Timeline::seed(msg::recent(db_pool, chat_id, msg::PAGE_SIZE).await?);
        Ok(ChatView { subscription, timeline })
    }

    /// Everything the view holds, oldest first. Sent on connect so a page
    /// rendered earlier, or a reconnecting socket, catches up.
    pub(crate) fn backlog(&self) -> Vec<db::Message> {
        self.timeline.sorted().into_iter().cloned().collect()
    }
}

/// A connection's typing flag. It stays set while `typing` frames keep
/// coming and drops [`TYPING_TIMEOUT`] after the last one.
pub(crate) struct TypingTimer<'a> {
    handle: &'a PresenceHandle,
    deadline: Option<Instant>,
}

impl<'a> TypingTimer<'a> {
    pub(crate) fn new(handle: &'a PresenceHandle) -> Self {
        Self { handle, deadline: None }
    }

    pub(crate) fn keystroke(&mut self) {
        self.deadline = Some(Instant::now() + TYPING_TIMEOUT);
        self.handle.set_typing(true);
    }

    pub(crate) fn stop(&mut self) {
        self.deadline = None;
        self.handle.set_typing(false);
    }

    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

async fn typing_expired(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Delivery {
    Sent,
    Closed,
}

/// Sends from an open socket. Blocks can land while a direct chat is open,
/// so they are checked on every send.
pub(crate) async fn deliver(
    db_pool: &SqlitePool,
    realtime: &Realtime,
    chat_id: &str,
    sender_id: &str,
    peer_id: Option<&str>,
    content: &str,
) -> AppResult<Delivery> {
    if let Some(peer_id) = peer_id {
        if db::is_blocked_between(db_pool, sender_id, peer_id).await? {
            return Ok(Delivery::Closed);
        }
    }
    msg::send(db_pool, realtime, chat_id, sender_id, content).await?;
    Ok(Delivery::Sent)
}

#[debug_handler(state = AppState)]
pub(crate) async fn chat_ws(
    Path(chat_id): Path<String>,
    State(db_pool): State<SqlitePool>,
    State(realtime): State<Realtime>,
    session: Session,
    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let viewer = match session::require_profile(&session, &db_pool).await? {
        Ok(profile) => profile,
        Err(_) => return Ok(StatusCode::UNAUTHORIZED.into_response()),
    };

    let peer_id = match access::open(&db_pool, &chat_id, &viewer).await? {
        Ok(ChatAccess::Direct { peer_id }) => Some(peer_id),
        Ok(ChatAccess::Pack) => None,
        Err(_) => return Ok(StatusCode::FORBIDDEN.into_response()),
    };

    Ok(ws.on_upgrade(move |socket| run(socket, db_pool, realtime, chat_id, viewer, peer_id)))
}

async fn run(
    socket: WebSocket,
    db_pool: SqlitePool,
    realtime: Realtime,
    chat_id: String,
    viewer: db::Profile,
    peer_id: Option<String>,
) {
    let view = match ChatView::open(&db_pool, &realtime, &chat_id, &viewer).await {
        Ok(view) => view,
        Err(err) => {
            warn!("chat {chat_id}: opening view for {} failed: {err}", viewer.id);
            return;
        }
    };
    let backlog = view.backlog();
    let ChatView {
        subscription: ChatSubscription { mut messages, mut presence, handle },
        mut timeline,
    } = view;

    let (mut sender, mut receiver) = socket.split();
    let (errors_tx, mut errors_rx) = mpsc::unbounded_channel::<String>();

    let mut push_task = {
        let db_pool = db_pool.clone();
        let chat_id = chat_id.clone();
        let viewer_id = viewer.id.clone();
        let mut last_typing: Vec<TypingPeer> = Vec::new();

        tokio::spawn(async move {
            for message in backlog {
                let Some(frame) = ServerEvent::Message(message).frame() else {
                    continue;
                };
                if sender.send(frame).await.is_err() {
                    return;
                }
            }

            loop {
                let events: Vec<ServerEvent> = tokio::select! {
                    message = messages.recv() => match message {
                        Ok(message) => {
                            if !timeline.merge(message.clone()) {
                                continue;
                            }
                            vec![ServerEvent::Message(message)]
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("chat {chat_id}: view lagged by {skipped}, reloading");
                            let Ok(page) = msg::recent(&db_pool, &chat_id, msg::PAGE_SIZE).await else {
                                continue;
                            };
                            page.into_iter()
                                .filter(|message| timeline.merge(message.clone()))
                                .map(ServerEvent::Message)
                                .collect()
                        }
                        Err(RecvError::Closed) => break,
                    },
                    snapshot = presence.recv() => match snapshot {
                        Ok(snapshot) => {
                            let typing = typing_peers(&snapshot, &viewer_id);
                            if typing == last_typing {
                                continue;
                            }
                            last_typing = typing.clone();
                            vec![ServerEvent::Typing { users: typing }]
                        }
                        Err(RecvError::Lagged(_)) => continue,
                        Err(RecvError::Closed) => break,
                    },
                    error = errors_rx.recv() => match error {
                        Some(message) => vec![ServerEvent::Error { message }],
                        None => break,
                    },
                };

                for event in events {
                    let Some(frame) = event.frame() else {
                        continue;
                    };
                    if sender.send(frame).await.is_err() {
                        return;
                    }
                }
            }
        })
    };

    let mut typing = TypingTimer::new(&handle);
    let mut closed = false;
    loop {
        tokio::select! {
            frame = receiver.next() => {
                let Some(Ok(frame)) = frame else {
                    break;
                };
                let event = match frame {
                    Frame::Text(text) => serde_json::from_str::<ClientEvent>(text.as_str()),
                    Frame::Close(_) => break,
                    _ => continue,
                };
                let Ok(event) = event else {
                    continue;
                };

                match event {
                    ClientEvent::Send { content } => {
                        typing.stop();
                        match deliver(&db_pool, &realtime, &chat_id, &viewer.id, peer_id.as_deref(), &content).await {
                            Ok(Delivery::Sent) => {}
                            Ok(Delivery::Closed) => {
                                debug!("chat {chat_id}: closed for {} by a block", viewer.id);
                                let _ = errors_tx.send(CHAT_CLOSED.to_owned());
                                closed = true;
                                break;
                            }
                            Err(err) => {
                                warn!("chat {chat_id}: send from {} failed: {err}", viewer.id);
                                let _ = errors_tx.send(err.to_string());
                            }
                        }
                    }
                    ClientEvent::Typing => typing.keystroke(),
                    ClientEvent::Idle => typing.stop(),
                }
            }
            _ = typing_expired(typing.deadline()) => typing.stop(),
            _ = &mut push_task => break,
        }
    }

    drop(errors_tx);
    if closed {
        // let the push task flush the closing error
        let _ = tokio::time::timeout(TYPING_TIMEOUT, &mut push_task).await;
    }
    push_task.abort();
    drop(handle);
    debug!("chat {chat_id}: {} left", viewer.id);
}
