use std::time::Duration;

use axum::{
    debug_handler,
    extract::{ws::{Message as Frame, WebSocket}, State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use tokio::{sync::broadcast::error::RecvError, time::Instant};
use tower_sessions::Session;

use crate::{realtime::Realtime, session::USER_ID, AppResult, AppState};

/// Bursts of post / reaction changes collapse into one refresh.
const DEBOUNCE: Duration = Duration::from_millis(350);

#[debug_handler(state = AppState)]
pub(crate) async fn feed_ws(
    State(realtime): State<Realtime>,
    session: Session,
    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    if session.get::<String>(USER_ID).await?.is_none() {
        return Ok(StatusCode::UNAUTHORIZED.into_response());
    }

    Ok(ws.on_upgrade(move |socket| run(socket, realtime)))
}

async fn run(socket: WebSocket, realtime: Realtime) {
    let mut changes = realtime.subscribe_feed();
    let (mut sender, mut receiver) = socket.split();
    let mut refresh_at: Option<Instant> = None;

    loop {
        tokio::select! {
            change = changes.recv() => match change {
                Ok(_) | Err(RecvError::Lagged(_)) => {
                    refresh_at.get_or_insert_with(|| Instant::now() + DEBOUNCE);
                }
                Err(RecvError::Closed) => break,
            },
            _ = due(refresh_at) => {
                refresh_at = None;
                let refresh = Frame::Text(r#"{"type":"refresh"}"#.into());
                if sender.send(refresh).await.is_err() {
                    break;
                }
            }
            frame = receiver.next() => match frame {
                Some(Ok(Frame::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
}

async fn due(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
