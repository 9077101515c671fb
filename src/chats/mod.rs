pub mod access;
mod list;
pub mod msg;
pub mod render;
mod room;
pub mod timeline;
pub mod ws;

use axum::{routing::get, Router};

use crate::AppState;

pub use list::{direct_chats, DirectChat};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list::chats))
        .route("/{chat_id}", get(room::room))
        .route("/{chat_id}/ws", get(ws::chat_ws))
}
