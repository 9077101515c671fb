use axum::{debug_handler, extract::{Path, Query, State}, response::{IntoResponse, Redirect, Response}};
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::{db, flash::Status, include_res, res::{self, escape}, session, AppResult};

use super::{access::{self, ChatAccess, Denied}, msg, render};

#[debug_handler]
pub(crate) async fn room(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Path(chat_id): Path<String>,
    Query(status): Query<Status>,
) -> AppResult<Response> {
    let viewer = match session::require_profile(&session, &db_pool).await? {
        Ok(profile) => profile,
        Err(redirect) => return Ok(redirect),
    };

    let peer_id = match access::open(&db_pool, &chat_id, &viewer).await? {
        Ok(ChatAccess::Direct { peer_id }) => peer_id,
        Ok(ChatAccess::Pack) => return Ok(Redirect::to("/pack").into_response()),
        Err(Denied::Blocked) => return Ok(Redirect::to("/chats").into_response()),
        Err(Denied::NotFound) => return res::sorry("chat"),
    };

    let peer = db::Profile::find(&db_pool, &peer_id).await?;
    let alias = match peer.as_ref().map(db::Profile::display_alias) {
        Some(alias) if alias != "Anon" => alias.to_owned(),
        _ => peer_id.get(..5).unwrap_or(&peer_id).to_owned(),
    };

    let back_to = format!("/chats/{chat_id}");
    let messages = msg::recent(&db_pool, &chat_id, msg::PAGE_SIZE).await?;

    Ok(res::page(
        &alias,
        &include_res!(str, "/pages/chats/room.html")
            .replace("{banner}", &status.banner())
            .replace("{panel}", &render::panel(&chat_id, &viewer.id, &messages, &back_to))
            .replace("{alias}", &escape(&alias))
            .replace("{redirect_to}", &escape(&back_to))
            .replace("{peer_id}", &escape(&peer_id)),
    ).into_response())
}
