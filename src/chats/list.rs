use axum::{debug_handler, extract::{Query, State}, response::{IntoResponse, Response}};
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::{db, flash::Status, include_res, res::{self, escape}, session, AppResult};

#[derive(Debug, sqlx::FromRow)]
pub struct DirectChat {
    pub chat_id: String,
    pub peer_id: String,
    pub peer_alias: Option<String>,
    pub peer_type: Option<String>,
}

/// The viewer's match chats, newest first, minus peers blocked either way.
pub async fn direct_chats(db_pool: &SqlitePool, viewer: &str) -> AppResult<Vec<DirectChat>> {
    let chats: Vec<DirectChat> = sqlx::query_as(
        "SELECT c.id AS chat_id, \
            CASE WHEN m.user_a=?1 THEN m.user_b ELSE m.user_a END AS peer_id, \
            p.alias AS peer_alias, p.therian_type AS peer_type \
         FROM chats c \
         JOIN matches m ON m.id=c.match_id \
         LEFT JOIN profiles p ON p.id=(CASE WHEN m.user_a=?1 THEN m.user_b ELSE m.user_a END) \
         WHERE m.user_a=?1 OR m.user_b=?1 \
         ORDER BY c.created_at DESC, c.id DESC",
    )
        .bind(viewer)
        .fetch_all(db_pool)
        .await?;

    let blocked = db::blocked_peers(db_pool, viewer).await?;
    Ok(chats.into_iter().filter(|chat| !blocked.contains(&chat.peer_id)).collect())
}

#[debug_handler]
pub(crate) async fn chats(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Query(status): Query<Status>,
) -> AppResult<Response> {
    let viewer = match session::require_profile(&session, &db_pool).await? {
        Ok(profile) => profile,
        Err(redirect) => return Ok(redirect),
    };

    let chats = direct_chats(&db_pool, &viewer.id).await?;
    let items: String = if chats.is_empty() {
        include_res!(str, "/pages/chats/none.html").to_owned()
    } else {
        chats.iter()
            .map(|chat| {
                let alias = chat.peer_alias.as_deref()
                    .map(str::trim)
                    .filter(|a| !a.is_empty())
                    .unwrap_or_else(|| chat.peer_id.get(..5).unwrap_or(&chat.peer_id));
                include_res!(str, "/pages/chats/chat_item.html")
                    .replace("{alias}", &escape(alias))
                    .replace("{therian_type}", &escape(chat.peer_type.as_deref().unwrap_or("")))
                    .replace("{id}", &escape(&chat.chat_id))
            })
            .collect()
    };

    Ok(res::page(
        "Chats",
        &include_res!(str, "/pages/chats/list.html")
            .replace("{banner}", &status.banner())
            .replace("{chats}", &items),
    ).into_response())
}
