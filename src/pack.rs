use axum::{debug_handler, extract::{Query, State}, response::{IntoResponse, Response}};
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{
    chats::{msg, render},
    flash::Status,
    include_res,
    now_ms,
    res::{self, escape},
    session, species, AppResult,
};

/// The group chat of a (normalized) therian type. Concurrent first visitors
/// race on the unique `therian_type` and all come back with the same chat.
pub async fn ensure_pack_chat(db_pool: &SqlitePool, therian_type: &str) -> AppResult<String> {
    let (chat_id,): (String,) = sqlx::query_as(
        "INSERT INTO chats (id,therian_type,created_at) VALUES (?,?,?) \
         ON CONFLICT(therian_type) DO UPDATE SET therian_type=excluded.therian_type \
         RETURNING id",
    )
        .bind(Uuid::now_v7().to_string())
        .bind(therian_type)
        .bind(now_ms())
        .fetch_one(db_pool)
        .await?;
    Ok(chat_id)
}

#[debug_handler]
pub async fn pack(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Query(status): Query<Status>,
) -> AppResult<Response> {
    let viewer = match session::require_profile(&session, &db_pool).await? {
        Ok(profile) => profile,
        Err(redirect) => return Ok(redirect),
    };

    let therian_type = species::normalize(&viewer.therian_type);
    if therian_type.is_empty() {
        return Ok(res::page("Pack", include_res!(str, "/pages/pack/missing_type.html")).into_response());
    }

    let theme = species::theme(&therian_type);
    let chat_id = ensure_pack_chat(&db_pool, &therian_type).await?;
    let messages = msg::recent(&db_pool, &chat_id, msg::PAGE_SIZE).await?;

    Ok(res::page(
        theme.name,
        &include_res!(str, "/pages/pack/pack.html")
            .replace("{banner}", &status.banner())
            .replace("{accent}", theme.accent)
            .replace("{theme}", &format!("{} {}", theme.name, theme.emoji))
            .replace("{panel}", &render::panel(&chat_id, &viewer.id, &messages, "/pack"))
            .replace("{therian_type}", &escape(&therian_type)),
    ).into_response())
}
