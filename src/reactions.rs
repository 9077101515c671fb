use axum::{debug_handler, extract::State, response::{IntoResponse, Redirect, Response}, routing::post, Form, Router};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;
use tracing::warn;

use crate::{flash, now_ms, realtime::{FeedEvent, Realtime}, session, AppResult, AppState};

pub const REACTIONS: [&str; 4] = ["🐾", "🔥", "🌙", "🖤"];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(react_to_post))
}

/// One reaction per user and post; reacting again replaces it.
pub async fn react(
    db_pool: &SqlitePool,
    realtime: &Realtime,
    user_id: &str,
    post_id: &str,
    kind: &str,
) -> AppResult<()> {
    if post_id.is_empty() || !REACTIONS.iter().any(|r| *r == kind) {
        return Err("Invalid reaction request")?;
    }

    sqlx::query(
        "INSERT INTO reactions (user_id,post_id,type,created_at) VALUES (?,?,?,?) \
         ON CONFLICT(user_id,post_id) DO UPDATE SET type=excluded.type, created_at=excluded.created_at",
    )
        .bind(user_id)
        .bind(post_id)
        .bind(kind)
        .bind(now_ms())
        .execute(db_pool)
        .await?;

    realtime.publish_feed(FeedEvent::Reactions);
    Ok(())
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReactForm {
    #[serde(default)]
    post_id: String,
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    redirect_to: String,
}

#[debug_handler(state = AppState)]
pub(crate) async fn react_to_post(
    State(db_pool): State<SqlitePool>,
    State(realtime): State<Realtime>,
    session: Session,
    Form(ReactForm { post_id, kind, redirect_to }): Form<ReactForm>,
) -> AppResult<Response> {
    let user_id = match session::require_profile(&session, &db_pool).await? {
        Ok(profile) => profile.id,
        Err(redirect) => return Ok(redirect),
    };
    let redirect_to = flash::clean_redirect(&redirect_to);

    Ok(match react(&db_pool, &realtime, &user_id, &post_id, &kind).await {
        Ok(()) => Redirect::to(redirect_to),
        Err(err) => {
            warn!("reaction by {user_id} on {post_id} failed: {err}");
            flash::error(redirect_to, err)
        }
    }.into_response())
}
