use axum::{debug_handler, extract::State, response::{IntoResponse, Redirect, Response}, Form};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;
use tracing::warn;

use crate::{flash, session, AppResult};

use super::matching::{self, SwipeAction, SwipeOutcome};

#[derive(Debug, Deserialize)]
pub(crate) struct SwipeForm {
    #[serde(default)]
    to_user_id: String,
    #[serde(default)]
    action: String,
}

#[debug_handler]
pub(crate) async fn swipe(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Form(SwipeForm { to_user_id, action }): Form<SwipeForm>,
) -> AppResult<Response> {
    let user_id = match session::require_profile(&session, &db_pool).await? {
        Ok(profile) => profile.id,
        Err(redirect) => return Ok(redirect),
    };

    let Some(action) = SwipeAction::parse(&action) else {
        return Ok(flash::error("/packs", "Invalid swipe request").into_response());
    };

    Ok(match matching::swipe(&db_pool, &user_id, &to_user_id, action).await {
        Ok(SwipeOutcome::Matched { .. }) => flash::flag("/packs", "matched", "1"),
        Ok(_) => Redirect::to("/packs"),
        Err(err) => {
            warn!("swipe {user_id} -> {to_user_id} failed: {err}");
            flash::error("/packs", err)
        }
    }.into_response())
}
