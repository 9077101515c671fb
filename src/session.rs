use axum::response::{IntoResponse, Redirect, Response};
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::{db, AppResult};

pub const USER_ID: &str = "user_id";
pub const CSRF_STATE: &str = "csrf_state";
pub const PKCE_VERIFIER: &str = "pkce_verifier";
pub const RETURN_URL: &str = "return_url";

/// Signed-in user id, or the redirect to the sign-in page.
pub async fn require_user(session: &Session) -> AppResult<Result<String, Response>> {
    Ok(match session.get::<String>(USER_ID).await? {
        Some(user_id) => Ok(user_id),
        None => Err(Redirect::to("/login").into_response()),
    })
}

/// Like [`require_user`], but also sends users without a profile to onboarding.
pub async fn require_profile(
    session: &Session,
    db_pool: &SqlitePool,
) -> AppResult<Result<db::Profile, Response>> {
    let user_id = match require_user(session).await? {
        Ok(user_id) => user_id,
        Err(redirect) => return Ok(Err(redirect)),
    };

    Ok(match db::Profile::find(db_pool, &user_id).await? {
        Some(profile) => Ok(profile),
        None => Err(Redirect::to("/onboarding").into_response()),
    })
}
