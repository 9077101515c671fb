use axum::{debug_handler, response::Redirect};
use tower_sessions::Session;

use crate::{session::USER_ID, AppResult};

#[debug_handler]
pub async fn index(session: Session) -> AppResult<Redirect> {
    Ok(match session.get::<String>(USER_ID).await? {
        Some(_) => Redirect::to("/feed"),
        None => Redirect::to("/login"),
    })
}
