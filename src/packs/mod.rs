pub mod matching;
mod page;
mod swipe;

use axum::{routing::{get, post}, Router};

use crate::AppState;

pub use page::next_candidate;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(page::packs))
        .route("/swipe", post(swipe::swipe))
}
