mod live;
mod page;
mod post;

use axum::{extract::DefaultBodyLimit, routing::{get, post}, Router};

use crate::AppState;

pub use page::{load_feed, FeedPost, Scope};
pub use post::create_post;

/// Largest accepted upload.
pub const MAX_UPLOAD: usize = 50 * 1024 * 1024;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(page::feed))
        .route("/posts", post(post::new_post).layer(DefaultBodyLimit::max(MAX_UPLOAD)))
        .route("/live", get(live::feed_ws))
}
