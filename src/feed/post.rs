use std::path::Path;

use axum::{debug_handler, extract::{Multipart, State}, response::{IntoResponse, Response}};
use sqlx::SqlitePool;
use tower_sessions::Session;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    config::Config,
    db, flash,
    media::{self, MediaKind, MultipartForm, Upload},
    now_ms,
    realtime::{FeedEvent, Realtime},
    session, species, AppResult,
};

/// Stores the post (and its media) and returns the new post id.
pub async fn create_post(
    db_pool: &SqlitePool,
    realtime: &Realtime,
    media_dir: &Path,
    author: &db::Profile,
    content: &str,
    media: Option<&Upload>,
) -> AppResult<String> {
    let content = content.trim();

    let (media_url, media_type) = match media {
        Some(upload) => {
            let Some(kind) = MediaKind::from_mime(&upload.content_type) else {
                return Err("Only image or video files are allowed")?;
            };
            let url = media::store(media_dir, &author.id, "", upload).await?;
            (Some(url), Some(kind.as_str()))
        }
        None => (None, None),
    };

    if content.is_empty() && media_url.is_none() {
        return Err("Write something or attach media")?;
    }

    let id = Uuid::now_v7().to_string();
    sqlx::query(
        "INSERT INTO posts (id,user_id,content,media_url,media_type,therian_type,created_at) VALUES (?,?,?,?,?,?,?)",
    )
        .bind(&id)
        .bind(&author.id)
        .bind(content)
        .bind(media_url)
        .bind(media_type)
        .bind(species::normalize(&author.therian_type))
        .bind(now_ms())
        .execute(db_pool)
        .await?;

    realtime.publish_feed(FeedEvent::Posts);
    info!("post {id} by {}", author.id);
    Ok(id)
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn new_post(
    State(db_pool): State<SqlitePool>,
    State(realtime): State<Realtime>,
    State(config): State<std::sync::Arc<Config>>,
    session: Session,
    multipart: Multipart,
) -> AppResult<Response> {
    let author = match session::require_profile(&session, &db_pool).await? {
        Ok(profile) => profile,
        Err(redirect) => return Ok(redirect),
    };

    let form = MultipartForm::read(multipart).await?;
    let scope = if form.text("scope") == "all" { "all" } else { "mine" };
    let content = form.text("content");

    Ok(match create_post(&db_pool, &realtime, &config.media_dir, &author, &content, form.files.get("media")).await {
        Ok(post_id) => flash::flag(&format!("/feed?scope={scope}"), "created", &post_id),
        Err(err) => {
            warn!("post by {} failed: {err}", author.id);
            flash::error("/feed", err)
        }
    }.into_response())
}

#[cfg(test)]
mod tests {
    use axum::body::Bytes;

    use super::*;
    use crate::db::tests::{add_profile, test_pool};

    #[tokio::test]
    async fn empty_posts_and_foreign_media_are_refused() {
        let db_pool = test_pool().await;
        add_profile(&db_pool, "a", "Wolf ").await;
        let author = db::Profile::find(&db_pool, "a").await.unwrap().unwrap();
        let realtime = Realtime::new();
        let dir = Path::new("unused");

        let err = create_post(&db_pool, &realtime, dir, &author, "  ", None).await.unwrap_err();
        assert_eq!(err.to_string(), "Write something or attach media");

        let pdf = Upload {
            file_name: "doc.pdf".into(),
            content_type: "application/pdf".into(),
            bytes: Bytes::from_static(b"%PDF"),
        };
        let err = create_post(&db_pool, &realtime, dir, &author, "hi", Some(&pdf)).await.unwrap_err();
        assert_eq!(err.to_string(), "Only image or video files are allowed");
    }

    #[tokio::test]
    async fn posts_are_scoped_to_the_normalized_type_and_announced() {
        let db_pool = test_pool().await;
        add_profile(&db_pool, "a", "  Grey Wolf ").await;
        let author = db::Profile::find(&db_pool, "a").await.unwrap().unwrap();
        let realtime = Realtime::new();
        let mut live = realtime.subscribe_feed();

        let id = create_post(&db_pool, &realtime, Path::new("unused"), &author, "awoo", None).await.unwrap();

        let (therian_type,): (String,) = sqlx::query_as("SELECT therian_type FROM posts WHERE id=?")
            .bind(&id)
            .fetch_one(&db_pool)
            .await
            .unwrap();
        assert_eq!(therian_type, "grey wolf");
        assert_eq!(live.recv().await.unwrap(), FeedEvent::Posts);
    }
}
