use axum::{debug_handler, extract::{Query, State}, response::{IntoResponse, Response}};
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::{db, flash::Status, include_res, res::{self, escape}, session, species, AppResult};

/// The next profile to swipe on: not the viewer, not yet swiped, not blocked
/// either way, and with an alias and therian type filled in.
pub async fn next_candidate(db_pool: &SqlitePool, viewer: &str) -> AppResult<Option<db::Profile>> {
    Ok(
        sqlx::query_as(
            "SELECT * FROM profiles \
             WHERE id != ? AND trim(alias) != '' AND trim(therian_type) != '' \
             AND id NOT IN (SELECT to_user FROM swipes WHERE from_user=?) \
             AND id NOT IN (SELECT to_user FROM blocks WHERE from_user=?) \
             AND id NOT IN (SELECT from_user FROM blocks WHERE to_user=?) \
             ORDER BY created_at, id LIMIT 1",
        )
            .bind(viewer)
            .bind(viewer)
            .bind(viewer)
            .bind(viewer)
            .fetch_optional(db_pool)
            .await?
    )
}

#[debug_handler]
pub(crate) async fn packs(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Query(status): Query<Status>,
) -> AppResult<Response> {
    let viewer = match session::require_profile(&session, &db_pool).await? {
        Ok(profile) => profile,
        Err(redirect) => return Ok(redirect),
    };

    let card = match next_candidate(&db_pool, &viewer.id).await? {
        Some(candidate) => candidate_card(&candidate),
        None => include_res!(str, "/pages/packs/empty.html").to_owned(),
    };

    Ok(res::page(
        "Packs",
        &include_res!(str, "/pages/packs/packs.html")
            .replace("{banner}", &status.banner())
            .replace("{card}", &card),
    ).into_response())
}

fn candidate_card(candidate: &db::Profile) -> String {
    let theme = species::theme(&candidate.therian_type);
    let tags: String = candidate.tags.0.iter()
        .map(|tag| format!(r#"<span class="tag">#{}</span>"#, escape(tag)))
        .collect();
    let bio = candidate.bio.as_deref().map(res::markdown).unwrap_or_default();

    include_res!(str, "/pages/packs/candidate.html")
        .replace("{accent}", theme.accent)
        .replace("{theme}", &format!("{} {}", theme.name, theme.emoji))
        .replace("{alias}", &escape(candidate.display_alias()))
        .replace("{therian_type}", &escape(&candidate.therian_type))
        .replace("{animal_identity}", &escape(candidate.animal_identity.as_deref().unwrap_or("")))
        .replace("{tags}", &tags)
        .replace("{bio}", &bio)
        .replace("{id}", &escape(&candidate.id))
}
