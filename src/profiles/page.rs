use axum::{debug_handler, extract::{Query, State}, response::{IntoResponse, Response}};
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::{db::Profile, flash::Status, include_res, res::{self, escape}, session, species, AppResult};

pub(crate) fn avatar(profile: &Profile) -> String {
    match &profile.avatar_url {
        Some(url) => format!(r#"<img class="avatar big" src="{}" alt="">"#, escape(url)),
        None => format!(r#"<span class="avatar big">{}</span>"#, species::theme(&profile.therian_type).emoji),
    }
}

fn tag_list(profile: &Profile) -> String {
    profile.tags.0.iter()
        .map(|tag| format!(r#"<li class="tag">{}</li>"#, escape(tag)))
        .collect()
}

#[debug_handler]
pub(crate) async fn profile(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Query(status): Query<Status>,
) -> AppResult<Response> {
    let profile = match session::require_profile(&session, &db_pool).await? {
        Ok(profile) => profile,
        Err(redirect) => return Ok(redirect),
    };

    let theme = species::theme(&profile.therian_type);
    Ok(res::page(
        profile.display_alias(),
        &include_res!(str, "/pages/profiles/profile.html")
            .replace("{banner}", &status.banner())
            .replace("{accent}", theme.accent)
            .replace("{avatar}", &avatar(&profile))
            .replace("{identity}", &escape(profile.animal_identity.as_deref().unwrap_or("")))
            .replace("{tags}", &tag_list(&profile))
            .replace("{safe_mode}", if profile.safe_mode { "on" } else { "off" })
            .replace("{bio}", &res::markdown(profile.bio.as_deref().unwrap_or("")))
            .replace("{therian_type}", &escape(&profile.therian_type))
            .replace("{alias}", &escape(profile.display_alias())),
    ).into_response())
}
