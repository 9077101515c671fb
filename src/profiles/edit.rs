use std::{path::Path, sync::Arc};

use axum::{debug_handler, extract::{Multipart, Query, State}, response::{IntoResponse, Response}};
use sqlx::SqlitePool;
use tower_sessions::Session;
use tracing::{info, warn};

use crate::{
    config::Config,
    db::Tags,
    flash::{self, Status},
    include_res,
    media::{self, MediaKind, MultipartForm, Upload},
    res::{self, escape},
    session, AppResult,
};

use super::{page::avatar, ProfileFields};

/// Updates an existing profile. A new avatar replaces the old one; without
/// one the stored avatar is kept.
pub async fn update_profile(
    db_pool: &SqlitePool,
    media_dir: &Path,
    user_id: &str,
    fields: &ProfileFields,
    avatar: Option<&Upload>,
) -> AppResult<()> {
    let alias = fields.alias.trim();
    let therian_type = fields.therian_type.trim();
    if alias.is_empty() || therian_type.is_empty() {
        return Err("Alias and therian type are required")?;
    }

    let avatar_url = match avatar {
        Some(upload) => {
            if MediaKind::from_mime(&upload.content_type) != Some(MediaKind::Image) {
                return Err("Avatar must be an image")?;
            }
            Some(media::store(media_dir, user_id, "avatar-", upload).await?)
        }
        None => None,
    };

    let updated = sqlx::query(
        "UPDATE profiles SET alias=?, therian_type=?, animal_identity=?, tags=?, bio=?, safe_mode=?, \
            avatar_url=COALESCE(?, avatar_url) WHERE id=?",
    )
        .bind(alias)
        .bind(therian_type)
        .bind(ProfileFields::optional(&fields.animal_identity))
        .bind(Tags::parse(&fields.tags).to_json())
        .bind(fields.bio.trim())
        .bind(fields.safe_mode)
        .bind(avatar_url)
        .bind(user_id)
        .execute(db_pool)
        .await?
        .rows_affected();

    if updated == 0 {
        return Err("Complete onboarding first")?;
    }

    info!("profile {user_id} updated");
    Ok(())
}

#[debug_handler]
pub(crate) async fn edit_page(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Query(status): Query<Status>,
) -> AppResult<Response> {
    let profile = match session::require_profile(&session, &db_pool).await? {
        Ok(profile) => profile,
        Err(redirect) => return Ok(redirect),
    };

    Ok(res::page(
        "Edit profile",
        &include_res!(str, "/pages/profiles/edit.html")
            .replace("{banner}", &status.banner())
            .replace("{avatar}", &avatar(&profile))
            .replace("{identity}", &escape(profile.animal_identity.as_deref().unwrap_or("")))
            .replace("{tags}", &escape(&profile.tags.0.join(", ")))
            .replace("{safe_mode}", if profile.safe_mode { "checked" } else { "" })
            .replace("{bio}", &escape(profile.bio.as_deref().unwrap_or("")))
            .replace("{therian_type}", &escape(&profile.therian_type))
            .replace("{alias}", &escape(&profile.alias)),
    ).into_response())
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn edit(
    State(db_pool): State<SqlitePool>,
    State(config): State<Arc<Config>>,
    session: Session,
    multipart: Multipart,
) -> AppResult<Response> {
    let user_id = match session::require_user(&session).await? {
        Ok(user_id) => user_id,
        Err(redirect) => return Ok(redirect),
    };

    let form = MultipartForm::read(multipart).await?;
    let fields = ProfileFields {
        alias: form.text("alias"),
        therian_type: form.text("therian_type"),
        animal_identity: form.text("animal_identity"),
        bio: form.text("bio"),
        tags: form.text("tags"),
        safe_mode: form.text("safe_mode") == "on",
    };

    Ok(match update_profile(&db_pool, &config.media_dir, &user_id, &fields, form.files.get("avatar")).await {
        Ok(()) => flash::flag("/profile", "updated", "1"),
        Err(err) => {
            warn!("profile update for {user_id} failed: {err}");
            flash::error("/profile/edit", err)
        }
    }.into_response())
}

#[cfg(test)]
mod tests {
    use axum::body::Bytes;
    use uuid::Uuid;

    use super::*;
    use crate::db::{tests::{add_profile, test_pool}, Profile};

    fn fields() -> ProfileFields {
        ProfileFields {
            alias: "Ember".into(),
            therian_type: "fox".into(),
            bio: "  hello  ".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn avatars_must_be_images() {
        let db_pool = test_pool().await;
        add_profile(&db_pool, "a", "fox").await;
        let clip = Upload {
            file_name: "clip.mp4".into(),
            content_type: "video/mp4".into(),
            bytes: Bytes::from_static(b"mp4"),
        };

        let err = update_profile(&db_pool, Path::new("unused"), "a", &fields(), Some(&clip)).await.unwrap_err();
        assert_eq!(err.to_string(), "Avatar must be an image");
    }

    #[tokio::test]
    async fn avatar_is_kept_unless_replaced() {
        let db_pool = test_pool().await;
        add_profile(&db_pool, "a", "fox").await;
        let dir = std::env::temp_dir().join(format!("pack-avatar-{}", Uuid::now_v7()));
        let png = Upload {
            file_name: "me.png".into(),
            content_type: "image/png".into(),
            bytes: Bytes::from_static(b"png"),
        };

        update_profile(&db_pool, &dir, "a", &fields(), Some(&png)).await.unwrap();
        let first = Profile::find(&db_pool, "a").await.unwrap().unwrap();
        assert!(first.avatar_url.as_deref().unwrap().starts_with("/media/a/avatar-"));
        assert_eq!(first.bio.as_deref(), Some("hello"));

        update_profile(&db_pool, &dir, "a", &fields(), None).await.unwrap();
        let second = Profile::find(&db_pool, "a").await.unwrap().unwrap();
        assert_eq!(second.avatar_url, first.avatar_url);
        assert_eq!(second.alias, "Ember");

        let _ = tokio::fs::remove_dir_all(dir).await;
    }

    #[tokio::test]
    async fn missing_profiles_are_not_created() {
        let db_pool = test_pool().await;
        let err = update_profile(&db_pool, Path::new("unused"), "ghost", &fields(), None).await.unwrap_err();
        assert_eq!(err.to_string(), "Complete onboarding first");
    }
}
