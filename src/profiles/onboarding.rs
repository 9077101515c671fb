use axum::{debug_handler, extract::{Query, State}, response::{IntoResponse, Redirect, Response}, Form};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;
use tracing::{info, warn};

use crate::{db::{self, Tags}, flash::{self, Status}, include_res, now_ms, res::{self, escape}, session, AppResult};

use super::{suggest_alias, ProfileFields};

/// Creates the profile, or overwrites it when onboarding is submitted again.
pub async fn complete_onboarding(db_pool: &SqlitePool, user_id: &str, fields: &ProfileFields) -> AppResult<()> {
    let alias = fields.alias.trim();
    let therian_type = fields.therian_type.trim();
    if alias.is_empty() || therian_type.is_empty() {
        return Err("Alias and therian type are required")?;
    }

    sqlx::query(
        "INSERT INTO profiles (id,alias,therian_type,animal_identity,tags,bio,safe_mode,created_at) VALUES (?,?,?,?,?,?,?,?) \
         ON CONFLICT(id) DO UPDATE SET alias=excluded.alias, therian_type=excluded.therian_type, \
            animal_identity=excluded.animal_identity, tags=excluded.tags, bio=excluded.bio, safe_mode=excluded.safe_mode",
    )
        .bind(user_id)
        .bind(alias)
        .bind(therian_type)
        .bind(ProfileFields::optional(&fields.animal_identity))
        .bind(Tags::parse(&fields.tags).to_json())
        .bind(fields.bio.trim())
        .bind(fields.safe_mode)
        .bind(now_ms())
        .execute(db_pool)
        .await?;

    info!("onboarded {user_id} as {alias}");
    Ok(())
}

#[derive(Debug, Deserialize)]
pub(crate) struct OnboardingForm {
    #[serde(default)]
    alias: String,
    #[serde(default)]
    therian_type: String,
    #[serde(default)]
    animal_identity: String,
    #[serde(default)]
    bio: String,
    #[serde(default)]
    tags: String,
    safe_mode: Option<String>,
}

#[debug_handler]
pub(crate) async fn onboarding_page(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Query(status): Query<Status>,
) -> AppResult<Response> {
    let user_id = match session::require_user(&session).await? {
        Ok(user_id) => user_id,
        Err(redirect) => return Ok(redirect),
    };

    let alias = match db::Profile::find(&db_pool, &user_id).await? {
        Some(profile) => profile.alias,
        None => suggest_alias(),
    };

    Ok(res::page(
        "Welcome",
        &include_res!(str, "/pages/profiles/onboarding.html")
            .replace("{banner}", &status.banner())
            .replace("{alias}", &escape(&alias)),
    ).into_response())
}

#[debug_handler]
pub(crate) async fn onboarding(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Form(form): Form<OnboardingForm>,
) -> AppResult<Response> {
    let user_id = match session::require_user(&session).await? {
        Ok(user_id) => user_id,
        Err(redirect) => return Ok(redirect),
    };

    let fields = ProfileFields {
        alias: form.alias,
        therian_type: form.therian_type,
        animal_identity: form.animal_identity,
        bio: form.bio,
        tags: form.tags,
        safe_mode: form.safe_mode.as_deref() == Some("on"),
    };

    Ok(match complete_onboarding(&db_pool, &user_id, &fields).await {
        Ok(()) => Redirect::to("/feed"),
        Err(err) => {
            warn!("onboarding {user_id} failed: {err}");
            flash::error("/onboarding", err)
        }
    }.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::test_pool;

    fn fields(alias: &str, therian_type: &str) -> ProfileFields {
        ProfileFields {
            alias: alias.into(),
            therian_type: therian_type.into(),
            tags: "night, forest,,".into(),
            safe_mode: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn onboarding_creates_then_overwrites() {
        let db_pool = test_pool().await;
        complete_onboarding(&db_pool, "g:1", &fields(" Ash ", "wolf")).await.unwrap();
        complete_onboarding(&db_pool, "g:1", &fields("Ash", "arctic fox")).await.unwrap();

        let profile = db::Profile::find(&db_pool, "g:1").await.unwrap().unwrap();
        assert_eq!(profile.alias, "Ash");
        assert_eq!(profile.therian_type, "arctic fox");
        assert_eq!(profile.tags, Tags(vec!["night".into(), "forest".into()]));
        assert!(profile.safe_mode);
        assert!(profile.animal_identity.is_none());
    }

    #[tokio::test]
    async fn alias_and_type_are_required() {
        let db_pool = test_pool().await;
        let err = complete_onboarding(&db_pool, "g:1", &fields("Ash", "  ")).await.unwrap_err();
        assert_eq!(err.to_string(), "Alias and therian type are required");
    }
}
