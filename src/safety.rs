use axum::{debug_handler, extract::State, response::{IntoResponse, Response}, routing::post, Form, Router};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{flash, now_ms, session, AppResult, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/block", post(block))
        .route("/report", post(report))
}

pub async fn block_user(db_pool: &SqlitePool, from_user: &str, to_user: &str) -> AppResult<()> {
    if to_user.is_empty() || to_user == from_user {
        return Err("Invalid user to block")?;
    }

    sqlx::query(
        "INSERT INTO blocks (from_user,to_user,created_at) VALUES (?,?,?) \
         ON CONFLICT(from_user,to_user) DO NOTHING",
    )
        .bind(from_user)
        .bind(to_user)
        .bind(now_ms())
        .execute(db_pool)
        .await?;

    info!("{from_user} blocked {to_user}");
    Ok(())
}

pub const REPORT_TARGETS: [&str; 3] = ["post", "user", "message"];

pub async fn file_report(
    db_pool: &SqlitePool,
    reporter: &str,
    target_type: &str,
    target_id: &str,
    reason: &str,
) -> AppResult<String> {
    if target_id.is_empty() || !REPORT_TARGETS.iter().any(|t| *t == target_type) {
        return Err("Invalid report request")?;
    }

    let reason = Some(reason.trim()).filter(|r| !r.is_empty());
    let id = Uuid::now_v7().to_string();
    sqlx::query("INSERT INTO reports (id,reporter_id,target_type,target_id,reason,created_at) VALUES (?,?,?,?,?,?)")
        .bind(&id)
        .bind(reporter)
        .bind(target_type)
        .bind(target_id)
        .bind(reason)
        .bind(now_ms())
        .execute(db_pool)
        .await?;

    info!("report {id}: {reporter} on {target_type} {target_id}");
    Ok(id)
}

#[derive(Debug, Deserialize)]
struct BlockForm {
    #[serde(default)]
    to_user_id: String,
    #[serde(default)]
    redirect_to: String,
}

#[debug_handler]
async fn block(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Form(BlockForm { to_user_id, redirect_to }): Form<BlockForm>,
) -> AppResult<Response> {
    let user_id = match session::require_profile(&session, &db_pool).await? {
        Ok(profile) => profile.id,
        Err(redirect) => return Ok(redirect),
    };
    let redirect_to = flash::clean_redirect(&redirect_to);

    Ok(match block_user(&db_pool, &user_id, &to_user_id).await {
        Ok(()) => flash::flag(redirect_to, "blocked", "1"),
        Err(err) => {
            warn!("block by {user_id} failed: {err}");
            flash::error(redirect_to, err)
        }
    }.into_response())
}

#[derive(Debug, Deserialize)]
struct ReportForm {
    #[serde(default)]
    target_type: String,
    #[serde(default)]
    target_id: String,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    redirect_to: String,
}

#[debug_handler]
async fn report(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Form(form): Form<ReportForm>,
) -> AppResult<Response> {
    let user_id = match session::require_profile(&session, &db_pool).await? {
        Ok(profile) => profile.id,
        Err(redirect) => return Ok(redirect),
    };
    let redirect_to = flash::clean_redirect(&form.redirect_to);

    Ok(match file_report(&db_pool, &user_id, &form.target_type, &form.target_id, &form.reason).await {
        Ok(_) => flash::flag(redirect_to, "reported", "1"),
        Err(err) => {
            warn!("report by {user_id} failed: {err}");
            flash::error(redirect_to, err)
        }
    }.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db::{self, tests::test_pool}, session::tests::{location, signed_in}};

    #[tokio::test]
    async fn blocking_twice_keeps_one_edge() {
        let db_pool = test_pool().await;
        block_user(&db_pool, "a", "b").await.unwrap();
        block_user(&db_pool, "a", "b").await.unwrap();

        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM blocks").fetch_one(&db_pool).await.unwrap();
        assert_eq!(n, 1);
        assert!(db::is_blocked_between(&db_pool, "b", "a").await.unwrap());
        assert!(block_user(&db_pool, "a", "a").await.is_err());
    }

    #[tokio::test]
    async fn reports_are_appended_with_optional_reason() {
        let db_pool = test_pool().await;
        file_report(&db_pool, "a", "message", "m1", "  ").await.unwrap();
        file_report(&db_pool, "a", "message", "m1", "spam").await.unwrap();

        let reasons: Vec<(Option<String>,)> = sqlx::query_as("SELECT reason FROM reports ORDER BY rowid")
            .fetch_all(&db_pool)
            .await
            .unwrap();
        assert_eq!(reasons, vec![(None,), (Some("spam".to_owned()),)]);

        let err = file_report(&db_pool, "a", "meetup", "x", "").await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid report request");
    }

    #[tokio::test]
    async fn safety_actions_without_a_profile_go_to_onboarding() {
        let db_pool = test_pool().await;

        let form = BlockForm { to_user_id: "b".into(), redirect_to: "/feed".into() };
        let response = block(State(db_pool.clone()), signed_in("ghost").await, Form(form)).await.unwrap();
        assert_eq!(location(&response), "/onboarding");

        let form = ReportForm {
            target_type: "user".into(),
            target_id: "b".into(),
            reason: String::new(),
            redirect_to: "/feed".into(),
        };
        let response = report(State(db_pool.clone()), signed_in("ghost").await, Form(form)).await.unwrap();
        assert_eq!(location(&response), "/onboarding");

        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM blocks").fetch_one(&db_pool).await.unwrap();
        assert_eq!(n, 0);
    }
}
