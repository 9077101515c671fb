use axum::{debug_handler, extract::{Query, State}, response::{IntoResponse, Response}, routing::{get, post}, Form, Router};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    db, flash::{self, Status}, include_res, now_ms,
    res::{self, escape, format_ms},
    session, species, AppResult, AppState,
};

const LIST_SIZE: i64 = 50;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(meetups).post(new_meetup))
        .route("/join", post(join))
}

#[derive(Debug, Default, Deserialize)]
pub struct NewMeetup {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub time: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Meetup {
    pub id: String,
    pub title: String,
    pub description: String,
    pub city: String,
    pub date: i64,
    pub therian_type: String,
    pub created_by: String,
    pub participants: i64,
    pub joined: bool,
}

/// `YYYY-MM-DD` and `HH:MM` to unix milliseconds (UTC).
pub fn parse_when(date: &str, time_of_day: &str) -> Option<i64> {
    let format = time::macros::format_description!("[year]-[month]-[day] [hour]:[minute]");
    let when = time::PrimitiveDateTime::parse(&format!("{} {}", date.trim(), time_of_day.trim()), &format).ok()?;
    Some((when.assume_utc().unix_timestamp_nanos() / 1_000_000) as i64)
}

pub async fn create_meetup(db_pool: &SqlitePool, creator: &db::Profile, form: &NewMeetup) -> AppResult<String> {
    let title = form.title.trim();
    let city = form.city.trim();
    if title.is_empty() || city.is_empty() || form.date.trim().is_empty() || form.time.trim().is_empty() {
        return Err("Please complete title, city, date and time")?;
    }
    let Some(date) = parse_when(&form.date, &form.time) else {
        return Err("Invalid meetup date")?;
    };
    let therian_type = species::normalize(&creator.therian_type);
    if therian_type.is_empty() {
        return Err("Complete onboarding before creating meetups")?;
    }

    let id = Uuid::now_v7().to_string();
    sqlx::query(
        "INSERT INTO meetups (id,title,description,city,date,therian_type,created_by,created_at) VALUES (?,?,?,?,?,?,?,?)",
    )
        .bind(&id)
        .bind(title)
        .bind(form.description.trim())
        .bind(city)
        .bind(date)
        .bind(&therian_type)
        .bind(&creator.id)
        .bind(now_ms())
        .execute(db_pool)
        .await?;

    info!("meetup {id} in {city} for {therian_type}");
    Ok(id)
}

/// Joins a meetup of the viewer's own pack. Joining twice is a no-op.
pub async fn join_meetup(db_pool: &SqlitePool, viewer: &db::Profile, meetup_id: &str) -> AppResult<()> {
    if meetup_id.is_empty() {
        return Err("Invalid meetup")?;
    }

    let meetup_type: Option<(String,)> = sqlx::query_as("SELECT therian_type FROM meetups WHERE id=?")
        .bind(meetup_id)
        .fetch_optional(db_pool)
        .await?;
    let my_type = species::normalize(&viewer.therian_type);
    match meetup_type {
        Some((meetup_type,)) if !my_type.is_empty() && species::normalize(&meetup_type) == my_type => {}
        _ => return Err("You can only join meetups from your pack")?,
    }

    sqlx::query(
        "INSERT INTO meetup_participants (meetup_id,user_id,created_at) VALUES (?,?,?) \
         ON CONFLICT(meetup_id,user_id) DO NOTHING",
    )
        .bind(meetup_id)
        .bind(&viewer.id)
        .bind(now_ms())
        .execute(db_pool)
        .await?;
    Ok(())
}

pub async fn list_meetups(db_pool: &SqlitePool, viewer: &db::Profile) -> AppResult<Vec<Meetup>> {
    Ok(
        sqlx::query_as(
            "SELECT m.id, m.title, m.description, m.city, m.date, m.therian_type, m.created_by, \
                (SELECT COUNT(*) FROM meetup_participants mp WHERE mp.meetup_id=m.id) AS participants, \
                EXISTS(SELECT 1 FROM meetup_participants mp WHERE mp.meetup_id=m.id AND mp.user_id=?) AS joined \
             FROM meetups m WHERE m.therian_type=? ORDER BY m.date LIMIT ?",
        )
            .bind(&viewer.id)
            .bind(species::normalize(&viewer.therian_type))
            .bind(LIST_SIZE)
            .fetch_all(db_pool)
            .await?
    )
}

#[debug_handler]
async fn meetups(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Query(status): Query<Status>,
) -> AppResult<Response> {
    let viewer = match session::require_profile(&session, &db_pool).await? {
        Ok(profile) => profile,
        Err(redirect) => return Ok(redirect),
    };

    let list: String = list_meetups(&db_pool, &viewer).await?
        .iter()
        .map(|meetup| {
            let join = if meetup.joined {
                r#"<span class="tag">Going</span>"#.to_owned()
            } else {
                include_res!(str, "/pages/meetups/join.html").replace("{id}", &escape(&meetup.id))
            };
            include_res!(str, "/pages/meetups/meetup.html")
                .replace("{when}", &format_ms(meetup.date))
                .replace("{participants}", &meetup.participants.to_string())
                .replace("{join}", &join)
                .replace("{city}", &escape(&meetup.city))
                .replace("{description}", &escape(&meetup.description))
                .replace("{title}", &escape(&meetup.title))
        })
        .collect();

    let list = if list.is_empty() { include_res!(str, "/pages/meetups/none.html").to_owned() } else { list };
    let theme = species::theme(&viewer.therian_type);

    Ok(res::page(
        "Meetups",
        &include_res!(str, "/pages/meetups/meetups.html")
            .replace("{banner}", &status.banner())
            .replace("{accent}", theme.accent)
            .replace("{meetups}", &list)
            .replace("{therian_type}", &escape(&species::normalize(&viewer.therian_type))),
    ).into_response())
}

#[debug_handler]
async fn new_meetup(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Form(form): Form<NewMeetup>,
) -> AppResult<Response> {
    let viewer = match session::require_profile(&session, &db_pool).await? {
        Ok(profile) => profile,
        Err(redirect) => return Ok(redirect),
    };

    Ok(match create_meetup(&db_pool, &viewer, &form).await {
        Ok(_) => flash::flag("/meetups", "created", "1"),
        Err(err) => {
            warn!("meetup by {} failed: {err}", viewer.id);
            flash::error("/meetups", err)
        }
    }.into_response())
}

#[derive(Debug, Deserialize)]
struct JoinForm {
    #[serde(default)]
    meetup_id: String,
}

#[debug_handler]
async fn join(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Form(JoinForm { meetup_id }): Form<JoinForm>,
) -> AppResult<Response> {
    let viewer = match session::require_profile(&session, &db_pool).await? {
        Ok(profile) => profile,
        Err(redirect) => return Ok(redirect),
    };

    Ok(match join_meetup(&db_pool, &viewer, &meetup_id).await {
        Ok(()) => flash::flag("/meetups", "joined", "1"),
        Err(err) => {
            warn!("{} joining {meetup_id} failed: {err}", viewer.id);
            flash::error("/meetups", err)
        }
    }.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::{add_profile, test_pool};

    fn form(title: &str, date: &str, time: &str) -> NewMeetup {
        NewMeetup {
            title: title.into(),
            description: "bring snacks".into(),
            city: "Madrid".into(),
            date: date.into(),
            time: time.into(),
        }
    }

    async fn profile(db_pool: &SqlitePool, id: &str) -> db::Profile {
        db::Profile::find(db_pool, id).await.unwrap().unwrap()
    }

    #[test]
    fn dates_parse_as_utc() {
        assert_eq!(parse_when("1970-01-02", "00:00"), Some(86_400_000));
        assert_eq!(parse_when("2024-13-01", "10:00"), None);
        assert_eq!(parse_when("tomorrow", "10:00"), None);
    }

    #[tokio::test]
    async fn missing_fields_and_bad_dates_are_rejected() {
        let db_pool = test_pool().await;
        add_profile(&db_pool, "a", "wolf").await;
        let a = profile(&db_pool, "a").await;

        let err = create_meetup(&db_pool, &a, &form("", "2030-01-01", "10:00")).await.unwrap_err();
        assert_eq!(err.to_string(), "Please complete title, city, date and time");
        let err = create_meetup(&db_pool, &a, &form("Howl", "2030-02-31", "10:00")).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid meetup date");
    }

    #[tokio::test]
    async fn joining_is_idempotent_and_pack_scoped() {
        let db_pool = test_pool().await;
        add_profile(&db_pool, "a", "Wolf").await;
        add_profile(&db_pool, "b", "wolf").await;
        add_profile(&db_pool, "f", "fox").await;
        let (a, b, f) = (profile(&db_pool, "a").await, profile(&db_pool, "b").await, profile(&db_pool, "f").await);

        let id = create_meetup(&db_pool, &a, &form("Howl", "2030-01-01", "21:30")).await.unwrap();
        join_meetup(&db_pool, &b, &id).await.unwrap();
        join_meetup(&db_pool, &b, &id).await.unwrap();
        let err = join_meetup(&db_pool, &f, &id).await.unwrap_err();
        assert_eq!(err.to_string(), "You can only join meetups from your pack");

        let list = list_meetups(&db_pool, &b).await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].participants, 1);
        assert!(list[0].joined);
        assert!(!list_meetups(&db_pool, &a).await.unwrap()[0].joined);
        assert!(list_meetups(&db_pool, &f).await.unwrap().is_empty());
    }
}
