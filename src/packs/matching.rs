//! Mutual likes become a match and a direct chat.
//!
//! Every step is an upsert keyed on a unique constraint, so both users'
//! flows may run it at once and still converge on a single match and chat.
//! A failure part way leaves the swipe recorded; the next like from either
//! side runs the remaining steps again.

use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::{now_ms, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeAction {
    Like,
    Dislike,
}

impl SwipeAction {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "like" => Some(SwipeAction::Like),
            "dislike" => Some(SwipeAction::Dislike),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwipeOutcome {
    /// Dislike stored.
    Recorded,
    /// Like stored, the other side has not liked back yet.
    Pending,
    Matched { match_id: String, chat_id: String },
}

/// Sorted so (a, b) and (b, a) name the same match.
pub fn canonical_pair<'a>(x: &'a str, y: &'a str) -> (&'a str, &'a str) {
    if x <= y { (x, y) } else { (y, x) }
}

pub async fn swipe(
    db_pool: &SqlitePool,
    actor: &str,
    target: &str,
    action: SwipeAction,
) -> AppResult<SwipeOutcome> {
    if target.is_empty() || target == actor {
        return Err("Invalid swipe request")?;
    }

    sqlx::query(
        "INSERT INTO swipes (from_user,to_user,is_like,created_at) VALUES (?,?,?,?) \
         ON CONFLICT(from_user,to_user) DO UPDATE SET is_like=excluded.is_like",
    )
        .bind(actor)
        .bind(target)
        .bind(action == SwipeAction::Like)
        .bind(now_ms())
        .execute(db_pool)
        .await?;

    if action == SwipeAction::Dislike {
        return Ok(SwipeOutcome::Recorded);
    }

    let liked_back = sqlx::query("SELECT 1 FROM swipes WHERE from_user=? AND to_user=? AND is_like=1")
        .bind(target)
        .bind(actor)
        .fetch_optional(db_pool)
        .await?
        .is_some();
    if !liked_back {
        return Ok(SwipeOutcome::Pending);
    }

    let (user_a, user_b) = canonical_pair(actor, target);
    let match_id = ensure_match(db_pool, user_a, user_b).await?;
    let chat_id = ensure_direct_chat(db_pool, &match_id).await?;

    info!("matched {user_a} with {user_b} ({match_id})");
    Ok(SwipeOutcome::Matched { match_id, chat_id })
}

async fn ensure_match(db_pool: &SqlitePool, user_a: &str, user_b: &str) -> AppResult<String> {
    // the no-op update makes RETURNING hand back the existing row on conflict
    let (match_id,): (String,) = sqlx::query_as(
        "INSERT INTO matches (id,user_a,user_b,created_at) VALUES (?,?,?,?) \
         ON CONFLICT(user_a,user_b) DO UPDATE SET user_a=excluded.user_a \
         RETURNING id",
    )
        .bind(Uuid::now_v7().to_string())
        .bind(user_a)
        .bind(user_b)
        .bind(now_ms())
        .fetch_one(db_pool)
        .await?;
    Ok(match_id)
}

async fn ensure_direct_chat(db_pool: &SqlitePool, match_id: &str) -> AppResult<String> {
    let (chat_id,): (String,) = sqlx::query_as(
        "INSERT INTO chats (id,match_id,created_at) VALUES (?,?,?) \
         ON CONFLICT(match_id) DO UPDATE SET match_id=excluded.match_id \
         RETURNING id",
    )
        .bind(Uuid::now_v7().to_string())
        .bind(match_id)
        .bind(now_ms())
        .fetch_one(db_pool)
        .await?;
    Ok(chat_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::{add_profile, test_pool};

    async fn count(db_pool: &SqlitePool, table: &str) -> i64 {
        let (n,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(db_pool)
            .await
            .unwrap();
        n
    }

    async fn pool_with(users: &[&str]) -> SqlitePool {
        let db_pool = test_pool().await;
        for user in users {
            add_profile(&db_pool, user, "wolf").await;
        }
        db_pool
    }

    #[tokio::test]
    async fn one_sided_like_does_not_match() {
        let db_pool = pool_with(&["a", "b"]).await;

        let outcome = swipe(&db_pool, "a", "b", SwipeAction::Like).await.unwrap();
        assert_eq!(outcome, SwipeOutcome::Pending);
        assert_eq!(count(&db_pool, "matches").await, 0);
        assert_eq!(count(&db_pool, "chats").await, 0);
    }

    #[tokio::test]
    async fn mutual_like_creates_one_match_and_chat() {
        let db_pool = pool_with(&["a", "b"]).await;

        swipe(&db_pool, "b", "a", SwipeAction::Like).await.unwrap();
        let outcome = swipe(&db_pool, "a", "b", SwipeAction::Like).await.unwrap();

        let SwipeOutcome::Matched { match_id, chat_id } = outcome else {
            panic!("expected a match, got {outcome:?}");
        };
        let (user_a, user_b): (String, String) = sqlx::query_as("SELECT user_a,user_b FROM matches WHERE id=?")
            .bind(&match_id)
            .fetch_one(&db_pool)
            .await
            .unwrap();
        assert_eq!((user_a.as_str(), user_b.as_str()), ("a", "b"));

        let (chat_match,): (String,) = sqlx::query_as("SELECT match_id FROM chats WHERE id=?")
            .bind(&chat_id)
            .fetch_one(&db_pool)
            .await
            .unwrap();
        assert_eq!(chat_match, match_id);
        assert_eq!(count(&db_pool, "matches").await, 1);
        assert_eq!(count(&db_pool, "chats").await, 1);
    }

    #[tokio::test]
    async fn matches_are_symmetric_and_repeat_likes_converge() {
        let db_pool = pool_with(&["zed", "amy"]).await;

        swipe(&db_pool, "zed", "amy", SwipeAction::Like).await.unwrap();
        let first = swipe(&db_pool, "amy", "zed", SwipeAction::Like).await.unwrap();
        let again = swipe(&db_pool, "zed", "amy", SwipeAction::Like).await.unwrap();
        let and_again = swipe(&db_pool, "amy", "zed", SwipeAction::Like).await.unwrap();

        assert_eq!(first, again);
        assert_eq!(again, and_again);
        assert_eq!(count(&db_pool, "swipes").await, 2);
        assert_eq!(count(&db_pool, "matches").await, 1);
        assert_eq!(count(&db_pool, "chats").await, 1);
    }

    #[tokio::test]
    async fn concurrent_likes_converge_on_one_match() {
        let db_pool = pool_with(&["a", "b"]).await;

        let (x, y) = tokio::join!(
            swipe(&db_pool, "a", "b", SwipeAction::Like),
            swipe(&db_pool, "b", "a", SwipeAction::Like),
        );
        let outcomes = [x.unwrap(), y.unwrap()];

        assert!(outcomes.iter().any(|o| matches!(o, SwipeOutcome::Matched { .. })));
        assert_eq!(count(&db_pool, "matches").await, 1);
        assert_eq!(count(&db_pool, "chats").await, 1);
    }

    #[tokio::test]
    async fn dislike_is_recorded_and_overwritten_by_later_like() {
        let db_pool = pool_with(&["a", "b"]).await;

        assert_eq!(swipe(&db_pool, "a", "b", SwipeAction::Dislike).await.unwrap(), SwipeOutcome::Recorded);
        swipe(&db_pool, "b", "a", SwipeAction::Like).await.unwrap();
        assert_eq!(count(&db_pool, "matches").await, 0);

        let outcome = swipe(&db_pool, "a", "b", SwipeAction::Like).await.unwrap();
        assert!(matches!(outcome, SwipeOutcome::Matched { .. }));
        assert_eq!(count(&db_pool, "swipes").await, 2);
    }

    #[tokio::test]
    async fn self_swipes_are_rejected() {
        let db_pool = pool_with(&["a"]).await;
        let err = swipe(&db_pool, "a", "a", SwipeAction::Like).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid swipe request");
    }

    #[test]
    fn canonical_pair_is_order_independent() {
        assert_eq!(canonical_pair("b", "a"), canonical_pair("a", "b"));
        assert_eq!(SwipeAction::parse("nope"), None);
    }
}
