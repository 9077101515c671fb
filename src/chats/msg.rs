use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{db::{self, MESSAGE_COLUMNS}, now_ms, realtime::Realtime, AppResult};

/// How many messages a chat view is seeded with.
pub const PAGE_SIZE: i64 = 100;

/// The most recent `limit` messages of a chat, oldest first.
pub async fn recent(db_pool: &SqlitePool, chat_id: &str, limit: i64) -> AppResult<Vec<db::Message>> {
    let query = format!(
        "SELECT * FROM (\
            SELECT {MESSAGE_COLUMNS} FROM messages m LEFT JOIN profiles p ON p.id=m.sender_id \
            WHERE m.chat_id=? ORDER BY m.created_at DESC, m.rowid DESC LIMIT ?\
         ) ORDER BY created_at, seq"
    );
    Ok(
        sqlx::query_as(&query)
            .bind(chat_id)
            .bind(limit)
            .fetch_all(db_pool)
            .await?
    )
}

pub async fn find(db_pool: &SqlitePool, message_id: &str) -> AppResult<Option<db::Message>> {
    let query = format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages m LEFT JOIN profiles p ON p.id=m.sender_id WHERE m.id=?"
    );
    Ok(
        sqlx::query_as(&query)
            .bind(message_id)
            .fetch_optional(db_pool)
            .await?
    )
}

/// Appends to the log and publishes the insert. The sender's own view picks
/// the message up from the publish like everyone else's.
pub async fn send(
    db_pool: &SqlitePool,
    realtime: &Realtime,
    chat_id: &str,
    sender_id: &str,
    content: &str,
) -> AppResult<db::Message> {
    let content = content.trim();
    if content.is_empty() {
        return Err("Message is empty")?;
    }

    let id = Uuid::now_v7().to_string();
    sqlx::query("INSERT INTO messages (id,chat_id,sender_id,content,created_at) VALUES (?,?,?,?,?)")
        .bind(&id)
        .bind(chat_id)
        .bind(sender_id)
        .bind(content)
        .bind(now_ms())
        .execute(db_pool)
        .await?;

    let message = find(db_pool, &id).await?.ok_or("message vanished after insert")?;
    realtime.publish_message(message.clone());
    Ok(message)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{chats::timeline::Timeline, db::tests::{add_profile, test_pool}, packs::matching};

    pub(crate) async fn direct_chat(db_pool: &SqlitePool) -> String {
        add_profile(db_pool, "a", "wolf").await;
        add_profile(db_pool, "b", "wolf").await;
        matching::swipe(db_pool, "a", "b", matching::SwipeAction::Like).await.unwrap();
        match matching::swipe(db_pool, "b", "a", matching::SwipeAction::Like).await.unwrap() {
            matching::SwipeOutcome::Matched { chat_id, .. } => chat_id,
            other => panic!("expected a match, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn sent_messages_reach_every_subscriber_once_in_order() {
        let db_pool = test_pool().await;
        let chat_id = direct_chat(&db_pool).await;
        let realtime = Realtime::new();

        let mut a = realtime.subscribe_chat(&chat_id, "a", "A");
        let mut b = realtime.subscribe_chat(&chat_id, "b", "B");
        let mut a_view = Timeline::seed(recent(&db_pool, &chat_id, PAGE_SIZE).await.unwrap());
        let mut b_view = Timeline::default();

        send(&db_pool, &realtime, &chat_id, "a", " hello ").await.unwrap();
        send(&db_pool, &realtime, &chat_id, "b", "hi back").await.unwrap();

        for _ in 0..2 {
            a_view.merge(a.messages.recv().await.unwrap());
            b_view.merge(b.messages.recv().await.unwrap());
        }
        // a late page load seeds with what the socket already delivered
        for message in recent(&db_pool, &chat_id, PAGE_SIZE).await.unwrap() {
            a_view.merge(message);
        }

        let a_contents: Vec<&str> = a_view.sorted().iter().map(|m| m.content.as_str()).collect();
        let b_contents: Vec<&str> = b_view.sorted().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(a_contents, ["hello", "hi back"]);
        assert_eq!(a_contents, b_contents);
        assert_eq!(a_view.sorted()[0].sender_alias.as_deref(), Some("a alias"));
    }

    #[tokio::test]
    async fn recent_keeps_the_newest_page() {
        let db_pool = test_pool().await;
        let chat_id = direct_chat(&db_pool).await;
        let realtime = Realtime::new();
        for n in 0..5 {
            send(&db_pool, &realtime, &chat_id, "a", &format!("m{n}")).await.unwrap();
        }

        let page = recent(&db_pool, &chat_id, 3).await.unwrap();
        let contents: Vec<&str> = page.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["m2", "m3", "m4"]);
    }

    #[tokio::test]
    async fn blank_messages_are_refused() {
        let db_pool = test_pool().await;
        let chat_id = direct_chat(&db_pool).await;
        assert!(send(&db_pool, &Realtime::new(), &chat_id, "a", "   ").await.is_err());
    }
}
