use sqlx::SqlitePool;

use crate::{db, species, AppResult};

#[derive(Debug, PartialEq, Eq)]
pub enum ChatAccess {
    Direct { peer_id: String },
    Pack,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Denied {
    NotFound,
    Blocked,
}

/// Direct chats open to the two matched users while neither blocked the
/// other; pack chats open to members of that pack.
pub async fn open(
    db_pool: &SqlitePool,
    chat_id: &str,
    viewer: &db::Profile,
) -> AppResult<Result<ChatAccess, Denied>> {
    let Some(chat) = db::Chat::find(db_pool, chat_id).await? else {
        return Ok(Err(Denied::NotFound));
    };

    if let Some(therian_type) = chat.therian_type.as_deref() {
        if species::normalize(&viewer.therian_type) != therian_type {
            return Ok(Err(Denied::NotFound));
        }
        return Ok(Ok(ChatAccess::Pack));
    }

    let Some(match_id) = chat.match_id.as_deref() else {
        return Ok(Err(Denied::NotFound));
    };
    let found: Option<db::Match> = sqlx::query_as("SELECT id,user_a,user_b,created_at FROM matches WHERE id=?")
        .bind(match_id)
        .fetch_optional(db_pool)
        .await?;
    let Some(found) = found.filter(|m| m.involves(&viewer.id)) else {
        return Ok(Err(Denied::NotFound));
    };

    let peer_id = found.other(&viewer.id).to_owned();
    if db::is_blocked_between(db_pool, &viewer.id, &peer_id).await? {
        return Ok(Err(Denied::Blocked));
    }

    Ok(Ok(ChatAccess::Direct { peer_id }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db::tests::{add_profile, block, test_pool}, pack, packs::matching};

    async fn profile(db_pool: &SqlitePool, id: &str) -> db::Profile {
        db::Profile::find(db_pool, id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn direct_chats_are_for_the_matched_pair_only() {
        let db_pool = test_pool().await;
        for id in ["a", "b", "c"] {
            add_profile(&db_pool, id, "wolf").await;
        }
        matching::swipe(&db_pool, "a", "b", matching::SwipeAction::Like).await.unwrap();
        let matching::SwipeOutcome::Matched { chat_id, .. } =
            matching::swipe(&db_pool, "b", "a", matching::SwipeAction::Like).await.unwrap()
        else {
            panic!("expected a match");
        };

        let access = open(&db_pool, &chat_id, &profile(&db_pool, "a").await).await.unwrap();
        assert!(matches!(access, Ok(ChatAccess::Direct { ref peer_id, .. }) if peer_id == "b"));
        assert!(matches!(open(&db_pool, &chat_id, &profile(&db_pool, "c").await).await.unwrap(), Err(Denied::NotFound)));
        assert!(matches!(open(&db_pool, "nope", &profile(&db_pool, "a").await).await.unwrap(), Err(Denied::NotFound)));

        block(&db_pool, "b", "a").await;
        assert!(matches!(open(&db_pool, &chat_id, &profile(&db_pool, "a").await).await.unwrap(), Err(Denied::Blocked)));
    }

    #[tokio::test]
    async fn pack_chats_are_for_pack_members() {
        let db_pool = test_pool().await;
        add_profile(&db_pool, "w", " Grey  Wolf").await;
        add_profile(&db_pool, "f", "fox").await;
        let chat_id = pack::ensure_pack_chat(&db_pool, "grey wolf").await.unwrap();

        assert_eq!(open(&db_pool, &chat_id, &profile(&db_pool, "w").await).await.unwrap(), Ok(ChatAccess::Pack));
        assert!(matches!(open(&db_pool, &chat_id, &profile(&db_pool, "f").await).await.unwrap(), Err(Denied::NotFound)));
    }
}
