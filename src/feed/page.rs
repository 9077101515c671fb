use std::collections::HashMap;

use axum::{debug_handler, extract::{Query, State}, response::{IntoResponse, Response}};
use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tower_sessions::Session;

use crate::{
    db,
    flash::Status,
    include_res,
    reactions::REACTIONS,
    res::{self, escape, format_ms},
    session, species, AppResult,
};

const FEED_SIZE: i64 = 80;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Only the viewer's pack.
    #[default]
    Mine,
    All,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Mine => "mine",
            Scope::All => "all",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct FeedQuery {
    #[serde(default)]
    scope: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PostRow {
    pub id: String,
    pub user_id: String,
    pub content: String,
    pub media_url: Option<String>,
    pub media_type: Option<String>,
    pub therian_type: String,
    pub created_at: i64,
    pub author_alias: Option<String>,
    pub author_avatar: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FeedPost {
    pub post: PostRow,
    /// Count per reaction, in [`REACTIONS`] order.
    pub counts: Vec<(&'static str, i64)>,
    pub mine: Option<String>,
}

/// Recent posts minus authors blocked either way, narrowed to the viewer's
/// pack for [`Scope::Mine`], with reaction tallies.
pub async fn load_feed(db_pool: &SqlitePool, viewer: &db::Profile, scope: Scope) -> AppResult<Vec<FeedPost>> {
    let posts: Vec<PostRow> = sqlx::query_as(
        "SELECT po.id, po.user_id, po.content, po.media_url, po.media_type, po.therian_type, po.created_at, \
            p.alias AS author_alias, p.avatar_url AS author_avatar \
         FROM posts po LEFT JOIN profiles p ON p.id=po.user_id \
         ORDER BY po.created_at DESC, po.rowid DESC LIMIT ?",
    )
        .bind(FEED_SIZE)
        .fetch_all(db_pool)
        .await?;

    let blocked = db::blocked_peers(db_pool, &viewer.id).await?;
    let my_type = species::normalize(&viewer.therian_type);
    let posts: Vec<PostRow> = posts
        .into_iter()
        .filter(|post| !blocked.contains(&post.user_id))
        .filter(|post| scope == Scope::All || my_type.is_empty() || species::normalize(&post.therian_type) == my_type)
        .collect();

    if posts.is_empty() {
        return Ok(Vec::new());
    }

    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT post_id,user_id,type FROM reactions WHERE post_id IN (");
    let mut ids = query.separated(",");
    for post in &posts {
        ids.push_bind(post.id.clone());
    }
    ids.push_unseparated(")");
    let reactions: Vec<(String, String, String)> = query.build_query_as().fetch_all(db_pool).await?;

    let mut counts: HashMap<(&str, &str), i64> = HashMap::new();
    let mut mine: HashMap<&str, &str> = HashMap::new();
    for (post_id, user_id, kind) in &reactions {
        *counts.entry((post_id.as_str(), kind.as_str())).or_default() += 1;
        if *user_id == viewer.id {
            mine.insert(post_id.as_str(), kind.as_str());
        }
    }

    Ok(posts
        .iter()
        .map(|post| FeedPost {
            counts: REACTIONS
                .iter()
                .map(|kind| (*kind, counts.get(&(post.id.as_str(), *kind)).copied().unwrap_or(0)))
                .collect(),
            mine: mine.get(post.id.as_str()).map(|kind| kind.to_string()),
            post: post.clone(),
        })
        .collect())
}

#[debug_handler]
pub(crate) async fn feed(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Query(status): Query<Status>,
    Query(FeedQuery { scope }): Query<FeedQuery>,
) -> AppResult<Response> {
    let viewer = match session::require_profile(&session, &db_pool).await? {
        Ok(profile) => profile,
        Err(redirect) => return Ok(redirect),
    };

    let scope = match scope.as_deref() {
        Some("all") => Scope::All,
        _ => Scope::Mine,
    };
    let posts = load_feed(&db_pool, &viewer, scope).await?;
    let back_to = format!("/feed?scope={}", scope.as_str());

    let items: String = if posts.is_empty() {
        include_res!(str, "/pages/feed/empty.html").to_owned()
    } else {
        posts.iter()
            .map(|post| post_card(post, &viewer, &back_to, status.created.as_deref()))
            .collect()
    };

    let theme = species::theme(&viewer.therian_type);
    Ok(res::page(
        "Feed",
        &include_res!(str, "/pages/feed/feed.html")
            .replace("{banner}", &status.banner())
            .replace("{accent}", theme.accent)
            .replace("{mine_selected}", if scope == Scope::Mine { "selected" } else { "" })
            .replace("{all_selected}", if scope == Scope::All { "selected" } else { "" })
            .replace("{scope}", scope.as_str())
            .replace("{posts}", &items)
            .replace("{therian_type}", &escape(&viewer.therian_type)),
    ).into_response())
}

fn post_card(item: &FeedPost, viewer: &db::Profile, back_to: &str, created: Option<&str>) -> String {
    let post = &item.post;
    let media = match (post.media_url.as_deref(), post.media_type.as_deref()) {
        (Some(url), Some("image")) => format!(r#"<img class="media" src="{}" alt="">"#, escape(url)),
        (Some(url), Some("video")) if viewer.safe_mode => format!(
            r#"<details class="media"><summary>Video hidden by safe mode, show</summary><video src="{}" controls></video></details>"#,
            escape(url)
        ),
        (Some(url), Some("video")) => format!(r#"<video class="media" src="{}" controls></video>"#, escape(url)),
        _ => String::new(),
    };

    let reactions: String = item.counts.iter()
        .map(|&(kind, count)| {
            include_res!(str, "/pages/feed/reaction.html")
                .replace("{active}", if item.mine.as_deref() == Some(kind) { "active" } else { "" })
                .replace("{redirect_to}", &escape(back_to))
                .replace("{count}", &count.to_string())
                .replace("{post_id}", &escape(&post.id))
                .replace("{kind}", kind)
        })
        .collect();

    let safety = if post.user_id == viewer.id {
        String::new()
    } else {
        include_res!(str, "/pages/feed/safety.html")
            .replace("{redirect_to}", &escape(back_to))
            .replace("{user_id}", &escape(&post.user_id))
            .replace("{post_id}", &escape(&post.id))
    };

    let alias = post.author_alias.as_deref().map(str::trim).filter(|a| !a.is_empty()).unwrap_or("Anon");
    let avatar = match post.author_avatar.as_deref() {
        Some(url) => format!(r#"<img class="avatar" src="{}" alt="">"#, escape(url)),
        None => r#"<span class="avatar">🐾</span>"#.to_owned(),
    };

    include_res!(str, "/pages/feed/post.html")
        .replace("{highlight}", if created == Some(post.id.as_str()) { "highlight" } else { "" })
        .replace("{avatar}", &avatar)
        .replace("{alias}", &escape(alias))
        .replace("{post_type}", &escape(&post.therian_type))
        .replace("{time}", &format_ms(post.created_at))
        .replace("{media}", &media)
        .replace("{reactions}", &reactions)
        .replace("{safety}", &safety)
        .replace("{content}", &res::markdown(&post.content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::tests::{add_profile, block, test_pool},
        feed::create_post,
        reactions::react,
        realtime::Realtime,
    };

    async fn profile(db_pool: &SqlitePool, id: &str) -> db::Profile {
        db::Profile::find(db_pool, id).await.unwrap().unwrap()
    }

    async fn post(db_pool: &SqlitePool, author: &str, content: &str) -> String {
        let author = profile(db_pool, author).await;
        create_post(db_pool, &Realtime::new(), std::path::Path::new("unused"), &author, content, None)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn scope_mine_keeps_only_the_viewers_pack() {
        let db_pool = test_pool().await;
        add_profile(&db_pool, "w1", "Wolf").await;
        add_profile(&db_pool, "w2", "wolf ").await;
        add_profile(&db_pool, "f", "fox").await;
        post(&db_pool, "w2", "awoo").await;
        post(&db_pool, "f", "yip").await;

        let viewer = profile(&db_pool, "w1").await;
        let mine = load_feed(&db_pool, &viewer, Scope::Mine).await.unwrap();
        let all = load_feed(&db_pool, &viewer, Scope::All).await.unwrap();

        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].post.content, "awoo");
        assert_eq!(mine[0].post.author_alias.as_deref(), Some("w2 alias"));
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn blocked_authors_are_hidden_both_ways() {
        let db_pool = test_pool().await;
        for id in ["a", "b", "c"] {
            add_profile(&db_pool, id, "cat").await;
        }
        post(&db_pool, "a", "from a").await;
        post(&db_pool, "b", "from b").await;
        block(&db_pool, "a", "b").await;

        let for_a = load_feed(&db_pool, &profile(&db_pool, "a").await, Scope::All).await.unwrap();
        let for_b = load_feed(&db_pool, &profile(&db_pool, "b").await, Scope::All).await.unwrap();
        let for_c = load_feed(&db_pool, &profile(&db_pool, "c").await, Scope::All).await.unwrap();

        assert!(for_a.iter().all(|p| p.post.user_id != "b"));
        assert!(for_b.iter().all(|p| p.post.user_id != "a"));
        assert_eq!(for_c.len(), 2);
    }

    #[tokio::test]
    async fn reaction_counts_and_own_reaction() {
        let db_pool = test_pool().await;
        for id in ["a", "b", "c"] {
            add_profile(&db_pool, id, "fox").await;
        }
        let post_id = post(&db_pool, "a", "look").await;
        let realtime = Realtime::new();
        react(&db_pool, &realtime, "b", &post_id, "🔥").await.unwrap();
        react(&db_pool, &realtime, "c", &post_id, "🔥").await.unwrap();
        react(&db_pool, &realtime, "a", &post_id, "🐾").await.unwrap();

        let feed = load_feed(&db_pool, &profile(&db_pool, "b").await, Scope::Mine).await.unwrap();
        let counts: HashMap<&str, i64> = feed[0].counts.iter().copied().collect();
        assert_eq!(counts["🔥"], 2);
        assert_eq!(counts["🐾"], 1);
        assert_eq!(counts["🌙"], 0);
        assert_eq!(feed[0].mine.as_deref(), Some("🔥"));
    }
}
