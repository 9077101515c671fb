//! Redirects carrying a status back to the page that submitted a form.

use axum::response::Redirect;
use serde::Deserialize;
use url::form_urlencoded;

use crate::res;

/// Only same-site paths are honoured; anything else goes to the feed.
/// Browsers read both `//` and `/\` as protocol-relative.
pub fn clean_redirect(raw: &str) -> &str {
    if raw.starts_with('/') && !raw.starts_with("//") && !raw.starts_with("/\\") { raw } else { "/feed" }
}

pub fn location(path: &str, key: &str, value: &str) -> String {
    let separator = if path.contains('?') { '&' } else { '?' };
    let encoded: String = form_urlencoded::Serializer::new(String::new())
        .append_pair(key, value)
        .finish();
    format!("{path}{separator}{encoded}")
}

pub fn error(path: &str, message: impl std::fmt::Display) -> Redirect {
    Redirect::to(&location(path, "error", &message.to_string()))
}

pub fn flag(path: &str, key: &str, value: &str) -> Redirect {
    Redirect::to(&location(path, key, value))
}

/// Status flags a page may be redirected back with.
#[derive(Debug, Default, Deserialize)]
pub struct Status {
    pub error: Option<String>,
    pub matched: Option<String>,
    pub blocked: Option<String>,
    pub reported: Option<String>,
    pub joined: Option<String>,
    pub created: Option<String>,
    pub updated: Option<String>,
}

impl Status {
    pub fn notice(&self) -> Option<&'static str> {
        let set = |flag: &Option<String>| flag.as_deref().is_some_and(|v| !v.is_empty());
        if set(&self.matched) {
            Some("It's a match! Say hi in your chats.")
        } else if set(&self.blocked) {
            Some("User blocked.")
        } else if set(&self.reported) {
            Some("Thanks, the report was sent.")
        } else if set(&self.joined) {
            Some("You joined the meetup.")
        } else if set(&self.created) {
            Some("Created.")
        } else if set(&self.updated) {
            Some("Profile updated.")
        } else {
            None
        }
    }

    pub fn banner(&self) -> String {
        res::banner(self.error.as_deref(), self.notice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn foreign_targets_fall_back_to_feed() {
        assert_eq!(clean_redirect("/chats/1"), "/chats/1");
        assert_eq!(clean_redirect("https://evil.example"), "/feed");
        assert_eq!(clean_redirect("//evil.example"), "/feed");
        assert_eq!(clean_redirect("/\\evil.example"), "/feed");
    }

    #[test]
    fn messages_are_encoded_and_joined() {
        assert_eq!(location("/packs", "error", "Invalid swipe request"), "/packs?error=Invalid+swipe+request");
        assert_eq!(location("/feed?scope=all", "blocked", "1"), "/feed?scope=all&blocked=1");
    }

    #[test]
    fn status_banner_prefers_error_and_first_flag() {
        let status = Status { error: Some("<nope>".into()), matched: Some("1".into()), ..Default::default() };
        let banner = status.banner();
        assert!(banner.contains("&lt;nope&gt;"));
        assert!(banner.contains("match"));
        assert!(Status::default().banner().is_empty());
    }
}
