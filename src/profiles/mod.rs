mod edit;
mod onboarding;
mod page;

use axum::{extract::DefaultBodyLimit, routing::get, Router};
use rand::seq::IndexedRandom;

use crate::{feed::MAX_UPLOAD, AppState};

pub use edit::update_profile;
pub use onboarding::complete_onboarding;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/onboarding", get(onboarding::onboarding_page).post(onboarding::onboarding))
        .route("/profile", get(page::profile))
        .route(
            "/profile/edit",
            get(edit::edit_page).post(edit::edit).layer(DefaultBodyLimit::max(MAX_UPLOAD)),
        )
}

/// What a user fills in about themselves.
#[derive(Debug, Clone, Default)]
pub struct ProfileFields {
    pub alias: String,
    pub therian_type: String,
    pub animal_identity: String,
    pub bio: String,
    pub tags: String,
    pub safe_mode: bool,
}

impl ProfileFields {
    fn optional(value: &str) -> Option<&str> {
        Some(value.trim()).filter(|v| !v.is_empty())
    }
}

/// A throwaway alias offered on the onboarding form.
pub fn suggest_alias() -> String {
    let adjectives = [
        "Quick", "Lazy", "Mysterious", "Jolly", "Brave", "Silent", "Witty", "Fierce",
        "Clever", "Gentle", "Wild", "Calm", "Bold", "Shy", "Proud", "Happy", "Moonlit",
        "Eager", "Fancy", "Rusty", "Golden", "Silver", "Bright", "Dark", "Lucky",
    ];
    let nouns = [
        "Fox", "Bear", "Eagle", "Wolf", "Dragon", "Tiger", "Lion", "Owl", "Rabbit",
        "Falcon", "Hawk", "Shark", "Panda", "Kitten", "Puppy", "Phoenix", "Griffin",
        "Lynx", "Turtle", "Dolphin", "Whale", "Coyote", "Raven", "Stag",
    ];

    let mut rng = rand::rng();
    format!(
        "{} {}",
        adjectives.choose(&mut rng).copied().unwrap_or("Quiet"),
        nouns.choose(&mut rng).copied().unwrap_or("Wolf"),
    )
}
