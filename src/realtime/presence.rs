use serde::Serialize;

/// What one open chat view reports about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresenceMeta {
    pub user_id: String,
    pub alias: String,
    pub typing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypingPeer {
    pub user_id: String,
    pub alias: String,
}

/// Peers currently typing, excluding `local_user`. A user with several open
/// views is listed once.
pub fn typing_peers(snapshot: &[PresenceMeta], local_user: &str) -> Vec<TypingPeer> {
    let mut peers: Vec<TypingPeer> = Vec::new();
    for meta in snapshot {
        if !meta.typing || meta.user_id == local_user {
            continue;
        }
        if peers.iter().any(|p| p.user_id == meta.user_id) {
            continue;
        }
        let alias = match meta.alias.trim() {
            "" => "Anon".to_owned(),
            alias => alias.to_owned(),
        };
        peers.push(TypingPeer { user_id: meta.user_id.clone(), alias });
    }
    peers
}
