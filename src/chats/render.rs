use crate::{db, include_res, res::{escape, format_ms}};

pub fn message_item(message: &db::Message, viewer_id: &str, back_to: &str) -> String {
    let mine = message.sender_id == viewer_id;
    let report = if mine {
        String::new()
    } else {
        include_res!(str, "/pages/chats/report_message.html")
            .replace("{redirect_to}", &escape(back_to))
            .replace("{id}", &escape(&message.id))
    };
    let alias = message.sender_alias.as_deref().map(str::trim).filter(|a| !a.is_empty()).unwrap_or("Anon");

    include_res!(str, "/pages/chats/message.html")
        .replace("{side}", if mine { "mine" } else { "theirs" })
        .replace("{created_at}", &message.created_at.to_string())
        .replace("{seq}", &message.seq.to_string())
        .replace("{time}", &format_ms(message.created_at))
        .replace("{alias}", &escape(alias))
        .replace("{report}", &report)
        .replace("{content}", &escape(&message.content))
        .replace("{id}", &escape(&message.id))
}

/// Message list, composer and the script keeping them live.
pub fn panel(chat_id: &str, viewer_id: &str, messages: &[db::Message], back_to: &str) -> String {
    let items: String = messages.iter()
        .map(|message| message_item(message, viewer_id, back_to))
        .collect();

    include_res!(str, "/pages/chats/panel.html")
        .replace("{messages}", &items)
        .replace("{viewer_id}", &escape(viewer_id))
        .replace("{chat_id}", &escape(chat_id))
}
