use axum::response::{Html, IntoResponse, Response};

use crate::AppResult;

#[macro_export]
macro_rules! include_res {
    (bytes, $p:expr) => {
        include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/res", $p))
    };
    (str, $p:expr) => {
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/res", $p))
    };
}

/// Wraps a page body in the shared layout.
pub fn page(title: &str, body: &str) -> Html<String> {
    Html(
        include_res!(str, "/pages/layout.html")
            .replace("{title}", &escape(title))
            .replace("{body}", body)
    )
}

pub fn sorry(what: &str) -> AppResult<Response> {
    Ok(page(
        "Not found",
        &include_res!(str, "/pages/sorry.html").replace("{what}", &escape(what)),
    ).into_response())
}

pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Markdown to html. Raw html in the source is shown as text.
pub fn markdown(source: &str) -> String {
    use pulldown_cmark::{Event, Parser, Options};

    let parser = Parser::new_ext(source, Options::ENABLE_STRIKETHROUGH)
        .map(|event| match event {
            Event::Html(html) | Event::InlineHtml(html) => Event::Text(html),
            _ => event,
        });

    let mut html_output = String::new();
    pulldown_cmark::html::push_html(&mut html_output, parser);
    html_output
}

/// Renders a status banner for `?error=` and the success flags.
pub fn banner(error: Option<&str>, notice: Option<&str>) -> String {
    let mut out = String::new();
    if let Some(error) = error.filter(|e| !e.is_empty()) {
        out += &format!(r#"<p class="banner error">{}</p>"#, escape(error));
    }
    if let Some(notice) = notice {
        out += &format!(r#"<p class="banner ok">{}</p>"#, escape(notice));
    }
    out
}

pub fn format_ms(ms: i64) -> String {
    let format = time::macros::format_description!("[year]-[month]-[day] [hour]:[minute]");
    time::OffsetDateTime::from_unix_timestamp_nanos(ms as i128 * 1_000_000)
        .ok()
        .and_then(|t| t.format(&format).ok())
        .unwrap_or_default()
}
