//! The analysis page and its route parameter.
//!
//! The page accepts one optional path segment, a FEN string, which seeds
//! the board and the engine. The router percent-decodes the segment, so
//! `/rnbqkbnr%2Fpppppppp%2F...%20w%20KQkq%20-%200%201` arrives here as
//! the plain FEN. Nothing is validated or normalised: an illegal position
//! is for the engine and UI to reject.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Page shell, no position |
//! | `GET` | `/{fen}` | Page shell seeded with `fen` |
//! | `GET` | `/__data.json` | Page data, no position |
//! | `GET` | `/{fen}/__data.json` | Page data for `fen` |

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::Uri;
use axum::response::Html;
use axum::Json;

use crate::error::PageError;
use crate::state::AppState;

/// Initial state handed to the page.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PageData {
    /// Position from the URL, exactly as given.
    pub fen: Option<String>,
}

/// Turn the route parameter into page data. Absence is not an error.
pub const fn load(fen: Option<String>) -> PageData {
    PageData { fen }
}

/// `GET /`
pub async fn index(State(state): State<Arc<AppState>>) -> Result<Html<String>, PageError> {
    render(&state, &load(None)).map(Html)
}

/// `GET /{fen}`
pub async fn show(
    State(state): State<Arc<AppState>>,
    Path(fen): Path<String>,
) -> Result<Html<String>, PageError> {
    render(&state, &load(Some(fen))).map(Html)
}

/// `GET /__data.json`
pub async fn index_data() -> Json<PageData> {
    Json(load(None))
}

/// `GET /{fen}/__data.json`
pub async fn show_data(Path(fen): Path<String>) -> Json<PageData> {
    Json(load(Some(fen)))
}

/// Fallback for paths that match neither a file nor a page.
pub async fn not_found(uri: Uri) -> PageError {
    PageError::NotFound(uri.path().to_owned())
}

/// Render the HTML shell with `data` embedded as JSON.
///
/// # Errors
///
/// Returns [`PageError::Serialization`] if the data cannot be encoded.
pub fn render(state: &AppState, data: &PageData) -> Result<String, PageError> {
    let json = script_safe(&serde_json::to_string(data)?);
    let title = escape_html(&state.page.title);

    let mut head: String = state
        .preload_urls()
        .map(|url| {
            format!(
                "\n    <link rel=\"preload\" href=\"{}\" as=\"fetch\" type=\"application/wasm\" crossorigin>",
                escape_html(url)
            )
        })
        .collect();
    if let Some(entry) = &state.page.entry_script {
        head.push_str(&format!(
            "\n    <script type=\"module\" src=\"{}\"></script>",
            escape_html(entry)
        ));
    }

    Ok(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{title}</title>{head}
</head>
<body>
    <div id="app"></div>
    <script type="application/json" id="page-data">{json}</script>
</body>
</html>
"#
    ))
}

/// Escape characters that could end a `<script>` element or open a comment.
/// The result is still valid JSON.
fn script_safe(json: &str) -> String {
    json.replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026")
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
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

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rookery_config::{AssetRule, SiteConfig};

    use super::*;

    const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    fn state() -> AppState {
        AppState::from_config(&SiteConfig::default()).unwrap()
    }

    fn embedded_json(html: &str) -> serde_json::Value {
        let start = html.find("id=\"page-data\">").unwrap() + "id=\"page-data\">".len();
        let end = html[start..].find("</script>").unwrap() + start;
        serde_json::from_str(&html[start..end]).unwrap()
    }

    #[test]
    fn load_without_segment_is_empty() {
        assert_eq!(load(None), PageData { fen: None });
        assert_eq!(serde_json::to_value(load(None)).unwrap(), serde_json::json!({ "fen": null }));
    }

    #[test]
    fn load_keeps_fen_verbatim() {
        let data = load(Some(START_FEN.to_owned()));
        assert_eq!(data.fen.as_deref(), Some(START_FEN));

        let garbage = load(Some(String::from("not a fen")));
        assert_eq!(garbage.fen.as_deref(), Some("not a fen"));
    }

    #[test]
    fn render_embeds_page_data() {
        let html = render(&state(), &load(Some(START_FEN.to_owned()))).unwrap();
        assert_eq!(embedded_json(&html)["fen"], START_FEN);
        assert!(html.contains(
            "href=\"/_app/immutable/workers/stockfish-nnue-16.wasm\" as=\"fetch\""
        ));
    }

    #[test]
    fn render_cannot_break_out_of_script() {
        let hostile = "</script><script>alert(1)</script>";
        let html = render(&state(), &load(Some(hostile.to_owned()))).unwrap();

        assert_eq!(html.matches("</script>").count(), 1);
        assert_eq!(embedded_json(&html)["fen"], hostile);
    }

    #[test]
    fn render_escapes_title_and_entry() {
        let mut state = state();
        state.page.title = String::from("Kings & <Queens>");
        state.page.entry_script = Some(String::from("/app.js"));

        let html = render(&state, &load(None)).unwrap();
        assert!(html.contains("<title>Kings &amp; &lt;Queens&gt;</title>"));
        assert!(html.contains("<script type=\"module\" src=\"/app.js\"></script>"));
    }

    #[test]
    fn render_lists_every_preload_before_entry() {
        let mut config = SiteConfig::default();
        config.build.assets.push(AssetRule::new("vendor/lite.wasm", "workers"));
        config.build.assets.push(AssetRule::new("vendor/book.bin", "books"));
        config.page.entry_script = Some(String::from("/entry.js"));
        let state = AppState::from_config(&config).unwrap();

        let html = render(&state, &load(None)).unwrap();
        let nnue = html.find("/_app/immutable/workers/stockfish-nnue-16.wasm").unwrap();
        let lite = html.find("href=\"/workers/lite.wasm\"").unwrap();
        let entry = html.find("src=\"/entry.js\"").unwrap();

        assert!(nnue < lite && lite < entry);
        assert_eq!(html.matches("rel=\"preload\"").count(), 2);
        assert!(!html.contains("book.bin"));
    }
}
