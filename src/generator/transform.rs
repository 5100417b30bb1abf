//! Rewrites applied to the Markdown body before it reaches pulldown-cmark.

use std::sync::LazyLock;

use log::debug;
use maud::{html, PreEscaped};
use regex::{Captures, Regex};

static MERMAID_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```mermaid\s*(.*?)\s*```").unwrap());

// Fenced blocks and code spans are matched first so images inside them are
// skipped.
static IMAGE_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)(```.*?```|`[^`\n]*`)|!\[([^\]]*)\]\(\s*([^)\s]+)([^)]*)\)").unwrap()
});

static ABSOLUTE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[A-Za-z][A-Za-z0-9+.\-]*:|//)").unwrap());

/// Wraps every ```` ```mermaid ```` fence in a `<div class="mermaid">` so the
/// diagram can be drawn client side. The diagram source is kept verbatim.
pub(crate) fn convert_mermaid_blocks(md: &str) -> String {
    MERMAID_BLOCK
        .replace_all(md, |caps: &Captures| {
            html! { div.mermaid { (PreEscaped(&caps[1])) } }.into_string()
        })
        .into_owned()
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Prefixes relative `![alt](path)` targets with `base_url`. Targets that
/// already carry a scheme (or are protocol relative) are left alone, and so
/// is anything inside code.
pub(crate) fn rewrite_image_paths(md: &str, base_url: &str) -> String {
    IMAGE_REF
        .replace_all(md, |caps: &Captures| {
            if caps.get(1).is_some() {
                return caps[0].to_string();
            }
            let path = &caps[3];
            if ABSOLUTE_URL.is_match(path) {
                return caps[0].to_string();
            }
            let url = join_url(base_url, path);
            debug!("image {path} -> {url}");
            format!("![{}]({}{})", &caps[2], url, &caps[4])
        })
        .into_owned()
}
