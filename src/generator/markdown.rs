use std::sync::LazyLock;

use anyhow::Context;
use log::warn;
use maud::{html, PreEscaped};
use pulldown_cmark::{html::push_html, CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use regex::Regex;
use syntect::{
    highlighting::ThemeSet,
    html::{css_for_theme_with_class_style, ClassStyle, ClassedHTMLGenerator},
    parsing::{SyntaxReference, SyntaxSet},
    util::LinesWithEndings,
};

const CLASS_STYLE: ClassStyle = ClassStyle::Spaced;
const HIGHLIGHT_THEME: &str = "InspiredGitHub";

static SYNTAXES: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);

static DIAGRAM_DIV: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)<div class="mermaid">.*?</div>"#).unwrap());

fn highlight_source(syntax: &SyntaxReference, source: &str) -> Result<String, syntect::Error> {
    let mut generator =
        ClassedHTMLGenerator::new_with_class_style(syntax, &SYNTAXES, CLASS_STYLE);
    for line in LinesWithEndings::from(source) {
        generator.parse_html_for_line_which_includes_newline(line)?;
    }
    Ok(generator.finalize())
}

fn render_code_block(lang: &str, syntax: &SyntaxReference, source: &str) -> String {
    let highlighted = match highlight_source(syntax, source) {
        Ok(highlighted) => PreEscaped(highlighted),
        Err(e) => {
            warn!("highlighting {lang} block failed, emitting plain text: {e}");
            html! { (source) }
        }
    };
    html! {
        div.codehilite {
            pre { code.{ "language-" (lang) } { (highlighted) } }
        }
    }
    .into_string()
}

/// Highlights fenced blocks whose language syntect knows, producing
/// `codehilite` markup with classed spans. Other fences pass through.
fn highlight_code_blocks<'a>() -> impl FnMut(Event<'a>) -> Event<'a> {
    let mut code: Option<(String, &'static SyntaxReference, String)> = None;

    move |event| match event {
        Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(ref info))) => {
            let Some(lang) = info.split_whitespace().next() else {
                return event;
            };
            let Some(syntax) = SYNTAXES.find_syntax_by_token(lang) else {
                return event;
            };
            code = Some((lang.to_string(), syntax, String::new()));
            Event::Text("".into())
        }
        Event::Text(text) if code.is_some() => {
            if let Some((_, _, source)) = code.as_mut() {
                source.push_str(&text);
            }
            Event::Text("".into())
        }
        Event::End(TagEnd::CodeBlock) if code.is_some() => match code.take() {
            Some((lang, syntax, source)) => {
                Event::Html(render_code_block(&lang, syntax, &source).into())
            }
            None => Event::End(TagEnd::CodeBlock),
        },
        event => event,
    }
}

fn diagram_placeholder(i: usize) -> String {
    format!("<!-- BLOGEN_DIAGRAM_{i} -->")
}

/// Pulls `<div class="mermaid">` containers out of the Markdown so blank lines
/// inside a diagram cannot end the HTML block early.
fn extract_diagrams(md: &str) -> (String, Vec<String>) {
    let mut diagrams = vec![];
    let replaced = DIAGRAM_DIV.replace_all(md, |caps: &regex::Captures| {
        let placeholder = diagram_placeholder(diagrams.len());
        diagrams.push(caps[0].to_string());
        placeholder
    });
    (replaced.into_owned(), diagrams)
}

fn restore_diagrams(body_html: &mut String, diagrams: &[String]) {
    for (i, diagram) in diagrams.iter().enumerate() {
        let placeholder = diagram_placeholder(i);
        if let Some(pos) = body_html.find(&placeholder) {
            body_html.replace_range(pos..pos + placeholder.len(), diagram);
            continue;
        }
        // inside a code block the placeholder comes out escaped
        let escaped = html! { (placeholder) }.into_string();
        if let Some(pos) = body_html.find(&escaped) {
            let diagram = html! { (diagram) }.into_string();
            body_html.replace_range(pos..pos + escaped.len(), &diagram);
        }
    }
}

/// Converts a Markdown body to an HTML fragment. Raw HTML is passed through
/// untouched.
pub(crate) fn to_html(md: &str, highlight: bool) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);

    let (md, diagrams) = extract_diagrams(md);
    let parser = Parser::new_ext(&md, options);
    let mut body_html = String::with_capacity(md.len() * 2);
    if highlight {
        push_html(&mut body_html, parser.map(highlight_code_blocks()));
    } else {
        push_html(&mut body_html, parser);
    }
    restore_diagrams(&mut body_html, &diagrams);
    body_html
}

/// Stylesheet for the classed spans emitted by highlighted code blocks.
pub(crate) fn highlight_css() -> anyhow::Result<String> {
    let themes = ThemeSet::load_defaults();
    let theme = themes
        .themes
        .get(HIGHLIGHT_THEME)
        .with_context(|| format!("syntect has no theme {HIGHLIGHT_THEME:?}"))?;
    Ok(css_for_theme_with_class_style(theme, CLASS_STYLE)?)
}

/// Returns the inner HTML of the first `<p>` element, or the whole fragment
/// when there is none.
pub(crate) fn first_paragraph(fragment: &str) -> &str {
    let mut search = 0;
    while let Some(found) = fragment[search..].find("<p") {
        let tag_start = search + found;
        let after = &fragment[tag_start + 2..];
        // skip <pre>, <param> and friends
        if after.starts_with('>') || after.starts_with(char::is_whitespace) {
            let Some(tag_len) = after.find('>') else {
                break;
            };
            let body_start = tag_start + 2 + tag_len + 1;
            let body_end = fragment[body_start..]
                .find("</p>")
                .map_or(fragment.len(), |i| body_start + i);
            return fragment[body_start..body_end].trim();
        }
        search = tag_start + 2;
    }
    fragment.trim()
}
