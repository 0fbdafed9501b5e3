//! HTML → normalized plain text.
//!
//! Markup is stripped, whitespace runs collapse to single spaces, and sentence
//! fragments are re-joined with single spaces.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Node};

/// Elements whose text never reaches the output.
const SKIP_TAGS: &[&str] = &["script", "style", "noscript", "template", "svg"];

/// Elements that start a new run of text.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "details", "div", "dl", "dt",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header",
    "hr", "li", "main", "nav", "ol", "p", "pre", "section", "summary", "table", "td", "th",
    "tr", "ul",
];

/// Strip markup from `raw` and normalize the remaining text.
pub fn clean_html(raw: &str) -> String {
    let doc = Html::parse_document(raw);
    let mut text = String::with_capacity(raw.len() / 2);

    for node in doc.tree.root().descendants() {
        match node.value() {
            Node::Element(el) if BLOCK_TAGS.contains(&el.name()) => text.push(' '),
            Node::Text(t) => {
                let hidden = node.ancestors().any(|a| {
                    matches!(a.value(), Node::Element(el) if SKIP_TAGS.contains(&el.name()))
                });
                if !hidden {
                    text.push_str(t);
                }
            }
            _ => {}
        }
    }

    normalize_text(&text)
}

/// Collapse whitespace and re-join sentences with single spaces.
pub fn normalize_text(text: &str) -> String {
    static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

    let collapsed = WS_RE.replace_all(text.trim(), " ");
    split_sentences(&collapsed).join(" ").trim().to_string()
}

/// Split text after `.`, `!`, or `?` followed by spaces.
///
/// Sentences keep their terminal punctuation; the separating spaces are dropped.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let end = i + c.len_utf8();
        if chars.peek().is_some_and(|&(_, next)| next == ' ') {
            sentences.push(&text[start..end]);
            while chars.peek().is_some_and(|&(_, next)| next == ' ') {
                chars.next();
            }
            start = chars.peek().map_or(text.len(), |&(j, _)| j);
        }
    }

    if start < text.len() {
        sentences.push(&text[start..]);
    }
    sentences
}
