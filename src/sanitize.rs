use std::collections::HashSet;
use std::sync::OnceLock;

use lol_html::{RewriteStrSettings, element, rewrite_str};
use regex::Regex;

// Basic text/formatting elements only. Anything outside this list is
// unwrapped (its children survive, the tag does not); the executable
// element families below are removed together with their content.
const ALLOWED_TAGS: &[&str] = &[
    "a", "b", "blockquote", "br", "code", "em", "h1", "h2", "h3", "h4", "h5", "h6", "i", "li",
    "ol", "p", "pre", "span", "strong", "u", "ul",
];

const DROP_WITH_CONTENT: &[&str] = &[
    "script", "style", "iframe", "object", "embed", "form", "svg", "math", "template", "title",
];

fn allowed_tags() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| ALLOWED_TAGS.iter().copied().collect())
}

fn dropped_tags() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| DROP_WITH_CONTENT.iter().copied().collect())
}

fn script_or_data_url() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^\s*(?:\w+script|data):").expect("valid regex"))
}

fn tag_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid regex"))
}

fn href_is_safe(value: &str) -> bool {
    // control/whitespace tricks like "java\tscript:" collapse first
    let compact: String = value.chars().filter(|c| !c.is_control()).collect();
    !script_or_data_url().is_match(&compact)
}

/// Sanitize user-supplied rich text down to an allow-listed subset.
///
/// Never renders raw user HTML: unknown tags are unwrapped, executable
/// content is removed outright, and every attribute except a safe `href`
/// on anchors is stripped (which kills `on*` handlers and inline styles).
/// Invalid markup is repaired best-effort rather than rejected; a rewriter
/// failure fails closed to an empty string.
pub fn sanitize_html(input: &str) -> String {
    let settings = RewriteStrSettings {
        element_content_handlers: vec![element!("*", |el| {
            let tag = el.tag_name().to_ascii_lowercase();

            if dropped_tags().contains(tag.as_str()) {
                el.remove();
                return Ok(());
            }
            if !allowed_tags().contains(tag.as_str()) {
                el.remove_and_keep_content();
                return Ok(());
            }

            let names: Vec<String> = el.attributes().iter().map(|attr| attr.name()).collect();
            for name in names {
                let keep = tag == "a"
                    && name == "href"
                    && el
                        .get_attribute("href")
                        .is_some_and(|value| href_is_safe(&value));
                if !keep {
                    el.remove_attribute(&name);
                }
            }
            Ok(())
        })],
        ..RewriteStrSettings::new()
    };

    rewrite_str(input, settings).unwrap_or_default()
}

/// Reduce rich text to plain text for contexts that cannot host markup at
/// all (SVG `<text>` content, summaries).
pub fn strip_tags(input: &str) -> String {
    tag_pattern().replace_all(&sanitize_html(input), "").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_tags_are_removed_with_their_content() {
        let out = sanitize_html("<script>alert(1)</script><p>ok</p>");
        assert_eq!(out, "<p>ok</p>");
    }

    #[test]
    fn event_handler_attributes_are_stripped() {
        let out = sanitize_html(r#"<p onclick="steal()" style="color:red">hi</p>"#);
        assert_eq!(out, "<p>hi</p>");
    }

    #[test]
    fn unknown_tags_are_unwrapped_not_dropped() {
        let out = sanitize_html("<article><b>kept</b></article>");
        assert_eq!(out, "<b>kept</b>");
    }

    #[test]
    fn javascript_hrefs_are_stripped_but_https_survive() {
        let out = sanitize_html(r#"<a href="javascript:alert(1)">x</a>"#);
        assert_eq!(out, "<a>x</a>");

        let out = sanitize_html(r#"<a href="https://example.com/docs">x</a>"#);
        assert_eq!(out, r#"<a href="https://example.com/docs">x</a>"#);
    }

    #[test]
    fn data_urls_are_rejected() {
        let out = sanitize_html(r#"<a href="data:text/html;base64,xyz">x</a>"#);
        assert_eq!(out, "<a>x</a>");
    }

    #[test]
    fn iframe_and_style_blocks_vanish() {
        let out = sanitize_html("<style>p{}</style><iframe src=\"x\"></iframe>plain");
        assert_eq!(out, "plain");
    }

    #[test]
    fn strip_tags_yields_plain_text() {
        let out = strip_tags("<p>read <b>path</b></p><script>no()</script>");
        assert_eq!(out, "read path");
    }
}
