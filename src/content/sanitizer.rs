use std::collections::{HashMap, HashSet};

use scraper::{Html, Node};
use scraper::node::Element;

use super::{escape_attr, escape_text, VOID_ELEMENTS};

type NodeRef<'a> = ego_tree::NodeRef<'a, Node>;

const PROSE_TAGS: &[&str] = &[
    "address", "article", "aside", "footer", "header", "h1", "h2", "h3", "h4", "h5", "h6", "hgroup",
    "main", "nav", "section", "blockquote", "dd", "div", "dl", "dt", "figcaption", "figure", "hr",
    "li", "ol", "p", "pre", "ul", "a", "abbr", "b", "bdi", "bdo", "br", "cite", "code", "data", "dfn",
    "em", "i", "kbd", "mark", "q", "s", "samp", "small", "span", "strong", "sub", "sup", "time", "u",
    "var", "wbr", "caption", "col", "colgroup", "table", "tbody", "td", "tfoot", "th", "thead", "tr",
    "img",
];

/// Elements dropped together with everything inside them.
const DISCARD_WITH_CONTENT: &[&str] = &[
    "script", "style", "iframe", "frame", "frameset", "object", "embed", "noscript", "template",
    "textarea", "select", "option", "svg", "math", "head", "title", "applet", "canvas",
];

const LINK_SCHEMES: &[&str] = &["http", "https", "mailto", "tel"];
const IMAGE_SCHEMES: &[&str] = &["http", "https"];

/// Allow-list HTML sanitizer.
///
/// Disallowed elements are unwrapped (their text survives) and disallowed
/// attributes are dropped. Every anchor is forced to open in a new browsing
/// context without referrer or opener. Output is safe to inject verbatim.
#[derive(Debug, Clone)]
pub struct HtmlSanitizer {
    allowed_tags: HashSet<&'static str>,
    allowed_attributes: HashMap<&'static str, &'static [&'static str]>,
}

impl Default for HtmlSanitizer {
    fn default() -> Self {
        let mut allowed_attributes: HashMap<&'static str, &'static [&'static str]> = HashMap::new();
        allowed_attributes.insert("a", &["href", "name", "target", "rel"]);
        allowed_attributes.insert("img", &["src", "alt", "title"]);

        Self {
            allowed_tags: PROSE_TAGS.iter().copied().collect(),
            allowed_attributes,
        }
    }
}

impl HtmlSanitizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sanitize(&self, html: &str) -> String {
        let fragment = Html::parse_fragment(html);
        let mut out = String::with_capacity(html.len());

        for child in fragment.root_element().children() {
            self.write_node(child, &mut out);
        }

        out
    }

    fn write_node(&self, node: NodeRef<'_>, out: &mut String) {
        match node.value() {
            Node::Text(text) => {
                let text: &str = text;
                out.push_str(&escape_text(text));
            }
            Node::Element(element) => self.write_element(node, element, out),
            _ => {}
        }
    }

    fn write_element(&self, node: NodeRef<'_>, element: &Element, out: &mut String) {
        let name = element.name();

        if DISCARD_WITH_CONTENT.contains(&name) {
            return;
        }

        if !self.allowed_tags.contains(name) {
            for child in node.children() {
                self.write_node(child, out);
            }
            return;
        }

        out.push('<');
        out.push_str(name);
        for (attr, value) in self.filter_attributes(name, element) {
            out.push(' ');
            out.push_str(attr);
            out.push_str("=\"");
            out.push_str(&escape_attr(&value));
            out.push('"');
        }
        out.push('>');

        if VOID_ELEMENTS.contains(&name) {
            return;
        }

        for child in node.children() {
            self.write_node(child, out);
        }

        out.push_str("</");
        out.push_str(name);
        out.push('>');
    }

    fn filter_attributes(&self, tag: &str, element: &Element) -> Vec<(&'static str, String)> {
        let allowed = self.allowed_attributes.get(tag).copied().unwrap_or(&[]);
        let mut attrs = Vec::new();

        for &attr in allowed {
            if tag == "a" && (attr == "target" || attr == "rel") {
                continue;
            }

            let Some(value) = element.attr(attr) else {
                continue;
            };

            let value = value.trim();
            let keep = match (tag, attr) {
                ("a", "href") => has_allowed_scheme(value, LINK_SCHEMES),
                ("img", "src") => has_allowed_scheme(value, IMAGE_SCHEMES),
                _ => true,
            };

            if keep {
                attrs.push((attr, value.to_string()));
            }
        }

        if tag == "a" {
            attrs.push(("target", "_blank".to_string()));
            attrs.push(("rel", "noopener noreferrer".to_string()));
        }

        attrs
    }
}

/// Relative URLs pass; absolute ones must use one of `schemes`.
fn has_allowed_scheme(value: &str, schemes: &[&str]) -> bool {
    // browsers ignore control characters and whitespace inside schemes
    let compact: String = value
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();

    if compact.starts_with("//") {
        return true;
    }

    match compact.find(|c| matches!(c, ':' | '/' | '?' | '#')) {
        Some(idx) if compact[idx..].starts_with(':') => {
            schemes.contains(&&compact[..idx])
        }
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sanitize(html: &str) -> String {
        HtmlSanitizer::new().sanitize(html)
    }

    #[test]
    fn test_strips_script_iframe_and_handlers() {
        let html = r#"<p>Hello</p><script>alert('x')</script><iframe src="https://evil.example"></iframe><a href="https://example.com" onclick="steal()">link</a>"#;
        let clean = sanitize(html);

        assert!(!clean.contains("<script"));
        assert!(!clean.contains("alert"));
        assert!(!clean.contains("<iframe"));
        assert!(!clean.contains("onclick"));
        assert!(clean.contains("<p>Hello</p>"));
        assert!(clean.contains(
            r#"<a href="https://example.com" target="_blank" rel="noopener noreferrer">link</a>"#
        ));
    }

    #[test]
    fn test_every_anchor_is_rewritten() {
        let clean = sanitize(r#"<a name="top">a</a><a href="/x" target="_self" rel="opener">b</a>"#);
        assert_eq!(
            clean,
            concat!(
                r#"<a name="top" target="_blank" rel="noopener noreferrer">a</a>"#,
                r#"<a href="/x" target="_blank" rel="noopener noreferrer">b</a>"#
            )
        );
    }

    #[test]
    fn test_disallowed_tags_are_unwrapped() {
        let clean = sanitize("<div><font color=\"red\">Red <blink>text</blink></font></div>");
        assert_eq!(clean, "<div>Red text</div>");
    }

    #[test]
    fn test_attributes_are_filtered() {
        let clean = sanitize(
            r#"<p class="lead" style="color:red" id="x">Text</p><img src="https://example.com/a.png" alt="A" title="T" onerror="x()" width="10">"#,
        );
        assert_eq!(
            clean,
            r#"<p>Text</p><img src="https://example.com/a.png" alt="A" title="T">"#
        );
    }

    #[test]
    fn test_dangerous_schemes_are_dropped() {
        let clean = sanitize(
            r#"<a href="javascript:alert(1)">x</a><a href=" JaVa&#x09;Script:alert(1)">y</a><img src="data:image/png;base64,AAAA">"#,
        );
        assert!(!clean.to_lowercase().contains("javascript"));
        assert!(!clean.contains("data:"));
        assert!(clean.contains(r#"<a target="_blank" rel="noopener noreferrer">x</a>"#));
        assert!(clean.contains("<img>"));
    }

    #[test]
    fn test_text_is_escaped() {
        let clean = sanitize("<p>1 &lt; 2 &amp; &lt;script&gt;</p>");
        assert_eq!(clean, "<p>1 &lt; 2 &amp; &lt;script&gt;</p>");
    }

    #[test]
    fn test_comments_are_removed() {
        assert_eq!(sanitize("<p>a<!-- secret -->b</p>"), "<p>ab</p>");
    }

    #[test]
    fn test_figure_is_kept() {
        let clean = sanitize(
            r#"<figure><img src="https://example.com/p.jpg" alt="P"><figcaption>Caption</figcaption></figure>"#,
        );
        assert_eq!(
            clean,
            r#"<figure><img src="https://example.com/p.jpg" alt="P"><figcaption>Caption</figcaption></figure>"#
        );
    }

    #[test]
    fn test_scheme_detection() {
        assert!(has_allowed_scheme("https://example.com", LINK_SCHEMES));
        assert!(has_allowed_scheme("mailto:a@example.com", LINK_SCHEMES));
        assert!(has_allowed_scheme("/relative", LINK_SCHEMES));
        assert!(has_allowed_scheme("//cdn.example.com/x", LINK_SCHEMES));
        assert!(has_allowed_scheme("page?x=a:b", LINK_SCHEMES));
        assert!(!has_allowed_scheme("vbscript:msgbox", LINK_SCHEMES));
        assert!(!has_allowed_scheme("mailto:a@example.com", IMAGE_SCHEMES));
    }
}
