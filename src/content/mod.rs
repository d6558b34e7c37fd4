pub mod extractor;
pub mod fetcher;
pub mod guard;
pub mod sanitizer;

pub use extractor::{ContentExtractor, Readable};
pub use fetcher::ArticleFetcher;
pub use guard::UrlGuard;
pub use sanitizer::HtmlSanitizer;

use serde::{Deserialize, Serialize};

/// Readable, sanitized article returned by the full-article endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedArticle {
    pub title: String,
    pub byline: String,
    pub content: String,
    pub excerpt: String,
    pub length: usize,
}

#[derive(Debug, Clone)]
pub struct ContentSelectors {
    /// Containers that usually hold the article body, tried when readability finds nothing.
    pub article: Vec<String>,
    /// Elements pruned from the body before extraction.
    pub remove: Vec<String>,
}

impl Default for ContentSelectors {
    fn default() -> Self {
        Self {
            article: vec![
                "article".to_string(),
                "[itemprop=\"articleBody\"]".to_string(),
                ".post-content".to_string(),
                ".entry-content".to_string(),
                ".article-body".to_string(),
                "main".to_string(),
            ],
            remove: vec![
                ".advertisement".to_string(),
                ".ads".to_string(),
                ".ad".to_string(),
                ".social-share".to_string(),
                ".share".to_string(),
                ".comments".to_string(),
                ".sidebar".to_string(),
                ".related-posts".to_string(),
                ".newsletter".to_string(),
                "script".to_string(),
                "style".to_string(),
                "noscript".to_string(),
                "template".to_string(),
                "iframe".to_string(),
                "form".to_string(),
                "button".to_string(),
                "nav".to_string(),
                "aside".to_string(),
                "footer".to_string(),
                "header".to_string(),
            ],
        }
    }
}

pub(crate) fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            c => escaped.push(c),
        }
    }
    escaped
}

pub(crate) fn escape_attr(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            c => escaped.push(c),
        }
    }
    escaped
}

pub(crate) const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track", "wbr",
];
