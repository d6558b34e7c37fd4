use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use tracing::debug;
use url::Url;

use super::{escape_attr, escape_text, ContentSelectors, VOID_ELEMENTS};
use crate::error::{Error, Result};

type NodeRef<'a> = ego_tree::NodeRef<'a, Node>;

const MIN_CONTENT_LEN: usize = 25;
const MAX_BYLINE_LEN: usize = 100;
const BLANK_BASE: &str = "about:blank";

/// Main content of a page, before sanitization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Readable {
    pub title: Option<String>,
    pub byline: Option<String>,
    pub excerpt: Option<String>,
    /// HTML of the selected content nodes, links resolved against the page URL.
    pub content: String,
    /// Characters of visible text in `content`, whitespace collapsed.
    pub text_length: usize,
}

/// Readable-content extractor.
///
/// The page body is cleaned first: ads, navigation and scripts matching
/// the remove selectors are pruned, links are made absolute and lazy
/// images get a real `src`. `readability` then picks the main content.
/// When it finds nothing usable the article selectors are tried, then the
/// cleaned body itself.
pub struct ContentExtractor {
    selectors: ContentSelectors,
    compiled: CompiledSelectors,
    regex_patterns: RegexPatterns,
}

struct CompiledSelectors {
    body: Selector,
    paragraph: Selector,
    article: Selector,
    remove: Selector,
    title: Selector,
    heading: Selector,
    byline: Selector,
    meta_title: Vec<Selector>,
    meta_author: Vec<Selector>,
    meta_description: Vec<Selector>,
}

#[derive(Debug)]
struct RegexPatterns {
    whitespace: Regex,
    title_separator: Regex,
    attribute_name: Regex,
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::ExtractionFailed(format!("Invalid selector {}: {:?}", css, e)))
}

fn selector_list(list: &[&str]) -> Result<Vec<Selector>> {
    list.iter().map(|css| selector(css)).collect()
}

fn regex(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::ExtractionFailed(e.to_string()))
}

impl CompiledSelectors {
    fn new(selectors: &ContentSelectors) -> Result<Self> {
        Ok(Self {
            body: selector("body")?,
            paragraph: selector("p")?,
            article: selector(&selectors.article.join(", "))?,
            remove: selector(&selectors.remove.join(", "))?,
            title: selector("title")?,
            heading: selector("h1")?,
            byline: selector("[rel=\"author\"], [itemprop=\"author\"], .byline, .author")?,
            meta_title: selector_list(&[
                "meta[property=\"og:title\"]",
                "meta[name=\"twitter:title\"]",
            ])?,
            meta_author: selector_list(&[
                "meta[name=\"author\"]",
                "meta[property=\"article:author\"]",
            ])?,
            meta_description: selector_list(&[
                "meta[name=\"description\"]",
                "meta[property=\"og:description\"]",
                "meta[name=\"twitter:description\"]",
            ])?,
        })
    }
}

impl RegexPatterns {
    fn new() -> Result<Self> {
        Ok(Self {
            whitespace: regex(r"\s+")?,
            title_separator: regex(r"\s[|\-–—\\/>»]\s")?,
            attribute_name: regex(r"^[a-zA-Z_:][a-zA-Z0-9_:.\-]*$")?,
        })
    }
}

impl ContentExtractor {
    pub fn new() -> Result<Self> {
        Self::with_selectors(ContentSelectors::default())
    }

    pub fn with_selectors(selectors: ContentSelectors) -> Result<Self> {
        Ok(Self {
            compiled: CompiledSelectors::new(&selectors)?,
            selectors,
            regex_patterns: RegexPatterns::new()?,
        })
    }

    pub fn selectors(&self) -> &ContentSelectors {
        &self.selectors
    }

    /// Isolates the readable part of a full HTML page.
    pub fn extract(&self, html: &str, base_url: Option<&Url>) -> Result<Readable> {
        let document = Html::parse_document(html);
        let cleaned = self.clean_body(&document, base_url);

        let content = self
            .readability_content(&cleaned, base_url)
            .or_else(|| self.fallback_content(&cleaned))
            .ok_or_else(|| Error::ExtractionFailed("No readable content found".to_string()))?;

        let fragment = Html::parse_fragment(&content);
        let text = self.normalize(&fragment.root_element().text().collect::<String>());
        if text.is_empty() {
            return Err(Error::ExtractionFailed("Extracted content is empty".to_string()));
        }

        let excerpt = self
            .first_meta(&document, &self.compiled.meta_description)
            .or_else(|| self.first_paragraph(&fragment));

        Ok(Readable {
            title: self.extract_title(&document),
            byline: self.extract_byline(&document),
            excerpt,
            content,
            text_length: text.chars().count(),
        })
    }

    /// Serializes the page body without the pruned elements.
    fn clean_body(&self, document: &Html, base_url: Option<&Url>) -> String {
        let mut out = String::from("<html><body>");

        if let Some(body) = document.select(&self.compiled.body).next() {
            for child in body.children() {
                self.render(child, base_url, &mut out);
            }
        }

        out.push_str("</body></html>");
        out
    }

    fn readability_content(&self, cleaned: &str, base_url: Option<&Url>) -> Option<String> {
        let url = match base_url {
            Some(url) => url.clone(),
            None => Url::parse(BLANK_BASE).ok()?,
        };

        match readability::extractor::extract(&mut cleaned.as_bytes(), &url) {
            Ok(product) if self.normalize(&product.text).chars().count() >= MIN_CONTENT_LEN => {
                Some(product.content)
            }
            Ok(_) => {
                debug!(url = %url, "readability candidate too short");
                None
            }
            Err(e) => {
                debug!(url = %url, error = %e, "readability found no content");
                None
            }
        }
    }

    fn fallback_content(&self, cleaned: &str) -> Option<String> {
        let document = Html::parse_document(cleaned);

        document
            .select(&self.compiled.article)
            .chain(document.select(&self.compiled.body))
            .find(|el| self.text_len(*el) >= MIN_CONTENT_LEN)
            .map(|el| el.inner_html())
    }

    fn element_text(&self, element: ElementRef<'_>) -> String {
        self.normalize(&element.text().collect::<String>())
    }

    fn text_len(&self, element: ElementRef<'_>) -> usize {
        self.element_text(element).chars().count()
    }

    fn normalize(&self, text: &str) -> String {
        self.regex_patterns
            .whitespace
            .replace_all(text, " ")
            .trim()
            .to_string()
    }

    fn render(&self, node: NodeRef<'_>, base_url: Option<&Url>, out: &mut String) {
        match node.value() {
            Node::Text(t) => out.push_str(&escape_text(t)),
            Node::Element(element) => {
                let Some(el) = ElementRef::wrap(node) else {
                    return;
                };
                if self.compiled.remove.matches(&el) {
                    return;
                }

                let name = element.name();
                out.push('<');
                out.push_str(name);

                for (attr, value) in element.attrs() {
                    if !self.regex_patterns.attribute_name.is_match(attr) {
                        continue;
                    }
                    let value = match attr {
                        "href" | "src" => resolve_url(base_url, value),
                        _ => value.to_string(),
                    };
                    push_attr(out, attr, &value);
                }

                // lazy-loaded images keep the real source in data-src
                if name == "img" && element.attr("src").is_none() {
                    if let Some(lazy) = element.attr("data-src") {
                        push_attr(out, "src", &resolve_url(base_url, lazy));
                    }
                }

                out.push('>');

                if VOID_ELEMENTS.contains(&name) {
                    return;
                }

                for child in node.children() {
                    self.render(child, base_url, out);
                }

                out.push_str("</");
                out.push_str(name);
                out.push('>');
            }
            _ => {}
        }
    }

    fn first_meta(&self, document: &Html, selectors: &[Selector]) -> Option<String> {
        selectors.iter().find_map(|selector| {
            document
                .select(selector)
                .filter_map(|el| el.value().attr("content"))
                .map(|content| self.normalize(content))
                .find(|content| !content.is_empty())
        })
    }

    fn first_paragraph(&self, fragment: &Html) -> Option<String> {
        fragment
            .select(&self.compiled.paragraph)
            .map(|p| self.element_text(p))
            .find(|text| !text.is_empty())
    }

    fn extract_title(&self, document: &Html) -> Option<String> {
        if let Some(title) = self.first_meta(document, &self.compiled.meta_title) {
            return Some(title);
        }

        if let Some(title) = document
            .select(&self.compiled.title)
            .map(|el| self.element_text(el))
            .find(|t| !t.is_empty())
        {
            return Some(self.clean_title(&title));
        }

        document
            .select(&self.compiled.heading)
            .map(|el| self.element_text(el))
            .find(|t| !t.is_empty())
    }

    /// "Headline text here | Site Name" becomes "Headline text here".
    fn clean_title(&self, title: &str) -> String {
        if let Some(separator) = self.regex_patterns.title_separator.find_iter(title).last() {
            let head = title[..separator.start()].trim();
            if head.split_whitespace().count() >= 3 {
                return head.to_string();
            }
        }
        title.to_string()
    }

    fn extract_byline(&self, document: &Html) -> Option<String> {
        self.first_meta(document, &self.compiled.meta_author)
            .filter(|author| !author.starts_with("http"))
            .or_else(|| {
                document
                    .select(&self.compiled.byline)
                    .map(|el| self.element_text(el))
                    .find(|text| !text.is_empty() && text.chars().count() <= MAX_BYLINE_LEN)
            })
    }
}

fn push_attr(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    out.push_str(&escape_attr(value));
    out.push('"');
}

fn resolve_url(base_url: Option<&Url>, value: &str) -> String {
    base_url
        .and_then(|base| base.join(value.trim()).ok())
        .map(String::from)
        .unwrap_or_else(|| value.to_string())
}
