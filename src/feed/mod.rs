pub mod fetcher;

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

pub const DEFAULT_TOP_PAGE_SIZE: i64 = 10;
pub const MAX_TOP_PAGE_SIZE: u32 = 50;
pub const DEFAULT_SEARCH_PAGE_SIZE: i64 = 20;
pub const MAX_SEARCH_PAGE_SIZE: u32 = 100;

/// Provider categories accepted by the headlines endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    General,
    Business,
    Entertainment,
    Health,
    Science,
    Sports,
    Technology,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::General,
        Category::Business,
        Category::Entertainment,
        Category::Health,
        Category::Science,
        Category::Sports,
        Category::Technology,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::General => "general",
            Category::Business => "business",
            Category::Entertainment => "entertainment",
            Category::Health => "health",
            Category::Science => "science",
            Category::Sports => "sports",
            Category::Technology => "technology",
        }
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("Invalid category: {}", s)))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result ordering understood by the provider's search endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortBy {
    Relevancy,
    Popularity,
    #[default]
    PublishedAt,
}

impl SortBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortBy::Relevancy => "relevancy",
            SortBy::Popularity => "popularity",
            SortBy::PublishedAt => "publishedAt",
        }
    }
}

impl FromStr for SortBy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "relevancy" => Ok(SortBy::Relevancy),
            "popularity" => Ok(SortBy::Popularity),
            "publishedAt" => Ok(SortBy::PublishedAt),
            other => Err(Error::InvalidInput(format!("Invalid sortBy: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Top,
    Search,
}

impl QueryKind {
    fn endpoint(&self) -> &'static str {
        match self {
            QueryKind::Top => "top-headlines",
            QueryKind::Search => "everything",
        }
    }

    fn default_page_size(&self) -> i64 {
        match self {
            QueryKind::Top => DEFAULT_TOP_PAGE_SIZE,
            QueryKind::Search => DEFAULT_SEARCH_PAGE_SIZE,
        }
    }

    fn max_page_size(&self) -> u32 {
        match self {
            QueryKind::Top => MAX_TOP_PAGE_SIZE,
            QueryKind::Search => MAX_SEARCH_PAGE_SIZE,
        }
    }
}

/// A validated, normalized request to the news provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamQuery {
    pub kind: QueryKind,
    pub country: Option<String>,
    pub category: Option<Category>,
    pub query: Option<String>,
    pub language: Option<String>,
    pub sort_by: Option<SortBy>,
    pub page: u32,
    pub page_size: u32,
}

impl UpstreamQuery {
    pub fn top(country: &str, category: &str, page: i64, page_size: i64) -> Result<Self> {
        let category: Category = category.trim().parse()?;
        let country = country.trim().to_ascii_lowercase();
        if country.is_empty() || !country.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(Error::InvalidInput(format!("Invalid country: {}", country)));
        }

        Ok(Self {
            kind: QueryKind::Top,
            country: Some(country),
            category: Some(category),
            query: None,
            language: None,
            sort_by: None,
            page: clamp_page(page),
            page_size: clamp_page_size(page_size, QueryKind::Top),
        })
    }

    pub fn search(query: &str, sort_by: &str, language: &str, page: i64, page_size: i64) -> Result<Self> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::InvalidInput("Missing query".to_string()));
        }

        let sort_by: SortBy = sort_by.trim().parse()?;

        Ok(Self {
            kind: QueryKind::Search,
            country: None,
            category: None,
            query: Some(query.to_string()),
            language: Some(language.to_string()),
            sort_by: Some(sort_by),
            page: clamp_page(page),
            page_size: clamp_page_size(page_size, QueryKind::Search),
        })
    }

    /// Fully qualified provider URL. Every parameter is part of it, so it
    /// doubles as the cache key.
    pub fn to_url(&self, base: &Url) -> Url {
        let mut url = base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(self.kind.endpoint());
        }

        {
            let mut pairs = url.query_pairs_mut();
            pairs.clear();
            if let Some(country) = &self.country {
                pairs.append_pair("country", country);
            }
            if let Some(category) = &self.category {
                pairs.append_pair("category", category.as_str());
            }
            if let Some(query) = &self.query {
                pairs.append_pair("q", query);
            }
            if let Some(language) = &self.language {
                pairs.append_pair("language", language);
            }
            if let Some(sort_by) = &self.sort_by {
                pairs.append_pair("sortBy", sort_by.as_str());
            }
            pairs.append_pair("pageSize", &self.page_size.to_string());
            pairs.append_pair("page", &self.page.to_string());
        }

        url
    }
}

fn clamp_page(page: i64) -> u32 {
    page.clamp(1, u32::MAX as i64) as u32
}

/// Zero or negative sizes mean "use the default".
fn clamp_page_size(page_size: i64, kind: QueryKind) -> u32 {
    let page_size = if page_size <= 0 {
        kind.default_page_size()
    } else {
        page_size
    };
    page_size.min(kind.max_page_size() as i64) as u32
}

/// Lenient numeric query parameter. The leading integer is used, so
/// "25abc" is 25; without leading digits the value falls back to `default`.
pub fn parse_number(raw: Option<&str>, default: i64) -> i64 {
    raw.and_then(leading_integer).unwrap_or(default)
}

fn leading_integer(value: &str) -> Option<i64> {
    let value = value.trim_start();
    let (negative, rest) = match value.as_bytes().first() {
        Some(b'-') => (true, &value[1..]),
        Some(b'+') => (false, &value[1..]),
        _ => (false, value),
    };

    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }

    // too many digits saturates; the page size clamp takes it from there
    let magnitude = rest[..digits].parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -magnitude } else { magnitude })
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub name: Option<String>,
}

/// Provider article, reshaped to the fields the frontend consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub url_to_image: Option<String>,
    pub published_at: Option<String>,
    #[serde(default)]
    pub source: Source,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPage {
    pub articles: Vec<Article>,
    pub total_results: u64,
    pub page: u32,
    pub page_size: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpstreamBody {
    #[serde(default)]
    articles: Vec<serde_json::Value>,
    #[serde(default)]
    total_results: Option<u64>,
}

impl FeedPage {
    /// Builds a page from a raw provider body. Missing `articles` or
    /// `totalResults` default to empty and zero; malformed articles are skipped.
    pub fn from_upstream(raw: &serde_json::Value, query: &UpstreamQuery) -> Result<Self> {
        let body: UpstreamBody = serde_json::from_value(raw.clone())
            .map_err(|e| Error::UpstreamUnavailable(format!("Malformed provider response: {}", e)))?;

        let articles = body
            .articles
            .into_iter()
            .filter_map(|value| serde_json::from_value::<Article>(value).ok())
            .collect();

        Ok(Self {
            articles: dedupe_by_url(articles),
            total_results: body.total_results.unwrap_or(0),
            page: query.page,
            page_size: query.page_size,
        })
    }
}

/// Keeps the first article for every URL; articles without one are dropped.
pub fn dedupe_by_url(articles: Vec<Article>) -> Vec<Article> {
    let mut seen = HashSet::new();
    articles
        .into_iter()
        .filter(|article| match article.url.as_deref() {
            Some(url) if !url.is_empty() => seen.insert(url.to_string()),
            _ => false,
        })
        .collect()
}
