use axum::extract::{RawQuery, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use url::form_urlencoded;

use super::response::{ApiError, Endpoint};
use crate::content::ExtractedArticle;
use crate::feed::{parse_number, FeedPage, DEFAULT_SEARCH_PAGE_SIZE, DEFAULT_TOP_PAGE_SIZE};
use crate::proxy::NewsProxy;

const DEFAULT_CATEGORY: &str = "general";
const DEFAULT_SORT: &str = "publishedAt";
const MAX_LOGGED_URL: usize = 200;

/// Decoded query string. The first occurrence of a repeated key wins and
/// undecodable bytes are replaced, so no query string is ever rejected.
#[derive(Debug, Default)]
pub struct QueryParams(HashMap<String, String>);

impl QueryParams {
    pub fn parse(raw: Option<&str>) -> Self {
        let mut params = HashMap::new();
        for (key, value) in form_urlencoded::parse(raw.unwrap_or_default().as_bytes()) {
            params.entry(key.into_owned()).or_insert_with(|| value.into_owned());
        }
        Self(params)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

/// Numeric parameters stay strings here; unparsable values fall back to
/// the defaults in the handler.
#[derive(Debug, Default)]
pub struct TopParams {
    pub country: Option<String>,
    pub category: Option<String>,
    pub page_size: Option<String>,
    pub page: Option<String>,
}

impl From<&QueryParams> for TopParams {
    fn from(query: &QueryParams) -> Self {
        Self {
            country: query.get("country").map(str::to_string),
            category: query.get("category").map(str::to_string),
            page_size: query.get("pageSize").map(str::to_string),
            page: query.get("page").map(str::to_string),
        }
    }
}

#[derive(Debug, Default)]
pub struct SearchParams {
    pub q: Option<String>,
    pub sort_by: Option<String>,
    pub page_size: Option<String>,
    pub page: Option<String>,
}

impl From<&QueryParams> for SearchParams {
    fn from(query: &QueryParams) -> Self {
        Self {
            q: query.get("q").map(str::to_string),
            sort_by: query.get("sortBy").map(str::to_string),
            page_size: query.get("pageSize").map(str::to_string),
            page: query.get("page").map(str::to_string),
        }
    }
}

#[derive(Debug, Default)]
pub struct FullParams {
    pub url: Option<String>,
}

impl From<&QueryParams> for FullParams {
    fn from(query: &QueryParams) -> Self {
        Self {
            url: query.get("url").map(str::to_string),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub fn create_router(proxy: Arc<NewsProxy>) -> Router {
    Router::new()
        .nest("/api", api_routes())
        .with_state(proxy)
}

fn api_routes() -> Router<Arc<NewsProxy>> {
    Router::new()
        .route("/health", get(health_check))
        .route("/news/top", get(top_headlines))
        .route("/news/search", get(search_news))
        .route("/news/full", get(full_article))
}

/// GET /api/health
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// GET /api/news/top
async fn top_headlines(
    State(proxy): State<Arc<NewsProxy>>,
    RawQuery(query): RawQuery,
) -> Result<Json<FeedPage>, ApiError> {
    let params = TopParams::from(&QueryParams::parse(query.as_deref()));
    let country = non_empty(params.country.as_deref()).unwrap_or(proxy.default_country());
    let category = non_empty(params.category.as_deref()).unwrap_or(DEFAULT_CATEGORY);
    let page_size = parse_number(params.page_size.as_deref(), DEFAULT_TOP_PAGE_SIZE);
    let page = parse_number(params.page.as_deref(), 1);

    debug!(country, category, page, page_size, "news/top request");

    proxy
        .fetch_top(country, category, page, page_size)
        .await
        .map(Json)
        .map_err(|e| ApiError::new(Endpoint::Top, e))
}

/// GET /api/news/search
async fn search_news(
    State(proxy): State<Arc<NewsProxy>>,
    RawQuery(query): RawQuery,
) -> Result<Json<FeedPage>, ApiError> {
    let params = SearchParams::from(&QueryParams::parse(query.as_deref()));
    let query = params.q.as_deref().unwrap_or("");
    let sort_by = non_empty(params.sort_by.as_deref()).unwrap_or(DEFAULT_SORT);
    let page_size = parse_number(params.page_size.as_deref(), DEFAULT_SEARCH_PAGE_SIZE);
    let page = parse_number(params.page.as_deref(), 1);

    debug!(query, sort_by, page, page_size, "news/search request");

    proxy
        .fetch_search(query, sort_by, page, page_size)
        .await
        .map(Json)
        .map_err(|e| ApiError::new(Endpoint::Search, e))
}

/// GET /api/news/full
async fn full_article(
    State(proxy): State<Arc<NewsProxy>>,
    RawQuery(query): RawQuery,
) -> Result<Json<ExtractedArticle>, ApiError> {
    let params = FullParams::from(&QueryParams::parse(query.as_deref()));
    let url = params.url.unwrap_or_default();

    debug!(url = %truncate(&url, MAX_LOGGED_URL), "news/full request");

    proxy
        .fetch_full_article(&url)
        .await
        .map(Json)
        .map_err(|e| ApiError::new(Endpoint::Full, e))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn truncate(value: &str, max: usize) -> &str {
    match value.char_indices().nth(max) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}
