use crate::config::{ApiKey, UpstreamConfig};
use crate::error::{Error, Result};
use crate::feed::{FeedPage, UpstreamQuery};
use crate::storage::TtlCache;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

pub const API_KEY_HEADER: &str = "X-Api-Key";

/// Client for the news provider's headlines and search endpoints.
///
/// Raw provider bodies are cached by their full request URL; the API key
/// travels only in a request header and never leaves this type.
#[derive(Clone)]
pub struct NewsFetcher {
    client: Client,
    base_url: Url,
    api_key: Option<ApiKey>,
    language: String,
    ttl: Duration,
    cache: TtlCache<Value>,
}

impl NewsFetcher {
    pub fn new(config: &UpstreamConfig, cache: TtlCache<Value>) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| Error::Config(format!("Invalid upstream base_url: {}", e)))?;

        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .gzip(true)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            api_key: config
                .api_key
                .clone()
                .filter(|key| !key.expose().trim().is_empty()),
            language: config.default_language.clone(),
            ttl: config.feed_ttl(),
            cache,
        })
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn cache(&self) -> &TtlCache<Value> {
        &self.cache
    }

    /// Top headlines for a country and category.
    pub async fn fetch_top(
        &self,
        country: &str,
        category: &str,
        page: i64,
        page_size: i64,
    ) -> Result<FeedPage> {
        let api_key = self.require_key()?;
        let query = UpstreamQuery::top(country, category, page, page_size)?;
        self.fetch_query(&query, api_key).await
    }

    /// Full-text search across all articles.
    pub async fn fetch_search(
        &self,
        query: &str,
        sort_by: &str,
        page: i64,
        page_size: i64,
    ) -> Result<FeedPage> {
        let api_key = self.require_key()?;
        let query = UpstreamQuery::search(query, sort_by, &self.language, page, page_size)?;
        self.fetch_query(&query, api_key).await
    }

    fn require_key(&self) -> Result<&ApiKey> {
        self.api_key.as_ref().ok_or(Error::Misconfigured)
    }

    async fn fetch_query(&self, query: &UpstreamQuery, api_key: &ApiKey) -> Result<FeedPage> {
        let url = query.to_url(&self.base_url);
        let raw = self.fetch_cached(&url, api_key).await?;
        FeedPage::from_upstream(&raw, query)
    }

    async fn fetch_cached(&self, url: &Url, api_key: &ApiKey) -> Result<Value> {
        if let Some(cached) = self.cache.get(url.as_str()) {
            debug!(url = %url, "news proxy cache hit");
            return Ok(cached);
        }

        debug!(url = %url, "news proxy fetching");

        let response = self
            .client
            .get(url.clone())
            .header(API_KEY_HEADER, api_key.expose())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                warn!(url = %url, error = %e, "provider request failed");
                Error::from(e)
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            warn!(url = %url, "provider rejected the API key");
            return Err(Error::UpstreamAuth);
        }

        if !status.is_success() {
            warn!(url = %url, status = status.as_u16(), "provider returned an error status");
            return Err(Error::UpstreamUnavailable(format!(
                "HTTP {} from provider",
                status.as_u16()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::UpstreamUnavailable(format!("Failed to decode provider response: {}", e)))?;

        self.cache.set(url.as_str(), body.clone(), self.ttl);
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer, key: Option<&str>) -> UpstreamConfig {
        UpstreamConfig {
            base_url: server.uri(),
            api_key: key.map(ApiKey::new),
            ..Default::default()
        }
    }

    fn headlines_body() -> Value {
        json!({
            "status": "ok",
            "totalResults": 1,
            "articles": [{
                "source": {"id": null, "name": "Example"},
                "title": "Headline",
                "description": "Something happened",
                "url": "https://example.com/story",
                "urlToImage": "https://example.com/story.jpg",
                "publishedAt": "2024-03-16T10:00:00Z",
                "content": "Body"
            }]
        })
    }

    #[tokio::test]
    async fn test_fetch_top_sends_key_header() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/top-headlines"))
            .and(header(API_KEY_HEADER, "test-key"))
            .and(query_param("category", "science"))
            .respond_with(ResponseTemplate::new(200).set_body_json(headlines_body()))
            .expect(1)
            .mount(&mock_server)
            .await;

        let fetcher = NewsFetcher::new(&config_for(&mock_server, Some("test-key")), TtlCache::new(16)).unwrap();
        let page = fetcher.fetch_top("us", "science", 1, 10).await.unwrap();

        assert_eq!(page.articles.len(), 1);
        assert_eq!(page.total_results, 1);
        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, 10);
    }

    #[tokio::test]
    async fn test_invalid_category_skips_network() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(headlines_body()))
            .expect(0)
            .mount(&mock_server)
            .await;

        let fetcher = NewsFetcher::new(&config_for(&mock_server, Some("test-key")), TtlCache::new(16)).unwrap();
        let result = fetcher.fetch_top("us", "politics", 1, 10).await;

        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_missing_key_is_misconfigured() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(headlines_body()))
            .expect(0)
            .mount(&mock_server)
            .await;

        let fetcher = NewsFetcher::new(&config_for(&mock_server, None), TtlCache::new(16)).unwrap();
        assert!(!fetcher.has_api_key());

        assert!(matches!(
            fetcher.fetch_top("us", "general", 1, 10).await,
            Err(Error::Misconfigured)
        ));
        assert!(matches!(
            fetcher.fetch_search("rust", "publishedAt", 1, 20).await,
            Err(Error::Misconfigured)
        ));
    }

    #[tokio::test]
    async fn test_blank_key_is_misconfigured() {
        let mock_server = MockServer::start().await;
        let fetcher = NewsFetcher::new(&config_for(&mock_server, Some("  ")), TtlCache::new(16)).unwrap();
        assert!(!fetcher.has_api_key());
    }

    #[tokio::test]
    async fn test_401_is_upstream_auth() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/top-headlines"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "status": "error",
                "code": "apiKeyInvalid"
            })))
            .mount(&mock_server)
            .await;

        let fetcher = NewsFetcher::new(&config_for(&mock_server, Some("bad-key")), TtlCache::new(16)).unwrap();
        let result = fetcher.fetch_top("us", "general", 1, 10).await;

        assert!(matches!(result, Err(Error::UpstreamAuth)));
    }

    #[tokio::test]
    async fn test_other_errors_are_unavailable_and_not_cached() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/everything"))
            .respond_with(ResponseTemplate::new(429))
            .expect(2)
            .mount(&mock_server)
            .await;

        let fetcher = NewsFetcher::new(&config_for(&mock_server, Some("test-key")), TtlCache::new(16)).unwrap();

        for _ in 0..2 {
            let result = fetcher.fetch_search("rust", "publishedAt", 1, 20).await;
            match result {
                Err(Error::UpstreamUnavailable(msg)) => assert!(msg.contains("429")),
                other => panic!("Expected UpstreamUnavailable, got {:?}", other.map(|_| ())),
            }
        }

        assert!(fetcher.cache().is_empty());
    }

    #[tokio::test]
    async fn test_non_json_body_is_unavailable() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/top-headlines"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&mock_server)
            .await;

        let fetcher = NewsFetcher::new(&config_for(&mock_server, Some("test-key")), TtlCache::new(16)).unwrap();
        let result = fetcher.fetch_top("us", "general", 1, 10).await;

        assert!(matches!(result, Err(Error::UpstreamUnavailable(_))));
    }

    #[tokio::test]
    async fn test_cache_expires_after_ttl() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/top-headlines"))
            .respond_with(ResponseTemplate::new(200).set_body_json(headlines_body()))
            .expect(2)
            .mount(&mock_server)
            .await;

        let fetcher = NewsFetcher::new(&config_for(&mock_server, Some("test-key")), TtlCache::new(16))
            .unwrap()
            .with_ttl(Duration::from_millis(50));

        fetcher.fetch_top("us", "general", 1, 10).await.unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;
        fetcher.fetch_top("us", "general", 1, 10).await.unwrap();
    }
}
