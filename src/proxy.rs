use crate::config::Config;
use crate::content::{ArticleFetcher, ExtractedArticle};
use crate::error::{Error, Result};
use crate::feed::fetcher::NewsFetcher;
use crate::feed::FeedPage;
use crate::storage::{CacheStats, TtlCache};
use serde_json::Value;
use tracing::info;

/// The three proxy operations behind one handle.
///
/// The feed and article caches are shared with the fetchers that fill them;
/// [`NewsProxy::clear`] empties both.
#[derive(Clone)]
pub struct NewsProxy {
    news: NewsFetcher,
    articles: ArticleFetcher,
    feed_cache: TtlCache<Value>,
    article_cache: TtlCache<ExtractedArticle>,
    default_country: String,
}

impl NewsProxy {
    pub fn from_config(config: &Config) -> Result<Self> {
        let news = NewsFetcher::new(&config.upstream, TtlCache::new(config.cache.max_entries))?;
        let articles = ArticleFetcher::new(&config.article, TtlCache::new(config.cache.max_entries))?;

        Ok(Self::new(news, articles, config.upstream.default_country.clone()))
    }

    pub fn new(news: NewsFetcher, articles: ArticleFetcher, default_country: String) -> Self {
        Self {
            feed_cache: news.cache().clone(),
            article_cache: articles.cache().clone(),
            news,
            articles,
            default_country,
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.news.has_api_key()
    }

    pub fn default_country(&self) -> &str {
        &self.default_country
    }

    pub async fn fetch_top(
        &self,
        country: &str,
        category: &str,
        page: i64,
        page_size: i64,
    ) -> Result<FeedPage> {
        self.news.fetch_top(country, category, page, page_size).await
    }

    pub async fn fetch_search(
        &self,
        query: &str,
        sort_by: &str,
        page: i64,
        page_size: i64,
    ) -> Result<FeedPage> {
        self.news.fetch_search(query, sort_by, page, page_size).await
    }

    /// Fails with [`Error::Misconfigured`] before looking at `url` when no
    /// provider key is configured.
    pub async fn fetch_full_article(&self, url: &str) -> Result<ExtractedArticle> {
        if !self.has_api_key() {
            return Err(Error::Misconfigured);
        }
        self.articles.fetch_full_article(url).await
    }

    pub fn feed_cache_stats(&self) -> CacheStats {
        self.feed_cache.stats()
    }

    pub fn article_cache_stats(&self) -> CacheStats {
        self.article_cache.stats()
    }

    /// Drops every cached feed page and article.
    pub fn clear(&self) {
        self.feed_cache.clear();
        self.article_cache.clear();
        info!("news proxy caches cleared");
    }
}
