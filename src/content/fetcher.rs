use crate::config::ArticleConfig;
use crate::content::{ContentExtractor, ExtractedArticle, HtmlSanitizer, Readable, UrlGuard};
use crate::error::{Error, Result};
use crate::storage::TtlCache;
use encoding_rs::{Encoding, UTF_8};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE};
use reqwest::redirect::Policy;
use reqwest::{Client, Response};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

const ACCEPT_LANGUAGE_VALUE: &str = "en-US,en;q=0.9";
const ACCEPT_HTML: &str = "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8";
const CACHE_PREFIX: &str = "full:";

#[derive(Debug, thiserror::Error)]
#[error("redirect to a local/private address")]
struct ForbiddenRedirect;

/// Downloads article pages and turns them into sanitized, readable HTML.
#[derive(Clone)]
pub struct ArticleFetcher {
    client: Client,
    guard: UrlGuard,
    extractor: Arc<ContentExtractor>,
    sanitizer: Arc<HtmlSanitizer>,
    cache: TtlCache<ExtractedArticle>,
    timeout: Duration,
    max_size: u64,
    ttl: Duration,
}

impl ArticleFetcher {
    pub fn new(config: &ArticleConfig, cache: TtlCache<ExtractedArticle>) -> Result<Self> {
        let guard = if config.allow_private_hosts {
            UrlGuard::permissive()
        } else {
            UrlGuard::new()
        };

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGE_VALUE));
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));

        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .connect_timeout(config.timeout())
            .redirect(redirect_policy(guard, config.max_redirects))
            .gzip(true)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            guard,
            extractor: Arc::new(ContentExtractor::new()?),
            sanitizer: Arc::new(HtmlSanitizer::new()),
            cache,
            timeout: config.timeout(),
            max_size: config.max_size,
            ttl: config.cache_ttl(),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn cache(&self) -> &TtlCache<ExtractedArticle> {
        &self.cache
    }

    /// Fetches `raw_url`, extracts its main content and sanitizes it.
    ///
    /// The target is checked against the private-network guard before any
    /// request is made, and again on every redirect hop. The provider key
    /// gate lives in [`NewsProxy`](crate::proxy::NewsProxy), the only public
    /// entry point.
    pub(crate) async fn fetch_full_article(&self, raw_url: &str) -> Result<ExtractedArticle> {
        if raw_url.trim().is_empty() {
            return Err(Error::InvalidInput("Missing url parameter".to_string()));
        }

        let url = self.guard.validate(raw_url)?;
        let cache_key = format!("{}{}", CACHE_PREFIX, url);

        if let Some(cached) = self.cache.get(&cache_key) {
            debug!(url = %url, "article cache hit");
            return Ok(cached);
        }

        let html = self
            .with_deadline(&url, async {
                self.guard.check_resolved(&url).await?;
                self.download(&url).await
            })
            .await?;

        let extractor = Arc::clone(&self.extractor);
        let sanitizer = Arc::clone(&self.sanitizer);
        let base = url.clone();
        let article = tokio::task::spawn_blocking(move || {
            let readable = extractor.extract(&html, Some(&base))?;
            build_article(readable, &sanitizer)
        })
        .await
        .map_err(|e| Error::ExtractionFailed(format!("Extraction task failed: {}", e)))??;

        info!(url = %url, length = article.length, "extracted article");
        self.cache.set(cache_key, article.clone(), self.ttl);
        Ok(article)
    }

    /// Bounds name resolution and download together.
    async fn with_deadline<T, F>(&self, url: &Url, fetch: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.timeout, fetch).await {
            Ok(result) => result,
            Err(_) => {
                warn!(url = %url, timeout = ?self.timeout, "article fetch timed out");
                Err(Error::Timeout("Timeout fetching article".to_string()))
            }
        }
    }

    async fn download(&self, url: &Url) -> Result<String> {
        debug!(url = %url, "fetching article");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| classify_send_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, status = status.as_u16(), "article host returned an error status");
            return Err(Error::UpstreamUnavailable(format!(
                "HTTP {} fetching article",
                status.as_u16()
            )));
        }

        if let Some(length) = response.content_length() {
            if length > self.max_size {
                warn!(url = %url, length, "article exceeds size limit");
                return Err(Error::PayloadTooLarge(length));
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let body = self.read_limited(response).await?;
        Ok(decode_body(&body, content_type.as_deref()))
    }

    async fn read_limited(&self, mut response: Response) -> Result<Vec<u8>> {
        let mut body = Vec::new();

        while let Some(chunk) = response.chunk().await? {
            body.extend_from_slice(&chunk);
            if body.len() as u64 > self.max_size {
                return Err(Error::PayloadTooLarge(body.len() as u64));
            }
        }

        Ok(body)
    }
}

/// Sanitizes extracted content and fills in the payload defaults.
pub fn build_article(readable: Readable, sanitizer: &HtmlSanitizer) -> Result<ExtractedArticle> {
    let content = sanitizer.sanitize(&readable.content);
    if content.trim().is_empty() {
        return Err(Error::ExtractionFailed("Unable to extract article content".to_string()));
    }

    let excerpt = readable.excerpt.unwrap_or_default();
    let title = readable
        .title
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| excerpt.clone());

    Ok(ExtractedArticle {
        title,
        byline: readable.byline.unwrap_or_default(),
        content,
        excerpt,
        length: readable.text_length,
    })
}

/// Decodes with the `Content-Type` charset, UTF-8 when absent or unknown.
/// A byte-order mark wins over the header.
fn decode_body(body: &[u8], content_type: Option<&str>) -> String {
    let encoding = content_type
        .and_then(charset_label)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(UTF_8);

    let (text, _, _) = encoding.decode(body);
    text.into_owned()
}

fn charset_label(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"'))
    })
}

fn redirect_policy(guard: UrlGuard, max_redirects: usize) -> Policy {
    Policy::custom(move |attempt| {
        if attempt.previous().len() >= max_redirects {
            attempt.error("too many redirects")
        } else if guard.check(attempt.url()).is_err() {
            attempt.error(ForbiddenRedirect)
        } else {
            attempt.follow()
        }
    })
}

fn classify_send_error(url: &Url, err: reqwest::Error) -> Error {
    let mut source = std::error::Error::source(&err);
    while let Some(cause) = source {
        if cause.downcast_ref::<ForbiddenRedirect>().is_some() {
            warn!(url = %url, "redirect into a private network refused");
            return Error::Forbidden("Refusing to fetch local/private address".to_string());
        }
        source = cause.source();
    }

    warn!(url = %url, error = %err, "article request failed");
    if err.is_timeout() {
        Error::Timeout("Timeout fetching article".to_string())
    } else {
        Error::UpstreamUnavailable("Failed to fetch article".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const STORY: &str = r#"<html><head><title>Local team wins the championship final</title></head>
<body><nav><a href="/">Home</a></nav>
<article><p>The local team won the championship final on Sunday, beating their rivals in a tense match.</p>
<p>Fans filled the streets afterwards, singing and waving flags until late in the evening.</p>
<script>track()</script></article></body></html>"#;

    fn local_config() -> ArticleConfig {
        ArticleConfig {
            allow_private_hosts: true,
            ..Default::default()
        }
    }

    fn fetcher(config: &ArticleConfig) -> ArticleFetcher {
        ArticleFetcher::new(config, TtlCache::new(16)).unwrap()
    }

    #[tokio::test]
    async fn test_fetches_and_caches_article() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/story"))
            .and(header("accept-language", ACCEPT_LANGUAGE_VALUE))
            .respond_with(ResponseTemplate::new(200).set_body_string(STORY))
            .expect(1)
            .mount(&mock_server)
            .await;

        let fetcher = fetcher(&local_config());
        let url = format!("{}/story", mock_server.uri());

        let first = fetcher.fetch_full_article(&url).await.unwrap();
        let second = fetcher.fetch_full_article(&url).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.title, "Local team wins the championship final");
        assert!(first.content.contains("championship final on Sunday"));
        assert!(!first.content.contains("track()"));
        assert!(first.length > 100);
    }

    #[tokio::test]
    async fn test_guard_runs_before_network() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(STORY))
            .expect(0)
            .mount(&mock_server)
            .await;

        let fetcher = fetcher(&ArticleConfig::default());
        let url = format!("{}/story", mock_server.uri());

        assert!(matches!(fetcher.fetch_full_article(&url).await, Err(Error::Forbidden(_))));
        assert!(matches!(
            fetcher.fetch_full_article("ftp://example.com/x").await,
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(fetcher.fetch_full_article("   ").await, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_error_status_is_unavailable() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let fetcher = fetcher(&local_config());
        let result = fetcher.fetch_full_article(&format!("{}/down", mock_server.uri())).await;

        assert!(matches!(result, Err(Error::UpstreamUnavailable(_))));
        assert!(fetcher.cache().is_empty());
    }

    #[tokio::test]
    async fn test_declared_size_limit() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(4096)))
            .mount(&mock_server)
            .await;

        let config = ArticleConfig {
            max_size: 1024,
            ..local_config()
        };
        let result = fetcher(&config)
            .fetch_full_article(&format!("{}/huge", mock_server.uri()))
            .await;

        assert!(matches!(result, Err(Error::PayloadTooLarge(4096))));
    }

    #[tokio::test]
    async fn test_slow_host_times_out() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(STORY)
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&mock_server)
            .await;

        let fetcher = fetcher(&local_config()).with_timeout(Duration::from_millis(200));
        let result = fetcher.fetch_full_article(&format!("{}/slow", mock_server.uri())).await;

        match result {
            Err(Error::Timeout(msg)) => assert_eq!(msg, "Timeout fetching article"),
            other => panic!("Expected Timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_deadline_covers_stalled_resolution() {
        let fetcher = fetcher(&ArticleConfig::default()).with_timeout(Duration::from_millis(50));
        let url = Url::parse("https://news.example.com/story").unwrap();

        // a resolver that never answers
        let stalled = std::future::pending::<Result<()>>();

        match fetcher.with_deadline(&url, stalled).await {
            Err(Error::Timeout(msg)) => assert_eq!(msg, "Timeout fetching article"),
            other => panic!("Expected Timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_redirect_into_private_network_is_forbidden() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/moved"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "http://10.1.2.3/"))
            .mount(&mock_server)
            .await;

        let client = Client::builder()
            .redirect(redirect_policy(UrlGuard::new(), 5))
            .build()
            .unwrap();
        let url = Url::parse(&format!("{}/moved", mock_server.uri())).unwrap();

        let err = client.get(url.clone()).send().await.unwrap_err();
        match classify_send_error(&url, err) {
            Error::Forbidden(msg) => assert_eq!(msg, "Refusing to fetch local/private address"),
            other => panic!("Expected Forbidden, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_streamed_size_limit_without_content_length() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;

            let head = "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n";
            if socket.write_all(head.as_bytes()).await.is_err() {
                return;
            }
            let chunk = vec![b'x'; 64 * 1024];
            for _ in 0..40 {
                // the client hangs up once the limit is hit
                if socket.write_all(&chunk).await.is_err() {
                    return;
                }
            }
        });

        let config = local_config();
        let result = fetcher(&config)
            .fetch_full_article(&format!("http://{}/endless", addr))
            .await;

        match result {
            Err(Error::PayloadTooLarge(read)) => assert!(read > config.max_size),
            other => panic!("Expected PayloadTooLarge, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_decodes_declared_charset() {
        let mock_server = MockServer::start().await;

        let story = STORY.replace("Local team", "Café team");
        let (page, _, _) = encoding_rs::WINDOWS_1252.encode(&story);
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(page.into_owned(), "text/html; charset=windows-1252"),
            )
            .mount(&mock_server)
            .await;

        let article = fetcher(&local_config())
            .fetch_full_article(&format!("{}/latin", mock_server.uri()))
            .await
            .unwrap();

        assert_eq!(article.title, "Café team wins the championship final");
    }

    #[test]
    fn test_decode_body_charsets() {
        assert_eq!(decode_body(b"caf\xe9", Some("text/html; charset=ISO-8859-1")), "café");
        assert_eq!(decode_body(b"caf\xe9", Some("text/html; Charset=\"windows-1252\"")), "café");
        assert_eq!(decode_body("café".as_bytes(), Some("text/html")), "café");
        assert_eq!(decode_body("café".as_bytes(), None), "café");
        assert_eq!(decode_body("café".as_bytes(), Some("text/html; charset=bogus")), "café");
    }

    #[test]
    fn test_build_article_defaults() {
        let readable = Readable {
            title: None,
            byline: None,
            excerpt: Some("Short summary".to_string()),
            content: "<p onclick=\"x()\">Body</p>".to_string(),
            text_length: 4,
        };

        let article = build_article(readable, &HtmlSanitizer::new()).unwrap();
        assert_eq!(article.title, "Short summary");
        assert_eq!(article.byline, "");
        assert_eq!(article.content, "<p>Body</p>");
        assert_eq!(article.length, 4);
    }

    #[test]
    fn test_build_article_rejects_empty_content() {
        let readable = Readable {
            title: Some("T".to_string()),
            byline: None,
            excerpt: None,
            content: "<script>only()</script>".to_string(),
            text_length: 0,
        };

        assert!(matches!(
            build_article(readable, &HtmlSanitizer::new()),
            Err(Error::ExtractionFailed(_))
        ));
    }
}
