//! News headlines from per-domain Google News RSS searches.
//!
//! Items are rendered as an enumerated `N. [Source] Headline` list so the
//! headline text itself lands in the transcript and later follow-ups can
//! refer back to it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use localecho_config::NewsConfig;
use localecho_core::error::ToolError;
use localecho_core::session::SessionContext;
use localecho_core::tool::{ParamKind, ParamSpec, Tool, ToolArgs};
use quick_xml::Reader;
use quick_xml::events::Event;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::text::truncate_lines;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsItem {
    pub source: String,
    pub headline: String,
    pub link: Option<String>,
}

/// Source of headlines. `None` topic means general news.
#[async_trait]
pub trait NewsFeed: Send + Sync {
    async fn fetch(&self, topic: Option<&str>) -> Result<Vec<NewsItem>, ToolError>;
}

pub struct GoogleNewsRss {
    client: reqwest::Client,
    feed_url: String,
    domains: Vec<String>,
    limit_per_source: usize,
    max_items: usize,
    cache_ttl: Duration,
    cache: Mutex<Option<(Instant, Vec<NewsItem>)>>,
}

impl GoogleNewsRss {
    pub fn from_config(config: &NewsConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("Mozilla/5.0 (compatible; localecho)")
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            feed_url: config.feed_url.clone(),
            domains: config.domains.clone(),
            limit_per_source: config.limit_per_source,
            max_items: config.max_items,
            cache_ttl: Duration::from_secs(config.cache_ttl_secs),
            cache: Mutex::new(None),
        }
    }

    /// The feed URL with its `q` parameter set to `query`.
    fn search_url(&self, query: &str) -> Result<reqwest::Url, ToolError> {
        let mut url = reqwest::Url::parse(&self.feed_url.replace("{query}", ""))
            .map_err(|e| ToolError::failed("get_news", format!("bad feed url: {e}")))?;
        let mut pairs: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| k != "q")
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        pairs.insert(0, ("q".into(), query.into()));
        url.query_pairs_mut().clear().extend_pairs(pairs);
        Ok(url)
    }

    async fn fetch_domain(&self, domain: &str, topic: Option<&str>) -> Result<Vec<NewsItem>, String> {
        let query = match topic {
            Some(topic) => format!("{topic} site:{domain} when:1d"),
            None => format!("site:{domain} when:1d"),
        };
        let url = self.search_url(&query).map_err(|e| e.to_string())?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("HTTP {}", response.status()));
        }
        let body = response.text().await.map_err(|e| e.to_string())?;

        let source = source_name(domain);
        Ok(parse_rss(&body)
            .into_iter()
            .take(self.limit_per_source)
            .map(|(title, link)| NewsItem {
                source: source.clone(),
                headline: clean_headline(&title),
                link,
            })
            .collect())
    }
}

#[async_trait]
impl NewsFeed for GoogleNewsRss {
    async fn fetch(&self, topic: Option<&str>) -> Result<Vec<NewsItem>, ToolError> {
        if topic.is_none() {
            let cache = self.cache.lock().await;
            if let Some((at, items)) = cache.as_ref() {
                if at.elapsed() < self.cache_ttl {
                    debug!(items = items.len(), "Serving cached news");
                    return Ok(items.clone());
                }
            }
        }

        let results = futures::future::join_all(
            self.domains.iter().map(|domain| self.fetch_domain(domain, topic)),
        )
        .await;

        let mut items = Vec::new();
        let mut failures = Vec::new();
        for (domain, result) in self.domains.iter().zip(results) {
            match result {
                Ok(found) => items.extend(found),
                Err(e) => {
                    warn!(domain = %domain, error = %e, "News feed fetch failed");
                    failures.push(format!("{domain}: {e}"));
                }
            }
        }
        if items.is_empty() && !failures.is_empty() && failures.len() == self.domains.len() {
            return Err(ToolError::Unavailable {
                service: "News feed".into(),
                reason: failures.join("; "),
            });
        }
        items.truncate(self.max_items);
        info!(items = items.len(), topic = topic.unwrap_or(""), "News fetched");

        if topic.is_none() {
            *self.cache.lock().await = Some((Instant::now(), items.clone()));
        }
        Ok(items)
    }
}

/// `(title, link)` for every `<item>` of an RSS document, in feed order.
pub fn parse_rss(xml: &str) -> Vec<(String, Option<String>)> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut items = Vec::new();

    let mut in_item = false;
    let mut field: Option<&'static str> = None;
    let mut title = String::new();
    let mut link = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"item" => {
                    in_item = true;
                    title.clear();
                    link.clear();
                }
                b"title" if in_item => field = Some("title"),
                b"link" if in_item => field = Some("link"),
                _ => field = None,
            },
            Ok(Event::Text(t)) => {
                if let (Some(name), Ok(text)) = (field, t.unescape()) {
                    match name {
                        "title" => title.push_str(&text),
                        _ => link.push_str(&text),
                    }
                }
            }
            Ok(Event::CData(t)) => {
                if let Some(name) = field {
                    let text = String::from_utf8_lossy(&t);
                    match name {
                        "title" => title.push_str(&text),
                        _ => link.push_str(&text),
                    }
                }
            }
            Ok(Event::End(e)) => {
                if e.name().as_ref() == b"item" {
                    in_item = false;
                    if !title.trim().is_empty() {
                        let link = (!link.trim().is_empty()).then(|| link.trim().to_string());
                        items.push((title.trim().to_string(), link));
                    }
                }
                field = None;
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                warn!(error = %e, "Malformed RSS, keeping items parsed so far");
                break;
            }
            _ => (),
        }
        buf.clear();
    }

    items
}

/// Google News appends " - Publisher" to every title.
fn clean_headline(title: &str) -> String {
    match title.rsplit_once(" - ") {
        Some((headline, _)) if !headline.trim().is_empty() => headline.trim().to_string(),
        _ => title.trim().to_string(),
    }
}

/// `lexpress.mu` → `Lexpress`.
fn source_name(domain: &str) -> String {
    let label = domain.split('.').next().unwrap_or(domain);
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => domain.to_string(),
    }
}

/// Dated header followed by one enumerated line per item.
pub fn format_news(items: &[NewsItem], topic: Option<&str>, today: NaiveDate) -> String {
    let mut out = match topic {
        Some(topic) => format!("**📅 News on '{topic}' ({today})**"),
        None => format!("**📅 Daily News ({today})**"),
    };
    for (i, item) in items.iter().enumerate() {
        out.push_str(&format!("\n{}. [{}] {}", i + 1, item.source, item.headline));
    }
    out
}

pub struct GetNewsTool {
    feed: Arc<dyn NewsFeed>,
    max_lines: usize,
}

impl GetNewsTool {
    pub fn new(feed: Arc<dyn NewsFeed>) -> Self {
        Self {
            feed,
            max_lines: 50,
        }
    }

    pub fn with_max_lines(mut self, max_lines: usize) -> Self {
        self.max_lines = max_lines;
        self
    }
}

static NEWS_PARAMS: [ParamSpec; 1] = [ParamSpec::optional("topic", ParamKind::Str)];

#[async_trait]
impl Tool for GetNewsTool {
    fn name(&self) -> &'static str {
        "get_news"
    }

    fn description(&self) -> &'static str {
        "Get today's news headlines, optionally about a topic."
    }

    fn params(&self) -> &'static [ParamSpec] {
        &NEWS_PARAMS
    }

    fn example(&self) -> Option<&'static str> {
        Some("get_news(\"cyclone\")")
    }

    async fn execute(&self, args: ToolArgs, _session: &mut SessionContext) -> Result<String, ToolError> {
        let topic = args.str("topic").filter(|t| !t.is_empty());
        let items = self.feed.fetch(topic).await?;
        if items.is_empty() {
            return Ok(match topic {
                Some(topic) => format!("No fresh news found for '{topic}'."),
                None => "No fresh news found at the moment.".into(),
            });
        }
        let text = format_news(&items, topic, Local::now().date_naive());
        Ok(truncate_lines(&text, self.max_lines))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::extract::Query;
    use axum::routing::get;
    use localecho_core::tool::{ToolInvocation, ToolRegistry};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>Google News</title>
<item><title>Cyclone Belal approaches the east coast - lexpress.mu</title><link>https://example.com/1</link></item>
<item><title><![CDATA[Fuel prices &amp; tariffs revised - Defimedia]]></title><link>https://example.com/2</link></item>
<item><title>Third story - lexpress.mu</title></item>
</channel></rss>"#;

    #[test]
    fn rss_items_are_parsed_in_order() {
        let items = parse_rss(FEED);
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].0, "Cyclone Belal approaches the east coast - lexpress.mu");
        assert_eq!(items[0].1.as_deref(), Some("https://example.com/1"));
        assert_eq!(items[2].1, None);
    }

    #[test]
    fn malformed_rss_keeps_parsed_prefix() {
        let xml = "<rss><channel><item><title>One - X</title></item><item><title>Two";
        let items = parse_rss(xml);
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn headline_and_source_cleanup() {
        assert_eq!(clean_headline("A - B - lexpress.mu"), "A - B");
        assert_eq!(clean_headline("No suffix"), "No suffix");
        assert_eq!(source_name("lexpress.mu"), "Lexpress");
        assert_eq!(source_name("defimedia.info"), "Defimedia");
    }

    #[test]
    fn format_enumerates_source_and_headline() {
        let items = vec![
            NewsItem {
                source: "Lexpress".into(),
                headline: "Cyclone Belal approaches".into(),
                link: None,
            },
            NewsItem {
                source: "Defimedia".into(),
                headline: "Fuel prices revised".into(),
                link: None,
            },
        ];
        let today = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        let text = format_news(&items, None, today);
        assert_eq!(
            text,
            "**📅 Daily News (2026-01-15)**\n1. [Lexpress] Cyclone Belal approaches\n2. [Defimedia] Fuel prices revised"
        );
        assert!(format_news(&items, Some("cyclone"), today).starts_with("**📅 News on 'cyclone'"));
    }

    struct EmptyFeed;

    #[async_trait]
    impl NewsFeed for EmptyFeed {
        async fn fetch(&self, _topic: Option<&str>) -> Result<Vec<NewsItem>, ToolError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn empty_feed_gives_neutral_message() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(GetNewsTool::new(Arc::new(EmptyFeed))));
        let mut session = SessionContext::new("t");
        let general = registry
            .execute(&ToolInvocation::new("get_news"), &mut session)
            .await;
        assert_eq!(general.text, "No fresh news found at the moment.");
        let topical = registry
            .execute(&ToolInvocation::new("get_news").arg("rugby"), &mut session)
            .await;
        assert_eq!(topical.text, "No fresh news found for 'rugby'.");
    }

    async fn serve_feed(hits: Arc<AtomicUsize>) -> String {
        let app = Router::new().route(
            "/rss/search",
            get(move |Query(params): Query<HashMap<String, String>>| {
                let hits = hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    let q = params.get("q").cloned().unwrap_or_default();
                    if q.contains("broken.mu") {
                        return (axum::http::StatusCode::INTERNAL_SERVER_ERROR, String::new());
                    }
                    (axum::http::StatusCode::OK, FEED.to_string())
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/rss/search?q={{query}}&hl=fr")
    }

    fn config(feed_url: String, domains: &[&str]) -> NewsConfig {
        NewsConfig {
            feed_url,
            domains: domains.iter().map(|d| d.to_string()).collect(),
            limit_per_source: 2,
            max_items: 3,
            cache_ttl_secs: 600,
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn feed_fetches_per_domain_caps_and_caches() {
        let hits = Arc::new(AtomicUsize::new(0));
        let url = serve_feed(hits.clone()).await;
        let feed = GoogleNewsRss::from_config(&config(url, &["lexpress.mu", "defimedia.info", "broken.mu"]));

        let items = feed.fetch(None).await.unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].source, "Lexpress");
        assert_eq!(items[0].headline, "Cyclone Belal approaches the east coast");
        assert_eq!(hits.load(Ordering::SeqCst), 3);

        feed.fetch(None).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 3, "general news is cached");

        feed.fetch(Some("cyclone")).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 6, "topical news is not cached");
    }

    #[tokio::test]
    async fn all_domains_failing_is_unavailable() {
        let hits = Arc::new(AtomicUsize::new(0));
        let url = serve_feed(hits).await;
        let feed = GoogleNewsRss::from_config(&config(url, &["broken.mu"]));
        assert!(matches!(
            feed.fetch(None).await,
            Err(ToolError::Unavailable { .. })
        ));
    }

    #[test]
    fn search_url_sets_query_pair() {
        let feed = GoogleNewsRss::from_config(&config(
            "https://news.google.com/rss/search?q={query}&hl=fr&gl=MU".into(),
            &[],
        ));
        let url = feed.search_url("site:lexpress.mu when:1d").unwrap();
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(pairs[0], ("q".into(), "site:lexpress.mu when:1d".into()));
        assert!(pairs.contains(&("hl".into(), "fr".into())));
    }
}
