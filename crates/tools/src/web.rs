//! `browse_web` — fetch a page as readable text, or run a web search.

use std::time::Duration;

use async_trait::async_trait;
use localecho_config::WebConfig;
use localecho_core::error::ToolError;
use localecho_core::session::SessionContext;
use localecho_core::tool::{ParamKind, ParamSpec, Tool, ToolArgs};
use scraper::{Html, Selector};
use tracing::debug;

use crate::text::{truncate_chars, truncate_lines};

pub struct BrowseWebTool {
    client: reqwest::Client,
    search_url: String,
    max_chars: usize,
    max_lines: usize,
}

impl BrowseWebTool {
    pub fn from_config(config: &WebConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("Mozilla/5.0 (compatible; localecho)")
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            search_url: config.search_url.clone(),
            max_chars: config.max_chars,
            max_lines: 50,
        }
    }

    pub fn with_max_lines(mut self, max_lines: usize) -> Self {
        self.max_lines = max_lines;
        self
    }

    async fn get(&self, request: reqwest::RequestBuilder) -> Result<String, ToolError> {
        let unavailable = |reason: String| ToolError::Unavailable {
            service: "Web".into(),
            reason,
        };
        let response = request.send().await.map_err(|e| unavailable(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(unavailable(format!("HTTP {}", status.as_u16())));
        }
        response.text().await.map_err(|e| unavailable(e.to_string()))
    }
}

fn is_url(target: &str) -> bool {
    target.starts_with("http://") || target.starts_with("https://")
}

/// Title plus the text of headings, paragraphs and list items, one per line.
pub fn readable_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut lines = Vec::new();

    if let Ok(sel) = Selector::parse("title") {
        if let Some(el) = document.select(&sel).next() {
            let title = el.text().collect::<String>().trim().to_string();
            if !title.is_empty() {
                lines.push(format!("Title: {title}"));
            }
        }
    }

    if let Ok(sel) = Selector::parse("h1, h2, h3, h4, p, li, blockquote, pre") {
        for el in document.select(&sel) {
            let text = el.text().collect::<Vec<_>>().join(" ");
            let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
            if text.is_empty() {
                continue;
            }
            match el.value().name() {
                "h1" | "h2" | "h3" | "h4" => lines.push(format!("## {text}")),
                "li" => lines.push(format!("- {text}")),
                _ => lines.push(text),
            }
        }
    }

    lines.join("\n")
}

/// Titles, snippets and links from an HTML search results page.
pub fn search_results(html: &str) -> Vec<(String, String, Option<String>)> {
    let document = Html::parse_document(html);
    let (Ok(result), Ok(link), Ok(snippet)) = (
        Selector::parse(".result"),
        Selector::parse(".result__a"),
        Selector::parse(".result__snippet"),
    ) else {
        return Vec::new();
    };

    let collapse = |s: String| s.split_whitespace().collect::<Vec<_>>().join(" ");
    document
        .select(&result)
        .filter_map(|el| {
            let anchor = el.select(&link).next()?;
            let title = collapse(anchor.text().collect());
            if title.is_empty() {
                return None;
            }
            let text = el
                .select(&snippet)
                .next()
                .map(|s| collapse(s.text().collect()))
                .unwrap_or_default();
            let href = anchor.value().attr("href").map(str::to_string);
            Some((title, text, href))
        })
        .collect()
}

static BROWSE_PARAMS: [ParamSpec; 1] = [ParamSpec::required("target", ParamKind::Str)];

#[async_trait]
impl Tool for BrowseWebTool {
    fn name(&self) -> &'static str {
        "browse_web"
    }

    fn description(&self) -> &'static str {
        "Read a web page (give a full URL) or search the web (give a query)."
    }

    fn params(&self) -> &'static [ParamSpec] {
        &BROWSE_PARAMS
    }

    fn example(&self) -> Option<&'static str> {
        Some("browse_web(\"https://news.ycombinator.com\")")
    }

    async fn execute(&self, args: ToolArgs, _session: &mut SessionContext) -> Result<String, ToolError> {
        let target = args.require_str("target")?;

        let text = if is_url(target) {
            debug!(url = %target, "Fetching page");
            let html = self.get(self.client.get(target)).await?;
            let text = readable_text(&html);
            if text.is_empty() {
                format!("The page at {target} has no readable text.")
            } else {
                text
            }
        } else {
            debug!(query = %target, "Searching the web");
            let html = self
                .get(self.client.get(&self.search_url).query(&[("q", target)]))
                .await?;
            let results = search_results(&html);
            if results.is_empty() {
                format!("No web results found for '{target}'.")
            } else {
                let mut out = format!("Search results for '{target}':");
                for (i, (title, snippet, href)) in results.iter().enumerate() {
                    out.push_str(&format!("\n{}. {title}", i + 1));
                    if !snippet.is_empty() {
                        out.push_str(&format!("\n   {snippet}"));
                    }
                    if let Some(href) = href {
                        out.push_str(&format!("\n   {href}"));
                    }
                }
                out
            }
        };

        Ok(truncate_lines(&truncate_chars(&text, self.max_chars), self.max_lines))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::response::Html as HtmlResponse;
    use axum::routing::get;
    use localecho_core::tool::{ToolInvocation, ToolRegistry};

    const PAGE: &str = r#"<html><head><title> Cyclone update </title>
<style>body { color: red }</style><script>var x = "hidden";</script></head>
<body><h1>Cyclone Belal</h1><p>Class 2 warning   in effect.</p>
<ul><li>Schools closed</li><li></li></ul></body></html>"#;

    const RESULTS: &str = r#"<html><body>
<div class="result"><a class="result__a" href="https://a.example">First   hit</a>
<a class="result__snippet">About the first.</a></div>
<div class="result"><a class="result__a" href="https://b.example">Second hit</a></div>
<div class="result"><span>no anchor</span></div>
</body></html>"#;

    #[test]
    fn readable_text_drops_scripts_and_styles() {
        let text = readable_text(PAGE);
        assert_eq!(
            text,
            "Title: Cyclone update\n## Cyclone Belal\nClass 2 warning in effect.\n- Schools closed"
        );
        assert!(!text.contains("hidden"));
    }

    #[test]
    fn search_results_are_extracted() {
        let results = search_results(RESULTS);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, "First hit");
        assert_eq!(results[0].1, "About the first.");
        assert_eq!(results[1].2.as_deref(), Some("https://b.example"));
    }

    async fn serve() -> String {
        let app = Router::new()
            .route("/page", get(|| async { HtmlResponse(PAGE) }))
            .route("/search", get(|| async { HtmlResponse(RESULTS) }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn browse_url_and_query() {
        let base = serve().await;
        let tool = BrowseWebTool::from_config(&WebConfig {
            search_url: format!("{base}/search"),
            timeout_secs: 5,
            max_chars: 6000,
        });
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(tool));
        let mut session = SessionContext::new("t");

        let page = registry
            .execute(
                &ToolInvocation::new("browse_web").arg(format!("{base}/page")),
                &mut session,
            )
            .await;
        assert!(page.text.contains("## Cyclone Belal"), "{}", page.text);

        let search = registry
            .execute(&ToolInvocation::new("browse_web").arg("cyclone belal"), &mut session)
            .await;
        assert!(search.text.starts_with("Search results for 'cyclone belal':\n1. First hit"));
    }

    #[tokio::test]
    async fn unreachable_site_is_error_observation() {
        let tool = BrowseWebTool::from_config(&WebConfig {
            search_url: "http://127.0.0.1:9/search".into(),
            timeout_secs: 2,
            max_chars: 100,
        });
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(tool));
        let mut session = SessionContext::new("t");
        let obs = registry
            .execute(&ToolInvocation::new("browse_web").arg("anything"), &mut session)
            .await;
        assert!(obs.is_error);
        assert!(obs.text.starts_with("Error: Web unavailable"));
    }
}
