//! HTTP page fetcher with HTML text extraction.
//!
//! Extraction mirrors what a plain-text crawler wants: the `<title>`, and
//! every visible text node joined with single spaces, with script and
//! style contents dropped.

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;

use freshrag_core::error::FetchError;
use freshrag_core::fetcher::{FetchedPage, PageFetcher};

// Some news sites refuse requests with a default library user agent.
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// [`PageFetcher`] backed by reqwest + scraper.
pub struct HttpPageFetcher {
    client: Client,
}

impl HttpPageFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::new("", format!("client build failed: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::new(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(url, format!("status {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::new(url, format!("body read failed: {e}")))?;

        // scraper's Html is !Send, so parsing stays in a sync helper and
        // never lives across an await point.
        Ok(extract_page(&body))
    }
}

/// Parse an HTML document into `{title, text}`.
pub fn extract_page(html: &str) -> FetchedPage {
    let document = Html::parse_document(html);

    let title_selector = Selector::parse("title").expect("static selector");
    let title = document
        .select(&title_selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default();

    let body_selector = Selector::parse("body").expect("static selector");
    let mut pieces: Vec<String> = Vec::new();
    if let Some(body) = document.select(&body_selector).next() {
        collect_text(*body, &mut pieces);
    }

    FetchedPage {
        title,
        text: pieces.join(" "),
    }
}

fn collect_text(node: ego_tree::NodeRef<'_, scraper::Node>, out: &mut Vec<String>) {
    for child in node.children() {
        match child.value() {
            scraper::Node::Text(text) => {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    out.push(trimmed.to_string());
                }
            }
            scraper::Node::Element(element) => {
                let name = element.name();
                if name != "script" && name != "style" && name != "noscript" {
                    collect_text(child, out);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    const SAMPLE: &str = r#"
        <html>
          <head>
            <title>  Billboard Hot 100  </title>
            <style>.hidden { display: none; }</style>
          </head>
          <body>
            <script>var tracker = "ignore me";</script>
            <h1>Chart update</h1>
            <p>New number one <em>this</em> week.</p>
          </body>
        </html>"#;

    #[test]
    fn test_extracts_title_and_visible_text() {
        let page = extract_page(SAMPLE);
        assert_eq!(page.title, "Billboard Hot 100");
        assert_eq!(page.text, "Chart update New number one this week.");
    }

    #[test]
    fn test_missing_title_and_empty_body() {
        let page = extract_page("<html><body></body></html>");
        assert_eq!(page.title, "");
        assert_eq!(page.text, "");
    }

    #[tokio::test]
    async fn test_fetch_parses_served_page() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/news");
                then.status(200)
                    .header("content-type", "text/html")
                    .body(SAMPLE);
            })
            .await;

        let fetcher = HttpPageFetcher::new(Duration::from_secs(5)).unwrap();
        let page = fetcher
            .fetch(&format!("{}/news", server.base_url()))
            .await
            .unwrap();
        assert_eq!(page.title, "Billboard Hot 100");
        assert!(page.text.contains("Chart update"));
    }

    #[tokio::test]
    async fn test_fetch_reports_http_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/gone");
                then.status(404);
            })
            .await;

        let fetcher = HttpPageFetcher::new(Duration::from_secs(5)).unwrap();
        let url = format!("{}/gone", server.base_url());
        let err = fetcher.fetch(&url).await.unwrap_err();
        assert_eq!(err.url, url);
        assert!(err.reason.contains("404"));
    }
}
