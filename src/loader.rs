use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use spider_client::shapes::request::{ReturnFormat, ReturnFormatHandling};
use spider_client::{RequestParams, Spider};
use tracing::warn;

const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 2000;
const REQUEST_TIMEOUT_SECS: u64 = 30;
const USER_AGENT: &str = concat!("lot_scraper/", env!("CARGO_PKG_VERSION"));

/// One fetched page, ready for classification.
pub struct LoadedPage {
    pub url: String,
    pub html: String,
    pub status: Option<i32>,
    pub rendered: bool,
    pub latency_ms: i64,
}

/// Fetch a page, optionally through the rendering service for
/// script-heavy sites. A failed render degrades to a plain fetch so a
/// missing API key never blocks classification.
pub async fn fetch_page(url: &str, render: bool) -> Result<LoadedPage> {
    if render {
        match fetch_rendered(url).await {
            Ok(page) => return Ok(page),
            Err(e) => warn!("Rendered fetch failed for {}: {}; using plain fetch", url, e),
        }
    }
    fetch_plain(url).await
}

async fn fetch_plain(url: &str) -> Result<LoadedPage> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .user_agent(USER_AGENT)
        .build()?;

    let start = Instant::now();
    for attempt in 0..=MAX_RETRIES {
        let response = client.get(url).send().await;

        match response {
            Ok(resp) => {
                let status = resp.status();
                let retryable = status.as_u16() == 429 || status.is_server_error();
                if !retryable || attempt == MAX_RETRIES {
                    let html = resp.text().await.context("reading response body")?;
                    return Ok(LoadedPage {
                        url: url.to_string(),
                        html,
                        status: Some(status.as_u16() as i32),
                        rendered: false,
                        latency_ms: start.elapsed().as_millis() as i64,
                    });
                }
            }
            Err(e) => {
                if attempt == MAX_RETRIES {
                    return Err(e).context(format!("fetching {}", url));
                }
            }
        }

        let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
        warn!(
            "Retrying {} (attempt {}/{}), backing off {:.1}s",
            url,
            attempt + 1,
            MAX_RETRIES,
            backoff.as_secs_f64()
        );
        tokio::time::sleep(backoff).await;
    }

    unreachable!("retry loop always returns")
}

/// Fetch through the rendering API, returning the post-render HTML.
async fn fetch_rendered(url: &str) -> Result<LoadedPage> {
    let api_key = std::env::var("SPIDER_API_KEY")
        .map_err(|_| anyhow!("SPIDER_API_KEY environment variable must be set"))?;
    let spider = Spider::new(Some(api_key))
        .map_err(|e| anyhow!("Failed to create Spider client: {}", e))?;

    let params = RequestParams {
        return_format: Some(ReturnFormatHandling::Single(ReturnFormat::Raw)),
        ..Default::default()
    };

    let start = Instant::now();
    let response = spider
        .scrape_url(url, Some(params), "application/json")
        .await
        .map_err(|e| anyhow!("Spider scrape failed: {}", e))?;
    let latency_ms = start.elapsed().as_millis() as i64;

    let parsed: serde_json::Value = match response.as_str() {
        Some(s) => serde_json::from_str(s).unwrap_or(response.clone()),
        None => response,
    };
    let first = parsed.as_array().and_then(|arr| arr.first());

    let html = first
        .and_then(|obj| obj.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow!("No content in spider response"))?;
    let status = first
        .and_then(|obj| obj.get("status"))
        .and_then(|s| s.as_i64())
        .map(|s| s as i32);

    Ok(LoadedPage {
        url: url.to_string(),
        html,
        status,
        rendered: true,
        latency_ms,
    })
}
