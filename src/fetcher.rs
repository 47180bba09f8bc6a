use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use reqwest::Client;
use scraper::Html;
use tracing::{debug, error, info};

use crate::assistant::ResumeAssistant;
use crate::error::{Result, TailorError, cause};
use crate::models::JobDescription;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

// Elements whose text never reaches the reader.
const HIDDEN_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];

pub struct JobFetcher {
    client: Client,
    assistant: Arc<ResumeAssistant>,
}

impl JobFetcher {
    pub fn new(assistant: Arc<ResumeAssistant>) -> Result<Self> {
        Self::with_timeout(assistant, FETCH_TIMEOUT)
    }

    pub fn with_timeout(assistant: Arc<ResumeAssistant>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| TailorError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, assistant })
    }

    pub async fn fetch_and_parse(&self, url: &str) -> Result<JobDescription> {
        let html = self.fetch_page(url).await.map_err(|e| {
            error!(url, "Fetching job post failed: {:#}", e);
            TailorError::Fetch(cause(&e))
        })?;

        let text = clean_html(&html);
        if text.is_empty() {
            return Err(TailorError::Scrape(format!(
                "no readable content found at {}",
                url
            )));
        }
        debug!(url, chars = text.len(), "Cleaned job post");

        let job = self.assistant.parse_jd(&text, url).await?;
        info!(url, role = %job.role, company = %job.company, "Extracted job description");
        Ok(job)
    }

    async fn fetch_page(&self, url: &str) -> anyhow::Result<String> {
        info!(url, "Fetching job post");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Request failed")?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("HTTP error: {}", status));
        }

        response
            .text()
            .await
            .context("Failed to read response body")
    }
}

/// Reduces an HTML page to its visible text, one line per text node, in
/// document order. Script, style and other non-rendered content is dropped.
pub fn clean_html(html: &str) -> String {
    let document = Html::parse_document(html);

    document
        .root_element()
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let hidden = node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .is_some_and(|el| HIDDEN_ELEMENTS.contains(&el.name()))
            });
            if hidden {
                return None;
            }
            let line = text.split_whitespace().collect::<Vec<_>>().join(" ");
            (!line.is_empty()).then_some(line)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
