//! Google Books volume search.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::{BookDetails, BookQuery, LookupError, MetadataLookup};

pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com";

/// Only the first few hits are worth inspecting for a page count.
const ITEMS_TO_INSPECT: usize = 3;

#[derive(Debug, Deserialize)]
struct VolumesResponse {
    #[serde(default)]
    items: Vec<Volume>,
}

#[derive(Debug, Deserialize)]
struct Volume {
    #[serde(rename = "volumeInfo", default)]
    volume_info: VolumeInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VolumeInfo {
    title: Option<String>,
    #[serde(default)]
    authors: Vec<String>,
    page_count: Option<u32>,
    publisher: Option<String>,
    published_date: Option<String>,
    #[serde(default)]
    categories: Vec<String>,
}

impl VolumeInfo {
    fn into_details(self) -> Option<BookDetails> {
        let page_count = self.page_count.filter(|count| *count > 0)?;
        Some(BookDetails {
            title: self.title.unwrap_or_else(|| "Unknown".to_string()),
            authors: self.authors,
            page_count,
            publisher: self.publisher,
            published_date: self.published_date,
            categories: self.categories,
        })
    }
}

pub struct GoogleBooksClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    max_retries: u32,
    backoff: Duration,
}

impl GoogleBooksClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        if api_key.is_none() {
            tracing::warn!("GOOGLE_BOOKS_API_KEY not set; metadata lookups may hit rate limits");
        }
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|key| !key.is_empty()),
            max_retries: 3,
            backoff: Duration::from_secs(1),
        }
    }

    /// Attempts per search term, with exponential backoff starting at `backoff`.
    pub fn with_retries(mut self, max_retries: u32, backoff: Duration) -> Self {
        self.max_retries = max_retries.max(1);
        self.backoff = backoff;
        self
    }

    /// One search term with retries. `Ok(None)` means the service answered
    /// but nothing carried a page count.
    async fn search(&self, term: &str) -> Result<Option<BookDetails>, LookupError> {
        let url = format!("{}/books/v1/volumes", self.base_url);
        let mut last_error = LookupError::NotFound;

        for attempt in 0..self.max_retries {
            let mut request = self.client.get(&url).query(&[("q", term)]);
            if let Some(key) = &self.api_key {
                request = request.query(&[("key", key.as_str())]);
            }

            tracing::debug!(term, attempt = attempt + 1, "querying Google Books");
            match request.timeout(Duration::from_secs(10)).send().await {
                Ok(resp) if resp.status().is_success() => {
                    let body: VolumesResponse = resp
                        .json()
                        .await
                        .map_err(|e| LookupError::Transport(e.to_string()))?;
                    tracing::debug!(term, results = body.items.len(), "Google Books responded");

                    return Ok(body
                        .items
                        .into_iter()
                        .take(ITEMS_TO_INSPECT)
                        .find_map(|volume| volume.volume_info.into_details()));
                }
                Ok(resp) if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS => {
                    last_error = LookupError::RateLimited;
                }
                Ok(resp) => {
                    last_error = LookupError::Transport(format!("HTTP {}", resp.status()));
                }
                Err(e) => {
                    last_error = LookupError::Transport(e.to_string());
                }
            }

            tracing::warn!(term, attempt = attempt + 1, error = %last_error, "metadata lookup attempt failed");
            if attempt + 1 < self.max_retries {
                tokio::time::sleep(self.backoff * 2u32.pow(attempt)).await;
            }
        }

        tracing::error!(term, attempts = self.max_retries, "metadata lookup gave up");
        Err(last_error)
    }
}

#[async_trait]
impl MetadataLookup for GoogleBooksClient {
    async fn get_book_details(&self, query: &BookQuery) -> Result<BookDetails, LookupError> {
        let mut answered = false;
        let mut last_error = None;

        for term in query.search_terms() {
            match self.search(&term).await {
                Ok(Some(details)) => {
                    tracing::info!(title = %details.title, pages = details.page_count, "book details found");
                    return Ok(details);
                }
                Ok(None) => answered = true,
                Err(err) => last_error = Some(err),
            }
        }

        match last_error {
            Some(err) if !answered => Err(err),
            _ => Err(LookupError::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, key: Option<&str>) -> GoogleBooksClient {
        GoogleBooksClient::new(&server.uri(), key.map(str::to_string))
            .with_retries(3, Duration::from_millis(1))
    }

    fn volume(title: &str, pages: Option<u32>) -> serde_json::Value {
        let mut info = json!({ "title": title, "authors": ["Jane Austen"] });
        if let Some(pages) = pages {
            info["pageCount"] = json!(pages);
        }
        json!({ "volumeInfo": info })
    }

    #[tokio::test]
    async fn test_finds_page_count_on_combined_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/books/v1/volumes"))
            .and(query_param("q", "intitle:\"Emma\" inauthor:\"Jane Austen\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [volume("Emma", Some(474))]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let details = client(&server, None)
            .get_book_details(&BookQuery::new("Emma", "Jane Austen"))
            .await
            .unwrap();
        assert_eq!(details.page_count, 474);
        assert_eq!(details.authors, vec!["Jane Austen"]);
    }

    #[tokio::test]
    async fn test_inspects_first_three_items_only() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("q", "intitle:\"Emma\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    volume("Emma (abridged)", None),
                    volume("Emma", Some(0)),
                    volume("Emma", Some(512)),
                    volume("Emma", Some(999)),
                ]
            })))
            .mount(&server)
            .await;

        let details = client(&server, None)
            .get_book_details(&BookQuery::new("Emma", ""))
            .await
            .unwrap();
        assert_eq!(details.page_count, 512);
    }

    #[tokio::test]
    async fn test_falls_through_to_next_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("q", "intitle:\"Emma\" inauthor:\"Jane Austen\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("q", "intitle:\"Emma\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [volume("Emma", Some(400))]
            })))
            .mount(&server)
            .await;

        let details = client(&server, None)
            .get_book_details(&BookQuery::new("Emma", "Jane Austen"))
            .await
            .unwrap();
        assert_eq!(details.page_count, 400);
    }

    #[tokio::test]
    async fn test_retries_after_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [volume("Emma", Some(474))]
            })))
            .mount(&server)
            .await;

        let details = client(&server, None)
            .get_book_details(&BookQuery::new("Emma", "Jane Austen"))
            .await
            .unwrap();
        assert_eq!(details.page_count, 474);
    }

    #[tokio::test]
    async fn test_rate_limit_reported_after_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .expect(3)
            .mount(&server)
            .await;

        let result = client(&server, None)
            .get_book_details(&BookQuery::new("Emma", ""))
            .await;
        assert!(matches!(result, Err(LookupError::RateLimited)));
    }

    #[tokio::test]
    async fn test_api_key_sent_when_configured() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [volume("Emma", Some(474))]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let details = client(&server, Some("secret"))
            .get_book_details(&BookQuery::new("Emma", "Jane Austen"))
            .await;
        assert!(details.is_ok());
    }

    #[tokio::test]
    async fn test_no_page_count_anywhere_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [volume("Emma", None)]
            })))
            .mount(&server)
            .await;

        let result = client(&server, None)
            .get_book_details(&BookQuery::new("Emma", "Jane Austen"))
            .await;
        assert!(matches!(result, Err(LookupError::NotFound)));
    }
}
