//! Worker-side integrations: book metadata lookup and artifact publishing.
//!
//! Neither is part of the orchestration contract. Workers decide what a
//! failure means for their task (ask the user, or withhold the completion
//! signal).

mod directory;
mod github;
mod google_books;

pub use directory::{DirectoryPublisher, slugify};
pub use github::{
    DEFAULT_API_BASE as DEFAULT_GITHUB_API, GitHubIssuePublisher, is_valid_github_token,
};
pub use google_books::{DEFAULT_BASE_URL as DEFAULT_BOOKS_URL, GoogleBooksClient};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("No matching book with a page count was found")]
    NotFound,

    #[error("Metadata service rate limit reached")]
    RateLimited,

    #[error("Metadata service unreachable: {0}")]
    Transport(String),
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Publisher rejected the artifact ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Publisher unreachable: {0}")]
    Transport(String),

    #[error("Failed to write artifact: {0}")]
    Io(#[from] std::io::Error),
}

/// Search terms for a metadata lookup. Empty fields are skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookQuery {
    pub title: Option<String>,
    pub author: Option<String>,
    pub isbn: Option<String>,
}

impl BookQuery {
    pub fn new(title: &str, author: &str) -> Self {
        Self {
            title: Some(title.to_string()).filter(|t| !t.trim().is_empty()),
            author: Some(author.to_string()).filter(|a| !a.trim().is_empty()),
            isbn: None,
        }
    }

    pub fn with_isbn(mut self, isbn: Option<String>) -> Self {
        self.isbn = isbn.filter(|i| !i.trim().is_empty());
        self
    }

    /// Search expressions, most specific first.
    pub fn search_terms(&self) -> Vec<String> {
        let mut terms = Vec::new();
        if let (Some(title), Some(author)) = (&self.title, &self.author) {
            terms.push(format!("intitle:\"{}\" inauthor:\"{}\"", title, author));
        }
        if let Some(title) = &self.title {
            terms.push(format!("intitle:\"{}\"", title));
        }
        if let Some(author) = &self.author {
            terms.push(format!("inauthor:\"{}\"", author));
        }
        if let Some(isbn) = &self.isbn {
            terms.push(format!("isbn:{}", isbn));
        }
        terms
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookDetails {
    pub title: String,
    pub authors: Vec<String>,
    pub page_count: u32,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub published_date: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
}

impl BookDetails {
    pub fn authors_display(&self) -> String {
        if self.authors.is_empty() {
            "Unknown".to_string()
        } else {
            self.authors.join(", ")
        }
    }

    /// One-line description used as the lookup tool result.
    pub fn summary(&self) -> String {
        format!(
            "Found Book: {} by {}. Total Pages: {}.",
            self.title,
            self.authors_display(),
            self.page_count
        )
    }
}

#[async_trait]
pub trait MetadataLookup: Send + Sync {
    async fn get_book_details(&self, query: &BookQuery) -> Result<BookDetails, LookupError>;
}

/// Lookup used when the metadata service is disabled. Always misses.
pub struct OfflineLookup;

#[async_trait]
impl MetadataLookup for OfflineLookup {
    async fn get_book_details(&self, _query: &BookQuery) -> Result<BookDetails, LookupError> {
        Err(LookupError::NotFound)
    }
}

/// A document a worker wants posted somewhere the user can see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedArtifact {
    /// URL or file path of the published artifact
    pub location: String,
    /// Short handle, e.g. `#12` or a file slug
    pub reference: String,
}

#[async_trait]
pub trait ArtifactPublisher: Send + Sync {
    /// Short label used in logs and status output.
    fn kind(&self) -> &str;

    async fn publish(&self, artifact: &Artifact) -> Result<PublishedArtifact, PublishError>;
}
