use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{Artifact, ArtifactPublisher, PublishError, PublishedArtifact};

pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Known GitHub token prefixes.
/// See: https://github.blog/2021-04-05-behind-githubs-new-authentication-token-formats/
const GITHUB_TOKEN_PREFIXES: &[&str] = &[
    "ghp_",        // Personal access tokens (classic)
    "github_pat_", // Fine-grained personal access tokens
    "gho_",        // OAuth access tokens
    "ghu_",        // GitHub App user-to-server tokens
    "ghs_",        // GitHub App server-to-server tokens
    "ghr_",        // GitHub App refresh tokens
];

/// Format check on a token's prefix. Does not contact GitHub.
pub fn is_valid_github_token(token: &str) -> bool {
    !token.is_empty()
        && GITHUB_TOKEN_PREFIXES
            .iter()
            .any(|prefix| token.starts_with(prefix))
}

#[derive(Debug, Serialize)]
struct NewIssue<'a> {
    title: &'a str,
    body: &'a str,
}

/// The subset of the created issue we report back.
#[derive(Debug, Deserialize)]
struct CreatedIssue {
    number: i64,
    html_url: String,
}

/// Publishes artifacts as issues in one repository.
pub struct GitHubIssuePublisher {
    client: reqwest::Client,
    api_base: String,
    owner: String,
    repo: String,
    token: String,
}

impl GitHubIssuePublisher {
    pub fn new(api_base: &str, owner: &str, repo: &str, token: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
            token: token.to_string(),
        }
    }

    pub fn owner_repo(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

#[async_trait]
impl ArtifactPublisher for GitHubIssuePublisher {
    fn kind(&self) -> &str {
        "github"
    }

    async fn publish(&self, artifact: &Artifact) -> Result<PublishedArtifact, PublishError> {
        let url = format!("{}/repos/{}/{}/issues", self.api_base, self.owner, self.repo);
        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "bookish")
            .json(&NewIssue {
                title: &artifact.title,
                body: &artifact.body,
            })
            .send()
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            tracing::warn!(repo = %self.owner_repo(), status = status.as_u16(), "GitHub rejected issue");
            return Err(PublishError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let issue: CreatedIssue = resp
            .json()
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))?;
        tracing::info!(repo = %self.owner_repo(), number = issue.number, "issue created");

        Ok(PublishedArtifact {
            location: issue.html_url,
            reference: format!("#{}", issue.number),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn artifact() -> Artifact {
        Artifact {
            title: "Reading Schedule: Emma".to_string(),
            body: "| Date | Reading Session |".to_string(),
        }
    }

    #[test]
    fn test_valid_token_prefixes() {
        assert!(is_valid_github_token("ghp_abc123def456"));
        assert!(is_valid_github_token("github_pat_11ABCDEF"));
        assert!(!is_valid_github_token(""));
        assert!(!is_valid_github_token("not-a-token"));
    }

    #[tokio::test]
    async fn test_publish_posts_title_and_body_only() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/reader/shelf/issues"))
            .and(header("Authorization", "Bearer ghp_test"))
            .and(body_json(json!({
                "title": "Reading Schedule: Emma",
                "body": "| Date | Reading Session |"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "number": 7,
                "html_url": "https://github.com/reader/shelf/issues/7"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let publisher = GitHubIssuePublisher::new(&server.uri(), "reader", "shelf", "ghp_test");
        let published = publisher.publish(&artifact()).await.unwrap();
        assert_eq!(published.reference, "#7");
        assert_eq!(published.location, "https://github.com/reader/shelf/issues/7");
    }

    #[tokio::test]
    async fn test_publish_rejected_status_surfaces() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Bad credentials"))
            .mount(&server)
            .await;

        let publisher = GitHubIssuePublisher::new(&server.uri(), "reader", "shelf", "ghp_bad");
        match publisher.publish(&artifact()).await {
            Err(PublishError::Rejected { status, message }) => {
                assert_eq!(status, 401);
                assert!(message.contains("Bad credentials"));
            }
            other => panic!("Expected rejection, got {:?}", other),
        }
    }
}
