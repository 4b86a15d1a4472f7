use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::{Artifact, ArtifactPublisher, PublishError, PublishedArtifact};

/// Lowercase, alphanumeric runs joined by single dashes.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "artifact".to_string()
    } else {
        slug
    }
}

/// Writes each artifact as a markdown file. Existing files are never overwritten.
pub struct DirectoryPublisher {
    dir: PathBuf,
}

impl DirectoryPublisher {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ArtifactPublisher for DirectoryPublisher {
    fn kind(&self) -> &str {
        "directory"
    }

    async fn publish(&self, artifact: &Artifact) -> Result<PublishedArtifact, PublishError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let base = slugify(&artifact.title);
        let mut slug = base.clone();
        let mut suffix = 1;
        while tokio::fs::try_exists(self.dir.join(format!("{}.md", slug))).await? {
            suffix += 1;
            slug = format!("{}-{}", base, suffix);
        }

        let path = self.dir.join(format!("{}.md", slug));
        let content = format!("# {}\n\n{}\n", artifact.title, artifact.body.trim_end());
        tokio::fs::write(&path, content).await?;
        tracing::info!(path = %path.display(), "artifact written");

        Ok(PublishedArtifact {
            location: path.display().to_string(),
            reference: slug,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Reading Schedule: Emma"), "reading-schedule-emma");
        assert_eq!(slugify("  Engagement:  The Hobbit!  "), "engagement-the-hobbit");
        assert_eq!(slugify("???"), "artifact");
    }

    #[tokio::test]
    async fn test_publish_writes_markdown() {
        let dir = tempdir().unwrap();
        let publisher = DirectoryPublisher::new(dir.path().join("artifacts"));
        let published = publisher
            .publish(&Artifact {
                title: "Reading Schedule: Emma".into(),
                body: "table".into(),
            })
            .await
            .unwrap();

        assert_eq!(published.reference, "reading-schedule-emma");
        let content = std::fs::read_to_string(&published.location).unwrap();
        assert_eq!(content, "# Reading Schedule: Emma\n\ntable\n");
    }

    #[tokio::test]
    async fn test_publish_never_overwrites() {
        let dir = tempdir().unwrap();
        let publisher = DirectoryPublisher::new(dir.path());
        let artifact = Artifact {
            title: "Engagement: Emma".into(),
            body: "one".into(),
        };
        let first = publisher.publish(&artifact).await.unwrap();
        let second = publisher.publish(&artifact).await.unwrap();

        assert_eq!(first.reference, "engagement-emma");
        assert_eq!(second.reference, "engagement-emma-2");
        assert!(std::path::Path::new(&first.location).exists());
    }
}
