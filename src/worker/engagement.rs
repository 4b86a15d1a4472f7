use async_trait::async_trait;
use std::sync::Arc;

use super::scheduling::stored_details;
use super::{BOOK_KEY, BookChoice, Worker, parse_book_proposal, recall_book};
use crate::errors::WorkerError;
use crate::integrations::{Artifact, ArtifactPublisher, BookDetails, BookQuery, MetadataLookup};
use crate::orchestrator::TurnContext;

pub const TASK_NAME: &str = "engagement_generation";

const GENERIC_FACTS: [&str; 3] = [
    "Reading a little every day builds a habit faster than long, irregular sessions.",
    "Jotting down one question per chapter noticeably improves what you remember.",
    "Opening chapters usually plant the central tension the rest of the book resolves.",
];

fn metadata_facts(book: &BookChoice, details: &BookDetails) -> Vec<String> {
    let mut facts = Vec::new();
    match (&details.publisher, &details.published_date) {
        (Some(publisher), Some(date)) => facts.push(format!(
            "This edition of \"{}\" was published by {} ({}).",
            book.title, publisher, date
        )),
        (Some(publisher), None) => {
            facts.push(format!("This edition of \"{}\" was published by {}.", book.title, publisher))
        }
        (None, Some(date)) => facts.push(format!("\"{}\" in this edition dates from {}.", book.title, date)),
        (None, None) => {}
    }
    facts.push(format!(
        "It runs {} pages, so each chapter is a small slice of the whole.",
        details.page_count
    ));
    if !details.categories.is_empty() {
        facts.push(format!("It is usually shelved under {}.", details.categories.join(", ")));
    }
    facts
}

/// Markdown body of the first-chapter engagement pack: a summary prompt,
/// three reflection questions and three facts.
pub fn engagement_pack(book: &BookChoice, details: Option<&BookDetails>) -> String {
    let mut facts = details
        .map(|details| metadata_facts(book, details))
        .unwrap_or_default();
    for generic in GENERIC_FACTS {
        if facts.len() >= 3 {
            break;
        }
        facts.push(generic.to_string());
    }
    facts.truncate(3);

    let mut out = format!("# First chapter of \"{}\" by {}\n\n", book.title, book.author);
    out.push_str("## Summary prompt\n\n");
    out.push_str(&format!(
        "After the first chapter, write three sentences: who we met, where we are, and what {} \
         wants you to wonder about next.\n\n",
        book.author
    ));
    out.push_str("## Reflection questions\n\n");
    out.push_str("1. Which character caught your attention first, and why?\n");
    out.push_str("2. What does the opening setting tell you about the mood of the book?\n");
    out.push_str("3. What question do you most want answered by the end?\n\n");
    out.push_str("## Did you know?\n\n");
    for fact in &facts {
        out.push_str(&format!("- {}\n", fact));
    }
    out
}

/// Posts the engagement pack and signals `engagement_generation`. Needs no input.
pub struct EngagementWorker {
    lookup: Arc<dyn MetadataLookup>,
    publisher: Arc<dyn ArtifactPublisher>,
}

impl EngagementWorker {
    pub fn new(lookup: Arc<dyn MetadataLookup>, publisher: Arc<dyn ArtifactPublisher>) -> Self {
        Self { lookup, publisher }
    }
}

#[async_trait]
impl Worker for EngagementWorker {
    fn name(&self) -> &str {
        "EngagementWorker"
    }

    async fn execute(&self, ctx: &mut TurnContext) -> Result<(), WorkerError> {
        let book = match recall_book(ctx).await? {
            Some(book) => book,
            None => match ctx.user_input().and_then(parse_book_proposal) {
                Some(book) => {
                    ctx.state_mut()
                        .set_as(BOOK_KEY, &book)
                        .map_err(|e| WorkerError::Other(e.into()))?;
                    book
                }
                None => {
                    ctx.say("I've lost track of which book you're reading. Tell me the title and author and I'll prepare your first chapter.")
                        .await?;
                    return Ok(());
                }
            },
        };

        let details = match stored_details(ctx) {
            Some(details) => Some(details),
            None => {
                let query = BookQuery::new(&book.title, &book.author).with_isbn(book.isbn.clone());
                match self.lookup.get_book_details(&query).await {
                    Ok(details) => Some(details),
                    Err(err) => {
                        tracing::debug!(error = %err, "no metadata for engagement facts");
                        None
                    }
                }
            }
        };

        let artifact = Artifact {
            title: format!("Engagement: {}", book.title),
            body: engagement_pack(&book, details.as_ref()),
        };

        let published = match self.publisher.publish(&artifact).await {
            Ok(published) => published,
            Err(err) => {
                tracing::warn!(error = %err, publisher = self.publisher.kind(), "engagement pack not published");
                ctx.say(format!(
                    "I prepared your first-chapter questions but couldn't post them ({}). \
                     Say anything when you'd like me to try again.",
                    err
                ))
                .await?;
                return Ok(());
            }
        };

        ctx.say(format!(
            "Your first-chapter engagement pack for \"{}\" is posted at {}. Happy reading!",
            book.title, published.location
        ))
        .await?;
        ctx.complete_task(
            TASK_NAME,
            &format!("Engagement pack posted: {}", published.reference),
        )
        .await?;
        Ok(())
    }
}
