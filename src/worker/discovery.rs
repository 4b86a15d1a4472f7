use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;

use super::{BOOK_KEY, BookChoice, Worker};
use crate::errors::WorkerError;
use crate::orchestrator::TurnContext;

const GREETED_KEY: &str = "discovery_greeted";
const CANDIDATE_KEY: &str = "candidate_book";

pub const TASK_NAME: &str = "book_discovery";

static ISBN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bisbn[:\s]*([0-9][0-9\-]{8,}[0-9xX])").expect("isbn regex is valid")
});

// Lead-ins people put before a title.
static LEAD_IN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:i(?:'d| would)? (?:like|want|love) to read|i want|let'?s read|how about|maybe|read|i'm thinking of)\s+",
    )
    .expect("lead-in regex is valid")
});

const AFFIRMATIVE: &[&str] = &[
    "yes", "y", "yep", "yeah", "sure", "ok", "okay", "correct", "confirm", "sounds good",
    "let's do it", "go ahead", "perfect",
];
const NEGATIVE: &[&str] = &["no", "n", "nope", "nah", "not really", "something else", "different"];

fn normalized(text: &str) -> String {
    text.trim()
        .trim_end_matches(['.', '!'])
        .trim()
        .to_ascii_lowercase()
}

fn is_affirmative(text: &str) -> bool {
    let reply = normalized(text);
    AFFIRMATIVE
        .iter()
        .any(|word| reply == *word || reply.starts_with(&format!("{} ", word)) || reply.starts_with(&format!("{},", word)))
}

fn is_negative(text: &str) -> bool {
    let reply = normalized(text);
    NEGATIVE
        .iter()
        .any(|word| reply == *word || reply.starts_with(&format!("{} ", word)) || reply.starts_with(&format!("{},", word)))
}

fn trim_title(text: &str) -> &str {
    text.trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '*' || c == '_')
        .trim()
}

/// Parse `<title> by <author>`, with an optional `isbn:<n>` anywhere.
pub fn parse_book_proposal(text: &str) -> Option<BookChoice> {
    let isbn = ISBN_REGEX
        .captures(text)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().replace('-', ""));
    let without_isbn = ISBN_REGEX.replace_all(text, "");
    let cleaned = LEAD_IN_REGEX.replace(without_isbn.trim(), "");
    let cleaned = cleaned.trim().trim_end_matches(['.', '!', '?', ',']).trim();

    // ASCII lowercasing keeps byte offsets aligned with `cleaned`.
    let split = cleaned.to_ascii_lowercase().rfind(" by ")?;
    let title = trim_title(&cleaned[..split]);
    let author = cleaned[split + 4..]
        .trim()
        .trim_end_matches(['(', ')', ','])
        .trim();

    if title.is_empty() || author.is_empty() {
        return None;
    }

    Some(BookChoice {
        title: title.to_string(),
        author: author.to_string(),
        isbn,
    })
}

/// Helps the user settle on one book, then signals `book_discovery`.
pub struct DiscoveryWorker;

impl DiscoveryWorker {
    pub fn new() -> Self {
        Self
    }

    async fn ask_for_book(&self, ctx: &mut TurnContext) -> Result<(), WorkerError> {
        if !ctx.state().flag(GREETED_KEY) {
            ctx.state_mut().set(GREETED_KEY, serde_json::json!(true));
            ctx.say(
                "Hi! I'm your reading companion. I'll help you pick a book, plan a reading \
                 schedule and get you started on the first chapter.",
            )
            .await?;
        }
        ctx.say("What would you like to read? Tell me the title and author, e.g. \"Emma by Jane Austen\".")
            .await?;
        Ok(())
    }

    async fn propose(&self, ctx: &mut TurnContext, book: BookChoice) -> Result<(), WorkerError> {
        ctx.say(format!(
            "You'd like to read \"{}\" by {}. Shall we go with this one? (yes/no)",
            book.title, book.author
        ))
        .await?;
        ctx.state_mut()
            .set_as(CANDIDATE_KEY, &book)
            .map_err(|e| WorkerError::Other(e.into()))?;
        Ok(())
    }

    async fn confirm(&self, ctx: &mut TurnContext, book: BookChoice) -> Result<(), WorkerError> {
        ctx.state_mut().remove(CANDIDATE_KEY);
        ctx.state_mut()
            .set_as(BOOK_KEY, &book)
            .map_err(|e| WorkerError::Other(e.into()))?;
        ctx.say(format!("Great choice! \"{}\" it is.", book.title)).await?;

        let mut summary = format!("Book identified: {}", book);
        if let Some(isbn) = &book.isbn {
            summary.push_str(&format!(" isbn:{}", isbn));
        }
        ctx.complete_task(TASK_NAME, &summary).await?;
        Ok(())
    }
}

impl Default for DiscoveryWorker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Worker for DiscoveryWorker {
    fn name(&self) -> &str {
        "DiscoveryWorker"
    }

    async fn execute(&self, ctx: &mut TurnContext) -> Result<(), WorkerError> {
        let Some(input) = ctx.user_input().map(str::to_string) else {
            return self.ask_for_book(ctx).await;
        };

        let candidate = ctx.state().get_as::<BookChoice>(CANDIDATE_KEY);

        if let Some(candidate) = candidate {
            if is_affirmative(&input) {
                return self.confirm(ctx, candidate).await;
            }
            if is_negative(&input) {
                ctx.state_mut().remove(CANDIDATE_KEY);
                ctx.say("No problem. What would you like to read instead?").await?;
                return Ok(());
            }
            if let Some(book) = parse_book_proposal(&input) {
                return self.propose(ctx, book).await;
            }
            ctx.say(format!(
                "Should we go with \"{}\" by {}? Please answer yes or no.",
                candidate.title, candidate.author
            ))
            .await?;
            return Ok(());
        }

        match parse_book_proposal(&input) {
            Some(book) => self.propose(ctx, book).await,
            None => {
                if ctx.state().flag(GREETED_KEY) {
                    ctx.say(
                        "I can only help with choosing and planning a book to read. \
                         Which book do you have in mind? (title by author)",
                    )
                    .await?;
                    Ok(())
                } else {
                    self.ask_for_book(ctx).await
                }
            }
        }
    }
}
