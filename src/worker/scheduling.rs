//! Reading schedule planning.

use async_trait::async_trait;
use chrono::{Days, Local, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::{Arc, LazyLock};

use super::{BOOK_KEY, BookChoice, Worker, parse_book_proposal, recall_book};
use crate::errors::WorkerError;
use crate::integrations::{
    Artifact, ArtifactPublisher, BookDetails, BookQuery, LookupError, MetadataLookup,
};
use crate::orchestrator::TurnContext;

pub const TASK_NAME: &str = "schedule_creation";
pub const DEFAULT_PAGES_PER_MINUTE: f64 = 0.5;
/// Largest reading speed a schedule is planned for.
pub const MAX_PAGES_PER_MINUTE: f64 = 20.0;
/// Largest page count accepted from a reply or a lookup.
pub const MAX_PAGE_COUNT: u32 = 100_000;

pub(crate) const DETAILS_KEY: &str = "book_details";
const PAGE_COUNT_KEY: &str = "page_count";
const LOOKUP_DONE_KEY: &str = "metadata_checked";
const SCHEDULE_KEY: &str = "reading_schedule";

const LOOKUP_TOOL: &str = "get_book_details";
const DATE_TOOL: &str = "get_today_and_tomorrow";
const LOOKUP_MISS: &str =
    "Could not find book details with page counts. Please ask the user for the page count.";

static DURATION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(hours?|hrs?|h|minutes?|mins?|m)?\b")
        .expect("duration regex is valid")
});

static NUMBER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("number regex is valid"));

/// Daily reading time in minutes from replies like `30`, `45 minutes`,
/// `1 hour`, `1.5 hours` or `half an hour`.
pub fn parse_reading_minutes(text: &str) -> Option<u32> {
    let lower = text.to_ascii_lowercase();
    if lower.contains("half an hour") || lower.contains("half hour") {
        return Some(30);
    }
    if lower.contains("an hour") {
        return Some(60);
    }

    let cap = DURATION_REGEX.captures(&lower)?;
    let amount: f64 = cap.get(1)?.as_str().parse().ok()?;
    let is_hours = cap
        .get(2)
        .is_some_and(|unit| unit.as_str().starts_with('h'));
    let minutes = if is_hours { amount * 60.0 } else { amount };

    let minutes = minutes.round();
    (1.0..=24.0 * 60.0).contains(&minutes).then_some(minutes as u32)
}

fn parse_page_count(text: &str) -> Option<u32> {
    NUMBER_REGEX
        .find(text)
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .filter(|pages| (1..=MAX_PAGE_COUNT).contains(pages))
}

/// The reply names a number, but too large to be a page count.
fn exceeds_page_limit(text: &str) -> bool {
    NUMBER_REGEX
        .find(text)
        .is_some_and(|m| m.as_str().parse::<u32>().ok().is_none_or(|n| n > MAX_PAGE_COUNT))
}

/// Source of "today". Fixed in tests, the local clock otherwise.
#[derive(Debug, Clone, Copy)]
pub struct DateTool {
    fixed: Option<NaiveDate>,
}

impl DateTool {
    pub fn system() -> Self {
        Self { fixed: None }
    }

    pub fn fixed(today: NaiveDate) -> Self {
        Self { fixed: Some(today) }
    }

    pub fn today(&self) -> NaiveDate {
        self.fixed.unwrap_or_else(|| Local::now().date_naive())
    }

    pub fn tomorrow(&self) -> NaiveDate {
        self.today() + Days::new(1)
    }

    pub fn describe(&self) -> String {
        format!(
            "Today is {}. Tomorrow is {}.",
            self.today().format("%A, %Y-%m-%d"),
            self.tomorrow().format("%A, %Y-%m-%d")
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRow {
    pub date: NaiveDate,
    pub session: String,
    pub page_start: u32,
    pub page_end: u32,
    pub pages: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingSchedule {
    pub total_pages: u32,
    pub minutes_per_day: u32,
    pub pages_per_day: u32,
    pub rows: Vec<ScheduleRow>,
}

impl ReadingSchedule {
    pub fn days(&self) -> usize {
        self.rows.len()
    }

    pub fn start(&self) -> Option<NaiveDate> {
        self.rows.first().map(|row| row.date)
    }

    pub fn finish(&self) -> Option<NaiveDate> {
        self.rows.last().map(|row| row.date)
    }

    pub fn to_markdown(&self) -> String {
        let mut out = String::from(
            "| Date | Reading Session | Page Start | Page End | Pages |\n\
             |------|-----------------|------------|----------|-------|\n",
        );
        for row in &self.rows {
            out.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                row.date.format("%a, %Y-%m-%d"),
                row.session,
                row.page_start,
                row.page_end,
                row.pages
            ));
        }
        out
    }
}

/// Split `total_pages` into daily sessions starting on `start`.
///
/// `pages_per_day = max(1, floor(minutes * pages_per_minute))`; the last
/// session ends exactly on the final page.
pub fn build_schedule(
    total_pages: u32,
    minutes_per_day: u32,
    pages_per_minute: f64,
    start: NaiveDate,
) -> ReadingSchedule {
    // `as` saturates: huge speeds give u32::MAX, NaN gives 0.
    let pages_per_day = ((minutes_per_day as f64 * pages_per_minute).floor() as u32).max(1);

    let mut rows = Vec::new();
    let mut page: u32 = 1;
    let mut day: u32 = 1;
    while page <= total_pages {
        let Some(date) = start.checked_add_days(Days::new(u64::from(day - 1))) else {
            tracing::warn!(day, "schedule runs past the last representable date; truncating");
            break;
        };
        let page_end = page.saturating_add(pages_per_day - 1).min(total_pages);
        rows.push(ScheduleRow {
            date,
            session: format!("Day {}", day),
            page_start: page,
            page_end,
            pages: page_end - page + 1,
        });
        match page_end.checked_add(1) {
            Some(next) => page = next,
            None => break,
        }
        day = day.saturating_add(1);
    }

    ReadingSchedule {
        total_pages,
        minutes_per_day,
        pages_per_day,
        rows,
    }
}

/// Finds the page count, asks for daily reading time, publishes the
/// schedule and signals `schedule_creation`.
pub struct SchedulingWorker {
    lookup: Arc<dyn MetadataLookup>,
    publisher: Arc<dyn ArtifactPublisher>,
    pages_per_minute: f64,
    dates: DateTool,
}

impl SchedulingWorker {
    pub fn new(
        lookup: Arc<dyn MetadataLookup>,
        publisher: Arc<dyn ArtifactPublisher>,
        pages_per_minute: f64,
        dates: DateTool,
    ) -> Self {
        Self {
            lookup,
            publisher,
            pages_per_minute: pages_per_minute.min(MAX_PAGES_PER_MINUTE),
            dates,
        }
    }

    async fn look_up(&self, ctx: &mut TurnContext, book: &BookChoice) -> Result<(), WorkerError> {
        let query = BookQuery::new(&book.title, &book.author).with_isbn(book.isbn.clone());
        ctx.tool_call(
            LOOKUP_TOOL,
            json!({ "title": book.title, "author": book.author, "isbn": book.isbn }),
        )
        .await?;

        let output = match self.lookup.get_book_details(&query).await {
            Ok(details) => {
                let summary = details.summary();
                if (1..=MAX_PAGE_COUNT).contains(&details.page_count) {
                    ctx.state_mut().set(PAGE_COUNT_KEY, json!(details.page_count));
                } else {
                    tracing::warn!(
                        page_count = details.page_count,
                        "ignoring implausible page count"
                    );
                }
                ctx.state_mut()
                    .set_as(DETAILS_KEY, &details)
                    .map_err(|e| WorkerError::Other(e.into()))?;
                summary
            }
            Err(err @ (LookupError::RateLimited | LookupError::Transport(_))) => {
                tracing::warn!(error = %err, "metadata lookup unavailable; asking the user");
                LOOKUP_MISS.to_string()
            }
            Err(LookupError::NotFound) => LOOKUP_MISS.to_string(),
        };
        ctx.state_mut().set(LOOKUP_DONE_KEY, json!(true));
        ctx.tool_result(LOOKUP_TOOL, output).await?;
        Ok(())
    }

    async fn ask_for_minutes(
        &self,
        ctx: &mut TurnContext,
        book: &BookChoice,
        pages: u32,
    ) -> Result<(), WorkerError> {
        ctx.say(format!(
            "\"{}\" has {} pages. How many minutes per day can you dedicate to reading?",
            book.title, pages
        ))
        .await?;
        Ok(())
    }

    async fn publish_schedule(
        &self,
        ctx: &mut TurnContext,
        book: &BookChoice,
        pages: u32,
        minutes: u32,
    ) -> Result<(), WorkerError> {
        ctx.tool_call(DATE_TOOL, json!({})).await?;
        ctx.tool_result(DATE_TOOL, self.dates.describe()).await?;

        let schedule = build_schedule(pages, minutes, self.pages_per_minute, self.dates.tomorrow());
        let artifact = Artifact {
            title: format!("Reading Schedule: {}", book.title),
            body: format!(
                "Reading plan for **{}** by {}.\n\n{} pages at {} pages per day ({} minutes).\n\n{}",
                book.title,
                book.author,
                pages,
                schedule.pages_per_day,
                minutes,
                schedule.to_markdown()
            ),
        };

        let published = match self.publisher.publish(&artifact).await {
            Ok(published) => published,
            Err(err) => {
                tracing::warn!(error = %err, publisher = self.publisher.kind(), "schedule not published");
                ctx.say(format!(
                    "I built your schedule but couldn't post it ({}). \
                     Tell me your daily reading time again and I'll retry.",
                    err
                ))
                .await?;
                return Ok(());
            }
        };

        ctx.state_mut()
            .set_as(SCHEDULE_KEY, &schedule)
            .map_err(|e| WorkerError::Other(e.into()))?;

        let finish = schedule
            .finish()
            .map(|date| date.format("%A, %Y-%m-%d").to_string())
            .unwrap_or_default();
        ctx.say(format!(
            "Your schedule is ready: {} days at {} pages per day, starting tomorrow and finishing {}. \
             It's posted at {}.",
            schedule.days(),
            schedule.pages_per_day,
            finish,
            published.location
        ))
        .await?;

        ctx.complete_task(
            TASK_NAME,
            &format!(
                "Schedule created: {} days, {} pages/day ({})",
                schedule.days(),
                schedule.pages_per_day,
                published.reference
            ),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Worker for SchedulingWorker {
    fn name(&self) -> &str {
        "SchedulingWorker"
    }

    async fn execute(&self, ctx: &mut TurnContext) -> Result<(), WorkerError> {
        let input = ctx.user_input().map(str::to_string);

        let book = match recall_book(ctx).await? {
            Some(book) => book,
            None => match input.as_deref().and_then(parse_book_proposal) {
                Some(book) => {
                    ctx.state_mut()
                        .set_as(BOOK_KEY, &book)
                        .map_err(|e| WorkerError::Other(e.into()))?;
                    book
                }
                None => {
                    ctx.say("Which book are we planning for? (title by author)").await?;
                    return Ok(());
                }
            },
        };

        if !ctx.state().flag(LOOKUP_DONE_KEY) {
            self.look_up(ctx, &book).await?;
        }

        let Some(pages) = ctx.state().get_as::<u32>(PAGE_COUNT_KEY) else {
            match input.as_deref().and_then(parse_page_count) {
                Some(pages) => {
                    ctx.state_mut().set(PAGE_COUNT_KEY, json!(pages));
                    self.ask_for_minutes(ctx, &book, pages).await?;
                }
                None if input.as_deref().is_some_and(exceeds_page_limit) => {
                    ctx.say(format!(
                        "That's more pages than I can plan for (at most {}). How many pages does your edition have?",
                        MAX_PAGE_COUNT
                    ))
                    .await?;
                }
                None => {
                    ctx.say(format!(
                        "I couldn't find the page count for \"{}\". How many pages does your edition have?",
                        book.title
                    ))
                    .await?;
                }
            }
            return Ok(());
        };

        // First entry after discovery: nothing to parse yet.
        let Some(input) = input else {
            return self.ask_for_minutes(ctx, &book, pages).await;
        };

        match parse_reading_minutes(&input) {
            Some(minutes) => self.publish_schedule(ctx, &book, pages, minutes).await,
            None => {
                ctx.say("Sorry, I didn't catch that. How many minutes per day can you read? (e.g. 30 or 1 hour)")
                    .await?;
                Ok(())
            }
        }
    }
}

/// Details stored by the lookup, if it succeeded.
pub(crate) fn stored_details(ctx: &TurnContext) -> Option<BookDetails> {
    ctx.state().get_as::<BookDetails>(DETAILS_KEY)
}
