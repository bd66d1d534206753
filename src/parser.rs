//! Natural-language markup for a single input line.
//!
//! `!Fix bug @work (2d)` reads as: high priority, tagged `work`, due in two
//! days. Stages run in a fixed order and each strips what it matched before
//! the next one scans, so an `@tag` inside the trailing group is taken as a
//! tag first.

use crate::date;
use crate::todo::{Priority, DEFAULT_TAG};
use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"@([A-Za-z0-9_]+)").unwrap());

static DUE_GROUP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(([^)]+)\)$").unwrap());

/// Structured fields for a new todo, either parsed from a line or given
/// explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoDraft {
    pub text: String,
    pub priority: Priority,
    pub tags: Vec<String>,
    pub due_date: Option<NaiveDate>,
}

impl TodoDraft {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            priority: Priority::default(),
            tags: vec![DEFAULT_TAG.to_string()],
            due_date: None,
        }
    }
}

/// Decode `input` into a draft. `today` anchors relative due dates.
///
/// The returned text may be empty when the line held only markup; rejecting
/// that is up to the caller. Whitespace in the remaining text is normalised
/// throughout, not only where markup was removed: `Fix  the bug` reads as
/// `Fix the bug`.
pub fn parse(input: &str, today: NaiveDate) -> TodoDraft {
    let text = input.trim();

    let (priority, text) = strip_priority(text);
    let (tags, text) = extract_tags(text);
    let (due_date, text) = extract_due_date(&text, today);

    let draft = TodoDraft {
        text: collapse_whitespace(&text),
        priority,
        tags: if tags.is_empty() {
            vec![DEFAULT_TAG.to_string()]
        } else {
            tags
        },
        due_date,
    };
    tracing::debug!(input, ?draft, "parsed input");
    draft
}

/// Only a single leading marker counts.
fn strip_priority(text: &str) -> (Priority, &str) {
    if let Some(rest) = text.strip_prefix('!') {
        (Priority::High, rest.trim())
    } else if let Some(rest) = text.strip_prefix('_') {
        (Priority::Low, rest.trim())
    } else {
        (Priority::Medium, text)
    }
}

fn extract_tags(text: &str) -> (Vec<String>, String) {
    let tags: Vec<String> = TAG_RE
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect();
    if tags.is_empty() {
        return (tags, text.to_string());
    }
    let stripped = TAG_RE.replace_all(text, "");
    (tags, stripped.trim().to_string())
}

/// The group is removed whether or not its content resolves to a date.
fn extract_due_date(text: &str, today: NaiveDate) -> (Option<NaiveDate>, String) {
    let Some(caps) = DUE_GROUP_RE.captures(text) else {
        return (None, text.to_string());
    };
    let due = date::resolve(&caps[1], today);
    let whole = caps.get(0).map_or(text.len(), |m| m.start());
    (due, text[..whole].trim().to_string())
}

/// Every run of whitespace becomes one space, including runs the user typed.
fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
