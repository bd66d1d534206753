use crate::todo::{Priority, Todo};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortBy {
    Priority,
    DueDate,
    Tag,
    Created,
    Alphabetical,
}

impl SortBy {
    pub const ALL: [SortBy; 5] = [
        SortBy::Priority,
        SortBy::DueDate,
        SortBy::Tag,
        SortBy::Created,
        SortBy::Alphabetical,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SortBy::Priority => "priority",
            SortBy::DueDate => "dueDate",
            SortBy::Tag => "tag",
            SortBy::Created => "created",
            SortBy::Alphabetical => "alphabetical",
        }
    }
}

impl fmt::Display for SortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "priority" => Ok(SortBy::Priority),
            "duedate" | "due" => Ok(SortBy::DueDate),
            "tag" => Ok(SortBy::Tag),
            "created" => Ok(SortBy::Created),
            "alphabetical" | "alpha" | "text" => Ok(SortBy::Alphabetical),
            other => Err(format!("unknown sort mode: {}", other)),
        }
    }
}

/// Filter and sort selection for one [`query`] call. Every predicate that is
/// set must hold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub tag: Option<String>,
    pub priority: Option<Priority>,
    pub completed: Option<bool>,
    pub search: Option<String>,
    pub overdue: bool,
    pub sort_by: Option<SortBy>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn completed(mut self, completed: bool) -> Self {
        self.completed = Some(completed);
        self
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn overdue(mut self) -> Self {
        self.overdue = true;
        self
    }

    pub fn sort_by(mut self, sort_by: SortBy) -> Self {
        self.sort_by = Some(sort_by);
        self
    }

    fn matches(&self, todo: &Todo, search_lower: Option<&str>, today: NaiveDate) -> bool {
        if let Some(tag) = &self.tag {
            if !todo.has_tag(tag) {
                return false;
            }
        }
        if let Some(priority) = self.priority {
            if todo.priority != priority {
                return false;
            }
        }
        if let Some(completed) = self.completed {
            if todo.completed != completed {
                return false;
            }
        }
        if let Some(needle) = search_lower {
            let text_match = todo.text.to_lowercase().contains(needle);
            let tag_match = todo.tags.iter().any(|t| t.to_lowercase().contains(needle));
            if !text_match && !tag_match {
                return false;
            }
        }
        if self.overdue && !todo.is_overdue(today) {
            return false;
        }
        true
    }
}

/// Matching records in storage order, then ordered by `sort_by` if set.
/// All sorts are stable.
pub fn query<'a>(todos: &'a [Todo], query: &Query, today: NaiveDate) -> Vec<&'a Todo> {
    let search_lower = query
        .search
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);

    let mut result: Vec<&Todo> = todos
        .iter()
        .filter(|t| query.matches(t, search_lower.as_deref(), today))
        .collect();

    if let Some(sort_by) = query.sort_by {
        sort(&mut result, sort_by);
    }
    tracing::debug!(?query, matched = result.len(), total = todos.len(), "query");
    result
}

pub fn sort(todos: &mut [&Todo], sort_by: SortBy) {
    match sort_by {
        SortBy::Priority => todos.sort_by(|a, b| b.priority.rank().cmp(&a.priority.rank())),
        SortBy::DueDate => todos.sort_by(|a, b| none_last(a.due_date, b.due_date)),
        SortBy::Tag => todos.sort_by(|a, b| match (a.first_tag(), b.first_tag()) {
            (Some(x), Some(y)) => text_order(x, y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }),
        SortBy::Created => todos.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        SortBy::Alphabetical => todos.sort_by(|a, b| text_order(&a.text, &b.text)),
    }
}

fn none_last<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Case-insensitive first, so `apple` sorts next to `Apple` rather than
/// after `Zebra`; exact bytes break the tie.
fn text_order(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}
