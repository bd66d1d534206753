use crate::query::{self, Query};
use crate::todo::{Priority, Todo};
use chrono::{Days, NaiveDate};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Counts of pending records per priority.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PriorityCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl PriorityCounts {
    fn bump(&mut self, priority: Priority) {
        match priority {
            Priority::High => self.high += 1,
            Priority::Medium => self.medium += 1,
            Priority::Low => self.low += 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub overdue: usize,
    pub by_priority: PriorityCounts,
    /// Every tag in the collection, with its number of pending records
    /// (zero when all of them are done).
    pub by_tag: BTreeMap<String, usize>,
}

pub fn aggregate(todos: &[Todo], today: NaiveDate) -> Stats {
    let completed = todos.iter().filter(|t| t.completed).count();
    let overdue = query::query(todos, &Query::new().overdue(), today).len();

    let mut by_priority = PriorityCounts::default();
    let mut by_tag: BTreeMap<String, usize> =
        tags(todos).into_iter().map(|tag| (tag, 0)).collect();

    for todo in todos.iter().filter(|t| !t.completed) {
        by_priority.bump(todo.priority);
        let distinct: BTreeSet<&str> = todo.tags.iter().map(String::as_str).collect();
        for tag in distinct {
            if let Some(count) = by_tag.get_mut(tag) {
                *count += 1;
            }
        }
    }

    Stats {
        total: todos.len(),
        completed,
        pending: todos.len() - completed,
        overdue,
        by_priority,
        by_tag,
    }
}

/// Pending records due within `[today, today + days]`, in storage order.
pub fn due_soon(todos: &[Todo], today: NaiveDate, days: u32) -> Vec<&Todo> {
    let horizon = today
        .checked_add_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MAX);
    todos
        .iter()
        .filter(|t| !t.completed)
        .filter(|t| t.due_date.is_some_and(|due| due >= today && due <= horizon))
        .collect()
}

/// Distinct tags in use, sorted.
pub fn tags(todos: &[Todo]) -> Vec<String> {
    let set: BTreeSet<&str> = todos
        .iter()
        .flat_map(|t| t.tags.iter().map(String::as_str))
        .collect();
    set.into_iter().map(str::to_string).collect()
}
