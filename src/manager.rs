use crate::error::Result;
use crate::parser::{self, TodoDraft};
use crate::query::{self, Query};
use crate::stats::{self, Stats};
use crate::store::Storage;
use crate::todo::{Priority, Todo, DEFAULT_TAG};
use chrono::{DateTime, Local, NaiveDate, Utc};

/// Fields to replace on an existing record. `None` leaves a field alone;
/// `due_date: Some(None)` clears the due date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TodoUpdate {
    pub text: Option<String>,
    pub completed: Option<bool>,
    pub priority: Option<Priority>,
    pub tags: Option<Vec<String>>,
    pub due_date: Option<Option<NaiveDate>>,
}

/// Read and write operations over a [`Storage`].
///
/// Holds no state between calls: each operation reloads the collection, and
/// each mutation writes the whole collection back while holding the
/// storage's lock.
pub struct TodoManager<S: Storage> {
    storage: S,
}

impl<S: Storage> TodoManager<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Load failures are logged and read as an empty collection.
    ///
    /// Records without a usable id are numbered after the largest stored id,
    /// in document order, so they keep the same id on every load until a
    /// mutation writes it back.
    pub fn load(&self) -> Vec<Todo> {
        let raw = match self.storage.load() {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "could not load todos, starting empty");
                return Vec::new();
            }
        };

        let now = Utc::now();
        let mut fresh = raw.iter().filter_map(|r| r.id()).max().unwrap_or(0);
        raw.into_iter()
            .map(|record| {
                if record.id().is_none() {
                    fresh = fresh.saturating_add(1);
                }
                record.migrate(fresh, now)
            })
            .collect()
    }

    fn save(&self, todos: &[Todo]) -> Result<()> {
        self.storage.save(todos)
    }

    pub fn add(&self, draft: TodoDraft) -> Result<Todo> {
        let _lock = self.storage.lock()?;
        let mut todos = self.load();

        let now = Utc::now();
        let last_id = todos.iter().map(|t| t.id).max().unwrap_or(0);
        let mut tags = draft.tags;
        tags.retain(|t| !t.is_empty());
        if tags.is_empty() {
            tags.push(DEFAULT_TAG.to_string());
        }

        let todo = Todo {
            id: next_id(last_id, now),
            text: draft.text,
            completed: false,
            priority: draft.priority,
            tags,
            due_date: draft.due_date,
            created_at: now,
            completed_at: None,
            extra: Default::default(),
        };
        todos.push(todo.clone());
        self.save(&todos)?;

        tracing::info!(id = todo.id, text = %todo.text, "added todo");
        Ok(todo)
    }

    pub fn add_from_text(&self, input: &str) -> Result<Todo> {
        self.add(parser::parse(input, today()))
    }

    /// `Ok(None)` when no record has `id`; nothing is written then.
    pub fn toggle_complete(&self, id: u64) -> Result<Option<Todo>> {
        let _lock = self.storage.lock()?;
        let mut todos = self.load();

        let Some(todo) = todos.iter_mut().find(|t| t.id == id) else {
            tracing::debug!(id, "toggle: not found");
            return Ok(None);
        };
        let completed = !todo.completed;
        todo.set_completed(completed, Utc::now());
        let updated = todo.clone();
        self.save(&todos)?;

        tracing::info!(id, completed, "toggled todo");
        Ok(Some(updated))
    }

    pub fn update(&self, id: u64, update: TodoUpdate) -> Result<Option<Todo>> {
        let _lock = self.storage.lock()?;
        let mut todos = self.load();

        let Some(todo) = todos.iter_mut().find(|t| t.id == id) else {
            tracing::debug!(id, "update: not found");
            return Ok(None);
        };
        if let Some(text) = update.text {
            todo.text = text;
        }
        if let Some(priority) = update.priority {
            todo.priority = priority;
        }
        if let Some(mut tags) = update.tags {
            tags.retain(|t| !t.is_empty());
            if tags.is_empty() {
                tags.push(DEFAULT_TAG.to_string());
            }
            todo.tags = tags;
        }
        if let Some(due_date) = update.due_date {
            todo.due_date = due_date;
        }
        if let Some(completed) = update.completed {
            todo.set_completed(completed, Utc::now());
        }
        let updated = todo.clone();
        self.save(&todos)?;

        tracing::info!(id, "updated todo");
        Ok(Some(updated))
    }

    pub fn delete(&self, id: u64) -> Result<Option<Todo>> {
        let _lock = self.storage.lock()?;
        let mut todos = self.load();

        let Some(index) = todos.iter().position(|t| t.id == id) else {
            tracing::debug!(id, "delete: not found");
            return Ok(None);
        };
        let removed = todos.remove(index);
        self.save(&todos)?;

        tracing::info!(id, "deleted todo");
        Ok(Some(removed))
    }

    /// Returns how many records were removed.
    pub fn clear_completed(&self) -> Result<usize> {
        let _lock = self.storage.lock()?;
        let mut todos = self.load();

        let before = todos.len();
        todos.retain(|t| !t.completed);
        let cleared = before - todos.len();
        self.save(&todos)?;

        tracing::info!(cleared, "cleared completed todos");
        Ok(cleared)
    }

    /// Moves every listed record into `completed` state. Records already
    /// there, and unknown ids, are skipped. Returns how many changed.
    pub fn complete_many(&self, ids: &[u64], completed: bool) -> Result<usize> {
        let _lock = self.storage.lock()?;
        let mut todos = self.load();

        let now = Utc::now();
        let mut changed = 0;
        for todo in todos.iter_mut() {
            if ids.contains(&todo.id) && todo.completed != completed {
                todo.set_completed(completed, now);
                changed += 1;
            }
        }
        if changed > 0 {
            self.save(&todos)?;
        }

        tracing::info!(changed, completed, "bulk status change");
        Ok(changed)
    }

    pub fn delete_many(&self, ids: &[u64]) -> Result<usize> {
        let _lock = self.storage.lock()?;
        let mut todos = self.load();

        let before = todos.len();
        todos.retain(|t| !ids.contains(&t.id));
        let removed = before - todos.len();
        if removed > 0 {
            self.save(&todos)?;
        }

        tracing::info!(removed, "bulk delete");
        Ok(removed)
    }

    pub fn list(&self, query: &Query) -> Vec<Todo> {
        let todos = self.load();
        query::query(&todos, query, today())
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn get(&self, id: u64) -> Option<Todo> {
        self.load().into_iter().find(|t| t.id == id)
    }

    pub fn stats(&self) -> Stats {
        stats::aggregate(&self.load(), today())
    }

    pub fn due_soon(&self, days: u32) -> Vec<Todo> {
        let todos = self.load();
        stats::due_soon(&todos, today(), days)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn overdue(&self) -> Vec<Todo> {
        self.list(&Query::new().overdue())
    }

    pub fn tags(&self) -> Vec<String> {
        stats::tags(&self.load())
    }
}

/// The local calendar date used for due-date arithmetic and comparisons.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Time-derived but strictly greater than every id already in use.
fn next_id(last_id: u64, now: DateTime<Utc>) -> u64 {
    let millis = u64::try_from(now.timestamp_millis()).unwrap_or(0);
    millis.max(last_id.saturating_add(1))
}
