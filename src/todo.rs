use crate::date::DATE_FORMAT;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_TAG: &str = "global";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    /// Sort rank: high=3, medium=2, low=1.
    pub fn rank(self) -> u8 {
        match self {
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "h" | "high" => Ok(Priority::High),
            "m" | "med" | "medium" => Ok(Priority::Medium),
            "l" | "low" => Ok(Priority::Low),
            other => Err(format!("unknown priority: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: u64,
    pub text: String,
    pub completed: bool,
    pub priority: Priority,
    pub tags: Vec<String>,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Keys this version does not know about, written back untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Todo {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn first_tag(&self) -> Option<&str> {
        self.tags.first().map(String::as_str)
    }

    /// Pending and due strictly before `today`.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.completed && self.due_date.is_some_and(|due| due < today)
    }

    /// Sets `completed` and keeps `completed_at` consistent with it.
    pub fn set_completed(&mut self, completed: bool, now: DateTime<Utc>) {
        if completed && !self.completed {
            self.completed_at = Some(now);
        } else if !completed {
            self.completed_at = None;
        }
        self.completed = completed;
    }
}

/// A record as found on disk, possibly written by an older version.
///
/// Every field is optional and typed loosely so that one odd value does not
/// make the whole record unreadable. [`RawTodo::migrate`] is the only way to
/// turn it into a [`Todo`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTodo {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub text: Option<Value>,
    #[serde(default)]
    pub completed: Option<Value>,
    #[serde(default)]
    pub priority: Option<Value>,
    #[serde(default)]
    pub tags: Option<Value>,
    #[serde(default)]
    pub category: Option<Value>,
    #[serde(default)]
    pub due_date: Option<Value>,
    #[serde(default)]
    pub created_at: Option<Value>,
    #[serde(default)]
    pub completed_at: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RawTodo {
    pub fn id(&self) -> Option<u64> {
        self.id.as_ref().and_then(value_as_u64)
    }

    /// Apply defaults for every missing or unreadable field.
    ///
    /// `fresh_id` is used only when the record has no usable id; `now` stamps
    /// a missing `createdAt`, and a missing `completedAt` on a completed
    /// record.
    pub fn migrate(self, fresh_id: u64, now: DateTime<Utc>) -> Todo {
        let id = self.id().unwrap_or(fresh_id);

        let text = match self.text {
            Some(Value::String(s)) => s,
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };

        let completed = self.completed.as_ref().and_then(Value::as_bool).unwrap_or(false);

        let priority = self
            .priority
            .as_ref()
            .and_then(Value::as_str)
            .and_then(|p| p.parse().ok())
            .unwrap_or_default();

        let mut tags: Vec<String> = match (self.tags, self.category) {
            (Some(Value::Array(items)), _) => items
                .into_iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            (Some(Value::String(tag)), _) => vec![tag],
            (_, Some(Value::String(category))) => vec![category],
            _ => Vec::new(),
        };
        tags.retain(|t| !t.is_empty());
        if tags.is_empty() {
            tags.push(DEFAULT_TAG.to_string());
        }

        let due_date = self
            .due_date
            .as_ref()
            .and_then(Value::as_str)
            .and_then(|s| NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok());

        let created_at = self
            .created_at
            .as_ref()
            .and_then(value_as_timestamp)
            .unwrap_or(now);

        let completed_at = if completed {
            Some(
                self.completed_at
                    .as_ref()
                    .and_then(value_as_timestamp)
                    .unwrap_or(now),
            )
        } else {
            None
        };

        Todo {
            id,
            text,
            completed,
            priority,
            tags,
            due_date,
            created_at,
            completed_at,
            extra: self.extra,
        }
    }
}

fn value_as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_as_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let s = value.as_str()?;
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
