pub mod config;
pub mod date;
pub mod error;
pub mod lock;
pub mod logging;
pub mod manager;
pub mod parser;
pub mod query;
pub mod stats;
pub mod store;
pub mod todo;
pub mod tui;

pub use error::{Result, TodoError};
pub use manager::{TodoManager, TodoUpdate};
pub use parser::{parse, TodoDraft};
pub use query::{query, Query, SortBy};
pub use stats::{PriorityCounts, Stats};
pub use store::{JsonFileStorage, MemoryStorage, Storage};
pub use todo::{Priority, RawTodo, Todo};
