use thiserror::Error;

#[derive(Error, Debug)]
pub enum TodoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Todo not found: {0}")]
    TodoNotFound(u64),

    #[error("Lock error: {0}")]
    Lock(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, TodoError>;
