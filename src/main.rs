use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use todo::config::Config;
use todo::error::{Result, TodoError};
use todo::query::{Query, SortBy};
use todo::store::JsonFileStorage;
use todo::todo::{Priority, Todo};
use todo::{date, logging, manager, tui, TodoManager, TodoUpdate};

#[derive(Parser)]
#[command(name = "todo", about = "Personal todo tracker with natural-language input")]
struct Cli {
    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    debug: bool,

    /// Todo file to use instead of the configured one
    #[arg(long, global = true, env = "TODO_FILE")]
    file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the config file and create an empty todo file. With --file,
    /// that path becomes the configured todo file.
    Init,

    /// Add a todo: todo add !Fix bug @work (2d)
    Add {
        /// Todo text with optional markup: leading ! or _, @tags, trailing (due)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        text: Vec<String>,
    },

    /// List todos
    List {
        /// Only todos with this tag ("all" for any)
        #[arg(long)]
        tag: Option<String>,
        /// Only todos with this priority ("all" for any)
        #[arg(long)]
        priority: Option<String>,
        /// Only pending todos
        #[arg(long, conflicts_with = "done")]
        pending: bool,
        /// Only completed todos
        #[arg(long)]
        done: bool,
        /// Case-insensitive search in text and tags
        #[arg(long)]
        search: Option<String>,
        /// Only pending todos past their due date
        #[arg(long)]
        overdue: bool,
        /// priority, dueDate, tag, created or alphabetical
        #[arg(long)]
        sort: Option<SortBy>,
    },

    /// Toggle a todo between pending and completed
    Toggle {
        id: u64,
    },

    /// Change fields of a todo
    Edit {
        id: u64,
        #[arg(long)]
        text: Option<String>,
        #[arg(long)]
        priority: Option<Priority>,
        /// Comma-separated tags
        #[arg(long, value_delimiter = ',')]
        tags: Option<Vec<String>>,
        /// Due date expression: 2d, 1w, tomorrow, 2025-07-01, ...
        #[arg(long, conflicts_with = "no_due")]
        due: Option<String>,
        /// Remove the due date
        #[arg(long)]
        no_due: bool,
    },

    /// Delete a todo
    Rm {
        id: u64,
    },

    /// Delete all completed todos
    Clear,

    /// Show counts by status, priority and tag
    Stats,

    /// List tags in use
    Tags,

    /// Pending todos due within the next days
    Due {
        /// Window size in days (default from config)
        #[arg(long)]
        days: Option<u32>,
    },

    /// Open the interactive menu
    Tui,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.debug);

    let result = run(cli);

    if let Err(e) = result {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let path = cli
        .file
        .clone()
        .unwrap_or_else(|| config.resolved_todo_file());
    tracing::debug!(path = %path.display(), "using todo file");
    let storage = JsonFileStorage::new(path);

    match cli.command.unwrap_or(Commands::Tui) {
        Commands::Init => cmd_init(cli.file.as_deref()),
        Commands::Add { text } => cmd_add(storage, &text.join(" ")),
        Commands::List {
            tag,
            priority,
            pending,
            done,
            search,
            overdue,
            sort,
        } => {
            let query = Query {
                tag: tag.filter(|t| t != "all"),
                priority: parse_priority_filter(priority.as_deref())?,
                completed: if pending {
                    Some(false)
                } else if done {
                    Some(true)
                } else {
                    None
                },
                search,
                overdue,
                sort_by: sort.or(config.default_sort),
            };
            cmd_list(storage, &query)
        }
        Commands::Toggle { id } => cmd_toggle(storage, id),
        Commands::Edit {
            id,
            text,
            priority,
            tags,
            due,
            no_due,
        } => {
            let due_date = if no_due {
                Some(None)
            } else if let Some(expr) = due {
                let resolved = date::resolve(&expr, manager::today())
                    .ok_or_else(|| TodoError::Parse(format!("unrecognised due date: {}", expr)))?;
                Some(Some(resolved))
            } else {
                None
            };
            let update = TodoUpdate {
                text,
                priority,
                tags,
                due_date,
                ..TodoUpdate::default()
            };
            cmd_edit(storage, id, update)
        }
        Commands::Rm { id } => cmd_rm(storage, id),
        Commands::Clear => cmd_clear(storage),
        Commands::Stats => cmd_stats(storage),
        Commands::Tags => cmd_tags(storage),
        Commands::Due { days } => cmd_due(storage, days.unwrap_or(config.due_soon_days)),
        Commands::Tui => {
            storage.ensure_exists()?;
            tui::run(TodoManager::new(storage), config.default_sort)
        }
    }
}

fn parse_priority_filter(value: Option<&str>) -> Result<Option<Priority>> {
    match value {
        None | Some("all") => Ok(None),
        Some(p) => p.parse().map(Some).map_err(TodoError::Parse),
    }
}

fn print_todo(todo: &Todo) {
    let status = if todo.completed { "x" } else { " " };
    let mut line = format!(
        "[{}] {} {:<6} {}",
        status, todo.id, todo.priority, todo.text
    );
    if let Some(due) = todo.due_date {
        line.push_str(&format!(" ({})", date::format_date(due)));
        if todo.is_overdue(manager::today()) {
            line.push_str(" OVERDUE");
        }
    }
    line.push_str(&format!(" @{}", todo.tags.join(" @")));
    println!("{}", line);
}

fn cmd_init(file: Option<&Path>) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(p) = file {
        config.todo_file = p.display().to_string();
    }
    config.save()?;

    let path = config.resolved_todo_file();
    JsonFileStorage::new(&path).ensure_exists()?;
    println!("config: {}", Config::config_path().display());
    println!("todo file: {}", path.display());
    Ok(())
}

fn cmd_add(storage: JsonFileStorage, text: &str) -> Result<()> {
    let draft = todo::parse(text, manager::today());
    if draft.text.is_empty() {
        return Err(TodoError::Other("todo text cannot be empty".to_string()));
    }
    let todo = TodoManager::new(storage).add(draft)?;
    print!("added ");
    print_todo(&todo);
    Ok(())
}

fn cmd_list(storage: JsonFileStorage, query: &Query) -> Result<()> {
    let todos = TodoManager::new(storage).list(query);
    if todos.is_empty() {
        println!("no todos");
        return Ok(());
    }
    for todo in &todos {
        print_todo(todo);
    }
    Ok(())
}

fn cmd_toggle(storage: JsonFileStorage, id: u64) -> Result<()> {
    let todo = TodoManager::new(storage)
        .toggle_complete(id)?
        .ok_or(TodoError::TodoNotFound(id))?;
    let status = if todo.completed { "completed" } else { "reopened" };
    println!("{} {}: {}", status, todo.id, todo.text);
    Ok(())
}

fn cmd_edit(storage: JsonFileStorage, id: u64, update: TodoUpdate) -> Result<()> {
    let todo = TodoManager::new(storage)
        .update(id, update)?
        .ok_or(TodoError::TodoNotFound(id))?;
    print!("updated ");
    print_todo(&todo);
    Ok(())
}

fn cmd_rm(storage: JsonFileStorage, id: u64) -> Result<()> {
    let todo = TodoManager::new(storage)
        .delete(id)?
        .ok_or(TodoError::TodoNotFound(id))?;
    println!("deleted {}: {}", todo.id, todo.text);
    Ok(())
}

fn cmd_clear(storage: JsonFileStorage) -> Result<()> {
    let cleared = TodoManager::new(storage).clear_completed()?;
    if cleared > 0 {
        println!("cleared {} completed todo(s)", cleared);
    } else {
        println!("no completed todos to clear");
    }
    Ok(())
}

fn cmd_stats(storage: JsonFileStorage) -> Result<()> {
    let stats = TodoManager::new(storage).stats();
    println!("total:     {}", stats.total);
    println!("completed: {}", stats.completed);
    println!("pending:   {}", stats.pending);
    println!("overdue:   {}", stats.overdue);
    println!(
        "pending by priority: high {}, medium {}, low {}",
        stats.by_priority.high, stats.by_priority.medium, stats.by_priority.low
    );
    for (tag, count) in &stats.by_tag {
        println!("  @{}: {}", tag, count);
    }
    Ok(())
}

fn cmd_tags(storage: JsonFileStorage) -> Result<()> {
    for tag in TodoManager::new(storage).tags() {
        println!("{}", tag);
    }
    Ok(())
}

fn cmd_due(storage: JsonFileStorage, days: u32) -> Result<()> {
    let todos = TodoManager::new(storage).due_soon(days);
    if todos.is_empty() {
        println!("nothing due in the next {} day(s)", days);
        return Ok(());
    }
    for todo in &todos {
        print_todo(todo);
    }
    Ok(())
}
