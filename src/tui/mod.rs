use crate::error::{Result, TodoError};
use crate::manager::{self, TodoManager};
use crate::query::{self, Query, SortBy};
use crate::stats::{self, Stats};
use crate::store::Storage;
use crate::todo::{Priority, Todo};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use ratatui::widgets::*;

use std::collections::BTreeSet;
use std::io::stdout;
use std::time::Duration;

const ALL_TAGS: &str = "all";

#[derive(Debug, Clone, Copy, PartialEq)]
enum Focus {
    Tags,
    Todos,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Mode {
    Normal,
    Add,
    Search,
}

struct App<S: Storage> {
    manager: TodoManager<S>,
    todos: Vec<Todo>,
    tags: Vec<String>,
    tag_idx: usize,
    todo_idx: usize,
    focus: Focus,
    mode: Mode,
    input: String,
    status_msg: String,
    search_query: String,
    overdue_only: bool,
    sort_by: Option<SortBy>,
    marked: BTreeSet<u64>,
    show_detail: bool,
    should_quit: bool,
}

impl<S: Storage> App<S> {
    fn new(manager: TodoManager<S>, sort_by: Option<SortBy>) -> Self {
        let mut app = App {
            manager,
            todos: Vec::new(),
            tags: Vec::new(),
            tag_idx: 0,
            todo_idx: 0,
            focus: Focus::Todos,
            mode: Mode::Normal,
            input: String::new(),
            status_msg: String::from("? for help | a to add | space to toggle"),
            search_query: String::new(),
            overdue_only: false,
            sort_by,
            marked: BTreeSet::new(),
            show_detail: false,
            should_quit: false,
        };
        app.refresh();
        app
    }

    fn refresh(&mut self) {
        self.todos = self.manager.load();

        self.tags = std::iter::once(ALL_TAGS.to_string())
            .chain(stats::tags(&self.todos))
            .collect();
        if self.tag_idx >= self.tags.len() {
            self.tag_idx = self.tags.len() - 1;
        }

        let known: BTreeSet<u64> = self.todos.iter().map(|t| t.id).collect();
        self.marked.retain(|id| known.contains(id));
        self.clamp_todo_idx();
    }

    fn current_query(&self) -> Query {
        Query {
            tag: self
                .tags
                .get(self.tag_idx)
                .filter(|t| t.as_str() != ALL_TAGS)
                .cloned(),
            search: Some(self.search_query.clone()).filter(|s| !s.is_empty()),
            overdue: self.overdue_only,
            sort_by: self.sort_by,
            ..Query::default()
        }
    }

    fn visible_todos(&self) -> Vec<&Todo> {
        query::query(&self.todos, &self.current_query(), manager::today())
    }

    fn stats(&self) -> Stats {
        stats::aggregate(&self.todos, manager::today())
    }

    fn clamp_todo_idx(&mut self) {
        let count = self.visible_todos().len();
        if count == 0 {
            self.todo_idx = 0;
        } else if self.todo_idx >= count {
            self.todo_idx = count - 1;
        }
    }

    fn selected_todo(&self) -> Option<&Todo> {
        self.visible_todos().get(self.todo_idx).copied()
    }

    /// Marked todos if any, else the one under the cursor.
    fn targets(&self) -> Vec<u64> {
        if self.marked.is_empty() {
            self.selected_todo().map(|t| vec![t.id]).unwrap_or_default()
        } else {
            self.marked.iter().copied().collect()
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        match self.mode {
            Mode::Normal => self.handle_normal_key(key),
            Mode::Add => self.handle_add_key(key),
            Mode::Search => self.handle_search_key(key),
        }
    }

    fn report<T>(&mut self, result: Result<T>, ok: impl FnOnce(T) -> String) {
        match result {
            Ok(value) => self.status_msg = ok(value),
            Err(e) => self.status_msg = format!("Error: {}", e),
        }
        self.refresh();
    }

    fn handle_normal_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Esc => {
                if self.show_detail {
                    self.show_detail = false;
                } else {
                    self.should_quit = true;
                }
            }
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true
            }
            KeyCode::Enter => {
                if self.focus == Focus::Todos && self.selected_todo().is_some() {
                    self.show_detail = !self.show_detail;
                } else if self.focus == Focus::Tags {
                    self.focus = Focus::Todos;
                }
            }
            KeyCode::Tab | KeyCode::BackTab => {
                self.focus = match self.focus {
                    Focus::Tags => Focus::Todos,
                    Focus::Todos => Focus::Tags,
                };
            }
            KeyCode::Char('h') | KeyCode::Left => self.focus = Focus::Tags,
            KeyCode::Char('l') | KeyCode::Right => self.focus = Focus::Todos,
            KeyCode::Char('j') | KeyCode::Down => match self.focus {
                Focus::Tags => {
                    self.tag_idx = (self.tag_idx + 1).min(self.tags.len().saturating_sub(1));
                    self.todo_idx = 0;
                }
                Focus::Todos => {
                    let count = self.visible_todos().len();
                    if count > 0 {
                        self.todo_idx = (self.todo_idx + 1).min(count - 1);
                    }
                }
            },
            KeyCode::Char('k') | KeyCode::Up => match self.focus {
                Focus::Tags => {
                    if self.tag_idx > 0 {
                        self.tag_idx -= 1;
                        self.todo_idx = 0;
                    }
                }
                Focus::Todos => {
                    self.todo_idx = self.todo_idx.saturating_sub(1);
                }
            },
            KeyCode::Char('g') => self.todo_idx = 0,
            KeyCode::Char('G') => {
                self.todo_idx = self.visible_todos().len().saturating_sub(1);
            }
            KeyCode::Char(' ') => {
                if let Some(id) = self.selected_todo().map(|t| t.id) {
                    let result = self.manager.toggle_complete(id);
                    self.report(result, |todo| match todo {
                        Some(t) if t.completed => format!("Completed: {}", t.text),
                        Some(t) => format!("Reopened: {}", t.text),
                        None => format!("Todo {} no longer exists", id),
                    });
                }
            }
            KeyCode::Char('a') => {
                self.mode = Mode::Add;
                self.input.clear();
                self.status_msg = "e.g. !Fix bug @work (2d)".to_string();
            }
            KeyCode::Char('m') => {
                if let Some(id) = self.selected_todo().map(|t| t.id) {
                    if !self.marked.remove(&id) {
                        self.marked.insert(id);
                    }
                    self.status_msg = format!("{} marked", self.marked.len());
                }
            }
            KeyCode::Char('M') => {
                self.marked.clear();
                self.status_msg = "Marks cleared".to_string();
            }
            KeyCode::Char('c') => self.bulk_complete(true),
            KeyCode::Char('u') => self.bulk_complete(false),
            KeyCode::Char('d') => {
                let ids = self.targets();
                if !ids.is_empty() {
                    let result = self.manager.delete_many(&ids);
                    self.marked.clear();
                    self.report(result, |n| format!("{} todo(s) deleted", n));
                }
            }
            KeyCode::Char('x') => {
                let result = self.manager.clear_completed();
                self.report(result, |n| {
                    if n > 0 {
                        format!("Cleared {} completed todo(s)", n)
                    } else {
                        "No completed todos to clear".to_string()
                    }
                });
            }
            KeyCode::Char('/') => {
                self.mode = Mode::Search;
                self.input = self.search_query.clone();
                self.status_msg = "Search:".to_string();
            }
            KeyCode::Char('o') => {
                self.overdue_only = !self.overdue_only;
                self.todo_idx = 0;
                self.status_msg = if self.overdue_only {
                    "Showing overdue only".to_string()
                } else {
                    "Showing all".to_string()
                };
                self.clamp_todo_idx();
            }
            KeyCode::Char('s') => {
                self.sort_by = next_sort(self.sort_by);
                self.status_msg = match self.sort_by {
                    Some(s) => format!("Sorted by {}", s),
                    None => "Storage order".to_string(),
                };
            }
            KeyCode::Char('r') => {
                self.refresh();
                self.status_msg = "Reloaded".to_string();
            }
            KeyCode::Char('?') => {
                self.status_msg =
                    "j/k:nav h/l:panel space:toggle enter:detail a:add m:mark c/u/d:done/undo/delete x:clear /:search o:overdue s:sort q:quit"
                        .to_string();
            }
            _ => {}
        }
    }

    fn bulk_complete(&mut self, completed: bool) {
        let ids = self.targets();
        if ids.is_empty() {
            return;
        }
        let result = self.manager.complete_many(&ids, completed);
        self.marked.clear();
        let verb = if completed { "completed" } else { "marked as pending" };
        self.report(result, |n| format!("{} todo(s) {}", n, verb));
    }

    fn handle_add_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.mode = Mode::Normal;
                self.status_msg = "Cancelled".to_string();
            }
            KeyCode::Enter => {
                self.mode = Mode::Normal;
                let draft = crate::parser::parse(&self.input, manager::today());
                if draft.text.is_empty() {
                    self.status_msg = "Please enter a todo item".to_string();
                    return;
                }
                let result = self.manager.add(draft);
                self.report(result, |t| format!("Added: {}", t.text));
            }
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::Char(c) => {
                self.input.push(c);
            }
            _ => {}
        }
    }

    fn handle_search_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.mode = Mode::Normal;
                self.search_query.clear();
                self.status_msg = "Search cleared".to_string();
                self.clamp_todo_idx();
            }
            KeyCode::Enter => {
                self.search_query = self.input.trim().to_string();
                self.mode = Mode::Normal;
                self.todo_idx = 0;
                let hits = self.visible_todos().len();
                self.status_msg = if hits == 0 {
                    format!("No results for \"{}\"", self.search_query)
                } else {
                    format!("{} results for \"{}\"", hits, self.search_query)
                };
            }
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::Char(c) => {
                self.input.push(c);
            }
            _ => {}
        }
    }
}

fn next_sort(current: Option<SortBy>) -> Option<SortBy> {
    match current {
        None => Some(SortBy::ALL[0]),
        Some(s) => SortBy::ALL
            .iter()
            .position(|x| *x == s)
            .and_then(|i| SortBy::ALL.get(i + 1))
            .copied(),
    }
}

fn priority_color(priority: Priority) -> Color {
    match priority {
        Priority::High => Color::Red,
        Priority::Medium => Color::Yellow,
        Priority::Low => Color::Blue,
    }
}

fn ui<S: Storage>(frame: &mut Frame, app: &App<S>) {
    let today = manager::today();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(3),
        ])
        .split(frame.area());

    // Header
    let stats = app.stats();
    let mut title = " todo ".to_string();
    if !app.search_query.is_empty() {
        title = format!(" todo - search: \"{}\" ", app.search_query);
    }
    let header = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(Style::default().fg(Color::Cyan));
    let header_text = Paragraph::new(format!(
        " {} pending, {} completed, {} overdue | sort: {}{}",
        stats.pending,
        stats.completed,
        stats.overdue,
        app.sort_by.map_or("none", SortBy::as_str),
        if app.overdue_only { " | overdue only" } else { "" },
    ))
    .block(header);
    frame.render_widget(header_text, chunks[0]);

    let main_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(22), Constraint::Min(30)])
        .split(chunks[1]);

    // Tags panel
    let tag_border_color = if app.focus == Focus::Tags {
        Color::Yellow
    } else {
        Color::DarkGray
    };
    let tag_items: Vec<ListItem> = app
        .tags
        .iter()
        .enumerate()
        .map(|(i, tag)| {
            let label = if tag == ALL_TAGS {
                format!("{} ({}/{})", tag, stats.pending, stats.total)
            } else {
                let total = app.todos.iter().filter(|t| t.has_tag(tag)).count();
                let open = stats.by_tag.get(tag).copied().unwrap_or(0);
                format!("{} ({}/{})", tag, open, total)
            };
            let style = if i == app.tag_idx {
                Style::default().bg(Color::DarkGray).fg(Color::White)
            } else {
                Style::default()
            };
            ListItem::new(label).style(style)
        })
        .collect();

    let tag_list = List::new(tag_items).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Tags ")
            .border_style(Style::default().fg(tag_border_color)),
    );
    frame.render_widget(tag_list, main_chunks[0]);

    // Todos panel
    let todo_border_color = if app.focus == Focus::Todos {
        Color::Magenta
    } else {
        Color::DarkGray
    };
    let visible = app.visible_todos();
    let todo_items: Vec<ListItem> = visible
        .iter()
        .enumerate()
        .map(|(i, todo)| {
            let checkbox = if todo.completed { "[x]" } else { "[ ]" };
            let mark = if app.marked.contains(&todo.id) { "*" } else { " " };
            let mut spans = vec![
                Span::raw(format!("{}{} ", mark, checkbox)),
                Span::styled(
                    format!("{:<6} ", todo.priority),
                    Style::default().fg(priority_color(todo.priority)),
                ),
                Span::raw(todo.text.clone()),
            ];
            if let Some(due) = todo.due_date {
                let style = if todo.is_overdue(today) {
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::DarkGray)
                };
                spans.push(Span::styled(format!(" ({})", due), style));
            }
            spans.push(Span::styled(
                format!(" @{}", todo.tags.join(" @")),
                Style::default().fg(Color::Cyan),
            ));

            let style = if i == app.todo_idx {
                Style::default().bg(Color::DarkGray).fg(Color::White)
            } else if todo.completed {
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::CROSSED_OUT)
            } else {
                Style::default()
            };
            ListItem::new(Line::from(spans)).style(style)
        })
        .collect();

    let todo_title = match app.tags.get(app.tag_idx) {
        Some(tag) => format!(" Todos - {} ", tag),
        None => " Todos ".to_string(),
    };
    let todo_list = List::new(todo_items).block(
        Block::default()
            .borders(Borders::ALL)
            .title(todo_title)
            .border_style(Style::default().fg(todo_border_color)),
    );
    frame.render_widget(todo_list, main_chunks[1]);

    // Detail popup
    if app.show_detail {
        if let Some(todo) = app.selected_todo() {
            let area = frame.area();
            let popup_width = (area.width * 60 / 100).max(40).min(area.width.saturating_sub(4));
            let popup_height = 9.min(area.height.saturating_sub(4));
            let x = (area.width.saturating_sub(popup_width)) / 2;
            let y = (area.height.saturating_sub(popup_height)) / 2;
            let popup_area = Rect::new(x, y, popup_width, popup_height);

            frame.render_widget(Clear, popup_area);

            let key = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
            let status = match todo.completed_at {
                Some(at) => format!("done {}", at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M")),
                None => "pending".to_string(),
            };
            let lines = vec![
                Line::from(vec![Span::styled("Text: ", key), Span::raw(&todo.text)]),
                Line::from(vec![
                    Span::styled("Priority: ", key),
                    Span::styled(
                        todo.priority.to_string(),
                        Style::default().fg(priority_color(todo.priority)),
                    ),
                ]),
                Line::from(vec![Span::styled("Tags: ", key), Span::raw(todo.tags.join(", "))]),
                Line::from(vec![
                    Span::styled("Due: ", key),
                    Span::raw(todo.due_date.map_or("-".to_string(), |d| d.to_string())),
                ]),
                Line::from(vec![Span::styled("Status: ", key), Span::raw(status)]),
                Line::from(vec![
                    Span::styled("Created: ", key),
                    Span::raw(
                        todo.created_at
                            .with_timezone(&chrono::Local)
                            .format("%Y-%m-%d %H:%M")
                            .to_string(),
                    ),
                ]),
                Line::from(vec![Span::styled("Id: ", key), Span::raw(todo.id.to_string())]),
            ];

            let popup = Paragraph::new(Text::from(lines)).block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(" Todo Detail ")
                    .title_bottom(" Esc to close ")
                    .border_style(Style::default().fg(Color::Cyan)),
            );
            frame.render_widget(popup, popup_area);
        }
    }

    // Status bar
    let input_text = match app.mode {
        Mode::Normal => app.status_msg.clone(),
        Mode::Add => format!("Todo: {}_", app.input),
        Mode::Search => format!("/{}_", app.input),
    };
    let mode_label = match app.mode {
        Mode::Normal => "NORMAL",
        Mode::Add => "ADD",
        Mode::Search => "SEARCH",
    };
    let status_block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {} ", mode_label))
        .border_style(Style::default().fg(if app.mode == Mode::Normal {
            Color::Gray
        } else {
            Color::Green
        }));
    let status = Paragraph::new(input_text).block(status_block);
    frame.render_widget(status, chunks[2]);
}

pub fn run<S: Storage>(manager: TodoManager<S>, sort_by: Option<SortBy>) -> Result<()> {
    enable_raw_mode().map_err(|e| TodoError::Other(e.to_string()))?;
    stdout()
        .execute(EnterAlternateScreen)
        .map_err(|e| TodoError::Other(e.to_string()))?;

    let backend = CrosstermBackend::new(stdout());
    let mut terminal = Terminal::new(backend).map_err(|e| TodoError::Other(e.to_string()))?;

    let mut app = App::new(manager, sort_by);
    let outcome = event_loop(&mut terminal, &mut app);

    disable_raw_mode().map_err(|e| TodoError::Other(e.to_string()))?;
    stdout()
        .execute(LeaveAlternateScreen)
        .map_err(|e| TodoError::Other(e.to_string()))?;

    outcome
}

fn event_loop<S: Storage, B: Backend>(terminal: &mut Terminal<B>, app: &mut App<S>) -> Result<()> {
    loop {
        terminal
            .draw(|f| ui(f, app))
            .map_err(|e| TodoError::Other(e.to_string()))?;

        if event::poll(Duration::from_millis(100)).map_err(|e| TodoError::Other(e.to_string()))? {
            if let Event::Key(key) = event::read().map_err(|e| TodoError::Other(e.to_string()))? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                app.handle_key(key);
                if app.should_quit {
                    return Ok(());
                }
            }
        }
    }
}
