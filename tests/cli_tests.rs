use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A command isolated from the real home directory and todo file.
fn todo_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("todo"));
    cmd.env("HOME", home)
        .env("TODO_FILE", todo_file(home))
        .env_remove("RUST_LOG");
    cmd
}

fn todo_file(home: &Path) -> PathBuf {
    home.join("todos.json")
}

fn read_todos(home: &Path) -> Vec<Value> {
    let content = std::fs::read_to_string(todo_file(home)).unwrap();
    serde_json::from_str(&content).unwrap()
}

fn first_id(home: &Path) -> String {
    read_todos(home)[0]["id"].as_u64().unwrap().to_string()
}

// =============================================================================
// Basic CLI
// =============================================================================

#[test]
fn test_help() {
    let home = TempDir::new().unwrap();
    todo_cmd(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("natural-language"));
}

#[test]
fn test_init_creates_config_and_file() {
    let home = TempDir::new().unwrap();
    todo_cmd(home.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("todo file"));

    assert!(home.path().join(".config/todo/config.toml").exists());
    assert_eq!(read_todos(home.path()).len(), 0);
}

// =============================================================================
// Adding
// =============================================================================

#[test]
fn test_add_parses_markup() {
    let home = TempDir::new().unwrap();
    todo_cmd(home.path())
        .args(["add", "_Clean", "desk", "@home"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Clean desk"));

    let todos = read_todos(home.path());
    assert_eq!(todos.len(), 1);
    assert_eq!(todos[0]["text"], "Clean desk");
    assert_eq!(todos[0]["priority"], "low");
    assert_eq!(todos[0]["tags"], serde_json::json!(["home"]));
    assert!(todos[0]["dueDate"].is_null());
    assert_eq!(todos[0]["completed"], false);
}

#[test]
fn test_add_with_iso_due_date() {
    let home = TempDir::new().unwrap();
    todo_cmd(home.path())
        .args(["add", "!Renew passport (2030-07-01)"])
        .assert()
        .success();

    let todos = read_todos(home.path());
    assert_eq!(todos[0]["dueDate"], "2030-07-01");
    assert_eq!(todos[0]["priority"], "high");
}

#[test]
fn test_add_rejects_markup_only_input() {
    let home = TempDir::new().unwrap();
    todo_cmd(home.path())
        .args(["add", "@work"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be empty"));
    assert!(!todo_file(home.path()).exists());
}

// =============================================================================
// Listing
// =============================================================================

#[test]
fn test_list_filters_and_sorts() {
    let home = TempDir::new().unwrap();
    for text in ["_Low thing @work", "!Urgent thing @work", "Home thing @home"] {
        todo_cmd(home.path()).args(["add", text]).assert().success();
    }

    let output = todo_cmd(home.path())
        .args(["list", "--tag", "work", "--sort", "priority"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let stdout = String::from_utf8(output).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("Urgent thing"));
    assert!(lines[1].contains("Low thing"));
}

#[test]
fn test_list_search_and_empty() {
    let home = TempDir::new().unwrap();
    todo_cmd(home.path()).args(["add", "Buy milk"]).assert().success();

    todo_cmd(home.path())
        .args(["list", "--search", "MILK"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Buy milk"));

    todo_cmd(home.path())
        .args(["list", "--search", "bread"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no todos"));
}

#[test]
fn test_list_on_corrupt_file_shows_nothing() {
    let home = TempDir::new().unwrap();
    std::fs::write(todo_file(home.path()), "{{ definitely not json").unwrap();

    todo_cmd(home.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("no todos"));
}

#[test]
fn test_list_rejects_unknown_sort() {
    let home = TempDir::new().unwrap();
    todo_cmd(home.path())
        .args(["list", "--sort", "random"])
        .assert()
        .failure();
}

// =============================================================================
// Mutations
// =============================================================================

#[test]
fn test_toggle_twice_restores_pending() {
    let home = TempDir::new().unwrap();
    todo_cmd(home.path()).args(["add", "Flip me"]).assert().success();
    let id = first_id(home.path());

    todo_cmd(home.path())
        .args(["toggle", id.as_str()])
        .assert()
        .success()
        .stdout(predicate::str::contains("completed"));
    assert!(read_todos(home.path())[0]["completedAt"].is_string());

    todo_cmd(home.path())
        .args(["toggle", id.as_str()])
        .assert()
        .success()
        .stdout(predicate::str::contains("reopened"));
    let todos = read_todos(home.path());
    assert_eq!(todos[0]["completed"], false);
    assert!(todos[0].get("completedAt").is_none());
}

#[test]
fn test_unknown_id_fails() {
    let home = TempDir::new().unwrap();
    todo_cmd(home.path()).args(["add", "Only one"]).assert().success();

    for cmd in ["toggle", "rm"] {
        todo_cmd(home.path())
            .args([cmd, "12345"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Todo not found: 12345"));
    }
    assert_eq!(read_todos(home.path()).len(), 1);
}

#[test]
fn test_edit_fields() {
    let home = TempDir::new().unwrap();
    todo_cmd(home.path()).args(["add", "Draft plan"]).assert().success();
    let id = first_id(home.path());

    todo_cmd(home.path())
        .args(["edit", id.as_str(), "--priority", "high", "--tags", "work,q3", "--due", "2031-01-15"])
        .assert()
        .success();

    let todos = read_todos(home.path());
    assert_eq!(todos[0]["text"], "Draft plan");
    assert_eq!(todos[0]["priority"], "high");
    assert_eq!(todos[0]["tags"], serde_json::json!(["work", "q3"]));
    assert_eq!(todos[0]["dueDate"], "2031-01-15");

    todo_cmd(home.path())
        .args(["edit", id.as_str(), "--no-due"])
        .assert()
        .success();
    assert!(read_todos(home.path())[0]["dueDate"].is_null());

    todo_cmd(home.path())
        .args(["edit", id.as_str(), "--due", "whenever"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognised due date"));
}

#[test]
fn test_rm_and_clear() {
    let home = TempDir::new().unwrap();
    for text in ["a", "b", "c"] {
        todo_cmd(home.path()).args(["add", text]).assert().success();
    }
    let ids: Vec<String> = read_todos(home.path())
        .iter()
        .map(|t| t["id"].as_u64().unwrap().to_string())
        .collect();

    todo_cmd(home.path()).args(["rm", ids[0].as_str()]).assert().success();
    todo_cmd(home.path()).args(["toggle", ids[1].as_str()]).assert().success();
    todo_cmd(home.path())
        .arg("clear")
        .assert()
        .success()
        .stdout(predicate::str::contains("cleared 1"));

    let todos = read_todos(home.path());
    assert_eq!(todos.len(), 1);
    assert_eq!(todos[0]["text"], "c");

    todo_cmd(home.path())
        .arg("clear")
        .assert()
        .success()
        .stdout(predicate::str::contains("no completed todos"));
}

// =============================================================================
// Legacy data and reports
// =============================================================================

#[test]
fn test_legacy_records_are_migrated_and_extras_kept() {
    let home = TempDir::new().unwrap();
    std::fs::write(
        todo_file(home.path()),
        r#"[{"id": 1600000000000, "text": "Legacy", "category": "work", "color": "red"}]"#,
    )
    .unwrap();

    todo_cmd(home.path())
        .args(["list", "--tag", "work"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Legacy"));

    todo_cmd(home.path())
        .args(["add", "New one"])
        .assert()
        .success();

    let todos = read_todos(home.path());
    assert_eq!(todos[0]["tags"], serde_json::json!(["work"]));
    assert_eq!(todos[0]["priority"], "medium");
    assert_eq!(todos[0]["color"], "red");
    assert!(todos[0].get("category").is_none());
    assert!(todos[1]["id"].as_u64().unwrap() > 1600000000000);
}

#[test]
fn test_record_without_id_keeps_listed_id() {
    let home = TempDir::new().unwrap();
    std::fs::write(todo_file(home.path()), r#"[{"text": "No id yet"}]"#).unwrap();

    todo_cmd(home.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("[ ] 1 medium No id yet"));

    todo_cmd(home.path())
        .args(["toggle", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("completed 1: No id yet"));

    let todos = read_todos(home.path());
    assert_eq!(todos[0]["id"], 1);
    assert_eq!(todos[0]["completed"], true);
}

#[test]
fn test_stats_and_tags() {
    let home = TempDir::new().unwrap();
    for text in ["!a @work", "b @work", "c @home"] {
        todo_cmd(home.path()).args(["add", text]).assert().success();
    }
    let id = first_id(home.path());
    todo_cmd(home.path()).args(["toggle", id.as_str()]).assert().success();

    todo_cmd(home.path())
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("total:     3"))
        .stdout(predicate::str::contains("completed: 1"))
        .stdout(predicate::str::contains("high 0, medium 2, low 0"))
        .stdout(predicate::str::contains("@work: 1"));

    todo_cmd(home.path())
        .arg("tags")
        .assert()
        .success()
        .stdout("home\nwork\n");
}

#[test]
fn test_due_window() {
    let home = TempDir::new().unwrap();
    todo_cmd(home.path()).args(["add", "Soon (1d)"]).assert().success();
    todo_cmd(home.path()).args(["add", "Later (30d)"]).assert().success();

    todo_cmd(home.path())
        .args(["due", "--days", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Soon"))
        .stdout(predicate::str::contains("Later").not());
}
