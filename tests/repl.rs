use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

fn run_repl(db_path: &Path, input: &[String]) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_ferrodb"))
        .arg(db_path)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    {
        let stdin = child.stdin.as_mut().unwrap();
        for line in input {
            writeln!(stdin, "{line}").unwrap();
        }
    }
    child.wait_with_output().unwrap()
}

fn lines(input: &[&str]) -> Vec<String> {
    input.iter().map(|s| s.to_string()).collect()
}

fn stdout(output: &Output) -> String {
    String::from_utf8(output.stdout.clone()).unwrap()
}

#[test]
fn insert_and_select_roundtrip() {
    let dir = TempDir::new().unwrap();
    let output = run_repl(
        &dir.path().join("repl.db"),
        &lines(&["insert 1 user1 person1@example.com", "select", ".exit"]),
    );
    assert!(output.status.success());
    assert_eq!(
        stdout(&output),
        "Sup boy>Executed.\n\
         Sup boy>(1, user1, person1@example.com)\n\
         Executed.\n\
         Sup boy>"
    );
}

#[test]
fn rows_survive_a_restart() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("repl.db");

    let first = run_repl(&db, &lines(&["insert 1 user1 person1@example.com", ".exit"]));
    assert!(first.status.success());

    let second = run_repl(&db, &lines(&["select", ".exit"]));
    assert!(second.status.success());
    assert_eq!(
        stdout(&second),
        "Sup boy>(1, user1, person1@example.com)\nExecuted.\nSup boy>"
    );
}

#[test]
fn maximum_length_strings_are_accepted() {
    let dir = TempDir::new().unwrap();
    let username = "a".repeat(32);
    let email = "b".repeat(255);
    let output = run_repl(
        &dir.path().join("repl.db"),
        &lines(&[&format!("insert 1 {username} {email}"), "select", ".exit"]),
    );
    assert_eq!(
        stdout(&output),
        format!("Sup boy>Executed.\nSup boy>(1, {username}, {email})\nExecuted.\nSup boy>")
    );
}

#[test]
fn over_long_strings_are_rejected() {
    let dir = TempDir::new().unwrap();
    let username = "a".repeat(33);
    let email = "b".repeat(255);
    let output = run_repl(
        &dir.path().join("repl.db"),
        &lines(&[&format!("insert 1 {username} {email}"), "select", ".exit"]),
    );
    assert_eq!(
        stdout(&output),
        "Sup boy>String is too long.\nSup boy>Executed.\nSup boy>"
    );
}

#[test]
fn negative_id_is_rejected() {
    let dir = TempDir::new().unwrap();
    let output = run_repl(
        &dir.path().join("repl.db"),
        &lines(&["insert -1 foo bar@example.com", ".exit"]),
    );
    assert_eq!(stdout(&output), "Sup boy>ID must be positive.\nSup boy>");
}

#[test]
fn duplicate_key_is_reported() {
    let dir = TempDir::new().unwrap();
    let output = run_repl(
        &dir.path().join("repl.db"),
        &lines(&[
            "insert 1 user1 person1@example.com",
            "insert 1 user1 person1@example.com",
            "select",
            ".exit",
        ]),
    );
    assert_eq!(
        stdout(&output),
        "Sup boy>Executed.\n\
         Sup boy>Error: Duplicate key.\n\
         Sup boy>(1, user1, person1@example.com)\n\
         Executed.\n\
         Sup boy>"
    );
}

#[test]
fn malformed_input_reports_the_right_message() {
    let dir = TempDir::new().unwrap();
    let output = run_repl(
        &dir.path().join("repl.db"),
        &lines(&["insert 1 onlyone", "frobnicate 1 2 3", ".frobnicate", ".exit"]),
    );
    assert_eq!(
        stdout(&output),
        "Sup boy>Syntax error. Could not parse statement.\n\
         Sup boy>Unrecognized keyword at start of 'frobnicate 1 2 3'\n\
         Sup boy>Unrecognized command '.frobnicate'\n\
         Sup boy>"
    );
}

#[test]
fn constants_are_printed() {
    let dir = TempDir::new().unwrap();
    let output = run_repl(&dir.path().join("repl.db"), &lines(&[".constants", ".exit"]));
    assert_eq!(
        stdout(&output),
        "Sup boy>Constants:\n\
         ROW_SIZE: 291\n\
         COMMON_NODE_HEADER_SIZE: 6\n\
         LEAF_NODE_HEADER_SIZE: 14\n\
         LEAF_NODE_CELL_SIZE: 295\n\
         LEAF_NODE_SPACE_FOR_CELLS: 4082\n\
         LEAF_NODE_MAX_CELLS: 13\n\
         Sup boy>"
    );
}

#[test]
fn btree_dump_after_a_leaf_split() {
    let dir = TempDir::new().unwrap();
    let mut input: Vec<String> = (1..=14)
        .map(|i| format!("insert {i} user{i} person{i}@example.com"))
        .collect();
    input.push(".btree".into());
    input.push(".exit".into());

    let output = run_repl(&dir.path().join("repl.db"), &input);

    let mut expected = "Sup boy>Executed.\n".repeat(14);
    expected.push_str("Sup boy>Tree:\n- internal (size 1)\n  - leaf (size 7)\n");
    for i in 1..=7 {
        expected.push_str(&format!("    - {i}\n"));
    }
    expected.push_str("  - key 7\n  - leaf (size 7)\n");
    for i in 8..=14 {
        expected.push_str(&format!("    - {i}\n"));
    }
    expected.push_str("Sup boy>");
    assert_eq!(stdout(&output), expected);
}

#[test]
fn missing_filename_is_an_error() {
    let output = Command::new(env!("CARGO_BIN_EXE_ferrodb"))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(
        String::from_utf8_lossy(&output.stderr).contains("Must supply a database filename.")
    );
}

#[test]
fn eof_without_exit_discards_writes() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("repl.db");

    // Closing stdin without `.exit` is a failed read; nothing is flushed.
    let first = run_repl(&db, &lines(&["insert 1 user1 person1@example.com"]));
    assert!(!first.status.success());
    assert_eq!(stdout(&first), "Sup boy>Executed.\nSup boy>");

    let second = run_repl(&db, &lines(&["select", ".exit"]));
    assert!(second.status.success());
    assert_eq!(stdout(&second), "Sup boy>Executed.\nSup boy>");
}
