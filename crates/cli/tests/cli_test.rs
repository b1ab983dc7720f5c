//! Basic CLI integration tests.

#![allow(deprecated)] // Command::cargo_bin deprecated for custom build-dir; still works for default

use assert_cmd::Command;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

/// A command whose config directory is an empty temp dir.
fn textpager(config_home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("textpager").unwrap();
    cmd.env("XDG_CONFIG_HOME", config_home.path())
        .env("HOME", config_home.path())
        .env_remove("RUST_LOG");
    cmd
}

fn write_book(dir: &TempDir, name: &str, text: &str) -> String {
    let path = dir.path().join(name);
    std::fs::write(&path, text).unwrap();
    path.to_string_lossy().into_owned()
}

fn stdout_json(out: &assert_cmd::assert::Assert) -> serde_json::Value {
    let stdout = std::str::from_utf8(&out.get_output().stdout).unwrap();
    serde_json::from_str(stdout).expect("stdout should be valid JSON")
}

#[test]
fn help_prints_and_exits_success() {
    let home = TempDir::new().unwrap();
    textpager(&home).arg("--help").assert().success();
}

#[test]
fn config_show_json_valid() {
    let home = TempDir::new().unwrap();
    let out = textpager(&home).args(["config", "show", "--json"]).assert().success();
    let cfg = stdout_json(&out);
    assert_eq!(cfg["pagination"]["eastern_page_size"], 1500);
}

#[test]
fn config_set_then_show() {
    let home = TempDir::new().unwrap();
    textpager(&home)
        .args(["config", "set", "pagination.western_page_size", "200"])
        .assert()
        .success();
    let out = textpager(&home).args(["config", "show", "--json"]).assert().success();
    assert_eq!(stdout_json(&out)["pagination"]["western_page_size"], 200);
}

#[test]
fn config_set_unknown_key_fails() {
    let home = TempDir::new().unwrap();
    textpager(&home)
        .args(["config", "set", "pagination.colour", "blue"])
        .assert()
        .failure();
}

#[test]
fn process_nonexistent_file_fails() {
    let home = TempDir::new().unwrap();
    let out = textpager(&home)
        .args(["process", "/nonexistent/book.txt"])
        .assert()
        .failure();
    let stderr = std::str::from_utf8(&out.get_output().stderr).unwrap();
    assert!(stderr.contains("Input file not found"));
}

#[test]
fn process_rejects_unknown_encoding() {
    let home = TempDir::new().unwrap();
    let input = write_book(&home, "book.txt", "Chapter 1\ntext\n");
    textpager(&home)
        .args(["process", &input, "--encoding", "no-such-charset"])
        .assert()
        .failure();
}

#[test]
fn process_prints_book_json() {
    let home = TempDir::new().unwrap();
    let input = write_book(&home, "book.txt", "Chapter 1 Intro\nHello world.\nChapter 2 Next\nMore text.\n");
    let out = textpager(&home)
        .args(["process", &input, "--no-title-page"])
        .assert()
        .success();
    let book = stdout_json(&out);
    assert_eq!(book["pageBreaks"], serde_json::json!([0, 2]));
    assert_eq!(book["titles"][1][2], "Next");
    assert_eq!(book["titlePageLines"], serde_json::json!([]));
}

#[test]
fn process_writes_output_file() {
    let home = TempDir::new().unwrap();
    let input = write_book(&home, "Jane Austen - Emma.txt", "Chapter 1\nEmma Woodhouse, handsome, clever, and rich.\n");
    let output = home.path().join("emma.json");
    let out = textpager(&home)
        .args(["process", &input, "-o", output.to_str().unwrap(), "--json"])
        .assert()
        .success();
    let summary = stdout_json(&out);
    assert_eq!(summary["author"], "Jane Austen");
    assert_eq!(summary["titles"], 1);

    let book: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(book["titlePageLines"].as_array().unwrap().len(), 3);
    assert_eq!(book["pageBreaks"], serde_json::json!([0, 3]));
}

#[test]
fn detect_reports_metadata() {
    let home = TempDir::new().unwrap();
    let input = write_book(&home, "《三体》作者：刘慈欣.txt", "第一章 科学边界\n汪淼觉得，来找他的这四个人是一个奇怪的组合。\n");
    let out = textpager(&home).args(["detect", &input, "--json"]).assert().success();
    let meta = stdout_json(&out);
    assert_eq!(meta["bookName"], "三体");
    assert_eq!(meta["author"], "刘慈欣");
    assert_eq!(meta["isEastern"], true);
}

#[test]
fn titles_lists_chapters() {
    let home = TempDir::new().unwrap();
    let input = write_book(&home, "book.txt", "第一章 开始\n正文。\n第二章 继续\n正文。\n");
    let out = textpager(&home).args(["titles", &input]).assert().success();
    let stdout = std::str::from_utf8(&out.get_output().stdout).unwrap();
    assert!(stdout.contains("第一章 开始"));
    assert!(stdout.contains("2 titles"));
}
