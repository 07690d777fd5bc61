use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn docchat_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("docchat");
    path
}

const STAFF_CSV: &str = "name,team,city\nAlice,Engineering,Berlin\nBob,Marketing,Paris\nCarol,Finance,Tokyo\n";

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(files_dir.join("staff.csv"), STAFF_CSV).unwrap();
    fs::write(files_dir.join("notes.docx"), b"PK\x03\x04").unwrap();

    // Small chunks so every entry is its own section.
    let config_content = r#"[chunking]
max_chars = 60
overlap_chars = 0

[completion]
base_url = "http://127.0.0.1:9/v1"
timeout_secs = 2
"#;
    let config_path = config_dir.join("docchat.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn file(tmp: &TempDir, name: &str) -> String {
    tmp.path().join("files").join(name).display().to_string()
}

fn run_docchat_with_env(
    config_path: &Path,
    args: &[&str],
    api_key: Option<&str>,
) -> (String, String, bool) {
    let binary = docchat_binary();
    let mut cmd = Command::new(&binary);
    cmd.arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("OPENAI_MODEL_NAME")
        .env("RUST_LOG", "warn");
    match api_key {
        Some(key) => cmd.env("OPENAI_API_KEY", key),
        None => cmd.env_remove("OPENAI_API_KEY"),
    };
    let output = cmd
        .output()
        .unwrap_or_else(|e| panic!("Failed to run docchat binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn run_docchat(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    run_docchat_with_env(config_path, args, None)
}

#[test]
fn test_ingest_reports_section_count() {
    let (tmp, config_path) = setup_test_env();
    let (stdout, stderr, success) =
        run_docchat(&config_path, &["ingest", &file(&tmp, "staff.csv")]);
    assert!(success, "ingest failed: {}", stderr);
    assert_eq!(stdout.trim(), "Document processed successfully! Found 4 sections.");
}

#[test]
fn test_ingest_show_chunks() {
    let (tmp, config_path) = setup_test_env();
    let (stdout, _, success) = run_docchat(
        &config_path,
        &["ingest", &file(&tmp, "staff.csv"), "--show-chunks"],
    );
    assert!(success);
    assert!(stdout.contains("--- chunk 0 ("));
    assert!(stdout.contains("Columns: name, team, city"));
    assert!(stdout.contains("--- chunk 3 ("));
    assert!(stdout.contains("Entry 3:\nname: Carol\nteam: Finance\ncity: Tokyo"));
}

#[test]
fn test_ingest_unsupported_format() {
    let (tmp, config_path) = setup_test_env();
    let (_, stderr, success) = run_docchat(&config_path, &["ingest", &file(&tmp, "notes.docx")]);
    assert!(!success, "docx should be rejected");
    assert!(
        stderr.contains("Error processing file: unsupported file type: docx"),
        "stderr: {}",
        stderr
    );
}

#[test]
fn test_ingest_missing_file() {
    let (tmp, config_path) = setup_test_env();
    let (_, stderr, success) = run_docchat(&config_path, &["ingest", &file(&tmp, "absent.csv")]);
    assert!(!success);
    assert!(stderr.contains("Error processing file: failed to read"), "stderr: {}", stderr);
}

#[test]
fn test_search_finds_matching_entry() {
    let (tmp, config_path) = setup_test_env();
    let (stdout, stderr, success) = run_docchat(
        &config_path,
        &["search", &file(&tmp, "staff.csv"), "Who works in Paris?"],
    );
    assert!(success, "search failed: {}", stderr);
    assert!(stdout.contains("1. [chunk 2]"), "stdout: {}", stdout);
    assert!(stdout.contains("city: Paris"));
    assert!(!stdout.contains("Berlin"));
    assert!(!stdout.contains("2. [chunk"));
}

#[test]
fn test_search_deterministic() {
    let (tmp, config_path) = setup_test_env();
    let args = ["search", &file(&tmp, "staff.csv"), "marketing team"];
    let (first, _, _) = run_docchat(&config_path, &args);
    let (second, _, _) = run_docchat(&config_path, &args);
    assert_eq!(first, second);
}

#[test]
fn test_search_no_results() {
    let (tmp, config_path) = setup_test_env();
    let (stdout, _, success) = run_docchat(
        &config_path,
        &["search", &file(&tmp, "staff.csv"), "zebra migration"],
    );
    assert!(success);
    assert_eq!(stdout.lines().last(), Some("No results."));
}

#[test]
fn test_search_all_scores_every_chunk() {
    let (tmp, config_path) = setup_test_env();
    let (stdout, _, success) = run_docchat(
        &config_path,
        &["search", &file(&tmp, "staff.csv"), "tokyo", "--all"],
    );
    assert!(success);
    let score_lines: Vec<&str> = stdout.lines().filter(|l| l.starts_with("chunk")).collect();
    assert_eq!(score_lines.len(), 4);
    assert!(score_lines[0].ends_with("0.0000"));
    assert!(!score_lines[3].ends_with("0.0000"));
}

#[test]
fn test_ask_requires_api_key() {
    let (tmp, config_path) = setup_test_env();
    let (_, stderr, success) = run_docchat(
        &config_path,
        &["ask", &file(&tmp, "staff.csv"), "Where is Bob?"],
    );
    assert!(!success);
    assert!(stderr.contains("OPENAI_API_KEY"), "stderr: {}", stderr);
}

#[test]
fn test_ask_irrelevant_question_skips_model() {
    let (tmp, config_path) = setup_test_env();
    // The configured endpoint is unreachable, so any model call would fail.
    let (stdout, stderr, success) = run_docchat_with_env(
        &config_path,
        &["ask", &file(&tmp, "staff.csv"), "zebra migration"],
        Some("sk-test"),
    );
    assert!(success, "ask failed: {}", stderr);
    assert!(stdout.contains(
        "I couldn't find relevant information to answer your question. Please try rephrasing it."
    ));
}

#[test]
fn test_ask_upstream_failure_is_reported() {
    let (tmp, config_path) = setup_test_env();
    let (_, stderr, success) = run_docchat_with_env(
        &config_path,
        &["ask", &file(&tmp, "staff.csv"), "Paris"],
        Some("sk-test"),
    );
    assert!(!success);
    assert!(stderr.contains("Error generating response:"), "stderr: {}", stderr);
}

#[test]
fn test_invalid_config_is_fatal() {
    let (tmp, config_path) = setup_test_env();
    fs::write(&config_path, "[retrieval]\ntop_k = 0\n").unwrap();
    let (_, stderr, success) = run_docchat(&config_path, &["ingest", &file(&tmp, "staff.csv")]);
    assert!(!success);
    assert!(stderr.contains("top_k"), "stderr: {}", stderr);
}

#[test]
fn test_missing_config_uses_defaults() {
    let (tmp, _) = setup_test_env();
    let missing = tmp.path().join("config").join("absent.toml");
    let (stdout, _, success) = run_docchat(&missing, &["ingest", &file(&tmp, "staff.csv")]);
    assert!(success);
    assert_eq!(stdout.trim(), "Document processed successfully! Found 1 sections.");
}

#[test]
fn test_completions() {
    let (_tmp, config_path) = setup_test_env();
    let (stdout, _, success) = run_docchat(&config_path, &["completions", "bash"]);
    assert!(success);
    assert!(stdout.contains("docchat"));
}
