//! Regression tests to ensure hostile stylesheets never panic the pruner.
//! Unbalanced or truncated input must come back as retained text.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use tempfile::tempdir;

#[test]
fn test_unbalanced_braces_no_panic() {
    let dir = tempdir().unwrap();
    let sources = write_sources(dir.path());

    let test_cases = vec![
        ".card { color: red;",
        ".card { .inner { color: red; }",
        "@media (min-width: 10px) { .card { color: red; }",
        "{{{{",
        "}}}} .card{}",
        "@supports (display:grid) {",
    ];

    for css in test_cases {
        let result = run_pruner_pipe(&sources, css);

        assert!(result.success, "Input {:?} failed. stderr: {}", css, result.stderr);
        assert!(!result.stderr.contains("panicked at"),
            "Input {:?} caused a panic: {}", css, result.stderr);
    }
}

#[test]
fn test_unterminated_comments_and_strings_no_panic() {
    let dir = tempdir().unwrap();
    let sources = write_sources(dir.path());

    let test_cases = vec![
        "/* never closed .card{}",
        ".card{content:\"unterminated}",
        ".card{content:'a} .b{}",
        "@import url(\"x.css",
        "/**/ /* */ /",
        "\\",
    ];

    for css in test_cases {
        let result = run_pruner_pipe(&sources, css);

        assert!(!result.stderr.contains("panicked at"),
            "Input {:?} caused a panic: {}", css, result.stderr);
    }
}

#[test]
fn test_malformed_tail_is_retained() {
    let dir = tempdir().unwrap();
    let sources = write_sources(dir.path());

    let result = run_pruner_pipe(&sources, ".gone{a:b} .card{a:b} .broken { color: red;");

    assert!(result.success, "stderr: {}", result.stderr);
    assert!(result.stdout.contains(".card"), "used rule dropped: {}", result.stdout);
    assert!(result.stdout.contains(".broken"), "malformed tail dropped: {}", result.stdout);
    assert!(!result.stdout.contains(".gone"), "unused rule kept: {}", result.stdout);
}

#[test]
fn test_deep_nesting_and_non_ascii_no_panic() {
    let dir = tempdir().unwrap();
    let sources = write_sources(dir.path());

    let deep = format!("{}.card{{}}{}", "@media print {".repeat(200), "}".repeat(200));
    let test_cases = vec![
        deep,
        ".café{color:red} .日本{x:y} .card::before{content:\"→\"}".to_string(),
        "@media (max-width: 480px){.émoji-😀{a:b}} @media (max-width:480px){.card{}}".to_string(),
        ".a\u{0}b{} .card{}".to_string(),
    ];

    for css in &test_cases {
        let result = run_pruner_pipe(&sources, css);

        assert!(result.success, "Input {:?} failed. stderr: {}", css, result.stderr);
        assert!(!result.stderr.contains("panicked at"),
            "Input {:?} caused a panic: {}", css, result.stderr);
    }
}

#[test]
fn test_combine_media_flag_in_pipe_mode() {
    let dir = tempdir().unwrap();
    let sources = write_sources(dir.path());

    let mut child = Command::new(env!("CARGO_BIN_EXE_css-pruner"))
        .arg("pipe")
        .arg("-s")
        .arg(&sources)
        .arg("--combine-media")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn css-pruner");

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(b"@media print{.card{}} @media print{.title{}}")
            .unwrap();
    }

    let output = child.wait_with_output().expect("Failed to wait for output");
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert_eq!(stdout.matches("@media").count(), 1, "{}", stdout);
}

#[test]
fn test_unmatched_source_glob_fails_without_output() {
    let dir = tempdir().unwrap();
    let missing = format!("{}/*.vue", dir.path().display());

    let result = run_pruner_pipe(&missing, ".card { a: b } .unused { c: d }");

    assert!(!result.success);
    assert!(result.stdout.is_empty(), "{}", result.stdout);
    assert!(result.stderr.contains("No files found"), "{}", result.stderr);
}

fn write_sources(dir: &Path) -> String {
    fs::write(
        dir.join("index.html"),
        r#"<div class="card"><h1 class="title">Hi</h1></div>"#,
    )
    .unwrap();
    format!("{}/*.html", dir.display())
}

// Helper function to run the pruner in pipe mode
fn run_pruner_pipe(sources: &str, input: &str) -> PrunerResult {
    let mut child = Command::new(env!("CARGO_BIN_EXE_css-pruner"))
        .arg("pipe")
        .arg("-s")
        .arg(sources)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn css-pruner");

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(input.as_bytes()).unwrap();
    }

    let output = child.wait_with_output().expect("Failed to wait for output");

    PrunerResult {
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    }
}

struct PrunerResult {
    success: bool,
    stdout: String,
    stderr: String,
}
