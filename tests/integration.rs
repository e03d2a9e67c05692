use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

const TOKEN_VAR: &str = "HUGGINGFACEHUB_API_TOKEN";

fn docqa_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("docqa");
    path
}

/// Minimal single-page PDF with `text` in its content stream. Offsets in the
/// xref table are computed from the body so pdf-extract can parse it.
fn minimal_pdf(text: &str) -> Vec<u8> {
    let content = format!("BT /F1 12 Tf 72 700 Td ({}) Tj ET", text);
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(
        format!(
            "4 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
            content.len(),
            content
        )
        .as_bytes(),
    );
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in [o1, o2, o3, o4, o5] {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

/// Temp workspace with study notes and an offline config (no embedding
/// model, no OCR executables).
fn setup_test_env() -> (TempDir, PathBuf, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let notes = root.join("notes");
    fs::create_dir_all(&notes).unwrap();
    fs::write(
        notes.join("biology.txt"),
        "Osmosis is the movement of water across a membrane.\n\nMitochondria produce energy for the cell.\n\n\n",
    )
    .unwrap();
    fs::write(
        notes.join("ai.txt"),
        "Machine learning is a subset of AI. Neural networks have layers.",
    )
    .unwrap();
    fs::write(notes.join("slides.pptx"), b"not supported").unwrap();

    let config_path = root.join("docqa.toml");
    fs::write(
        &config_path,
        r#"[embedding]
provider = "disabled"

[extraction]
ocr = false
"#,
    )
    .unwrap();

    (tmp, config_path, notes)
}

fn docqa(dir: &Path, config_path: &Path) -> Command {
    let mut cmd = Command::new(docqa_binary());
    cmd.current_dir(dir)
        .env(TOKEN_VAR, "hf_test_token")
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(config_path)
        .arg("--progress")
        .arg("off");
    cmd
}

fn run(cmd: &mut Command) -> (String, String, bool) {
    let output: Output = cmd
        .output()
        .unwrap_or_else(|e| panic!("Failed to run docqa binary at {:?}: {}", docqa_binary(), e));
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_extract_text_files() {
    let (tmp, config_path, notes) = setup_test_env();

    let (stdout, stderr, success) = run(docqa(tmp.path(), &config_path)
        .arg("extract")
        .arg(notes.join("biology.txt")));
    assert!(success, "extract failed: stdout={}, stderr={}", stdout, stderr);
    assert_eq!(
        stdout,
        "Osmosis is the movement of water across a membrane.\n\nMitochondria produce energy for the cell.\n"
    );
}

#[test]
fn test_extract_directory_skips_unsupported() {
    let (tmp, config_path, notes) = setup_test_env();

    let (stdout, stderr, success) = run(docqa(tmp.path(), &config_path)
        .arg("extract")
        .arg(&notes));
    assert!(success, "extract failed: stdout={}, stderr={}", stdout, stderr);
    // Directory contents are sorted by path: ai.txt before biology.txt.
    let ai = stdout.find("Machine learning").unwrap();
    let bio = stdout.find("Osmosis").unwrap();
    assert!(ai < bio);
    assert!(!stdout.contains("not supported"));
}

#[test]
fn test_extract_pdf_text_layer() {
    let (tmp, config_path, notes) = setup_test_env();
    let pdf = notes.join("lecture.pdf");
    fs::write(&pdf, minimal_pdf("photosynthesis lecture notes")).unwrap();

    let (stdout, stderr, success) = run(docqa(tmp.path(), &config_path)
        .arg("extract")
        .arg(&pdf));
    assert!(success, "extract failed: stdout={}, stderr={}", stdout, stderr);
    assert!(
        stdout.contains("photosynthesis lecture notes"),
        "stdout={}",
        stdout
    );
}

#[test]
fn test_extract_does_not_need_token() {
    let (tmp, config_path, notes) = setup_test_env();

    let (_, stderr, success) = run(docqa(tmp.path(), &config_path)
        .env_remove(TOKEN_VAR)
        .arg("extract")
        .arg(&notes));
    assert!(success, "extract without token failed: {}", stderr);
}

#[test]
fn test_chunk_json() {
    let (tmp, config_path, notes) = setup_test_env();
    fs::write(notes.join("long.txt"), "All cells come from cells. ".repeat(100)).unwrap();

    let (stdout, stderr, success) = run(docqa(tmp.path(), &config_path)
        .arg("chunk")
        .arg(notes.join("long.txt"))
        .arg("--json"));
    assert!(success, "chunk failed: stdout={}, stderr={}", stdout, stderr);

    let chunks: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let chunks = chunks.as_array().unwrap();
    assert!(chunks.len() >= 3, "got {} chunks", chunks.len());
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk["index"].as_u64(), Some(i as u64));
        assert!(chunk["text"].as_str().unwrap().chars().count() <= 1000);
        assert_eq!(chunk["hash"].as_str().unwrap().len(), 64);
    }
}

#[test]
fn test_chunk_plain_output() {
    let (tmp, config_path, notes) = setup_test_env();

    let (stdout, _, success) = run(docqa(tmp.path(), &config_path)
        .arg("chunk")
        .arg(notes.join("ai.txt")));
    assert!(success);
    assert!(stdout.starts_with("1 chunks\n"));
    assert!(stdout.contains("--- chunk 0 "));
}

#[test]
fn test_ask_without_index_asks_to_process_first() {
    let (tmp, config_path, notes) = setup_test_env();

    let (stdout, stderr, success) = run(docqa(tmp.path(), &config_path)
        .arg("ask")
        .arg(&notes)
        .arg("-q")
        .arg("What is osmosis?"));
    assert!(success, "ask failed: stdout={}, stderr={}", stdout, stderr);
    assert_eq!(
        stdout.trim(),
        "Please upload and process your documents first before asking questions."
    );
    assert!(stderr.contains("index could not be built"));
}

#[test]
fn test_ask_answers_every_question() {
    let (tmp, config_path, notes) = setup_test_env();

    let (stdout, _, success) = run(docqa(tmp.path(), &config_path)
        .arg("ask")
        .arg(&notes)
        .arg("-q")
        .arg("What is osmosis?")
        .arg("--question")
        .arg("Why?"));
    assert!(success);
    assert_eq!(
        stdout
            .matches("Please upload and process your documents first")
            .count(),
        2
    );
}

#[test]
fn test_missing_token_is_fatal() {
    let (tmp, config_path, notes) = setup_test_env();

    let (stdout, stderr, success) = run(docqa(tmp.path(), &config_path)
        .env_remove(TOKEN_VAR)
        .arg("ask")
        .arg(&notes)
        .arg("-q")
        .arg("What is osmosis?"));
    assert!(!success, "ask should fail without a token");
    assert!(stdout.is_empty());
    assert!(stderr.contains(TOKEN_VAR), "stderr={}", stderr);
}

#[test]
fn test_optional_token() {
    let (tmp, config_path, notes) = setup_test_env();
    fs::write(
        &config_path,
        "[embedding]\nprovider = \"disabled\"\n\n[auth]\nrequired = false\n",
    )
    .unwrap();

    let (stdout, stderr, success) = run(docqa(tmp.path(), &config_path)
        .env_remove(TOKEN_VAR)
        .arg("ask")
        .arg(&notes)
        .arg("-q")
        .arg("What is osmosis?"));
    assert!(success, "ask failed: stderr={}", stderr);
    assert!(stdout.contains("Please upload and process"));
}

#[test]
fn test_invalid_config_rejected() {
    let (tmp, config_path, notes) = setup_test_env();
    fs::write(&config_path, "[chunking]\nchunk_size = 100\nchunk_overlap = 200\n").unwrap();

    let (_, stderr, success) = run(docqa(tmp.path(), &config_path)
        .arg("extract")
        .arg(&notes));
    assert!(!success);
    assert!(stderr.contains("chunk_overlap"), "stderr={}", stderr);
}

#[test]
fn test_chat_history_and_clear() {
    let (tmp, config_path, notes) = setup_test_env();

    let mut child = docqa(tmp.path(), &config_path)
        .arg("chat")
        .arg(&notes)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"What is osmosis?\n:history\n:clear\n:history\n:quit\nNever asked\n")
        .unwrap();
    let output = child.wait_with_output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("You: What is osmosis?"));
    assert!(stdout.contains("Assistant: Please upload and process"));
    assert!(stdout.contains("History cleared."));
    assert!(stdout.contains("No messages yet."));
    assert!(!stdout.contains("Never asked"));
}
