use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn ccp_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("ccp");
    path
}

const FILLER: &str = "Lorem ipsum dolor sit amet, consectetur adipiscing elit. ";

/// Merged text for one document that splits into two chunks at
/// target 1000 / max 1500, with the finance sentence only in the second.
fn two_chunk_merged_text() -> String {
    format!(
        "===== BEGIN FILE: report.pdf =====\n{}The financial statement for 2023 was approved. {}\n===== END FILE: report.pdf =====\n",
        FILLER.repeat(20),
        FILLER.repeat(10)
    )
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::create_dir_all(root.join("downloads")).unwrap();

    let config_content = format!(
        r#"[paths]
downloads_dir = "{root}/downloads"
data_dir = "{root}/data"
merged_file = "{root}/merged_output.txt"

[chunking]
target_size = 1000
max_size = 1500

[tagging]
provider = "rules"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("ccp.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_ccp(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = ccp_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("GEMINI_API_KEY")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run ccp binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

/// Minimal PDF with a single text object. Body first, then an xref table
/// with correct byte offsets.
fn minimal_pdf(phrase: &str) -> Vec<u8> {
    let stream = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET", phrase);
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
            stream.len(),
            stream
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

#[test]
fn test_filter_then_verify_end_to_end() {
    let (tmp, config_path) = setup_test_env();
    let root = tmp.path();
    fs::write(root.join("merged_output.txt"), two_chunk_merged_text()).unwrap();

    let (stdout, stderr, success) = run_ccp(&config_path, &["filter"]);
    assert!(success, "filter failed: stdout={} stderr={}", stdout, stderr);
    assert!(stdout.contains("chunks processed: 2"), "stdout: {}", stdout);
    assert!(stdout.contains("tags found: [finance]"), "stdout: {}", stdout);

    let records = read_json(&root.join("data/ai_filtered_results.json"));
    let records = records.as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["id"], 1);
    assert_eq!(records[1]["id"], 2);
    assert_eq!(records[0]["tags"], serde_json::json!([]));
    assert_eq!(records[1]["tags"], serde_json::json!(["finance"]));
    assert_eq!(records[1]["detected_years"], serde_json::json!([2023]));
    assert_eq!(records[1]["processing_method"], "rule_based");

    let (stdout, stderr, success) = run_ccp(&config_path, &["verify"]);
    assert!(success, "verify failed: stdout={} stderr={}", stdout, stderr);
    assert!(stdout.contains("overall status: healthy"), "stdout: {}", stdout);

    let report = read_json(&root.join("data/verification_report.json"));
    assert_eq!(report["overall_status"], "healthy");
    assert_eq!(report["merged_output"]["files_processed"], 1);
    assert_eq!(report["ai_results"]["chunks_processed"], 2);
    assert_eq!(
        report["ai_results"]["tags_summary"],
        serde_json::json!({ "finance": 1 })
    );
    assert_eq!(report["ai_results"]["years_detected"], serde_json::json!([2023]));
}

#[test]
fn test_filter_dry_run_writes_nothing() {
    let (tmp, config_path) = setup_test_env();
    let root = tmp.path();
    fs::write(root.join("merged_output.txt"), two_chunk_merged_text()).unwrap();

    let (stdout, stderr, success) = run_ccp(&config_path, &["filter", "--dry-run"]);
    assert!(success, "dry-run failed: stdout={} stderr={}", stdout, stderr);
    assert!(stdout.contains("dry-run"));
    assert!(stdout.contains("first record:"));
    assert!(!root.join("data/ai_filtered_results.json").exists());
}

#[test]
fn test_filter_cli_overrides() {
    let (tmp, config_path) = setup_test_env();
    let root = tmp.path();
    let input = root.join("other.txt");
    let output = root.join("out/records.json");
    fs::write(&input, "A hospital budget. Another sentence here.").unwrap();

    let (stdout, stderr, success) = run_ccp(
        &config_path,
        &[
            "filter",
            "--input",
            input.to_str().unwrap(),
            "--output",
            output.to_str().unwrap(),
            "--target-size",
            "10",
            "--max-size",
            "30",
        ],
    );
    assert!(success, "filter failed: stdout={} stderr={}", stdout, stderr);

    let records = read_json(&output);
    let records = records.as_array().unwrap();
    assert!(records.len() >= 2);
    for record in records {
        assert!(record["sample_text"].as_str().unwrap().chars().count() <= 30);
    }
}

#[test]
fn test_filter_missing_input_fails() {
    let (tmp, config_path) = setup_test_env();

    let (_stdout, stderr, success) = run_ccp(&config_path, &["filter"]);
    assert!(!success);
    assert!(stderr.contains("input missing or empty"), "stderr: {}", stderr);
    assert!(!tmp.path().join("data/ai_filtered_results.json").exists());
}

#[test]
fn test_filter_rejects_inverted_sizes() {
    let (tmp, config_path) = setup_test_env();
    fs::write(tmp.path().join("merged_output.txt"), two_chunk_merged_text()).unwrap();

    let (_stdout, _stderr, success) = run_ccp(
        &config_path,
        &["filter", "--target-size", "500", "--max-size", "100"],
    );
    assert!(!success);
}

#[test]
fn test_health_check_exit_status() {
    let (tmp, config_path) = setup_test_env();
    let root = tmp.path();

    let (stdout, _stderr, success) = run_ccp(&config_path, &["verify", "--health-check"]);
    assert!(!success);
    assert!(stdout.contains("overall status: unhealthy"), "stdout: {}", stdout);
    assert!(stdout.contains("merged output:  missing"));
    assert!(!root.join("data/verification_report.json").exists());

    fs::write(root.join("merged_output.txt"), two_chunk_merged_text()).unwrap();
    let (_stdout, _stderr, success) = run_ccp(&config_path, &["filter"]);
    assert!(success);

    let (stdout, _stderr, success) = run_ccp(&config_path, &["verify", "--health-check"]);
    assert!(success, "stdout: {}", stdout);
    assert!(stdout.contains("overall status: healthy"));
    assert!(!stdout.contains("Verification Report"));
    assert!(!root.join("data/verification_report.json").exists());
}

#[test]
fn test_verify_degraded_on_malformed_records() {
    let (tmp, config_path) = setup_test_env();
    let root = tmp.path();
    fs::write(root.join("merged_output.txt"), two_chunk_merged_text()).unwrap();
    fs::create_dir_all(root.join("data")).unwrap();
    fs::write(
        root.join("data/ai_filtered_results.json"),
        r#"[
  {"id": 1, "created_at": "2024-05-01T12:00:00Z", "summary": "s", "tags": ["finance"],
   "detected_years": [2020], "sample_text": "t", "processing_method": "rule_based"},
  {"id": 2, "tags": ["astrology"]}
]"#,
    )
    .unwrap();

    let (stdout, _stderr, success) = run_ccp(&config_path, &["verify"]);
    assert!(!success);
    assert!(stdout.contains("overall status: degraded"), "stdout: {}", stdout);

    let report = read_json(&root.join("data/verification_report.json"));
    assert_eq!(report["ai_results"]["malformed_records"], 1);
    assert_eq!(report["ai_results"]["chunks_processed"], 2);
}

#[test]
fn test_extract_merges_documents_with_markers() {
    let (tmp, config_path) = setup_test_env();
    let root = tmp.path();
    fs::write(root.join("downloads/b_budget.pdf"), minimal_pdf("annual budget 2022")).unwrap();
    fs::write(root.join("downloads/a_broken.pdf"), b"not a pdf at all").unwrap();
    fs::write(root.join("downloads/notes.txt"), "ignored").unwrap();

    let (stdout, stderr, success) = run_ccp(&config_path, &["extract"]);
    assert!(success, "extract failed: stdout={} stderr={}", stdout, stderr);
    assert!(stdout.contains("documents found: 2"), "stdout: {}", stdout);

    let merged = fs::read_to_string(root.join("merged_output.txt")).unwrap();
    assert!(merged.starts_with("# Merged PDF text generated at "));
    assert!(merged.contains("===== BEGIN FILE: a_broken.pdf (EXTRACTION FAILED) ====="));
    assert!(merged.contains("===== BEGIN FILE: b_budget.pdf"));
    assert!(!merged.contains("notes.txt"));
    let a = merged.find("a_broken.pdf").unwrap();
    let b = merged.find("b_budget.pdf").unwrap();
    assert!(a < b);

    let (stdout, _stderr, success) = run_ccp(&config_path, &["extract"]);
    assert!(success);
    assert!(stdout.contains("use --force to rebuild"), "stdout: {}", stdout);
}

#[test]
fn test_run_pipeline() {
    let (tmp, config_path) = setup_test_env();
    let root = tmp.path();
    fs::write(root.join("merged_output.txt"), two_chunk_merged_text()).unwrap();

    let (stdout, stderr, success) = run_ccp(&config_path, &["run"]);
    assert!(success, "run failed: stdout={} stderr={}", stdout, stderr);
    assert!(root.join("data/ai_filtered_results.json").exists());
    assert!(root.join("data/verification_report.json").exists());
    assert!(stdout.contains("overall status: healthy"));
}

#[test]
fn test_missing_explicit_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_stdout, stderr, success) = run_ccp(&tmp.path().join("nope.toml"), &["verify"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"), "stderr: {}", stderr);
}

#[test]
fn test_rules_only_runs_against_gemini_config_without_key() {
    let (tmp, config_path) = setup_test_env();
    let root = tmp.path();
    let config = fs::read_to_string(&config_path)
        .unwrap()
        .replace("provider = \"rules\"", "provider = \"gemini\"");
    fs::write(&config_path, config).unwrap();
    fs::write(root.join("merged_output.txt"), two_chunk_merged_text()).unwrap();

    let (stdout, stderr, success) = run_ccp(&config_path, &["filter", "--rules-only"]);
    assert!(success, "filter failed: stdout={} stderr={}", stdout, stderr);
    assert!(stdout.contains("tagging: rules"), "stdout: {}", stdout);

    let (_stdout, stderr, success) = run_ccp(&config_path, &["filter"]);
    assert!(!success);
    assert!(stderr.contains("GEMINI_API_KEY"), "stderr: {}", stderr);
}

#[test]
fn test_verify_report_carries_pipeline_summary() {
    let (tmp, config_path) = setup_test_env();
    let root = tmp.path();
    fs::write(root.join("merged_output.txt"), two_chunk_merged_text()).unwrap();
    assert!(run_ccp(&config_path, &["filter"]).2);

    let (stdout, _stderr, success) = run_ccp(&config_path, &["verify"]);
    assert!(success);
    assert!(stdout.contains("Pipeline Summary"), "stdout: {}", stdout);

    let report = read_json(&root.join("data/verification_report.json"));
    assert_eq!(report["summary"]["chunks_processed"], 2);
    assert_eq!(report["summary"]["unique_tags"], 1);
    assert_eq!(report["summary"]["files_processed"], 1);
    assert_eq!(report["ai_results"]["year_counts"], serde_json::json!({ "2023": 1 }));
}
