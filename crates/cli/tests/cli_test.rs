//! Integration tests for the `enrich` binary

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use std::fs;
use std::path::Path;

/// The binary, run in `dir` with no credential and no `.env` in reach
fn enrich(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("enrich").unwrap();
    cmd.current_dir(dir)
        .env_remove("OPENAI_API_KEY")
        .env_remove("RUST_LOG");
    cmd
}

fn write_chunks(dir: &Path, ids: &[&str]) {
    fs::create_dir_all(dir).unwrap();
    for id in ids {
        let chunk = json!({"id": id, "text": format!("Text of {id}.")});
        fs::write(dir.join(format!("{id}.json")), chunk.to_string()).unwrap();
    }
}

fn write_benchmark(path: &Path, n: u32) {
    let items: Vec<_> = (1..=n)
        .map(|id| json!({"id": id, "question": format!("Question {id}?"), "answer": "x"}))
        .collect();
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, serde_json::to_string(&items).unwrap()).unwrap();
}

#[test]
fn test_llm_stages_require_credential() {
    let tmp = tempfile::tempdir().unwrap();
    write_chunks(&tmp.path().join("set_chunk"), &["c1"]);
    write_benchmark(&tmp.path().join("benchmark/benchmark_qa.json"), 2);

    enrich(tmp.path())
        .args(["extract-metadata", "--chunks", "set_chunk"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("OPENAI_API_KEY"));

    enrich(tmp.path())
        .args(["score", "--chunks", "set_chunk"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("OPENAI_API_KEY"));

    assert!(!tmp.path().join("benchmark/metadata/set").exists());
    assert!(!tmp.path().join("benchmark/score/set").exists());
}

#[test]
fn test_missing_input_dir_fails() {
    let tmp = tempfile::tempdir().unwrap();

    enrich(tmp.path())
        .env("OPENAI_API_KEY", "sk-test")
        .args(["extract-metadata", "--chunks", "absent_chunk"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));

    enrich(tmp.path())
        .args(["clean", "absent", "out"])
        .assert()
        .failure();
}

#[test]
fn test_list_missing_needs_no_credential() {
    let tmp = tempfile::tempdir().unwrap();
    write_chunks(&tmp.path().join("set_chunk"), &["c1", "c2"]);
    write_benchmark(&tmp.path().join("qa.json"), 3);

    let score_dir = tmp.path().join("scores");
    fs::create_dir_all(&score_dir).unwrap();
    let complete = json!({
        "1": {"relevance_score": 1.0, "relevance_reason": "a"},
        "2": {"relevance_score": 0.0, "relevance_reason": "b"},
        "3": {"relevance_score": 0.5, "relevance_reason": "c"}
    });
    fs::write(score_dir.join("c1.json"), complete.to_string()).unwrap();

    enrich(tmp.path())
        .args([
            "score",
            "--chunks",
            "set_chunk",
            "--qa-path",
            "qa.json",
            "--score-dir",
            "scores",
            "--list-missing",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("c2\tq1"))
        .stdout(predicate::str::contains("c1\tq").not())
        .stdout(predicate::str::contains("3 missing pairs across 1 of 2 chunks"));
}

#[test]
fn test_fully_scored_set_makes_no_calls() {
    let tmp = tempfile::tempdir().unwrap();
    write_chunks(&tmp.path().join("set_chunk"), &["c1"]);
    write_benchmark(&tmp.path().join("qa.json"), 1);
    let score_dir = tmp.path().join("benchmark/score/set");
    fs::create_dir_all(&score_dir).unwrap();
    let stored = json!({"1": {"relevance_score": 0.8, "relevance_reason": "kept"}}).to_string();
    fs::write(score_dir.join("c1.json"), &stored).unwrap();

    // Nothing listens on the discard port, so any call would fail the pair
    enrich(tmp.path())
        .env("OPENAI_API_KEY", "sk-test")
        .env("ENRICH_LLM_BASE_URL", "http://127.0.0.1:9")
        .env("ENRICH_RETRY_MAX_ATTEMPTS", "1")
        .args(["score", "--chunks", "set_chunk", "--qa-path", "qa.json", "--no-answer"])
        .assert()
        .success()
        .stdout(predicate::str::contains("score: 0 processed, 1 skipped, 0 failed"));

    assert_eq!(fs::read_to_string(score_dir.join("c1.json")).unwrap(), stored);
}

#[test]
fn test_local_stages_end_to_end() {
    let tmp = tempfile::tempdir().unwrap();
    let data = tmp.path().join("data/2022");
    fs::create_dir_all(&data).unwrap();
    for i in 0..3 {
        fs::write(
            data.join(format!("page_{i}.txt")),
            format!("Story {i} covers the new laboratory building.\n\nStaffnet\n\nShared footer line."),
        )
        .unwrap();
    }
    fs::write(data.join("nav.txt"), "Staffnet\n\nShared footer line.").unwrap();

    enrich(tmp.path())
        .args(["ingest", "data", "data_cleaned/raw"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ingest: 4 processed"));

    enrich(tmp.path())
        .args(["clean", "data_cleaned/raw", "data_cleaned/advanced", "--threshold", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("clean: 4 processed"));

    enrich(tmp.path())
        .args(["validate", "data_cleaned/advanced", "data_cleaned/advanced_validated"])
        .assert()
        .success()
        .stdout(predicate::str::contains("validate: 3 processed, 0 skipped, 1 failed"));

    let kept = fs::read_dir(tmp.path().join("data_cleaned/advanced_validated"))
        .unwrap()
        .count();
    assert_eq!(kept, 3);
}

#[test]
fn test_init_creates_layout() {
    let tmp = tempfile::tempdir().unwrap();

    enrich(tmp.path()).args(["init", "project"]).assert().success();

    for dir in [
        "data",
        "data_cleaned/raw",
        "data_cleaned/advanced_validated",
        "benchmark/score",
        "subsample/semantic_chunk",
    ] {
        assert!(tmp.path().join("project").join(dir).is_dir(), "{dir} missing");
    }
}
