//! End-to-end question answering against an in-memory engine.

use super::support::{ManualClock, MockClient};
use crate::composer::NO_EVIDENCE_ANSWER;
use crate::config::EngineConfig;
use crate::engine::EvidenceEngine;
use crate::loader::fixtures::pdf_with_text;
use crate::types::IndexState;
use chrono::Duration;
use coldcase_core::AppError;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

const START: &str = "2026-02-01T09:00:00Z";

struct Harness {
    _temp: TempDir,
    client: Arc<MockClient>,
    clock: Arc<ManualClock>,
    engine: EvidenceEngine,
}

fn harness_with(client: MockClient, config: EngineConfig) -> Harness {
    let temp = TempDir::new().unwrap();
    let client = Arc::new(client);
    let clock = Arc::new(ManualClock::starting_at(START));

    let engine = EvidenceEngine::builder(temp.path().join("evidence"))
        .client(client.clone())
        .model("test-model")
        .clock(clock.clone())
        .config(config)
        .build()
        .unwrap();

    Harness {
        _temp: temp,
        client,
        clock,
        engine,
    }
}

fn harness() -> Harness {
    harness_with(
        MockClient::answering("According to the evidence, a red jacket."),
        EngineConfig::default(),
    )
}

#[tokio::test]
async fn test_empty_store_returns_sentinel_without_completion() {
    let h = harness();

    let outcome = h.engine.ask("ada", "Who was at the scene?").await.unwrap();

    assert_eq!(outcome.answer, NO_EVIDENCE_ANSWER);
    assert!(outcome.citations.is_empty());
    assert!(outcome.chunks.is_empty());
    assert_eq!(h.client.calls(), 0);
    assert_eq!(h.engine.index_stats().unwrap().state, IndexState::Empty);
}

#[tokio::test]
async fn test_uploaded_case_is_cited() {
    let h = harness();
    h.engine
        .upload("case1.txt", b"The suspect wore a red jacket.")
        .unwrap();

    let outcome = h
        .engine
        .ask("ada", "What did the suspect wear?")
        .await
        .unwrap();

    assert_eq!(outcome.citations, vec!["case1.txt"]);
    assert_eq!(outcome.chunks.len(), 1);
    assert!(outcome.chunks[0]
        .content
        .contains("The suspect wore a red jacket."));
    assert_eq!(outcome.answer, "According to the evidence, a red jacket.");

    let prompt = h.client.last_prompt().unwrap();
    assert!(prompt.contains("Evidence from case1.txt"));
    assert!(prompt.contains("What did the suspect wear?"));
}

#[tokio::test]
async fn test_at_most_three_chunks() {
    let h = harness();
    for n in 1..=5 {
        h.engine
            .upload(&format!("case{}.txt", n), format!("jacket report {}", n).as_bytes())
            .unwrap();
    }

    let outcome = h.engine.ask("ada", "jacket").await.unwrap();
    assert_eq!(outcome.chunks.len(), 3);
    assert!(outcome.citations.len() <= 3);
}

#[tokio::test]
async fn test_pdf_evidence_is_searchable() {
    let h = harness();
    h.engine
        .upload("ledger.pdf", &pdf_with_text("ledger shows the missing payment"))
        .unwrap();
    h.engine
        .upload("weather.txt", b"It rained all night.")
        .unwrap();

    let outcome = h
        .engine
        .ask("ada", "Was a payment missing from the ledger?")
        .await
        .unwrap();
    assert_eq!(outcome.chunks[0].source, "ledger.pdf");
}

#[tokio::test]
async fn test_corrupt_pdf_does_not_block_other_evidence() {
    let h = harness();
    let dir = h.engine.evidence_dir().to_path_buf();
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("broken.pdf"), b"not a pdf at all").unwrap();

    let report = h
        .engine
        .upload("case1.txt", b"The suspect wore a red jacket.")
        .unwrap();
    assert_eq!(report.rebuild.indexed, 1);
    assert_eq!(report.rebuild.skipped_unreadable, 1);

    let outcome = h.engine.ask("ada", "jacket").await.unwrap();
    assert_eq!(outcome.citations, vec!["case1.txt"]);
}

#[tokio::test]
async fn test_upload_keeps_only_file_name() {
    let h = harness();
    let report = h
        .engine
        .upload("../../outside/case9.txt", b"hidden")
        .unwrap();

    assert_eq!(report.file_name, "case9.txt");
    assert!(h.engine.evidence_dir().join("case9.txt").exists());
}

#[tokio::test]
async fn test_upload_rejects_unsupported_type() {
    let h = harness();
    let err = h.engine.upload("photo.png", &[1, 2, 3]).unwrap_err();

    assert!(matches!(err, AppError::UnreadableDocument { .. }));
    assert!(!h.engine.evidence_dir().join("photo.png").exists());
}

#[tokio::test]
async fn test_sixteenth_question_is_denied_until_reset() {
    let h = harness();
    h.engine.upload("case1.txt", b"red jacket").unwrap();

    for _ in 0..15 {
        h.engine.ask("ada", "jacket?").await.unwrap();
    }
    let err = h.engine.ask("ada", "jacket?").await.unwrap_err();
    assert!(err.is_quota_denial());
    assert_eq!(h.client.calls(), 15);

    h.clock.advance(Duration::hours(24) + Duration::seconds(1));
    h.engine.ask("ada", "jacket?").await.unwrap();
    assert_eq!(h.engine.quota_status("ada").unwrap().used, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_simultaneous_questions_respect_limit() {
    let Harness { _temp, engine, .. } = harness();
    engine.upload("case1.txt", b"red jacket").unwrap();
    let engine = Arc::new(engine);
    let barrier = Arc::new(tokio::sync::Barrier::new(20));

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let engine = engine.clone();
            let barrier = barrier.clone();
            tokio::spawn(async move {
                barrier.wait().await;
                engine.ask("ada", "jacket?").await
            })
        })
        .collect();
    let results: Vec<_> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let allowed = results.iter().filter(|r| r.is_ok()).count();
    let denied = results
        .iter()
        .filter(|r| matches!(r, Err(e) if e.is_quota_denial()))
        .count();
    assert_eq!(allowed, 15);
    assert_eq!(denied, 5);
    assert_eq!(engine.quota_status("ada").unwrap().used, 15);
    assert_eq!(engine.quota_status("ada").unwrap().remaining, 0);
}

#[tokio::test]
async fn test_failed_completion_is_refunded() {
    let h = harness_with(MockClient::failing(), EngineConfig::default());
    h.engine.upload("case1.txt", b"red jacket").unwrap();

    let err = h.engine.ask("ada", "jacket?").await.unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(h.engine.quota_status("ada").unwrap().used, 0);
    assert!(h.engine.history("ada").unwrap().is_empty());
}

#[tokio::test]
async fn test_history_keeps_newest_five() {
    let h = harness();
    for n in 0..7 {
        h.engine
            .ask("ada", &format!("question {}", n))
            .await
            .unwrap();
    }
    h.engine.ask("bob", "question x").await.unwrap();

    let history = h.engine.history("ada").unwrap();
    assert_eq!(history.len(), 5);
    assert_eq!(history[0].question, "question 2");
    assert_eq!(history[4].question, "question 6");

    assert_eq!(h.engine.clear_history("ada").unwrap(), 5);
    assert_eq!(h.engine.history("bob").unwrap().len(), 1);
}

#[tokio::test]
async fn test_custom_limits_apply() {
    let config = EngineConfig {
        daily_limit: 2,
        top_k: 1,
        max_excerpt_chars: 5,
        ..Default::default()
    };
    let h = harness_with(MockClient::answering("ok"), config);
    h.engine.upload("a.txt", b"jacket jacket jacket").unwrap();
    h.engine.upload("b.txt", b"jacket and more").unwrap();

    let outcome = h.engine.ask("ada", "jacket").await.unwrap();
    assert_eq!(outcome.chunks.len(), 1);
    assert_eq!(outcome.chunks[0].content.chars().count(), 5);

    h.engine.ask("ada", "jacket").await.unwrap();
    let status = h.engine.quota_status("ada").unwrap();
    assert_eq!(status.remaining, 0);
    assert!(h.engine.ask("ada", "jacket").await.unwrap_err().is_quota_denial());
}
