use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sl_score::error::{InputError, LlmError};
use sl_score::infrastructure::{RecordingClock, ScriptedLlm};
use sl_score::models::{AnalysisRequest, EventStatus, PipelineEvent, StoryMeta, ITEM_NAMES};
use sl_score::orchestrator::{CancelFlag, CollectingSink, Pipeline};
use sl_score::services::LlmClient;
use sl_score::workflow::RetryPolicy;
use sl_score::Config;
use tokio_test::assert_err;

const SCORES: [f64; 14] = [
    8.5, 7.0, 9.0, 6.5, 7.5, 8.0, 7.0, 9.5, 8.0, 9.0, 7.5, 8.5, 9.5, 8.0,
];

fn scoring_text() -> String {
    ITEM_NAMES
        .iter()
        .zip(SCORES)
        .enumerate()
        .map(|(i, (name, score))| format!("{:02}. {}：{:.1}", i + 1, name, score))
        .collect::<Vec<_>>()
        .join("\n")
}

fn request(story: &str, skip_verification: bool) -> AnalysisRequest {
    AnalysisRequest {
        meta: StoryMeta {
            protagonist: "ミナ".to_string(),
            genre: "ファンタジー".to_string(),
            ..Default::default()
        },
        story_text: story.to_string(),
        skip_verification,
        ..Default::default()
    }
}

fn config() -> Config {
    Config {
        chunk_group_size: 1,
        ..Config::default()
    }
}

fn api_error(message: &str) -> LlmError {
    LlmError::ApiCallFailed {
        model: "scripted".to_string(),
        status: None,
        message: message.to_string(),
    }
}

fn pipeline(llm: Arc<ScriptedLlm>, clock: Arc<RecordingClock>) -> Pipeline {
    Pipeline::new(&config(), llm).unwrap().with_clock(clock)
}

fn secs(values: &[u64]) -> Vec<Duration> {
    values.iter().copied().map(Duration::from_secs).collect()
}

const TWO_EPISODES: &str = "＜第1話＞ 旅立ちの朝 ＜第2話＞ 森の試練";

#[tokio::test]
async fn test_full_pipeline_waits_and_results() {
    let llm = Arc::new(ScriptedLlm::new());
    llm.enqueue_ok("精読1")
        .enqueue_ok("精読2")
        .enqueue_ok("前半マッピング")
        .enqueue_ok("後半マッピング")
        .enqueue_ok(scoring_text())
        .enqueue_ok("検証結果");
    let clock = Arc::new(RecordingClock::new());
    let sink = CollectingSink::new();

    let results = pipeline(llm.clone(), clock.clone())
        .run(&request(TWO_EPISODES, false), &sink, &CancelFlag::new())
        .await;

    assert!(results.is_complete());
    assert!(results.finished_at.is_some());
    assert_eq!(clock.waits(), secs(&[5, 60, 60, 60, 60]));
    assert_eq!(llm.call_count(), 6);

    let prompts = llm.prompts();
    assert!(prompts[0].contains("第1話〜第1話（1/2）"));
    assert!(prompts[1].contains("第2話〜第2話（2/2）"));
    assert!(prompts[2].contains("=== 第1話〜第1話 ===\n精読1"));
    assert!(prompts[3].contains("=== 第2話〜第2話 ===\n精読2"));

    let score = results.final_score.as_ref().unwrap();
    assert_eq!(score.scores.values(), &SCORES);
    assert_eq!(score.final_score, 81.4);
    assert_eq!(results.phases.verification.as_deref(), Some("検証結果"));

    let events = sink.events();
    assert!(matches!(events[events.len() - 2], PipelineEvent::Result { .. }));
    assert!(matches!(events[events.len() - 1], PipelineEvent::Done));

    let progress = sink.progress();
    let done = progress.last().unwrap();
    assert_eq!((done.phase, done.status), (0, EventStatus::Done));
    assert_eq!(progress[0].message, "Phase 1: テキスト分割・精読開始");
    assert_eq!(progress[1].message, "2チャンクに分割完了");
}

#[tokio::test]
async fn test_mapping_failure_aborts_after_retries() {
    let llm = Arc::new(ScriptedLlm::new());
    llm.enqueue_ok("精読");
    for _ in 0..4 {
        llm.enqueue_err(api_error("boom"));
    }
    let clock = Arc::new(RecordingClock::new());
    let sink = CollectingSink::new();

    let results = pipeline(llm.clone(), clock.clone())
        .run(&request("＜第1話＞ ひとつだけ", false), &sink, &CancelFlag::new())
        .await;

    assert_eq!(llm.call_count(), 5);
    assert_eq!(clock.waits(), secs(&[60, 5, 10, 15]));
    assert_eq!(
        results.errors,
        vec!["Phase 2: LLM API呼出失敗 (モデル: scripted): boom".to_string()]
    );
    assert!(results.phases.mapping.is_none());
    assert!(results.final_score.is_none());
    assert!(!sink.progress().iter().any(|e| e.status == EventStatus::Done));
    assert!(sink
        .progress()
        .iter()
        .any(|e| e.phase == 2 && e.status == EventStatus::Error));
}

#[tokio::test]
async fn test_extraction_failure_is_recorded_and_skipped() {
    let llm = Arc::new(ScriptedLlm::with_fallback(scoring_text()));
    for _ in 0..4 {
        llm.enqueue_err(api_error("Rate limit reached"));
    }
    llm.enqueue_ok("精読2");
    let clock = Arc::new(RecordingClock::new());
    let sink = CollectingSink::new();

    let results = pipeline(llm.clone(), clock.clone())
        .run(&request(TWO_EPISODES, true), &sink, &CancelFlag::new())
        .await;

    // レート制限のバックオフ3回、失敗後はチャンク間待機なし、フェーズ間待機3回
    assert_eq!(clock.waits(), secs(&[30, 60, 90, 60, 60, 60]));
    assert_eq!(
        results.errors,
        vec!["Phase 1 (第1話〜第1話): LLM API呼出失敗 (モデル: scripted): Rate limit reached"
            .to_string()]
    );
    let extraction = results.phases.extraction.as_ref().unwrap();
    assert_eq!(extraction.len(), 1);
    assert_eq!(extraction[0].label, "第2話〜第2話");
    assert!(results.final_score.is_some());
    assert!(results.phases.verification.is_none());
    assert!(sink
        .progress()
        .iter()
        .any(|e| e.phase == 0 && e.status == EventStatus::Done));
}

#[tokio::test]
async fn test_zero_score_warning() {
    let llm = Arc::new(ScriptedLlm::with_fallback("特に記述なし"));
    let clock = Arc::new(RecordingClock::new());
    let sink = CollectingSink::new();

    let results = pipeline(llm, clock)
        .run(&request("短い物語", true), &sink, &CancelFlag::new())
        .await;

    let score = results.final_score.as_ref().unwrap();
    assert!(score.has_zero);
    assert!(sink.progress().iter().any(|e| e.phase == 3
        && e.status == EventStatus::Warning
        && e.message == "警告: 一部スコアの抽出に失敗。手動確認推奨"));
}

#[tokio::test]
async fn test_empty_story_finishes_without_calls() {
    let llm = Arc::new(ScriptedLlm::new());
    let clock = Arc::new(RecordingClock::new());
    let sink = CollectingSink::new();

    let results = pipeline(llm.clone(), clock.clone())
        .run(&request("  \n ", false), &sink, &CancelFlag::new())
        .await;

    assert_eq!(llm.call_count(), 0);
    assert!(clock.waits().is_empty());
    assert!(results.errors.is_empty());
    assert_eq!(results.phases.extraction.as_ref().map(Vec::len), Some(0));
    assert!(results.final_score.is_none());
    assert!(sink.progress().iter().any(|e| e.status == EventStatus::Done));
}

#[tokio::test]
async fn test_cancel_before_start() {
    let llm = Arc::new(ScriptedLlm::with_fallback("応答"));
    let clock = Arc::new(RecordingClock::new());
    let sink = CollectingSink::new();
    let cancel = CancelFlag::new();
    cancel.cancel();

    let results = pipeline(llm.clone(), clock)
        .run(&request(TWO_EPISODES, false), &sink, &cancel)
        .await;

    assert_eq!(llm.call_count(), 0);
    assert_eq!(results.errors, vec!["キャンセルされました".to_string()]);
    assert!(matches!(sink.events().last(), Some(PipelineEvent::Done)));
}

/// 最初の呼び出しの最中に中断要求が来る LLM
struct CancelOnCall {
    cancel: CancelFlag,
    inner: ScriptedLlm,
}

#[async_trait]
impl LlmClient for CancelOnCall {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        self.cancel.cancel();
        self.inner.complete(prompt).await
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

#[tokio::test]
async fn test_cancel_lets_in_flight_call_finish() {
    let cancel = CancelFlag::new();
    let llm = Arc::new(CancelOnCall {
        cancel: cancel.clone(),
        inner: ScriptedLlm::with_fallback("精読"),
    });
    let clock = Arc::new(RecordingClock::new());
    let sink = CollectingSink::new();

    let results = Pipeline::new(&config(), llm.clone())
        .unwrap()
        .with_clock(clock.clone())
        .run(&request(TWO_EPISODES, false), &sink, &cancel)
        .await;

    assert_eq!(llm.inner.call_count(), 1);
    // 実行中の呼び出しの結果は残り、次の待機は行わない
    assert!(clock.waits().is_empty());
    assert_eq!(results.errors, vec!["キャンセルされました".to_string()]);
    assert_eq!(results.phases.extraction.as_ref().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_cancel_during_failing_call_stops_retries() {
    let cancel = CancelFlag::new();
    let inner = ScriptedLlm::with_fallback("精読");
    inner.enqueue_err(LlmError::ApiCallFailed {
        model: "scripted".to_string(),
        status: None,
        message: "boom".to_string(),
    });
    let llm = Arc::new(CancelOnCall {
        cancel: cancel.clone(),
        inner,
    });
    let clock = Arc::new(RecordingClock::new());
    let sink = CollectingSink::new();

    let results = Pipeline::new(&config(), llm.clone())
        .unwrap()
        .with_clock(clock.clone())
        .run(&request(TWO_EPISODES, false), &sink, &cancel)
        .await;

    // 失敗した呼び出しの後はバックオフもリトライもしない
    assert_eq!(llm.inner.call_count(), 1);
    assert!(clock.waits().is_empty());
    assert_eq!(results.errors.len(), 2);
    assert!(results.errors[0].starts_with("Phase 1 ("));
    assert!(results.errors[0].ends_with("boom"));
    assert_eq!(results.errors[1], "キャンセルされました");
    assert!(results.phases.extraction.is_none());
    assert!(matches!(
        sink.events().last(),
        Some(PipelineEvent::Done)
    ));
}

#[tokio::test]
async fn test_analyze_rejects_missing_protagonist() {
    let llm = Arc::new(ScriptedLlm::new());
    let clock = Arc::new(RecordingClock::new());
    let sink = CollectingSink::new();
    let mut bad = request(TWO_EPISODES, false);
    bad.meta.protagonist = " ".to_string();

    let err = assert_err!(
        pipeline(llm.clone(), clock)
            .analyze(&bad, &sink, &CancelFlag::new())
            .await
    );

    assert_eq!(err, InputError::MissingProtagonist);
    assert_eq!(llm.call_count(), 0);
    assert!(matches!(
        sink.events().as_slice(),
        [PipelineEvent::Error { .. }]
    ));
}

#[tokio::test]
async fn test_scoring_failure_without_retries() {
    let llm = Arc::new(ScriptedLlm::new());
    llm.enqueue_ok("精読")
        .enqueue_ok("前半")
        .enqueue_ok("後半")
        .enqueue_err(api_error("boom"));
    let clock = Arc::new(RecordingClock::new());
    let sink = CollectingSink::new();
    let no_retry = RetryPolicy {
        max_retries: 0,
        ..RetryPolicy::default()
    };

    let results = pipeline(llm.clone(), clock.clone())
        .with_retry(no_retry)
        .run(&request("＜第1話＞ ひとつだけ", false), &sink, &CancelFlag::new())
        .await;

    assert_eq!(llm.call_count(), 4);
    assert_eq!(clock.waits(), secs(&[60, 60, 60]));
    assert!(results.phases.mapping.is_some());
    assert!(results.phases.scoring.is_none());
    assert!(results.final_score.is_none());
    assert_eq!(
        results.errors,
        vec!["Phase 3: LLM API呼出失敗 (モデル: scripted): boom".to_string()]
    );
}
