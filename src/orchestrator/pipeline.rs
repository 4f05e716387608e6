//! 分析パイプライン - 編排層
//!
//! `PhaseMachine` が返す `Step` を順に実行する。待機は `Clock`、呼び出しは `LlmClient` に
//! 委ね、進捗は `ProgressSink` に流す。フェーズは厳密に逐次で、並行実行はしない。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Local;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::InputError;
use crate::infrastructure::{Clock, TokioClock};
use crate::models::{AnalysisRequest, AnalysisResults, EventStatus, PipelineEvent, ProgressEvent};
use crate::services::{Chunker, LlmClient, ScoreParser};
use crate::utils::truncate_text;
use crate::workflow::{call_with_retry, PhaseMachine, PhaseTimings, RetryPolicy, Step};

/// 進捗の受け取り先
pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: PipelineEvent);
}

/// tracing に書き出すだけの受け取り先
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn on_event(&self, event: PipelineEvent) {
        match event {
            PipelineEvent::Progress(ProgressEvent {
                phase,
                status,
                message,
                progress,
            }) => {
                let progress = progress.map(|p| format!(" ({:.0}%)", p)).unwrap_or_default();
                match status {
                    EventStatus::Error => error!("❌ [Phase {}] {}", phase, message),
                    EventStatus::Warning => warn!("⚠️ [Phase {}] {}", phase, message),
                    EventStatus::Complete | EventStatus::Done => {
                        info!("✅ [Phase {}] {}", phase, message)
                    }
                    _ => info!("[Phase {}] {}{}", phase, message, progress),
                }
            }
            PipelineEvent::Result { results } => {
                info!("📊 結果: エラー {} 件", results.errors.len());
            }
            PipelineEvent::Done => debug!("ストリーム終了"),
            PipelineEvent::Error { message } => error!("❌ {}", message),
        }
    }
}

/// 受け取ったイベントをすべて保持する
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<PipelineEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// 進捗イベントだけ
    pub fn progress(&self) -> Vec<ProgressEvent> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                PipelineEvent::Progress(progress) => Some(progress),
                _ => None,
            })
            .collect()
    }
}

impl ProgressSink for CollectingSink {
    fn on_event(&self, event: PipelineEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

/// 呼び出し側からの中断要求
///
/// 実行中の LLM 呼び出しは止めず、次の待機・呼び出しを予定しなくなる。
#[derive(Debug, Default, Clone)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// 分析パイプライン
pub struct Pipeline {
    client: Arc<dyn LlmClient>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    timings: PhaseTimings,
    group_size: usize,
    chunker: Chunker,
    parser: ScoreParser,
}

impl Pipeline {
    /// 設定から組み立てる。待機は tokio のタイマーを使う。
    pub fn new(config: &Config, client: Arc<dyn LlmClient>) -> Result<Self, regex::Error> {
        Ok(Self {
            client,
            clock: Arc::new(TokioClock),
            retry: RetryPolicy::from_config(config),
            timings: PhaseTimings::from_config(config),
            group_size: config.chunk_group_size,
            chunker: Chunker::new()?,
            parser: ScoreParser::new()?,
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn model_name(&self) -> &str {
        self.client.model_name()
    }

    /// 依頼を検査してから実行する
    ///
    /// 検査に失敗した場合は `Error` イベントを流して返す。
    pub async fn analyze(
        &self,
        request: &AnalysisRequest,
        sink: &dyn ProgressSink,
        cancel: &CancelFlag,
    ) -> Result<AnalysisResults, InputError> {
        if let Err(e) = request.validate() {
            sink.on_event(PipelineEvent::Error {
                message: e.to_string(),
            });
            return Err(e);
        }
        Ok(self.run(request, sink, cancel).await)
    }

    /// 4フェーズを実行する
    ///
    /// # 戻り値
    /// 途中で失敗・中断しても、その時点までの結果を必ず返す。
    pub async fn run(
        &self,
        request: &AnalysisRequest,
        sink: &dyn ProgressSink,
        cancel: &CancelFlag,
    ) -> AnalysisResults {
        info!("🚀 分析開始 (モデル: {})", self.client.model_name());

        let chunks = self.chunker.chunk(&request.story_text, self.group_size);
        let mut machine = PhaseMachine::new(request, chunks, self.parser.clone(), self.timings);
        machine.start();

        loop {
            flush_events(&mut machine, sink);

            if cancel.is_cancelled() {
                machine.cancel();
                break;
            }

            match machine.next_step() {
                Step::Wait { duration, reason } => {
                    debug!("⏳ {}: {}秒", reason, duration.as_secs());
                    self.clock.sleep(duration).await;
                }
                Step::Call {
                    phase,
                    label,
                    prompt,
                } => {
                    debug!("🤖 {} / {} を呼出", phase, label);
                    match call_with_retry(
                        self.client.as_ref(),
                        self.clock.as_ref(),
                        &self.retry,
                        &prompt,
                        || cancel.is_cancelled(),
                    )
                    .await
                    {
                        Ok(text) => {
                            debug!("📥 応答: {}", truncate_text(&text, 80));
                            machine.on_response(text)
                        }
                        Err(e) => machine.on_failure(e.to_string()),
                    }
                }
                Step::Finished => break,
            }
        }
        flush_events(&mut machine, sink);

        let state = machine.state();
        let mut results = machine.into_results();
        results.finished_at = Some(Local::now());
        info!("分析終了: {:?}", state);

        sink.on_event(PipelineEvent::Result {
            results: Box::new(results.clone()),
        });
        sink.on_event(PipelineEvent::Done);
        results
    }
}

fn flush_events(machine: &mut PhaseMachine, sink: &dyn ProgressSink) {
    for event in machine.drain_events() {
        sink.on_event(PipelineEvent::Progress(event));
    }
}
