//! 4フェーズ分析の状態機械
//!
//! 待機も LLM 呼び出しもここでは行わない。次に何をすべきかを `Step` として返し、
//! 呼び出し結果を `on_response` / `on_failure` で受け取って遷移する。
//! 実際に待つ・呼ぶのは `orchestrator::pipeline` の役目。
//!
//! 遷移：
//! Extracting(0..n) → Mapping(前半) → Mapping(後半) → Scoring → Verifying → Done
//!
//! - Phase 1 の失敗は記録して次のチャンクへ進む
//! - Phase 2 / 3 の失敗で Failed になり、以降は実行しない
//! - Phase 4 の失敗は記録するだけで Done になる

use std::time::Duration;

use tracing::{debug, info};

use crate::config::Config;
use crate::models::{
    AnalysisRequest, AnalysisResults, Chunk, EventStatus, Extraction, Phase, ProgressEvent,
    StoryMeta,
};
use crate::services::{compute_composite, PromptBuilder, ScoreParser};

const RATE_LIMIT_WAIT_MESSAGE: &str = "レート制限回避のため少し待機...";
const CANCELLED_MESSAGE: &str = "キャンセルされました";

/// Phase 2 の何回目の呼び出しか
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingHalf {
    First,
    Second,
}

/// 状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineState {
    /// `start()` 前
    Idle,
    /// Phase 1 で `index` 番目のチャンクを処理中
    Extracting { index: usize },
    Mapping(MappingHalf),
    Scoring,
    Verifying,
    Done,
    /// 重要フェーズの失敗で打ち切り
    Failed(Phase),
    Cancelled,
}

impl MachineState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            MachineState::Done | MachineState::Failed(_) | MachineState::Cancelled
        )
    }

    pub fn phase(self) -> Option<Phase> {
        match self {
            MachineState::Extracting { .. } => Some(Phase::Extracting),
            MachineState::Mapping(_) => Some(Phase::Mapping),
            MachineState::Scoring => Some(Phase::Scoring),
            MachineState::Verifying => Some(Phase::Verifying),
            MachineState::Failed(phase) => Some(phase),
            _ => None,
        }
    }
}

/// 駆動側が次に行うこと
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// `duration` だけ待つ
    Wait { duration: Duration, reason: String },
    /// プロンプトで LLM を呼び、結果を `on_response` / `on_failure` で返す
    Call {
        phase: Phase,
        label: String,
        prompt: String,
    },
    /// これ以上することはない
    Finished,
}

/// 待機時間の設定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTimings {
    /// Phase 1 のチャンク間
    pub chunk_delay: Duration,
    /// フェーズ間と Phase 2 の前半・後半の間
    pub phase_delay: Duration,
}

impl Default for PhaseTimings {
    fn default() -> Self {
        Self {
            chunk_delay: Duration::from_secs(5),
            phase_delay: Duration::from_secs(60),
        }
    }
}

impl PhaseTimings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            chunk_delay: config.chunk_delay(),
            phase_delay: config.phase_delay(),
        }
    }
}

/// 分析1回分の状態機械
pub struct PhaseMachine {
    meta: StoryMeta,
    chunks: Vec<Chunk>,
    parser: ScoreParser,
    timings: PhaseTimings,
    skip_verification: bool,

    state: MachineState,
    /// 次の呼び出しの前に挟む待機
    pending_wait: Option<Duration>,
    first_half_mapping: Option<String>,
    extractions: Vec<Extraction>,
    results: AnalysisResults,
    events: Vec<ProgressEvent>,
    /// 処理中の進捗を通知済みの状態
    announced: Option<MachineState>,
}

impl PhaseMachine {
    /// # 引数
    /// - `request`: 分析依頼（本文は分割済みの `chunks` を使う）
    /// - `chunks`: Phase 1 で精読するチャンク
    /// - `parser`: Phase 3 の採点抽出器
    /// - `timings`: 待機時間
    pub fn new(
        request: &AnalysisRequest,
        chunks: Vec<Chunk>,
        parser: ScoreParser,
        timings: PhaseTimings,
    ) -> Self {
        Self {
            meta: request.meta.clone(),
            chunks,
            parser,
            timings,
            skip_verification: request.skip_verification,
            state: MachineState::Idle,
            pending_wait: None,
            first_half_mapping: None,
            extractions: Vec::new(),
            results: AnalysisResults::new(),
            events: Vec::new(),
            announced: None,
        }
    }

    pub fn state(&self) -> MachineState {
        self.state
    }

    pub fn results(&self) -> &AnalysisResults {
        &self.results
    }

    pub fn into_results(self) -> AnalysisResults {
        self.results
    }

    /// 溜まった進捗イベントを取り出す
    pub fn drain_events(&mut self) -> Vec<ProgressEvent> {
        std::mem::take(&mut self.events)
    }

    /// Phase 1 を開始する
    pub fn start(&mut self) {
        if self.state != MachineState::Idle {
            return;
        }
        self.emit(Phase::Extracting, EventStatus::Start, "Phase 1: テキスト分割・精読開始");
        self.emit(
            Phase::Extracting,
            EventStatus::Info,
            format!("{}チャンクに分割完了", self.chunks.len()),
        );
        self.state = MachineState::Extracting { index: 0 };

        if self.chunks.is_empty() {
            self.finish_extraction();
        }
    }

    /// 次にすべきこと
    ///
    /// `Step::Call` を返したら `on_response` か `on_failure` で結果を渡すまで状態は進まない。
    /// その間に再度呼ぶと同じ `Step::Call` を返し、進捗イベントは重ねて積まない。
    pub fn next_step(&mut self) -> Step {
        if self.state.is_terminal() || self.state == MachineState::Idle {
            return Step::Finished;
        }

        if let Some(duration) = self.pending_wait.take() {
            let reason = match self.state {
                MachineState::Extracting { .. } => "チャンク間待機",
                MachineState::Mapping(MappingHalf::Second) => "マッピング前半・後半間の待機",
                _ => "フェーズ間待機",
            };
            return Step::Wait {
                duration,
                reason: reason.to_string(),
            };
        }

        let announce = self.announced != Some(self.state);
        self.announced = Some(self.state);
        let builder = PromptBuilder::new(&self.meta);
        let (phase, label, prompt) = match self.state {
            MachineState::Extracting { index } => {
                let total = self.chunks.len();
                let chunk = &self.chunks[index];
                let prompt = builder.extraction(&chunk.label, &chunk.text, index + 1, total);
                let label = chunk.label.clone();
                let progress = index as f64 / total as f64 * 100.0;
                if announce {
                    self.events.push(
                        ProgressEvent::new(
                            Phase::Extracting.number(),
                            EventStatus::Progress,
                            format!("精読中: {}（{}/{}）", label, index + 1, total),
                        )
                        .with_progress(progress),
                    );
                }
                (Phase::Extracting, label, prompt)
            }
            MachineState::Mapping(half) => {
                let split_at = self.extractions.len().div_ceil(2);
                let (first, second) = self.extractions.split_at(split_at);
                let (extractions, message, label) = match half {
                    MappingHalf::First => (first, "マッピング前半（1/2）処理中...", "マッピング前半"),
                    MappingHalf::Second => (second, "マッピング後半（2/2）処理中...", "マッピング後半"),
                };
                let prompt = builder.mapping(&render_extractions(extractions));
                if announce {
                    self.emit(Phase::Mapping, EventStatus::Progress, message);
                }
                (Phase::Mapping, label.to_string(), prompt)
            }
            MachineState::Scoring => {
                let mapping = self.results.phases.mapping.as_deref().unwrap_or_default();
                let prompt = builder.scoring(mapping);
                (Phase::Scoring, "採点".to_string(), prompt)
            }
            MachineState::Verifying => {
                let scoring = self.results.phases.scoring.as_deref().unwrap_or_default();
                let prompt = builder.verification(scoring);
                (Phase::Verifying, "逆方向検証".to_string(), prompt)
            }
            MachineState::Idle
            | MachineState::Done
            | MachineState::Failed(_)
            | MachineState::Cancelled => return Step::Finished,
        };

        debug!("{} / {}: プロンプト {} 文字", phase, label, prompt.chars().count());
        Step::Call {
            phase,
            label,
            prompt,
        }
    }

    /// 直前の `Step::Call` が成功した
    pub fn on_response(&mut self, text: String) {
        match self.state {
            MachineState::Extracting { index } => {
                let label = self.chunks[index].label.clone();
                self.extractions.push(Extraction {
                    label,
                    result: text,
                });
                if index + 1 < self.chunks.len() {
                    self.emit(Phase::Extracting, EventStatus::Info, RATE_LIMIT_WAIT_MESSAGE);
                    self.pending_wait = Some(self.timings.chunk_delay);
                }
                self.advance_extraction(index);
            }
            MachineState::Mapping(MappingHalf::First) => {
                self.first_half_mapping = Some(text);
                self.emit_phase_wait(Phase::Mapping);
                self.state = MachineState::Mapping(MappingHalf::Second);
            }
            MachineState::Mapping(MappingHalf::Second) => {
                let first = self.first_half_mapping.take().unwrap_or_default();
                self.results.phases.mapping =
                    Some(format!("【前半分析】\n{}\n\n【後半分析】\n{}", first, text));
                self.emit(Phase::Mapping, EventStatus::Complete, "Phase 2 完了: 構造マッピング完了");
                self.enter_scoring();
            }
            MachineState::Scoring => {
                let scores = self.parser.parse(&text);
                self.results.phases.scoring = Some(text);
                if scores.has_zero() {
                    self.emit(
                        Phase::Scoring,
                        EventStatus::Warning,
                        "警告: 一部スコアの抽出に失敗。手動確認推奨",
                    );
                }
                let composite = compute_composite(&scores);
                self.emit(
                    Phase::Scoring,
                    EventStatus::Complete,
                    format!("Phase 3 完了: 補正ESCスコア {}点", composite.final_score),
                );
                self.results.final_score = Some(composite);

                if self.skip_verification {
                    self.finish_done();
                } else {
                    self.enter_verification();
                }
            }
            MachineState::Verifying => {
                self.results.phases.verification = Some(text);
                self.emit(Phase::Verifying, EventStatus::Complete, "Phase 4 完了: 検証結果出力済み");
                self.finish_done();
            }
            MachineState::Idle
            | MachineState::Done
            | MachineState::Failed(_)
            | MachineState::Cancelled => {}
        }
    }

    /// 直前の `Step::Call` がリトライ後も失敗した
    pub fn on_failure(&mut self, message: impl Into<String>) {
        let message = message.into();
        match self.state {
            MachineState::Extracting { index } => {
                let label = self.chunks[index].label.clone();
                self.results
                    .errors
                    .push(format!("Phase 1 ({}): {}", label, message));
                self.emit(
                    Phase::Extracting,
                    EventStatus::Error,
                    format!("エラー: {} - {}", label, message),
                );
                self.advance_extraction(index);
            }
            MachineState::Mapping(_) | MachineState::Scoring | MachineState::Verifying => {
                let Some(phase) = self.state.phase() else {
                    return;
                };
                self.record_phase_error(phase, &message);
                self.first_half_mapping = None;
                if phase.is_critical() {
                    self.state = MachineState::Failed(phase);
                } else {
                    self.finish_done();
                }
            }
            MachineState::Idle
            | MachineState::Done
            | MachineState::Failed(_)
            | MachineState::Cancelled => {}
        }
    }

    /// 以降の待機・呼び出しを打ち切る
    pub fn cancel(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        let phase = self.state.phase().map(Phase::number).unwrap_or(0);
        if self.results.phases.extraction.is_none() && !self.extractions.is_empty() {
            self.results.phases.extraction = Some(self.extractions.clone());
        }
        self.results.errors.push(CANCELLED_MESSAGE.to_string());
        self.events
            .push(ProgressEvent::new(phase, EventStatus::Error, CANCELLED_MESSAGE));
        self.pending_wait = None;
        self.state = MachineState::Cancelled;
        info!("分析をキャンセルしました");
    }

    fn advance_extraction(&mut self, index: usize) {
        if index + 1 < self.chunks.len() {
            self.state = MachineState::Extracting { index: index + 1 };
        } else {
            self.finish_extraction();
        }
    }

    fn finish_extraction(&mut self) {
        self.pending_wait = None;
        self.results.phases.extraction = Some(self.extractions.clone());
        self.emit(
            Phase::Extracting,
            EventStatus::Complete,
            format!("Phase 1 完了: {}チャンク処理済み", self.extractions.len()),
        );

        if self.chunks.is_empty() {
            info!("分析対象のチャンクがありません");
            self.finish_done();
            return;
        }

        self.emit(Phase::Mapping, EventStatus::Start, "Phase 2: 構造マッピング開始");
        self.emit_phase_wait(Phase::Mapping);
        self.state = MachineState::Mapping(MappingHalf::First);
    }

    fn enter_scoring(&mut self) {
        self.emit(Phase::Scoring, EventStatus::Start, "Phase 3: 採点開始");
        self.emit_phase_wait(Phase::Scoring);
        self.state = MachineState::Scoring;
    }

    fn enter_verification(&mut self) {
        self.emit(
            Phase::Verifying,
            EventStatus::Start,
            "Phase 4: 逆方向検証開始（見落とし検出）",
        );
        self.emit_phase_wait(Phase::Verifying);
        self.state = MachineState::Verifying;
    }

    fn finish_done(&mut self) {
        self.pending_wait = None;
        self.events
            .push(ProgressEvent::new(0, EventStatus::Done, "全フェーズ完了"));
        self.state = MachineState::Done;
    }

    fn emit_phase_wait(&mut self, phase: Phase) {
        self.emit(phase, EventStatus::Info, "トークン制限回避のため60秒待機...");
        self.pending_wait = Some(self.timings.phase_delay);
    }

    fn record_phase_error(&mut self, phase: Phase, message: &str) {
        self.results
            .errors
            .push(format!("Phase {}: {}", phase.number(), message));
        self.emit(
            phase,
            EventStatus::Error,
            format!("Phase {} エラー: {}", phase.number(), message),
        );
    }

    fn emit(&mut self, phase: Phase, status: EventStatus, message: impl Into<String>) {
        self.events
            .push(ProgressEvent::new(phase.number(), status, message));
    }
}

/// マッピング用に精読結果を並べる
fn render_extractions(extractions: &[Extraction]) -> String {
    extractions
        .iter()
        .map(Extraction::render)
        .collect::<Vec<_>>()
        .join("\n\n")
}
