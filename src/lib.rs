//! # SL Score
//!
//! 長編物語の構造を14項目のルーブリックで採点するための分割・抽出・合成エンジン。
//! 評価そのものは LLM が行い、このクレートは入力の分割、フェーズごとのプロンプト、
//! 回答からの点数抽出、重み付き合成スコアの計算と、4フェーズの順序制御を担う。
//!
//! ## 層構成
//!
//! ### ① モデル（Models）
//! - `models/` - チャンク、素点、合成スコア、進捗イベント、分析結果
//! - `rubric` - 14項目の名前と ESC 係数（読み取り専用の定数）
//!
//! ### ② 業務能力層（Services）
//! - `Chunker` - 話区切りでの分割（区切りが無ければ固定長）
//! - `ScoreParser` - 項目ごとに順序付きの抽出パターンを試す
//! - `compute_composite` - W1 / W2 / Final の計算
//! - `PromptBuilder` - フェーズ別プロンプト
//! - `LlmClient` - LLM 呼び出しの抽象（`OpenAiLlmService` が実装）
//!
//! ### ③ 流程層（Workflow）
//! - `PhaseMachine` - 4フェーズの状態機械（待機と呼び出しを `Step` として返す）
//! - `call_with_retry` - バックオフ付きリトライ
//! - `hybrid` - API を使わないプロンプト受け渡し
//!
//! ### ④ 編排層（Orchestration）
//! - `Pipeline` - `Step` を実行し進捗を配信する
//! - `App` - CLI サブコマンド

pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 再エクスポート
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{AnalysisRequest, AnalysisResults, Chunk, CompositeScore, RawScores};
pub use orchestrator::{App, CancelFlag, Pipeline};
pub use services::{chunk, compute_composite, parse_scores};
