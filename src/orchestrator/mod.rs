//! 編排層
//!
//! ```text
//! app (CLI サブコマンド)
//!     ↓
//! pipeline (Step の実行、待機・呼び出し・進捗配信)
//!     ↓
//! workflow::PhaseMachine (4フェーズの遷移)
//!     ↓
//! services (分割 / 抽出 / 合成 / プロンプト / LLM)
//! ```

pub mod app;
pub mod pipeline;

pub use app::{App, Command};
pub use pipeline::{CancelFlag, CollectingSink, LogSink, Pipeline, ProgressSink};
