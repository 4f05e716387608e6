use chrono::{DateTime, Local};
use serde::Serialize;

use crate::models::score::CompositeScore;

/// Phase 1 の1チャンク分の精読結果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Extraction {
    pub label: String,
    pub result: String,
}

impl Extraction {
    /// マッピング用プロンプトに埋め込む形
    pub fn render(&self) -> String {
        format!("=== {} ===\n{}", self.label, self.result)
    }
}

/// 各フェーズの出力。失敗・未実行のフェーズは `None`。
#[derive(Debug, Clone, Default, Serialize)]
pub struct PhaseOutputs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extraction: Option<Vec<Extraction>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapping: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scoring: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<String>,
}

/// パイプライン全体の結果。途中で失敗しても常にこの形で返す。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResults {
    pub phases: PhaseOutputs,
    pub final_score: Option<CompositeScore>,
    pub errors: Vec<String>,
    pub started_at: DateTime<Local>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Local>>,
}

impl AnalysisResults {
    pub fn new() -> Self {
        Self {
            phases: PhaseOutputs::default(),
            final_score: None,
            errors: Vec::new(),
            started_at: Local::now(),
            finished_at: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.errors.is_empty() && self.final_score.is_some()
    }
}

impl Default for AnalysisResults {
    fn default() -> Self {
        Self::new()
    }
}
