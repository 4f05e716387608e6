//! 進捗イベント
//!
//! ストリーミング配信側がそのまま JSON 化できる形。配信そのものはこのクレートの外。

use serde::Serialize;

use crate::models::results::AnalysisResults;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Start,
    Progress,
    Info,
    Warning,
    Error,
    Complete,
    Done,
}

/// フェーズ単位の進捗通知。`phase` は 1〜4、全体終了は 0。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    pub phase: u8,
    pub status: EventStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
}

impl ProgressEvent {
    pub fn new(phase: u8, status: EventStatus, message: impl Into<String>) -> Self {
        Self {
            phase,
            status,
            message: message.into(),
            progress: None,
        }
    }

    pub fn with_progress(mut self, percent: f64) -> Self {
        self.progress = Some(percent.clamp(0.0, 100.0));
        self
    }
}

/// ストリームの封筒
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PipelineEvent {
    Progress(ProgressEvent),
    Result { results: Box<AnalysisResults> },
    Done,
    Error { message: String },
}
