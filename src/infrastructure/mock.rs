//! テスト用の実装
//!
//! 決まった応答を順に返す LLM と、眠らずに待機時間だけ記録する時計。

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::LlmError;
use crate::infrastructure::Clock;
use crate::services::LlmClient;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// あらかじめ積んだ応答を FIFO で返す LLM
#[derive(Default)]
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<Result<String, LlmError>>>,
    /// 応答が尽きたときに返す文章
    fallback: Option<String>,
    /// 受け取ったプロンプトの記録
    calls: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    /// 応答が尽きたら常に `text` を返す
    pub fn with_fallback(text: impl Into<String>) -> Self {
        Self {
            fallback: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn enqueue_ok(&self, text: impl Into<String>) -> &Self {
        lock(&self.responses).push_back(Ok(text.into()));
        self
    }

    pub fn enqueue_err(&self, err: LlmError) -> &Self {
        lock(&self.responses).push_back(Err(err));
        self
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    pub fn prompts(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        lock(&self.calls).push(prompt.to_string());
        if let Some(next) = lock(&self.responses).pop_front() {
            return next;
        }
        match &self.fallback {
            Some(text) => Ok(text.clone()),
            None => Err(LlmError::ApiCallFailed {
                model: self.model_name().to_string(),
                status: None,
                message: "スクリプト応答がありません".to_string(),
            }),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// 待機時間を記録するだけの時計
#[derive(Default)]
pub struct RecordingClock {
    waits: Mutex<Vec<Duration>>,
}

impl RecordingClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn waits(&self) -> Vec<Duration> {
        lock(&self.waits).clone()
    }

    pub fn total(&self) -> Duration {
        lock(&self.waits).iter().sum()
    }
}

#[async_trait]
impl Clock for RecordingClock {
    async fn sleep(&self, duration: Duration) {
        lock(&self.waits).push(duration);
    }
}
