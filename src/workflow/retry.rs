//! LLM 呼び出しのリトライ
//!
//! 失敗（空応答を含む）したら待って再試行する。待機時間は
//! レート制限なら 30秒×試行回数、それ以外は 5秒×試行回数。

use std::time::Duration;

use tracing::warn;

use crate::config::Config;
use crate::error::LlmError;
use crate::infrastructure::Clock;
use crate::services::LlmClient;

/// リトライ方針
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 初回に加えて行う試行回数
    pub max_retries: u32,
    pub rate_limit_backoff: Duration,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            rate_limit_backoff: Duration::from_secs(30),
            backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_retries: config.max_retries,
            rate_limit_backoff: Duration::from_secs(config.rate_limit_backoff_secs),
            backoff: Duration::from_secs(config.retry_backoff_secs),
        }
    }

    /// `attempt` 回目（1始まり）の失敗の後に待つ時間
    pub fn wait_for(&self, err: &LlmError, attempt: u32) -> Duration {
        let base = if err.is_rate_limited() {
            self.rate_limit_backoff
        } else {
            self.backoff
        };
        base * attempt
    }
}

/// リトライ付きで LLM を呼ぶ
///
/// # 引数
/// * `is_cancelled` - 失敗のたびに確認する。真なら待機も再試行もせずに打ち切る。
///
/// # 戻り値
/// 空でない応答。全試行が失敗したか中断されたら最後のエラー。
pub async fn call_with_retry(
    client: &dyn LlmClient,
    clock: &dyn Clock,
    policy: &RetryPolicy,
    prompt: &str,
    is_cancelled: impl Fn() -> bool,
) -> Result<String, LlmError> {
    let total_attempts = policy.max_retries + 1;
    let mut attempt = 1;

    loop {
        let result = client.complete(prompt).await.and_then(|text| {
            if text.trim().is_empty() {
                Err(LlmError::EmptyResponse {
                    model: client.model_name().to_string(),
                })
            } else {
                Ok(text)
            }
        });

        let err = match result {
            Ok(text) => return Ok(text),
            Err(err) if attempt >= total_attempts => return Err(err),
            Err(err) => err,
        };

        if is_cancelled() {
            warn!("中断要求のためリトライしません ({}/{}): {}", attempt, total_attempts, err);
            return Err(err);
        }

        let wait = policy.wait_for(&err, attempt);
        warn!(
            "LLM API呼出失敗 ({}/{}): {}",
            attempt, total_attempts, err
        );
        warn!("{}秒後にリトライ...", wait.as_secs());
        clock.sleep(wait).await;
        if is_cancelled() {
            return Err(err);
        }
        attempt += 1;
    }
}
