use std::time::Duration;

use crate::error::ConfigError;

/// プログラム設定
#[derive(Clone, Debug)]
pub struct Config {
    // --- LLM 設定 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    pub llm_max_tokens: u32,
    pub llm_temperature: f32,
    // --- 分割 ---
    /// 1チャンクにまとめる話数
    pub chunk_group_size: usize,
    // --- 待機・リトライ ---
    /// Phase 1 のチャンク間の待機秒数
    pub chunk_delay_secs: u64,
    /// フェーズ間の待機秒数
    pub phase_delay_secs: u64,
    /// 初回以降の追加試行回数
    pub max_retries: u32,
    pub rate_limit_backoff_secs: u64,
    pub retry_backoff_secs: u64,
    // --- 出力 ---
    /// 詳細ログを出すか
    pub verbose_logging: bool,
    /// 分析結果（JSON）の保存先
    pub output_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.groq.com/openai/v1".to_string(),
            llm_model_name: "llama-3.3-70b-versatile".to_string(),
            llm_max_tokens: 8000,
            llm_temperature: 0.3,
            chunk_group_size: 8,
            chunk_delay_secs: 5,
            phase_delay_secs: 60,
            max_retries: 3,
            rate_limit_backoff_secs: 30,
            retry_backoff_secs: 5,
            verbose_logging: false,
            output_file: "slscore_result.json".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            llm_api_key: std::env::var("GROQ_API_KEY")
                .or_else(|_| std::env::var("LLM_API_KEY"))
                .unwrap_or(default.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(default.llm_model_name),
            llm_max_tokens: parse_env("LLM_MAX_TOKENS").unwrap_or(default.llm_max_tokens),
            llm_temperature: parse_env("LLM_TEMPERATURE").unwrap_or(default.llm_temperature),
            chunk_group_size: parse_env("CHUNK_GROUP_SIZE").unwrap_or(default.chunk_group_size),
            chunk_delay_secs: parse_env("CHUNK_DELAY_SECS").unwrap_or(default.chunk_delay_secs),
            phase_delay_secs: parse_env("PHASE_DELAY_SECS").unwrap_or(default.phase_delay_secs),
            max_retries: parse_env("MAX_RETRIES").unwrap_or(default.max_retries),
            rate_limit_backoff_secs: parse_env("RATE_LIMIT_BACKOFF_SECS")
                .unwrap_or(default.rate_limit_backoff_secs),
            retry_backoff_secs: parse_env("RETRY_BACKOFF_SECS").unwrap_or(default.retry_backoff_secs),
            verbose_logging: parse_env("VERBOSE_LOGGING").unwrap_or(default.verbose_logging),
            output_file: std::env::var("OUTPUT_FILE").unwrap_or(default.output_file),
        }
    }

    /// LLM を呼ぶ処理の前提条件
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        if self.llm_api_key.trim().is_empty() {
            return Err(ConfigError::EnvVarNotFound {
                var_name: "GROQ_API_KEY".to_string(),
            });
        }
        Ok(&self.llm_api_key)
    }

    pub fn chunk_delay(&self) -> Duration {
        Duration::from_secs(self.chunk_delay_secs)
    }

    pub fn phase_delay(&self) -> Duration {
        Duration::from_secs(self.phase_delay_secs)
    }

    /// ログ表示用に API キーの先頭だけを残す
    pub fn api_key_prefix(&self) -> Option<String> {
        if self.llm_api_key.is_empty() {
            return None;
        }
        Some(self.llm_api_key.chars().take(10).collect::<String>() + "...")
    }
}

/// 環境変数を型変換して読む。解釈できない値は警告して既定値に任せる。
fn parse_env<T: std::str::FromStr>(var_name: &str) -> Option<T> {
    let value = std::env::var(var_name).ok()?;
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!(
                "{}",
                ConfigError::EnvVarParseFailed {
                    var_name: var_name.to_string(),
                    value,
                    expected_type: std::any::type_name::<T>().to_string(),
                }
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_rate_limits() {
        let config = Config::default();
        assert_eq!(config.chunk_group_size, 8);
        assert_eq!(config.chunk_delay(), Duration::from_secs(5));
        assert_eq!(config.phase_delay(), Duration::from_secs(60));
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn test_require_api_key() {
        let mut config = Config::default();
        assert!(matches!(
            config.require_api_key(),
            Err(ConfigError::EnvVarNotFound { .. })
        ));
        config.llm_api_key = "gsk_abcdefghijklmnop".to_string();
        assert_eq!(config.require_api_key().unwrap(), "gsk_abcdefghijklmnop");
        assert_eq!(config.api_key_prefix().unwrap(), "gsk_abcdef...");
    }
}
