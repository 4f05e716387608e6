//! LLM サービス - 業務能力層
//!
//! 「プロンプトを渡して文章を受け取る」能力だけを提供する。リトライや待機は流程層の責務。
//!
//! ## 技術スタック
//! - `async-openai` で OpenAI 互換 API（既定は Groq）を呼ぶ
//! - エンドポイントとモデルは設定で差し替え可能

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::LlmError;

/// LLM 呼び出しの抽象
///
/// テストではスクリプト化した実装に差し替える。
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 1回分の補完。空文字が返る場合もある（空判定は呼び出し側）。
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;

    /// ログ表示用のモデル名
    fn model_name(&self) -> &str;
}

/// OpenAI 互換 API を呼ぶ LLM サービス
pub struct OpenAiLlmService {
    client: Client<OpenAIConfig>,
    model_name: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiLlmService {
    /// 設定から生成する。API キーは明示的に渡されたものだけを使う。
    pub fn new(config: &Config, api_key: &str) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: config.llm_model_name.clone(),
            max_tokens: config.llm_max_tokens,
            temperature: config.llm_temperature,
        }
    }

    /// モデル名を上書きする
    pub fn with_model(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = model_name.into();
        self
    }

    fn request_error(err: impl std::fmt::Display) -> LlmError {
        LlmError::InvalidRequest(err.to_string())
    }
}

#[async_trait]
impl LlmClient for OpenAiLlmService {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        debug!("LLM API 呼出、モデル: {}", self.model_name);
        debug!("プロンプト長: {} 文字", prompt.chars().count());

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()
            .map_err(Self::request_error)?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(vec![ChatCompletionRequestMessage::User(user_msg)])
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .build()
            .map_err(Self::request_error)?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 呼出失敗: {}", e);
            api_call_failed(&self.model_name, &e)
        })?;

        debug!("LLM API 呼出成功");

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .unwrap_or_default();

        Ok(content.trim().to_string())
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// async-openai のエラーを `LlmError` に変換する
///
/// HTTP ステータスが取れるのは通信層（reqwest）のエラーだけ。API が返すエラー本文には
/// ステータスが含まれないため、レート制限はメッセージ（`rate_limit_exceeded` など）で判定される。
fn api_call_failed(model: &str, err: &OpenAIError) -> LlmError {
    let status = match err {
        OpenAIError::Reqwest(e) => e.status().map(|s| s.as_u16()),
        _ => None,
    };
    LlmError::ApiCallFailed {
        model: model.to_string(),
        status,
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_openai::error::ApiError;

    fn create_test_service() -> OpenAiLlmService {
        let config = Config {
            llm_api_base_url: "http://127.0.0.1:9/v1".to_string(),
            ..Config::default()
        };
        OpenAiLlmService::new(&config, "test-key")
    }

    #[test]
    fn test_model_override() {
        let service = create_test_service().with_model("llama-3.1-8b-instant");
        assert_eq!(service.model_name(), "llama-3.1-8b-instant");
        assert_eq!(service.max_tokens, 8000);
    }

    #[test]
    fn test_rate_limit_body_is_detected_from_message() {
        let err = OpenAIError::ApiError(ApiError {
            message: "Rate limit reached for model `llama-3.3-70b-versatile`".to_string(),
            r#type: Some("tokens".to_string()),
            param: None,
            code: Some("rate_limit_exceeded".to_string()),
        });

        let mapped = api_call_failed("llama-3.3-70b-versatile", &err);

        assert!(matches!(
            mapped,
            LlmError::ApiCallFailed { status: None, .. }
        ));
        assert!(mapped.is_rate_limited());
    }

    #[test]
    fn test_invalid_argument_is_not_rate_limited() {
        let err = OpenAIError::InvalidArgument("messages is empty".to_string());
        let mapped = api_call_failed("scripted", &err);
        assert!(!mapped.is_rate_limited());
    }

    /// 実 API への疎通確認
    ///
    /// ```bash
    /// GROQ_API_KEY=... cargo test test_complete_live -- --ignored --nocapture
    /// ```
    #[tokio::test]
    #[ignore]
    async fn test_complete_live() {
        let _ = tracing_subscriber::fmt::try_init();

        let config = Config::from_env();
        let key = config.require_api_key().unwrap().to_string();
        let service = OpenAiLlmService::new(&config, &key);

        let response = service
            .complete("「起承転結」を一文で説明してください。")
            .await
            .unwrap();
        println!("{}", response);
        assert!(!response.is_empty());
    }
}
