use thiserror::Error;

/// アプリケーションのエラー型
#[derive(Debug, Error)]
pub enum AppError {
    /// 設定エラー
    #[error("設定エラー: {0}")]
    Config(#[from] ConfigError),
    /// 入力データの形が不正
    #[error("入力エラー: {0}")]
    Input(#[from] InputError),
    /// LLM 呼び出しエラー
    #[error("LLMエラー: {0}")]
    Llm(#[from] LlmError),
    /// ファイル操作エラー
    #[error("ファイルエラー: {0}")]
    File(#[from] FileError),
    /// その他（サードパーティのエラーを包む）
    #[error("エラー: {0}")]
    Other(String),
}

/// 設定エラー
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// 環境変数が存在しない
    #[error("環境変数 {var_name} が設定されていません")]
    EnvVarNotFound { var_name: String },
    /// 環境変数の値を解釈できない
    #[error("環境変数 {var_name} の値 '{value}' を {expected_type} として解釈できません")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
}

/// 入力エラー
///
/// スコアの抽出漏れはここに含めない（0 点として扱う）。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("テキストが空です")]
    EmptyStoryText,
    #[error("主人公名が必要です")]
    MissingProtagonist,
    #[error("スコアは {expected} 個必要ですが {actual} 個でした")]
    WrongScoreCount { expected: usize, actual: usize },
    #[error("スコアの値を解釈できません: '{raw}'")]
    InvalidScoreValue { raw: String },
    #[error("ルーブリックに存在しない項目です: {name}")]
    UnknownItem { name: String },
    #[error("回答が短すぎます（{len} 文字、{min} 文字以上必要）。AIの出力全文を貼り付けてください")]
    ResponseTooShort { len: usize, min: usize },
    #[error("フェーズ番号は 1〜4 です: {0}")]
    InvalidPhase(u8),
    #[error("Phase {phase} のプロンプトには前フェーズの回答が必要です")]
    MissingPreviousResult { phase: u8 },
}

/// LLM 呼び出しエラー
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// API 呼び出し失敗
    #[error("LLM API呼出失敗 (モデル: {model}): {message}")]
    ApiCallFailed {
        model: String,
        /// 通信層で取れた HTTP ステータス。API のエラー本文からは取れない。
        status: Option<u16>,
        message: String,
    },
    /// 空のレスポンス
    #[error("空のレスポンスが返されました (モデル: {model})")]
    EmptyResponse { model: String },
    /// リクエストを組み立てられない
    #[error("LLMリクエストの構築に失敗しました: {0}")]
    InvalidRequest(String),
}

impl LlmError {
    /// レート制限による失敗か（HTTP 429 またはメッセージ中の目印）
    pub fn is_rate_limited(&self) -> bool {
        match self {
            LlmError::ApiCallFailed {
                status, message, ..
            } => {
                if *status == Some(429) {
                    return true;
                }
                let lower = message.to_lowercase();
                lower.contains("429") || lower.contains("rate_limit") || lower.contains("rate limit")
            }
            _ => false,
        }
    }
}

/// ファイル操作エラー
#[derive(Debug, Error)]
pub enum FileError {
    #[error("ファイルの読み込みに失敗しました ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("ファイルの書き込みに失敗しました ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Other(format!("JSON変換に失敗しました: {}", err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: String::new(),
            source: err,
        })
    }
}

/// アプリケーションの結果型
pub type AppResult<T> = Result<T, AppError>;
