use serde::{Deserialize, Serialize};

use crate::error::InputError;

/// 評価前提（プロンプトに埋め込む物語のメタ情報）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoryMeta {
    /// 主人公／視点主
    pub protagonist: String,
    #[serde(default)]
    pub genre: String,
    /// 主題の問い
    #[serde(default)]
    pub theme: String,
    /// 構造の対比軸
    #[serde(default)]
    pub symbols: String,
    #[serde(default)]
    pub key_characters: String,
}

/// 1回の分析依頼
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    #[serde(flatten)]
    pub meta: StoryMeta,

    #[serde(default)]
    pub story_text: String,

    /// 物語本文を別ファイルから読む場合のパス（TOML ファイルからの相対パス）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story_file: Option<String>,

    /// Phase 4（逆方向検証）を省略する
    #[serde(default)]
    pub skip_verification: bool,

    /// 設定のモデル名を上書きする
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl AnalysisRequest {
    /// 分析を始められる状態か検査する
    pub fn validate(&self) -> Result<(), InputError> {
        if self.story_text.trim().is_empty() {
            return Err(InputError::EmptyStoryText);
        }
        if self.meta.protagonist.trim().is_empty() {
            return Err(InputError::MissingProtagonist);
        }
        Ok(())
    }
}
