//! ハイブリッドモード
//!
//! API を呼ばずにプロンプトだけを作り、利用者が任意の LLM に貼り付けて回答を持ち帰る。
//! Phase 1 は本文全体を1チャンクとして扱い、Phase 2〜4 は直前フェーズの回答を入力にする。

use serde::Serialize;

use crate::error::InputError;
use crate::models::{Phase, StoryMeta};
use crate::services::PromptBuilder;

/// 貼り付けられた回答として受け付ける最小文字数
pub const MIN_RESPONSE_CHARS: usize = 100;

const WHOLE_STORY_LABEL: &str = "全文";

/// 生成したプロンプト
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HybridPrompt {
    pub phase: u8,
    pub prompt: String,
    pub char_count: usize,
}

/// 指定フェーズのプロンプトを作る
///
/// # 引数
/// - `phase_number`: 1〜4
/// - `meta`: 評価前提
/// - `story_text`: 物語本文（Phase 1 でのみ使う）
/// - `previous_result`: 直前フェーズの回答（Phase 2〜4 で必須）
pub fn build_prompt(
    phase_number: u8,
    meta: &StoryMeta,
    story_text: &str,
    previous_result: Option<&str>,
) -> Result<HybridPrompt, InputError> {
    let phase = Phase::from_number(phase_number)?;
    let builder = PromptBuilder::new(meta);

    let prompt = match phase {
        Phase::Extracting => {
            if story_text.trim().is_empty() {
                return Err(InputError::EmptyStoryText);
            }
            builder.extraction(WHOLE_STORY_LABEL, story_text.trim(), 1, 1)
        }
        Phase::Mapping | Phase::Scoring | Phase::Verifying => {
            let previous = previous_result
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or(InputError::MissingPreviousResult {
                    phase: phase.number(),
                })?;
            match phase {
                Phase::Mapping => builder.mapping(previous),
                Phase::Scoring => builder.scoring(previous),
                _ => builder.verification(previous),
            }
        }
    };

    Ok(HybridPrompt {
        phase: phase.number(),
        char_count: prompt.chars().count(),
        prompt,
    })
}

/// 貼り付けられた回答を検査し、前後の空白を除いたものを返す
pub fn validate_pasted_response(text: &str) -> Result<&str, InputError> {
    let trimmed = text.trim();
    let len = trimmed.chars().count();
    if len < MIN_RESPONSE_CHARS {
        return Err(InputError::ResponseTooShort {
            len,
            min: MIN_RESPONSE_CHARS,
        });
    }
    Ok(trimmed)
}
