//! スコア関連の型
//!
//! `RawScores` は常に14要素。`0` は正当な得点であると同時に「抽出失敗」の代替値でもあり、
//! 両者は区別しない。

use serde::{Deserialize, Serialize};

use crate::error::InputError;
use crate::models::rubric::{item_index, ITEM_COUNT};

/// 14項目の素点（0〜10）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawScores([f64; ITEM_COUNT]);

impl RawScores {
    pub fn new(values: [f64; ITEM_COUNT]) -> Self {
        Self(values)
    }

    pub fn zeros() -> Self {
        Self([0.0; ITEM_COUNT])
    }

    pub fn values(&self) -> &[f64; ITEM_COUNT] {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.0.get(index).copied()
    }

    /// いずれかの項目がちょうど 0 か（自動抽出の信頼度が低い目印）
    pub fn has_zero(&self) -> bool {
        self.0.iter().any(|s| *s == 0.0)
    }

    /// 項目名で素点を上書きする（手動修正）
    pub fn set_by_name(&mut self, name: &str, value: f64) -> Result<(), InputError> {
        let index = item_index(name).ok_or_else(|| InputError::UnknownItem {
            name: name.to_string(),
        })?;
        self.0[index] = value;
        Ok(())
    }

    /// `"ミッドポイント=8.5"` 形式の上書き指定を適用する
    pub fn apply_override(&mut self, assignment: &str) -> Result<(), InputError> {
        let (name, raw) = assignment.split_once(['=', '＝']).ok_or_else(|| {
            InputError::InvalidScoreValue {
                raw: assignment.to_string(),
            }
        })?;
        let value = parse_score_value(raw)?;
        self.set_by_name(name, value)
    }
}

impl TryFrom<&[f64]> for RawScores {
    type Error = InputError;

    fn try_from(values: &[f64]) -> Result<Self, Self::Error> {
        let array: [f64; ITEM_COUNT] =
            values
                .try_into()
                .map_err(|_| InputError::WrongScoreCount {
                    expected: ITEM_COUNT,
                    actual: values.len(),
                })?;
        Ok(Self(array))
    }
}

impl Default for RawScores {
    fn default() -> Self {
        Self::zeros()
    }
}

/// カンマ区切りの14個の数値を読む（手動入力・再計算用）
pub fn parse_score_list(input: &str) -> Result<RawScores, InputError> {
    let values = input
        .split([',', '、', ' ', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_score_value)
        .collect::<Result<Vec<f64>, _>>()?;
    RawScores::try_from(values.as_slice())
}

fn parse_score_value(raw: &str) -> Result<f64, InputError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| InputError::InvalidScoreValue {
            raw: raw.to_string(),
        })
}

/// 合成スコア
///
/// `w1` / `w2` / `final_score` / `weighted` は表示用に丸めた値。
/// 丸め前の値は `w1_raw` / `w2_raw` に残し、再計算は常に `scores` から行う。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeScore {
    pub scores: RawScores,
    /// 素点の平均（0〜10、丸めなし）
    pub w1_raw: f64,
    /// 係数加重合計 / 16.0（0〜10 相当、丸めなし）
    pub w2_raw: f64,
    /// 構成点 W1（0〜100、小数1桁）
    pub w1: f64,
    /// ESCスコア W2（0〜100、小数1桁）
    pub w2: f64,
    /// 補正ESCスコア（0〜100、小数1桁）
    #[serde(rename = "final")]
    pub final_score: f64,
    /// 項目ごとの加重点（小数2桁）
    pub weighted: [f64; ITEM_COUNT],
    pub coefficients: [f64; ITEM_COUNT],
    pub has_zero: bool,
}

/// 表示上の評価帯
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreBand {
    High,
    Mid,
    Low,
}

impl ScoreBand {
    /// 項目素点（0〜10）の評価帯
    pub fn of_item(score: f64) -> Self {
        if score >= 8.5 {
            ScoreBand::High
        } else if score >= 7.0 {
            ScoreBand::Mid
        } else {
            ScoreBand::Low
        }
    }

    /// 最終スコア（0〜100）の評価帯
    pub fn of_final(score: f64) -> Self {
        if score >= 85.0 {
            ScoreBand::High
        } else if score >= 70.0 {
            ScoreBand::Mid
        } else {
            ScoreBand::Low
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            ScoreBand::High => "◎",
            ScoreBand::Mid => "○",
            ScoreBand::Low => "△",
        }
    }
}
