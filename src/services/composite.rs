//! 合成スコアの算出
//!
//! W1 = 素点平均、W2 = Σ(素点×ESC係数) / 16.0、Final = W1×10×0.7 + W2×10×0.3。
//! 表示用の丸めは最後に一度だけ行い、計算は常に素点から始める。

use serde::Serialize;

use crate::error::InputError;
use crate::models::rubric::{ESC_COEFFICIENTS, ESC_TOTAL, ITEM_COUNT, ITEM_NAMES};
use crate::models::{CompositeScore, RawScores};
use crate::services::score_parser::{ItemMatch, ScoreParser};

const W1_WEIGHT: f64 = 0.7;
const W2_WEIGHT: f64 = 0.3;

/// 14項目の素点から合成スコアを計算する
pub fn compute_composite(scores: &RawScores) -> CompositeScore {
    let values = scores.values();

    let w1_raw = values.iter().sum::<f64>() / ITEM_COUNT as f64;

    let mut weighted_raw = [0.0; ITEM_COUNT];
    for (i, w) in weighted_raw.iter_mut().enumerate() {
        *w = values[i] * ESC_COEFFICIENTS[i];
    }
    let w2_raw = weighted_raw.iter().sum::<f64>() / ESC_TOTAL;

    let final_raw = w1_raw * 10.0 * W1_WEIGHT + w2_raw * 10.0 * W2_WEIGHT;

    CompositeScore {
        scores: *scores,
        w1_raw,
        w2_raw,
        w1: round_to(w1_raw * 10.0, 1),
        w2: round_to(w2_raw * 10.0, 1),
        final_score: round_to(final_raw, 1),
        weighted: weighted_raw.map(|w| round_to(w, 2)),
        coefficients: ESC_COEFFICIENTS,
        has_zero: scores.has_zero(),
    }
}

/// 長さ不定の入力から計算する。14個でなければ入力エラー。
pub fn compute_composite_from_slice(values: &[f64]) -> Result<CompositeScore, InputError> {
    let scores = RawScores::try_from(values)?;
    Ok(compute_composite(&scores))
}

/// f64 が表す正確な値を小数 `digits` 桁に丸める
///
/// 倍率を掛けてから丸めると 6.5×1.15 (= 7.47499…) が 7.48 になるため、
/// 正確な10進展開の桁で判断する。ちょうど中間なら絶対値の大きい側。
fn round_to(value: f64, digits: usize) -> f64 {
    if !value.is_finite() {
        return value;
    }
    // 有限の f64 の小数部は最大 1074 桁で、この精度なら丸めずに全桁が出る
    let exact = format!("{:.1100}", value.abs());
    let (int_part, frac_part) = exact.split_once('.').unwrap_or((exact.as_str(), ""));

    let mut kept: Vec<u8> = int_part
        .bytes()
        .chain(frac_part.bytes().chain(std::iter::repeat(b'0')).take(digits))
        .collect();
    let round_up = frac_part.as_bytes().get(digits).is_some_and(|d| *d >= b'5');

    if round_up {
        let mut carry = true;
        for d in kept.iter_mut().rev() {
            if *d == b'9' {
                *d = b'0';
            } else {
                *d += 1;
                carry = false;
                break;
            }
        }
        if carry {
            kept.insert(0, b'1');
        }
    }

    let int_len = kept.len() - digits;
    let mut text = String::with_capacity(kept.len() + 2);
    if value.is_sign_negative() {
        text.push('-');
    }
    text.extend(kept[..int_len].iter().map(|d| char::from(*d)));
    if digits > 0 {
        text.push('.');
        text.extend(kept[int_len..].iter().map(|d| char::from(*d)));
    }
    text.parse().unwrap_or(value)
}

/// 採点テキストの自動採点結果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreReport {
    #[serde(flatten)]
    pub composite: CompositeScore,
    pub item_names: [&'static str; ITEM_COUNT],
    pub matches: Vec<ItemMatch>,
}

/// 採点テキストを抽出から合成まで一度に処理する
pub fn score_text(parser: &ScoreParser, scoring_text: &str) -> ScoreReport {
    let matches = parser.parse_detailed(scoring_text);
    let mut values = [0.0; ITEM_COUNT];
    for (slot, m) in values.iter_mut().zip(&matches) {
        *slot = m.score;
    }
    ScoreReport {
        composite: compute_composite(&RawScores::new(values)),
        item_names: ITEM_NAMES,
        matches,
    }
}
