//! 採点テキストからのスコア抽出
//!
//! LLM の自由記述から14項目の点数を拾う。各項目について3種類のパターンを優先順に試し、
//! 最初に一致したものを採用する。どれにも一致しなければ 0 点。
//!
//! パターンは本文全体に対して項目ごとに独立に当てるため、項目名が別の箇所で繰り返されると
//! 無関係な数値を拾うことがある。自動検出した点数は手動確認が前提。

use regex::Regex;
use serde::Serialize;

use crate::models::rubric::{ITEM_COUNT, ITEM_NAMES};
use crate::models::RawScores;

/// 抽出パターンの種類（優先順）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ExtractorKind {
    /// `01. 項目名：8.5`
    NumberedLine,
    /// `| 01 | 項目名 | 8.5 |`
    TableRow,
    /// 項目名の後ろに最初に現れる小数
    Loose,
}

/// 1つの抽出戦略。本文を受け取り、数値が取れれば返す。
#[derive(Debug, Clone)]
pub struct Extractor {
    kind: ExtractorKind,
    pattern: Regex,
}

impl Extractor {
    fn numbered_line(number: usize, name: &str) -> Result<Self, regex::Error> {
        let pattern = format!(
            r"(?i)0?{}[.．]\s*{}[：:]\s*([0-9]+\.?[0-9]*)",
            number,
            regex::escape(name)
        );
        Ok(Self {
            kind: ExtractorKind::NumberedLine,
            pattern: Regex::new(&pattern)?,
        })
    }

    fn table_row(number: usize) -> Result<Self, regex::Error> {
        let pattern = format!(r"\|\s*0?{}\s*\|[^|]*\|\s*([0-9]+\.?[0-9]*)\s*\|", number);
        Ok(Self {
            kind: ExtractorKind::TableRow,
            pattern: Regex::new(&pattern)?,
        })
    }

    fn loose(name: &str) -> Result<Self, regex::Error> {
        let pattern = format!(r"{}[^0-9]*([0-9]+\.[0-9])", regex::escape(name));
        Ok(Self {
            kind: ExtractorKind::Loose,
            pattern: Regex::new(&pattern)?,
        })
    }

    pub fn kind(&self) -> ExtractorKind {
        self.kind
    }

    /// 最初の一致の数値を返す
    pub fn extract(&self, text: &str) -> Option<f64> {
        self.pattern
            .captures(text)?
            .get(1)
            .and_then(|m| m.as_str().parse::<f64>().ok())
    }
}

/// 1項目分の抽出戦略の並び
#[derive(Debug, Clone)]
pub struct ItemExtractors {
    name: &'static str,
    strategies: Vec<Extractor>,
}

impl ItemExtractors {
    fn for_item(index: usize, name: &'static str) -> Result<Self, regex::Error> {
        let number = index + 1;
        Ok(Self {
            name,
            strategies: vec![
                Extractor::numbered_line(number, name)?,
                Extractor::table_row(number)?,
                Extractor::loose(name)?,
            ],
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 戦略を順に試し、最初に成功したものを返す
    pub fn extract(&self, text: &str) -> Option<(f64, ExtractorKind)> {
        self.strategies
            .iter()
            .find_map(|s| s.extract(text).map(|value| (value, s.kind())))
    }
}

/// 1項目の抽出結果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemMatch {
    pub name: &'static str,
    pub score: f64,
    /// どのパターンで取れたか。`None` は未検出（score は 0）。
    pub matched_by: Option<ExtractorKind>,
}

/// スコア抽出器
///
/// 項目名表から全パターンを生成時に決定的に組み立てる。
#[derive(Debug, Clone)]
pub struct ScoreParser {
    items: Vec<ItemExtractors>,
}

impl ScoreParser {
    pub fn new() -> Result<Self, regex::Error> {
        let items = ITEM_NAMES
            .iter()
            .enumerate()
            .map(|(i, name)| ItemExtractors::for_item(i, name))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { items })
    }

    /// 14項目の素点を抽出する。失敗しない。
    pub fn parse(&self, scoring_text: &str) -> RawScores {
        let mut values = [0.0; ITEM_COUNT];
        for (slot, item) in values.iter_mut().zip(&self.items) {
            *slot = item.extract(scoring_text).map(|(v, _)| v).unwrap_or(0.0);
        }
        RawScores::new(values)
    }

    /// 項目ごとにどのパターンで取れたかを含めて返す
    pub fn parse_detailed(&self, scoring_text: &str) -> Vec<ItemMatch> {
        self.items
            .iter()
            .map(|item| match item.extract(scoring_text) {
                Some((score, kind)) => ItemMatch {
                    name: item.name(),
                    score,
                    matched_by: Some(kind),
                },
                None => ItemMatch {
                    name: item.name(),
                    score: 0.0,
                    matched_by: None,
                },
            })
            .collect()
    }
}

/// 素点を抽出する（単発呼び出し用）
pub fn parse_scores(scoring_text: &str) -> RawScores {
    match ScoreParser::new() {
        Ok(parser) => parser.parse(scoring_text),
        Err(e) => {
            tracing::warn!("抽出パターンを構築できません: {}", e);
            RawScores::zeros()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPECTED: [f64; ITEM_COUNT] = [
        8.5, 7.0, 9.0, 6.5, 7.5, 8.0, 7.0, 9.5, 8.0, 9.0, 7.5, 8.5, 9.5, 8.0,
    ];

    fn numbered_report(skip: Option<usize>) -> String {
        ITEM_NAMES
            .iter()
            .zip(EXPECTED)
            .enumerate()
            .filter(|(i, _)| Some(*i) != skip)
            .map(|(i, (name, score))| format!("{:02}. {}：{:.1}\n", i + 1, name, score))
            .collect()
    }

    #[test]
    fn test_numbered_lines_recover_exact_vector() {
        let parser = ScoreParser::new().unwrap();
        let scores = parser.parse(&numbered_report(None));

        assert_eq!(scores.values(), &EXPECTED);
        assert!(!scores.has_zero());
    }

    #[test]
    fn test_missing_item_becomes_zero() {
        let scores = parse_scores(&numbered_report(Some(4)));

        assert_eq!(scores.get(4), Some(0.0));
        assert!(scores.has_zero());
        assert_eq!(scores.get(5), Some(8.0));
    }

    #[test]
    fn test_empty_text_yields_fourteen_zeros() {
        let scores = parse_scores("");
        assert_eq!(scores.values(), &[0.0; ITEM_COUNT]);
    }

    #[test]
    fn test_numbered_line_variants() {
        let parser = ScoreParser::new().unwrap();
        let text = "1．オープニングイメージ: 8\n8.ミッドポイント：  9.25";
        let matches = parser.parse_detailed(text);

        assert_eq!(matches[0].score, 8.0);
        assert_eq!(matches[0].matched_by, Some(ExtractorKind::NumberedLine));
        assert_eq!(matches[7].score, 9.25);
    }

    #[test]
    fn test_table_rows() {
        let text = "| No. | 項目 | 点数 |\n|-----|------|------|\n| 01 | オープニング | 8.5 |\n| 10 | 喪失 | 6 |\n";
        let parser = ScoreParser::new().unwrap();
        let matches = parser.parse_detailed(text);

        assert_eq!(matches[0].score, 8.5);
        assert_eq!(matches[0].matched_by, Some(ExtractorKind::TableRow));
        assert_eq!(matches[9].score, 6.0);
        assert_eq!(matches[1].matched_by, None);
    }

    #[test]
    fn test_loose_form_requires_fraction() {
        let parser = ScoreParser::new().unwrap();
        let text = "クライマックスは圧巻で評価は 9.5 点。結末は 8 点。";
        let matches = parser.parse_detailed(text);

        assert_eq!(matches[12].score, 9.5);
        assert_eq!(matches[12].matched_by, Some(ExtractorKind::Loose));
        // 結末の後ろに小数が無い
        assert_eq!(matches[13].matched_by, None);
    }

    #[test]
    fn test_numbered_line_wins_over_loose() {
        let parser = ScoreParser::new().unwrap();
        let text = "ミッドポイントの評価 6.5 は暫定。\n08. ミッドポイント：9.0";
        let scores = parser.parse(text);

        assert_eq!(scores.get(7), Some(9.0));
    }

    #[test]
    fn test_loose_form_takes_first_occurrence() {
        let parser = ScoreParser::new().unwrap();
        let text = "サブプロットについて 5.5 と書いた後、サブプロットを 7.5 に修正";
        assert_eq!(parser.parse(text).get(4), Some(5.5));
    }

    #[test]
    fn test_name_punctuation_is_literal() {
        let parser = ScoreParser::new().unwrap();
        // 「・」を含む項目名
        let text = "03. インサイティング・インシデント：7.5";
        assert_eq!(parser.parse(text).get(2), Some(7.5));
    }
}
