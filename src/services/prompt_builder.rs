//! プロンプト生成サービス
//!
//! 各フェーズで LLM に渡す指示文を組み立てる。パイプライン（自動実行）と
//! ハイブリッド（人が任意の LLM に貼り付ける）の両方で同じ文面を使う。

use std::fmt::Write as _;

use crate::models::rubric::ITEM_NAMES;
use crate::models::StoryMeta;

/// プロンプト生成器
pub struct PromptBuilder<'a> {
    meta: &'a StoryMeta,
}

impl<'a> PromptBuilder<'a> {
    pub fn new(meta: &'a StoryMeta) -> Self {
        Self { meta }
    }

    /// Phase 1: チャンク単位の精読
    pub fn extraction(
        &self,
        chunk_label: &str,
        chunk_text: &str,
        chunk_index: usize,
        total_chunks: usize,
    ) -> String {
        let mut prompt = String::new();
        prompt.push_str("あなたは物語構造の分析者です。以下は長編物語の一部です。\n\n");
        prompt.push_str(&self.premise(true));
        let _ = write!(
            prompt,
            "\n## 対象範囲\n{}（{}/{}）\n\n\
             ## 指示\n\
             この範囲で起きた出来事を時系列で抽出し、主人公の目的・障害・選択・変化を記録してください。\n\
             構造上の転換点になりうる場面には、その理由を一行添えてください。\n\n\
             ## 本文\n{}\n",
            chunk_label, chunk_index, total_chunks, chunk_text
        );
        prompt
    }

    /// Phase 2: 精読結果を14項目の構造に対応付ける
    pub fn mapping(&self, all_extractions: &str) -> String {
        let mut prompt = String::new();
        prompt.push_str("あなたは物語構造の分析者です。以下は物語の精読結果です。\n\n");
        prompt.push_str(&self.premise(false));
        let _ = write!(
            prompt,
            "\n## 指示\n\
             精読結果を次の14項目に対応付け、各項目に該当する場面と根拠を示してください。\n\
             該当しない項目は「該当なし」と明記してください。\n\n{}\n\
             ## 精読結果\n{}\n",
            item_list(),
            all_extractions
        );
        prompt
    }

    /// Phase 3: 構造マッピングをもとに採点する
    pub fn scoring(&self, mapping_result: &str) -> String {
        let mut prompt = String::new();
        prompt.push_str("あなたは Structural Logical Score の採点者です。\n\n");
        prompt.push_str(&self.premise(false));
        let _ = write!(
            prompt,
            "\n## 指示\n\
             構造マッピングの結果にもとづき、14項目をそれぞれ 0.0〜10.0 の小数1桁で採点してください。\n\
             採点一覧は必ず次の形式で、1行に1項目ずつ出力してください。\n\n{}\n\
             各項目の根拠はその後に記述してください。\n\n\
             ## 構造マッピング\n{}\n",
            score_format(),
            mapping_result
        );
        prompt
    }

    /// Phase 4: 採点結果の見落としを逆方向から検証する
    pub fn verification(&self, scoring_result: &str) -> String {
        let mut prompt = String::new();
        prompt.push_str("あなたは採点結果の検証者です。\n\n");
        prompt.push_str(&self.premise(false));
        let _ = write!(
            prompt,
            "\n## 指示\n\
             結末から冒頭へ逆方向にたどり、主題の問いと対比軸に照らして採点の見落としや\n\
             過大・過小評価がないか検証してください。修正が必要な項目は修正後の点数を示してください。\n\n\
             ## 採点結果\n{}\n",
            scoring_result
        );
        prompt
    }

    /// 評価前提のブロック
    fn premise(&self, with_characters: bool) -> String {
        let meta = self.meta;
        let mut block = String::from("## 評価前提\n");
        let _ = writeln!(block, "- 主人公／視点主：{}", meta.protagonist);
        for (label, value) in [
            ("ジャンル", &meta.genre),
            ("主題の問い", &meta.theme),
            ("構造の対比軸", &meta.symbols),
        ] {
            if !value.trim().is_empty() {
                let _ = writeln!(block, "- {}：{}", label, value.trim());
            }
        }
        if with_characters && !meta.key_characters.trim().is_empty() {
            let _ = writeln!(block, "- 主要人物：{}", meta.key_characters.trim());
        }
        block
    }
}

fn item_list() -> String {
    ITEM_NAMES
        .iter()
        .enumerate()
        .map(|(i, name)| format!("{:02}. {}\n", i + 1, name))
        .collect()
}

fn score_format() -> String {
    ITEM_NAMES
        .iter()
        .enumerate()
        .map(|(i, name)| format!("{:02}. {}：X.X\n", i + 1, name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> StoryMeta {
        StoryMeta {
            protagonist: "ミナ".to_string(),
            genre: "ファンタジー".to_string(),
            theme: String::new(),
            symbols: "光と影".to_string(),
            key_characters: "師匠カイ".to_string(),
        }
    }

    #[test]
    fn test_premise_skips_blank_fields() {
        let meta = meta();
        let prompt = PromptBuilder::new(&meta).mapping("=== パート1 ===\n抽出");

        assert!(prompt.contains("主人公／視点主：ミナ"));
        assert!(prompt.contains("構造の対比軸：光と影"));
        assert!(!prompt.contains("主題の問い"));
        assert!(!prompt.contains("主要人物"));
        assert!(prompt.contains("=== パート1 ==="));
    }

    #[test]
    fn test_extraction_includes_position_and_characters() {
        let meta = meta();
        let prompt = PromptBuilder::new(&meta).extraction("第1話〜第8話", "本文", 2, 5);

        assert!(prompt.contains("第1話〜第8話（2/5）"));
        assert!(prompt.contains("主要人物：師匠カイ"));
        assert!(prompt.ends_with("本文\n"));
    }

    #[test]
    fn test_scoring_prompt_lists_parseable_format() {
        let meta = meta();
        let prompt = PromptBuilder::new(&meta).scoring("マッピング");

        assert!(prompt.contains("01. オープニングイメージ：X.X"));
        assert!(prompt.contains("14. 結末：X.X"));
    }
}
