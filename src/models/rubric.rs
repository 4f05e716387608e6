//! 採点ルーブリック定数
//!
//! 14項目の名称と ESC 係数。順序は固定で、スコアベクトルの添字と一対一に対応する。

use phf::phf_map;
use serde::Serialize;

/// ルーブリックの項目数
pub const ITEM_COUNT: usize = 14;

/// 項目名（採点順）
pub const ITEM_NAMES: [&str; ITEM_COUNT] = [
    "オープニングイメージ",
    "セットアップ",
    "インサイティング・インシデント",
    "ターニングポイント1",
    "サブプロット",
    "お楽しみ要素",
    "ピンチポイント1",
    "ミッドポイント",
    "ピンチポイント2",
    "すべてを失う",
    "再起のきっかけ",
    "ターニングポイント2",
    "クライマックス",
    "結末",
];

/// ESC 係数（項目順）
pub const ESC_COEFFICIENTS: [f64; ITEM_COUNT] = [
    0.60, 0.60, 1.25, 1.25, 0.80, 0.80, 1.15, 1.35, 1.25, 1.60, 1.25, 1.50, 1.60, 1.00,
];

/// W2 の正規化定数。係数表から導出せず、固定値として扱う。
pub const ESC_TOTAL: f64 = 16.0;

static ITEM_INDEX: phf::Map<&'static str, usize> = phf_map! {
    "オープニングイメージ" => 0,
    "セットアップ" => 1,
    "インサイティング・インシデント" => 2,
    "ターニングポイント1" => 3,
    "サブプロット" => 4,
    "お楽しみ要素" => 5,
    "ピンチポイント1" => 6,
    "ミッドポイント" => 7,
    "ピンチポイント2" => 8,
    "すべてを失う" => 9,
    "再起のきっかけ" => 10,
    "ターニングポイント2" => 11,
    "クライマックス" => 12,
    "結末" => 13,
};

/// 項目名から 0 始まりの添字を引く（完全一致）
pub fn item_index(name: &str) -> Option<usize> {
    ITEM_INDEX.get(name.trim()).copied()
}

/// 外部（UI・レポート）向けのルーブリック情報
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RubricMeta {
    pub item_names: Vec<&'static str>,
    pub esc_coefficients: Vec<f64>,
}

impl RubricMeta {
    pub fn current() -> Self {
        Self {
            item_names: ITEM_NAMES.to_vec(),
            esc_coefficients: ESC_COEFFICIENTS.to_vec(),
        }
    }
}
