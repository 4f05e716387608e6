//! テキスト分割サービス
//!
//! 物語本文を話区切り（「タブN」「＜第N話＞」「スピンオフ」）で分け、
//! 数話ずつまとめて LLM 1回分の入力にする。区切りが見つからない場合は固定長で切る。

use regex::Regex;

use crate::models::Chunk;

/// 区切りが無いときの1チャンクの最大文字数
pub const FALLBACK_CHUNK_CHARS: usize = 15_000;

/// 1チャンクにまとめる話数の既定値
pub const DEFAULT_GROUP_SIZE: usize = 8;

const BOUNDARY_PATTERN: &str = r"タブ\s*[0-9]+|＜第[0-9]+話＞|スピンオフ";
const EPISODE_PATTERN: &str = r"第([0-9]+)話|タブ\s*([0-9]+)|スピンオフ";
const SPIN_OFF_SENTINEL: &str = "SP";

/// 分割器
///
/// パターンは生成時に一度だけコンパイルする。状態は持たないので共有して使える。
#[derive(Debug, Clone)]
pub struct Chunker {
    boundary: Regex,
    episode: Regex,
}

impl Chunker {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            boundary: Regex::new(BOUNDARY_PATTERN)?,
            episode: Regex::new(EPISODE_PATTERN)?,
        })
    }

    /// 本文をチャンク列に分割する
    ///
    /// # 引数
    /// - `text`: 物語本文
    /// - `group_size`: 1チャンクにまとめる話数（0 は 1 として扱う）
    ///
    /// # 戻り値
    /// 元の順序を保ったチャンク列。空の本文なら空の列。
    pub fn chunk(&self, text: &str, group_size: usize) -> Vec<Chunk> {
        let segments = self.split_segments(text);

        if segments.len() <= 1 {
            return split_fixed(text.trim(), FALLBACK_CHUNK_CHARS);
        }

        segments
            .chunks(group_size.max(1))
            .enumerate()
            .map(|(i, group)| {
                let label = self
                    .group_label(group)
                    .unwrap_or_else(|| format!("パート{}", i + 1));
                Chunk::new(label, group.join("\n"))
            })
            .collect()
    }

    /// 区切りの直前で切り、空白だけの断片を捨てる。区切り文字列は後ろの断片に残る。
    fn split_segments<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let mut segments = Vec::new();
        let mut prev = 0;
        let starts = self
            .boundary
            .find_iter(text)
            .map(|m| m.start())
            .filter(|&start| start > 0);

        for start in starts.chain(std::iter::once(text.len())) {
            segments.push(text[prev..start].trim());
            prev = start;
        }

        segments.retain(|s| !s.is_empty());
        segments
    }

    /// 先頭と末尾の断片の両方から話番号が取れたときだけ「第A話〜第B話」を返す
    fn group_label(&self, group: &[&str]) -> Option<String> {
        let first = self.episode_number(group.first()?)?;
        let last = self.episode_number(group.last()?)?;
        Some(format!("第{}話〜第{}話", first, last))
    }

    fn episode_number<'a>(&self, segment: &'a str) -> Option<&'a str> {
        let caps = self.episode.captures(segment)?;
        Some(
            caps.get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or(SPIN_OFF_SENTINEL),
        )
    }
}

/// 本文を分割する（単発呼び出し用）
pub fn chunk(text: &str, group_size: usize) -> Vec<Chunk> {
    match Chunker::new() {
        Ok(chunker) => chunker.chunk(text, group_size),
        Err(e) => {
            tracing::warn!("区切りパターンを構築できません、固定長で分割します: {}", e);
            split_fixed(text.trim(), FALLBACK_CHUNK_CHARS)
        }
    }
}

/// 文字数単位で固定長に切る
fn split_fixed(text: &str, size: usize) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let end = rest
            .char_indices()
            .nth(size)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let (head, tail) = rest.split_at(end);
        chunks.push(Chunk::new(format!("パート{}", chunks.len() + 1), head));
        rest = tail;
    }

    chunks
}
