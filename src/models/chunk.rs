use serde::{Deserialize, Serialize};

/// プレビューに含める先頭文字数
pub const PREVIEW_CHARS: usize = 200;

/// LLM に一度に渡す物語テキストの断片
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// 「第3話〜第10話」または「パートN」
    pub label: String,
    pub text: String,
}

impl Chunk {
    pub fn new(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            text: text.into(),
        }
    }

    /// 文字数（バイト数ではない）
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    pub fn preview(&self) -> ChunkPreview {
        let head: String = self.text.chars().take(PREVIEW_CHARS).collect();
        ChunkPreview {
            label: self.label.clone(),
            char_count: self.char_count(),
            preview: head + "...",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkPreview {
    pub label: String,
    pub char_count: usize,
    pub preview: String,
}

/// 分割結果の確認用レポート
#[derive(Debug, Clone, Serialize)]
pub struct ChunkPreviewReport {
    pub count: usize,
    pub chunks: Vec<ChunkPreview>,
}

impl ChunkPreviewReport {
    pub fn from_chunks(chunks: &[Chunk]) -> Self {
        Self {
            count: chunks.len(),
            chunks: chunks.iter().map(Chunk::preview).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_truncates_by_chars() {
        let chunk = Chunk::new("パート1", "物".repeat(300));
        let preview = chunk.preview();
        assert_eq!(preview.char_count, 300);
        assert_eq!(preview.preview.chars().count(), PREVIEW_CHARS + 3);
        assert!(preview.preview.ends_with("..."));
    }

    #[test]
    fn test_report_counts_chunks() {
        let chunks = vec![Chunk::new("a", "x"), Chunk::new("b", "y")];
        let report = ChunkPreviewReport::from_chunks(&chunks);
        assert_eq!(report.count, 2);
        assert_eq!(report.chunks[1].label, "b");
        assert_eq!(report.chunks[1].preview, "y...");
    }
}
