use crate::models::request::AnalysisRequest;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// TOML ファイルから分析依頼を読み込む
///
/// `story_file` が指定されていれば TOML ファイルのディレクトリからの相対パスとして読み、
/// `story_text` を置き換える。
pub async fn load_analysis_request(toml_file_path: &Path) -> Result<AnalysisRequest> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("TOMLファイルを読み込めません: {}", toml_file_path.display()))?;

    let mut request: AnalysisRequest = toml::from_str(&content)
        .with_context(|| format!("TOMLファイルを解析できません: {}", toml_file_path.display()))?;

    if let Some(story_file) = request.story_file.as_deref() {
        let story_path = resolve_relative(toml_file_path, story_file);
        request.story_text = load_story_text(&story_path).await?;
    }

    tracing::info!(
        "分析依頼を読み込みました: 主人公 {} / 本文 {} 文字",
        request.meta.protagonist,
        request.story_text.chars().count()
    );

    Ok(request)
}

/// 物語本文（プレーンテキスト）を読み込む
pub async fn load_story_text(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .await
        .with_context(|| format!("本文ファイルを読み込めません: {}", path.display()))
}

fn resolve_relative(base_file: &Path, target: &str) -> PathBuf {
    let target = Path::new(target);
    if target.is_absolute() {
        return target.to_path_buf();
    }
    base_file
        .parent()
        .map(|dir| dir.join(target))
        .unwrap_or_else(|| target.to_path_buf())
}
