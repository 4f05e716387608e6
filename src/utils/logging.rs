/// ログ関連のヘルパー
///
/// サブスクライバーの初期化と、定型ログの出力をまとめる
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::models::{Chunk, CompositeScore, ScoreBand, ITEM_NAMES};

/// tracing サブスクライバーを初期化する
///
/// `RUST_LOG` があればそれを優先する。二重初期化は無視する。
/// 標準出力はコマンドの JSON 出力に使うため、ログは標準エラーに書く。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// 起動情報を記録する
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 SL Score 構造分析ツール");
    info!("🤖 モデル: {}", config.llm_model_name);
    match config.api_key_prefix() {
        Some(prefix) => info!("🔑 APIキー: {}", prefix),
        None => warn!("🔑 APIキー: 未設定"),
    }
    info!("{}", "=".repeat(60));
}

/// 分割結果を記録する
pub fn log_chunks(chunks: &[Chunk]) {
    info!("✂️ {}チャンクに分割完了", chunks.len());
    for (i, chunk) in chunks.iter().enumerate() {
        info!(
            "  {}. {} ({} 文字)",
            i + 1,
            chunk.label,
            chunk.char_count()
        );
    }
}

/// 最終スコアを記録する
pub fn log_final_score(score: &CompositeScore) {
    info!("\n{}", "=".repeat(60));
    info!("📊 採点結果");
    info!("{}", "=".repeat(60));
    for (i, name) in ITEM_NAMES.iter().enumerate() {
        let raw = score.scores.values()[i];
        info!(
            "{:02}. {} {:>4.1} ×{:.2} = {:>5.2} {}",
            i + 1,
            name,
            raw,
            score.coefficients[i],
            score.weighted[i],
            ScoreBand::of_item(raw).symbol()
        );
    }
    info!("{}", "─".repeat(60));
    info!("構成点（W1）: {:.1}点", score.w1);
    info!("ESCスコア（W2）: {:.1}点", score.w2);
    info!(
        "補正ESCスコア: {:.1}点 {}",
        score.final_score,
        ScoreBand::of_final(score.final_score).symbol()
    );
    if score.has_zero {
        warn!("⚠️ 一部スコアの抽出に失敗した可能性があります（0点の項目）。手動確認推奨");
    }
    info!("{}", "=".repeat(60));
}

/// ログ表示用に長いテキストを切り詰める
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text_counts_chars() {
        assert_eq!(truncate_text("あいうえお", 3), "あいう...");
        assert_eq!(truncate_text("あいう", 3), "あいう");
    }
}
