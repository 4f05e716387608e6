//! CLI アプリケーション - 編排層
//!
//! 設定・クライアント・パイプラインを組み立て、サブコマンドを実行する。
//! 結果は JSON で標準出力に、経過はログ（標準エラー）に出す。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::Serialize;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{AppError, FileError};
use crate::models::score::parse_score_list;
use crate::models::{load_analysis_request, load_story_text, ChunkPreviewReport, RubricMeta};
use crate::orchestrator::pipeline::{CancelFlag, LogSink, Pipeline};
use crate::services::{compute_composite, score_text, Chunker, OpenAiLlmService, ScoreParser};
use crate::utils::logging::{log_chunks, log_final_score, log_startup};
use crate::workflow::{build_prompt, validate_pasted_response};

/// サブコマンド
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// 本文の分割結果をプレビューする
    Chunk {
        /// 本文ファイル（省略時は標準入力）
        input: Option<PathBuf>,

        /// 1チャンクにまとめる話数（省略時は設定値）
        #[arg(long, short)]
        group_size: Option<usize>,
    },

    /// 採点テキストから14項目を抽出し、合成スコアを計算する
    Score {
        /// 採点テキストのファイル（省略時は標準入力）
        input: Option<PathBuf>,
    },

    /// 素点を手動で指定して合成スコアを再計算する
    Recalc {
        /// 14個の素点（カンマ区切り）
        #[arg(long)]
        scores: String,

        /// 項目名で上書きする（例: ミッドポイント=8.5）。複数指定可
        #[arg(long = "set", value_name = "NAME=VALUE")]
        overrides: Vec<String>,
    },

    /// ルーブリックの項目名と係数を表示する
    Meta,

    /// ハイブリッドモード用のプロンプトを生成する
    Prompt {
        /// 分析依頼の TOML ファイル
        #[arg(long, short)]
        request: PathBuf,

        /// フェーズ番号（1〜4）
        #[arg(long, short)]
        phase: u8,

        /// 直前フェーズの回答ファイル（Phase 2〜4 で必須）
        #[arg(long)]
        previous: Option<PathBuf>,
    },

    /// LLM API を使って4フェーズの分析を実行する
    Analyze {
        /// 分析依頼の TOML ファイル
        #[arg(long, short)]
        request: PathBuf,

        /// 結果の保存先（省略時は設定値）
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

/// アプリケーション
pub struct App {
    config: Config,
    chunker: Chunker,
    parser: ScoreParser,
}

impl App {
    pub fn initialize(config: Config) -> Result<Self> {
        log_startup(&config);

        Ok(Self {
            chunker: Chunker::new().context("分割パターンを構築できません")?,
            parser: ScoreParser::new().context("抽出パターンを構築できません")?,
            config,
        })
    }

    pub async fn run(&self, command: Command) -> Result<()> {
        match command {
            Command::Chunk { input, group_size } => self.preview_chunks(input, group_size).await,
            Command::Score { input } => self.score(input).await,
            Command::Recalc { scores, overrides } => self.recalc(&scores, &overrides),
            Command::Meta => print_json(&RubricMeta::current()),
            Command::Prompt {
                request,
                phase,
                previous,
            } => self.prompt(&request, phase, previous).await,
            Command::Analyze { request, output } => self.analyze(&request, output).await,
        }
    }

    async fn preview_chunks(&self, input: Option<PathBuf>, group_size: Option<usize>) -> Result<()> {
        let text = read_input(input.as_deref()).await?;
        let chunks = self
            .chunker
            .chunk(&text, group_size.unwrap_or(self.config.chunk_group_size));
        log_chunks(&chunks);
        print_json(&ChunkPreviewReport::from_chunks(&chunks))
    }

    async fn score(&self, input: Option<PathBuf>) -> Result<()> {
        let text = read_input(input.as_deref()).await?;
        let report = score_text(&self.parser, &text);
        log_final_score(&report.composite);
        print_json(&report)
    }

    fn recalc(&self, scores: &str, overrides: &[String]) -> Result<()> {
        let mut raw = parse_score_list(scores).map_err(AppError::from)?;
        for assignment in overrides {
            raw.apply_override(assignment).map_err(AppError::from)?;
        }
        let composite = compute_composite(&raw);
        log_final_score(&composite);
        print_json(&composite)
    }

    async fn prompt(&self, request_path: &Path, phase: u8, previous: Option<PathBuf>) -> Result<()> {
        let request = load_analysis_request(request_path).await?;

        let previous_text = match previous {
            Some(path) => Some(load_story_text(&path).await?),
            None => None,
        };
        let previous_result = previous_text
            .as_deref()
            .map(validate_pasted_response)
            .transpose()
            .map_err(AppError::from)?;

        let prompt = build_prompt(phase, &request.meta, &request.story_text, previous_result)
            .map_err(AppError::from)?;
        info!("📝 Phase {} プロンプト: {} 文字", prompt.phase, prompt.char_count);
        print_json(&prompt)
    }

    async fn analyze(&self, request_path: &Path, output: Option<PathBuf>) -> Result<()> {
        let api_key = self.config.require_api_key().map_err(AppError::from)?;
        let request = load_analysis_request(request_path).await?;

        let mut service = OpenAiLlmService::new(&self.config, api_key);
        if let Some(model) = request.model.as_deref() {
            service = service.with_model(model);
        }
        let pipeline = Pipeline::new(&self.config, Arc::new(service))
            .context("パイプラインを構築できません")?;
        info!("🤖 使用モデル: {}", pipeline.model_name());

        let cancel = CancelFlag::new();
        let watcher = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("⚠️ 中断要求を受け付けました。実行中の呼び出しの完了を待ちます");
                    cancel.cancel();
                }
            })
        };

        let results = pipeline
            .analyze(&request, &LogSink, &cancel)
            .await
            .map_err(AppError::from)?;
        watcher.abort();

        if let Some(score) = &results.final_score {
            log_final_score(score);
        }
        for err in &results.errors {
            warn!("⚠️ {}", err);
        }

        let output = output.unwrap_or_else(|| PathBuf::from(&self.config.output_file));
        write_json(&output, &results).await?;
        info!("💾 結果を保存しました: {}", output.display());

        print_json(&results)
    }
}

/// ファイルまたは標準入力を読む
async fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => load_story_text(path).await,
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("標準入力を読み込めません")?;
            Ok(buf)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(AppError::from)?;
    println!("{}", json);
    Ok(())
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(AppError::from)?;
    tokio::fs::write(path, json).await.map_err(|source| {
        AppError::File(FileError::WriteFailed {
            path: path.display().to_string(),
            source,
        })
    })?;
    Ok(())
}
