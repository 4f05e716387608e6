use anyhow::Result;
use clap::Parser;

use sl_score::orchestrator::{App, Command};
use sl_score::utils::logging;
use sl_score::Config;

/// Structural Logical Score: 物語構造の分割・採点ツール
#[derive(Parser, Debug)]
#[command(name = "sl-score", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// 詳細ログを出す
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 設定を読み込む
    let config = Config::from_env();

    // ログを初期化
    logging::init(cli.verbose || config.verbose_logging);

    App::initialize(config)?.run(cli.command).await
}
