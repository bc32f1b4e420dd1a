use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ui-refine")]
#[command(about = "UIスクリーンショットのAI改善提案ツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// スクリーンショット1枚を解析
    Analyze {
        /// 画像ファイルのパス
        #[arg(required = true)]
        image: PathBuf,

        /// 出力ディレクトリ（デフォルト: 画像と同じフォルダ）
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 出力形式 (json/html/both)
        #[arg(short, long, default_value = "both")]
        format: ExportFormat,

        /// キャッシュを使用（再解析をスキップ）
        #[arg(long)]
        use_cache: bool,

        /// 全体の期限（秒）。過ぎたら固定の結果を出力
        #[arg(long)]
        deadline_secs: Option<u64>,
    },

    /// フォルダ内のスクリーンショットを一括解析
    Batch {
        /// フォルダのパス
        #[arg(required = true)]
        folder: PathBuf,

        /// 出力ディレクトリ（デフォルト: 入力フォルダ）
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 出力形式 (json/html/both)
        #[arg(short, long, default_value = "both")]
        format: ExportFormat,

        /// 同時実行数
        #[arg(short, long, default_value = "2")]
        jobs: usize,

        /// キャッシュを使用（再解析をスキップ）
        #[arg(long)]
        use_cache: bool,

        /// 1枚あたりの期限（秒）
        #[arg(long)]
        deadline_secs: Option<u64>,

        /// サブフォルダも再帰的にスキャン
        #[arg(short = 'r', long)]
        recursive: bool,
    },

    /// Figmaのノードを書き出して解析
    Import {
        /// Figmaファイルキー
        #[arg(long, required = true)]
        file_key: String,

        /// ノードID（省略時は自動選択）
        #[arg(long)]
        node_id: Option<String>,

        /// 出力ディレクトリ
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 出力形式 (json/html/both)
        #[arg(short, long, default_value = "both")]
        format: ExportFormat,
    },

    /// 保存済みの結果JSONからHTMLを再生成
    Render {
        /// 結果JSONファイル
        #[arg(required = true)]
        input: PathBuf,

        /// 出力HTMLファイル（省略時は入力と同名の .html）
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// 設定を表示/編集
    Config {
        /// Gemini APIキーを設定
        #[arg(long)]
        set_api_key: Option<String>,

        /// Figmaトークンを設定
        #[arg(long)]
        set_figma_token: Option<String>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },

    /// キャッシュ管理
    Cache {
        /// 対象フォルダ（省略時はカレント）
        folder: Option<PathBuf>,

        /// キャッシュを削除
        #[arg(long)]
        clear: bool,

        /// キャッシュ情報を表示
        #[arg(long)]
        info: bool,
    },
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum ExportFormat {
    Json,
    Html,
    #[default]
    Both,
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "html" | "htm" => Ok(ExportFormat::Html),
            "both" => Ok(ExportFormat::Both),
            _ => Err(format!("Unknown format: {}. Use json, html, or both", s)),
        }
    }
}
