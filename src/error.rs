use thiserror::Error;

#[derive(Error, Debug)]
pub enum UiRefineError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("APIキーが設定されていません。`ui-refine config --set-api-key YOUR_KEY` で設定してください")]
    MissingApiKey,

    #[error("Figmaトークンが設定されていません。`ui-refine config --set-figma-token YOUR_TOKEN` で設定してください")]
    MissingFigmaToken,

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("フォルダが見つかりません: {0}")]
    FolderNotFound(String),

    #[error("画像読み込みエラー: {0}")]
    ImageLoad(String),

    #[error("API呼び出しエラー: {0}")]
    ApiCall(String),

    #[error("APIのレート制限に達しました: {0}")]
    RateLimited(String),

    #[error("APIレスポンスのパースに失敗: {0}")]
    ApiParse(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("画像が見つかりません: {0}")]
    NoImagesFound(String),

    #[error("デザインのノードが見つかりません: {0}")]
    NodeNotFound(String),

    #[error("画像を書き出せませんでした（全形式・全倍率を試行）: ノード {0}")]
    AssetUnavailable(String),

    #[error("画像のダウンロードに失敗: {0}")]
    AssetDownload(String),

    #[error(transparent)]
    Common(#[from] ui_refine_common::Error),
}

pub type Result<T> = std::result::Result<T, UiRefineError>;
