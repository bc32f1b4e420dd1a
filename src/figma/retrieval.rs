//! 画像取得マトリクス
//!
//! 形式 [png, svg, jpg] × 倍率 [2, 1, 3] を1つずつ順に試し、
//! 最初に画像URLを返した組み合わせを採用する。

use super::{select_node, DesignSource};
use crate::error::{Result, UiRefineError};
use crate::scanner::ImageInput;
use std::fmt;
use ui_refine_common::first_success_async;

/// 書き出し形式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetFormat {
    Png,
    Svg,
    Jpg,
}

impl AssetFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetFormat::Png => "png",
            AssetFormat::Svg => "svg",
            AssetFormat::Jpg => "jpg",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            AssetFormat::Png => "image/png",
            AssetFormat::Svg => "image/svg+xml",
            AssetFormat::Jpg => "image/jpeg",
        }
    }
}

impl fmt::Display for AssetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const ASSET_FORMATS: [AssetFormat; 3] = [AssetFormat::Png, AssetFormat::Svg, AssetFormat::Jpg];
pub const RENDER_SCALES: [u32; 3] = [2, 1, 3];

/// 試行順の（形式, 倍率）一覧
pub fn retrieval_matrix() -> Vec<(AssetFormat, u32)> {
    ASSET_FORMATS
        .iter()
        .flat_map(|format| RENDER_SCALES.iter().map(move |scale| (*format, *scale)))
        .collect()
}

/// 取得に成功した組み合わせ
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedAsset {
    pub node_id: String,
    pub format: AssetFormat,
    pub scale: u32,
    pub url: String,
}

/// ノード画像のURLを取得（エラーはその組み合わせの失敗として扱う）
pub async fn retrieve_asset(source: &dyn DesignSource, file_key: &str, node_id: &str) -> Result<RetrievedAsset> {
    let found = first_success_async(retrieval_matrix(), |(format, scale)| async move {
        match source.image_reference(file_key, node_id, format, scale).await {
            Ok(Some(url)) if !url.trim().is_empty() => Some(url),
            Ok(_) => {
                log::debug!("画像なし: {} {}x", format, scale);
                None
            }
            Err(e) => {
                log::debug!("書き出し失敗: {} {}x: {}", format, scale, e);
                None
            }
        }
    })
    .await;

    let ((format, scale), url) = found.ok_or_else(|| UiRefineError::AssetUnavailable(node_id.to_string()))?;
    log::info!("画像を取得: {} ({} {}x)", node_id, format, scale);

    Ok(RetrievedAsset {
        node_id: node_id.to_string(),
        format,
        scale,
        url,
    })
}

/// デザインのノードを画像として取り込む
///
/// ノードID未指定なら文書から選ぶ。
pub async fn import_design(source: &dyn DesignSource, file_key: &str, node_id: Option<&str>) -> Result<ImageInput> {
    let node_id = match node_id {
        Some(id) => id.to_string(),
        None => {
            let document = source.fetch_document(file_key).await?;
            let node = select_node(&document.document).ok_or_else(|| {
                UiRefineError::NodeNotFound(format!("{}: 表示中で面積のあるノードがありません", file_key))
            })?;
            log::info!("ノードを選択: {} ({} \"{}\")", node.id, node.node_type, node.name);
            node.id.clone()
        }
    };

    let asset = retrieve_asset(source, file_key, &node_id).await?;
    let bytes = source.download(&asset.url).await?;
    if bytes.is_empty() {
        return Err(UiRefineError::AssetDownload(format!("空のデータ: {}", asset.url)));
    }

    let name = format!("{}.{}", node_id.replace([':', ';', '/'], "-"), asset.format.as_str());
    Ok(ImageInput::with_mime_type(name, bytes, asset.format.mime_type()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retrieval_matrix_order() {
        let matrix = retrieval_matrix();
        assert_eq!(matrix.len(), 9);
        assert_eq!(matrix[0], (AssetFormat::Png, 2));
        assert_eq!(matrix[1], (AssetFormat::Png, 1));
        assert_eq!(matrix[2], (AssetFormat::Png, 3));
        assert_eq!(matrix[3], (AssetFormat::Svg, 2));
        assert_eq!(matrix[8], (AssetFormat::Jpg, 3));
    }

    #[test]
    fn test_asset_format_mime() {
        assert_eq!(AssetFormat::Svg.mime_type(), "image/svg+xml");
        assert_eq!(AssetFormat::Jpg.to_string(), "jpg");
    }
}
