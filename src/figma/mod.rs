//! デザインツール（Figma）からの取り込み
//!
//! - DesignSource: ファイル取得・画像書き出し・ダウンロードの抽象
//! - select_node: ノードID未指定時の対象ノード選択
//! - retrieval: 形式 × 倍率の取得マトリクス

pub mod client;
pub mod retrieval;

pub use client::FigmaClient;
pub use retrieval::{import_design, retrieve_asset, retrieval_matrix, AssetFormat, RetrievedAsset};

use crate::error::Result;
use async_trait::async_trait;
use serde::Deserialize;

/// 優先して選ぶノード種別
pub const PREFERRED_NODE_TYPES: &[&str] = &["FRAME", "COMPONENT", "COMPONENT_SET", "INSTANCE"];

fn default_visible() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct NodeBounds {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
}

/// デザイン文書のノード
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignNode {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub node_type: String,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub absolute_bounding_box: Option<NodeBounds>,
    #[serde(default)]
    pub children: Vec<DesignNode>,
}

impl DesignNode {
    fn has_area(&self) -> bool {
        self.absolute_bounding_box
            .map(|b| b.width > 0.0 && b.height > 0.0)
            .unwrap_or(false)
    }

    fn is_preferred(&self) -> bool {
        PREFERRED_NODE_TYPES.contains(&self.node_type.as_str())
    }
}

/// `GET /v1/files/:key` の応答
#[derive(Debug, Clone, Deserialize)]
pub struct DesignDocument {
    #[serde(default)]
    pub name: String,
    pub document: DesignNode,
}

/// デザインツールAPIの抽象
#[async_trait]
pub trait DesignSource: Send + Sync {
    async fn fetch_document(&self, file_key: &str) -> Result<DesignDocument>;

    /// ノードを指定形式・倍率で書き出した画像のURL（書き出せなければ None）
    async fn image_reference(
        &self,
        file_key: &str,
        node_id: &str,
        format: AssetFormat,
        scale: u32,
    ) -> Result<Option<String>>;

    async fn download(&self, url: &str) -> Result<Vec<u8>>;
}

/// 書き出し対象のノードを深さ優先で選ぶ
///
/// 非表示のノードは子孫ごと飛ばす。面積のあるノードのうち
/// フレーム・コンポーネント系を優先し、なければ最初に見つかったものを返す。
pub fn select_node(root: &DesignNode) -> Option<&DesignNode> {
    let mut first_visible = None;
    find_preferred(root, &mut first_visible).or(first_visible)
}

fn find_preferred<'a>(node: &'a DesignNode, first_visible: &mut Option<&'a DesignNode>) -> Option<&'a DesignNode> {
    if !node.visible {
        return None;
    }
    if node.has_area() {
        if node.is_preferred() {
            return Some(node);
        }
        if first_visible.is_none() {
            *first_visible = Some(node);
        }
    }
    node.children
        .iter()
        .find_map(|child| find_preferred(child, first_visible))
}
