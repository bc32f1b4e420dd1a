//! UI Refine
//!
//! スクリーンショット → コンポーネント抽出 → 改善提案 → レンダリング

pub mod analyzer;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod figma;
pub mod scanner;
