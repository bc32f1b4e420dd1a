//! 解析結果キャッシュモジュール
//!
//! 画像のSHA-256ハッシュをキーにして解析結果をキャッシュし、
//! 同じ画像の再解析をスキップする。フォールバックを含む結果は保存しない。

use crate::error::Result;
use crate::scanner::ImageInfo;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use ui_refine_common::PipelineResult;

const CACHE_FILE_NAME: &str = ".ui-refine-cache.json";

/// キャッシュファイルの構造
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheFile {
    /// バージョン（互換性チェック用）
    version: u32,
    /// ファイルハッシュ → 解析結果のマップ
    entries: HashMap<String, CacheEntry>,
}

/// キャッシュエントリ
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub file_name: String,
    pub file_size: u64,
    pub result: PipelineResult,
}

impl CacheFile {
    const CURRENT_VERSION: u32 = 1;

    pub fn cache_path(folder: &Path) -> PathBuf {
        folder.join(CACHE_FILE_NAME)
    }

    /// キャッシュファイルを読み込み（読めなければ空）
    pub fn load(folder: &Path) -> Self {
        let cache_path = Self::cache_path(folder);
        if !cache_path.exists() {
            return Self::default();
        }

        let file = match File::open(&cache_path) {
            Ok(f) => f,
            Err(_) => return Self::default(),
        };

        let reader = BufReader::new(file);
        match serde_json::from_reader::<_, CacheFile>(reader) {
            Ok(cache) if cache.version == Self::CURRENT_VERSION => cache,
            Ok(_) => {
                log::warn!("キャッシュバージョン不一致、再生成します");
                Self::default()
            }
            Err(e) => {
                log::warn!("キャッシュを読み込めません: {}", e);
                Self::default()
            }
        }
    }

    /// キャッシュファイルを保存
    pub fn save(&self, folder: &Path) -> Result<()> {
        std::fs::create_dir_all(folder)?;
        let file = File::create(Self::cache_path(folder))?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// キャッシュファイルを削除（存在しなければ false）
    pub fn clear(folder: &Path) -> Result<bool> {
        let cache_path = Self::cache_path(folder);
        if !cache_path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(cache_path)?;
        Ok(true)
    }

    /// キャッシュをルックアップ
    pub fn get(&self, hash: &str) -> Option<&PipelineResult> {
        self.entries.get(hash).map(|e| &e.result)
    }

    /// キャッシュに追加（フォールバックを含む結果は無視して false）
    pub fn insert(&mut self, hash: String, file_name: String, file_size: u64, result: PipelineResult) -> bool {
        if result.degraded {
            return false;
        }
        self.entries.insert(hash, CacheEntry {
            file_name,
            file_size,
            result,
        });
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CacheFile {
    fn default() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            entries: HashMap::new(),
        }
    }
}

/// バイト列のハッシュ（SHA-256, hex）
pub fn compute_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// 画像ファイルのハッシュを計算
pub fn compute_file_hash(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(compute_hash(&bytes))
}

/// キャッシュを使用して解析結果を取得
///
/// - キャッシュにある画像はキャッシュから取得
/// - ない画像は（画像, ハッシュ）のリストで返す。ハッシュ計算に失敗した画像のハッシュは空
pub fn filter_cached_images(
    images: &[ImageInfo],
    cache: &CacheFile,
) -> (Vec<(ImageInfo, PipelineResult)>, Vec<(ImageInfo, String)>) {
    let mut cached_results = Vec::new();
    let mut uncached_images = Vec::new();

    for img in images {
        let hash = match compute_file_hash(&img.path) {
            Ok(h) => h,
            Err(_) => {
                uncached_images.push((img.clone(), String::new()));
                continue;
            }
        };

        if let Some(result) = cache.get(&hash) {
            cached_results.push((img.clone(), result.clone()));
        } else {
            uncached_images.push((img.clone(), hash));
        }
    }

    (cached_results, uncached_images)
}
