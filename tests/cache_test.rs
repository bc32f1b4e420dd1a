//! キャッシュ機能テスト
//!
//! 解析結果キャッシュの動作を検証

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use ui_refine::analyzer::cache::{compute_file_hash, filter_cached_images, CacheFile};
use ui_refine::analyzer::{analyze_images_with_cache, BatchOptions, Pipeline, VisionModel};
use ui_refine::error::{Result, UiRefineError};
use ui_refine::scanner::{self, ImageInfo, ImageInput};
use ui_refine_common::{fallback_components, terminal_fallback_result, PipelineResult, StageOutcome};
use ui_refine_common::analyzer::synthesize_all;
use ui_refine_common::Improvements;
use tempfile::tempdir;

const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

/// フォールバックなしの結果
fn complete_result() -> PipelineResult {
    let components = fallback_components();
    let suggestions = synthesize_all(&components);
    PipelineResult::assemble(
        StageOutcome::Complete(components),
        StageOutcome::Complete(Improvements { suggestions, design_system: None }),
    )
}

/// 空のキャッシュファイル
#[test]
fn test_cache_file_empty() {
    let dir = tempdir().expect("Failed to create temp dir");
    let cache = CacheFile::load(dir.path());

    assert_eq!(cache.len(), 0);
    assert!(cache.is_empty());
}

/// キャッシュの保存と読み込み
#[test]
fn test_cache_save_and_load() {
    let dir = tempdir().expect("Failed to create temp dir");

    let mut cache = CacheFile::load(dir.path());
    assert!(cache.insert("abc123".to_string(), "shot.png".to_string(), 1024, complete_result()));
    cache.save(dir.path()).expect("キャッシュ保存失敗");

    let loaded = CacheFile::load(dir.path());
    assert_eq!(loaded.len(), 1);
    let cached = loaded.get("abc123").expect("キャッシュが見つからない");
    assert_eq!(cached, &complete_result());
}

/// フォールバックを含む結果は保存しない
#[test]
fn test_cache_rejects_degraded_results() {
    let dir = tempdir().expect("Failed to create temp dir");
    let mut cache = CacheFile::load(dir.path());

    assert!(!cache.insert("h".to_string(), "x.png".to_string(), 1, terminal_fallback_result("失敗")));
    assert!(cache.is_empty());
}

/// キャッシュの上書き
#[test]
fn test_cache_overwrite() {
    let dir = tempdir().expect("Failed to create temp dir");
    let mut cache = CacheFile::load(dir.path());

    let mut first = complete_result();
    first.components.truncate(1);
    cache.insert("same_hash".to_string(), "a.png".to_string(), 10, first);
    cache.insert("same_hash".to_string(), "a.png".to_string(), 10, complete_result());

    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get("same_hash").unwrap().components.len(), 5);
}

/// キャッシュファイルが破損している場合
#[test]
fn test_cache_corrupted_file() {
    let dir = tempdir().expect("Failed to create temp dir");
    std::fs::write(CacheFile::cache_path(dir.path()), "{ invalid json }").unwrap();

    let cache = CacheFile::load(dir.path());
    assert!(cache.is_empty());
}

/// バージョン不一致は空として扱う
#[test]
fn test_cache_version_mismatch() {
    let dir = tempdir().expect("Failed to create temp dir");
    std::fs::write(CacheFile::cache_path(dir.path()), r#"{"version": 99, "entries": {}}"#).unwrap();

    assert!(CacheFile::load(dir.path()).is_empty());
}

/// キャッシュの削除
#[test]
fn test_cache_clear() {
    let dir = tempdir().expect("Failed to create temp dir");
    CacheFile::default().save(dir.path()).unwrap();

    assert!(CacheFile::clear(dir.path()).unwrap());
    assert!(!CacheFile::clear(dir.path()).unwrap());
}

/// filter_cached_images のテスト
#[test]
fn test_filter_cached_images() {
    let dir = tempdir().expect("Failed to create temp dir");
    let img1 = dir.path().join("img1.png");
    let img2 = dir.path().join("img2.png");
    std::fs::write(&img1, b"fake image 1").unwrap();
    std::fs::write(&img2, b"fake image 2").unwrap();

    let images = vec![
        ImageInfo { path: img1.clone(), file_name: "img1.png".into(), file_size: 12 },
        ImageInfo { path: img2.clone(), file_name: "img2.png".into(), file_size: 12 },
    ];

    let mut cache = CacheFile::load(dir.path());
    let (cached, uncached) = filter_cached_images(&images, &cache);
    assert!(cached.is_empty());
    assert_eq!(uncached.len(), 2);

    let hash = compute_file_hash(&img1).unwrap();
    cache.insert(hash, "img1.png".into(), 12, complete_result());
    let (cached, uncached) = filter_cached_images(&images, &cache);
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].0.file_name, "img1.png");
    assert_eq!(uncached.len(), 1);
    assert_eq!(uncached[0].0.file_name, "img2.png");
}

/// 呼び出し回数を数えるモデル（常に同じ正常応答）
struct CountingModel {
    calls: AtomicUsize,
}

#[async_trait]
impl VisionModel for CountingModel {
    async fn generate(&self, prompt: &str, _image: &ImageInput) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if prompt.contains("\"improvements\"") {
            Ok(r#"{"improvements": [{"componentId": "c1", "improvements": {"padding": "12px"}}]}"#.into())
        } else if prompt.contains("\"components\"") {
            Ok(r#"{"components": [{"id": "c1", "type": "button", "boundingBox": {"x": 1, "y": 2, "width": 3, "height": 4}}]}"#.into())
        } else {
            Err(UiRefineError::ApiCall("unexpected".into()))
        }
    }
}

/// 2回目の解析はキャッシュから返る
#[tokio::test]
async fn test_analyze_with_cache_skips_second_run() {
    let dir = tempdir().expect("Failed to create temp dir");
    std::fs::write(dir.path().join("screen.png"), PNG_HEADER).unwrap();
    let images = scanner::scan_folder(dir.path(), false).unwrap();

    let model = Arc::new(CountingModel { calls: AtomicUsize::new(0) });
    let pipeline = Pipeline::new(model.clone());
    let options = BatchOptions::default();

    let first = analyze_images_with_cache(&pipeline, &images, dir.path(), &options).await.unwrap();
    assert_eq!(first.len(), 1);
    assert!(!first[0].from_cache);
    assert!(!first[0].outcome.as_ref().unwrap().degraded);
    assert_eq!(model.calls.load(Ordering::SeqCst), 2);

    let second = analyze_images_with_cache(&pipeline, &images, dir.path(), &options).await.unwrap();
    assert!(second[0].from_cache);
    assert_eq!(model.calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        second[0].outcome.as_ref().unwrap(),
        first[0].outcome.as_ref().unwrap()
    );
}
