//! 解析パイプライン
//!
//! 抽出 → 改善 → レンダリングを順に実行する。
//! モデルとの通信は `VisionModel` トレイトの背後に置く。

pub mod cache;
pub mod extractor;
pub mod gemini;
pub mod improver;

pub use cache::CacheFile;
pub use gemini::GeminiClient;

use crate::error::Result;
use crate::scanner::{self, ImageInfo, ImageInput};
use async_trait::async_trait;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use ui_refine_common::analyzer::{terminal_fallback_result, DEFAULT_REASONING_MAX_CHARS};
use ui_refine_common::PipelineResult;

/// 画像付きプロンプトに応答するモデル
#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn generate(&self, prompt: &str, image: &ImageInput) -> Result<String>;
}

pub struct Pipeline {
    model: Arc<dyn VisionModel>,
    reasoning_max_chars: usize,
}

impl Pipeline {
    pub fn new(model: Arc<dyn VisionModel>) -> Self {
        Self {
            model,
            reasoning_max_chars: DEFAULT_REASONING_MAX_CHARS,
        }
    }

    pub fn with_reasoning_max_chars(mut self, max_chars: usize) -> Self {
        self.reasoning_max_chars = max_chars;
        self
    }

    /// パイプラインを実行（失敗しない）
    pub async fn run(&self, image: &ImageInput) -> PipelineResult {
        let model = self.model.as_ref();

        let components = extractor::extract_components(model, image).await;
        let improvements =
            improver::improve_components(model, image, components.value(), self.reasoning_max_chars).await;

        let result = PipelineResult::assemble(components, improvements);
        log::info!(
            "完了: {} ({}件, degraded={})",
            image.name,
            result.components.len(),
            result.degraded
        );
        result
    }

    /// 期限付きで実行（期限切れなら固定結果）
    pub async fn run_with_deadline(&self, image: &ImageInput, deadline: Duration) -> PipelineResult {
        match tokio::time::timeout(deadline, self.run(image)).await {
            Ok(result) => result,
            Err(_) => {
                let reason = format!("{:?}の期限内に完了しなかった", deadline);
                log::warn!("{}: {}", image.name, reason);
                terminal_fallback_result(&reason)
            }
        }
    }

    async fn run_with_optional_deadline(&self, image: &ImageInput, deadline: Option<Duration>) -> PipelineResult {
        match deadline {
            Some(deadline) => self.run_with_deadline(image, deadline).await,
            None => self.run(image).await,
        }
    }
}

/// 一括解析の設定
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// 同時に実行するパイプライン数
    pub jobs: usize,
    pub deadline: Option<Duration>,
    pub show_progress: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            jobs: 2,
            deadline: None,
            show_progress: false,
        }
    }
}

/// 1画像分の解析結果
#[derive(Debug)]
pub struct BatchItem {
    pub info: ImageInfo,
    /// 画像の読み込みに失敗した場合のみ Err
    pub outcome: Result<PipelineResult>,
    pub from_cache: bool,
}

fn progress_bar(len: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(len as u64);
    let style = ProgressStyle::with_template("  {bar:30} {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar
}

/// 画像を並行して解析（結果は入力順）
pub async fn analyze_images(pipeline: &Pipeline, images: &[ImageInfo], options: &BatchOptions) -> Vec<BatchItem> {
    let progress = progress_bar(images.len(), options.show_progress);

    let items = futures::stream::iter(images.iter().cloned())
        .map(|info| {
            let progress = progress.clone();
            async move {
                let outcome = match scanner::load_image(&info.path) {
                    Ok(image) => Ok(pipeline.run_with_optional_deadline(&image, options.deadline).await),
                    Err(e) => {
                        log::warn!("読み込み失敗: {}: {}", info.file_name, e);
                        Err(e)
                    }
                };
                progress.set_message(info.file_name.clone());
                progress.inc(1);
                BatchItem {
                    info,
                    outcome,
                    from_cache: false,
                }
            }
        })
        .buffered(options.jobs.max(1))
        .collect::<Vec<_>>()
        .await;

    progress.finish_and_clear();
    items
}

/// キャッシュを使って解析（新しい結果のうちフォールバックなしのものを保存）
pub async fn analyze_images_with_cache(
    pipeline: &Pipeline,
    images: &[ImageInfo],
    cache_dir: &Path,
    options: &BatchOptions,
) -> Result<Vec<BatchItem>> {
    let mut cache = CacheFile::load(cache_dir);
    let (cached, uncached) = cache::filter_cached_images(images, &cache);
    log::info!("キャッシュ: {}件ヒット, {}件を解析", cached.len(), uncached.len());

    let targets: Vec<ImageInfo> = uncached.iter().map(|(info, _)| info.clone()).collect();
    let fresh = analyze_images(pipeline, &targets, options).await;

    let mut stored = 0;
    for (item, (_, hash)) in fresh.iter().zip(&uncached) {
        if hash.is_empty() {
            continue;
        }
        if let Ok(result) = &item.outcome {
            if cache.insert(hash.clone(), item.info.file_name.clone(), item.info.file_size, result.clone()) {
                stored += 1;
            }
        }
    }
    if stored > 0 {
        cache.save(cache_dir)?;
    }

    let mut items: Vec<BatchItem> = cached
        .into_iter()
        .map(|(info, result)| BatchItem {
            info,
            outcome: Ok(result),
            from_cache: true,
        })
        .chain(fresh)
        .collect();
    items.sort_by(|a, b| a.info.path.cmp(&b.info.path));
    Ok(items)
}
