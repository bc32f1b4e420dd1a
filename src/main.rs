use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use ui_refine::analyzer::{self, BatchOptions, CacheFile, GeminiClient, Pipeline};
use ui_refine::{cli, config, error, export, figma, scanner};
use cli::{Cli, Commands};
use config::Config;
use error::Result;

fn init_logging(verbose: bool) {
    let level = if verbose { log::LevelFilter::Debug } else { log::LevelFilter::Info };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn build_pipeline(config: &Config) -> Result<Pipeline> {
    let client = GeminiClient::from_config(config)?;
    Ok(Pipeline::new(Arc::new(client)).with_reasoning_max_chars(config.reasoning_max_chars))
}

fn print_summary(result: &ui_refine_common::PipelineResult) {
    let rule_based = result
        .suggestions
        .iter()
        .filter(|s| s.source == ui_refine_common::SuggestionSource::RuleBased)
        .count();
    println!(
        "  コンポーネント: {}件 / 改善提案: {}件 (ルール補完 {}件)",
        result.components.len(),
        result.suggestions.len(),
        rule_based
    );
    if result.degraded {
        println!("  ⚠ フォールバックあり:");
        for note in &result.notes {
            println!("    - {}", note);
        }
    }
}

fn print_written(paths: &[PathBuf]) {
    for path in paths {
        println!("✔ 出力: {}", path.display());
    }
}

fn parent_or_current(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = Config::load()?;

    match cli.command {
        Commands::Analyze { image, output, format, use_cache, deadline_secs } => {
            println!("🖼  ui-refine - 解析\n");
            let output_dir = output.unwrap_or_else(|| parent_or_current(&image));
            let pipeline = build_pipeline(&config)?;
            let deadline = deadline_secs.map(Duration::from_secs);

            println!("[1/2] AI解析中...{}", if use_cache { " (キャッシュ有効)" } else { "" });
            let input = scanner::load_image(&image)?;
            let (result, from_cache) = if use_cache {
                let info = scanner::ImageInfo {
                    path: image.clone(),
                    file_name: input.name.clone(),
                    file_size: input.bytes.len() as u64,
                };
                let options = BatchOptions { jobs: 1, deadline, show_progress: false };
                let mut items = analyzer::analyze_images_with_cache(&pipeline, &[info], &output_dir, &options).await?;
                match items.pop() {
                    Some(item) => (item.outcome?, item.from_cache),
                    None => return Err(error::UiRefineError::FileNotFound(image.display().to_string())),
                }
            } else {
                let result = match deadline {
                    Some(deadline) => pipeline.run_with_deadline(&input, deadline).await,
                    None => pipeline.run(&input).await,
                };
                (result, false)
            };
            println!("✔ 解析完了{}\n", if from_cache { " (キャッシュ)" } else { "" });
            print_summary(&result);

            println!("\n[2/2] 結果を保存中...");
            let written = export::export_result(&result, &input.name, &format, &output_dir, &input.stem())?;
            print_written(&written);

            println!("\n✅ 完了");
        }

        Commands::Batch { folder, output, format, jobs, use_cache, deadline_secs, recursive } => {
            println!("🚀 ui-refine - 一括解析\n");

            println!("[1/3] スクリーンショットをスキャン中...");
            let images = scanner::scan_folder(&folder, recursive)?;
            println!("✔ {}枚の画像を検出\n", images.len());

            if images.is_empty() {
                return Err(error::UiRefineError::NoImagesFound(folder.display().to_string()));
            }

            let output_dir = output.unwrap_or_else(|| folder.clone());
            let pipeline = build_pipeline(&config)?;
            let options = BatchOptions {
                jobs,
                deadline: deadline_secs.map(Duration::from_secs),
                show_progress: true,
            };

            println!("[2/3] AI解析中... (同時{}件){}", jobs.max(1), if use_cache { " (キャッシュ有効)" } else { "" });
            let items = if use_cache {
                analyzer::analyze_images_with_cache(&pipeline, &images, &output_dir, &options).await?
            } else {
                analyzer::analyze_images(&pipeline, &images, &options).await
            };
            println!("✔ 解析完了\n");

            println!("[3/3] 結果を保存中...");
            let mut failed = 0;
            let mut degraded = 0;
            for item in &items {
                match &item.outcome {
                    Ok(result) => {
                        if result.degraded {
                            degraded += 1;
                        }
                        let (dir, stem) = export::batch_output_location(&folder, &item.info.path, &output_dir);
                        export::export_result(result, &item.info.file_name, &format, &dir, &stem)?;
                        println!("✔ {}{}", item.info.file_name, if item.from_cache { " (キャッシュ)" } else { "" });
                    }
                    Err(e) => {
                        failed += 1;
                        println!("✗ {}: {}", item.info.file_name, e);
                    }
                }
            }

            println!(
                "\n✅ 完了: {}件 (フォールバック {}件, 失敗 {}件) → {}",
                items.len() - failed,
                degraded,
                failed,
                output_dir.display()
            );
        }

        Commands::Import { file_key, node_id, output, format } => {
            println!("🎨 ui-refine - Figma取り込み\n");
            let figma_client = figma::FigmaClient::from_config(&config)?;
            let pipeline = build_pipeline(&config)?;

            println!("[1/3] ノード画像を取得中...");
            let input = figma::import_design(&figma_client, &file_key, node_id.as_deref()).await?;
            println!("✔ {} ({}, {} bytes)\n", input.name, input.mime_type, input.bytes.len());

            println!("[2/3] AI解析中...");
            let result = pipeline.run(&input).await;
            println!("✔ 解析完了\n");
            print_summary(&result);

            println!("\n[3/3] 結果を保存中...");
            let output_dir = output.unwrap_or_else(|| PathBuf::from("."));
            let source = format!("figma:{}/{}", file_key, input.name);
            let written = export::export_result(&result, &source, &format, &output_dir, &input.stem())?;
            print_written(&written);

            println!("\n✅ 完了");
        }

        Commands::Render { input, output } => {
            let result = export::load_result(&input)?;
            let output_path = output.unwrap_or_else(|| input.with_extension("html"));
            let title = input
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "ui-refine".to_string());
            export::write_html(&result, &title, &output_path)?;
            println!("✔ HTML出力: {}", output_path.display());
        }

        Commands::Config { set_api_key, set_figma_token, show } => {
            let mut config = config;

            if let Some(key) = set_api_key {
                config.set_api_key(key)?;
                println!("✔ APIキーを設定しました");
            }

            if let Some(token) = set_figma_token {
                config.set_figma_token(token)?;
                println!("✔ Figmaトークンを設定しました");
            }

            if show {
                println!("設定:");
                println!("  モデル: {}", config.model);
                println!("  temperature: {}", config.temperature);
                println!("  タイムアウト: {}秒", config.timeout_seconds);
                println!("  改善理由の上限: {}文字", config.reasoning_max_chars);
                println!("  APIキー: {}", if config.get_api_key().is_ok() { "設定済み" } else { "未設定" });
                println!("  Figmaトークン: {}", if config.get_figma_token().is_ok() { "設定済み" } else { "未設定" });
            }
        }

        Commands::Cache { folder, clear, info } => {
            let target = folder.unwrap_or_else(|| PathBuf::from("."));
            let cache_path = CacheFile::cache_path(&target);

            if info || !clear {
                // デフォルトまたは--info: 情報表示
                if cache_path.exists() {
                    let cache = CacheFile::load(&target);
                    println!("キャッシュ情報:");
                    println!("  パス: {}", cache_path.display());
                    println!("  件数: {}", cache.len());
                    if let Ok(meta) = std::fs::metadata(&cache_path) {
                        println!("  サイズ: {} bytes", meta.len());
                    }
                } else {
                    println!("キャッシュファイルが存在しません: {}", cache_path.display());
                }
            }

            if clear {
                match CacheFile::clear(&target) {
                    Ok(true) => println!("✔ キャッシュを削除しました: {}", cache_path.display()),
                    Ok(false) => println!("キャッシュファイルが存在しません"),
                    Err(e) => println!("キャッシュ削除エラー: {}", e),
                }
            }
        }
    }

    Ok(())
}
