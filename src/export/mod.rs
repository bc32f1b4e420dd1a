use crate::cli::ExportFormat;
use crate::error::Result;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use ui_refine_common::PipelineResult;

/// JSON出力の文書
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub exported_at: String,
    /// 入力元（ファイル名・Figmaノード）
    pub source: String,
    pub result: PipelineResult,
}

impl ExportDocument {
    pub fn new(source: impl Into<String>, result: PipelineResult) -> Self {
        Self {
            exported_at: Local::now().to_rfc3339(),
            source: source.into(),
            result,
        }
    }
}

/// 保存済みJSONから結果を読む（ExportDocument と素の PipelineResult の両方を受け付ける）
pub fn load_result(path: &Path) -> Result<PipelineResult> {
    let content = std::fs::read_to_string(path)?;
    if let Ok(document) = serde_json::from_str::<ExportDocument>(&content) {
        return Ok(document.result);
    }
    Ok(PipelineResult::from_json(&content)?)
}

pub fn write_html(result: &PipelineResult, title: &str, output_path: &Path) -> Result<()> {
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(output_path, result.report.to_html(title))?;
    Ok(())
}

/// 一括解析の出力先とファイル名（拡張子なし）
///
/// スキャンしたフォルダからの相対ディレクトリを出力先にも作る。
/// `folder/a/x.png` → (`output_dir/a`, `x`)
pub fn batch_output_location(folder: &Path, image_path: &Path, output_dir: &Path) -> (PathBuf, String) {
    let stem = image_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "result".to_string());

    let dir = match image_path.strip_prefix(folder).ok().and_then(Path::parent) {
        Some(parent) if !parent.as_os_str().is_empty() => output_dir.join(parent),
        _ => output_dir.to_path_buf(),
    };
    (dir, stem)
}

/// 結果を出力ディレクトリに書き出し、書いたファイルを返す
pub fn export_result(
    result: &PipelineResult,
    source: &str,
    format: &ExportFormat,
    output_dir: &Path,
    stem: &str,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)?;
    let mut written = Vec::new();

    if matches!(format, ExportFormat::Json | ExportFormat::Both) {
        let json_path = output_dir.join(format!("{}.json", stem));
        let document = ExportDocument::new(source, result.clone());
        std::fs::write(&json_path, serde_json::to_string_pretty(&document)?)?;
        written.push(json_path);
    }

    if matches!(format, ExportFormat::Html | ExportFormat::Both) {
        let html_path = output_dir.join(format!("{}.html", stem));
        write_html(result, source, &html_path)?;
        written.push(html_path);
    }

    Ok(written)
}
