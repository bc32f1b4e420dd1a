use crate::error::{Result, UiRefineError};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// フォルダ内のスクリーンショット
#[derive(Debug, Clone)]
pub struct ImageInfo {
    pub path: PathBuf,
    pub file_name: String,
    pub file_size: u64,
}

/// モデルに渡す画像（バイト列はそのまま転送する）
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub name: String,
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImageInput {
    /// バイト列から形式を判定して生成
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self> {
        let name = name.into();
        let format = image::guess_format(&bytes)
            .map_err(|e| UiRefineError::ImageLoad(format!("{}: {}", name, e)))?;
        Ok(Self {
            name,
            bytes,
            mime_type: format.to_mime_type().to_string(),
        })
    }

    /// MIMEタイプを指定して生成（形式が分かっている場合）
    pub fn with_mime_type(name: impl Into<String>, bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bytes,
            mime_type: mime_type.into(),
        }
    }

    /// 出力ファイル名に使う語幹
    pub fn stem(&self) -> String {
        Path::new(&self.name)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "result".to_string())
    }
}

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

fn is_image_extension(ext: &str) -> bool {
    IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
}

/// 画像ファイルを読み込む
pub fn load_image(path: &Path) -> Result<ImageInput> {
    if !path.is_file() {
        return Err(UiRefineError::FileNotFound(path.display().to_string()));
    }

    let bytes = std::fs::read(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    ImageInput::from_bytes(name, bytes)
}

pub fn scan_folder(folder: &Path, recursive: bool) -> Result<Vec<ImageInfo>> {
    if !folder.is_dir() {
        return Err(UiRefineError::FolderNotFound(folder.display().to_string()));
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut images = Vec::new();

    for entry in WalkDir::new(folder)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        let matches = path
            .extension()
            .map(|ext| is_image_extension(&ext.to_string_lossy()))
            .unwrap_or(false);
        if !matches {
            continue;
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let file_size = entry.metadata().map(|m| m.len()).unwrap_or(0);

        images.push(ImageInfo {
            path: path.to_path_buf(),
            file_name,
            file_size,
        });
    }

    // ファイル名でソート
    images.sort_by(|a, b| a.file_name.cmp(&b.file_name));

    Ok(images)
}
