//! JSON/HTML出力の統合テスト

use tempfile::tempdir;
use ui_refine::cli::ExportFormat;
use ui_refine::export::{batch_output_location, export_result, load_result, write_html, ExportDocument};
use ui_refine::scanner;
use ui_refine_common::{
    BoundingBox, ComponentAttributes, ComponentKind, DetectedComponent, Improvements,
    PipelineResult, StageOutcome,
};

fn create_test_result() -> PipelineResult {
    let attributes = ComponentAttributes {
        text: Some("<Sign in>".to_string()),
        ..Default::default()
    };
    let components = vec![DetectedComponent::new(
        "login-button",
        ComponentKind::from("button"),
        BoundingBox::new(10.0, 80.0, 30.0, 8.0),
        attributes,
    )];
    PipelineResult::assemble(
        StageOutcome::Complete(components),
        StageOutcome::Complete(Improvements::default()),
    )
}

#[test]
fn test_export_json_only() {
    let dir = tempdir().expect("Failed to create temp dir");
    let result = create_test_result();

    let written = export_result(&result, "login.png", &ExportFormat::Json, dir.path(), "login")
        .expect("JSON出力に失敗");

    assert_eq!(written, vec![dir.path().join("login.json")]);
    let content = std::fs::read_to_string(&written[0]).unwrap();
    let document: ExportDocument = serde_json::from_str(&content).expect("JSONとして読めない");
    assert_eq!(document.source, "login.png");
    assert_eq!(document.result, result);
    assert!(!document.exported_at.is_empty());
}

#[test]
fn test_export_both_formats() {
    let dir = tempdir().expect("Failed to create temp dir");
    let output_dir = dir.path().join("nested").join("out");

    let written = export_result(&create_test_result(), "login.png", &ExportFormat::Both, &output_dir, "login")
        .expect("出力に失敗");

    assert_eq!(written.len(), 2);
    assert!(written.iter().all(|p| p.exists()), "ファイルが作成されていない");
}

#[test]
fn test_html_escapes_text() {
    let dir = tempdir().expect("Failed to create temp dir");
    let written = export_result(&create_test_result(), "<login>", &ExportFormat::Html, dir.path(), "login")
        .expect("HTML出力に失敗");

    let html = std::fs::read_to_string(&written[0]).unwrap();
    assert!(html.contains("&lt;Sign in&gt;"));
    assert!(html.contains("<title>&lt;login&gt;</title>"));
    assert!(html.contains("data-component-id=\"login-button\""));
    assert!(!html.contains("<Sign in>"));
}

#[test]
fn test_load_result_accepts_both_shapes() {
    let dir = tempdir().expect("Failed to create temp dir");
    let result = create_test_result();

    // 出力文書
    let written = export_result(&result, "login.png", &ExportFormat::Json, dir.path(), "doc").unwrap();
    assert_eq!(load_result(&written[0]).unwrap(), result);

    // 素の結果
    let bare = dir.path().join("bare.json");
    std::fs::write(&bare, serde_json::to_string(&result).unwrap()).unwrap();
    assert_eq!(load_result(&bare).unwrap(), result);
}

#[test]
fn test_load_result_rejects_garbage() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{\"foo\": 1}").unwrap();

    assert!(load_result(&path).is_err());
}

#[test]
fn test_write_html_is_deterministic() {
    let dir = tempdir().expect("Failed to create temp dir");
    let first = dir.path().join("a.html");
    let second = dir.path().join("b.html");
    let result = create_test_result();

    write_html(&result, "same", &first).unwrap();
    write_html(&result, "same", &second).unwrap();

    assert_eq!(std::fs::read(&first).unwrap(), std::fs::read(&second).unwrap());
}

#[test]
fn test_batch_output_keeps_subfolders_apart() {
    let dir = tempdir().expect("Failed to create temp dir");
    let folder = dir.path().join("shots");
    let output_dir = dir.path().join("out");
    for sub in ["a", "b"] {
        std::fs::create_dir_all(folder.join(sub)).unwrap();
        std::fs::write(folder.join(sub).join("x.png"), b"png").unwrap();
    }
    std::fs::write(folder.join("top.png"), b"png").unwrap();

    let images = scanner::scan_folder(&folder, true).unwrap();
    assert_eq!(images.len(), 3);

    let result = create_test_result();
    let mut written = Vec::new();
    for info in &images {
        let (target, stem) = batch_output_location(&folder, &info.path, &output_dir);
        written.extend(export_result(&result, &info.file_name, &ExportFormat::Json, &target, &stem).unwrap());
    }

    written.sort();
    assert_eq!(
        written,
        vec![
            output_dir.join("a").join("x.json"),
            output_dir.join("b").join("x.json"),
            output_dir.join("top.json"),
        ]
    );
    assert!(written.iter().all(|p| p.exists()));
}

#[test]
fn test_batch_output_outside_folder_uses_output_root() {
    let (target, stem) = batch_output_location(
        std::path::Path::new("/shots"),
        std::path::Path::new("/elsewhere/deep/y.jpg"),
        std::path::Path::new("/out"),
    );
    assert_eq!(target, std::path::PathBuf::from("/out"));
    assert_eq!(stem, "y");
}
