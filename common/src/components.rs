//! コンポーネント生成（抽出段階の純粋ロジック）
//!
//! - モデル出力の項目から DetectedComponent への正規化
//! - 拒否応答の判定
//! - 簡易記述（位置・サイズの言葉）からの生成
//! - キーワード出現からの合成
//! - 静的フォールバック
//!
//! どの経路で作ったコンポーネントも BoundingBox の不変条件に丸めてから返す。

use crate::parser::{recover_payload, COMPONENTS_SHAPE};
use crate::prompts::REFUSAL_PHRASES;
use crate::types::{
    value_to_f64, value_to_string, BoundingBox, ComponentAttributes, ComponentKind, DetectedComponent,
};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashSet;

/// 合成コンポーネントの confidence
pub const SYNTHETIC_CONFIDENCE: f64 = 0.5;

/// 位置の言葉 → 左上座標（%）
const POSITION_TABLE: &[(&str, (f64, f64))] = &[
    ("top-left", (10.0, 10.0)),
    ("top", (40.0, 10.0)),
    ("top-right", (70.0, 10.0)),
    ("left", (10.0, 40.0)),
    ("center", (40.0, 40.0)),
    ("right", (70.0, 40.0)),
    ("bottom-left", (10.0, 75.0)),
    ("bottom", (40.0, 75.0)),
    ("bottom-right", (70.0, 75.0)),
];

/// サイズの言葉 → 幅・高さ（%）
const SIZE_TABLE: &[(&str, (f64, f64))] = &[
    ("small", (20.0, 8.0)),
    ("medium", (40.0, 15.0)),
    ("large", (60.0, 30.0)),
];

/// キーワード合成のルール
struct KeywordRule {
    keyword: &'static str,
    kind: ComponentKind,
    max_count: usize,
}

fn keyword_rules() -> [KeywordRule; 5] {
    [
        KeywordRule { keyword: "button", kind: ComponentKind::Button, max_count: 3 },
        KeywordRule { keyword: "input", kind: ComponentKind::Input, max_count: 3 },
        KeywordRule { keyword: "card", kind: ComponentKind::Card, max_count: 3 },
        KeywordRule { keyword: "header", kind: ComponentKind::Header, max_count: 1 },
        KeywordRule { keyword: "navigation", kind: ComponentKind::Navigation, max_count: 1 },
    ]
}

// =============================================
// 拒否判定
// =============================================

/// モデルの応答が拒否かどうか（フレーズ一致による推定）
pub fn is_refusal(response: &str) -> bool {
    let normalized = response.to_lowercase().replace('\u{2019}', "'");
    REFUSAL_PHRASES.iter().any(|phrase| normalized.contains(phrase))
}

// =============================================
// 位置・サイズの対応表
// =============================================

fn normalize_descriptor(descriptor: &str) -> String {
    let lowered = descriptor.trim().to_lowercase().replace([' ', '_'], "-");
    let replaced = lowered
        .replace("upper", "top")
        .replace("lower", "bottom")
        .replace("middle", "center")
        .replace("centre", "center");
    match replaced.as_str() {
        "top-center" | "center-top" => "top".to_string(),
        "bottom-center" | "center-bottom" => "bottom".to_string(),
        "center-left" | "left-center" => "left".to_string(),
        "center-right" | "right-center" => "right".to_string(),
        "left-top" => "top-left".to_string(),
        "right-top" => "top-right".to_string(),
        "left-bottom" => "bottom-left".to_string(),
        "right-bottom" => "bottom-right".to_string(),
        _ => replaced,
    }
}

/// 位置の言葉から左上座標を引く（不明なら中央）
pub fn position_origin(descriptor: &str) -> (f64, f64) {
    let key = normalize_descriptor(descriptor);
    POSITION_TABLE
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, origin)| *origin)
        .unwrap_or((40.0, 40.0))
}

/// サイズの言葉から幅・高さを引く（不明なら medium）
pub fn size_extent(descriptor: &str) -> (f64, f64) {
    let key = match descriptor.trim().to_lowercase().as_str() {
        "s" | "sm" | "tiny" | "little" => "small".to_string(),
        "m" | "md" | "mid" | "normal" | "regular" => "medium".to_string(),
        "l" | "lg" | "big" | "huge" | "wide" | "full" => "large".to_string(),
        other => other.to_string(),
    };
    SIZE_TABLE
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, extent)| *extent)
        .unwrap_or((40.0, 15.0))
}

fn box_from_descriptors(position: Option<&str>, size: Option<&str>) -> BoundingBox {
    let (x, y) = position.map(position_origin).unwrap_or((40.0, 40.0));
    let (width, height) = size.map(size_extent).unwrap_or((40.0, 15.0));
    BoundingBox::new(x, y, width, height)
}

// =============================================
// モデル出力の正規化
// =============================================

fn first_value<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| map.get(*key).filter(|v| !v.is_null()))
}

fn first_string(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| map.get(*key).and_then(value_to_string))
}

fn bounding_box_from(map: &Map<String, Value>) -> BoundingBox {
    let position = first_string(map, &["position", "location"]);
    let size = first_string(map, &["size"]);
    let (default_w, default_h) = size.as_deref().map(size_extent).unwrap_or((40.0, 15.0));

    match first_value(map, &["boundingBox", "bounding_box", "bbox", "bounds"]) {
        Some(Value::Object(bbox)) => {
            let number = |keys: &[&str]| first_value(bbox, keys).and_then(value_to_f64);
            BoundingBox::new(
                number(&["x", "left"]).unwrap_or(0.0),
                number(&["y", "top"]).unwrap_or(0.0),
                number(&["width", "w"]).unwrap_or(default_w),
                number(&["height", "h"]).unwrap_or(default_h),
            )
        }
        Some(Value::Array(values)) if values.len() == 4 => {
            let n: Vec<f64> = values.iter().map(|v| value_to_f64(v).unwrap_or(0.0)).collect();
            BoundingBox::new(n[0], n[1], n[2], n[3])
        }
        _ => box_from_descriptors(position.as_deref(), size.as_deref()),
    }
}

/// 項目直下に書かれた属性（簡易記述形式）
fn flat_attributes(map: &Map<String, Value>) -> ComponentAttributes {
    ComponentAttributes {
        background_color: first_string(map, &["backgroundColor", "background", "background color"]),
        text_color: first_string(map, &["textColor", "text color", "color"]),
        text: first_string(map, &["text", "label"]),
        ..Default::default()
    }
}

/// 1項目を DetectedComponent に変換（オブジェクト以外は None）
pub fn component_from_value(value: &Value) -> Option<DetectedComponent> {
    let map = value.as_object()?;

    let kind = first_string(map, &["type", "component", "kind"]).unwrap_or_else(|| "unknown".to_string());
    let nested = ComponentAttributes::from_value(map.get("attributes"));
    let attributes = flat_attributes(map).overlaid_with(&nested);
    let confidence = first_value(map, &["confidence"])
        .and_then(value_to_f64)
        .unwrap_or(crate::types::DEFAULT_CONFIDENCE);

    let id = first_string(map, &["id"]).unwrap_or_default();

    Some(
        DetectedComponent::new(id, kind.as_str(), bounding_box_from(map), attributes)
            .with_confidence(confidence),
    )
}

/// 未設定・重複したIDを `component-{n}` に振り直す
fn assign_unique_ids(components: &mut [DetectedComponent]) {
    let mut seen = HashSet::new();
    for (index, component) in components.iter_mut().enumerate() {
        if component.id.is_empty() || seen.contains(&component.id) {
            let mut candidate = format!("component-{}", index + 1);
            let mut suffix = 1;
            while seen.contains(&candidate) {
                suffix += 1;
                candidate = format!("component-{}-{}", index + 1, suffix);
            }
            component.id = candidate;
        }
        seen.insert(component.id.clone());
    }
}

/// 復元済み項目からコンポーネント一覧を作る
pub fn components_from_items(items: &[Value]) -> Vec<DetectedComponent> {
    let mut components: Vec<DetectedComponent> = items.iter().filter_map(component_from_value).collect();
    assign_unique_ids(&mut components);
    components
}

// =============================================
// 簡易記述
// =============================================

/// 1行の `key: value | key: value` を読み取る
fn fields_from_line(line: &str) -> Map<String, Value> {
    lazy_static::lazy_static! {
        static ref FIELD_RE: Regex = Regex::new(
            r"(?i)\b(type|component|position|location|size|background(?:[ _-]?colou?r)?|text[ _-]?colou?r|colou?r|text|label)\s*[:=]\s*([^|;\n]+)"
        ).unwrap();
    }

    let mut fields = Map::new();
    for cap in FIELD_RE.captures_iter(line) {
        let key = cap[1].to_lowercase().replace(['_', '-'], " ").replace("colour", "color");
        let key = match key.as_str() {
            "component" => "type".to_string(),
            "location" => "position".to_string(),
            "background" | "background color" | "backgroundcolor" => "background".to_string(),
            "text color" | "textcolor" | "color" => "text color".to_string(),
            "label" => "text".to_string(),
            other => other.to_string(),
        };
        let value = cap[2].trim().trim_matches(|c: char| c == '"' || c == '\'' || c == ',').trim();
        if !value.is_empty() && !fields.contains_key(&key) {
            fields.insert(key, Value::String(value.to_string()));
        }
    }
    fields
}

/// 簡易記述の応答からコンポーネントを作る
///
/// 構造化ペイロードとして読めればそれを使い、だめなら1行ずつ読む。
pub fn components_from_description(response: &str) -> Vec<DetectedComponent> {
    let recovered = recover_payload(response, COMPONENTS_SHAPE);
    if !recovered.items.is_empty() {
        return components_from_items(&recovered.items);
    }

    let items: Vec<Value> = response
        .lines()
        .map(fields_from_line)
        .filter(|fields| fields.contains_key("type"))
        .map(Value::Object)
        .collect();

    components_from_items(&items)
}

// =============================================
// キーワード合成
// =============================================

fn keyword_box(kind: &ComponentKind, index: usize) -> BoundingBox {
    let i = index as f64;
    match kind {
        ComponentKind::Header => BoundingBox::new(0.0, 0.0, 100.0, 10.0),
        ComponentKind::Navigation => BoundingBox::new(0.0, 10.0, 100.0, 8.0),
        ComponentKind::Button => BoundingBox::new(10.0 + 25.0 * i, 85.0, 20.0, 8.0),
        ComponentKind::Input => BoundingBox::new(10.0, 25.0 + 12.0 * i, 60.0, 8.0),
        ComponentKind::Card => BoundingBox::new(5.0 + 32.0 * i, 50.0, 28.0, 30.0),
        _ => BoundingBox::new(40.0, 40.0, 40.0, 15.0),
    }
}

/// 記述テキスト中のキーワード出現からコンポーネントを合成
///
/// 種別ごとに上限件数までしか作らない。
pub fn components_from_keywords(text: &str) -> Vec<DetectedComponent> {
    let lowered = text.to_lowercase();
    let mut components = Vec::new();

    for rule in keyword_rules() {
        let count = lowered.matches(rule.keyword).count().min(rule.max_count);
        for index in 0..count {
            components.push(
                DetectedComponent::new(
                    format!("{}-{}", rule.keyword, index + 1),
                    rule.kind.clone(),
                    keyword_box(&rule.kind, index),
                    ComponentAttributes::default(),
                )
                .with_confidence(SYNTHETIC_CONFIDENCE),
            );
        }
    }

    components
}

// =============================================
// 静的フォールバック
// =============================================

fn labeled(text: &str) -> ComponentAttributes {
    ComponentAttributes {
        text: Some(text.to_string()),
        ..Default::default()
    }
}

/// 最終フォールバックの固定5コンポーネント
pub fn fallback_components() -> Vec<DetectedComponent> {
    vec![
        DetectedComponent::new("fallback-header", ComponentKind::Header, BoundingBox::new(0.0, 0.0, 100.0, 10.0), labeled("Header")),
        DetectedComponent::new("fallback-primary-action", ComponentKind::Button, BoundingBox::new(10.0, 80.0, 35.0, 8.0), labeled("Primary Action")),
        DetectedComponent::new("fallback-secondary-action", ComponentKind::Button, BoundingBox::new(55.0, 80.0, 35.0, 8.0), labeled("Secondary Action")),
        DetectedComponent::new("fallback-text-field", ComponentKind::Input, BoundingBox::new(10.0, 18.0, 80.0, 8.0), labeled("Enter text")),
        DetectedComponent::new("fallback-content-card", ComponentKind::Card, BoundingBox::new(10.0, 32.0, 80.0, 40.0), ComponentAttributes::default()),
    ]
    .into_iter()
    .map(|c| c.with_confidence(SYNTHETIC_CONFIDENCE))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn assert_clamped(components: &[DetectedComponent]) {
        for c in components {
            assert!(c.bounding_box.is_within_bounds(), "範囲外: {:?}", c);
            assert!((0.0..=1.0).contains(&c.confidence));
        }
    }

    // =============================================
    // 拒否判定
    // =============================================

    #[test]
    fn test_is_refusal() {
        assert!(is_refusal("I'm unable to help with that."));
        assert!(is_refusal("I\u{2019}m unable to view this"));
        assert!(is_refusal("Sorry, I CANNOT ANALYZE this picture."));
        assert!(is_refusal("I am unable to analyze images at the moment"));
        assert!(!is_refusal("{\"components\": []}"));
    }

    // =============================================
    // 対応表
    // =============================================

    #[test]
    fn test_position_origin_table() {
        assert_eq!(position_origin("top-left"), (10.0, 10.0));
        assert_eq!(position_origin("Top Left"), (10.0, 10.0));
        assert_eq!(position_origin("upper_right"), (70.0, 10.0));
        assert_eq!(position_origin("middle"), (40.0, 40.0));
        assert_eq!(position_origin("bottom center"), (40.0, 75.0));
        assert_eq!(position_origin("somewhere"), (40.0, 40.0));
    }

    #[test]
    fn test_size_extent_table() {
        assert_eq!(size_extent("large"), (60.0, 30.0));
        assert_eq!(size_extent("SM"), (20.0, 8.0));
        assert_eq!(size_extent("???"), (40.0, 15.0));
    }

    // =============================================
    // 正規化
    // =============================================

    #[test]
    fn test_component_from_value_clamps() {
        let component = component_from_value(&json!({
            "id": "c1",
            "type": "button",
            "confidence": 3,
            "boundingBox": {"x": -10, "y": "105%", "width": 0, "height": 400}
        }))
        .unwrap();
        assert_eq!(component.bounding_box, BoundingBox { x: 0.0, y: 100.0, width: 1.0, height: 100.0 });
        assert_eq!(component.confidence, 1.0);
    }

    #[test]
    fn test_component_from_value_defaults() {
        let component = component_from_value(&json!({"type": "card"})).unwrap();
        assert_eq!(component.kind, ComponentKind::Card);
        assert_eq!(component.confidence, 0.9);
        assert_eq!(component.bounding_box, BoundingBox::new(40.0, 40.0, 40.0, 15.0));
        assert!(component_from_value(&json!("button")).is_none());
    }

    #[test]
    fn test_component_from_value_descriptors() {
        let component = component_from_value(&json!({
            "type": "button",
            "position": "top-left",
            "size": "large",
            "background": "#2563eb",
            "text": "Go"
        }))
        .unwrap();
        assert_eq!(component.bounding_box, BoundingBox::new(10.0, 10.0, 60.0, 30.0));
        assert_eq!(component.attributes.background_color.as_deref(), Some("#2563eb"));
        assert_eq!(component.attributes.text.as_deref(), Some("Go"));
    }

    #[test]
    fn test_component_from_value_nested_attributes_win() {
        let component = component_from_value(&json!({
            "type": "button",
            "text": "flat",
            "attributes": {"text": "nested"}
        }))
        .unwrap();
        assert_eq!(component.attributes.text.as_deref(), Some("nested"));
    }

    #[test]
    fn test_components_from_items_unique_ids() {
        let items = vec![
            json!({"id": "a", "type": "button"}),
            json!({"id": "a", "type": "input"}),
            json!({"type": "card"}),
            json!(42),
        ];
        let components = components_from_items(&items);
        let ids: Vec<&str> = components.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "component-2", "component-3"]);
    }

    // =============================================
    // 簡易記述
    // =============================================

    #[test]
    fn test_components_from_description_lines() {
        let response = "Here is what I see:\n\
            type: header | position: top | size: large | background: #ffffff | text: Welcome\n\
            type: button | position: bottom-right | size: small | text color: #fff | text: Sign in\n\
            Nothing else.";
        let components = components_from_description(response);
        assert_eq!(components.len(), 2);
        assert_eq!(components[0].kind, ComponentKind::Header);
        assert_eq!(components[0].bounding_box, BoundingBox::new(40.0, 10.0, 60.0, 30.0));
        assert_eq!(components[0].attributes.text.as_deref(), Some("Welcome"));
        assert_eq!(components[1].bounding_box, BoundingBox::new(70.0, 75.0, 20.0, 8.0));
        assert_eq!(components[1].attributes.text_color.as_deref(), Some("#fff"));
        assert_eq!(components[1].attributes.text.as_deref(), Some("Sign in"));
        assert_clamped(&components);
    }

    #[test]
    fn test_components_from_description_json() {
        let response = "[{\"type\": \"input\", \"position\": \"center\", \"size\": \"medium\"}]";
        let components = components_from_description(response);
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].bounding_box, BoundingBox::new(40.0, 40.0, 40.0, 15.0));
    }

    #[test]
    fn test_components_from_description_nothing() {
        assert!(components_from_description("The screenshot shows a login form.").is_empty());
    }

    // =============================================
    // キーワード合成
    // =============================================

    #[test]
    fn test_components_from_keywords_bounded() {
        let text = "A header, a navigation bar, button button button button button, an input and a card.";
        let components = components_from_keywords(text);
        let count = |kind: ComponentKind| components.iter().filter(|c| c.kind == kind).count();
        assert_eq!(count(ComponentKind::Button), 3);
        assert_eq!(count(ComponentKind::Input), 1);
        assert_eq!(count(ComponentKind::Card), 1);
        assert_eq!(count(ComponentKind::Header), 1);
        assert_eq!(count(ComponentKind::Navigation), 1);
        assert_clamped(&components);
    }

    #[test]
    fn test_components_from_keywords_none() {
        assert!(components_from_keywords("a photo of a cat").is_empty());
    }

    // =============================================
    // 静的フォールバック
    // =============================================

    #[test]
    fn test_fallback_components() {
        let components = fallback_components();
        assert_eq!(components.len(), 5);
        let kinds: Vec<&str> = components.iter().map(|c| c.kind.as_str()).collect();
        assert_eq!(kinds, vec!["header", "button", "button", "input", "card"]);
        assert_clamped(&components);
    }
}
