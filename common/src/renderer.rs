//! 決定的レンダラー
//!
//! コンポーネントと改善提案から、元の配置を再現した絶対配置ボックスの一覧を作る。
//! 入力がどんな状態でも失敗しない。

use crate::types::{BoundingBox, DetectedComponent, ImprovementSuggestion};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const DEFAULT_BACKGROUND: &str = "#ffffff";
const DEFAULT_TEXT_COLOR: &str = "#1f2937";
const DEFAULT_RADIUS: &str = "4px";
const DEFAULT_FONT_SIZE: &str = "14px";
const DEFAULT_PADDING: &str = "8px";
const DEFAULT_FONT_WEIGHT: &str = "normal";
const DEFAULT_BORDER: &str = "none";
const DEFAULT_SHADOW: &str = "none";

/// 1コンポーネント分の描画指示（位置・サイズは %）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedBox {
    pub component_id: String,
    pub component_type: String,
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    pub background_color: String,
    pub text_color: String,
    pub border_radius: String,
    pub font_size: String,
    pub padding: String,
    pub font_weight: String,
    pub border: String,
    pub box_shadow: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

/// 描画結果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderedReport {
    pub boxes: Vec<RenderedBox>,
}

/// 数値だけの長さに px を付ける（"8 16" → "8px 16px"）
pub fn with_px_units(value: &str) -> String {
    value
        .split_whitespace()
        .map(|token| {
            if token.parse::<f64>().is_ok() {
                format!("{}px", token)
            } else {
                token.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn or_default(value: &Option<String>, default: &str) -> String {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
        .to_string()
}

fn render_box(component: &DetectedComponent, suggestion: Option<&ImprovementSuggestion>) -> RenderedBox {
    let merged = match suggestion {
        Some(s) => component.attributes.overlaid_with(&s.improvements),
        None => component.attributes.clone(),
    };
    let BoundingBox { x, y, width, height } = component.bounding_box.clamped();

    RenderedBox {
        component_id: component.id.clone(),
        component_type: component.kind.as_str().to_string(),
        left: x,
        top: y,
        width,
        height,
        background_color: or_default(&merged.background_color, DEFAULT_BACKGROUND),
        text_color: or_default(&merged.text_color, DEFAULT_TEXT_COLOR),
        border_radius: with_px_units(&or_default(&merged.border_radius, DEFAULT_RADIUS)),
        font_size: with_px_units(&or_default(&merged.font_size, DEFAULT_FONT_SIZE)),
        padding: with_px_units(&or_default(&merged.padding, DEFAULT_PADDING)),
        font_weight: or_default(&merged.font_weight, DEFAULT_FONT_WEIGHT),
        border: or_default(&merged.border, DEFAULT_BORDER),
        box_shadow: or_default(&merged.box_shadow, DEFAULT_SHADOW),
        text: merged.text.clone(),
        reasoning: suggestion
            .map(|s| s.reasoning.clone())
            .filter(|r| !r.is_empty()),
    }
}

/// コンポーネントと提案から描画結果を作る
///
/// 提案の値を優先し、なければ元の属性、どちらもなければ既定値を使う。
/// 位置とサイズは常に元の bounding box から取る。
pub fn render_report(
    components: &[DetectedComponent],
    suggestions: &[ImprovementSuggestion],
) -> RenderedReport {
    let mut by_id: HashMap<&str, &ImprovementSuggestion> = HashMap::new();
    for suggestion in suggestions {
        by_id.entry(suggestion.component_id.as_str()).or_insert(suggestion);
    }

    RenderedReport {
        boxes: components
            .iter()
            .map(|component| render_box(component, by_id.get(component.id.as_str()).copied()))
            .collect(),
    }
}

/// HTMLエスケープ
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// style属性に入れる値（宣言の区切りになる文字は落とす）
fn css_value(value: &str) -> String {
    let cleaned: String = value.chars().filter(|c| !matches!(c, ';' | '{' | '}')).collect();
    escape_html(cleaned.trim())
}

impl RenderedBox {
    fn style(&self) -> String {
        format!(
            "left:{}%;top:{}%;width:{}%;height:{}%;background-color:{};color:{};border-radius:{};font-size:{};padding:{};font-weight:{};border:{};box-shadow:{}",
            self.left,
            self.top,
            self.width,
            self.height,
            css_value(&self.background_color),
            css_value(&self.text_color),
            css_value(&self.border_radius),
            css_value(&self.font_size),
            css_value(&self.padding),
            css_value(&self.font_weight),
            css_value(&self.border),
            css_value(&self.box_shadow),
        )
    }
}

impl RenderedReport {
    /// 単体で開けるHTMLページを生成
    pub fn to_html(&self, title: &str) -> String {
        let mut html = String::new();
        html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
        html.push_str(&format!("<title>{}</title>\n", escape_html(title)));
        html.push_str(
            "<style>\n\
             body{margin:0;padding:24px;font-family:system-ui,sans-serif;background:#f3f4f6}\n\
             .canvas{position:relative;width:100%;max-width:1200px;aspect-ratio:16/10;margin:0 auto;background:#fff;box-shadow:0 1px 4px rgba(0,0,0,.15);overflow:hidden}\n\
             .box{position:absolute;box-sizing:border-box;overflow:hidden;display:flex;align-items:center;justify-content:center}\n\
             </style>\n</head>\n<body>\n",
        );
        html.push_str(&format!("<h1>{}</h1>\n<div class=\"canvas\">\n", escape_html(title)));

        for b in &self.boxes {
            html.push_str(&format!(
                "<div class=\"box\" data-component-id=\"{}\" data-type=\"{}\"",
                escape_html(&b.component_id),
                escape_html(&b.component_type),
            ));
            if let Some(reasoning) = &b.reasoning {
                html.push_str(&format!(" title=\"{}\"", escape_html(reasoning)));
            }
            html.push_str(&format!(
                " style=\"{}\">{}</div>\n",
                b.style(),
                escape_html(b.text.as_deref().unwrap_or("")),
            ));
        }

        html.push_str("</div>\n</body>\n</html>\n");
        html
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ComponentAttributes, SuggestionSource};

    fn component(id: &str, attributes: ComponentAttributes) -> DetectedComponent {
        DetectedComponent::new(id, "button", BoundingBox::new(10.0, 20.0, 30.0, 8.0), attributes)
    }

    fn suggestion(id: &str, improvements: ComponentAttributes) -> ImprovementSuggestion {
        ImprovementSuggestion {
            component_id: id.to_string(),
            improvements,
            reasoning: "better".to_string(),
            source: SuggestionSource::Model,
        }
    }

    #[test]
    fn test_render_empty() {
        assert!(render_report(&[], &[]).boxes.is_empty());
    }

    #[test]
    fn test_render_defaults_without_suggestion() {
        let report = render_report(&[component("c1", ComponentAttributes::default())], &[]);
        let b = &report.boxes[0];
        assert_eq!(b.background_color, "#ffffff");
        assert_eq!(b.text_color, "#1f2937");
        assert_eq!(b.border_radius, "4px");
        assert_eq!(b.font_size, "14px");
        assert_eq!(b.padding, "8px");
        assert_eq!(b.font_weight, "normal");
        assert_eq!(b.border, "none");
        assert_eq!(b.box_shadow, "none");
        assert!(b.reasoning.is_none());
    }

    #[test]
    fn test_render_overlay_field_by_field() {
        let original = ComponentAttributes {
            background_color: Some("#cccccc".into()),
            text_color: Some("#333333".into()),
            text: Some("Go".into()),
            ..Default::default()
        };
        let improved = ComponentAttributes {
            background_color: Some("#2563eb".into()),
            border_radius: Some("8".into()),
            padding: Some("12 24".into()),
            ..Default::default()
        };
        let report = render_report(&[component("c1", original)], &[suggestion("c1", improved)]);
        let b = &report.boxes[0];
        assert_eq!(b.background_color, "#2563eb");
        assert_eq!(b.text_color, "#333333");
        assert_eq!(b.border_radius, "8px");
        assert_eq!(b.padding, "12px 24px");
        assert_eq!(b.text.as_deref(), Some("Go"));
        assert_eq!(b.reasoning.as_deref(), Some("better"));
    }

    #[test]
    fn test_render_geometry_from_original_box() {
        let mut c = component("c1", ComponentAttributes::default());
        // 直接書き換えても描画時に丸める
        c.bounding_box.width = -5.0;
        let report = render_report(&[c], &[]);
        let b = &report.boxes[0];
        assert_eq!((b.left, b.top, b.width, b.height), (10.0, 20.0, 1.0, 8.0));
    }

    #[test]
    fn test_with_px_units() {
        assert_eq!(with_px_units("8"), "8px");
        assert_eq!(with_px_units("1.5"), "1.5px");
        assert_eq!(with_px_units("8px 16"), "8px 16px");
        assert_eq!(with_px_units("1rem"), "1rem");
    }

    #[test]
    fn test_to_html_escapes() {
        let original = ComponentAttributes {
            text: Some("<script>alert('x')</script>".into()),
            background_color: Some("red;position:fixed".into()),
            ..Default::default()
        };
        let html = render_report(&[component("c1", original)], &[]).to_html("A & B");
        assert!(html.contains("<title>A &amp; B</title>"));
        assert!(html.contains("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("background-color:redposition:fixed"));
        assert!(html.contains("left:10%;top:20%;width:30%;height:8%"));
        assert!(html.contains("data-component-id=\"c1\""));
    }
}
