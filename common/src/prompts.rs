//! プロンプト生成モジュール
//!
//! - build_extraction_prompt: コンポーネント抽出用
//! - build_loose_extraction_prompt: 抽出失敗時の簡易記述用
//! - build_improvement_prompt: 改善提案用

use crate::types::{BoundingBox, DetectedComponent};
use serde::Serialize;

/// 拒否とみなす応答フレーズ（小文字）
pub const REFUSAL_PHRASES: &[&str] = &[
    "unable to analyze images",
    "cannot analyze",
    "i'm unable to",
];

/// 抽出プロンプト生成
pub fn build_extraction_prompt() -> String {
    r##"You are a UI analysis engine. Decompose the attached screenshot into its visible UI components.

## Output format (strictly this JSON, nothing else)
{
  "components": [
    {
      "id": "c1",
      "type": "button | input | card | header | navigation | text | image | icon | container | ...",
      "confidence": 0.0-1.0,
      "boundingBox": { "x": 0-100, "y": 0-100, "width": 0-100, "height": 0-100 },
      "attributes": {
        "backgroundColor": "#RRGGBB",
        "textColor": "#RRGGBB",
        "borderRadius": "8px",
        "fontSize": "14px",
        "padding": "8px 16px",
        "text": "visible label",
        "state": "default | hover | disabled | active"
      }
    }
  ]
}

## Rules
- boundingBox values are PERCENTAGES of the image width/height, not pixels
- x/y is the top-left corner of the component
- omit attributes you cannot see
- output ONLY the JSON object. No prose, no markdown"##
        .to_string()
}

/// 簡易記述プロンプト生成（抽出失敗時）
pub fn build_loose_extraction_prompt() -> String {
    r#"List the UI elements you can see in the attached screenshot, one element per line, in this form:

type: button | position: top-left | size: small | background: #2563eb | text color: #ffffff | text: Sign in

- type: button, input, card, header, navigation, text, image, icon, ...
- position: top-left, top, top-right, left, center, right, bottom-left, bottom, bottom-right
- size: small, medium, large
- leave out fields you are not sure about"#
        .to_string()
}

/// 改善プロンプトに渡すコンポーネントの縮約表現
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ComponentSummary<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    bounding_box: BoundingBox,
    #[serde(skip_serializing_if = "Option::is_none")]
    background_color: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text_color: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
}

impl<'a> From<&'a DetectedComponent> for ComponentSummary<'a> {
    fn from(component: &'a DetectedComponent) -> Self {
        Self {
            id: &component.id,
            kind: component.kind.as_str(),
            bounding_box: component.bounding_box,
            background_color: component.attributes.background_color.as_deref(),
            text_color: component.attributes.text_color.as_deref(),
            text: component.attributes.text.as_deref(),
        }
    }
}

/// 改善プロンプト生成
///
/// リクエストサイズを抑えるため、各コンポーネントは縮約表現で渡す。
pub fn build_improvement_prompt(components: &[DetectedComponent]) -> String {
    let summaries: Vec<ComponentSummary> = components.iter().map(ComponentSummary::from).collect();
    let components_json = serde_json::to_string_pretty(&summaries).unwrap_or_default();

    format!(
        r##"You are a senior UI designer. The attached screenshot contains the following components:

{components_json}

For EVERY component above, propose improved visual properties. Return new values, not deltas.

## Output format (strictly this JSON, nothing else)
{{
  "improvements": [
    {{
      "componentId": "id from the list above",
      "improvements": {{
        "backgroundColor": "#RRGGBB",
        "textColor": "#RRGGBB",
        "borderRadius": "8px",
        "fontSize": "16px",
        "padding": "12px 24px"
      }},
      "reasoning": "one short sentence"
    }}
  ],
  "designSystem": {{
    "primaryColor": "#RRGGBB",
    "secondaryColor": "#RRGGBB",
    "backgroundColor": "#RRGGBB",
    "textColor": "#RRGGBB"
  }}
}}

- componentId MUST match an id from the list
- output ONLY the JSON object. No prose, no markdown"##
    )
}
