//! パイプラインの型定義
//!
//! CLIとライブラリで共有される型:
//! - DetectedComponent: 抽出段階（Extractor）の出力
//! - ImprovementSuggestion: 改善段階（Analyzer）の出力
//! - PipelineResult: 最終出力（抽出+改善+レンダリング結果）

use crate::renderer::{render_report, RenderedReport};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// confidence未指定時の既定値
pub const DEFAULT_CONFIDENCE: f64 = 0.9;

fn default_confidence() -> f64 {
    DEFAULT_CONFIDENCE
}

/// 範囲内に丸める（NaN/∞は既定値）
fn clamp_or(value: f64, min: f64, max: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}

/// JSON値を文字列に変換（数値・真偽値も許容）
pub(crate) fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// JSON値を数値に変換（"12", "12%", "12px" も許容）
pub(crate) fn value_to_f64(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s
            .trim()
            .trim_end_matches('%')
            .trim_end_matches("px")
            .trim()
            .parse::<f64>()
            .ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_to_string))
}

// =============================================
// バウンディングボックス
// =============================================

/// 画像サイズに対する割合（%）で表した矩形
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    /// 不変条件に丸めた矩形を生成
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }.clamped()
    }

    /// x/y は [0,100]、width/height は [1,100] に丸める
    pub fn clamped(&self) -> Self {
        Self {
            x: clamp_or(self.x, 0.0, 100.0, 0.0),
            y: clamp_or(self.y, 0.0, 100.0, 0.0),
            width: clamp_or(self.width, 1.0, 100.0, 1.0),
            height: clamp_or(self.height, 1.0, 100.0, 1.0),
        }
    }

    /// 不変条件を満たしているか
    pub fn is_within_bounds(&self) -> bool {
        (0.0..=100.0).contains(&self.x)
            && (0.0..=100.0).contains(&self.y)
            && (1.0..=100.0).contains(&self.width)
            && (1.0..=100.0).contains(&self.height)
    }
}

// =============================================
// コンポーネント種別
// =============================================

/// コンポーネント種別
///
/// 既知のタグは列挙子に、モデルが独自に付けたタグは `Other` にそのまま保持する。
/// シリアライズ時は常に文字列。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ComponentKind {
    Button,
    Input,
    Card,
    Header,
    Navigation,
    Text,
    Image,
    Icon,
    Container,
    Unknown,
    Other(String),
}

impl ComponentKind {
    pub fn as_str(&self) -> &str {
        match self {
            ComponentKind::Button => "button",
            ComponentKind::Input => "input",
            ComponentKind::Card => "card",
            ComponentKind::Header => "header",
            ComponentKind::Navigation => "navigation",
            ComponentKind::Text => "text",
            ComponentKind::Image => "image",
            ComponentKind::Icon => "icon",
            ComponentKind::Container => "container",
            ComponentKind::Unknown => "unknown",
            ComponentKind::Other(tag) => tag.as_str(),
        }
    }
}

impl From<&str> for ComponentKind {
    fn from(tag: &str) -> Self {
        let trimmed = tag.trim();
        match trimmed.to_lowercase().as_str() {
            "button" => ComponentKind::Button,
            "input" => ComponentKind::Input,
            "card" => ComponentKind::Card,
            "header" => ComponentKind::Header,
            "navigation" | "nav" => ComponentKind::Navigation,
            "text" => ComponentKind::Text,
            "image" => ComponentKind::Image,
            "icon" => ComponentKind::Icon,
            "container" => ComponentKind::Container,
            "" | "unknown" => ComponentKind::Unknown,
            _ => ComponentKind::Other(trimmed.to_string()),
        }
    }
}

impl From<String> for ComponentKind {
    fn from(tag: String) -> Self {
        ComponentKind::from(tag.as_str())
    }
}

impl From<ComponentKind> for String {
    fn from(kind: ComponentKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================
// 見た目の属性
// =============================================

/// 見た目の属性
///
/// 既知のキーは型付きフィールド、それ以外は `extra` に保持する。
/// 改善提案（ImprovementSuggestion.improvements）も同じ形を使う。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentAttributes {
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,

    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,

    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub border_radius: Option<String>,

    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub font_size: Option<String>,

    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub padding: Option<String>,

    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub font_weight: Option<String>,

    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub border: Option<String>,

    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub box_shadow: Option<String>,

    /// 未知のキー
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

// 既知フィールドのキー（先頭が正式名、以降は別名）
const BACKGROUND_COLOR_KEYS: &[&str] = &["backgroundColor", "background"];
const TEXT_COLOR_KEYS: &[&str] = &["textColor", "color"];
const BORDER_RADIUS_KEYS: &[&str] = &["borderRadius"];
const FONT_SIZE_KEYS: &[&str] = &["fontSize"];
const PADDING_KEYS: &[&str] = &["padding"];
const TEXT_KEYS: &[&str] = &["text", "label"];
const STATE_KEYS: &[&str] = &["state"];
const FONT_WEIGHT_KEYS: &[&str] = &["fontWeight"];
const BORDER_KEYS: &[&str] = &["border"];
const BOX_SHADOW_KEYS: &[&str] = &["boxShadow", "shadow"];

const ATTRIBUTE_KEYS: [&[&str]; 10] = [
    BACKGROUND_COLOR_KEYS,
    TEXT_COLOR_KEYS,
    BORDER_RADIUS_KEYS,
    FONT_SIZE_KEYS,
    PADDING_KEYS,
    TEXT_KEYS,
    STATE_KEYS,
    FONT_WEIGHT_KEYS,
    BORDER_KEYS,
    BOX_SHADOW_KEYS,
];

/// 候補キーのうち最初に値が読めたもの
fn first_attribute(map: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| map.get(*key).and_then(value_to_string))
}

impl ComponentAttributes {
    /// JSON値から読み取る（オブジェクト以外は空）
    ///
    /// フィールドごとに読むので、1つのキーが読めなくても他は残る。
    /// 正式名と別名が両方ある場合は正式名を優先する。
    pub fn from_value(value: Option<&Value>) -> Self {
        let map = match value {
            Some(Value::Object(map)) => map,
            _ => return Self::default(),
        };

        let extra = map
            .iter()
            .filter(|(key, _)| !ATTRIBUTE_KEYS.iter().any(|keys| keys.contains(&key.as_str())))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Self {
            background_color: first_attribute(map, BACKGROUND_COLOR_KEYS),
            text_color: first_attribute(map, TEXT_COLOR_KEYS),
            border_radius: first_attribute(map, BORDER_RADIUS_KEYS),
            font_size: first_attribute(map, FONT_SIZE_KEYS),
            padding: first_attribute(map, PADDING_KEYS),
            text: first_attribute(map, TEXT_KEYS),
            state: first_attribute(map, STATE_KEYS),
            font_weight: first_attribute(map, FONT_WEIGHT_KEYS),
            border: first_attribute(map, BORDER_KEYS),
            box_shadow: first_attribute(map, BOX_SHADOW_KEYS),
            extra,
        }
    }

    /// `over` の値を優先してフィールド単位で重ねる
    pub fn overlaid_with(&self, over: &ComponentAttributes) -> ComponentAttributes {
        let pick = |top: &Option<String>, base: &Option<String>| top.clone().or_else(|| base.clone());

        let mut extra = self.extra.clone();
        extra.extend(over.extra.iter().map(|(k, v)| (k.clone(), v.clone())));

        ComponentAttributes {
            background_color: pick(&over.background_color, &self.background_color),
            text_color: pick(&over.text_color, &self.text_color),
            border_radius: pick(&over.border_radius, &self.border_radius),
            font_size: pick(&over.font_size, &self.font_size),
            padding: pick(&over.padding, &self.padding),
            text: pick(&over.text, &self.text),
            state: pick(&over.state, &self.state),
            font_weight: pick(&over.font_weight, &self.font_weight),
            border: pick(&over.border, &self.border),
            box_shadow: pick(&over.box_shadow, &self.box_shadow),
            extra,
        }
    }

    /// 既知フィールドがすべて未設定か
    pub fn is_empty(&self) -> bool {
        self.background_color.is_none()
            && self.text_color.is_none()
            && self.border_radius.is_none()
            && self.font_size.is_none()
            && self.padding.is_none()
            && self.text.is_none()
            && self.state.is_none()
            && self.font_weight.is_none()
            && self.border.is_none()
            && self.box_shadow.is_none()
    }
}

// =============================================
// 検出コンポーネント
// =============================================

/// 画像から検出されたUI要素
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedComponent {
    pub id: String,

    #[serde(rename = "type")]
    pub kind: ComponentKind,

    #[serde(default = "default_confidence")]
    pub confidence: f64,

    pub bounding_box: BoundingBox,

    #[serde(default)]
    pub attributes: ComponentAttributes,
}

impl DetectedComponent {
    pub fn new(
        id: impl Into<String>,
        kind: impl Into<ComponentKind>,
        bounding_box: BoundingBox,
        attributes: ComponentAttributes,
    ) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            confidence: DEFAULT_CONFIDENCE,
            bounding_box: bounding_box.clamped(),
            attributes,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = clamp_or(confidence, 0.0, 1.0, DEFAULT_CONFIDENCE);
        self
    }
}

// =============================================
// 改善提案
// =============================================

/// 改善提案の出所
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SuggestionSource {
    /// モデルの回答
    Model,
    /// ルールテーブルによる補完
    RuleBased,
}

/// 1コンポーネント分の改善提案
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImprovementSuggestion {
    pub component_id: String,

    #[serde(default)]
    pub improvements: ComponentAttributes,

    #[serde(default)]
    pub reasoning: String,

    pub source: SuggestionSource,
}

/// 共通カラーパレット（参考情報）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignSystem {
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub primary_color: Option<String>,

    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub secondary_color: Option<String>,

    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,

    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
}

impl DesignSystem {
    pub fn is_empty(&self) -> bool {
        self.primary_color.is_none()
            && self.secondary_color.is_none()
            && self.background_color.is_none()
            && self.text_color.is_none()
    }
}

/// 改善段階の出力
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Improvements {
    pub suggestions: Vec<ImprovementSuggestion>,
    pub design_system: Option<DesignSystem>,
}

// =============================================
// 段階の結果
// =============================================

/// 各段階の結果
///
/// フォールバックは例外ではなく `Degraded` で表す。
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome<T> {
    /// モデルの回答から得た値
    Complete(T),
    /// フォールバック戦略で得た値
    Degraded { value: T, reason: String },
}

impl<T> StageOutcome<T> {
    pub fn degraded(value: T, reason: impl Into<String>) -> Self {
        StageOutcome::Degraded {
            value,
            reason: reason.into(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, StageOutcome::Degraded { .. })
    }

    pub fn value(&self) -> &T {
        match self {
            StageOutcome::Complete(value) => value,
            StageOutcome::Degraded { value, .. } => value,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            StageOutcome::Complete(_) => None,
            StageOutcome::Degraded { reason, .. } => Some(reason),
        }
    }

    pub fn into_value(self) -> T {
        match self {
            StageOutcome::Complete(value) => value,
            StageOutcome::Degraded { value, .. } => value,
        }
    }
}

// =============================================
// 最終結果
// =============================================

/// パイプラインの最終結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    pub components: Vec<DetectedComponent>,

    pub suggestions: Vec<ImprovementSuggestion>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub design_system: Option<DesignSystem>,

    pub report: RenderedReport,

    /// いずれかの段階がフォールバックしたか
    pub degraded: bool,

    /// 発動したフォールバックの説明
    #[serde(default)]
    pub notes: Vec<String>,
}

impl PipelineResult {
    /// 各段階の結果を組み立ててレンダリングする
    pub fn assemble(
        components: StageOutcome<Vec<DetectedComponent>>,
        improvements: StageOutcome<Improvements>,
    ) -> Self {
        let notes: Vec<String> = [components.reason(), improvements.reason()]
            .into_iter()
            .flatten()
            .map(str::to_string)
            .collect();
        let degraded = components.is_degraded() || improvements.is_degraded();

        let components = components.into_value();
        let improvements = improvements.into_value();
        let report = render_report(&components, &improvements.suggestions);

        Self {
            components,
            suggestions: improvements.suggestions,
            design_system: improvements.design_system,
            report,
            degraded,
            notes,
        }
    }

    /// 保存済みJSONから読み込む
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
