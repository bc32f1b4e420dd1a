//! 改善提案のルールテーブル
//!
//! モデルが提案を返さなかったコンポーネントに、種別の部分一致で
//! 決まった改善値を割り当てる。上から順に評価し、最初に一致した行を使う。

use crate::types::{ComponentAttributes, DetectedComponent, ImprovementSuggestion, SuggestionSource};

/// ルールによる提案の reasoning に付ける印
pub const RULE_BASED_TAG: &str = "[rule-based]";

/// ルールテーブルの1行
pub struct ImprovementRule {
    pub name: &'static str,
    pub keywords: &'static [&'static str],
    pub reasoning: &'static str,
    build: fn() -> ComponentAttributes,
}

impl ImprovementRule {
    pub fn improvements(&self) -> ComponentAttributes {
        (self.build)()
    }

    fn matches(&self, kind: &str) -> bool {
        self.keywords.iter().any(|keyword| kind.contains(keyword))
    }
}

fn attrs(pairs: &[(&str, &str)]) -> ComponentAttributes {
    let mut attributes = ComponentAttributes::default();
    for (key, value) in pairs {
        let value = Some(value.to_string());
        match *key {
            "backgroundColor" => attributes.background_color = value,
            "textColor" => attributes.text_color = value,
            "borderRadius" => attributes.border_radius = value,
            "fontSize" => attributes.font_size = value,
            "padding" => attributes.padding = value,
            "fontWeight" => attributes.font_weight = value,
            "border" => attributes.border = value,
            "boxShadow" => attributes.box_shadow = value,
            _ => {}
        }
    }
    attributes
}

fn button_improvements() -> ComponentAttributes {
    attrs(&[
        ("backgroundColor", "#2563eb"),
        ("textColor", "#ffffff"),
        ("borderRadius", "8px"),
        ("fontSize", "16px"),
        ("padding", "12px 24px"),
        ("fontWeight", "600"),
        ("boxShadow", "0 2px 6px rgba(37, 99, 235, 0.35)"),
    ])
}

fn input_improvements() -> ComponentAttributes {
    attrs(&[
        ("backgroundColor", "#ffffff"),
        ("textColor", "#111827"),
        ("borderRadius", "6px"),
        ("fontSize", "16px"),
        ("padding", "12px 14px"),
        ("border", "1px solid #d1d5db"),
    ])
}

fn card_improvements() -> ComponentAttributes {
    attrs(&[
        ("backgroundColor", "#ffffff"),
        ("textColor", "#1f2937"),
        ("borderRadius", "12px"),
        ("padding", "16px"),
        ("boxShadow", "0 4px 12px rgba(15, 23, 42, 0.12)"),
    ])
}

fn header_improvements() -> ComponentAttributes {
    attrs(&[
        ("backgroundColor", "#f8fafc"),
        ("textColor", "#0f172a"),
        ("fontSize", "18px"),
        ("padding", "12px 24px"),
        ("fontWeight", "700"),
        ("border", "1px solid #e2e8f0"),
    ])
}

fn image_improvements() -> ComponentAttributes {
    attrs(&[
        ("borderRadius", "8px"),
        ("boxShadow", "0 1px 3px rgba(15, 23, 42, 0.15)"),
    ])
}

fn default_improvements() -> ComponentAttributes {
    attrs(&[
        ("backgroundColor", "#ffffff"),
        ("textColor", "#1f2937"),
        ("borderRadius", "4px"),
        ("fontSize", "14px"),
        ("padding", "8px"),
    ])
}

/// 評価順のルールテーブル（最後の行は常に一致する）
pub const IMPROVEMENT_RULES: &[ImprovementRule] = &[
    ImprovementRule {
        name: "button",
        keywords: &["button", "btn", "cta"],
        reasoning: "Filled accent color and rounded corners make the action stand out.",
        build: button_improvements,
    },
    ImprovementRule {
        name: "input",
        keywords: &["input", "field", "textbox", "search", "textarea"],
        reasoning: "A visible border and roomier padding make the field easy to spot and tap.",
        build: input_improvements,
    },
    ImprovementRule {
        name: "card",
        keywords: &["card", "container", "panel", "section", "modal"],
        reasoning: "An elevated surface separates grouped content from the page.",
        build: card_improvements,
    },
    ImprovementRule {
        name: "header",
        keywords: &["header", "nav", "toolbar", "menu"],
        reasoning: "A neutral surface with bold text anchors the page structure.",
        build: header_improvements,
    },
    ImprovementRule {
        name: "image",
        keywords: &["image", "img", "icon", "avatar", "logo"],
        reasoning: "Soft corners and a subtle shadow blend imagery into the layout.",
        build: image_improvements,
    },
    ImprovementRule {
        name: "default",
        keywords: &[""],
        reasoning: "Neutral colors and consistent spacing keep the element readable.",
        build: default_improvements,
    },
];

/// 種別タグに一致するルールを引く（大文字小文字は無視）
pub fn rule_for(kind: &str) -> &'static ImprovementRule {
    let kind = kind.to_lowercase();
    IMPROVEMENT_RULES
        .iter()
        .find(|rule| rule.matches(&kind))
        .unwrap_or(&IMPROVEMENT_RULES[IMPROVEMENT_RULES.len() - 1])
}

/// ルールテーブルから1コンポーネント分の提案を作る
pub fn synthesize_suggestion(component: &DetectedComponent) -> ImprovementSuggestion {
    let rule = rule_for(component.kind.as_str());
    ImprovementSuggestion {
        component_id: component.id.clone(),
        improvements: rule.improvements(),
        reasoning: format!("{} {}", RULE_BASED_TAG, rule.reasoning),
        source: SuggestionSource::RuleBased,
    }
}
