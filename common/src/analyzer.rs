//! 改善段階の解析ロジック（モデル応答 → 検証済み提案）
//!
//! - 復元済み項目から提案を読み取る
//! - コンポーネント一覧と突き合わせ、欠けた分をルールで補う
//! - 全段階が失敗したときの最終結果

use crate::components::fallback_components;
use crate::parser::RecoveredPayload;
use crate::rules::synthesize_suggestion;
use crate::types::{
    value_to_string, ComponentAttributes, DesignSystem, DetectedComponent, ImprovementSuggestion,
    Improvements, PipelineResult, StageOutcome, SuggestionSource,
};
use serde_json::Value;
use std::collections::HashMap;

/// reasoning の既定の最大文字数
pub const DEFAULT_REASONING_MAX_CHARS: usize = 300;

/// 文字数で切り詰める（文字境界を保つ）
pub fn truncate_reasoning(reasoning: &str, max_chars: usize) -> String {
    let trimmed = reasoning.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((byte_index, _)) => trimmed[..byte_index].trim_end().to_string(),
        None => trimmed.to_string(),
    }
}

/// 1項目を提案として読む（componentId がなければ None）
fn suggestion_from_value(value: &Value, max_chars: usize) -> Option<ImprovementSuggestion> {
    let map = value.as_object()?;
    let component_id = ["componentId", "component_id", "id"]
        .iter()
        .find_map(|key| map.get(*key).and_then(value_to_string))?;

    let improvements = ComponentAttributes::from_value(
        map.get("improvements").or_else(|| map.get("attributes")),
    );
    let reasoning = ["reasoning", "reason", "rationale"]
        .iter()
        .find_map(|key| map.get(*key).and_then(value_to_string))
        .unwrap_or_default();

    Some(ImprovementSuggestion {
        component_id,
        improvements,
        reasoning: truncate_reasoning(&reasoning, max_chars),
        source: SuggestionSource::Model,
    })
}

/// 復元済み項目から提案を読み取る
pub fn suggestions_from_items(items: &[Value], max_chars: usize) -> Vec<ImprovementSuggestion> {
    items
        .iter()
        .filter_map(|item| suggestion_from_value(item, max_chars))
        .collect()
}

/// 文書の `designSystem` を読む（空なら None）
pub fn design_system_from_document(document: Option<&Value>) -> Option<DesignSystem> {
    let value = document?.get("designSystem")?;
    let design_system: DesignSystem = serde_json::from_value(value.clone()).ok()?;
    (!design_system.is_empty()).then_some(design_system)
}

/// コンポーネント一覧と突き合わせて、1コンポーネント1提案にそろえる
///
/// 未知の componentId は捨て、同じIDが複数あれば最初を採用する。
/// 提案のないコンポーネントはルールテーブルで補う。
/// 戻り値はコンポーネント順の提案と、補った件数。
pub fn complete_suggestions(
    components: &[DetectedComponent],
    suggestions: Vec<ImprovementSuggestion>,
) -> (Vec<ImprovementSuggestion>, usize) {
    let mut by_id: HashMap<String, ImprovementSuggestion> = HashMap::new();
    for suggestion in suggestions {
        by_id.entry(suggestion.component_id.clone()).or_insert(suggestion);
    }

    let mut synthesized = 0;
    let completed = components
        .iter()
        .map(|component| match by_id.remove(&component.id) {
            Some(suggestion) => suggestion,
            None => {
                synthesized += 1;
                synthesize_suggestion(component)
            }
        })
        .collect();

    if !by_id.is_empty() {
        log::debug!("未知のcomponentIdを破棄: {}件", by_id.len());
    }

    (completed, synthesized)
}

/// 全コンポーネント分をルールで作る
pub fn synthesize_all(components: &[DetectedComponent]) -> Vec<ImprovementSuggestion> {
    components.iter().map(synthesize_suggestion).collect()
}

/// 復元結果から改善段階の結果を組み立てる
pub fn improvements_from_payload(
    components: &[DetectedComponent],
    recovered: &RecoveredPayload,
    max_chars: usize,
) -> StageOutcome<Improvements> {
    let parsed = suggestions_from_items(&recovered.items, max_chars);
    let design_system = design_system_from_document(recovered.document.as_ref());
    let (suggestions, synthesized) = complete_suggestions(components, parsed);

    let improvements = Improvements {
        suggestions,
        design_system,
    };

    if synthesized == 0 {
        StageOutcome::Complete(improvements)
    } else {
        StageOutcome::degraded(
            improvements,
            format!("改善提案の{}/{}件をルールで補完", synthesized, components.len()),
        )
    }
}

/// 全段階が失敗したときの結果（固定コンポーネント + ルール提案）
pub fn terminal_fallback_result(reason: &str) -> PipelineResult {
    let components = fallback_components();
    let suggestions = synthesize_all(&components);
    PipelineResult::assemble(
        StageOutcome::degraded(components, reason.to_string()),
        StageOutcome::degraded(
            Improvements {
                suggestions,
                design_system: None,
            },
            "改善提案をすべてルールで生成",
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{recover_payload, IMPROVEMENTS_SHAPE};
    use crate::types::BoundingBox;
    use serde_json::json;

    fn components(kinds: &[&str]) -> Vec<DetectedComponent> {
        kinds
            .iter()
            .enumerate()
            .map(|(i, kind)| {
                DetectedComponent::new(
                    format!("c{}", i + 1),
                    *kind,
                    BoundingBox::new(0.0, 10.0 * i as f64, 20.0, 8.0),
                    ComponentAttributes::default(),
                )
            })
            .collect()
    }

    #[test]
    fn test_truncate_reasoning() {
        assert_eq!(truncate_reasoning("  short  ", 300), "short");
        assert_eq!(truncate_reasoning("abcdef", 3), "abc");
        // マルチバイト文字でも文字数で切る
        assert_eq!(truncate_reasoning("あいうえお", 2), "あい");
        assert_eq!(truncate_reasoning(&"x".repeat(500), 300).chars().count(), 300);
    }

    #[test]
    fn test_suggestions_from_items() {
        let items = vec![
            json!({"componentId": "c1", "improvements": {"borderRadius": 8}, "reasoning": "rounder"}),
            json!({"improvements": {}}),
            json!({"component_id": "c2", "attributes": {"textColor": "#000"}}),
        ];
        let suggestions = suggestions_from_items(&items, 300);
        assert_eq!(suggestions.len(), 2);
        assert_eq!(suggestions[0].improvements.border_radius.as_deref(), Some("8"));
        assert_eq!(suggestions[0].source, SuggestionSource::Model);
        assert_eq!(suggestions[1].component_id, "c2");
        assert_eq!(suggestions[1].improvements.text_color.as_deref(), Some("#000"));
    }

    #[test]
    fn test_suggestion_with_name_and_alias_keeps_improvements() {
        let items = vec![json!({
            "componentId": "c1",
            "improvements": {"textColor": "#ffffff", "color": "#eeeeee", "padding": "12px 24px"},
            "reasoning": "contrast"
        })];
        let suggestions = suggestions_from_items(&items, 300);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].improvements.text_color.as_deref(), Some("#ffffff"));
        assert_eq!(suggestions[0].improvements.padding.as_deref(), Some("12px 24px"));
    }

    #[test]
    fn test_complete_suggestions_fills_missing() {
        let components = components(&["button", "input", "card", "header", "image"]);
        let model = suggestions_from_items(
            &[
                json!({"componentId": "c1", "improvements": {"backgroundColor": "#111111"}}),
                json!({"componentId": "c3", "improvements": {"padding": "20px"}}),
            ],
            300,
        );
        let (completed, synthesized) = complete_suggestions(&components, model);
        assert_eq!(completed.len(), 5);
        assert_eq!(synthesized, 3);
        let rule_based = completed.iter().filter(|s| s.source == SuggestionSource::RuleBased).count();
        assert_eq!(rule_based, 3);
        // コンポーネント順にそろう
        let ids: Vec<&str> = completed.iter().map(|s| s.component_id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2", "c3", "c4", "c5"]);
    }

    #[test]
    fn test_complete_suggestions_drops_dangling_and_duplicates() {
        let components = components(&["button"]);
        let model = suggestions_from_items(
            &[
                json!({"componentId": "ghost", "improvements": {}}),
                json!({"componentId": "c1", "reasoning": "first"}),
                json!({"componentId": "c1", "reasoning": "second"}),
            ],
            300,
        );
        let (completed, synthesized) = complete_suggestions(&components, model);
        assert_eq!(synthesized, 0);
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].reasoning, "first");
    }

    #[test]
    fn test_design_system_from_document() {
        let doc = json!({"designSystem": {"primaryColor": "#2563eb"}});
        let ds = design_system_from_document(Some(&doc)).unwrap();
        assert_eq!(ds.primary_color.as_deref(), Some("#2563eb"));

        assert!(design_system_from_document(Some(&json!({"designSystem": {}}))).is_none());
        assert!(design_system_from_document(None).is_none());
    }

    #[test]
    fn test_improvements_from_payload_complete() {
        let components = components(&["button"]);
        let response = r##"{"improvements": [{"componentId": "c1", "improvements": {"fontSize": 16}}], "designSystem": {"textColor": "#111"}}"##;
        let recovered = recover_payload(response, IMPROVEMENTS_SHAPE);
        let outcome = improvements_from_payload(&components, &recovered, 300);
        assert!(!outcome.is_degraded());
        assert!(outcome.value().design_system.is_some());
    }

    #[test]
    fn test_improvements_from_payload_degraded() {
        let components = components(&["button", "card"]);
        let recovered = recover_payload("no json here", IMPROVEMENTS_SHAPE);
        let outcome = improvements_from_payload(&components, &recovered, 300);
        assert!(outcome.is_degraded());
        assert_eq!(outcome.value().suggestions.len(), 2);
    }

    #[test]
    fn test_terminal_fallback_result() {
        let result = terminal_fallback_result("抽出に失敗");
        assert!(result.degraded);
        assert_eq!(result.components.len(), 5);
        assert_eq!(result.suggestions.len(), 5);
        assert_eq!(result.report.boxes.len(), 5);
        assert!(result.notes.iter().any(|n| n == "抽出に失敗"));
    }
}
