//! 改善段階

use super::VisionModel;
use crate::scanner::ImageInput;
use ui_refine_common::analyzer::{improvements_from_payload, synthesize_all};
use ui_refine_common::components::is_refusal;
use ui_refine_common::parser::{recover_payload, IMPROVEMENTS_SHAPE};
use ui_refine_common::prompts::build_improvement_prompt;
use ui_refine_common::{DetectedComponent, Improvements, StageOutcome};

fn all_rule_based(components: &[DetectedComponent], reason: String) -> StageOutcome<Improvements> {
    log::warn!("{}、すべてルールで補完します", reason);
    StageOutcome::degraded(
        Improvements {
            suggestions: synthesize_all(components),
            design_system: None,
        },
        format!("{}; 改善提案をすべてルールで生成", reason),
    )
}

/// コンポーネントごとの改善提案を得る
///
/// 空のコンポーネント一覧ではモデルを呼ばない。
pub async fn improve_components(
    model: &dyn VisionModel,
    image: &ImageInput,
    components: &[DetectedComponent],
    reasoning_max_chars: usize,
) -> StageOutcome<Improvements> {
    if components.is_empty() {
        return StageOutcome::Complete(Improvements::default());
    }

    log::info!("改善提案: {}件のコンポーネント", components.len());

    let response = match model.generate(&build_improvement_prompt(components), image).await {
        Ok(response) if is_refusal(&response) => {
            return all_rule_based(components, "改善要求が拒否された".to_string());
        }
        Ok(response) => response,
        Err(e) => return all_rule_based(components, format!("改善要求に失敗: {}", e)),
    };

    log::debug!("改善応答: {}chars", response.len());
    let recovered = recover_payload(&response, IMPROVEMENTS_SHAPE);
    if recovered.is_fallback() {
        log::warn!("改善応答を復元できませんでした");
    }

    let outcome = improvements_from_payload(components, &recovered, reasoning_max_chars);
    if let Some(reason) = outcome.reason() {
        log::warn!("{}", reason);
    }
    outcome
}
