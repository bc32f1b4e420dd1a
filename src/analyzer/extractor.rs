//! 抽出段階
//!
//! 1. 構造化ペイロードを要求するプロンプト
//! 2. 拒否・失敗・空なら簡易記述プロンプト（記述 → キーワード合成）
//! 3. それでもだめなら固定コンポーネント
//!
//! どの経路でも段階の外にエラーを出さない。

use super::VisionModel;
use crate::scanner::ImageInput;
use ui_refine_common::components::{
    components_from_description, components_from_items, components_from_keywords, fallback_components, is_refusal,
};
use ui_refine_common::parser::{recover_payload, COMPONENTS_SHAPE};
use ui_refine_common::prompts::{build_extraction_prompt, build_loose_extraction_prompt};
use ui_refine_common::{DetectedComponent, StageOutcome};

/// 画像からコンポーネントを抽出
pub async fn extract_components(model: &dyn VisionModel, image: &ImageInput) -> StageOutcome<Vec<DetectedComponent>> {
    log::info!("コンポーネント抽出: {}", image.name);

    let reason = match model.generate(&build_extraction_prompt(), image).await {
        Ok(response) if is_refusal(&response) => "抽出要求が拒否された".to_string(),
        Ok(response) => {
            log::debug!("抽出応答: {}chars", response.len());
            let recovered = recover_payload(&response, COMPONENTS_SHAPE);
            let components = components_from_items(&recovered.items);
            if !components.is_empty() {
                log::info!("{}件のコンポーネントを抽出 ({:?})", components.len(), recovered.method);
                return StageOutcome::Complete(components);
            }
            "抽出応答からコンポーネントを復元できなかった".to_string()
        }
        Err(e) => format!("抽出要求に失敗: {}", e),
    };

    log::warn!("{}、簡易記述に切り替えます", reason);
    extract_loosely(model, image, reason).await
}

async fn extract_loosely(
    model: &dyn VisionModel,
    image: &ImageInput,
    primary_reason: String,
) -> StageOutcome<Vec<DetectedComponent>> {
    let fallback_reason = match model.generate(&build_loose_extraction_prompt(), image).await {
        Ok(response) if is_refusal(&response) => "簡易記述も拒否された".to_string(),
        Ok(response) => {
            let described = components_from_description(&response);
            if !described.is_empty() {
                let reason = format!("{}; 簡易記述から{}件を抽出", primary_reason, described.len());
                log::warn!("{}", reason);
                return StageOutcome::degraded(described, reason);
            }

            let synthesized = components_from_keywords(&response);
            if !synthesized.is_empty() {
                let reason = format!("{}; キーワードから{}件を合成", primary_reason, synthesized.len());
                log::warn!("{}", reason);
                return StageOutcome::degraded(synthesized, reason);
            }
            "簡易記述からも読み取れなかった".to_string()
        }
        Err(e) => format!("簡易記述の要求に失敗: {}", e),
    };

    let reason = format!("{}; {}; 固定コンポーネントを使用", primary_reason, fallback_reason);
    log::warn!("{}", reason);
    StageOutcome::degraded(fallback_components(), reason)
}
