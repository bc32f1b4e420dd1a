//! UI Refine Common Library
//!
//! CLIとライブラリ利用側で共有される型と、I/Oを伴わない解析ロジック

pub mod types;
pub mod error;
pub mod strategy;
pub mod repair;
pub mod parser;
pub mod prompts;
pub mod components;
pub mod rules;
pub mod analyzer;
pub mod renderer;

pub use types::{
    BoundingBox, ComponentAttributes, ComponentKind, DesignSystem, DetectedComponent,
    ImprovementSuggestion, Improvements, PipelineResult, StageOutcome, SuggestionSource,
};
pub use error::{Error, Result};
pub use strategy::{first_success, first_success_async};
pub use parser::{extract_payload, recover_payload, PayloadShape, RecoveredPayload, RecoveryMethod};
pub use components::{fallback_components, is_refusal};
pub use analyzer::{complete_suggestions, terminal_fallback_result};
pub use renderer::{render_report, RenderedBox, RenderedReport};
