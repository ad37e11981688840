//! Normalized outputs of each stage.
//!
//! These are the only shapes consumers see; raw wire payloads are converted in
//! `client::wire` and never leak past the client.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::Stage;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub label: String,
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
    pub score: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    pub objects: Vec<String>,
    pub annotated_image: Option<String>,
    pub confidence: Vec<f32>,
    pub bounding_boxes: Vec<BoundingBox>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentationResult {
    pub segmented_image: Option<String>,
    /// Opaque per-object masks, passed through as the service sent them.
    pub masks: Vec<Value>,
    pub num_segments: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdviceResult {
    pub advice_items: Vec<String>,
    pub full_text: String,
    pub prompt: String,
}

impl AdviceResult {
    pub fn from_text(full_text: impl Into<String>, prompt: impl Into<String>) -> Self {
        let full_text = full_text.into();
        Self { advice_items: split_advice(&full_text), full_text, prompt: prompt.into() }
    }
}

/// Best-effort split of free-form advice into discrete items.
///
/// One item per non-blank line, with leading enumeration markers (`1.`, `2)`,
/// `-`, `*`, `•`) removed. Lossy: prose that wraps across lines becomes
/// several items.
pub fn split_advice(text: &str) -> Vec<String> {
    text.lines()
        .map(strip_enumeration)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn strip_enumeration(line: &str) -> &str {
    let line = line.trim();
    let digits = line.len() - line.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    let rest = if digits > 0 {
        let after = &line[digits..];
        // "3 chairs" is content, not a list marker.
        match after.strip_prefix(['.', ')', ':']) {
            Some(stripped) => stripped,
            None => return line,
        }
    } else if let Some(stripped) = line.strip_prefix(['-', '*', '•']) {
        stripped
    } else {
        return line;
    };
    rest.trim()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub generated_image: String,
    pub canny_image: Option<String>,
    /// Intermediate render of the first pass; only present for two-pass runs.
    pub pass_a_image: Option<String>,
    pub prompt: String,
    pub parameters_used: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemCost {
    pub item: String,
    pub material_cost: f64,
    pub labor_cost: f64,
    pub total: f64,
    pub where_to_buy: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiySavings {
    pub professional_cost: f64,
    pub diy_cost: f64,
    pub savings_amount: f64,
    pub savings_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostEstimate {
    pub budget_tier: String,
    pub total_cost: f64,
    pub currency: String,
    pub per_item_costs: Vec<ItemCost>,
    pub diy_vs_professional: DiySavings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiyStep {
    pub step: u32,
    pub title: String,
    pub description: String,
    pub duration_minutes: u32,
    pub tips: Vec<String>,
    pub safety_warning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiyTool {
    pub name: String,
    pub cost: Option<f64>,
    pub where_to_buy: Option<String>,
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiyMaterial {
    pub item: String,
    pub budget_range: Option<String>,
    pub where_to_buy: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiyInstructions {
    pub item: String,
    pub difficulty: Option<String>,
    pub estimated_time_hours: Option<f32>,
    pub steps: Vec<DiyStep>,
    pub tools_needed: Vec<DiyTool>,
    pub materials_checklist: Vec<DiyMaterial>,
    pub safety_tips: Vec<String>,
    /// Set when the service has no guide for the item.
    pub note: Option<String>,
}

impl DiyInstructions {
    pub fn total_minutes(&self) -> u32 {
        self.steps.iter().map(|s| s.duration_minutes).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignProposal {
    pub recommendations: Vec<String>,
    pub summary: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefinedDesign {
    pub recommendations: Vec<String>,
    pub summary: String,
    pub feedback: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignPrompt {
    pub image_prompt: String,
    pub negative_prompt: Option<String>,
}

/// Input to a product lookup for one item of the redesign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductQuery {
    pub item_type: String,
    pub style: String,
    pub material: String,
    pub color: String,
    pub budget: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductMatch {
    pub product_id: String,
    pub name: String,
    pub vendor: String,
    pub price: String,
    pub url: String,
    pub image_url: Option<String>,
    pub match_score: f32,
    pub affiliate: bool,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductMatches {
    pub item: String,
    pub matches: Vec<ProductMatch>,
}

/// Output of one completed stage, in the order it was recorded on the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "result", rename_all = "camelCase")]
pub enum StageResult {
    Detection(DetectionResult),
    Segmentation(SegmentationResult),
    Advice(AdviceResult),
    Proposal(DesignProposal),
    Refinement(RefinedDesign),
    Prompt(DesignPrompt),
    Generation(GenerationResult),
    CostEstimate(CostEstimate),
    ProductMatches(Vec<ProductMatches>),
}

impl StageResult {
    pub fn stage(&self) -> Stage {
        match self {
            StageResult::Detection(_) => Stage::Detect,
            StageResult::Segmentation(_) => Stage::Segment,
            StageResult::Advice(_) => Stage::Advise,
            StageResult::Proposal(_) => Stage::Propose,
            StageResult::Refinement(_) => Stage::Refine,
            StageResult::Prompt(_) => Stage::BuildPrompt,
            StageResult::Generation(_) => Stage::Generate,
            StageResult::CostEstimate(_) => Stage::EstimateCost,
            StageResult::ProductMatches(_) => Stage::MatchProducts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn advice_items_drop_markers_and_blank_lines() {
        let items = split_advice("1. Paint walls\n- Add rug\n\nUse warm lighting");
        assert_eq!(items, vec!["Paint walls", "Add rug", "Use warm lighting"]);
    }

    #[test]
    fn advice_keeps_numbers_that_are_content() {
        let items = split_advice("2) Swap the lamp\n* Add 3 cushions\n2024 trends favour linen\n• Declutter");
        assert_eq!(
            items,
            vec!["Swap the lamp", "Add 3 cushions", "2024 trends favour linen", "Declutter"]
        );
    }

    #[test]
    fn advice_handles_crlf_and_marker_only_lines() {
        let items = split_advice("  - \r\n10. Hang art at eye level\r\n   \r\n");
        assert_eq!(items, vec!["Hang art at eye level"]);
    }

    #[test]
    fn stage_result_serializes_camel_case() {
        let result = StageResult::Detection(DetectionResult {
            objects: vec!["bed".into()],
            ..Default::default()
        });
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["kind"], "detection");
        assert_eq!(json["result"]["boundingBoxes"], serde_json::json!([]));
        assert_eq!(result.stage(), Stage::Detect);
    }
}
