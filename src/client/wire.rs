//! Raw request/response shapes of the AI services and their normalization.
//!
//! Services answer in snake_case with most fields optional; every `normalize`
//! here fills the gaps with empty collections so nothing downstream has to.

use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use serde_with::skip_serializing_none;

use crate::error::{ArtistryError, Result};
use crate::models::{
    AuthSession, GenerateOptions, RoomJob, RoomJobState, RoomJobStatus, SaveReceipt, ShareLink,
    Stage, TokenStatus,
};
use crate::results::{
    split_advice, AdviceResult, BoundingBox, CostEstimate, DesignPrompt, DesignProposal,
    DetectionResult, DiyInstructions, DiyMaterial, DiySavings, DiyStep, DiyTool,
    GenerationResult, ItemCost, ProductMatch, ProductMatches, RefinedDesign, SegmentationResult,
};

/// Body of a non-2xx response, as FastAPI and friends send it.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    detail: Option<Value>,
    #[serde(default)]
    message: Option<String>,
}

/// Human-readable reason for a failed call: `detail`, then `message`, then the bare status.
pub fn error_message(status: u16, body: &str) -> String {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let detail = parsed.detail.and_then(|d| match d {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        Value::Null => None,
        Value::String(_) => None,
        other => Some(other.to_string()),
    });
    detail
        .or(parsed.message.filter(|m| !m.trim().is_empty()))
        .unwrap_or_else(|| format!("HTTP Error {status}"))
}

fn lenient_f64<'de, D: Deserializer<'de>>(de: D) -> std::result::Result<Option<f64>, D::Error> {
    Ok(match Option::<Value>::deserialize(de)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().trim_start_matches(['$', '₹']).replace(',', "").parse().ok(),
        _ => None,
    })
}

fn string_or_number<'de, D: Deserializer<'de>>(de: D) -> std::result::Result<String, D::Error> {
    Ok(match Option::<Value>::deserialize(de)? {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    })
}

// --- detect ---

#[derive(Debug, Default, Deserialize)]
struct WireBox {
    #[serde(default)]
    label: String,
    #[serde(default)]
    x1: f64,
    #[serde(default)]
    y1: f64,
    #[serde(default)]
    x2: f64,
    #[serde(default)]
    y2: f64,
    #[serde(default)]
    score: f64,
}

#[derive(Debug, Default, Deserialize)]
pub struct DetectResponse {
    #[serde(default)]
    objects: Vec<String>,
    #[serde(default)]
    annotated_image: Option<String>,
    #[serde(default)]
    confidence: Vec<f32>,
    #[serde(default, alias = "bboxes")]
    bounding_boxes: Vec<WireBox>,
}

impl DetectResponse {
    pub fn normalize(self) -> DetectionResult {
        let bounding_boxes: Vec<BoundingBox> = self
            .bounding_boxes
            .into_iter()
            .map(|b| BoundingBox {
                label: b.label,
                x1: b.x1.round() as i32,
                y1: b.y1.round() as i32,
                x2: b.x2.round() as i32,
                y2: b.y2.round() as i32,
                score: b.score as f32,
            })
            .collect();
        // Bare detectors only send boxes; derive the object list from their labels.
        let objects = if self.objects.is_empty() {
            let mut seen = BTreeSet::new();
            bounding_boxes
                .iter()
                .filter(|b| !b.label.is_empty() && seen.insert(b.label.clone()))
                .map(|b| b.label.clone())
                .collect()
        } else {
            self.objects
        };
        let confidence = if self.confidence.is_empty() {
            bounding_boxes.iter().map(|b| b.score).collect()
        } else {
            self.confidence
        };
        DetectionResult { objects, annotated_image: self.annotated_image, confidence, bounding_boxes }
    }
}

// --- segment ---

#[derive(Debug, Default, Deserialize)]
pub struct SegmentResponse {
    #[serde(default)]
    segmented_image: Option<String>,
    #[serde(default)]
    masks: Vec<Value>,
    #[serde(default)]
    num_segments: Option<u32>,
}

impl SegmentResponse {
    pub fn normalize(self) -> SegmentationResult {
        let num_segments = self.num_segments.unwrap_or(self.masks.len() as u32);
        SegmentationResult { segmented_image: self.segmented_image, masks: self.masks, num_segments }
    }
}

// --- advise ---

#[derive(Debug, Default, Deserialize)]
pub struct AdviseResponse {
    #[serde(default)]
    advice: Option<String>,
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    prompt: Option<String>,
}

impl AdviseResponse {
    pub fn normalize(self, requested_prompt: &str) -> AdviceResult {
        let text = self.advice.or(self.response).unwrap_or_default();
        AdviceResult::from_text(text, self.prompt.unwrap_or_else(|| requested_prompt.to_string()))
    }
}

// --- generate ---

#[derive(Debug, Default, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    generated_image: Option<String>,
    #[serde(default, alias = "image_b64")]
    image: Option<String>,
    #[serde(default)]
    canny_image: Option<String>,
    #[serde(default)]
    pass_a_image: Option<String>,
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    parameters: Option<Map<String, Value>>,
}

impl GenerateResponse {
    pub fn normalize(self, prompt: &str, options: &GenerateOptions) -> Result<GenerationResult> {
        let generated_image = self
            .generated_image
            .or(self.image)
            .filter(|img| !img.is_empty())
            .ok_or_else(|| ArtistryError::parse(Stage::Generate, "response has no generated_image"))?;
        let pass_a_image = if options.two_pass {
            Some(self.pass_a_image.filter(|img| !img.is_empty()).ok_or_else(|| {
                ArtistryError::parse(Stage::Generate, "two-pass generation returned no pass_a_image")
            })?)
        } else {
            None
        };
        let parameters_used = self.parameters.unwrap_or_else(|| options_as_parameters(options));
        Ok(GenerationResult {
            generated_image,
            canny_image: self.canny_image,
            pass_a_image,
            prompt: self.prompt.unwrap_or_else(|| prompt.to_string()),
            parameters_used,
        })
    }
}

fn options_as_parameters(options: &GenerateOptions) -> Map<String, Value> {
    match serde_json::to_value(options) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

// --- estimate cost ---

#[derive(Debug, Serialize)]
pub struct EstimateRequest<'a> {
    pub items: &'a [String],
    pub budget_tier: &'a str,
    pub room_size_sqft: f32,
}

#[derive(Debug, Default, Deserialize)]
struct WireItemCost {
    #[serde(default, alias = "item_name")]
    item: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    material_cost: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    labor_cost: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    total: Option<f64>,
    #[serde(default)]
    where_to_buy: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WireSavings {
    #[serde(default, deserialize_with = "lenient_f64")]
    professional_cost: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    diy_cost: Option<f64>,
    #[serde(default, alias = "savings_amount", deserialize_with = "lenient_f64")]
    savings: Option<f64>,
    #[serde(default, alias = "savings_percent", deserialize_with = "lenient_f64")]
    savings_percentage: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EstimateResponse {
    #[serde(default, alias = "total", deserialize_with = "lenient_f64")]
    total_cost: Option<f64>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    budget_tier: Option<String>,
    #[serde(default, alias = "per_item_costs", alias = "breakdown")]
    items: Vec<WireItemCost>,
    #[serde(default)]
    diy_vs_professional: Option<WireSavings>,
}

impl EstimateResponse {
    pub fn normalize(self, requested_tier: &str) -> CostEstimate {
        let per_item_costs: Vec<ItemCost> = self
            .items
            .into_iter()
            .map(|i| {
                let material_cost = i.material_cost.unwrap_or(0.0);
                let labor_cost = i.labor_cost.unwrap_or(0.0);
                ItemCost {
                    item: i.item,
                    material_cost,
                    labor_cost,
                    total: i.total.unwrap_or(material_cost + labor_cost),
                    where_to_buy: i.where_to_buy,
                }
            })
            .collect();

        let professional: f64 = per_item_costs.iter().map(|i| i.total).sum();
        let diy: f64 = per_item_costs.iter().map(|i| i.material_cost).sum();
        let derived = DiySavings {
            professional_cost: professional,
            diy_cost: diy,
            savings_amount: professional - diy,
            savings_percent: percent(professional - diy, professional),
        };
        let diy_vs_professional = match self.diy_vs_professional {
            None => derived,
            Some(s) => {
                let professional_cost = s.professional_cost.unwrap_or(derived.professional_cost);
                let diy_cost = s.diy_cost.unwrap_or(derived.diy_cost);
                let savings_amount = s.savings.unwrap_or(professional_cost - diy_cost);
                DiySavings {
                    professional_cost,
                    diy_cost,
                    savings_amount,
                    savings_percent: s
                        .savings_percentage
                        .unwrap_or_else(|| percent(savings_amount, professional_cost)),
                }
            }
        };

        CostEstimate {
            budget_tier: self.budget_tier.unwrap_or_else(|| requested_tier.to_string()),
            total_cost: self.total_cost.unwrap_or(professional),
            currency: self.currency.unwrap_or_else(|| "INR".into()),
            per_item_costs,
            diy_vs_professional,
        }
    }
}

fn percent(part: f64, whole: f64) -> f64 {
    if whole <= 0.0 {
        return 0.0;
    }
    (part / whole * 1000.0).round() / 10.0
}

// --- DIY ---

#[derive(Debug, Serialize)]
pub struct DiyRequest<'a> {
    pub item: &'a str,
    pub budget_tier: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct WireStep {
    #[serde(default)]
    step: Option<u32>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    duration_minutes: u32,
    #[serde(default)]
    tips: Vec<String>,
    #[serde(default)]
    safety_warning: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireTool {
    Name(String),
    Detailed {
        name: String,
        #[serde(default, alias = "cost_inr", deserialize_with = "lenient_f64")]
        cost: Option<f64>,
        #[serde(default, rename = "where")]
        where_to_buy: Option<String>,
        #[serde(default)]
        optional: bool,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireMaterial {
    Name(String),
    Detailed {
        item: String,
        #[serde(default)]
        budget_range: Option<String>,
        #[serde(default, rename = "where")]
        where_to_buy: Option<String>,
    },
}

#[derive(Debug, Default, Deserialize)]
pub struct DiyResponse {
    #[serde(default)]
    item: Option<String>,
    #[serde(default)]
    difficulty: Option<String>,
    #[serde(default, alias = "time_hours", deserialize_with = "lenient_f64")]
    estimated_time_hours: Option<f64>,
    #[serde(default)]
    steps: Vec<WireStep>,
    /// Short guides list plain sentences instead of structured steps.
    #[serde(default)]
    instructions: Vec<String>,
    #[serde(default)]
    tools_needed: Vec<WireTool>,
    #[serde(default)]
    materials_checklist: Vec<WireMaterial>,
    #[serde(default)]
    safety_tips: Vec<String>,
    #[serde(default)]
    note: Option<String>,
}

impl DiyResponse {
    pub fn normalize(self, requested_item: &str) -> DiyInstructions {
        let mut steps: Vec<DiyStep> = self
            .steps
            .into_iter()
            .enumerate()
            .map(|(idx, s)| DiyStep {
                step: s.step.unwrap_or(idx as u32 + 1),
                title: s.title,
                description: s.description,
                duration_minutes: s.duration_minutes,
                tips: s.tips,
                safety_warning: s.safety_warning.filter(|w| !w.trim().is_empty()),
            })
            .collect();
        if steps.is_empty() {
            steps = self
                .instructions
                .into_iter()
                .enumerate()
                .map(|(idx, text)| DiyStep {
                    step: idx as u32 + 1,
                    title: text,
                    description: String::new(),
                    duration_minutes: 0,
                    tips: Vec::new(),
                    safety_warning: None,
                })
                .collect();
        }
        // Ordered sequence: 1, 2, 3... regardless of how the service numbered them.
        steps.sort_by_key(|s| s.step);

        DiyInstructions {
            item: self.item.unwrap_or_else(|| requested_item.to_string()),
            difficulty: self.difficulty,
            estimated_time_hours: self.estimated_time_hours.map(|h| h as f32),
            steps,
            tools_needed: self
                .tools_needed
                .into_iter()
                .map(|t| match t {
                    WireTool::Name(name) => DiyTool { name, cost: None, where_to_buy: None, optional: false },
                    WireTool::Detailed { name, cost, where_to_buy, optional } => {
                        DiyTool { name, cost, where_to_buy, optional }
                    }
                })
                .collect(),
            materials_checklist: self
                .materials_checklist
                .into_iter()
                .map(|m| match m {
                    WireMaterial::Name(item) => DiyMaterial { item, budget_range: None, where_to_buy: None },
                    WireMaterial::Detailed { item, budget_range, where_to_buy } => {
                        DiyMaterial { item, budget_range, where_to_buy }
                    }
                })
                .collect(),
            safety_tips: self.safety_tips,
            note: self.note,
        }
    }
}

// --- proposals ---

#[derive(Debug, Default, Deserialize)]
pub struct ProposalResponse {
    #[serde(default)]
    recommendations: Vec<String>,
    #[serde(default, alias = "proposal", alias = "refined_design")]
    summary: Option<String>,
}

impl ProposalResponse {
    fn parts(self, stage: Stage) -> Result<(Vec<String>, String)> {
        let summary = self.summary.unwrap_or_default();
        let recommendations = if self.recommendations.is_empty() {
            split_advice(&summary)
        } else {
            self.recommendations
        };
        if recommendations.is_empty() {
            return Err(ArtistryError::parse(stage, "response carries no recommendations"));
        }
        Ok((recommendations, summary))
    }

    pub fn into_proposal(self) -> Result<DesignProposal> {
        let (recommendations, summary) = self.parts(Stage::Propose)?;
        Ok(DesignProposal { recommendations, summary })
    }

    pub fn into_refined(self, feedback: &str) -> Result<RefinedDesign> {
        let (recommendations, summary) = self.parts(Stage::Refine)?;
        Ok(RefinedDesign { recommendations, summary, feedback: feedback.to_string() })
    }
}

#[derive(Debug, Serialize)]
pub struct RefineRequest<'a> {
    pub recommendations: &'a [String],
    pub user_feedback: &'a str,
    pub room: &'a crate::client::RoomSummary,
}

#[skip_serializing_none]
#[derive(Debug, Serialize)]
pub struct PromptRequest<'a> {
    pub recommendations: &'a [String],
    pub summary: Option<&'a str>,
    pub user_feedback: Option<&'a str>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PromptResponse {
    #[serde(default, alias = "prompt")]
    image_prompt: Option<String>,
    #[serde(default)]
    negative_prompt: Option<String>,
}

impl PromptResponse {
    pub fn normalize(self) -> Result<DesignPrompt> {
        let image_prompt = self
            .image_prompt
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| ArtistryError::parse(Stage::BuildPrompt, "response has no image_prompt"))?;
        Ok(DesignPrompt { image_prompt, negative_prompt: self.negative_prompt })
    }
}

// --- commerce ---

#[derive(Debug, Default, Deserialize)]
struct WireProduct {
    #[serde(default, deserialize_with = "string_or_number")]
    product_id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    vendor: String,
    #[serde(default, deserialize_with = "string_or_number")]
    price: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    match_score: f32,
    #[serde(default)]
    affiliate: bool,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct MatchResponse {
    #[serde(default)]
    matches: Vec<WireProduct>,
}

impl MatchResponse {
    pub fn normalize(self, item: &str) -> ProductMatches {
        let mut matches: Vec<ProductMatch> = self
            .matches
            .into_iter()
            .map(|p| ProductMatch {
                product_id: p.product_id,
                name: p.name,
                vendor: p.vendor,
                price: p.price,
                url: p.url,
                image_url: p.image_url,
                match_score: p.match_score,
                affiliate: p.affiliate,
                description: p.description,
            })
            .collect();
        matches.sort_by(|a, b| b.match_score.total_cmp(&a.match_score));
        ProductMatches { item: item.to_string(), matches }
    }
}

// --- gateway ---

#[derive(Debug, Default, Deserialize)]
pub struct SaveResponse {
    #[serde(default, alias = "designId", alias = "id", alias = "run_id")]
    design_id: Option<String>,
}

impl SaveResponse {
    pub fn normalize(self) -> Result<SaveReceipt> {
        let run_id = self
            .design_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ArtistryError::parse(Stage::Save, "response has no design id"))?;
        Ok(SaveReceipt { run_id, saved_at: chrono::Utc::now() })
    }
}

#[derive(Debug, Serialize)]
pub struct ShareRequest<'a> {
    pub design_id: &'a str,
    pub platform: &'a str,
}

#[derive(Debug, Default, Deserialize)]
pub struct ShareResponse {
    #[serde(default, alias = "shareUrl", alias = "url")]
    share_url: Option<String>,
}

impl ShareResponse {
    pub fn normalize(self, platform: &str) -> Result<ShareLink> {
        let share_url = self
            .share_url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ArtistryError::parse(Stage::Share, "response has no share_url"))?;
        Ok(ShareLink { platform: platform.to_string(), share_url })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AuthResponse {
    #[serde(default, alias = "userId")]
    user_id: Option<String>,
    #[serde(default, alias = "access_token")]
    token: Option<String>,
}

impl AuthResponse {
    pub fn normalize(self) -> Result<AuthSession> {
        match (self.user_id, self.token) {
            (Some(user_id), Some(token)) if !token.is_empty() => Ok(AuthSession { user_id, token }),
            _ => Err(ArtistryError::parse(Stage::Auth, "response needs both user_id and token")),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct VerifyResponse {
    #[serde(default)]
    valid: bool,
    #[serde(default, alias = "userId")]
    user_id: Option<String>,
}

impl VerifyResponse {
    pub fn normalize(self) -> TokenStatus {
        TokenStatus { valid: self.valid, user_id: self.user_id.filter(|_| self.valid) }
    }
}

#[derive(Debug, Serialize)]
pub struct RoomJobRequest<'a> {
    pub image_b64: String,
    pub prompt: &'a str,
    pub options: &'a GenerateOptions,
}

#[derive(Debug, Default, Deserialize)]
pub struct RoomJobResponse {
    #[serde(default)]
    job_id: Option<String>,
}

impl RoomJobResponse {
    pub fn normalize(self) -> Result<RoomJob> {
        self.job_id
            .map(|job_id| RoomJob { job_id })
            .ok_or_else(|| ArtistryError::parse(Stage::RoomJob, "response has no job_id"))
    }
}

#[derive(Debug, Deserialize)]
pub struct RoomJobStatusResponse {
    job_id: String,
    status: RoomJobState,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

impl RoomJobStatusResponse {
    pub fn normalize(self) -> RoomJobStatus {
        RoomJobStatus { job_id: self.job_id, status: self.status, result: self.result, error: self.error }
    }
}
