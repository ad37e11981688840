//! In-memory `ServiceClient` for exercising the flows without a network.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Map;

use crate::client::{RoomSummary, ServiceClient};
use crate::error::{ArtistryError, Result};
use crate::models::{
    AuthSession, BudgetTier, Credentials, GenerateOptions, RoomJob, RoomJobState, RoomJobStatus,
    RunSummary, SaveReceipt, ShareLink, Stage, TokenStatus, UploadedImage,
};
use crate::results::{
    AdviceResult, CostEstimate, DesignPrompt, DesignProposal, DetectionResult, DiyInstructions,
    DiySavings, DiyStep, GenerationResult, ItemCost, ProductMatch, ProductMatches, ProductQuery,
    RefinedDesign, SegmentationResult,
};

pub const ADVICE_TEXT: &str = "1. Paint walls\n- Add rug\n\nUse warm lighting";

pub fn png() -> UploadedImage {
    UploadedImage::new("room.png", b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR".to_vec()).unwrap()
}

/// Low-tier fixture prices, per item: (material, labor).
fn low_tier_price(item: &str) -> (f64, f64) {
    match item {
        "bed" => (8000.0, 1500.0),
        "curtains" => (600.0, 200.0),
        "chair" => (2500.0, 300.0),
        _ => (5000.0, 1000.0),
    }
}

#[derive(Default)]
pub struct StubClient {
    failures: Mutex<HashMap<Stage, ArtistryError>>,
    failing_items: Mutex<HashSet<String>>,
    delays: Mutex<HashMap<Stage, Duration>>,
    calls: Mutex<Vec<Stage>>,
    pub estimate_args: Mutex<Vec<(Vec<String>, BudgetTier, f32)>>,
    pub generate_args: Mutex<Vec<(String, GenerateOptions)>>,
    pub feedback_seen: Mutex<Vec<String>>,
    pub saved: Mutex<Vec<RunSummary>>,
    job_states: Mutex<VecDeque<RoomJobState>>,
}

impl StubClient {
    pub fn failing(stage: Stage) -> Self {
        let stub = Self::default();
        stub.fail(stage);
        stub
    }

    pub fn fail(&self, stage: Stage) {
        self.failures
            .lock()
            .insert(stage, ArtistryError::status(stage, 503, format!("{stage} service unavailable")));
    }

    pub fn slow(&self, stage: Stage, delay: Duration) {
        self.delays.lock().insert(stage, delay);
    }

    pub fn fail_matches_for(&self, item: &str) {
        self.failing_items.lock().insert(item.to_string());
    }

    pub fn queue_job_states(&self, states: &[RoomJobState]) {
        self.job_states.lock().extend(states.iter().copied());
    }

    pub fn calls(&self) -> Vec<Stage> {
        self.calls.lock().clone()
    }

    pub fn calls_to(&self, stage: Stage) -> usize {
        self.calls.lock().iter().filter(|s| **s == stage).count()
    }

    /// Yields first so observers on the same runtime get to see each transition.
    async fn enter(&self, stage: Stage) -> Result<()> {
        tokio::task::yield_now().await;
        let delay = self.delays.lock().get(&stage).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.calls.lock().push(stage);
        match self.failures.lock().get(&stage) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ServiceClient for StubClient {
    async fn detect(&self, _image: &UploadedImage) -> Result<DetectionResult> {
        self.enter(Stage::Detect).await?;
        Ok(DetectionResult {
            objects: vec!["bed".into(), "curtains".into(), "chair".into()],
            confidence: vec![0.91, 0.84, 0.62],
            ..Default::default()
        })
    }

    async fn segment(&self, _image: &UploadedImage, sample_count: Option<i32>) -> Result<SegmentationResult> {
        if sample_count.is_some_and(|n| n <= 0) {
            return Err(ArtistryError::validation("sample count must be a positive integer"));
        }
        self.enter(Stage::Segment).await?;
        Ok(SegmentationResult { segmented_image: Some("seg".into()), masks: Vec::new(), num_segments: 3 })
    }

    async fn advise(&self, _image: &UploadedImage, prompt: &str) -> Result<AdviceResult> {
        self.enter(Stage::Advise).await?;
        Ok(AdviceResult::from_text(ADVICE_TEXT, prompt))
    }

    async fn generate(
        &self,
        _image: &UploadedImage,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<GenerationResult> {
        self.enter(Stage::Generate).await?;
        options.validate()?;
        self.generate_args.lock().push((prompt.to_string(), *options));
        Ok(GenerationResult {
            generated_image: "final-render".into(),
            canny_image: Some("edges".into()),
            pass_a_image: options.two_pass.then(|| "pass-a-render".to_string()),
            prompt: prompt.to_string(),
            parameters_used: Map::new(),
        })
    }

    async fn estimate_cost(
        &self,
        detected_objects: &[String],
        budget: BudgetTier,
        room_size_sqft: f32,
    ) -> Result<CostEstimate> {
        self.enter(Stage::EstimateCost).await?;
        self.estimate_args.lock().push((detected_objects.to_vec(), budget, room_size_sqft));
        let per_item_costs: Vec<ItemCost> = detected_objects
            .iter()
            .map(|item| {
                let (material, labor) = low_tier_price(item);
                let scale = match budget {
                    BudgetTier::Low => 1.0,
                    BudgetTier::Medium => 2.0,
                    BudgetTier::High => 5.0,
                };
                ItemCost {
                    item: item.clone(),
                    material_cost: material * scale,
                    labor_cost: labor * scale,
                    total: (material + labor) * scale,
                    where_to_buy: vec!["Amazon".into()],
                }
            })
            .collect();
        let total: f64 = per_item_costs.iter().map(|i| i.total).sum();
        let labor: f64 = per_item_costs.iter().map(|i| i.labor_cost).sum();
        Ok(CostEstimate {
            budget_tier: budget.as_str().into(),
            total_cost: total,
            currency: "INR".into(),
            per_item_costs,
            diy_vs_professional: DiySavings {
                professional_cost: total,
                diy_cost: total - labor,
                savings_amount: labor,
                savings_percent: if total > 0.0 { labor / total * 100.0 } else { 0.0 },
            },
        })
    }

    async fn diy_instructions(&self, item: &str, _budget: BudgetTier) -> Result<DiyInstructions> {
        self.enter(Stage::DiyInstructions).await?;
        Ok(DiyInstructions {
            item: item.to_string(),
            difficulty: Some("beginner".into()),
            steps: vec![DiyStep {
                step: 1,
                title: "Measure".into(),
                description: "Measure twice".into(),
                duration_minutes: 10,
                tips: Vec::new(),
                safety_warning: None,
            }],
            ..Default::default()
        })
    }

    async fn propose_design(&self, room: &RoomSummary) -> Result<DesignProposal> {
        self.enter(Stage::Propose).await?;
        Ok(DesignProposal {
            recommendations: room.objects_detected.iter().map(|o| format!("Refresh the {o}")).collect(),
            summary: "Lighter, calmer bedroom".into(),
        })
    }

    async fn refine_design(
        &self,
        recommendations: &[String],
        feedback: &str,
        _room: &RoomSummary,
    ) -> Result<RefinedDesign> {
        self.enter(Stage::Refine).await?;
        self.feedback_seen.lock().push(feedback.to_string());
        let mut recommendations = recommendations.to_vec();
        recommendations.push(format!("Honour: {feedback}"));
        Ok(RefinedDesign { recommendations, summary: "Refined".into(), feedback: feedback.to_string() })
    }

    async fn build_prompt(&self, design: &RefinedDesign) -> Result<DesignPrompt> {
        self.enter(Stage::BuildPrompt).await?;
        Ok(DesignPrompt { image_prompt: design.recommendations.join(", "), negative_prompt: None })
    }

    async fn match_products(&self, query: &ProductQuery) -> Result<ProductMatches> {
        self.enter(Stage::MatchProducts).await?;
        if self.failing_items.lock().contains(&query.item_type) {
            return Err(ArtistryError::status(Stage::MatchProducts, 404, "no catalog for item"));
        }
        Ok(ProductMatches {
            item: query.item_type.clone(),
            matches: vec![ProductMatch {
                product_id: format!("{}-1", query.item_type),
                name: format!("{} ({})", query.item_type, query.budget),
                vendor: "Urban Ladder".into(),
                price: "₹9,500".into(),
                url: "https://example.com/p/1".into(),
                image_url: None,
                match_score: 0.8,
                affiliate: true,
                description: String::new(),
            }],
        })
    }

    async fn save_run(&self, summary: &RunSummary) -> Result<SaveReceipt> {
        self.enter(Stage::Save).await?;
        self.saved.lock().push(summary.clone());
        Ok(SaveReceipt { run_id: format!("design-{}", summary.run_id), saved_at: chrono::Utc::now() })
    }

    async fn share_run(&self, run_id: &str, platform: &str) -> Result<ShareLink> {
        self.enter(Stage::Share).await?;
        Ok(ShareLink { platform: platform.into(), share_url: format!("https://share.example/{platform}/{run_id}") })
    }

    async fn authenticate(&self, credentials: &Credentials) -> Result<AuthSession> {
        self.enter(Stage::Auth).await?;
        Ok(AuthSession { user_id: credentials.email.clone(), token: "token".into() })
    }

    async fn verify_token(&self, token: &str) -> Result<TokenStatus> {
        self.enter(Stage::Auth).await?;
        Ok(TokenStatus { valid: token == "token", user_id: None })
    }

    async fn submit_room_job(
        &self,
        _image: &UploadedImage,
        _prompt: &str,
        _options: &GenerateOptions,
    ) -> Result<RoomJob> {
        self.enter(Stage::RoomJob).await?;
        Ok(RoomJob { job_id: "job-1".into() })
    }

    async fn room_job_status(&self, job_id: &str) -> Result<RoomJobStatus> {
        self.enter(Stage::RoomJob).await?;
        let status = self.job_states.lock().pop_front().unwrap_or(RoomJobState::Done);
        Ok(RoomJobStatus { job_id: job_id.into(), status, result: None, error: None })
    }
}
