//! Outbound calls to the AI services, one method per capability.

mod http;
pub mod wire;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    AuthSession, BudgetTier, Credentials, GenerateOptions, RoomJob, RoomJobStatus, RunSummary,
    SaveReceipt, ShareLink, TokenStatus, UploadedImage,
};
use crate::results::{
    AdviceResult, CostEstimate, DesignPrompt, DesignProposal, DetectionResult, DiyInstructions,
    GenerationResult, ProductMatches, ProductQuery, RefinedDesign, SegmentationResult,
};

pub use http::HttpServiceClient;

pub const DEFAULT_SAMPLE_COUNT: i32 = 10;
pub const DEFAULT_ADVICE_PROMPT: &str = "Analyze this room and provide interior design recommendations";

/// What the detector saw, condensed for the proposal endpoints.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RoomSummary {
    pub room_type: String,
    pub objects_detected: Vec<String>,
    pub lighting: String,
    pub room_size: String,
}

impl RoomSummary {
    pub fn from_detection(detection: &DetectionResult) -> Self {
        Self {
            room_type: "bedroom".into(),
            objects_detected: detection.objects.clone(),
            lighting: "natural".into(),
            room_size: "medium".into(),
        }
    }
}

/// Every external capability the orchestrator can call.
///
/// Each method issues exactly one request and returns a normalized result.
/// Waiting on room jobs is left to the caller (see `poll`).
#[async_trait]
pub trait ServiceClient: Send + Sync {
    async fn detect(&self, image: &UploadedImage) -> Result<DetectionResult>;

    /// `sample_count` must be positive; `None` means the default of 10.
    async fn segment(&self, image: &UploadedImage, sample_count: Option<i32>) -> Result<SegmentationResult>;

    async fn advise(&self, image: &UploadedImage, prompt: &str) -> Result<AdviceResult>;

    async fn generate(
        &self,
        image: &UploadedImage,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<GenerationResult>;

    async fn estimate_cost(
        &self,
        detected_objects: &[String],
        budget: BudgetTier,
        room_size_sqft: f32,
    ) -> Result<CostEstimate>;

    async fn diy_instructions(&self, item: &str, budget: BudgetTier) -> Result<DiyInstructions>;

    async fn propose_design(&self, room: &RoomSummary) -> Result<DesignProposal>;

    async fn refine_design(
        &self,
        recommendations: &[String],
        feedback: &str,
        room: &RoomSummary,
    ) -> Result<RefinedDesign>;

    async fn build_prompt(&self, design: &RefinedDesign) -> Result<DesignPrompt>;

    async fn match_products(&self, query: &ProductQuery) -> Result<ProductMatches>;

    async fn save_run(&self, summary: &RunSummary) -> Result<SaveReceipt>;

    async fn share_run(&self, run_id: &str, platform: &str) -> Result<ShareLink>;

    async fn authenticate(&self, credentials: &Credentials) -> Result<AuthSession>;

    async fn verify_token(&self, token: &str) -> Result<TokenStatus>;

    async fn submit_room_job(
        &self,
        image: &UploadedImage,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<RoomJob>;

    async fn room_job_status(&self, job_id: &str) -> Result<RoomJobStatus>;
}
