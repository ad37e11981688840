use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{error, info};

use super::wire::{self, error_message};
use super::{RoomSummary, ServiceClient, DEFAULT_ADVICE_PROMPT, DEFAULT_SAMPLE_COUNT};
use crate::config::{Config, ServiceEndpoints};
use crate::error::{ArtistryError, Result};
use crate::models::{
    AuthMode, AuthSession, BudgetTier, Credentials, GenerateOptions, RoomJob, RoomJobStatus,
    RunSummary, SaveReceipt, ShareLink, Stage, TokenStatus, UploadedImage,
};
use crate::results::{
    AdviceResult, CostEstimate, DesignPrompt, DesignProposal, DetectionResult, DiyInstructions,
    GenerationResult, ProductMatches, ProductQuery, RefinedDesign, SegmentationResult,
};

/// Shorten long (usually base64) strings for log lines.
pub(crate) fn preview(data: &str) -> String {
    match data.char_indices().nth(50) {
        Some((cut, _)) => format!("{}...[{} chars total]", &data[..cut], data.chars().count()),
        None => data.to_string(),
    }
}

fn transport_error(stage: Stage, timeout: Duration, err: reqwest::Error) -> ArtistryError {
    if err.is_timeout() {
        ArtistryError::service(stage, format!("timed out after {timeout:?}"))
    } else {
        ArtistryError::service(stage, err.to_string())
    }
}

/// Job ids end up in the gateway URL path, so only plain segments are allowed.
fn check_job_id(job_id: &str) -> Result<()> {
    let plain = !job_id.is_empty() && job_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if plain {
        Ok(())
    } else {
        Err(ArtistryError::validation(format!("invalid room job id '{job_id}'")))
    }
}

/// reqwest-backed client for the Artistry services.
pub struct HttpServiceClient {
    client: Client,
    endpoints: ServiceEndpoints,
    request_timeout: Duration,
    generation_timeout: Duration,
}

impl HttpServiceClient {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            endpoints: config.endpoints.clone(),
            request_timeout: config.request_timeout,
            generation_timeout: config.generation_timeout,
        }
    }

    pub fn endpoints(&self) -> &ServiceEndpoints {
        &self.endpoints
    }

    fn image_part(image: &UploadedImage, stage: Stage) -> Result<Part> {
        Part::bytes(image.bytes().to_vec())
            .file_name(image.file_name().to_string())
            .mime_str(image.mime_type())
            .map_err(|e| ArtistryError::service(stage, format!("invalid image part: {e}")))
    }

    /// Send one request and decode the success body as `T`.
    async fn perform<T: DeserializeOwned>(
        &self,
        stage: Stage,
        request: RequestBuilder,
        timeout: Duration,
    ) -> Result<T> {
        let response = request
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| transport_error(stage, timeout, e))?;

        let status = response.status();
        info!("📥 {} response status: {}", stage, status);

        let body = response.text().await.map_err(|e| transport_error(stage, timeout, e))?;

        if !status.is_success() {
            let message = error_message(status.as_u16(), &body);
            error!("❌ {} error response: {}", stage, preview(&body));
            return Err(ArtistryError::status(stage, status.as_u16(), message));
        }

        serde_json::from_str(&body).map_err(|e| {
            error!("❌ {} returned malformed JSON: {}", stage, preview(&body));
            ArtistryError::parse(stage, e.to_string())
        })
    }

    fn url(base: &str, path: &str) -> String {
        format!("{}{}", base.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl ServiceClient for HttpServiceClient {
    async fn detect(&self, image: &UploadedImage) -> Result<DetectionResult> {
        let url = Self::url(&self.endpoints.detect, "/detect/");
        info!("🔗 Detecting objects via {} ({} bytes)", url, image.len());
        let form = Form::new().part("file", Self::image_part(image, Stage::Detect)?);
        let raw: wire::DetectResponse = self
            .perform(Stage::Detect, self.client.post(&url).multipart(form), self.request_timeout)
            .await?;
        let result = raw.normalize();
        info!("✅ Detected {} objects: {}", result.objects.len(), result.objects.join(", "));
        Ok(result)
    }

    async fn segment(&self, image: &UploadedImage, sample_count: Option<i32>) -> Result<SegmentationResult> {
        let samples = sample_count.unwrap_or(DEFAULT_SAMPLE_COUNT);
        if samples <= 0 {
            return Err(ArtistryError::validation(format!(
                "sample count must be a positive integer, got {samples}"
            )));
        }
        let url = Self::url(&self.endpoints.segment, "/segment/");
        info!("🔗 Segmenting image via {} with {} samples", url, samples);
        let form = Form::new()
            .part("file", Self::image_part(image, Stage::Segment)?)
            .text("num_samples", samples.to_string());
        let raw: wire::SegmentResponse = self
            .perform(Stage::Segment, self.client.post(&url).multipart(form), self.request_timeout)
            .await?;
        let result = raw.normalize();
        info!("✅ Segmentation produced {} segments", result.num_segments);
        Ok(result)
    }

    async fn advise(&self, image: &UploadedImage, prompt: &str) -> Result<AdviceResult> {
        let prompt = if prompt.trim().is_empty() { DEFAULT_ADVICE_PROMPT } else { prompt };
        let url = Self::url(&self.endpoints.advise, "/advise/");
        info!("🔗 Requesting design advice via {}", url);
        let form = Form::new()
            .part("file", Self::image_part(image, Stage::Advise)?)
            .text("prompt", prompt.to_string());
        let raw: wire::AdviseResponse = self
            .perform(Stage::Advise, self.client.post(&url).multipart(form), self.request_timeout)
            .await?;
        let result = raw.normalize(prompt);
        info!("✅ Advice parsed into {} items ({} chars)", result.advice_items.len(), result.full_text.len());
        Ok(result)
    }

    async fn generate(
        &self,
        image: &UploadedImage,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<GenerationResult> {
        options.validate()?;
        let url = Self::url(&self.endpoints.generate, "/generate/");
        let timeout = if options.two_pass { self.generation_timeout * 2 } else { self.generation_timeout };
        info!(
            "🎯 Generating design via {} (mode={}, two_pass={}, steps={}) with prompt: {}",
            url,
            options.mode.as_str(),
            options.two_pass,
            options.num_inference_steps,
            &prompt[..prompt.char_indices().nth(100).map_or(prompt.len(), |(i, _)| i)]
        );
        let form = Form::new()
            .part("file", Self::image_part(image, Stage::Generate)?)
            .text("prompt", prompt.to_string())
            .text("num_inference_steps", options.num_inference_steps.to_string())
            .text("guidance_scale", options.guidance_scale.to_string())
            .text("mode", options.mode.as_str())
            .text("two_pass", options.two_pass.to_string())
            .text("controlnet_conditioning_scale", options.controlnet_conditioning_scale.to_string());
        let raw: wire::GenerateResponse = self
            .perform(Stage::Generate, self.client.post(&url).multipart(form), timeout)
            .await?;
        let result = raw.normalize(prompt, options)?;
        info!("✅ Generated design: {}", preview(&result.generated_image));
        Ok(result)
    }

    async fn estimate_cost(
        &self,
        detected_objects: &[String],
        budget: BudgetTier,
        room_size_sqft: f32,
    ) -> Result<CostEstimate> {
        let url = Self::url(&self.endpoints.advise, "/estimate/total-cost");
        info!("💰 Estimating cost for {} items at {} budget", detected_objects.len(), budget);
        let body = wire::EstimateRequest {
            items: detected_objects,
            budget_tier: budget.as_str(),
            room_size_sqft,
        };
        let raw: wire::EstimateResponse = self
            .perform(Stage::EstimateCost, self.client.post(&url).json(&body), self.request_timeout)
            .await?;
        Ok(raw.normalize(budget.as_str()))
    }

    async fn diy_instructions(&self, item: &str, budget: BudgetTier) -> Result<DiyInstructions> {
        let url = Self::url(&self.endpoints.advise, "/diy/instructions");
        info!("🔨 Fetching DIY guide for '{}'", item);
        let body = wire::DiyRequest { item, budget_tier: budget.as_str() };
        let raw: wire::DiyResponse = self
            .perform(Stage::DiyInstructions, self.client.post(&url).json(&body), self.request_timeout)
            .await?;
        Ok(raw.normalize(item))
    }

    async fn propose_design(&self, room: &RoomSummary) -> Result<DesignProposal> {
        let url = Self::url(&self.endpoints.advise, "/proposal/initial");
        info!("💡 Requesting initial proposal for {} with {} objects", room.room_type, room.objects_detected.len());
        let raw: wire::ProposalResponse = self
            .perform(Stage::Propose, self.client.post(&url).json(room), self.request_timeout)
            .await?;
        raw.into_proposal()
    }

    async fn refine_design(
        &self,
        recommendations: &[String],
        feedback: &str,
        room: &RoomSummary,
    ) -> Result<RefinedDesign> {
        let url = Self::url(&self.endpoints.advise, "/proposal/refine");
        info!("💡 Refining proposal with feedback: {}", preview(feedback));
        let body = wire::RefineRequest { recommendations, user_feedback: feedback, room };
        let raw: wire::ProposalResponse = self
            .perform(Stage::Refine, self.client.post(&url).json(&body), self.request_timeout)
            .await?;
        raw.into_refined(feedback)
    }

    async fn build_prompt(&self, design: &RefinedDesign) -> Result<DesignPrompt> {
        let url = Self::url(&self.endpoints.advise, "/proposal/prompt");
        let body = wire::PromptRequest {
            recommendations: &design.recommendations,
            summary: Some(design.summary.as_str()).filter(|s| !s.is_empty()),
            user_feedback: Some(design.feedback.as_str()).filter(|s| !s.is_empty()),
        };
        let raw: wire::PromptResponse = self
            .perform(Stage::BuildPrompt, self.client.post(&url).json(&body), self.request_timeout)
            .await?;
        raw.normalize()
    }

    async fn match_products(&self, query: &ProductQuery) -> Result<ProductMatches> {
        let url = Self::url(&self.endpoints.commerce, "/commerce/match-products");
        info!("🛒 Matching products for '{}' ({} budget)", query.item_type, query.budget);
        let raw: wire::MatchResponse = self
            .perform(Stage::MatchProducts, self.client.post(&url).json(query), self.request_timeout)
            .await?;
        Ok(raw.normalize(&query.item_type))
    }

    async fn save_run(&self, summary: &RunSummary) -> Result<SaveReceipt> {
        let url = Self::url(&self.endpoints.gateway, "/designs/save");
        info!("💾 Saving run {}", summary.run_id);
        let raw: wire::SaveResponse = self
            .perform(Stage::Save, self.client.post(&url).json(summary), self.request_timeout)
            .await?;
        raw.normalize()
    }

    async fn share_run(&self, run_id: &str, platform: &str) -> Result<ShareLink> {
        let url = Self::url(&self.endpoints.gateway, "/designs/share");
        let body = wire::ShareRequest { design_id: run_id, platform };
        let raw: wire::ShareResponse = self
            .perform(Stage::Share, self.client.post(&url).json(&body), self.request_timeout)
            .await?;
        raw.normalize(platform)
    }

    async fn authenticate(&self, credentials: &Credentials) -> Result<AuthSession> {
        let path = match credentials.mode {
            AuthMode::Login => "/auth/login",
            AuthMode::Signup => "/auth/signup",
        };
        let url = Self::url(&self.endpoints.gateway, path);
        let body = json!({
            "email": credentials.email,
            "password": credentials.password,
            "name": credentials.name,
        });
        let raw: wire::AuthResponse = self
            .perform(Stage::Auth, self.client.post(&url).json(&body), self.request_timeout)
            .await?;
        raw.normalize()
    }

    async fn verify_token(&self, token: &str) -> Result<TokenStatus> {
        let url = Self::url(&self.endpoints.gateway, "/auth/verify");
        let raw: wire::VerifyResponse = self
            .perform(Stage::Auth, self.client.post(&url).json(&json!({ "token": token })), self.request_timeout)
            .await?;
        Ok(raw.normalize())
    }

    async fn submit_room_job(
        &self,
        image: &UploadedImage,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<RoomJob> {
        options.validate()?;
        let url = Self::url(&self.endpoints.gateway, "/rooms");
        let body = wire::RoomJobRequest { image_b64: image.to_base64(), prompt, options };
        let raw: wire::RoomJobResponse = self
            .perform(Stage::RoomJob, self.client.post(&url).json(&body), self.request_timeout)
            .await?;
        raw.normalize()
    }

    async fn room_job_status(&self, job_id: &str) -> Result<RoomJobStatus> {
        check_job_id(job_id)?;
        let url = Self::url(&self.endpoints.gateway, &format!("/rooms/{job_id}"));
        let raw: wire::RoomJobStatusResponse = self
            .perform(Stage::RoomJob, self.client.get(&url), self.request_timeout)
            .await?;
        Ok(raw.normalize())
    }
}
