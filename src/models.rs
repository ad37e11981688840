use std::fmt;
use std::str::FromStr;

use base64::Engine;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ArtistryError, Result};

/// One external capability invocation within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Detect,
    Segment,
    Advise,
    Generate,
    Propose,
    Refine,
    BuildPrompt,
    EstimateCost,
    MatchProducts,
    DiyInstructions,
    Save,
    Share,
    Auth,
    RoomJob,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Detect => "detect",
            Stage::Segment => "segment",
            Stage::Advise => "advise",
            Stage::Generate => "generate",
            Stage::Propose => "propose",
            Stage::Refine => "refine",
            Stage::BuildPrompt => "build-prompt",
            Stage::EstimateCost => "estimate-cost",
            Stage::MatchProducts => "match-products",
            Stage::DiyInstructions => "diy-instructions",
            Stage::Save => "save",
            Stage::Share => "share",
            Stage::Auth => "auth",
            Stage::RoomJob => "room-job",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetTier {
    Low,
    #[default]
    Medium,
    High,
}

impl BudgetTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetTier::Low => "low",
            BudgetTier::Medium => "medium",
            BudgetTier::High => "high",
        }
    }

    /// How hard generation may push away from the source photo at this tier.
    pub fn generation_mode(&self) -> GenerationMode {
        match self {
            BudgetTier::Low => GenerationMode::Subtle,
            BudgetTier::Medium => GenerationMode::Balanced,
            BudgetTier::High => GenerationMode::Bold,
        }
    }
}

impl FromStr for BudgetTier {
    type Err = ArtistryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(BudgetTier::Low),
            "medium" => Ok(BudgetTier::Medium),
            "high" => Ok(BudgetTier::High),
            other => Err(ArtistryError::validation(format!(
                "unknown budget tier '{other}' (expected low, medium or high)"
            ))),
        }
    }
}

impl fmt::Display for BudgetTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    Subtle,
    #[default]
    Balanced,
    Bold,
}

impl GenerationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationMode::Subtle => "subtle",
            GenerationMode::Balanced => "balanced",
            GenerationMode::Bold => "bold",
        }
    }
}

impl FromStr for GenerationMode {
    type Err = ArtistryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "subtle" => Ok(GenerationMode::Subtle),
            "balanced" => Ok(GenerationMode::Balanced),
            "bold" => Ok(GenerationMode::Bold),
            other => Err(ArtistryError::validation(format!(
                "unknown generation mode '{other}' (expected subtle, balanced or bold)"
            ))),
        }
    }
}

/// Knobs forwarded to the diffusion service.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerateOptions {
    pub num_inference_steps: u32,
    pub guidance_scale: f32,
    pub mode: GenerationMode,
    /// First pass output seeds a refinement pass; roughly doubles latency.
    pub two_pass: bool,
    pub controlnet_conditioning_scale: f32,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            num_inference_steps: 20,
            guidance_scale: 7.5,
            mode: GenerationMode::Balanced,
            two_pass: false,
            controlnet_conditioning_scale: 0.5,
        }
    }
}

impl GenerateOptions {
    pub fn for_budget(tier: BudgetTier) -> Self {
        Self { mode: tier.generation_mode(), ..Self::default() }
    }

    /// Settings used for the final render of a refined design.
    pub fn refined() -> Self {
        Self {
            num_inference_steps: 30,
            guidance_scale: 7.5,
            mode: GenerationMode::Balanced,
            two_pass: true,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_inference_steps == 0 {
            return Err(ArtistryError::validation("numInferenceSteps must be positive"));
        }
        if !self.guidance_scale.is_finite() || self.guidance_scale <= 0.0 {
            return Err(ArtistryError::validation("guidanceScale must be a positive number"));
        }
        if !self.controlnet_conditioning_scale.is_finite() || self.controlnet_conditioning_scale < 0.0 {
            return Err(ArtistryError::validation(
                "controlnetConditioningScale must be a non-negative number",
            ));
        }
        Ok(())
    }
}

/// The room photo a run works on.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    file_name: String,
    mime_type: &'static str,
    bytes: Bytes,
}

impl UploadedImage {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(ArtistryError::validation("Please select an image to upload"));
        }
        let format = image::guess_format(&bytes)
            .map_err(|_| ArtistryError::validation("uploaded file is not a recognizable image"))?;
        let mut file_name = file_name.into();
        if file_name.trim().is_empty() {
            file_name = format!("upload.{}", format.extensions_str().first().copied().unwrap_or("img"));
        }
        Ok(Self { file_name, mime_type: format.to_mime_type(), bytes })
    }

    pub fn file_name(&self) -> &str { &self.file_name }

    pub fn mime_type(&self) -> &'static str { self.mime_type }

    pub fn bytes(&self) -> &Bytes { &self.bytes }

    pub fn len(&self) -> usize { self.bytes.len() }

    pub fn is_empty(&self) -> bool { self.bytes.is_empty() }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }

    pub fn describe(&self) -> ImageInfo {
        ImageInfo {
            file_name: self.file_name.clone(),
            mime_type: self.mime_type.to_string(),
            size_bytes: self.bytes.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageInfo {
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: usize,
}

fn default_room_size() -> f32 { 150.0 }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    #[serde(default, alias = "budget_range")]
    pub budget: BudgetTier,
    /// Free-text style direction, e.g. "warm scandinavian".
    #[serde(default, alias = "design_tips")]
    pub prompt: String,
    #[serde(default, alias = "item_replacement")]
    pub selected_items: Vec<String>,
    #[serde(default = "default_room_size")]
    pub room_size_sqft: f32,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            budget: BudgetTier::default(),
            prompt: String::new(),
            selected_items: Vec::new(),
            room_size_sqft: default_room_size(),
        }
    }
}

impl UserPreferences {
    pub fn with_prompt(prompt: impl Into<String>) -> Self {
        Self { prompt: prompt.into(), ..Self::default() }
    }

    /// The caller's prompt, if it says anything at all.
    pub fn style_prompt(&self) -> Option<&str> {
        let trimmed = self.prompt.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

/// What gets persisted by the gateway when a run is saved.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: uuid::Uuid,
    pub design_name: String,
    pub original_image: Option<String>,
    pub detected_objects: Vec<String>,
    pub segmented_image: Option<String>,
    pub advice: Vec<String>,
    pub generated_image: Option<String>,
    pub prompt: Option<String>,
    pub cost_estimate: Option<crate::results::CostEstimate>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveReceipt {
    pub run_id: String,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareLink {
    pub platform: String,
    pub share_url: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    #[default]
    Login,
    Signup,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    #[serde(default)]
    pub mode: AuthMode,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub user_id: String,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenStatus {
    pub valid: bool,
    pub user_id: Option<String>,
}

/// Job submitted to the gateway's asynchronous room pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomJob {
    pub job_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomJobState {
    Pending,
    Running,
    Done,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomJobStatus {
    pub job_id: String,
    pub status: RoomJobState,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl RoomJobStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self.status, RoomJobState::Done | RoomJobState::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    #[test]
    fn uploaded_image_sniffs_format() {
        let image = UploadedImage::new("room.png", PNG_MAGIC.to_vec()).unwrap();
        assert_eq!(image.mime_type(), "image/png");
        assert!(image.data_url().starts_with("data:image/png;base64,iVBORw0KGgo"));
    }

    #[test]
    fn uploaded_image_rejects_empty_and_garbage() {
        assert!(UploadedImage::new("room.png", Vec::<u8>::new()).unwrap_err().is_validation());
        assert!(UploadedImage::new("notes.txt", b"hello world".to_vec()).unwrap_err().is_validation());
    }

    #[test]
    fn blank_file_name_gets_extension_from_format() {
        let image = UploadedImage::new("  ", PNG_MAGIC.to_vec()).unwrap();
        assert_eq!(image.file_name(), "upload.png");
    }

    #[test]
    fn generation_mode_rejects_unknown_values() {
        assert_eq!("bold".parse::<GenerationMode>().unwrap(), GenerationMode::Bold);
        assert!("dramatic".parse::<GenerationMode>().unwrap_err().is_validation());
    }

    #[test]
    fn budget_tier_drives_generation_mode() {
        assert_eq!(GenerateOptions::for_budget(BudgetTier::Low).mode, GenerationMode::Subtle);
        assert_eq!(GenerateOptions::for_budget(BudgetTier::High).mode, GenerationMode::Bold);
        assert_eq!(" HIGH ".parse::<BudgetTier>().unwrap(), BudgetTier::High);
    }

    #[test]
    fn options_validation() {
        assert!(GenerateOptions::default().validate().is_ok());
        let zero_steps = GenerateOptions { num_inference_steps: 0, ..Default::default() };
        assert!(zero_steps.validate().is_err());
        let nan_guidance = GenerateOptions { guidance_scale: f32::NAN, ..Default::default() };
        assert!(nan_guidance.validate().is_err());
    }

    #[test]
    fn preferences_accept_wire_aliases() {
        let prefs: UserPreferences = serde_json::from_value(serde_json::json!({
            "budget_range": "low",
            "design_tips": "japandi",
            "item_replacement": ["bed", "curtains"]
        }))
        .unwrap();
        assert_eq!(prefs.budget, BudgetTier::Low);
        assert_eq!(prefs.style_prompt(), Some("japandi"));
        assert_eq!(prefs.selected_items, vec!["bed", "curtains"]);
        assert_eq!(prefs.room_size_sqft, 150.0);
    }
}
