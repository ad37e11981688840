use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::phase::{FlowKind, Phase};
use super::projection::WorkflowSnapshot;
use crate::error::{ArtistryError, LastError};
use crate::models::{RunSummary, SaveReceipt, ShareLink, Stage, UploadedImage, UserPreferences};
use crate::results::{
    AdviceResult, CostEstimate, DesignProposal, DetectionResult, DiyInstructions,
    GenerationResult, RefinedDesign, SegmentationResult, StageResult,
};

/// One end-to-end execution against one uploaded image.
///
/// Only the orchestrator mutates a run; everything else reads it or a
/// snapshot of it.
#[derive(Debug, Clone)]
pub struct WorkflowRun {
    id: Uuid,
    flow: FlowKind,
    image: UploadedImage,
    preferences: UserPreferences,
    phase: Phase,
    progress: u8,
    results: Vec<StageResult>,
    last_error: Option<LastError>,
    save_receipt: Option<SaveReceipt>,
    shares: Vec<ShareLink>,
    diy_guides: BTreeMap<String, DiyInstructions>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl WorkflowRun {
    pub(crate) fn new(flow: FlowKind, image: UploadedImage, preferences: UserPreferences) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            flow,
            image,
            preferences,
            phase: Phase::Idle,
            progress: 0,
            results: Vec::new(),
            last_error: None,
            save_receipt: None,
            shares: Vec::new(),
            diy_guides: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn flow(&self) -> FlowKind { self.flow }
    pub fn image(&self) -> &UploadedImage { &self.image }
    pub fn preferences(&self) -> &UserPreferences { &self.preferences }
    pub fn phase(&self) -> Phase { self.phase }
    pub fn progress(&self) -> u8 { self.progress }
    pub fn results(&self) -> &[StageResult] { &self.results }
    pub fn last_error(&self) -> Option<&LastError> { self.last_error.as_ref() }
    pub fn save_receipt(&self) -> Option<&SaveReceipt> { self.save_receipt.as_ref() }
    pub fn shares(&self) -> &[ShareLink] { &self.shares }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }

    pub fn diy_guide(&self, item: &str) -> Option<&DiyInstructions> {
        self.diy_guides.get(&item.to_lowercase())
    }

    pub fn detection(&self) -> Option<&DetectionResult> {
        self.results.iter().find_map(|r| match r {
            StageResult::Detection(d) => Some(d),
            _ => None,
        })
    }

    pub fn segmentation(&self) -> Option<&SegmentationResult> {
        self.results.iter().find_map(|r| match r {
            StageResult::Segmentation(s) => Some(s),
            _ => None,
        })
    }

    pub fn advice(&self) -> Option<&AdviceResult> {
        self.results.iter().find_map(|r| match r {
            StageResult::Advice(a) => Some(a),
            _ => None,
        })
    }

    pub fn proposal(&self) -> Option<&DesignProposal> {
        self.results.iter().find_map(|r| match r {
            StageResult::Proposal(p) => Some(p),
            _ => None,
        })
    }

    pub fn refined_design(&self) -> Option<&RefinedDesign> {
        self.results.iter().find_map(|r| match r {
            StageResult::Refinement(d) => Some(d),
            _ => None,
        })
    }

    pub fn generation(&self) -> Option<&GenerationResult> {
        self.results.iter().find_map(|r| match r {
            StageResult::Generation(g) => Some(g),
            _ => None,
        })
    }

    pub fn cost_estimate(&self) -> Option<&CostEstimate> {
        self.results.iter().find_map(|r| match r {
            StageResult::CostEstimate(c) => Some(c),
            _ => None,
        })
    }

    pub fn detected_objects(&self) -> Vec<String> {
        self.detection().map(|d| d.objects.clone()).unwrap_or_default()
    }

    /// Stages recorded so far, in order.
    pub fn stages(&self) -> Vec<Stage> {
        self.results.iter().map(StageResult::stage).collect()
    }

    pub(crate) fn enter(&mut self, phase: Phase) {
        self.phase = phase;
        if let Some(percent) = phase.progress(self.flow) {
            // 100 belongs to Complete alone.
            let cap = if phase == Phase::Complete { 100 } else { 99 };
            self.progress = self.progress.max(percent.min(cap));
        }
        self.touch();
    }

    pub(crate) fn record(&mut self, result: StageResult) {
        self.results.push(result);
        self.touch();
    }

    pub(crate) fn fail(&mut self, stage: Stage, err: &ArtistryError) {
        self.phase = Phase::Errored(stage);
        self.last_error = Some(LastError { stage: Some(stage), message: err.to_string() });
        self.touch();
    }

    /// Record a user-visible error without moving the run.
    pub(crate) fn note_error(&mut self, err: &ArtistryError) {
        self.last_error = Some(LastError::from(err));
        self.touch();
    }

    pub(crate) fn clear_error(&mut self) {
        self.last_error = None;
    }

    pub(crate) fn set_preferences(&mut self, preferences: UserPreferences) {
        self.preferences = preferences;
        self.touch();
    }

    pub(crate) fn set_save_receipt(&mut self, receipt: SaveReceipt) {
        self.save_receipt = Some(receipt);
        self.touch();
    }

    pub(crate) fn add_share(&mut self, link: ShareLink) {
        self.shares.push(link);
        self.touch();
    }

    pub(crate) fn cache_diy(&mut self, item: &str, guide: DiyInstructions) {
        self.diy_guides.insert(item.to_lowercase(), guide);
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            run_id: self.id,
            design_name: format!("Room Redesign {}", self.created_at.format("%Y-%m-%d")),
            original_image: None,
            detected_objects: self.detected_objects(),
            segmented_image: self.segmentation().and_then(|s| s.segmented_image.clone()),
            advice: self
                .advice()
                .map(|a| a.advice_items.clone())
                .or_else(|| self.refined_design().map(|d| d.recommendations.clone()))
                .unwrap_or_default(),
            generated_image: self.generation().map(|g| g.generated_image.clone()),
            prompt: self.generation().map(|g| g.prompt.clone()),
            cost_estimate: self.cost_estimate().cloned(),
            timestamp: Utc::now(),
        }
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        WorkflowSnapshot {
            run_id: Some(self.id),
            flow: Some(self.flow),
            phase: self.phase,
            progress_percent: self.progress,
            progress_message: self.phase.message(),
            results: self.results.clone(),
            last_error: self.last_error.clone(),
            image: Some(self.image.describe()),
            save_receipt: self.save_receipt.clone(),
            shares: self.shares.clone(),
            diy_guides: self.diy_guides.clone(),
            updated_at: self.updated_at,
        }
    }
}
