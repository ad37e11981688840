//! Sequencing of service calls into runs, and the state observers see.

mod budget;
mod interactive;
mod jobs;
mod linear;
pub mod phase;
pub mod projection;
pub mod run;

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::client::ServiceClient;
use crate::error::{ArtistryError, Result};
use crate::models::{ShareLink, Stage, UploadedImage, UserPreferences};
use crate::results::{DiyInstructions, StageResult};

pub use jobs::wait_for_room_job;
pub use phase::{FlowKind, Phase};
pub use projection::{StateProjection, WorkflowSnapshot};
pub use run::WorkflowRun;

pub const DEFAULT_DESIGN_PROMPT: &str = "Modern minimalist interior design";

/// Runs stages against the services, one at a time, and keeps the projection
/// in step with every transition.
#[derive(Clone)]
pub struct Orchestrator {
    client: Arc<dyn ServiceClient>,
    projection: StateProjection,
    save_results: bool,
}

impl Orchestrator {
    pub fn new(client: Arc<dyn ServiceClient>, projection: StateProjection) -> Self {
        Self { client, projection, save_results: true }
    }

    /// Whether finished runs are persisted through the gateway.
    pub fn with_save(mut self, save_results: bool) -> Self {
        self.save_results = save_results;
        self
    }

    pub fn projection(&self) -> &StateProjection {
        &self.projection
    }

    pub fn client(&self) -> &Arc<dyn ServiceClient> {
        &self.client
    }

    /// Start a fresh run. Whatever run the projection was showing is abandoned.
    pub fn new_run(&self, flow: FlowKind, image: UploadedImage, preferences: UserPreferences) -> WorkflowRun {
        let run = WorkflowRun::new(flow, image, preferences);
        info!("🚀 Starting {} run {} for {}", flow.as_str(), run.id(), run.image().file_name());
        self.projection.reset(run.id(), flow);
        self.publish(&run);
        run
    }

    fn publish(&self, run: &WorkflowRun) {
        self.projection.publish(run.snapshot());
    }

    fn enter(&self, run: &mut WorkflowRun, phase: Phase) {
        run.enter(phase);
        info!(run_id = %run.id(), progress = run.progress(), "{}", phase.message());
        self.publish(run);
    }

    fn record(&self, run: &mut WorkflowRun, result: StageResult) {
        info!(run_id = %run.id(), "✅ {} recorded", result.stage());
        run.record(result);
        self.publish(run);
    }

    /// Pass a required stage's outcome through, moving the run to
    /// `Errored(stage)` when it failed.
    fn check<T>(&self, run: &mut WorkflowRun, stage: Stage, outcome: Result<T>) -> Result<T> {
        outcome.map_err(|err| {
            error!(run_id = %run.id(), "❌ {}", err);
            run.fail(stage, &err);
            self.publish(run);
            err
        })
    }

    /// Reject input the caller can fix; the run stays where it is.
    fn reject(&self, run: &mut WorkflowRun, message: &str) -> ArtistryError {
        let err = ArtistryError::validation(message);
        run.note_error(&err);
        self.publish(run);
        err
    }

    fn require_phase(&self, run: &WorkflowRun, flow: FlowKind, allowed: &[Phase]) -> Result<()> {
        if run.flow() != flow {
            return Err(ArtistryError::validation(format!(
                "run {} is a {} run, not {}",
                run.id(),
                run.flow().as_str(),
                flow.as_str()
            )));
        }
        if !allowed.contains(&run.phase()) {
            return Err(ArtistryError::validation(format!(
                "run {} cannot do that while {:?}",
                run.id(),
                run.phase()
            )));
        }
        Ok(())
    }

    /// Optional persistence; failures are logged and never fail the run.
    async fn persist(&self, run: &mut WorkflowRun) {
        if !self.save_results {
            return;
        }
        self.enter(run, Phase::Saving);
        match self.client.save_run(&run.summary()).await {
            Ok(receipt) => {
                info!(run_id = %run.id(), "💾 Saved as {}", receipt.run_id);
                run.set_save_receipt(receipt);
            }
            Err(err) => warn!(run_id = %run.id(), "⚠️ Save failed, keeping results unsaved: {}", err),
        }
    }

    fn complete(&self, run: &mut WorkflowRun) {
        run.clear_error();
        self.enter(run, Phase::Complete);
        info!(run_id = %run.id(), stages = ?run.stages(), "🎉 Run complete");
    }

    /// Step-by-step DIY guide for one item of a finished run; cached per item.
    pub async fn diy_instructions(&self, run: &mut WorkflowRun, item: &str) -> Result<DiyInstructions> {
        if run.phase() != Phase::Complete {
            return Err(ArtistryError::validation("DIY guides are available once the run is complete"));
        }
        let item = item.trim();
        if item.is_empty() {
            return Err(self.reject(run, "Please choose an item"));
        }
        if let Some(guide) = run.diy_guide(item) {
            return Ok(guide.clone());
        }
        match self.client.diy_instructions(item, run.preferences().budget).await {
            Ok(guide) => {
                run.cache_diy(item, guide.clone());
                self.publish(run);
                Ok(guide)
            }
            Err(err) => {
                run.note_error(&err);
                self.publish(run);
                Err(err)
            }
        }
    }

    /// Share a finished run, saving it first if it has not been saved yet.
    pub async fn share(&self, run: &mut WorkflowRun, platform: &str) -> Result<ShareLink> {
        if run.phase() != Phase::Complete {
            return Err(ArtistryError::validation("Only completed designs can be shared"));
        }
        let outcome = async {
            let design_id = match run.save_receipt() {
                Some(receipt) => receipt.run_id.clone(),
                None => {
                    let receipt = self.client.save_run(&run.summary()).await?;
                    let id = receipt.run_id.clone();
                    run.set_save_receipt(receipt);
                    id
                }
            };
            self.client.share_run(&design_id, platform).await
        }
        .await;
        match outcome {
            Ok(link) => {
                run.add_share(link.clone());
                self.publish(run);
                Ok(link)
            }
            Err(err) => {
                run.note_error(&err);
                self.publish(run);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing;
