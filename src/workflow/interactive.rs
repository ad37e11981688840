use tracing::info;

use super::{FlowKind, Orchestrator, Phase, WorkflowRun};
use crate::client::RoomSummary;
use crate::error::Result;
use crate::models::{GenerateOptions, Stage};
use crate::results::StageResult;

impl Orchestrator {
    /// Detect and draft a first proposal, then stop at `AwaitingUserFeedback`.
    pub async fn begin_interactive(&self, run: &mut WorkflowRun) -> Result<()> {
        self.require_phase(run, FlowKind::Interactive, &[Phase::Idle])?;
        let image = run.image().clone();

        self.enter(run, Phase::Uploading);

        self.enter(run, Phase::Detecting);
        let detection = self.check(run, Stage::Detect, self.client.detect(&image).await)?;
        let room = RoomSummary::from_detection(&detection);
        self.record(run, StageResult::Detection(detection));

        self.enter(run, Phase::ProposalPending);
        let proposal = self.check(run, Stage::Propose, self.client.propose_design(&room).await)?;
        info!(run_id = %run.id(), recommendations = proposal.recommendations.len(), "💡 Proposal drafted");
        self.record(run, StageResult::Proposal(proposal));

        self.enter(run, Phase::AwaitingUserFeedback);
        Ok(())
    }

    /// Fold the user's feedback into the proposal and stop at `ReadyToGenerate`.
    pub async fn submit_feedback(&self, run: &mut WorkflowRun, feedback: &str) -> Result<()> {
        self.require_phase(run, FlowKind::Interactive, &[Phase::AwaitingUserFeedback])?;
        let feedback = feedback.trim();
        if feedback.is_empty() {
            return Err(self.reject(run, "Please provide your preferences or feedback"));
        }
        let recommendations = run.proposal().map(|p| p.recommendations.clone()).unwrap_or_default();
        let room = run.detection().map(RoomSummary::from_detection).unwrap_or_else(|| {
            RoomSummary::from_detection(&Default::default())
        });
        run.clear_error();

        self.enter(run, Phase::Refining);
        let refined = self.check(
            run,
            Stage::Refine,
            self.client.refine_design(&recommendations, feedback, &room).await,
        )?;
        self.record(run, StageResult::Refinement(refined));

        self.enter(run, Phase::ReadyToGenerate);
        Ok(())
    }

    /// Turn the refined design into a prompt and render it with the two-pass settings.
    pub async fn finish_interactive(&self, run: &mut WorkflowRun) -> Result<()> {
        self.require_phase(run, FlowKind::Interactive, &[Phase::ReadyToGenerate])?;
        let image = run.image().clone();
        let design = run.refined_design().cloned().unwrap_or_default();

        self.enter(run, Phase::Generating);
        let prompt = self.check(run, Stage::BuildPrompt, self.client.build_prompt(&design).await)?;
        let image_prompt = prompt.image_prompt.clone();
        self.record(run, StageResult::Prompt(prompt));

        let options = GenerateOptions::refined();
        let generation = self.check(
            run,
            Stage::Generate,
            self.client.generate(&image, &image_prompt, &options).await,
        )?;
        self.record(run, StageResult::Generation(generation));

        self.persist(run).await;
        self.complete(run);
        Ok(())
    }
}
