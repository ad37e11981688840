use tracing::info;

use super::{FlowKind, Orchestrator, Phase, WorkflowRun, DEFAULT_DESIGN_PROMPT};
use crate::error::Result;
use crate::models::{GenerateOptions, Stage};
use crate::results::StageResult;

impl Orchestrator {
    /// detect → segment → advise → generate → (save), start to finish.
    ///
    /// The first failing stage stops the run in `Errored(stage)`; whatever was
    /// recorded before it stays on the run.
    pub async fn run_linear(&self, run: &mut WorkflowRun) -> Result<()> {
        self.require_phase(run, FlowKind::Linear, &[Phase::Idle])?;
        let image = run.image().clone();
        let user_prompt = run.preferences().style_prompt().map(str::to_string);

        self.enter(run, Phase::Uploading);

        self.enter(run, Phase::Detecting);
        let detection = self.check(run, Stage::Detect, self.client.detect(&image).await)?;
        info!(run_id = %run.id(), objects = ?detection.objects, "🔍 Detection done");
        self.record(run, StageResult::Detection(detection));

        self.enter(run, Phase::Segmenting);
        let segmentation = self.check(run, Stage::Segment, self.client.segment(&image, None).await)?;
        self.record(run, StageResult::Segmentation(segmentation));

        self.enter(run, Phase::Advising);
        let advice = self.check(
            run,
            Stage::Advise,
            self.client.advise(&image, user_prompt.as_deref().unwrap_or_default()).await,
        )?;
        let prompt = match user_prompt {
            Some(prompt) => prompt,
            None if !advice.full_text.trim().is_empty() => advice.full_text.clone(),
            None => DEFAULT_DESIGN_PROMPT.to_string(),
        };
        self.record(run, StageResult::Advice(advice));

        self.enter(run, Phase::Generating);
        let options = GenerateOptions::for_budget(run.preferences().budget);
        info!(run_id = %run.id(), mode = options.mode.as_str(), "🎨 Generating redesign");
        let generation = self.check(run, Stage::Generate, self.client.generate(&image, &prompt, &options).await)?;
        self.record(run, StageResult::Generation(generation));

        self.persist(run).await;
        self.complete(run);
        Ok(())
    }
}
