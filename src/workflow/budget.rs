use tracing::{info, warn};

use super::{FlowKind, Orchestrator, Phase, WorkflowRun};
use crate::error::Result;
use crate::models::{GenerateOptions, Stage, UserPreferences};
use crate::results::{ProductQuery, StageResult};

const BUDGET_DESIGN_PROMPT: &str = "Modern interior design";

fn product_query(item: &str, preferences: &UserPreferences) -> ProductQuery {
    ProductQuery {
        item_type: item.to_string(),
        style: preferences.style_prompt().unwrap_or("modern").to_string(),
        material: "any".into(),
        color: "neutral".into(),
        budget: preferences.budget.as_str().into(),
    }
}

impl Orchestrator {
    /// Detect what is in the room, so the caller can offer items to replace,
    /// then stop at `CollectingPreferences`. Detection here is a hint only.
    pub async fn begin_budget(&self, run: &mut WorkflowRun) -> Result<()> {
        self.require_phase(run, FlowKind::BudgetAware, &[Phase::Idle])?;
        let image = run.image().clone();

        self.enter(run, Phase::Uploading);

        self.enter(run, Phase::Detecting);
        match self.client.detect(&image).await {
            Ok(detection) => self.record(run, StageResult::Detection(detection)),
            Err(err) => warn!(run_id = %run.id(), "⚠️ Detection failed, continuing without objects: {}", err),
        }

        self.enter(run, Phase::CollectingPreferences);
        Ok(())
    }

    /// Estimate, render and shop for the items the user picked.
    pub async fn run_budget(&self, run: &mut WorkflowRun, preferences: UserPreferences) -> Result<()> {
        self.require_phase(run, FlowKind::BudgetAware, &[Phase::CollectingPreferences])?;
        let items: Vec<String> = preferences
            .selected_items
            .iter()
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect();
        if items.is_empty() {
            return Err(self.reject(run, "Please select at least one item to replace"));
        }
        let image = run.image().clone();
        let tier = preferences.budget;
        let room_size = preferences.room_size_sqft;
        let prompt = preferences.style_prompt().unwrap_or(BUDGET_DESIGN_PROMPT).to_string();
        run.clear_error();
        run.set_preferences(preferences);

        self.enter(run, Phase::EstimatingCost);
        let estimate = self.check(
            run,
            Stage::EstimateCost,
            self.client.estimate_cost(&items, tier, room_size).await,
        )?;
        info!(run_id = %run.id(), total = estimate.total_cost, currency = %estimate.currency, "💰 Cost estimated");
        self.record(run, StageResult::CostEstimate(estimate));

        self.enter(run, Phase::Generating);
        let options = GenerateOptions::for_budget(tier);
        let generation = self.check(run, Stage::Generate, self.client.generate(&image, &prompt, &options).await)?;
        self.record(run, StageResult::Generation(generation));

        self.enter(run, Phase::MatchingProducts);
        let mut matches = Vec::with_capacity(items.len());
        for item in &items {
            let query = product_query(item, run.preferences());
            match self.client.match_products(&query).await {
                Ok(found) => matches.push(found),
                Err(err) => warn!(run_id = %run.id(), item = %item, "⚠️ No products for item: {}", err),
            }
        }
        self.record(run, StageResult::ProductMatches(matches));

        self.persist(run).await;
        self.complete(run);
        Ok(())
    }
}
