use serde::{Deserialize, Serialize};

use crate::models::Stage;

/// Which of the three orchestration flows a run follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FlowKind {
    /// detect → segment → advise → generate → save
    Linear,
    /// detect → proposal → user feedback → refinement → generate
    Interactive,
    /// detect (advisory) → preferences → cost → generate → products
    BudgetAware,
}

impl FlowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowKind::Linear => "linear",
            FlowKind::Interactive => "interactive",
            FlowKind::BudgetAware => "budget-aware",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Idle,
    Uploading,
    Detecting,
    Segmenting,
    Advising,
    ProposalPending,
    AwaitingUserFeedback,
    Refining,
    ReadyToGenerate,
    CollectingPreferences,
    EstimatingCost,
    Generating,
    MatchingProducts,
    Saving,
    Complete,
    Errored(Stage),
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Complete | Phase::Errored(_))
    }

    /// Points where the orchestrator hands control back and waits for the caller.
    pub fn is_suspended(&self) -> bool {
        matches!(
            self,
            Phase::AwaitingUserFeedback | Phase::ReadyToGenerate | Phase::CollectingPreferences
        )
    }

    pub fn message(&self) -> String {
        match self {
            Phase::Idle => "Ready".into(),
            Phase::Uploading => "Uploading image...".into(),
            Phase::Detecting => "Detecting objects...".into(),
            Phase::Segmenting => "Segmenting image...".into(),
            Phase::Advising => "Analyzing design...".into(),
            Phase::ProposalPending => "Drafting an initial proposal...".into(),
            Phase::AwaitingUserFeedback => "Waiting for your feedback".into(),
            Phase::Refining => "Refining the design...".into(),
            Phase::ReadyToGenerate => "Refined design ready".into(),
            Phase::CollectingPreferences => "Choose a budget and the items to replace".into(),
            Phase::EstimatingCost => "Estimating costs...".into(),
            Phase::Generating => "Generating new design...".into(),
            Phase::MatchingProducts => "Finding matching products...".into(),
            Phase::Saving => "Saving results...".into(),
            Phase::Complete => "Complete!".into(),
            Phase::Errored(stage) => format!("{stage} failed"),
        }
    }

    /// Progress shown when `flow` enters this phase. `None` for phases the
    /// flow never visits and for `Errored`, which keeps the last value.
    pub fn progress(&self, flow: FlowKind) -> Option<u8> {
        let percent = match (flow, self) {
            (_, Phase::Idle) => 0,
            (_, Phase::Uploading) => 5,
            (_, Phase::Saving) => 95,
            (_, Phase::Complete) => 100,
            (_, Phase::Errored(_)) => return None,

            (FlowKind::Linear, Phase::Detecting) => 25,
            (FlowKind::Linear, Phase::Segmenting) => 40,
            (FlowKind::Linear, Phase::Advising) => 60,
            (FlowKind::Linear, Phase::Generating) => 80,

            (FlowKind::Interactive, Phase::Detecting) => 15,
            (FlowKind::Interactive, Phase::ProposalPending) => 30,
            (FlowKind::Interactive, Phase::AwaitingUserFeedback) => 40,
            (FlowKind::Interactive, Phase::Refining) => 55,
            (FlowKind::Interactive, Phase::ReadyToGenerate) => 70,
            (FlowKind::Interactive, Phase::Generating) => 80,

            (FlowKind::BudgetAware, Phase::Detecting) => 10,
            (FlowKind::BudgetAware, Phase::CollectingPreferences) => 20,
            (FlowKind::BudgetAware, Phase::EstimatingCost) => 35,
            (FlowKind::BudgetAware, Phase::Generating) => 60,
            (FlowKind::BudgetAware, Phase::MatchingProducts) => 85,

            _ => return None,
        };
        Some(percent)
    }
}
