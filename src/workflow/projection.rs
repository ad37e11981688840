use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

use super::phase::{FlowKind, Phase};
use crate::error::LastError;
use crate::models::{ImageInfo, SaveReceipt, ShareLink};
use crate::results::{DiyInstructions, StageResult};

/// Read-only view of a run, as presentation code consumes it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSnapshot {
    pub run_id: Option<Uuid>,
    pub flow: Option<FlowKind>,
    pub phase: Phase,
    pub progress_percent: u8,
    pub progress_message: String,
    /// Completed stages only.
    pub results: Vec<StageResult>,
    pub last_error: Option<LastError>,
    pub image: Option<ImageInfo>,
    pub save_receipt: Option<SaveReceipt>,
    pub shares: Vec<ShareLink>,
    pub diy_guides: BTreeMap<String, DiyInstructions>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowSnapshot {
    fn idle(run_id: Option<Uuid>, flow: Option<FlowKind>) -> Self {
        Self {
            run_id,
            flow,
            phase: Phase::Idle,
            progress_percent: 0,
            progress_message: Phase::Idle.message(),
            results: Vec::new(),
            last_error: None,
            image: None,
            save_receipt: None,
            shares: Vec::new(),
            diy_guides: BTreeMap::new(),
            updated_at: Utc::now(),
        }
    }
}

/// Observable state of the current run.
///
/// Backed by a `watch` channel: any number of observers, each sees the latest
/// snapshot. Updates carry their run id and are dropped unless they belong to
/// the run most recently passed to `reset`, so results arriving for an
/// abandoned run cannot overwrite a newer one.
#[derive(Debug, Clone)]
pub struct StateProjection {
    tx: Arc<watch::Sender<WorkflowSnapshot>>,
}

impl Default for StateProjection {
    fn default() -> Self {
        let (tx, _rx) = watch::channel(WorkflowSnapshot::idle(None, None));
        Self { tx: Arc::new(tx) }
    }
}

impl StateProjection {
    pub fn new() -> Self { Self::default() }

    pub fn subscribe(&self) -> watch::Receiver<WorkflowSnapshot> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> WorkflowSnapshot {
        self.tx.borrow().clone()
    }

    pub fn current_run(&self) -> Option<Uuid> {
        self.tx.borrow().run_id
    }

    /// Make `run_id` the current run; everything else becomes stale.
    pub fn reset(&self, run_id: Uuid, flow: FlowKind) {
        self.tx.send_replace(WorkflowSnapshot::idle(Some(run_id), Some(flow)));
    }

    /// Drop the current run without starting another one.
    pub fn clear(&self) {
        self.tx.send_replace(WorkflowSnapshot::idle(None, None));
    }

    /// Apply an update. Returns false when it belongs to a stale run.
    pub fn publish(&self, snapshot: WorkflowSnapshot) -> bool {
        self.tx.send_if_modified(|current| {
            if current.run_id.is_none() || current.run_id != snapshot.run_id {
                debug!(stale_run = ?snapshot.run_id, current_run = ?current.run_id, "ignoring update for stale run");
                return false;
            }
            let floor = current.progress_percent;
            *current = snapshot;
            if current.phase != Phase::Complete {
                current.progress_percent = current.progress_percent.max(floor).min(99);
            }
            true
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(run_id: Uuid, phase: Phase, progress: u8) -> WorkflowSnapshot {
        WorkflowSnapshot {
            phase,
            progress_percent: progress,
            progress_message: phase.message(),
            ..WorkflowSnapshot::idle(Some(run_id), Some(FlowKind::Linear))
        }
    }

    #[test]
    fn stale_runs_cannot_overwrite_the_current_one() {
        let projection = StateProjection::new();
        let old_run = Uuid::new_v4();
        let new_run = Uuid::new_v4();

        projection.reset(old_run, FlowKind::Linear);
        assert!(projection.publish(snapshot(old_run, Phase::Detecting, 25)));

        projection.reset(new_run, FlowKind::Linear);
        assert!(!projection.publish(snapshot(old_run, Phase::Generating, 80)));

        let current = projection.current();
        assert_eq!(current.run_id, Some(new_run));
        assert_eq!(current.phase, Phase::Idle);
    }

    #[test]
    fn nothing_is_accepted_before_a_run_starts() {
        let projection = StateProjection::new();
        assert!(!projection.publish(snapshot(Uuid::new_v4(), Phase::Detecting, 25)));
    }

    #[test]
    fn progress_is_floored_at_previous_value() {
        let projection = StateProjection::new();
        let run = Uuid::new_v4();
        projection.reset(run, FlowKind::Linear);
        projection.publish(snapshot(run, Phase::Advising, 60));
        projection.publish(snapshot(run, Phase::Errored(crate::models::Stage::Generate), 10));
        assert_eq!(projection.current().progress_percent, 60);
    }

    #[tokio::test]
    async fn observers_see_updates_independently() {
        let projection = StateProjection::new();
        let mut first = projection.subscribe();
        let mut second = projection.subscribe();
        let run = Uuid::new_v4();

        projection.reset(run, FlowKind::Linear);
        projection.publish(snapshot(run, Phase::Complete, 100));

        first.changed().await.unwrap();
        assert_eq!(first.borrow_and_update().phase, Phase::Complete);
        second.changed().await.unwrap();
        assert_eq!(second.borrow().progress_percent, 100);
    }
}
