//! Pollable analysis status, published over a `watch` channel.

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::{Display, EnumString};
use tokio::sync::watch;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AnalysisState {
    Running,
    Completed,
    Error,
}

impl AnalysisState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AnalysisState::Completed | AnalysisState::Error)
    }
}

/// Coarse progress marker within a running analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AnalysisStage {
    Validating,
    ResolvingPrices,
    EstimatingCosts,
    Aggregating,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisStatus {
    pub job_id: Uuid,
    pub state: AnalysisState,
    pub stage: AnalysisStage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Publisher side of one analysis job's status.
///
/// Once the job reaches `completed` or `error` further updates are ignored.
#[derive(Debug)]
pub struct StatusTracker {
    tx: watch::Sender<AnalysisStatus>,
}

impl Default for StatusTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusTracker {
    pub fn new() -> Self {
        Self::with_job_id(Uuid::new_v4())
    }

    pub fn with_job_id(job_id: Uuid) -> Self {
        let (tx, _rx) = watch::channel(AnalysisStatus {
            job_id,
            state: AnalysisState::Running,
            stage: AnalysisStage::Validating,
            error: None,
            updated_at: Utc::now(),
        });
        Self { tx }
    }

    pub fn job_id(&self) -> Uuid {
        self.tx.borrow().job_id
    }

    pub fn subscribe(&self) -> watch::Receiver<AnalysisStatus> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> AnalysisStatus {
        self.tx.borrow().clone()
    }

    pub fn set_stage(&self, stage: AnalysisStage) {
        self.update(|status| {
            status.stage = stage;
        });
    }

    pub fn complete(&self) {
        self.update(|status| {
            status.state = AnalysisState::Completed;
        });
    }

    pub fn fail(&self, error: impl Into<String>) {
        let error = error.into();
        self.update(|status| {
            status.state = AnalysisState::Error;
            status.error = Some(error);
        });
    }

    fn update(&self, apply: impl FnOnce(&mut AnalysisStatus)) {
        self.tx.send_if_modified(|status| {
            if status.state.is_terminal() {
                return false;
            }
            apply(status);
            status.updated_at = Utc::now();
            true
        });
    }
}
