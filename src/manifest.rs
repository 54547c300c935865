use serde::{Deserialize, Serialize};
use tracing::debug;

/// Pipeline stages in dependency order. Progress is tracked here, in
/// memory, rather than inferred from which files happen to exist on disk;
/// filesystem existence checks remain only as final output verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Downloading,
    ProbingDuration,
    Splitting,
    ProcessingSegments,
    Concatenating,
    Muxing,
    VerifyingOutput,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    InProgress(Stage),
    Done,
    Failed { stage: Stage, reason: String },
}

/// In-memory record of one render run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderManifest {
    pub source_url: String,
    pub status: RunStatus,
    /// Stages completed so far, in order
    pub completed: Vec<Stage>,
}

impl RenderManifest {
    pub fn new(source_url: &str) -> Self {
        Self {
            source_url: source_url.to_string(),
            status: RunStatus::InProgress(Stage::Downloading),
            completed: Vec::new(),
        }
    }

    /// Mark the current stage complete and move to the next.
    pub fn advance(&mut self, next: Stage) {
        if let RunStatus::InProgress(current) = self.status {
            debug!("Stage {:?} complete, entering {:?}", current, next);
            self.completed.push(current);
        }
        self.status = if next == Stage::Done {
            RunStatus::Done
        } else {
            RunStatus::InProgress(next)
        };
    }

    /// Record a terminal failure at the current stage.
    pub fn fail(&mut self, reason: impl Into<String>) {
        let stage = match self.status {
            RunStatus::InProgress(stage) => stage,
            RunStatus::Done => Stage::Done,
            RunStatus::Failed { stage, .. } => stage,
        };
        self.status = RunStatus::Failed {
            stage,
            reason: reason.into(),
        };
    }

    pub fn current_stage(&self) -> Option<Stage> {
        match self.status {
            RunStatus::InProgress(stage) => Some(stage),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, RunStatus::Failed { .. })
    }
}
