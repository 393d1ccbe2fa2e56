//! Structured summary of one job, serialisable as JSON.

use serde::{Deserialize, Serialize};

use crate::error::Stage;

/// Final outcome of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum JobOutcome {
    Succeeded,
    Failed {
        stage: Stage,
        /// Display form of the error, including its cause.
        error: String,
    },
}

/// Wall-clock time spent in one completed or failed stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTiming {
    pub stage: Stage,
    pub duration_ms: u64,
}

/// Everything the worker knows about a finished job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobReport {
    pub outcome: JobOutcome,
    pub source: String,
    pub destination: String,
    /// Stages that ran, in execution order.
    pub stages: Vec<StageTiming>,
    /// Classpath size used for the conversion; absent if convert never finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classpath_entries: Option<usize>,
    pub total_duration_ms: u64,
}

impl JobReport {
    pub fn succeeded(&self) -> bool {
        self.outcome == JobOutcome::Succeeded
    }

    /// Time spent in `stage`, if it ran.
    pub fn duration_of(&self, stage: Stage) -> Option<u64> {
        self.stages
            .iter()
            .find(|t| t.stage == stage)
            .map(|t| t.duration_ms)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
