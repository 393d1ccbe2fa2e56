//! Job orchestration: fetch → convert → publish, in order, once.
//!
//! ```text
//! Init ──▶ Fetching ──▶ Converting ──▶ Publishing ──▶ Done
//!             │             │              │
//!             └─────────────┴──────────────┴──▶ Failed(stage)
//! ```
//!
//! [`JobParameters`] are built once from the resolved [`JobLocations`] and
//! two freshly allocated workspaces; nothing downstream reads the environment
//! again. [`JobRunner`] drives the stages and stops at the first failure.
//! `Failed` is terminal: a runner never retries or resumes.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::info;
use url::Url;

use crate::config::{JobLocations, WorkerConfig};
use crate::error::{Stage, WorkerError};
use crate::output::{JobOutcome, JobReport, StageTiming};
use crate::pipeline::invoke::Converter;
use crate::pipeline::workspace::{Workspace, WorkspaceKind};
use crate::transfer::Transfer;

/// Immutable inputs of one job.
///
/// Owns both workspaces; dropping the parameters deletes them.
#[derive(Debug)]
pub struct JobParameters {
    source: Url,
    destination: Url,
    input: Workspace,
    output: Workspace,
    extra_args: Vec<String>,
}

impl JobParameters {
    /// Allocate the input workspace, then the output workspace.
    pub fn prepare(
        locations: JobLocations,
        extra_args: Vec<String>,
        config: &WorkerConfig,
    ) -> Result<Self, WorkerError> {
        let root = config.workspace_root.as_deref();
        let input = Workspace::create(WorkspaceKind::Input, root)?;
        let output = Workspace::create(WorkspaceKind::Output, root)?;
        info!(
            "Prepared job {} -> {} ({} extra args)",
            locations.source,
            locations.destination,
            extra_args.len()
        );
        Ok(Self {
            source: locations.source,
            destination: locations.destination,
            input,
            output,
            extra_args,
        })
    }

    pub fn source(&self) -> &Url {
        &self.source
    }

    pub fn destination(&self) -> &Url {
        &self.destination
    }

    pub fn input_dir(&self) -> &Path {
        self.input.path()
    }

    pub fn output_dir(&self) -> &Path {
        self.output.path()
    }

    pub fn extra_args(&self) -> &[String] {
        &self.extra_args
    }
}

/// Where a [`JobRunner`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Init,
    Fetching,
    Converting,
    Publishing,
    Done,
    Failed(Stage),
}

impl JobState {
    /// The stage this state executes, if any.
    pub fn stage(self) -> Option<Stage> {
        match self {
            JobState::Fetching => Some(Stage::Fetch),
            JobState::Converting => Some(Stage::Convert),
            JobState::Publishing => Some(Stage::Publish),
            JobState::Init | JobState::Done | JobState::Failed(_) => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Failed(_))
    }
}

/// Drives a single job through its stages.
pub struct JobRunner<'a> {
    transfer: &'a dyn Transfer,
    converter: &'a dyn Converter,
    state: JobState,
    report: Option<JobReport>,
}

impl<'a> JobRunner<'a> {
    pub fn new(transfer: &'a dyn Transfer, converter: &'a dyn Converter) -> Self {
        Self {
            transfer,
            converter,
            state: JobState::Init,
            report: None,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Report of the finished job, for success and failure alike.
    pub fn report(&self) -> Option<&JobReport> {
        self.report.as_ref()
    }

    /// Run the job to completion.
    ///
    /// On failure the error is a [`WorkerError::StageFailed`] naming the
    /// stage; later stages have not been started.
    pub async fn run(&mut self, params: &JobParameters) -> Result<JobReport, WorkerError> {
        if self.state != JobState::Init {
            return Err(WorkerError::Internal(format!(
                "job runner already used (state {:?})",
                self.state
            )));
        }

        let start = Instant::now();
        let mut stages = Vec::with_capacity(3);
        let mut classpath_entries = None;
        let result = self
            .execute(params, &mut stages, &mut classpath_entries)
            .await;

        let outcome = match &result {
            Ok(()) => {
                self.enter(JobState::Done);
                JobOutcome::Succeeded
            }
            Err(e) => {
                let stage = e.stage().unwrap_or(Stage::Fetch);
                self.enter(JobState::Failed(stage));
                JobOutcome::Failed {
                    stage,
                    error: e.to_string(),
                }
            }
        };

        let report = JobReport {
            outcome,
            source: params.source().to_string(),
            destination: params.destination().to_string(),
            stages,
            classpath_entries,
            total_duration_ms: start.elapsed().as_millis() as u64,
        };
        self.report = Some(report.clone());

        result.map(|()| {
            info!("Job complete in {}ms", report.total_duration_ms);
            report
        })
    }

    async fn execute(
        &mut self,
        params: &JobParameters,
        stages: &mut Vec<StageTiming>,
        classpath_entries: &mut Option<usize>,
    ) -> Result<(), WorkerError> {
        let transfer = self.transfer;
        let converter = self.converter;

        // ── Fetch ────────────────────────────────────────────────────────
        self.enter(JobState::Fetching);
        let started = Instant::now();
        let fetched = transfer
            .fetch(params.source(), params.input_dir())
            .await
            .map_err(|e| e.in_stage(Stage::Fetch));
        stages.push(timing(Stage::Fetch, started));
        let fetched: PathBuf = fetched?;
        info!("Fetched {} to {}", params.source(), fetched.display());

        // ── Convert ──────────────────────────────────────────────────────
        self.enter(JobState::Converting);
        let started = Instant::now();
        let summary = converter
            .convert(&fetched, params.output_dir(), params.extra_args())
            .await
            .map_err(|e| e.in_stage(Stage::Convert));
        stages.push(timing(Stage::Convert, started));
        *classpath_entries = Some(summary?.classpath_entries);

        // ── Publish ──────────────────────────────────────────────────────
        self.enter(JobState::Publishing);
        let started = Instant::now();
        let published = transfer
            .publish(params.output_dir(), params.destination())
            .await
            .map_err(|e| e.in_stage(Stage::Publish));
        stages.push(timing(Stage::Publish, started));
        published?;
        info!("Published to {}", params.destination());

        Ok(())
    }

    fn enter(&mut self, next: JobState) {
        info!("Job state: {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

fn timing(stage: Stage, started: Instant) -> StageTiming {
    StageTiming {
        stage,
        duration_ms: started.elapsed().as_millis() as u64,
    }
}
