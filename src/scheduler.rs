use std::thread;
use std::time::{Duration, Instant};

use rand::Rng;
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::aggregate::{AggregateOutcome, CheckOutcome, DatasetAggregator, DatasetChecker, MirrorSettings};
use crate::domain::DatasetDescriptor;
use crate::error::MirrorError;
use crate::remote::RemoteSource;
use crate::state::StateStore;

/// Randomized delay between verification checks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pacing {
    min: Duration,
    max: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            min: Duration::from_secs(1),
            max: Duration::from_secs(3),
        }
    }
}

impl Pacing {
    pub fn new(min: Duration, max: Duration) -> Result<Self, MirrorError> {
        if min > max {
            return Err(MirrorError::ConfigParse(format!(
                "pacing minimum {min:?} exceeds maximum {max:?}"
            )));
        }
        Ok(Self { min, max })
    }

    pub const fn none() -> Self {
        Self {
            min: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    /// Uniform sample from `[min, max]`.
    pub fn sample(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        let secs = rand::rng().random_range(self.min.as_secs_f64()..=self.max.as_secs_f64());
        Duration::from_secs_f64(secs)
    }
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink: Send + Sync {
    fn event(&self, event: ProgressEvent);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MirrorAction {
    Skipped,
    Mirrored,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct MirrorItemResult {
    pub accession: String,
    pub action: MirrorAction,
    pub metadata_files: usize,
    pub data_files: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MirrorSummary {
    pub items: Vec<MirrorItemResult>,
}

impl MirrorSummary {
    pub fn count(&self, action: MirrorAction) -> usize {
        self.items.iter().filter(|item| item.action == action).count()
    }

    pub fn has_failures(&self) -> bool {
        self.count(MirrorAction::Failed) > 0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckProblem {
    pub accession: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckSummary {
    pub checked: usize,
    pub problems: Vec<CheckProblem>,
}

impl CheckSummary {
    pub fn problem_accessions(&self) -> Vec<&str> {
        self.problems
            .iter()
            .map(|problem| problem.accession.as_str())
            .collect()
    }
}

/// Fans datasets out to workers (mirror) or walks them one by one (check).
pub struct Scheduler<'a, R: RemoteSource + ?Sized> {
    remote: &'a R,
    settings: &'a MirrorSettings,
}

impl<'a, R: RemoteSource + ?Sized> Scheduler<'a, R> {
    pub fn new(remote: &'a R, settings: &'a MirrorSettings) -> Self {
        Self { remote, settings }
    }

    /// Aggregates every descriptor on a pool of `workers` threads and waits
    /// for all of them. A failing dataset is reported in the summary and does
    /// not stop the others.
    pub fn run_mirror(
        &self,
        state: &StateStore,
        descriptors: &[DatasetDescriptor],
        workers: usize,
        sink: &dyn ProgressSink,
    ) -> Result<MirrorSummary, MirrorError> {
        let workers = workers.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|index| format!("ocads-worker-{index}"))
            .build()
            .map_err(|err| MirrorError::WorkerPool(err.to_string()))?;

        info!(datasets = descriptors.len(), workers, "starting OCADS data aggregation");
        let aggregator = DatasetAggregator::new(self.remote, state, self.settings);
        let total = descriptors.len();

        let items = pool.install(|| {
            descriptors
                .par_iter()
                .enumerate()
                .map(|(index, descriptor)| mirror_one(&aggregator, descriptor, index, total, sink))
                .collect::<Vec<_>>()
        });

        Ok(MirrorSummary { items })
    }

    /// Checks every descriptor in order, sleeping a paced interval after each
    /// one. Never writes and never stops early.
    pub fn run_check(
        &self,
        descriptors: &[DatasetDescriptor],
        pacing: &Pacing,
        sink: &dyn ProgressSink,
    ) -> CheckSummary {
        let checker = DatasetChecker::new(self.remote, self.settings);
        let total = descriptors.len();
        let mut problems = Vec::new();

        for (index, descriptor) in descriptors.iter().enumerate() {
            let accession = descriptor.accession_number.as_str();
            let started = Instant::now();
            let problem = match checker.check(descriptor) {
                Ok(outcome) if outcome.passed() => None,
                Ok(outcome) => Some(describe_failure(&outcome)),
                Err(err) => {
                    warn!(accession, error = %err, "check failed");
                    Some(err.to_string())
                }
            };
            let status = problem.as_deref().unwrap_or("ok");
            sink.event(ProgressEvent {
                message: format!("[{}/{total}] {accession}: {status}", index + 1),
                elapsed: Some(started.elapsed()),
            });
            if let Some(reason) = problem {
                problems.push(CheckProblem {
                    accession: accession.to_string(),
                    reason,
                });
            }
            thread::sleep(pacing.sample());
        }

        CheckSummary {
            checked: total,
            problems,
        }
    }
}

fn mirror_one<R: RemoteSource + ?Sized>(
    aggregator: &DatasetAggregator<'_, R>,
    descriptor: &DatasetDescriptor,
    index: usize,
    total: usize,
    sink: &dyn ProgressSink,
) -> MirrorItemResult {
    let accession = descriptor.accession_number.as_str();
    let position = format!("[{}/{total}] {accession}", index + 1);
    let started = Instant::now();

    match aggregator.aggregate(descriptor) {
        Ok(AggregateOutcome::Skipped) => {
            sink.event(ProgressEvent {
                message: format!("{position}: already aggregated"),
                elapsed: None,
            });
            MirrorItemResult {
                accession: accession.to_string(),
                action: MirrorAction::Skipped,
                metadata_files: 0,
                data_files: 0,
                error: None,
            }
        }
        Ok(AggregateOutcome::Mirrored {
            metadata_files,
            data_files,
        }) => {
            sink.event(ProgressEvent {
                message: format!(
                    "{position}: successfully downloaded {} files",
                    data_files.len()
                ),
                elapsed: Some(started.elapsed()),
            });
            MirrorItemResult {
                accession: accession.to_string(),
                action: MirrorAction::Mirrored,
                metadata_files: metadata_files.len(),
                data_files: data_files.len(),
                error: None,
            }
        }
        Err(err) => {
            warn!(accession, error = %err, "dataset aggregation failed");
            sink.event(ProgressEvent {
                message: format!("{position}: failed: {err}"),
                elapsed: Some(started.elapsed()),
            });
            MirrorItemResult {
                accession: accession.to_string(),
                action: MirrorAction::Failed,
                metadata_files: 0,
                data_files: 0,
                error: Some(err.to_string()),
            }
        }
    }
}

fn describe_failure(outcome: &CheckOutcome) -> String {
    if !outcome.folder_present {
        return "dataset folder missing".to_string();
    }
    let mut parts = Vec::new();
    if !outcome.missing_metadata.is_empty() {
        parts.push(format!("{} metadata file(s) missing", outcome.missing_metadata.len()));
    }
    if let Some(tree) = &outcome.tree {
        if !tree.missing_dirs.is_empty() {
            parts.push(format!("{} data directory(ies) missing", tree.missing_dirs.len()));
        }
        if !tree.missing_files.is_empty() {
            parts.push(format!("{} data file(s) missing", tree.missing_files.len()));
        }
    }
    if parts.is_empty() {
        "data tree incomplete".to_string()
    } else {
        parts.join(", ")
    }
}
