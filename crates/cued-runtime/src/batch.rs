//! Batch runner
//!
//! Jobs run on a bounded pool: a semaphore admits `max_concurrent` of them
//! at a time and each runs on the blocking thread pool. Every job has its
//! own cancel flag, registered by name, so one item can be cancelled or
//! time out without touching the others. Names are unique among unfinished
//! items: a job whose name is already queued or running fails with
//! `invalid_config` and never runs. A failing item is reported and the batch
//! moves on.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use cued_core::{CueError, CueResult};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::{BatchConfig, BatchMode, CancelFlag, Pipeline, VideoJob};

/// What happened to one item
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemOutcome {
    Succeeded {
        frames: usize,
        syllables: usize,
        output: Option<PathBuf>,
    },
    Failed {
        condition: String,
        message: String,
    },
    Cancelled {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemReport {
    pub name: String,
    pub outcome: ItemOutcome,
    pub elapsed_ms: u64,
}

impl ItemReport {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ItemOutcome::Succeeded { .. })
    }
}

/// Per-item reports, in submission order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub items: Vec<ItemReport>,
}

impl BatchSummary {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.items
            .iter()
            .filter(|r| matches!(r.outcome, ItemOutcome::Failed { .. }))
            .count()
    }

    pub fn cancelled(&self) -> usize {
        self.items
            .iter()
            .filter(|r| matches!(r.outcome, ItemOutcome::Cancelled { .. }))
            .count()
    }

    /// Failed items as `(name, condition)`
    pub fn failures(&self) -> Vec<(&str, &str)> {
        self.items
            .iter()
            .filter_map(|r| match &r.outcome {
                ItemOutcome::Failed { condition, .. } => Some((r.name.as_str(), condition.as_str())),
                _ => None,
            })
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&ItemReport> {
        self.items.iter().find(|r| r.name == name)
    }

    pub fn all_succeeded(&self) -> bool {
        self.items.iter().all(ItemReport::is_success)
    }
}

/// Runs many jobs through one shared pipeline
pub struct BatchRunner {
    pipeline: Arc<Pipeline>,
    config: BatchConfig,
    permits: Arc<Semaphore>,
    /// Cancel flags of queued and running items, one per name
    registry: Arc<Mutex<HashMap<String, CancelFlag>>>,
}

impl BatchRunner {
    pub fn new(pipeline: Arc<Pipeline>, config: BatchConfig) -> CueResult<Self> {
        config.validate()?;
        let permits = Arc::new(Semaphore::new(config.max_concurrent));
        Ok(Self {
            pipeline,
            config,
            permits,
            registry: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Cancel the queued or running item with this name
    pub fn cancel(&self, name: &str) -> bool {
        match self.registry.lock().get(name) {
            Some(flag) => {
                flag.cancel();
                info!(job = %name, "cancel requested");
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) {
        for flag in self.registry.lock().values() {
            flag.cancel();
        }
    }

    /// Names of items not yet finished
    pub fn pending(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registry.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn run(&self, jobs: Vec<VideoJob>) -> BatchSummary {
        let started = Instant::now();
        let total = jobs.len();
        // `None` marks a name that is already taken
        let flags: Vec<Option<CancelFlag>> = {
            let mut registry = self.registry.lock();
            jobs.iter()
                .map(|job| {
                    if registry.contains_key(&job.name) {
                        None
                    } else {
                        let flag = CancelFlag::new();
                        registry.insert(job.name.clone(), flag.clone());
                        Some(flag)
                    }
                })
                .collect()
        };

        let summary = match self.config.mode {
            BatchMode::Parallel => self.run_parallel(jobs, flags).await,
            BatchMode::Sequential => self.run_sequential(jobs, flags).await,
        };

        info!(
            total,
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            cancelled = summary.cancelled(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "batch finished"
        );
        summary
    }

    async fn run_parallel(&self, jobs: Vec<VideoJob>, flags: Vec<Option<CancelFlag>>) -> BatchSummary {
        let handles: Vec<_> = jobs
            .into_iter()
            .zip(flags)
            .map(|(job, flag)| {
                let worker = Worker {
                    pipeline: Arc::clone(&self.pipeline),
                    permits: Arc::clone(&self.permits),
                    registry: Arc::clone(&self.registry),
                    timeout: self.config.item_timeout(),
                };
                let name = job.name.clone();
                (name, tokio::spawn(worker.run(job, flag)))
            })
            .collect();

        let mut summary = BatchSummary::default();
        for (name, handle) in handles {
            let report = match handle.await {
                Ok(report) => report,
                Err(e) => {
                    error!(job = %name, error = %e, "worker task failed");
                    ItemReport {
                        name,
                        outcome: ItemOutcome::Failed {
                            condition: "worker_panic".into(),
                            message: e.to_string(),
                        },
                        elapsed_ms: 0,
                    }
                }
            };
            summary.items.push(report);
        }
        summary
    }

    async fn run_sequential(&self, jobs: Vec<VideoJob>, flags: Vec<Option<CancelFlag>>) -> BatchSummary {
        let delay = self.config.sequential_delay();
        let count = jobs.len();
        let mut summary = BatchSummary::default();

        for (i, (job, flag)) in jobs.into_iter().zip(flags).enumerate() {
            let worker = Worker {
                pipeline: Arc::clone(&self.pipeline),
                permits: Arc::clone(&self.permits),
                registry: Arc::clone(&self.registry),
                timeout: self.config.item_timeout(),
            };
            summary.items.push(worker.run(job, flag).await);
            if i + 1 < count && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
        summary
    }
}

/// Everything one item needs, owned so it can move into a task
struct Worker {
    pipeline: Arc<Pipeline>,
    permits: Arc<Semaphore>,
    registry: Arc<Mutex<HashMap<String, CancelFlag>>>,
    timeout: Option<Duration>,
}

impl Worker {
    async fn run(self, job: VideoJob, flag: Option<CancelFlag>) -> ItemReport {
        let name = job.name.clone();
        let Some(flag) = flag else {
            let e = CueError::InvalidConfig(format!("item name '{}' is already queued or running", name));
            error!(job = %name, error = %e, "item rejected");
            return ItemReport {
                name,
                outcome: ItemOutcome::Failed {
                    condition: e.condition().into(),
                    message: e.to_string(),
                },
                elapsed_ms: 0,
            };
        };
        let outcome = self.execute(job, flag).await;
        // Only the item that registered the name gets here
        self.registry.lock().remove(&name);

        match &outcome.0 {
            ItemOutcome::Succeeded { frames, .. } => info!(job = %name, frames, "item succeeded"),
            ItemOutcome::Failed { condition, message } => {
                error!(job = %name, condition = %condition, error = %message, "item failed")
            }
            ItemOutcome::Cancelled { reason } => warn!(job = %name, reason = %reason, "item cancelled"),
        }
        ItemReport {
            name,
            outcome: outcome.0,
            elapsed_ms: outcome.1.as_millis() as u64,
        }
    }

    async fn execute(&self, job: VideoJob, flag: CancelFlag) -> (ItemOutcome, Duration) {
        let permit = match Arc::clone(&self.permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                return (
                    ItemOutcome::Cancelled {
                        reason: "worker pool closed".into(),
                    },
                    Duration::ZERO,
                )
            }
        };
        let started = Instant::now();
        if flag.is_cancelled() {
            return (
                ItemOutcome::Cancelled {
                    reason: "cancelled while queued".into(),
                },
                Duration::ZERO,
            );
        }

        let pipeline = Arc::clone(&self.pipeline);
        let job_flag = flag.clone();
        let mut task = tokio::task::spawn_blocking(move || {
            // The permit is held until the pipeline actually stops
            let _permit = permit;
            pipeline.run(&job, &job_flag)
        });

        let joined = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut task).await {
                Ok(joined) => joined,
                Err(_) => {
                    flag.cancel();
                    // The pipeline stops at its next stage boundary; a write
                    // that already landed is removed
                    if let Ok(Ok(late)) = task.await {
                        discard_output(late.written.as_deref());
                    }
                    return (
                        ItemOutcome::Cancelled {
                            reason: format!("timed out after {:?}", limit),
                        },
                        started.elapsed(),
                    );
                }
            },
            None => task.await,
        };

        let outcome = match joined {
            Ok(Ok(output)) => ItemOutcome::Succeeded {
                frames: output.trajectory.len(),
                syllables: output.syllables,
                output: output.written,
            },
            Ok(Err(CueError::Cancelled(reason))) => ItemOutcome::Cancelled { reason },
            Ok(Err(e)) => ItemOutcome::Failed {
                condition: e.condition().into(),
                message: e.to_string(),
            },
            Err(e) => ItemOutcome::Failed {
                condition: "worker_panic".into(),
                message: e.to_string(),
            },
        };
        (outcome, started.elapsed())
    }
}

fn discard_output(path: Option<&Path>) {
    if let Some(path) = path {
        match std::fs::remove_file(path) {
            Ok(()) => debug!(path = %path.display(), "removed output of timed out item"),
            Err(e) => warn!(path = %path.display(), error = %e, "could not remove output of timed out item"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PipelineConfig;
    use cued_core::MediaTime;

    fn runner(config: BatchConfig) -> BatchRunner {
        let pipeline = Arc::new(Pipeline::new(&PipelineConfig::default()).unwrap());
        BatchRunner::new(pipeline, config).unwrap()
    }

    fn job(name: &str, ipa: &str, millis: i64) -> VideoJob {
        VideoJob::transcript(name, ipa, MediaTime::from_millis(millis))
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_batch() {
        let runner = runner(BatchConfig::default());
        let summary = runner
            .run(vec![
                job("one", "bɔ̃ ʒuʁ", 1000),
                job("broken", "pa", 0),
                job("two", "mɛʁsi", 800),
                job("silent", "", 500),
            ])
            .await;

        assert_eq!(summary.len(), 4);
        assert_eq!(summary.succeeded(), 2);
        assert_eq!(summary.failed(), 2);
        assert_eq!(
            summary.failures(),
            vec![("broken", "timing_unavailable"), ("silent", "input_missing")]
        );
        assert_eq!(summary.items[0].name, "one");
        assert!(runner.pending().is_empty());
    }

    #[tokio::test]
    async fn test_outputs_written() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(BatchConfig {
            max_concurrent: 2,
            ..BatchConfig::default()
        });
        let jobs = (0..5)
            .map(|i| job(&format!("clip{}", i), "pa ta", 400).with_output(dir.path().join(format!("clip{}.json", i))))
            .collect();

        let summary = runner.run(jobs).await;
        assert!(summary.all_succeeded());
        for i in 0..5 {
            assert!(dir.path().join(format!("clip{}.json", i)).is_file());
        }
    }

    #[tokio::test]
    async fn test_sequential_mode() {
        let runner = runner(BatchConfig {
            sequential_delay_ms: 10,
            ..BatchConfig::sequential()
        });
        let started = Instant::now();
        let summary = runner.run(vec![job("a", "pa", 200), job("b", "ti", 200), job("c", "ku", 200)]).await;

        assert!(summary.all_succeeded());
        let names: Vec<&str> = summary.items.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_item_timeout() {
        let config = PipelineConfig {
            frame_rate: 100.0,
            ..PipelineConfig::default()
        };
        let pipeline = Arc::new(Pipeline::new(&config).unwrap());
        let runner = BatchRunner::new(
            pipeline,
            BatchConfig {
                item_timeout_ms: Some(1),
                ..BatchConfig::default()
            },
        )
        .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("long.json");
        // Ten minutes at 100 fps takes far longer than a millisecond
        let long_text = vec!["paʁi"; 400].join(" ");
        let summary = runner
            .run(vec![job("long", &long_text, 600_000).with_output(path.clone())])
            .await;

        match &summary.get("long").unwrap().outcome {
            ItemOutcome::Cancelled { reason } => assert!(reason.contains("timed out")),
            other => panic!("expected cancellation, got {:?}", other),
        }
        assert!(runner.pending().is_empty());
        // The pipeline has stopped by the time the report is in
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_discard_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("late.json");
        std::fs::write(&path, "{}").unwrap();
        discard_output(Some(&path));
        assert!(!path.exists());
        // Missing files and absent outputs are tolerated
        discard_output(Some(&path));
        discard_output(None);
    }

    #[tokio::test]
    async fn test_duplicate_names_rejected() {
        let runner = Arc::new(runner(BatchConfig {
            max_concurrent: 1,
            ..BatchConfig::default()
        }));
        let held = Arc::clone(&runner.permits).acquire_owned().await.unwrap();

        let background = {
            let runner = Arc::clone(&runner);
            tokio::spawn(async move {
                runner
                    .run(vec![job("clip", "pa", 200), job("clip", "ta", 200), job("other", "ku", 200)])
                    .await
            })
        };
        while runner.pending().len() < 2 {
            tokio::task::yield_now().await;
        }
        assert_eq!(runner.pending(), vec!["clip".to_string(), "other".to_string()]);
        assert!(runner.cancel("clip"));
        drop(held);

        let summary = background.await.unwrap();
        assert_eq!(summary.len(), 3);
        assert_eq!(
            summary.items[0].outcome,
            ItemOutcome::Cancelled {
                reason: "cancelled while queued".into()
            }
        );
        match &summary.items[1].outcome {
            ItemOutcome::Failed { condition, message } => {
                assert_eq!(condition, "invalid_config");
                assert!(message.contains("clip"));
            }
            other => panic!("expected rejection, got {:?}", other),
        }
        assert!(summary.items[2].is_success());
        assert_eq!(summary.cancelled(), 1);
        assert!(runner.pending().is_empty());

        // The name is free again once its item finished
        let again = runner.run(vec![job("clip", "pa", 200)]).await;
        assert!(again.all_succeeded());
    }

    #[tokio::test]
    async fn test_cancel_by_name_while_queued() {
        let runner = Arc::new(runner(BatchConfig {
            max_concurrent: 1,
            ..BatchConfig::default()
        }));
        // Occupy the only permit so both jobs queue
        let held = Arc::clone(&runner.permits).acquire_owned().await.unwrap();

        let background = {
            let runner = Arc::clone(&runner);
            tokio::spawn(async move { runner.run(vec![job("keep", "pa", 200), job("drop", "ta", 200)]).await })
        };
        while runner.pending().len() < 2 {
            tokio::task::yield_now().await;
        }
        assert!(runner.cancel("drop"));
        assert!(!runner.cancel("unknown"));
        drop(held);

        let summary = background.await.unwrap();
        assert!(summary.get("keep").unwrap().is_success());
        assert_eq!(
            summary.get("drop").unwrap().outcome,
            ItemOutcome::Cancelled {
                reason: "cancelled while queued".into()
            }
        );
        assert_eq!(summary.cancelled(), 1);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let pipeline = Arc::new(Pipeline::new(&PipelineConfig::default()).unwrap());
        let config = BatchConfig {
            max_concurrent: 0,
            ..BatchConfig::default()
        };
        assert!(BatchRunner::new(pipeline, config).is_err());
    }

    #[test]
    fn test_summary_serializes() {
        let summary = BatchSummary {
            items: vec![ItemReport {
                name: "x".into(),
                outcome: ItemOutcome::Failed {
                    condition: "input_missing".into(),
                    message: "Input missing: nothing".into(),
                },
                elapsed_ms: 3,
            }],
        };
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"status\":\"failed\""));
    }
}
