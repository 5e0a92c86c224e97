use std::path::PathBuf;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use crate::archive::ReportArchiver;
use crate::cache::{CacheLock, JobCache, Slot};
use crate::composition::{CompositionGenerator, Purity};
use crate::config::{MachineProfile, XrfConfig};
use crate::error::WorkflowError;
use crate::job_service::JobService;
use crate::state_machine::{JobItem, JobMeta, Reading, Stage, StateMachine, Transition};

/// Readings generated for every item.
pub const READINGS_PER_ITEM: u8 = 2;

/// Poll interval while another process holds the cache lock.
const LOCK_RETRY: Duration = Duration::from_millis(50);

/// Result of a successful `fetch`.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub meta: JobMeta,
    pub items: Vec<JobItem>,
}

/// Result of a successful `generate`.
#[derive(Debug, Clone)]
pub struct GenerateOutcome {
    pub item_count: usize,
    pub readings: Vec<Reading>,
}

/// Result of a successful `submit`.
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub meta: JobMeta,
    pub stage: Stage,
    pub reading_count: usize,
    pub archive_path: PathBuf,
    pub response: Value,
}

/// Snapshot of the job in flight.
#[derive(Debug, Clone)]
pub struct JobStatus {
    pub stage: Stage,
    pub meta: Option<JobMeta>,
    pub item_count: Option<usize>,
    pub reading_count: Option<usize>,
}

/// Drives one job at a time through fetch, generate and submit.
///
/// Progress lives in the [`JobCache`]; every operation re-derives the stage
/// from it. Each operation holds the cache directory lock from its first read
/// to its last write, so callers never interleave on the cache slots, whether
/// they share this `Workflow` or run in another process.
pub struct Workflow<S> {
    service: S,
    cache: JobCache,
    archiver: ReportArchiver,
    config: XrfConfig,
    lock: Mutex<()>,
}

/// Held for the duration of one operation.
struct OperationGuard<'a> {
    _local: MutexGuard<'a, ()>,
    _cache: CacheLock,
}

impl<S: JobService> Workflow<S> {
    pub fn new(service: S, cache: JobCache, archiver: ReportArchiver, config: XrfConfig) -> Self {
        Self {
            service,
            cache,
            archiver,
            config,
            lock: Mutex::new(()),
        }
    }

    pub async fn stage(&self) -> Result<Stage, WorkflowError> {
        let _guard = self.acquire().await?;
        StateMachine::current(&self.cache)
    }

    pub async fn status(&self) -> Result<JobStatus, WorkflowError> {
        let _guard = self.acquire().await?;
        let stage = StateMachine::current(&self.cache)?;
        let (meta, item_count, reading_count) = match stage {
            Stage::Idle | Stage::Submitted => (None, None, None),
            Stage::Fetched => (
                Some(self.cache.get::<JobMeta>(Slot::JobMeta)?),
                Some(self.cache.get::<Vec<Value>>(Slot::FetchedItems)?.len()),
                None,
            ),
            Stage::Generated => (
                Some(self.cache.get::<JobMeta>(Slot::JobMeta)?),
                Some(self.cache.get::<Vec<Value>>(Slot::FetchedItems)?.len()),
                Some(self.cache.get::<Vec<Value>>(Slot::Readings)?.len()),
            ),
        };
        Ok(JobStatus {
            stage,
            meta,
            item_count,
            reading_count,
        })
    }

    /// Stage 1: fetch the job's items and remember the request.
    pub async fn fetch(
        &self,
        request_num: &str,
        job_num: &str,
        machine: &str,
    ) -> Result<FetchOutcome, WorkflowError> {
        let _guard = self.acquire().await?;
        self.enter(Transition::Fetch)?;

        let request_num = request_num.trim();
        let job_num = job_num.trim();
        if request_num.is_empty() {
            return Err(WorkflowError::MissingField("request number"));
        }
        if job_num.is_empty() {
            return Err(WorkflowError::MissingField("job number"));
        }
        let profile = self.machine(machine)?;

        let items = self
            .service
            .fetch_items(request_num, job_num, &profile.payload)
            .await?;
        if items.is_empty() {
            return Err(WorkflowError::NoDataFound {
                request_num: request_num.to_string(),
                job_num: job_num.to_string(),
            });
        }

        let meta = JobMeta {
            request_num: request_num.to_string(),
            job_num: job_num.to_string(),
            machine: machine.to_string(),
        };
        self.cache.put(Slot::FetchedItems, &items)?;
        self.cache.put(Slot::JobMeta, &meta)?;

        info!(
            request_num,
            job_num,
            machine,
            items = items.len(),
            "{} → {}",
            Stage::Idle,
            Transition::Fetch.target()
        );
        Ok(FetchOutcome { meta, items })
    }

    /// Stage 2: synthesize two readings per fetched item.
    pub async fn generate(&self) -> Result<GenerateOutcome, WorkflowError> {
        self.generate_with(StdRng::from_entropy()).await
    }

    /// [`generate`](Self::generate) with a caller-supplied random source.
    pub async fn generate_with<R: Rng>(&self, rng: R) -> Result<GenerateOutcome, WorkflowError> {
        let _guard = self.acquire().await?;
        self.enter(Transition::Generate)?;

        let items: Vec<JobItem> = self.cache.get(Slot::FetchedItems)?;
        let readings = synthesize(&items, &mut CompositionGenerator::new(rng))?;
        check_reading_count(items.len(), &readings)?;
        self.cache.put(Slot::Readings, &readings)?;

        info!(
            items = items.len(),
            readings = readings.len(),
            "{} → {}",
            Stage::Fetched,
            Transition::Generate.target()
        );
        Ok(GenerateOutcome {
            item_count: items.len(),
            readings,
        })
    }

    /// Stage 3: submit the readings, archive them and clear the job.
    ///
    /// A rejected submit leaves the job `Generated`. Failures after upstream
    /// accepted the readings are reported as
    /// [`WorkflowError::ArchiveAfterSubmit`] or
    /// [`WorkflowError::ClearAfterSubmit`] and must not be retried.
    pub async fn submit(&self) -> Result<SubmitOutcome, WorkflowError> {
        let _guard = self.acquire().await?;
        self.enter(Transition::Submit)?;

        let meta: JobMeta = self.cache.get(Slot::JobMeta)?;
        let readings: Vec<Reading> = self.cache.get(Slot::Readings)?;
        let profile = self.machine(&meta.machine)?;

        let response = match self
            .service
            .submit_readings(&meta.request_num, &meta.job_num, &profile.payload, &readings)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(job_num = %meta.job_num, error = %e, "submit failed; job stays {}", Stage::Generated);
                return Err(e.into());
            }
        };

        let archive_path = match self.archiver.write(&readings, &meta, &profile.name) {
            Ok(path) => path,
            Err(source) => {
                error!(
                    job_num = %meta.job_num,
                    request_num = %meta.request_num,
                    error = %source,
                    "readings accepted upstream but NOT archived; do not resubmit"
                );
                return Err(WorkflowError::ArchiveAfterSubmit {
                    job_num: meta.job_num,
                    response,
                    source,
                });
            }
        };

        if let Err(source) = self.cache.clear_all() {
            error!(
                job_num = %meta.job_num,
                request_num = %meta.request_num,
                archive = %archive_path.display(),
                error = %source,
                "readings accepted upstream and archived but cache NOT cleared; reset, do not resubmit"
            );
            return Err(WorkflowError::ClearAfterSubmit {
                job_num: meta.job_num,
                response,
                source,
            });
        }
        info!(
            job_num = %meta.job_num,
            readings = readings.len(),
            archive = %archive_path.display(),
            "{} → {} → {}",
            Stage::Generated,
            Stage::Submitted,
            Stage::Idle
        );
        Ok(SubmitOutcome {
            meta,
            stage: Stage::Submitted,
            reading_count: readings.len(),
            archive_path,
            response,
        })
    }

    /// Drops whatever job is cached and returns to `Idle`.
    pub async fn reset(&self) -> Result<(), WorkflowError> {
        let _guard = self.acquire().await?;
        self.cache.clear_all()?;
        info!("job cache reset");
        Ok(())
    }

    async fn acquire(&self) -> Result<OperationGuard<'_>, WorkflowError> {
        let local = self.lock.lock().await;
        let mut waiting = false;
        loop {
            if let Some(cache) = self.cache.try_lock()? {
                return Ok(OperationGuard {
                    _local: local,
                    _cache: cache,
                });
            }
            if !waiting {
                debug!("cache locked elsewhere; waiting");
                waiting = true;
            }
            tokio::time::sleep(LOCK_RETRY).await;
        }
    }

    fn enter(&self, transition: Transition) -> Result<(), WorkflowError> {
        let current = StateMachine::current(&self.cache)?;
        StateMachine::check(current, transition).inspect_err(|_| {
            warn!(%transition, %current, "rejected out-of-order stage");
        })
    }

    fn machine(&self, selector: &str) -> Result<&MachineProfile, WorkflowError> {
        self.config
            .machine(selector)
            .ok_or_else(|| WorkflowError::UnknownMachine(selector.to_string()))
    }
}

/// Produces [`READINGS_PER_ITEM`] readings for each item, or fails as a whole.
pub fn synthesize<R: Rng>(
    items: &[JobItem],
    generator: &mut CompositionGenerator<R>,
) -> Result<Vec<Reading>, WorkflowError> {
    let mut readings = Vec::with_capacity(items.len() * READINGS_PER_ITEM as usize);
    for item in items {
        let purity = Purity::from_declared(&item.declare_purity)?;
        for n in 1..=READINGS_PER_ITEM {
            readings.push(Reading::new(item, n, generator.generate(purity)?));
        }
    }
    Ok(readings)
}

pub fn check_reading_count(items: usize, readings: &[Reading]) -> Result<(), WorkflowError> {
    let expected = items * READINGS_PER_ITEM as usize;
    if readings.len() == expected {
        Ok(())
    } else {
        Err(WorkflowError::ReadingCountMismatch {
            items,
            expected,
            actual: readings.len(),
        })
    }
}
