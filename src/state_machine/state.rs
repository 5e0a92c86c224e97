use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cache::{CacheError, JobCache, Slot};
use crate::error::WorkflowError;

/// Stages of the XRF job workflow.
///
/// Each job flows through: IDLE → FETCHED → GENERATED → SUBMITTED → IDLE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Idle,
    Fetched,
    Generated,
    Submitted,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Idle => write!(f, "IDLE"),
            Stage::Fetched => write!(f, "FETCHED"),
            Stage::Generated => write!(f, "GENERATED"),
            Stage::Submitted => write!(f, "SUBMITTED"),
        }
    }
}

/// The operations that move a job between stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Fetch,
    Generate,
    Submit,
}

impl Transition {
    /// Stage a job must be in for this transition to run.
    pub fn requires(self) -> Stage {
        match self {
            Transition::Fetch => Stage::Idle,
            Transition::Generate => Stage::Fetched,
            Transition::Submit => Stage::Generated,
        }
    }

    /// Stage reached when the transition succeeds.
    pub fn target(self) -> Stage {
        match self {
            Transition::Fetch => Stage::Fetched,
            Transition::Generate => Stage::Generated,
            Transition::Submit => Stage::Submitted,
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transition::Fetch => write!(f, "fetch"),
            Transition::Generate => write!(f, "generate"),
            Transition::Submit => write!(f, "submit"),
        }
    }
}

/// Which cache slots currently hold data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotFill {
    pub fetched_items: bool,
    pub job_meta: bool,
    pub readings: bool,
}

impl SlotFill {
    pub fn read(cache: &JobCache) -> Result<Self, CacheError> {
        Ok(Self {
            fetched_items: cache.is_filled(Slot::FetchedItems)?,
            job_meta: cache.is_filled(Slot::JobMeta)?,
            readings: cache.is_filled(Slot::Readings)?,
        })
    }
}

impl fmt::Display for SlotFill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = |filled: bool| if filled { "filled" } else { "empty" };
        write!(
            f,
            "fetched-items={}, job-meta={}, readings={}",
            mark(self.fetched_items),
            mark(self.job_meta),
            mark(self.readings)
        )
    }
}

/// Derives the current stage from cache contents.
///
/// The cache is the only record of progress, so a restarted process picks
/// up exactly where the last one stopped.
pub struct StateMachine;

impl StateMachine {
    pub fn stage(fill: SlotFill) -> Result<Stage, WorkflowError> {
        match (fill.fetched_items, fill.job_meta, fill.readings) {
            (false, false, false) => Ok(Stage::Idle),
            (true, true, false) => Ok(Stage::Fetched),
            (true, true, true) => Ok(Stage::Generated),
            _ => Err(WorkflowError::InconsistentCache(fill)),
        }
    }

    pub fn current(cache: &JobCache) -> Result<Stage, WorkflowError> {
        Self::stage(SlotFill::read(cache)?)
    }

    /// Fails with `StageOutOfOrder` unless `transition` may run from `current`.
    pub fn check(current: Stage, transition: Transition) -> Result<(), WorkflowError> {
        if current == transition.requires() {
            Ok(())
        } else {
            Err(WorkflowError::StageOutOfOrder {
                attempted: transition,
                current,
            })
        }
    }
}
