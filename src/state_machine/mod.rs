mod job;
mod state;

pub use job::{JobItem, JobMeta, Reading};
pub use state::{SlotFill, Stage, StateMachine, Transition};
