//! Pipeline controller: one capture producer thread, one bounded queue, and
//! a consumer loop that flushes windows on schedule.

mod cancel;
mod controller;
pub mod queue;

pub use cancel::CancellationToken;
pub use controller::{Pipeline, PipelineHandle};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Running,
    Draining,
    Stopped,
}
