//! Run sequencing: the kernel state machine and the orchestrator driving it.

pub mod orchestrator;
pub mod state;

pub use orchestrator::{DecisionKernel, KernelOutcome};
pub use state::{KernelEvent, KernelState};
