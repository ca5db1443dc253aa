//! Kernel run-sequencing state machine.
//!
//! ```text
//! Idle ─start→ Canonicalizing ─canonicalized→ Solving ─solved(adv)→ Perturbing
//!                                                │                     │
//!                                        solved(no adv)        trials_finished
//!                                                ↓                     ↓
//!                                             Assuring ←───────────────┘
//!                                                │
//!                                          evidence_built → Done
//! ```
//!
//! `fail` moves any active state to `Failed`. `Done` and `Failed` are terminal.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::error::{KernelError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelState {
    Idle,
    Canonicalizing,
    Solving,
    Perturbing,
    Assuring,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelEvent {
    Start,
    Canonicalized,
    Solved { adversarial: bool },
    TrialsFinished,
    EvidenceBuilt,
    Fail,
}

impl KernelState {
    pub const ALL: [KernelState; 7] = [
        KernelState::Idle,
        KernelState::Canonicalizing,
        KernelState::Solving,
        KernelState::Perturbing,
        KernelState::Assuring,
        KernelState::Done,
        KernelState::Failed,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            KernelState::Idle => "idle",
            KernelState::Canonicalizing => "canonicalizing",
            KernelState::Solving => "solving",
            KernelState::Perturbing => "perturbing",
            KernelState::Assuring => "assuring",
            KernelState::Done => "done",
            KernelState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, KernelState::Done | KernelState::Failed)
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal() && *self != KernelState::Idle
    }

    pub fn transition(self, event: KernelEvent) -> Result<KernelState> {
        use KernelEvent as E;
        use KernelState as S;

        let next = match (self, event) {
            (S::Idle, E::Start) => S::Canonicalizing,
            (S::Canonicalizing, E::Canonicalized) => S::Solving,
            (S::Solving, E::Solved { adversarial: true }) => S::Perturbing,
            (S::Solving, E::Solved { adversarial: false }) => S::Assuring,
            (S::Perturbing, E::TrialsFinished) => S::Assuring,
            (S::Assuring, E::EvidenceBuilt) => S::Done,
            (state, E::Fail) if state.is_active() => S::Failed,
            (state, event) => {
                return Err(KernelError::IllegalTransition {
                    from: state.to_string(),
                    event: event.to_string(),
                })
            }
        };
        Ok(next)
    }
}

impl fmt::Display for KernelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for KernelEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelEvent::Start => f.write_str("start"),
            KernelEvent::Canonicalized => f.write_str("canonicalized"),
            KernelEvent::Solved { adversarial } => write!(f, "solved(adversarial={adversarial})"),
            KernelEvent::TrialsFinished => f.write_str("trials_finished"),
            KernelEvent::EvidenceBuilt => f.write_str("evidence_built"),
            KernelEvent::Fail => f.write_str("fail"),
        }
    }
}
