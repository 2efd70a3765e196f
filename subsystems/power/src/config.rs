//! # Sleep Configuration and Outcome
//!
//! Transient value types describing one sleep attempt: the caller's
//! request, the assembled configuration actually programmed into hardware,
//! and the recorded outcome handed back to the caller and to diagnostics.

use ember_hal::power::{PowerDomains, WakeTriggers};

use crate::submode::SubModeSnapshot;

/// What the sleep-entry call site asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SleepRequest {
    /// Power domains requested off
    pub domains_down: PowerDomains,
    /// Wake sources to arm
    pub wake: WakeTriggers,
    /// Reject (veto) sources to arm
    pub reject: WakeTriggers,
    /// Deep sleep (state-destroying) rather than light sleep
    pub deep: bool,
}

/// One sleep attempt, fully assembled.
///
/// Created fresh for each attempt from the request and the frozen sub-mode
/// snapshot; consumed by the sequencer and discarded afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SleepConfiguration {
    /// Power domains going down after sub-mode overrides
    pub domains_down: PowerDomains,
    /// Armed wake sources
    pub wake: WakeTriggers,
    /// Armed reject sources
    pub reject: WakeTriggers,
    /// Deep vs light sleep
    pub deep: bool,
    /// Sub-mode state frozen at attempt start
    pub sub_modes: SubModeSnapshot,
}

impl SleepConfiguration {
    /// Assemble a configuration from the caller's request and the frozen
    /// sub-mode snapshot, applying the active modes' domain overrides
    pub fn assemble(request: &SleepRequest, sub_modes: SubModeSnapshot) -> Self {
        Self {
            domains_down: sub_modes.apply_overrides(request.domains_down),
            wake: request.wake,
            reject: request.reject,
            deep: request.deep,
            sub_modes,
        }
    }
}

/// Recorded result of one sleep attempt.
///
/// Read-only once produced. A hardware reject is reported here, not as an
/// error: the caller decides retry/abort policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SleepOutcome {
    /// Whether hardware vetoed entry before any domain switched
    pub rejected: bool,
    /// Trigger(s) that vetoed entry; empty when not rejected (or when
    /// hardware gave no cause)
    pub reject_source: WakeTriggers,
    /// Trigger(s) that ended the sleep; empty when rejected
    pub wake_cause: WakeTriggers,
    /// Domains the hardware actually powered down (may be narrower than
    /// requested)
    pub powered_down: PowerDomains,
    /// Wait budget programmed for this attempt, microseconds
    pub wait_budget_us: u32,
    /// Timestamp when the attempt entered the commit phase, microseconds
    pub entered_at_us: u64,
    /// Timestamp when the attempt finished resuming, microseconds
    pub resumed_at_us: u64,
}

impl SleepOutcome {
    /// Total elapsed time of the attempt, commit to resume
    #[inline]
    pub fn elapsed_us(&self) -> u64 {
        self.resumed_at_us.saturating_sub(self.entered_at_us)
    }
}
