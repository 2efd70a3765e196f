//! # Sleep Transition Sequencer
//!
//! Drives one sleep/wake cycle end to end:
//!
//! ```text
//! Idle -> Preparing -> Committing -> {Rejected | Asleep} -> Resuming -> Idle
//! ```
//!
//! Preparing assembles the configuration from the frozen sub-mode state,
//! quiesces the serial ports, computes and programs the wait budget, and
//! parks the CPU clock off the PLL. Committing blocks in the PMU until the
//! hardware reports wake or reject. Both paths then run the same symmetric
//! restore, so a reject leaves hardware exactly as an ordinary wake does.
//!
//! The commit call is the only suspension point in the subsystem, and there
//! is no software cancellation once it is issued; the only way out is a
//! hardware wake or reject event.

use core::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};

use ember_hal::clock::CpuClockSource;
use ember_hal::power::{HwWaitCycles, PmuBackend, PowerDomains, SleepSignal, WakeTriggers};
use ember_hal::uart::UartBackend;
use ember_hal::HalError;
use spin::Mutex;

use crate::budget::{compute_wait_budget, ClockCalibration, SleepMachineConstants};
use crate::config::{SleepConfiguration, SleepOutcome, SleepRequest};
use crate::submode::SubModeRegistry;
use crate::uart::UartDrainPolicy;
use crate::{PowerError, PowerResult};

/// Phase of the sleep state machine, observable from other contexts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SleepPhase {
    /// No attempt in flight
    Idle = 0,
    /// Assembling configuration and programming hardware
    Preparing = 1,
    /// Blocked in the hardware commit
    Committing = 2,
    /// Hardware vetoed entry; cleanup pending
    Rejected = 3,
    /// Hardware slept and woke; cleanup pending
    Asleep = 4,
    /// Restoring clocks and serial ports
    Resuming = 5,
}

impl From<u8> for SleepPhase {
    fn from(value: u8) -> Self {
        match value {
            1 => SleepPhase::Preparing,
            2 => SleepPhase::Committing,
            3 => SleepPhase::Rejected,
            4 => SleepPhase::Asleep,
            5 => SleepPhase::Resuming,
            _ => SleepPhase::Idle,
        }
    }
}

/// Cumulative sleep statistics snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SleepStats {
    /// Attempts started
    pub attempts: u32,
    /// Attempts the hardware rejected
    pub rejections: u32,
    /// Total time spent asleep, microseconds
    pub total_slept_us: u64,
}

/// Orchestrates sleep entry/exit against the PMU and UART backends
#[derive(Debug)]
pub struct SleepSequencer<P: PmuBackend, U: UartBackend> {
    pmu: P,
    drain: UartDrainPolicy<U>,
    constants: SleepMachineConstants,
    calibration: Mutex<ClockCalibration>,
    phase: AtomicU8,
    attempts: AtomicU32,
    rejections: AtomicU32,
    total_slept_us: AtomicU64,
}

impl<P: PmuBackend, U: UartBackend> SleepSequencer<P, U> {
    /// Create a sequencer in the `Idle` phase
    pub fn new(
        pmu: P,
        drain: UartDrainPolicy<U>,
        constants: SleepMachineConstants,
        calibration: ClockCalibration,
    ) -> Self {
        Self {
            pmu,
            drain,
            constants,
            calibration: Mutex::new(calibration),
            phase: AtomicU8::new(SleepPhase::Idle as u8),
            attempts: AtomicU32::new(0),
            rejections: AtomicU32::new(0),
            total_slept_us: AtomicU64::new(0),
        }
    }

    /// Current phase of the state machine
    pub fn phase(&self) -> SleepPhase {
        SleepPhase::from(self.phase.load(Ordering::Acquire))
    }

    /// Cumulative statistics
    pub fn stats(&self) -> SleepStats {
        SleepStats {
            attempts: self.attempts.load(Ordering::Relaxed),
            rejections: self.rejections.load(Ordering::Relaxed),
            total_slept_us: self.total_slept_us.load(Ordering::Relaxed),
        }
    }

    /// Replace the calibrated clock periods (calibration subsystem input)
    pub fn update_calibration(&self, calibration: ClockCalibration) {
        *self.calibration.lock() = calibration;
    }

    /// UART drain policy, for per-port configuration
    pub fn drain_policy(&self) -> &UartDrainPolicy<U> {
        &self.drain
    }

    /// Attempt one sleep cycle.
    ///
    /// The sub-mode state is frozen at entry; mutations made while the
    /// attempt runs affect only later attempts. A hardware reject is a
    /// normal outcome, reported in the returned [`SleepOutcome`]; callers
    /// that required sleep to proceed must check it and decide retry or
    /// abort themselves — there is no automatic retry.
    ///
    /// Errors are returned only for invalid requests, a concurrent attempt
    /// (`Busy`), or backend faults during preparation; any change already
    /// applied is unwound before returning.
    pub fn attempt_sleep(
        &self,
        sub_modes: &SubModeRegistry,
        request: &SleepRequest,
    ) -> PowerResult<SleepOutcome> {
        if self
            .phase
            .compare_exchange(
                SleepPhase::Idle as u8,
                SleepPhase::Preparing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return Err(PowerError::Busy);
        }
        self.attempts.fetch_add(1, Ordering::Relaxed);

        let cfg = SleepConfiguration::assemble(request, sub_modes.snapshot());
        log::info!(
            "sleep attempt: down={:?} deep={} wake={:?}",
            cfg.domains_down,
            cfg.deep,
            cfg.wake
        );

        self.drain.prepare(&cfg);

        let calibration = *self.calibration.lock();
        let budget_us = compute_wait_budget(
            cfg.domains_down,
            calibration.slow,
            calibration.fast,
            &self.constants,
        );
        let cycles = HwWaitCycles {
            lp_wakeup_cycles: calibration.slow.us_to_cycles(budget_us),
            hp_sync_cycles: self.constants.hp.clock_sync_cycles,
        };

        if let Err(err) = self.pmu.program_wait_cycles(cycles) {
            return Err(self.abort_preparing(err));
        }
        if let Err(err) = self.pmu.apply_power_config(cfg.domains_down, cfg.deep) {
            return Err(self.abort_preparing(err));
        }

        // Park the CPU on the crystal for the transition; the PLL cannot
        // feed a core whose domain is being sequenced.
        let prior_source = self.pmu.cpu_clock_source();
        let pll_parked = prior_source == CpuClockSource::Pll;
        if pll_parked {
            if let Err(err) = self.pmu.set_cpu_clock_source(CpuClockSource::Xtal) {
                return Err(self.abort_preparing(err));
            }
            self.pmu.set_pll_enabled(false);
        }

        self.phase
            .store(SleepPhase::Committing as u8, Ordering::Release);
        let entered_at_us = self.pmu.now_us();
        let signal = self.pmu.commit_sleep(cfg.wake, cfg.reject, cfg.deep);

        let landed = match signal {
            SleepSignal::Rejected { .. } => SleepPhase::Rejected,
            SleepSignal::Wakeup { .. } => SleepPhase::Asleep,
        };
        self.phase.store(landed as u8, Ordering::Release);

        // Symmetric restore, identical for wake and reject.
        self.phase
            .store(SleepPhase::Resuming as u8, Ordering::Release);
        if pll_parked {
            self.pmu.set_pll_enabled(true);
            if let Err(err) = self.pmu.set_cpu_clock_source(prior_source) {
                log::warn!("CPU clock source restore failed: {err:?}");
            }
        }
        self.drain.resume();
        let resumed_at_us = self.pmu.now_us();

        let outcome = match signal {
            SleepSignal::Rejected { source } => {
                log::warn!("sleep rejected by {source:?}");
                self.rejections.fetch_add(1, Ordering::Relaxed);
                SleepOutcome {
                    rejected: true,
                    reject_source: source,
                    wake_cause: WakeTriggers::empty(),
                    powered_down: PowerDomains::empty(),
                    wait_budget_us: budget_us,
                    entered_at_us,
                    resumed_at_us,
                }
            }
            SleepSignal::Wakeup { cause } => {
                let powered_down = self.pmu.powered_down_domains();
                log::info!(
                    "woke after {} us, cause={cause:?}, powered down {powered_down:?}",
                    resumed_at_us.saturating_sub(entered_at_us)
                );
                self.total_slept_us.fetch_add(
                    resumed_at_us.saturating_sub(entered_at_us),
                    Ordering::Relaxed,
                );
                SleepOutcome {
                    rejected: false,
                    reject_source: WakeTriggers::empty(),
                    wake_cause: cause,
                    powered_down,
                    wait_budget_us: budget_us,
                    entered_at_us,
                    resumed_at_us,
                }
            }
        };

        self.phase.store(SleepPhase::Idle as u8, Ordering::Release);
        Ok(outcome)
    }

    /// Unwind a failed preparation step and surface the fault.
    ///
    /// Only the serial ports can have been touched when this runs: the
    /// fallible hardware steps are ordered so the clock source is swapped
    /// last, and a failed swap leaves the source unchanged.
    fn abort_preparing(&self, err: HalError) -> PowerError {
        self.drain.resume();
        self.phase.store(SleepPhase::Idle as u8, Ordering::Release);
        log::warn!("sleep preparation failed: {err:?}");
        err.into()
    }
}

// ============================================================================
// TESTS
// ============================================================================
