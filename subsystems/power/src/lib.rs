//! # Ember Power Subsystem
//!
//! Sleep/wake orchestration and reference-counted clock-domain management
//! for the Ember platform. This crate decides which power domains,
//! oscillators and peripheral clock trees may be switched off when the
//! system sleeps, computes the hardware timing budget to do so safely,
//! sequences the transition, and restores the prior state on wake.
//!
//! ## Components
//!
//! - **Clock-Gate Registry** ([`gate`]): per-consumer reference counts with
//!   hardware toggles fired only on 0→1 / 1→0 edges
//! - **Module Resolver** ([`modules`]): logical shared modules mapped onto
//!   fixed clock-consumer sets
//! - **Sub-Mode Registry** ([`submode`]): software-declared sleep
//!   requirements that override default power-down policy
//! - **Timing Budget** ([`budget`]): pure wait-budget computation from
//!   calibrated clock periods and machine constants
//! - **UART Drain Policy** ([`uart`]): flush/suspend/discard resolution for
//!   serial ports ahead of a sleep attempt
//! - **Sleep Sequencer** ([`sequencer`]): the actual entry/exit state
//!   machine, reporting a [`config::SleepOutcome`]
//!
//! ## Concurrency
//!
//! The registries are safe to call from task and interrupt context alike:
//! each operation runs inside one short spin critical section covering the
//! count mutation and the hardware toggle together. The only blocking point
//! in the whole subsystem is the PMU sleep commit.
//!
//! ## Error model
//!
//! Invalid arguments at the public boundary return [`PowerError`].
//! Unbalanced enable/disable pairs are caller bugs and panic: continuing
//! with a corrupted reference-count invariant is more dangerous in firmware
//! than a controlled restart. A hardware sleep reject is not an error at
//! all; it is a normal negative outcome.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod budget;
pub mod config;
pub mod gate;
pub mod modules;
pub mod sequencer;
pub mod submode;
pub mod uart;

use ember_hal::HalError;

pub use budget::{CalibratedPeriod, ClockCalibration, SleepMachineConstants};
pub use config::{SleepConfiguration, SleepOutcome, SleepRequest};
pub use gate::ClockGateRegistry;
pub use modules::SharedModule;
pub use sequencer::{SleepPhase, SleepSequencer, SleepStats};
pub use submode::{SubMode, SubModeRegistry, SubModeSnapshot};
pub use uart::{UartDrainPolicy, UartHandling};

/// Result type for power subsystem operations
pub type PowerResult<T> = Result<T, PowerError>;

/// Errors returned at the public API boundary.
///
/// These are recoverable and leave no state mutated. Programming errors
/// (unbalanced reference counts) panic instead; hardware sleep rejection is
/// reported through [`config::SleepOutcome`], never through this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerError {
    /// Argument out of range or otherwise malformed
    InvalidArgument,
    /// UART port index out of range
    InvalidPort,
    /// Raw sub-mode identifier out of range
    InvalidSubMode,
    /// A sleep attempt is already in flight
    Busy,
    /// A hardware backend reported a fault
    Hal(HalError),
}

impl From<HalError> for PowerError {
    fn from(err: HalError) -> Self {
        PowerError::Hal(err)
    }
}

/// Top-level power management context.
///
/// Bundles the process-wide registries and the sleep sequencer into one
/// explicitly constructed object; the embedder creates a single instance at
/// start-up and passes it (or its parts) to every caller. There is no
/// hidden global state.
#[derive(Debug)]
pub struct PowerContext<C, P, U>
where
    C: ember_hal::clock::ClockGateBackend,
    P: ember_hal::power::PmuBackend,
    U: ember_hal::uart::UartBackend,
{
    /// Clock-gate reference counting and module resolution
    pub clock_gates: ClockGateRegistry<C>,
    /// Software sleep requirements
    pub sub_modes: SubModeRegistry,
    /// Sleep entry/exit orchestration
    pub sequencer: SleepSequencer<P, U>,
}

impl<C, P, U> PowerContext<C, P, U>
where
    C: ember_hal::clock::ClockGateBackend,
    P: ember_hal::power::PmuBackend,
    U: ember_hal::uart::UartBackend,
{
    /// Build the context from its hardware backends and policy inputs
    pub fn new(
        gates: C,
        pmu: P,
        drain: UartDrainPolicy<U>,
        constants: SleepMachineConstants,
        calibration: ClockCalibration,
    ) -> Self {
        Self {
            clock_gates: ClockGateRegistry::new(gates),
            sub_modes: SubModeRegistry::new(),
            sequencer: SleepSequencer::new(pmu, drain, constants, calibration),
        }
    }

    /// Attempt a sleep cycle with the current sub-mode state.
    ///
    /// Convenience wrapper over [`SleepSequencer::attempt_sleep`].
    pub fn attempt_sleep(&self, request: &SleepRequest) -> PowerResult<SleepOutcome> {
        self.sequencer.attempt_sleep(&self.sub_modes, request)
    }

    /// Read-only snapshot of all sub-mode reference counts
    pub fn dump_submode_counts(&self) -> SubModeSnapshot {
        self.sub_modes.dump()
    }
}
