//! # Sub-Mode Registry
//!
//! Reference-counted software sleep requirements. A sub-mode does not gate
//! any peripheral clock; it constrains what the sleep configuration
//! assembler may power down (and, for some modes, widens what it may).
//! Drivers activate a mode while they hold the requirement and deactivate
//! it when done; the registry arbitrates overlapping holders the same way
//! the clock-gate registry does.

use ember_hal::power::PowerDomains;
use spin::Mutex;

use crate::{PowerError, PowerResult};

/// A named software-declared sleep requirement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SubMode {
    /// Keep the fast RC oscillator feeding the RTC domain during sleep
    RtcUseRcFast = 0,
    /// Keep the fast RC oscillator feeding the digital domain during sleep
    DigUseRcFast = 1,
    /// Permit the deepest analog power-down when nothing needs the monitor
    UltraLow = 2,
    /// Keep the main crystal powering the LP subsystem during sleep
    LpUseXtal = 3,
    /// Keep the LP analog block (ADC / temperature monitor) powered
    AnalogMonitor = 4,
}

impl SubMode {
    /// Number of sub-modes
    pub const COUNT: usize = 5;

    /// All sub-modes, in discriminant order
    pub const ALL: [SubMode; Self::COUNT] = [
        SubMode::RtcUseRcFast,
        SubMode::DigUseRcFast,
        SubMode::UltraLow,
        SubMode::LpUseXtal,
        SubMode::AnalogMonitor,
    ];

    /// Sub-mode for a raw identifier crossing the API boundary
    pub const fn from_raw(raw: u32) -> PowerResult<SubMode> {
        match raw {
            0 => Ok(SubMode::RtcUseRcFast),
            1 => Ok(SubMode::DigUseRcFast),
            2 => Ok(SubMode::UltraLow),
            3 => Ok(SubMode::LpUseXtal),
            4 => Ok(SubMode::AnalogMonitor),
            _ => Err(PowerError::InvalidSubMode),
        }
    }

    /// Short name for diagnostics
    pub const fn name(self) -> &'static str {
        match self {
            SubMode::RtcUseRcFast => "rtc-use-rc-fast",
            SubMode::DigUseRcFast => "dig-use-rc-fast",
            SubMode::UltraLow => "ultra-low",
            SubMode::LpUseXtal => "lp-use-xtal",
            SubMode::AnalogMonitor => "analog-monitor",
        }
    }
}

/// Read-only snapshot of all sub-mode reference counts.
///
/// The sequencer takes one snapshot when a sleep attempt begins and works
/// from it for the whole attempt, so later registry mutations cannot tear a
/// configuration mid-assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubModeSnapshot {
    counts: [i16; SubMode::COUNT],
}

impl SubModeSnapshot {
    /// Reference count of `mode` at snapshot time
    #[inline(always)]
    pub fn count(&self, mode: SubMode) -> i16 {
        self.counts[mode as usize]
    }

    /// Whether `mode` had at least one holder at snapshot time
    #[inline(always)]
    pub fn is_active(&self, mode: SubMode) -> bool {
        self.count(mode) > 0
    }

    /// Apply the active modes' power-domain overrides to a requested
    /// down-set.
    ///
    /// Widening overrides run first; keep-alive overrides run last and win,
    /// so a mode that needs a domain powered always outranks one that would
    /// power it down.
    pub fn apply_overrides(&self, requested_down: PowerDomains) -> PowerDomains {
        let mut down = requested_down;

        if self.is_active(SubMode::UltraLow) {
            down |= PowerDomains::LP_ANALOG;
        }

        if self.is_active(SubMode::RtcUseRcFast) || self.is_active(SubMode::DigUseRcFast) {
            down &= !PowerDomains::RC_FAST;
        }
        if self.is_active(SubMode::LpUseXtal) {
            down &= !PowerDomains::XTAL;
        }
        if self.is_active(SubMode::AnalogMonitor) {
            down &= !PowerDomains::LP_ANALOG;
        }

        down
    }
}

/// Per-mode reference counts behind one short critical section
#[derive(Debug, Default)]
pub struct SubModeRegistry {
    counts: Mutex<[i16; SubMode::COUNT]>,
}

impl SubModeRegistry {
    /// Create a registry with all counts at zero
    pub const fn new() -> Self {
        Self {
            counts: Mutex::new([0; SubMode::COUNT]),
        }
    }

    /// Declare one more holder of `mode`
    pub fn activate(&self, mode: SubMode) {
        let mut counts = self.counts.lock();
        counts[mode as usize] += 1;
        log::debug!(
            "sub-mode {} activated (count {})",
            mode.name(),
            counts[mode as usize]
        );
    }

    /// Release one holder of `mode`.
    ///
    /// # Panics
    ///
    /// Panics if the count is already zero: an activate/deactivate pair
    /// upstream is unbalanced.
    pub fn deactivate(&self, mode: SubMode) {
        let mut counts = self.counts.lock();
        let prior = counts[mode as usize];
        assert!(prior > 0, "unbalanced sub-mode deactivate for {}", mode.name());
        counts[mode as usize] = prior - 1;
        log::debug!("sub-mode {} deactivated (count {})", mode.name(), prior - 1);
    }

    /// Unconditionally reset `mode`'s count to zero.
    ///
    /// Not a balanced operation: no deactivate logic runs. Used once during
    /// bring-up to guarantee a known baseline.
    pub fn force_disable(&self, mode: SubMode) {
        let mut counts = self.counts.lock();
        let prior = counts[mode as usize];
        counts[mode as usize] = 0;
        if prior != 0 {
            log::warn!("sub-mode {} force-disabled (count was {})", mode.name(), prior);
        }
    }

    /// [`force_disable`](Self::force_disable) for a raw identifier crossing
    /// the API boundary; rejects out-of-range identifiers without touching
    /// any state.
    pub fn force_disable_raw(&self, raw: u32) -> PowerResult<()> {
        let mode = SubMode::from_raw(raw)?;
        self.force_disable(mode);
        Ok(())
    }

    /// Current count of `mode`
    pub fn count(&self, mode: SubMode) -> i16 {
        self.counts.lock()[mode as usize]
    }

    /// Read-only snapshot of every count; never mutates state
    pub fn dump(&self) -> SubModeSnapshot {
        SubModeSnapshot {
            counts: *self.counts.lock(),
        }
    }

    /// Alias of [`dump`](Self::dump) used by the sequencer when freezing
    /// the mode state for one sleep attempt
    #[inline]
    pub fn snapshot(&self) -> SubModeSnapshot {
        self.dump()
    }
}

// ============================================================================
// TESTS
// ============================================================================
