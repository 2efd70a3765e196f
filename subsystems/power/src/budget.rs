//! # Sleep Timing Budget Calculator
//!
//! Pure computation of the hardware wait budget for one sleep/wake cycle:
//! how long the wake sequence needs before software may run again, given
//! which domains go down and the calibrated oscillator periods. The result
//! sizes the wake timer compensation programmed into the PMU.
//!
//! No side effects anywhere in this module; callers may probe "what would
//! this cost" speculatively.

use ember_hal::power::PowerDomains;

/// Fractional bits of a calibrated clock period (Q13.19 fixed point)
pub const CAL_FRACT_BITS: u32 = 19;

/// Calibrated oscillator period in Q13.19 microseconds-per-cycle.
///
/// Produced by the calibration subsystem; this module only converts with
/// it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibratedPeriod(u32);

impl CalibratedPeriod {
    /// Wrap a raw Q13.19 period
    #[inline(always)]
    pub const fn from_raw(raw: u32) -> Self {
        CalibratedPeriod(raw)
    }

    /// Raw Q13.19 value
    #[inline(always)]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Convert an oscillator cycle count to whole microseconds
    #[inline]
    pub const fn cycles_to_us(self, cycles: u32) -> u32 {
        ((cycles as u64 * self.0 as u64) >> CAL_FRACT_BITS) as u32
    }

    /// Convert a microsecond duration to oscillator cycles (rounding down)
    #[inline]
    pub const fn us_to_cycles(self, us: u32) -> u32 {
        if self.0 == 0 {
            0
        } else {
            (((us as u64) << CAL_FRACT_BITS) / self.0 as u64) as u32
        }
    }
}

/// Calibrated slow and fast clock periods, updated whenever the
/// calibration subsystem re-measures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockCalibration {
    /// Slow clock (RTC) period
    pub slow: CalibratedPeriod,
    /// Fast clock period
    pub fast: CalibratedPeriod,
}

/// LP subsystem timing constants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LpMachineConstants {
    /// Minimum time the LP subsystem spends asleep, microseconds
    pub min_sleep_us: u32,
    /// Analog settling when the TOP domain stayed powered, microseconds
    pub analog_wait_powered_up_us: u32,
    /// Analog settling when the TOP domain was powered down, microseconds
    pub analog_wait_powered_down_us: u32,
    /// Crystal settling when the XTAL went down, microseconds
    pub xtal_stable_us: u32,
    /// Clock-source power-up wait, slow-clock cycles
    pub clk_power_on_cycles: u32,
    /// Oscillator switch-over wait, slow-clock cycles
    pub clk_switch_cycles: u32,
    /// Wake sequencing wait, slow-clock cycles
    pub wakeup_wait_cycles: u32,
    /// Power supply settling, microseconds
    pub power_supply_wait_us: u32,
    /// Domain power-up wait, microseconds
    pub power_up_wait_us: u32,
}

/// HP subsystem timing constants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HpMachineConstants {
    /// Power supply settling, microseconds
    pub power_supply_wait_us: u32,
    /// Domain power-up wait, microseconds
    pub power_up_wait_us: u32,
    /// Retention engine replay after a TOP power-down, microseconds
    pub retention_replay_us: u32,
    /// Crystal stabilization, microseconds
    pub xtal_stable_us: u32,
    /// PLL stabilization, microseconds
    pub pll_stable_us: u32,
    /// Clock-domain synchronization, fast-clock cycles
    pub clock_sync_cycles: u32,
}

/// Static machine timing constants for one chip.
///
/// The values are platform calibration data supplied by the embedder; the
/// defaults here are representative placeholders only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SleepMachineConstants {
    /// LP subsystem contribution
    pub lp: LpMachineConstants,
    /// HP subsystem contribution
    pub hp: HpMachineConstants,
}

impl SleepMachineConstants {
    /// Representative placeholder constants
    pub const DEFAULT: SleepMachineConstants = SleepMachineConstants {
        lp: LpMachineConstants {
            min_sleep_us: 450,
            analog_wait_powered_up_us: 90,
            analog_wait_powered_down_us: 154,
            xtal_stable_us: 250,
            clk_power_on_cycles: 1,
            clk_switch_cycles: 1,
            wakeup_wait_cycles: 10,
            power_supply_wait_us: 2,
            power_up_wait_us: 2,
        },
        hp: HpMachineConstants {
            power_supply_wait_us: 2,
            power_up_wait_us: 2,
            retention_replay_us: 480,
            xtal_stable_us: 250,
            pll_stable_us: 1,
            clock_sync_cycles: 8,
        },
    };
}

impl Default for SleepMachineConstants {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Compute the hardware wait budget, in microseconds, for waking from a
/// sleep that powers down `domains_down`.
///
/// The LP half covers the low-power subsystem's own minimum sleep, analog
/// settling (the powered-down variant when TOP goes down), clock power-on,
/// oscillator switch-over and wake sequencing; the HP half covers digital
/// power-up, the retention replay after a TOP power-down, and clock
/// stabilization (crystal plus PLL when the XTAL went down, PLL alone when
/// something else kept it up).
///
/// The result is non-negative and never decreases when the down-set widens:
/// powering down strictly adds wait states. Settling terms that replace a
/// cheaper wait are floored at the wait they replace to keep that guarantee
/// for any constants.
pub fn compute_wait_budget(
    domains_down: PowerDomains,
    slow_clock_period: CalibratedPeriod,
    fast_clock_period: CalibratedPeriod,
    constants: &SleepMachineConstants,
) -> u32 {
    let top_down = domains_down.contains(PowerDomains::TOP);
    let xtal_down = domains_down.contains(PowerDomains::XTAL);

    let lp = &constants.lp;
    let analog_wait_us = if top_down {
        lp.analog_wait_powered_down_us.max(lp.analog_wait_powered_up_us)
    } else {
        lp.analog_wait_powered_up_us
    };
    let clk_power_on_us = {
        let generic = slow_clock_period.cycles_to_us(lp.clk_power_on_cycles);
        if xtal_down {
            lp.xtal_stable_us.max(generic)
        } else {
            generic
        }
    };
    let lp_wait_us = lp.min_sleep_us
        + analog_wait_us
        + clk_power_on_us
        + slow_clock_period.cycles_to_us(lp.clk_switch_cycles)
        + slow_clock_period.cycles_to_us(lp.wakeup_wait_cycles)
        + lp.power_supply_wait_us
        + lp.power_up_wait_us;

    let hp = &constants.hp;
    let digital_wait_us = hp.power_supply_wait_us + hp.power_up_wait_us;
    let retention_us = if top_down { hp.retention_replay_us } else { 0 };
    let clock_wait_us = if xtal_down {
        hp.xtal_stable_us + hp.pll_stable_us
    } else {
        hp.pll_stable_us
    };
    let hp_wait_us = digital_wait_us
        + retention_us
        + clock_wait_us
        + fast_clock_period.cycles_to_us(hp.clock_sync_cycles);

    lp_wait_us + hp_wait_us
}

// ============================================================================
// TESTS
// ============================================================================
