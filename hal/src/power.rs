//! # Power Management Unit Interface
//!
//! Types and traits for the PMU register layer: power-domain masks,
//! wake/reject trigger masks, and the backend contract the sleep sequencer
//! programs before committing a sleep attempt.

use bitflags::bitflags;

use crate::HalResult;
use crate::clock::CpuClockSource;

bitflags! {
    /// Independently switchable power domains.
    ///
    /// A set bit in a "down" mask means the domain is requested (or was
    /// observed) powered off during sleep.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PowerDomains: u32 {
        /// Top-level digital domain (buses, HP peripherals' parent)
        const TOP       = 1 << 0;
        /// CPU core domain
        const CPU       = 1 << 1;
        /// Radio/modem domain
        const MODEM     = 1 << 2;
        /// High-power peripheral domain
        const HP_PERIPH = 1 << 3;
        /// Low-power peripheral domain
        const LP_PERIPH = 1 << 4;
        /// Main crystal oscillator
        const XTAL      = 1 << 5;
        /// Fast RC oscillator
        const RC_FAST   = 1 << 6;
        /// 32 kHz crystal oscillator
        const XTAL32K   = 1 << 7;
        /// Low-power analog block (ADC / temperature monitor)
        const LP_ANALOG = 1 << 8;
    }
}

bitflags! {
    /// Hardware event classes that can wake the chip from sleep, or veto
    /// (reject) entry into sleep when armed as reject sources.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct WakeTriggers: u32 {
        /// Sleep timer expiry
        const TIMER    = 1 << 0;
        /// GPIO level/edge event
        const GPIO     = 1 << 1;
        /// UART0 activity
        const UART0    = 1 << 2;
        /// UART1 activity
        const UART1    = 1 << 3;
        /// Low-power timer
        const LP_TIMER = 1 << 4;
        /// WiFi MAC event
        const WIFI     = 1 << 5;
        /// Bluetooth MAC event
        const BT       = 1 << 6;
        /// Software trigger
        const SOFTWARE = 1 << 7;
    }
}

/// Hardware wait-cycle counts programmed before a sleep attempt.
///
/// Derived from the computed wait budget; the PMU uses these to time the
/// wake sequence so software resumes only after clocks and supplies have
/// settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HwWaitCycles {
    /// Wake compensation in slow-clock cycles (LP subsystem)
    pub lp_wakeup_cycles: u32,
    /// Clock-domain sync in fast-clock cycles (HP subsystem)
    pub hp_sync_cycles: u32,
}

/// What the hardware reported when a blocking sleep commit returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepSignal {
    /// The chip slept and woke up; `cause` holds the waking trigger(s)
    Wakeup {
        /// Trigger(s) that ended the sleep
        cause: WakeTriggers,
    },
    /// Entry into sleep was vetoed before any domain was switched
    Rejected {
        /// Trigger(s) that vetoed entry; empty if hardware gave no cause
        source: WakeTriggers,
    },
}

/// PMU register-layer backend.
///
/// One implementation per chip. All methods except [`commit_sleep`] are
/// non-blocking register programming; `commit_sleep` stalls the issuing
/// core until the hardware reports wake or reject.
///
/// [`commit_sleep`]: PmuBackend::commit_sleep
pub trait PmuBackend: Send + Sync {
    /// Program the wake-sequence wait-cycle registers
    fn program_wait_cycles(&self, cycles: HwWaitCycles) -> HalResult<()>;

    /// Program analog/digital power parameters for the requested down-set
    fn apply_power_config(&self, domains_down: PowerDomains, deep: bool) -> HalResult<()>;

    /// Issue the sleep command and block until wake or reject.
    ///
    /// `wake` arms the wake sources, `reject` arms the veto sources. The
    /// call returns on the issuing core only; other cores are stalled by a
    /// separate mechanism outside this interface.
    fn commit_sleep(&self, wake: WakeTriggers, reject: WakeTriggers, deep: bool) -> SleepSignal;

    /// Domains the hardware actually powered down during the last sleep.
    ///
    /// May be narrower than requested if the hardware vetoed individual
    /// domains.
    fn powered_down_domains(&self) -> PowerDomains;

    /// Current CPU root clock source
    fn cpu_clock_source(&self) -> CpuClockSource;

    /// Switch the CPU root clock source
    fn set_cpu_clock_source(&self, source: CpuClockSource) -> HalResult<()>;

    /// Enable or disable the system PLL
    fn set_pll_enabled(&self, enabled: bool);

    /// Monotonic microsecond timestamp
    fn now_us(&self) -> u64;
}

/// No-op PMU backend.
///
/// Reports an immediate wakeup on commit and never powers anything down.
/// Serves as the default until a chip crate injects a real backend.
#[derive(Debug, Default)]
pub struct NullPmu;

impl PmuBackend for NullPmu {
    fn program_wait_cycles(&self, _cycles: HwWaitCycles) -> HalResult<()> {
        Ok(())
    }

    fn apply_power_config(&self, _domains_down: PowerDomains, _deep: bool) -> HalResult<()> {
        Ok(())
    }

    fn commit_sleep(&self, wake: WakeTriggers, _reject: WakeTriggers, _deep: bool) -> SleepSignal {
        log::debug!("null PMU: commit with wake={wake:?}, reporting immediate wakeup");
        SleepSignal::Wakeup {
            cause: WakeTriggers::SOFTWARE,
        }
    }

    fn powered_down_domains(&self) -> PowerDomains {
        PowerDomains::empty()
    }

    fn cpu_clock_source(&self) -> CpuClockSource {
        CpuClockSource::Xtal
    }

    fn set_cpu_clock_source(&self, _source: CpuClockSource) -> HalResult<()> {
        Ok(())
    }

    fn set_pll_enabled(&self, _enabled: bool) {}

    fn now_us(&self) -> u64 {
        0
    }
}
