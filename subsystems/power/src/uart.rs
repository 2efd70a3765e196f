//! # UART Drain Policy
//!
//! Decides, per serial port, whether pending output is flushed, suspended
//! or discarded before a sleep attempt. Deep sleep destroys state, so
//! draining fully is the only option there; light sleep picks the cheapest
//! handling the surviving hardware allows. Suspended ports are tracked in
//! a bitmap so resume touches exactly the set that was suspended.

use ember_hal::power::PowerDomains;
use ember_hal::uart::{MAX_UART_PORTS, UartBackend};
use spin::Mutex;
use static_assertions::const_assert;

use crate::config::SleepConfiguration;
use crate::{PowerError, PowerResult};

// The suspended bitmap is one byte wide.
const_assert!(MAX_UART_PORTS <= 8);

/// Configured handling of a port's pending output ahead of sleep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UartHandling {
    /// Resolve at sleep time from the sleep parameters
    #[default]
    Auto,
    /// Block until the transmit path drains
    Flush,
    /// Stop transmission, resume it after wake
    Suspend,
    /// Drop pending output and reset the FIFOs
    Discard,
}

impl UartHandling {
    /// Handling mode for a raw identifier crossing the API boundary
    pub const fn from_raw(raw: u32) -> PowerResult<UartHandling> {
        match raw {
            0 => Ok(UartHandling::Auto),
            1 => Ok(UartHandling::Flush),
            2 => Ok(UartHandling::Suspend),
            3 => Ok(UartHandling::Discard),
            _ => Err(PowerError::InvalidArgument),
        }
    }
}

/// Handling a port actually received, after Auto resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolved {
    Flush,
    Suspend,
    Discard,
}

#[derive(Debug)]
struct PortTable {
    handling: [UartHandling; MAX_UART_PORTS],
    suspended: u8,
}

/// Per-port drain policy plus the low-level UART backend
#[derive(Debug)]
pub struct UartDrainPolicy<U: UartBackend> {
    hw: U,
    console: Option<usize>,
    cache_safe_assert: bool,
    table: Mutex<PortTable>,
}

impl<U: UartBackend> UartDrainPolicy<U> {
    /// Create a policy with every port on Auto.
    ///
    /// `console` designates the debug console port, if any;
    /// `cache_safe_assert` reflects whether cache-safe assertion debugging
    /// is configured for this build, which forces Auto ports to flush so
    /// assertion output survives the transition.
    pub fn new(hw: U, console: Option<usize>, cache_safe_assert: bool) -> Self {
        Self {
            hw,
            console,
            cache_safe_assert,
            table: Mutex::new(PortTable {
                handling: [UartHandling::Auto; MAX_UART_PORTS],
                suspended: 0,
            }),
        }
    }

    /// Configure `port`'s handling mode
    pub fn set_handling(&self, port: usize, handling: UartHandling) -> PowerResult<()> {
        if port >= self.hw.port_count() || port >= MAX_UART_PORTS {
            return Err(PowerError::InvalidPort);
        }
        self.table.lock().handling[port] = handling;
        Ok(())
    }

    /// Configured handling mode of `port`
    pub fn handling(&self, port: usize) -> PowerResult<UartHandling> {
        if port >= self.hw.port_count() || port >= MAX_UART_PORTS {
            return Err(PowerError::InvalidPort);
        }
        Ok(self.table.lock().handling[port])
    }

    /// Resolve Auto against the sleep parameters.
    ///
    /// Precedence: the cache-safe-assertion override beats every other
    /// rule; then deep sleep forces a flush; then a port whose power domain
    /// survives is merely suspended; finally, with the TOP domain going
    /// down, the console flushes (debug visibility) and everything else
    /// discards.
    fn resolve(&self, configured: UartHandling, port: usize, cfg: &SleepConfiguration) -> Resolved {
        match configured {
            UartHandling::Flush => Resolved::Flush,
            UartHandling::Suspend => Resolved::Suspend,
            UartHandling::Discard => Resolved::Discard,
            UartHandling::Auto => {
                if self.cache_safe_assert {
                    Resolved::Flush
                } else if cfg.deep {
                    Resolved::Flush
                } else if !cfg.domains_down.contains(PowerDomains::TOP) {
                    Resolved::Suspend
                } else if self.console == Some(port) {
                    Resolved::Flush
                } else {
                    Resolved::Discard
                }
            }
        }
    }

    /// Quiesce every enabled port ahead of the sleep transition.
    ///
    /// The table lock is released before any port is touched; a flush can
    /// busy-wait for a full FIFO drain and must not run inside the critical
    /// section.
    pub fn prepare(&self, cfg: &SleepConfiguration) {
        let ports = self.hw.port_count().min(MAX_UART_PORTS);
        let mut actions: [Option<Resolved>; MAX_UART_PORTS] = [None; MAX_UART_PORTS];
        {
            let table = self.table.lock();
            for (port, action) in actions.iter_mut().enumerate().take(ports) {
                if self.hw.is_enabled(port) {
                    *action = Some(self.resolve(table.handling[port], port, cfg));
                }
            }
        }

        let mut suspended = 0u8;
        for (port, action) in actions.iter().enumerate().take(ports) {
            match action {
                Some(Resolved::Flush) => self.hw.flush(port),
                Some(Resolved::Suspend) => {
                    self.hw.suspend_tx(port);
                    suspended |= 1 << port;
                }
                Some(Resolved::Discard) => {
                    // Dropping a partial frame mid-FIFO would corrupt the
                    // stream on resume; reset instead of leaving it.
                    self.hw.reset_fifo(port);
                }
                None => {}
            }
        }
        self.table.lock().suspended = suspended;
    }

    /// Re-enable transmission on exactly the ports `prepare` suspended
    pub fn resume(&self) {
        let suspended = {
            let mut table = self.table.lock();
            core::mem::replace(&mut table.suspended, 0)
        };
        let ports = self.hw.port_count().min(MAX_UART_PORTS);
        for port in 0..ports {
            if suspended & (1 << port) != 0 {
                self.hw.resume_tx(port);
            }
        }
    }

    /// Hardware backend, for queries the policy does not wrap
    pub fn backend(&self) -> &U {
        &self.hw
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::SleepRequest;
    use crate::submode::SubModeSnapshot;
    use ember_hal::power::WakeTriggers;

    /// Recording UART backend with three enabled ports
    #[derive(Debug)]
    pub(crate) struct RecordingUart {
        pub flushes: Mutex<[u32; MAX_UART_PORTS]>,
        pub suspends: Mutex<[u32; MAX_UART_PORTS]>,
        pub resumes: Mutex<[u32; MAX_UART_PORTS]>,
        pub fifo_resets: Mutex<[u32; MAX_UART_PORTS]>,
        pub enabled: [bool; MAX_UART_PORTS],
    }

    impl Default for RecordingUart {
        fn default() -> Self {
            Self {
                flushes: Mutex::new([0; MAX_UART_PORTS]),
                suspends: Mutex::new([0; MAX_UART_PORTS]),
                resumes: Mutex::new([0; MAX_UART_PORTS]),
                fifo_resets: Mutex::new([0; MAX_UART_PORTS]),
                enabled: [true, true, true, false],
            }
        }
    }

    impl UartBackend for RecordingUart {
        fn port_count(&self) -> usize {
            3
        }

        fn is_enabled(&self, port: usize) -> bool {
            self.enabled[port]
        }

        fn flush(&self, port: usize) {
            self.flushes.lock()[port] += 1;
        }

        fn suspend_tx(&self, port: usize) {
            self.suspends.lock()[port] += 1;
        }

        fn resume_tx(&self, port: usize) {
            self.resumes.lock()[port] += 1;
        }

        fn reset_fifo(&self, port: usize) {
            self.fifo_resets.lock()[port] += 1;
        }
    }

    fn light_sleep_cfg(domains_down: PowerDomains) -> SleepConfiguration {
        SleepConfiguration::assemble(
            &SleepRequest {
                domains_down,
                wake: WakeTriggers::TIMER,
                reject: WakeTriggers::empty(),
                deep: false,
            },
            SubModeSnapshot::default(),
        )
    }

    fn deep_sleep_cfg() -> SleepConfiguration {
        SleepConfiguration::assemble(
            &SleepRequest {
                domains_down: PowerDomains::all(),
                wake: WakeTriggers::TIMER,
                reject: WakeTriggers::empty(),
                deep: true,
            },
            SubModeSnapshot::default(),
        )
    }

    #[test]
    fn test_light_sleep_with_top_up_suspends_auto_ports() {
        let policy = UartDrainPolicy::new(RecordingUart::default(), Some(0), false);
        policy.prepare(&light_sleep_cfg(PowerDomains::MODEM));

        for port in 0..3 {
            assert_eq!(policy.backend().suspends.lock()[port], 1);
            assert_eq!(policy.backend().flushes.lock()[port], 0);
        }
    }

    #[test]
    fn test_top_down_flushes_console_discards_rest() {
        let policy = UartDrainPolicy::new(RecordingUart::default(), Some(0), false);
        policy.prepare(&light_sleep_cfg(PowerDomains::TOP));

        let hw = policy.backend();
        assert_eq!(hw.flushes.lock()[0], 1);
        assert_eq!(hw.fifo_resets.lock()[0], 0);
        for port in 1..3 {
            assert_eq!(hw.flushes.lock()[port], 0);
            assert_eq!(hw.fifo_resets.lock()[port], 1);
            assert_eq!(hw.suspends.lock()[port], 0);
        }
    }

    #[test]
    fn test_deep_sleep_flushes_everything() {
        let policy = UartDrainPolicy::new(RecordingUart::default(), Some(0), false);
        policy.prepare(&deep_sleep_cfg());

        for port in 0..3 {
            assert_eq!(policy.backend().flushes.lock()[port], 1);
            assert_eq!(policy.backend().suspends.lock()[port], 0);
        }
    }

    #[test]
    fn test_cache_safe_assert_overrides_discard() {
        // With the assertion override configured, even a TOP-down light
        // sleep flushes Auto ports that would otherwise discard.
        let policy = UartDrainPolicy::new(RecordingUart::default(), Some(0), true);
        policy.prepare(&light_sleep_cfg(PowerDomains::TOP));

        for port in 0..3 {
            assert_eq!(policy.backend().flushes.lock()[port], 1);
            assert_eq!(policy.backend().fifo_resets.lock()[port], 0);
        }
    }

    #[test]
    fn test_resume_touches_exactly_the_suspended_set() {
        let policy = UartDrainPolicy::new(RecordingUart::default(), Some(0), false);
        policy.set_handling(1, UartHandling::Flush).unwrap();
        policy.prepare(&light_sleep_cfg(PowerDomains::MODEM));

        // Ports 0 and 2 suspended (Auto), port 1 flushed explicitly.
        policy.resume();
        let hw = policy.backend();
        assert_eq!(hw.resumes.lock()[0], 1);
        assert_eq!(hw.resumes.lock()[1], 0);
        assert_eq!(hw.resumes.lock()[2], 1);

        // A second resume is a no-op: the bitmap was consumed.
        policy.resume();
        assert_eq!(hw.resumes.lock()[0], 1);
        assert_eq!(hw.resumes.lock()[2], 1);
    }

    #[test]
    fn test_explicit_modes_are_honored_as_configured() {
        let policy = UartDrainPolicy::new(RecordingUart::default(), None, false);
        policy.set_handling(0, UartHandling::Discard).unwrap();
        policy.set_handling(1, UartHandling::Suspend).unwrap();
        policy.set_handling(2, UartHandling::Flush).unwrap();
        policy.prepare(&deep_sleep_cfg());

        let hw = policy.backend();
        assert_eq!(hw.fifo_resets.lock()[0], 1);
        assert_eq!(hw.suspends.lock()[1], 1);
        assert_eq!(hw.flushes.lock()[2], 1);
    }

    #[test]
    fn test_invalid_port_and_mode_are_rejected() {
        let policy = UartDrainPolicy::new(RecordingUart::default(), None, false);
        assert_eq!(
            policy.set_handling(3, UartHandling::Flush),
            Err(PowerError::InvalidPort)
        );
        assert_eq!(policy.handling(7), Err(PowerError::InvalidPort));
        assert_eq!(UartHandling::from_raw(4), Err(PowerError::InvalidArgument));
        assert_eq!(UartHandling::from_raw(2), Ok(UartHandling::Suspend));
    }

    #[test]
    fn test_disabled_ports_are_skipped() {
        let mut hw = RecordingUart::default();
        hw.enabled[1] = false;
        let policy = UartDrainPolicy::new(hw, Some(0), false);
        policy.prepare(&deep_sleep_cfg());

        assert_eq!(policy.backend().flushes.lock()[1], 0);
        assert_eq!(policy.backend().flushes.lock()[0], 1);
        assert_eq!(policy.backend().flushes.lock()[2], 1);
    }
}
