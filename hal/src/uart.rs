//! # UART Low-Level Interface
//!
//! Transmit-side control used by the sleep path to quiesce serial ports.
//! Only the operations the drain policy needs are abstracted here; full
//! serial drivers live above the HAL.

/// Maximum UART ports any supported chip exposes
pub const MAX_UART_PORTS: usize = 4;

/// UART register-layer backend
pub trait UartBackend: Send + Sync {
    /// Number of ports on this chip (at most [`MAX_UART_PORTS`])
    fn port_count(&self) -> usize;

    /// Whether `port` is initialized and carrying traffic
    fn is_enabled(&self, port: usize) -> bool;

    /// Block until `port`'s transmit path is fully drained
    fn flush(&self, port: usize);

    /// Stop `port`'s transmitter without waiting for a drain
    fn suspend_tx(&self, port: usize);

    /// Re-enable `port`'s transmitter after a suspend
    fn resume_tx(&self, port: usize);

    /// Reset `port`'s FIFOs, discarding pending data
    fn reset_fifo(&self, port: usize);
}

/// No-op UART backend with no ports
#[derive(Debug, Default)]
pub struct NullUart;

impl UartBackend for NullUart {
    fn port_count(&self) -> usize {
        0
    }

    fn is_enabled(&self, _port: usize) -> bool {
        false
    }

    fn flush(&self, _port: usize) {}

    fn suspend_tx(&self, _port: usize) {}

    fn resume_tx(&self, _port: usize) {}

    fn reset_fifo(&self, _port: usize) {}
}
