//! # Ember Hardware Abstraction Layer
//!
//! The HAL is the seam between the platform's power/clock management and the
//! chip-specific register layer. It defines the primitives the subsystems
//! above it consume:
//!
//! - **Power**: power-domain and wake/reject trigger masks, the PMU backend
//!   (wait-cycle programming, sleep commit, reject reporting)
//! - **Clock**: gateable clock consumers and the clock-gate backend
//! - **UART**: low-level transmit control used when quiescing serial ports
//!
//! ## Backends
//!
//! Each hardware trait ships with a no-op `Null*` implementation. A chip
//! crate overrides the defaults by implementing the traits against its
//! register layer; the no-op backends keep the subsystems runnable (and
//! testable) without any hardware attached.
//!
//! ## Guarantees
//!
//! Register-level primitives are assumed atomic at the register access
//! level. Nothing in this crate blocks except [`power::PmuBackend::commit_sleep`],
//! which by contract stalls the issuing core until the hardware reports a
//! wake or reject event.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

pub mod clock;
pub mod power;
pub mod uart;

/// Result type for HAL operations
pub type HalResult<T> = Result<T, HalError>;

/// Errors reported by hardware backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalError {
    /// The backend does not implement the requested operation
    Unsupported,
    /// The hardware unit is busy and cannot accept the request
    Busy,
    /// The hardware reported a fault while applying the request
    Fault,
}
