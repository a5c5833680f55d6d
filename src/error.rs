//! Error types shared by the drivers.

use core::fmt;

/// Errors reported by the display and sensor drivers. `E` is the error type of the underlying
/// `I2cTransport`.
///
/// A busy driver is not an error: requests made while another operation is in progress, and
/// polls made while an operation is still running, return `nb::Error::WouldBlock`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error<E> {
    /// A parameter was out of range for the command. Nothing was sent.
    InvalidArgument,
    /// A measurement was requested before the sensor configuration was set.
    NotConfigured,
    /// The bus transaction finished with an error. The driver stays in its error state until it
    /// is reset.
    Bus(E),
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::InvalidArgument => write!(f, "Argument out of range"),
            Error::NotConfigured => write!(f, "Configuration registers not set"),
            Error::Bus(e) => write!(f, "I2C error: {:?}", e),
        }
    }
}

#[cfg(feature = "defmt")]
impl<E> defmt::Format for Error<E> {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::InvalidArgument => defmt::write!(f, "Argument out of range"),
            Error::NotConfigured => defmt::write!(f, "Configuration registers not set"),
            Error::Bus(_e) => defmt::write!(f, "I2C error"),
        }
    }
}

/// Errors reported by the framebuffer drain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FramebufferError {
    /// The drain cursor ran past the end of the pixel store. The drain was abandoned.
    Overflow,
}

impl fmt::Display for FramebufferError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FramebufferError::Overflow => write!(f, "Drain cursor outside the framebuffer"),
        }
    }
}
