//! Non-blocking driver stack for Solomon Systech SSD1306 OLED displays on I2C, plus a polled
//! driver for the HMC5883L magnetometer sharing the same bus.
//!
//! Everything is driven from a cooperative scheduler: each driver has a `run` method to be called
//! once per tick, requests return `nb::Error::WouldBlock` instead of waiting, and outcomes are
//! collected with `poll`. No call blocks and nothing is allocated.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod command;
pub mod config;
pub mod error;
pub mod interface;
#[macro_use]
pub mod display;
pub mod framebuffer;
pub mod graphics;
pub mod hmc5883l;

pub use nb;

// Re-exports for primary API.
pub use crate::command::{consts, AddressingMode, Command, ComScanDirection, SegmentRemap};
pub use crate::config::Config;
pub use crate::display::Ssd1306;
pub use crate::error::{Error, FramebufferError};
pub use crate::framebuffer::Framebuffer;
pub use crate::graphics::Graphics;
pub use crate::hmc5883l::Hmc5883l;
pub use crate::interface::blocking::BlockingI2c;
pub use crate::interface::I2cTransport;
