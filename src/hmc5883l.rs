//! A polled driver for the HMC5883L 3-axis magnetometer, sharing the bus with the display.
//!
//! A measurement is taken in single-measurement mode: the configuration registers are written
//! (only those changed since they were last written), the mode register is set to start a
//! conversion, then the six data output registers are read back. Each step is one bus
//! transaction, advanced by `run` once per tick like the display driver.

use crate::error::Error;
use crate::interface::I2cTransport;

/// 7-bit I2C address of the sensor.
pub const I2C_ADDRESS: u8 = 0x1E;

const CONFIG_A_REGISTER: u8 = 0x00;
const CONFIG_B_REGISTER: u8 = 0x01;
const MODE_REGISTER: u8 = 0x02;
/// First of the data output registers: X, Z and Y, most significant byte first.
const DATA_REGISTER: u8 = 0x03;
const DATA_LEN: usize = 6;

const SINGLE_MEASUREMENT_MODE: u8 = 0x01;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Step {
    WriteConfigA,
    WriteConfigB,
    WriteMode,
    ReadData,
    Done,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    Idle,
    Measuring(Step),
    /// A bus transaction failed. Nothing is sent until `reset`.
    Error,
}

/// Field strength in raw sensor counts. The scale depends on the gain set in configuration
/// register B.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Measurement {
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

/// A configuration register value and whether the sensor has it yet.
#[derive(Clone, Copy, Debug, Default)]
struct Register {
    value: Option<u8>,
    written: bool,
}

impl Register {
    fn set(&mut self, value: u8) {
        if self.value != Some(value) {
            self.value = Some(value);
            self.written = false;
        }
    }
}

pub struct Hmc5883l<T>
where
    T: I2cTransport,
{
    transport: T,
    task_id: u8,
    state: State,
    config_a: Register,
    config_b: Register,
    operation_ongoing: bool,
    fault: Option<Error<T::Error>>,
    data: [u8; DATA_LEN],
}

impl<T> Hmc5883l<T>
where
    T: I2cTransport,
{
    pub fn new(transport: T, task_id: u8) -> Self {
        Hmc5883l {
            transport,
            task_id,
            state: State::Idle,
            config_a: Register::default(),
            config_b: Register::default(),
            operation_ongoing: false,
            fault: None,
            data: [0; DATA_LEN],
        }
    }

    pub fn task_id(&self) -> u8 {
        self.task_id
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Give back the transport.
    pub fn release(self) -> T {
        self.transport
    }

    /// Set configuration register A (averaging and data output rate). The value is written
    /// before the next measurement if it differs from the one the sensor has.
    pub fn set_config_a(&mut self, value: u8) {
        self.config_a.set(value);
    }

    /// Set configuration register B (gain).
    pub fn set_config_b(&mut self, value: u8) {
        self.config_b.set(value);
    }

    /// Start a single measurement. Both configuration registers have to be set first.
    pub fn start_single_measurement(&mut self) -> nb::Result<(), Error<T::Error>> {
        if self.state != State::Idle || self.operation_ongoing {
            return Err(nb::Error::WouldBlock);
        }
        if self.config_a.value.is_none() || self.config_b.value.is_none() {
            return Err(nb::Error::Other(Error::NotConfigured));
        }
        let first = match (self.config_a.written, self.config_b.written) {
            (false, _) => Step::WriteConfigA,
            (true, false) => Step::WriteConfigB,
            (true, true) => Step::WriteMode,
        };
        self.state = State::Measuring(first);
        Ok(())
    }

    /// Advance the measurement by at most one bus transaction.
    pub fn run(&mut self) {
        if self.operation_ongoing {
            match self.transport.poll() {
                Err(nb::Error::WouldBlock) => return,
                Err(nb::Error::Other(e)) => {
                    self.operation_ongoing = false;
                    if self.state != State::Idle {
                        self.fail(e);
                    }
                    return;
                }
                Ok(()) => {
                    self.operation_ongoing = false;
                    if let State::Measuring(step) = self.state {
                        self.completed(step);
                    }
                }
            }
        }

        let step = match self.state {
            State::Measuring(step) => step,
            State::Idle | State::Error => return,
        };
        let result = match step {
            Step::WriteConfigA => match self.config_a.value {
                Some(value) => {
                    self.transport
                        .transmit_with_register(I2C_ADDRESS, CONFIG_A_REGISTER, &[value])
                }
                None => return self.fail_not_configured(),
            },
            Step::WriteConfigB => match self.config_b.value {
                Some(value) => {
                    self.transport
                        .transmit_with_register(I2C_ADDRESS, CONFIG_B_REGISTER, &[value])
                }
                None => return self.fail_not_configured(),
            },
            Step::WriteMode => self.transport.transmit_with_register(
                I2C_ADDRESS,
                MODE_REGISTER,
                &[SINGLE_MEASUREMENT_MODE],
            ),
            Step::ReadData => {
                self.transport
                    .read_with_register(I2C_ADDRESS, DATA_REGISTER, DATA_LEN)
            }
            Step::Done => {
                self.state = State::Idle;
                return;
            }
        };
        match result {
            Ok(()) => self.operation_ongoing = true,
            Err(nb::Error::WouldBlock) => (),
            Err(nb::Error::Other(e)) => self.fail(e),
        }
    }

    /// Outcome of the last measurement: `WouldBlock` while it is running, `Ok` once the data is
    /// available from `measurement`.
    pub fn poll(&self) -> nb::Result<(), Error<T::Error>> {
        match (self.state, self.fault) {
            (State::Idle, _) => Ok(()),
            (State::Error, Some(e)) => Err(nb::Error::Other(e)),
            _ => Err(nb::Error::WouldBlock),
        }
    }

    /// The data of the last completed measurement.
    pub fn measurement(&self) -> Measurement {
        let axis = |i: usize| i16::from_be_bytes([self.data[i], self.data[i + 1]]);
        Measurement {
            x: axis(0),
            z: axis(2),
            y: axis(4),
        }
    }

    /// Leave the error state. The configuration registers are written again before the next
    /// measurement.
    pub fn reset(&mut self) {
        #[cfg(feature = "defmt")]
        defmt::info!("hmc5883l: reset from {}", self.state);
        self.state = State::Idle;
        self.fault = None;
        self.config_a.written = false;
        self.config_b.written = false;
    }

    /// Book a finished transaction and pick the step after it.
    fn completed(&mut self, step: Step) {
        let next = match step {
            Step::WriteConfigA => {
                self.config_a.written = true;
                match self.config_b.written {
                    true => Step::WriteMode,
                    false => Step::WriteConfigB,
                }
            }
            Step::WriteConfigB => {
                self.config_b.written = true;
                Step::WriteMode
            }
            Step::WriteMode => Step::ReadData,
            Step::ReadData => {
                let mut data = [0u8; DATA_LEN];
                if self.transport.read_received(&mut data) == DATA_LEN {
                    self.data = data;
                }
                Step::Done
            }
            Step::Done => Step::Done,
        };
        self.state = State::Measuring(next);
    }

    fn fail(&mut self, e: T::Error) {
        #[cfg(feature = "defmt")]
        defmt::warn!("hmc5883l: bus error in {}", self.state);
        self.state = State::Error;
        self.fault = Some(Error::Bus(e));
    }

    fn fail_not_configured(&mut self) {
        self.state = State::Error;
        self.fault = Some(Error::NotConfigured);
    }
}
