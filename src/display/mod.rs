//! The SSD1306 driver. It turns requests into the command sequences the chip needs and feeds them
//! to the bus one transaction per tick, so it never blocks the caller.
//!
//! Requests (`init_display`, `send_graphics_data` and the single-command setters) are accepted
//! only while the driver is idle; otherwise they return `nb::Error::WouldBlock` and change
//! nothing. An accepted request is carried out by subsequent calls to `run`, and its outcome is
//! collected with `poll`.

// This has to be here in order to be usable by mods declared afterwards.
#[cfg(test)]
#[macro_use]
pub mod testing {
    macro_rules! cmd {
        ($($b:expr),+) => {
            $crate::interface::test_spy::Sent::Write(
                $crate::command::consts::I2C_ADDRESS,
                vec![$crate::command::consts::COMMAND_CONTROL, $($b),+],
            )
        };
    }
    macro_rules! data {
        ($d:expr) => {
            $crate::interface::test_spy::Sent::WriteRegister(
                $crate::command::consts::I2C_ADDRESS,
                $crate::command::consts::DATA_CONTROL,
                $d.to_vec(),
            )
        };
    }
    macro_rules! sends {
        ($($e:expr),* $(,)?) => {&[$($e,)*]};
    }
}

mod sequence;

use heapless::Vec;

pub use self::sequence::{DataStep, InitStep};
use self::sequence::Window;
use crate::command::consts::*;
use crate::command::*;
use crate::config::Config;
use crate::error::Error;
use crate::interface::I2cTransport;

/// What the driver is busy with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    Idle,
    /// Sending a command requested through `send_command` or one of the setters.
    SingleCommand,
    InitDisplay(InitStep),
    SendGraphicsData(DataStep),
    /// An operation failed. Nothing is sent and requests are refused until `reset`.
    Error,
}

/// A driver for an SSD1306 display behind an `I2cTransport`.
pub struct Ssd1306<T>
where
    T: I2cTransport,
{
    transport: T,
    task_id: u8,
    config: Config,
    state: State,
    /// Payload of the pending single command.
    command: Option<CommandBytes>,
    /// A bus transaction was accepted and its outcome not collected yet.
    operation_ongoing: bool,
    fault: Option<Error<T::Error>>,
    startup_ticks: u16,
    window: Window,
    graphics: Vec<u8, BUFFER_SIZE>,
}

impl<T> Ssd1306<T>
where
    T: I2cTransport,
{
    /// Construct an idle driver talking through `transport`. `task_id` identifies the scheduler
    /// task that calls `run`; the driver only stores it.
    ///
    /// The RAM window defaults to the whole panel in page addressing mode, which is what the chip
    /// itself comes out of reset with.
    pub fn new(transport: T, task_id: u8) -> Self {
        Ssd1306 {
            transport,
            task_id,
            config: Config::default(),
            state: State::Idle,
            command: None,
            operation_ongoing: false,
            fault: None,
            startup_ticks: 0,
            window: Window {
                mode: AddressingMode::Page,
                columns: (0, COL_MAX),
                pages: (0, PAGE_MAX),
            },
            graphics: Vec::new(),
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

    /// Advance the current operation by at most one bus transaction. Call once per scheduler
    /// tick.
    pub fn run(&mut self) {
        if self.operation_ongoing {
            match self.transport.poll() {
                Err(nb::Error::WouldBlock) => return,
                Err(nb::Error::Other(e)) => {
                    self.operation_ongoing = false;
                    // After a reset the outcome of the abandoned transaction is dropped.
                    if self.state != State::Idle {
                        self.fail(Error::Bus(e));
                    }
                    return;
                }
                Ok(()) => {
                    self.operation_ongoing = false;
                    match self.state {
                        State::SingleCommand
                        | State::InitDisplay(InitStep::Done)
                        | State::SendGraphicsData(DataStep::Done) => {
                            self.finish();
                            return;
                        }
                        _ => (),
                    }
                }
            }
        }

        match self.state {
            State::Idle | State::Error => (),
            State::SingleCommand => {
                if let Some(bytes) = self.command {
                    let result = self.transport.transmit(I2C_ADDRESS, bytes.as_bytes());
                    self.accepted(result);
                }
            }
            State::InitDisplay(mut step) => {
                if step == InitStep::StartupDelay {
                    if self.startup_ticks > 0 {
                        self.startup_ticks -= 1;
                        return;
                    }
                    step = step.next();
                    self.state = State::InitDisplay(step);
                }
                match step.command(&self.config, self.window.mode) {
                    Some(command) => self.issue(command, State::InitDisplay(step.next())),
                    None => self.finish(),
                }
            }
            State::SendGraphicsData(step) => match step.command(&self.window) {
                Some(command) => self.issue(command, State::SendGraphicsData(step.next())),
                None if step == DataStep::Data => {
                    let result =
                        self.transport
                            .transmit_with_register(I2C_ADDRESS, DATA_CONTROL, &self.graphics);
                    if self.accepted(result) {
                        self.state = State::SendGraphicsData(DataStep::Done);
                    }
                }
                None => self.finish(),
            },
        }
    }

    /// Outcome of the last accepted request: `WouldBlock` while it is being carried out, `Ok`
    /// once the driver is idle again, the error while the driver is in its error state.
    pub fn poll(&self) -> nb::Result<(), Error<T::Error>> {
        match (self.state, self.fault) {
            (State::Idle, _) => Ok(()),
            (State::Error, Some(e)) => Err(nb::Error::Other(e)),
            _ => Err(nb::Error::WouldBlock),
        }
    }

    /// Leave the error state, or abandon the current operation. The driver comes back idle with
    /// its addressing state untouched; a transaction still running on the bus is waited out
    /// before the next request is accepted.
    pub fn reset(&mut self) {
        #[cfg(feature = "defmt")]
        defmt::info!("ssd1306: reset from {}", self.state);
        self.state = State::Idle;
        self.fault = None;
        self.command = None;
        self.graphics.clear();
    }

    /// Run the init-display sequence with the values in `config`: after the configured startup
    /// delay, program the panel layout and the addressing mode set with
    /// `set_memory_addressing_mode`, then turn the display on.
    ///
    /// An out-of-range value in `config` fails the operation with `Error::InvalidArgument` when
    /// its step comes up.
    pub fn init_display(&mut self, config: Config) -> nb::Result<(), Error<T::Error>> {
        if !self.is_idle() {
            return Err(nb::Error::WouldBlock);
        }
        self.config = config;
        self.startup_ticks = config.startup_delay_ticks;
        self.state = State::InitDisplay(InitStep::StartupDelay);
        Ok(())
    }

    /// Write `data` to display RAM, starting at the window set with `set_column_address` and
    /// `set_page_address`. The data is copied, so the caller's buffer is free again on return.
    ///
    /// `data` must hold between 1 and `BUFFER_SIZE` bytes.
    pub fn send_graphics_data(&mut self, data: &[u8]) -> nb::Result<(), Error<T::Error>> {
        if !self.is_idle() {
            return Err(nb::Error::WouldBlock);
        }
        if data.is_empty() {
            return Err(nb::Error::Other(Error::InvalidArgument));
        }
        self.graphics.clear();
        self.graphics
            .extend_from_slice(data)
            .map_err(|_| nb::Error::Other(Error::InvalidArgument))?;
        self.state = State::SendGraphicsData(DataStep::Column);
        Ok(())
    }

    /// Send a single command. Out-of-range arguments are refused with `Error::InvalidArgument`
    /// and nothing is sent.
    pub fn send_command(&mut self, command: Command) -> nb::Result<(), Error<T::Error>> {
        if !self.is_idle() {
            return Err(nb::Error::WouldBlock);
        }
        let bytes = command
            .encode()
            .ok_or(nb::Error::Other(Error::InvalidArgument))?;
        self.command = Some(bytes);
        self.state = State::SingleCommand;
        Ok(())
    }

    /// Control the master contrast.
    pub fn set_contrast(&mut self, level: u8) -> nb::Result<(), Error<T::Error>> {
        self.send_command(Command::SetContrast(level))
    }

    /// Light every pixel (`true`) or show the RAM contents (`false`).
    pub fn set_entire_display_on(&mut self, on: bool) -> nb::Result<(), Error<T::Error>> {
        self.send_command(Command::SetEntireDisplayOn(on))
    }

    pub fn set_inverted(&mut self, inverted: bool) -> nb::Result<(), Error<T::Error>> {
        self.send_command(Command::SetInverted(inverted))
    }

    /// Turn the panel on, or put it to sleep.
    pub fn set_display_on(&mut self, on: bool) -> nb::Result<(), Error<T::Error>> {
        self.send_command(Command::SetDisplayOn(on))
    }

    pub fn set_display_start_line(&mut self, line: u8) -> nb::Result<(), Error<T::Error>> {
        self.send_command(Command::SetDisplayStartLine(line))
    }

    pub fn set_segment_remap(&mut self, remap: SegmentRemap) -> nb::Result<(), Error<T::Error>> {
        self.send_command(Command::SetSegmentRemap(remap))
    }

    pub fn set_multiplex_ratio(&mut self, ratio: u8) -> nb::Result<(), Error<T::Error>> {
        self.send_command(Command::SetMultiplexRatio(ratio))
    }

    pub fn set_com_scan_direction(
        &mut self,
        direction: ComScanDirection,
    ) -> nb::Result<(), Error<T::Error>> {
        self.send_command(Command::SetComScanDirection(direction))
    }

    pub fn set_display_offset(&mut self, offset: u8) -> nb::Result<(), Error<T::Error>> {
        self.send_command(Command::SetDisplayOffset(offset))
    }

    pub fn set_com_pins_config(
        &mut self,
        alternative: bool,
        left_right_remap: bool,
    ) -> nb::Result<(), Error<T::Error>> {
        self.send_command(Command::SetComPinsConfig(alternative, left_right_remap))
    }

    pub fn set_display_clock(
        &mut self,
        divide_ratio: u8,
        oscillator_frequency: u8,
    ) -> nb::Result<(), Error<T::Error>> {
        self.send_command(Command::SetDisplayClock(divide_ratio, oscillator_frequency))
    }

    pub fn set_charge_pump(&mut self, enabled: bool) -> nb::Result<(), Error<T::Error>> {
        self.send_command(Command::SetChargePump(enabled))
    }

    /// Select the addressing mode used by the next init-display and send-graphics-data
    /// operations. Nothing is sent by this call.
    pub fn set_memory_addressing_mode(&mut self, mode: AddressingMode) {
        self.window.mode = mode;
    }

    pub fn memory_addressing_mode(&self) -> AddressingMode {
        self.window.mode
    }

    /// Set the column range of the next send-graphics-data operation. In page addressing mode
    /// only `start` is used. Nothing is sent by this call.
    pub fn set_column_address(&mut self, start: u8, end: u8) -> Result<(), Error<T::Error>> {
        if start > COL_MAX || end > COL_MAX {
            return Err(Error::InvalidArgument);
        }
        self.window.columns = (start, end);
        Ok(())
    }

    /// Set the page range of the next send-graphics-data operation. In page addressing mode only
    /// `start` is used. Nothing is sent by this call.
    pub fn set_page_address(&mut self, start: u8, end: u8) -> Result<(), Error<T::Error>> {
        if start > PAGE_MAX || end > PAGE_MAX {
            return Err(Error::InvalidArgument);
        }
        self.window.pages = (start, end);
        Ok(())
    }

    fn is_idle(&self) -> bool {
        self.state == State::Idle && !self.operation_ongoing
    }

    /// Encode `command` and hand it to the bus, moving on to `next` once the bus took it.
    fn issue(&mut self, command: Command, next: State) {
        match command.encode() {
            Some(bytes) => {
                let result = self.transport.transmit(I2C_ADDRESS, bytes.as_bytes());
                if self.accepted(result) {
                    self.state = next;
                }
            }
            None => self.fail(Error::InvalidArgument),
        }
    }

    /// Book the answer to a bus request. A busy bus is retried on the next tick.
    fn accepted(&mut self, result: nb::Result<(), T::Error>) -> bool {
        match result {
            Ok(()) => {
                self.operation_ongoing = true;
                true
            }
            Err(nb::Error::WouldBlock) => false,
            Err(nb::Error::Other(e)) => {
                self.fail(Error::Bus(e));
                false
            }
        }
    }

    fn finish(&mut self) {
        #[cfg(feature = "defmt")]
        {
            if let State::InitDisplay(_) = self.state {
                defmt::info!("ssd1306: display initialised");
            }
        }
        self.state = State::Idle;
        self.command = None;
        self.graphics.clear();
    }

    fn fail(&mut self, error: Error<T::Error>) {
        #[cfg(feature = "defmt")]
        defmt::warn!("ssd1306: {} failed: {}", self.state, error);
        self.state = State::Error;
        self.fault = Some(error);
        self.operation_ongoing = false;
    }
}
