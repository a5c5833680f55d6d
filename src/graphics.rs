//! Keeps the display in step with a framebuffer.
//!
//! `Graphics` owns the display driver and the framebuffer. It initialises the display, clears
//! it with the initial (blank) frame, and from then on sends the dirty part of the framebuffer
//! each time `show` is called. All of this happens from `run`, which also ticks the display
//! driver, so the application only has to call `Graphics::run` once per scheduler tick.

use crate::command::consts::*;
use crate::command::AddressingMode;
use crate::config::Config;
use crate::display::Ssd1306;
use crate::error::Error;
use crate::framebuffer::Framebuffer;
use crate::interface::I2cTransport;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GraphicsState {
    /// Start the init-display sequence.
    Init,
    /// Send the blank initial frame over the whole panel.
    ClearDisplay,
    WaitForShow,
    /// A frame went out; release the framebuffer.
    DataSent,
    /// A display operation failed. Recover with `reset`.
    Error,
}

pub struct Graphics<T>
where
    T: I2cTransport,
{
    display: Ssd1306<T>,
    framebuffer: Framebuffer,
    config: Config,
    state: GraphicsState,
    show_requested: bool,
    operation_ongoing: bool,
    fault: Option<Error<T::Error>>,
}

impl<T> Graphics<T>
where
    T: I2cTransport,
{
    /// Construct the orchestrator for a display behind `transport`, to be initialised with
    /// `config`.
    pub fn new(transport: T, task_id: u8, config: Config) -> Self {
        Graphics {
            display: Ssd1306::new(transport, task_id),
            framebuffer: Framebuffer::new(),
            config,
            state: GraphicsState::Init,
            show_requested: false,
            operation_ongoing: false,
            fault: None,
        }
    }

    pub fn task_id(&self) -> u8 {
        self.display.task_id()
    }

    pub fn state(&self) -> GraphicsState {
        self.state
    }

    /// The display error that stopped the orchestrator, while in `GraphicsState::Error`.
    pub fn fault(&self) -> Option<Error<T::Error>> {
        self.fault
    }

    pub fn display(&self) -> &Ssd1306<T> {
        &self.display
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }

    /// The framebuffer, for drawing. `None` while a `show` is in progress.
    pub fn framebuffer_mut(&mut self) -> Option<&mut Framebuffer> {
        match self.framebuffer.is_locked() {
            true => None,
            false => Some(&mut self.framebuffer),
        }
    }

    /// Request the current framebuffer contents to be sent to the display. The framebuffer is
    /// locked right away and unlocked once the transfer has finished.
    pub fn show(&mut self) {
        self.framebuffer.lock();
        self.show_requested = true;
    }

    /// Whether a `show` has been requested and not finished yet.
    pub fn show_pending(&self) -> bool {
        self.show_requested
    }

    pub fn run(&mut self) {
        self.display.run();

        if self.operation_ongoing {
            match self.display.poll() {
                Err(nb::Error::WouldBlock) => return,
                Err(nb::Error::Other(e)) => {
                    self.fail(e);
                    return;
                }
                Ok(()) => self.operation_ongoing = false,
            }
        }

        match self.state {
            GraphicsState::Init => {
                self.display
                    .set_memory_addressing_mode(AddressingMode::Horizontal);
                let result = self.display.init_display(self.config);
                if self.accepted(result) {
                    self.state = GraphicsState::ClearDisplay;
                }
            }
            GraphicsState::ClearDisplay => {
                let result = self.send_dirty_area();
                if self.accepted(result) {
                    self.state = GraphicsState::WaitForShow;
                }
            }
            GraphicsState::WaitForShow => {
                if self.show_requested {
                    let result = self.send_dirty_area();
                    if self.accepted(result) {
                        self.state = GraphicsState::DataSent;
                    }
                }
            }
            GraphicsState::DataSent => {
                #[cfg(feature = "defmt")]
                defmt::debug!("graphics: frame sent");
                self.framebuffer.unlock();
                self.show_requested = false;
                self.state = GraphicsState::WaitForShow;
            }
            GraphicsState::Error => (),
        }
    }

    /// Start over from display initialisation. The whole frame is sent again once the display is
    /// back up.
    pub fn reset(&mut self) {
        #[cfg(feature = "defmt")]
        defmt::info!("graphics: reset from {}", self.state);
        self.display.reset();
        self.framebuffer.unlock();
        self.framebuffer.invalidate();
        self.show_requested = false;
        self.operation_ongoing = false;
        self.fault = None;
        self.state = GraphicsState::Init;
    }

    /// Send the dirty rows of the framebuffer, full width, in horizontal addressing mode.
    fn send_dirty_area(&mut self) -> nb::Result<(), Error<T::Error>> {
        let (page, data) = self.framebuffer.dirty_area_buffer();
        self.display.set_page_address(page, PAGE_MAX)?;
        self.display.set_column_address(0, COL_MAX)?;
        self.display.send_graphics_data(data)
    }

    /// Book the answer to a display request. A busy display is asked again on the next tick.
    fn accepted(&mut self, result: nb::Result<(), Error<T::Error>>) -> bool {
        match result {
            Ok(()) => {
                self.operation_ongoing = true;
                true
            }
            Err(nb::Error::WouldBlock) => false,
            Err(nb::Error::Other(e)) => {
                self.fail(e);
                false
            }
        }
    }

    fn fail(&mut self, error: Error<T::Error>) {
        #[cfg(feature = "defmt")]
        defmt::warn!("graphics: {} failed: {}", self.state, error);
        self.operation_ongoing = false;
        self.fault = Some(error);
        self.state = GraphicsState::Error;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::State;
    use crate::interface::test_spy::{Sent, SpyError, TestSpyTransport};

    fn graphics() -> (Graphics<TestSpyTransport>, TestSpyTransport) {
        let bus = TestSpyTransport::new();
        let gfx = Graphics::new(bus.split(), 1, Config::default().startup_delay_ticks(0));
        (gfx, bus)
    }

    /// Tick until everything requested so far went out and the display is idle.
    fn settle(gfx: &mut Graphics<TestSpyTransport>) {
        for _ in 0..1000 {
            gfx.run();
            if gfx.state() == GraphicsState::Error {
                return;
            }
            if gfx.state() == GraphicsState::WaitForShow
                && !gfx.show_pending()
                && gfx.display().state() == State::Idle
            {
                return;
            }
        }
        panic!("graphics did not settle, stuck in {:?}", gfx.state());
    }

    fn writes_to_ram(bus: &TestSpyTransport) -> std::vec::Vec<std::vec::Vec<u8>> {
        bus.sent()
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::WriteRegister(_, _, data) => Some(data),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn startup_initialises_and_clears() {
        let (mut gfx, bus) = graphics();
        assert_eq!(gfx.state(), GraphicsState::Init);
        settle(&mut gfx);
        let sent = bus.sent();
        // 13 init commands, two address commands and the frame.
        assert_eq!(sent.len(), 16);
        assert_eq!(sent[11], cmd!(0x20, 0x00)); // horizontal addressing
        assert_eq!(sent[12], cmd!(0xAF));
        assert_eq!(sent[13], cmd!(0x21, 0, 127));
        assert_eq!(sent[14], cmd!(0x22, 0, 7));
        assert_eq!(sent[15], data!([0u8; BUFFER_SIZE]));
        assert!(!gfx.framebuffer().is_dirty());
        assert!(!gfx.framebuffer().is_locked());
    }

    #[test]
    fn show_sends_dirty_rows() {
        let (mut gfx, bus) = graphics();
        settle(&mut gfx);
        bus.clear();

        gfx.framebuffer_mut().unwrap().set_pixel(5, 20);
        gfx.show();
        assert!(gfx.framebuffer().is_locked());
        assert!(gfx.framebuffer_mut().is_none());
        settle(&mut gfx);

        bus.check_multi(sends!(
            cmd!(0x21, 0, 127),
            cmd!(0x22, 2, 7),
            data!([0u8, 0, 0, 0, 0, 0x10]),
        ));
        assert!(!gfx.framebuffer().is_locked());
        assert!(!gfx.framebuffer().is_dirty());
        assert_eq!(gfx.state(), GraphicsState::WaitForShow);
    }

    #[test]
    fn nothing_sent_without_show() {
        let (mut gfx, bus) = graphics();
        settle(&mut gfx);
        bus.clear();
        gfx.framebuffer_mut().unwrap().set_pixel(100, 60);
        for _ in 0..20 {
            gfx.run();
        }
        bus.check_multi(&[]);
        assert!(gfx.framebuffer().is_dirty());
    }

    #[test]
    fn show_before_init_is_served_after_clear() {
        let (mut gfx, bus) = graphics();
        gfx.framebuffer_mut()
            .unwrap()
            .blit(0, 0, 2, 8, &[0xFF, 0x81]);
        gfx.show();
        settle(&mut gfx);
        let frames = writes_to_ram(&bus);
        // The full frame goes out during start-up, then the shown rows.
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].len(), BUFFER_SIZE);
        assert_eq!(&frames[0][..2], &[0xFF, 0x81]);
        assert!(!gfx.framebuffer().is_locked());
    }

    #[test]
    fn one_display_operation_at_a_time() {
        let (mut gfx, bus) = graphics();
        bus.set_latency(3);
        for _ in 0..2000 {
            gfx.run();
            // The spy refuses overlapping requests, so a second request while one is on the bus
            // would show up as a stall rather than an extra transaction.
            assert!(bus.sent().len() <= 16);
            if gfx.state() == GraphicsState::WaitForShow && gfx.display().state() == State::Idle {
                break;
            }
        }
        assert_eq!(bus.sent().len(), 16);
    }

    #[test]
    fn bus_error_stops_until_reset() {
        let (mut gfx, bus) = graphics();
        bus.fail_after(14, SpyError::Nack);
        settle(&mut gfx);
        assert_eq!(gfx.state(), GraphicsState::Error);
        assert_eq!(gfx.fault(), Some(Error::Bus(SpyError::Nack)));
        let sent = bus.sent().len();
        gfx.show();
        for _ in 0..20 {
            gfx.run();
        }
        assert_eq!(bus.sent().len(), sent);

        gfx.reset();
        assert_eq!(gfx.state(), GraphicsState::Init);
        assert!(!gfx.framebuffer().is_locked());
        assert!(gfx.framebuffer().is_dirty());
        bus.clear();
        settle(&mut gfx);
        assert_eq!(gfx.state(), GraphicsState::WaitForShow);
        let frames = writes_to_ram(&bus);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), BUFFER_SIZE);
    }

    #[test]
    fn task_id_is_kept() {
        let (gfx, _bus) = graphics();
        assert_eq!(gfx.task_id(), 1);
    }
}
