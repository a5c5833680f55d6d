//! The command set for the SSD1306.
//!
//! Every command travels over I2C as a single write: the command control byte followed by the
//! opcode and its arguments. Image data travels separately behind the data control byte (see
//! `consts::DATA_CONTROL`).
//!
//! Note 1: The display RAM of the SSD1306 is arranged in 8 pages of 128 columns. Each byte
//! written to the RAM (a "segment") covers one column and 8 vertically stacked rows of a page,
//! with the least significant bit at the top.

pub mod consts {
    //! Geometry of the 128x64 panel and framing constants for the I2C link.

    pub const NUM_PIXEL_COLS: usize = 128;
    pub const NUM_PIXEL_ROWS: usize = 64;
    pub const NUM_PAGES: usize = (NUM_PIXEL_ROWS + 7) / 8;
    pub const COL_MAX: u8 = (NUM_PIXEL_COLS - 1) as u8;
    pub const PAGE_MAX: u8 = (NUM_PAGES - 1) as u8;
    pub const ROW_MAX: u8 = (NUM_PIXEL_ROWS - 1) as u8;

    /// Size in bytes of a full frame of segments.
    pub const BUFFER_SIZE: usize = NUM_PIXEL_COLS * NUM_PAGES;

    /// 7-bit I2C address of the display (SA0 pulled low).
    pub const I2C_ADDRESS: u8 = 0x3C;

    /// Control byte announcing that the rest of the write is command bytes.
    pub const COMMAND_CONTROL: u8 = 0x00;
    /// Control byte announcing that the rest of the write is display RAM data.
    pub const DATA_CONTROL: u8 = 0x40;

    /// Longest command write, control byte included.
    pub const COMMAND_BUFFER_SIZE: usize = 4;

    pub const MUX_RATIO_MIN: u8 = 16;
    pub const MUX_RATIO_MAX: u8 = 64;
    pub const DISPLAY_OFFSET_MAX: u8 = 63;
    pub const START_LINE_MAX: u8 = 63;
    pub const CLOCK_DIVIDE_MIN: u8 = 1;
    pub const CLOCK_DIVIDE_MAX: u8 = 16;
    pub const OSCILLATOR_FREQUENCY_MAX: u8 = 15;
}

use self::consts::*;

/// The memory addressing mode, which decides how the RAM pointers advance as image data is
/// written.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddressingMode {
    /// The column pointer advances within the column range, then wraps to the next page of the
    /// page range.
    Horizontal,
    /// The page pointer advances within the page range, then wraps to the next column of the
    /// column range.
    Vertical,
    /// The column pointer advances within the current page only. Start column and page are set
    /// with `SetColumnStart` and `SetPageStart`. This is the chip's reset default.
    Page,
}

/// Which end of the column addresses is mapped to SEG0.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SegmentRemap {
    /// Column address 0 is mapped to SEG0.
    Column0,
    /// Column address 127 is mapped to SEG0, mirroring the image horizontally.
    Column127,
}

/// Scan direction of the COM outputs. Changing this setting flips the image vertically.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ComScanDirection {
    /// Scan from COM0 to COM[N-1], where N is the multiplex ratio.
    Normal,
    /// Scan from COM[N-1] to COM0.
    Remapped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// Set the contrast level. Range 0-255, contrast increases with the value.
    SetContrast(u8),
    /// Turn every pixel on regardless of RAM contents (`true`), or drive the pixels from RAM
    /// (`false`).
    SetEntireDisplayOn(bool),
    /// Invert the displayed image (`true`) or show it normally (`false`).
    SetInverted(bool),
    /// Turn the panel on (`true`) or put it to sleep (`false`).
    SetDisplayOn(bool),
    /// Select the memory addressing mode. See `AddressingMode`.
    SetMemoryAddressingMode(AddressingMode),
    /// Set the column start and end address for horizontal and vertical addressing modes.
    /// Range is 0-127. (Note 1)
    SetColumnAddress(u8, u8),
    /// Set the page start and end address for horizontal and vertical addressing modes. Range
    /// is 0-7. (Note 1)
    SetPageAddress(u8, u8),
    /// Set the page pointer for page addressing mode. Range is 0-7.
    SetPageStart(u8),
    /// Set the column pointer for page addressing mode. This is sent as two command bytes, the
    /// lower nibble first. Range is 0-127.
    SetColumnStart(u8),
    /// Set the RAM row shown on the first display line. Range is 0-63.
    SetDisplayStartLine(u8),
    /// Set the segment remapping. See `SegmentRemap`.
    SetSegmentRemap(SegmentRemap),
    /// Set the MUX ratio, i.e. the number of active COM lines. Range 16-64.
    SetMultiplexRatio(u8),
    /// Set the COM output scan direction. See `ComScanDirection`.
    SetComScanDirection(ComScanDirection),
    /// Set the vertical shift of the COM lines. Range is 0-63.
    SetDisplayOffset(u8),
    /// Set the COM pins hardware configuration: alternative (`true`) or sequential pin
    /// configuration, and whether COM left/right remap is enabled.
    SetComPinsConfig(bool, bool),
    /// Set the display clock divide ratio (1-16) and oscillator frequency (0-15, higher is
    /// faster).
    SetDisplayClock(u8, u8),
    /// Enable or disable the internal charge pump. The pump has to be enabled before the
    /// display is turned on.
    SetChargePump(bool),
}

/// An encoded command, ready to be written to the bus as-is: the command control byte followed
/// by up to three command bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandBytes {
    buf: [u8; COMMAND_BUFFER_SIZE],
    len: usize,
}

impl CommandBytes {
    fn new(bytes: &[u8]) -> Self {
        let mut buf = [0u8; COMMAND_BUFFER_SIZE];
        buf[0] = COMMAND_CONTROL;
        buf[1..=bytes.len()].copy_from_slice(bytes);
        Self {
            buf,
            len: bytes.len() + 1,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

macro_rules! ok_command {
    ($($byte:expr),+) => {
        Some(CommandBytes::new(&[$($byte),+]))
    };
}

impl Command {
    /// Encode the command for the bus, or `None` when an argument is out of range.
    pub fn encode(self) -> Option<CommandBytes> {
        match self {
            Command::SetContrast(level) => ok_command!(0x81, level),
            Command::SetEntireDisplayOn(on) => ok_command!(match on {
                true => 0xA5,
                false => 0xA4,
            }),
            Command::SetInverted(inverted) => ok_command!(match inverted {
                true => 0xA7,
                false => 0xA6,
            }),
            Command::SetDisplayOn(on) => ok_command!(match on {
                true => 0xAF,
                false => 0xAE,
            }),
            Command::SetMemoryAddressingMode(mode) => ok_command!(
                0x20,
                match mode {
                    AddressingMode::Horizontal => 0x00,
                    AddressingMode::Vertical => 0x01,
                    AddressingMode::Page => 0x02,
                }
            ),
            Command::SetColumnAddress(start, end) => match (start, end) {
                (0..=COL_MAX, 0..=COL_MAX) => ok_command!(0x21, start, end),
                _ => None,
            },
            Command::SetPageAddress(start, end) => match (start, end) {
                (0..=PAGE_MAX, 0..=PAGE_MAX) => ok_command!(0x22, start, end),
                _ => None,
            },
            Command::SetPageStart(page) => match page {
                0..=PAGE_MAX => ok_command!(0xB0 | page),
                _ => None,
            },
            Command::SetColumnStart(column) => match column {
                0..=COL_MAX => ok_command!(column & 0x0F, 0x10 | (column >> 4)),
                _ => None,
            },
            Command::SetDisplayStartLine(line) => match line {
                0..=START_LINE_MAX => ok_command!(0x40 | line),
                _ => None,
            },
            Command::SetSegmentRemap(remap) => ok_command!(match remap {
                SegmentRemap::Column0 => 0xA0,
                SegmentRemap::Column127 => 0xA1,
            }),
            Command::SetMultiplexRatio(ratio) => match ratio {
                MUX_RATIO_MIN..=MUX_RATIO_MAX => ok_command!(0xA8, ratio - 1),
                _ => None,
            },
            Command::SetComScanDirection(direction) => ok_command!(match direction {
                ComScanDirection::Normal => 0xC0,
                ComScanDirection::Remapped => 0xC8,
            }),
            Command::SetDisplayOffset(offset) => match offset {
                0..=DISPLAY_OFFSET_MAX => ok_command!(0xD3, offset),
                _ => None,
            },
            Command::SetComPinsConfig(alternative, left_right_remap) => ok_command!(
                0xDA,
                0x02 | (alternative as u8) << 4 | (left_right_remap as u8) << 5
            ),
            Command::SetDisplayClock(divide_ratio, oscillator_frequency) => {
                match (divide_ratio, oscillator_frequency) {
                    (CLOCK_DIVIDE_MIN..=CLOCK_DIVIDE_MAX, 0..=OSCILLATOR_FREQUENCY_MAX) => {
                        ok_command!(0xD5, oscillator_frequency << 4 | (divide_ratio - 1))
                    }
                    _ => None,
                }
            }
            Command::SetChargePump(enabled) => ok_command!(
                0x8D,
                match enabled {
                    true => 0x14,
                    false => 0x10,
                }
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(cmd: Command, bytes: &[u8]) {
        let encoded = cmd.encode().unwrap();
        assert_eq!(encoded.as_bytes()[0], COMMAND_CONTROL);
        assert_eq!(&encoded.as_bytes()[1..], bytes);
    }

    #[test]
    fn set_contrast() {
        check(Command::SetContrast(0x7F), &[0x81, 0x7F]);
        check(Command::SetContrast(0xFF), &[0x81, 0xFF]);
    }

    #[test]
    fn single_byte_switches() {
        check(Command::SetEntireDisplayOn(false), &[0xA4]);
        check(Command::SetEntireDisplayOn(true), &[0xA5]);
        check(Command::SetInverted(false), &[0xA6]);
        check(Command::SetInverted(true), &[0xA7]);
        check(Command::SetDisplayOn(false), &[0xAE]);
        check(Command::SetDisplayOn(true), &[0xAF]);
        check(Command::SetSegmentRemap(SegmentRemap::Column0), &[0xA0]);
        check(Command::SetSegmentRemap(SegmentRemap::Column127), &[0xA1]);
        check(Command::SetComScanDirection(ComScanDirection::Normal), &[0xC0]);
        check(Command::SetComScanDirection(ComScanDirection::Remapped), &[0xC8]);
    }

    #[test]
    fn set_memory_addressing_mode() {
        check(
            Command::SetMemoryAddressingMode(AddressingMode::Horizontal),
            &[0x20, 0x00],
        );
        check(
            Command::SetMemoryAddressingMode(AddressingMode::Vertical),
            &[0x20, 0x01],
        );
        check(
            Command::SetMemoryAddressingMode(AddressingMode::Page),
            &[0x20, 0x02],
        );
    }

    #[test]
    fn set_column_address() {
        check(Command::SetColumnAddress(0, 127), &[0x21, 0, 127]);
        assert_eq!(Command::SetColumnAddress(128, 42).encode(), None);
        assert_eq!(Command::SetColumnAddress(23, 255).encode(), None);
    }

    #[test]
    fn set_page_address() {
        check(Command::SetPageAddress(2, 7), &[0x22, 2, 7]);
        assert_eq!(Command::SetPageAddress(8, 7).encode(), None);
        assert_eq!(Command::SetPageAddress(0, 8).encode(), None);
    }

    #[test]
    fn page_mode_pointers() {
        check(Command::SetPageStart(5), &[0xB5]);
        assert_eq!(Command::SetPageStart(8).encode(), None);
        check(Command::SetColumnStart(0x5A), &[0x0A, 0x15]);
        check(Command::SetColumnStart(127), &[0x0F, 0x17]);
        assert_eq!(Command::SetColumnStart(128).encode(), None);
    }

    #[test]
    fn set_display_start_line() {
        check(Command::SetDisplayStartLine(0), &[0x40]);
        check(Command::SetDisplayStartLine(23), &[0x57]);
        check(Command::SetDisplayStartLine(63), &[0x7F]);
        assert_eq!(Command::SetDisplayStartLine(64).encode(), None);
    }

    #[test]
    fn set_multiplex_ratio() {
        check(Command::SetMultiplexRatio(32), &[0xA8, 0x1F]);
        check(Command::SetMultiplexRatio(16), &[0xA8, 15]);
        check(Command::SetMultiplexRatio(64), &[0xA8, 63]);
        assert_eq!(Command::SetMultiplexRatio(15).encode(), None);
        assert_eq!(Command::SetMultiplexRatio(65).encode(), None);
    }

    #[test]
    fn set_display_offset() {
        check(Command::SetDisplayOffset(23), &[0xD3, 23]);
        assert_eq!(Command::SetDisplayOffset(64).encode(), None);
    }

    #[test]
    fn set_com_pins_config() {
        check(Command::SetComPinsConfig(false, false), &[0xDA, 0x02]);
        check(Command::SetComPinsConfig(true, false), &[0xDA, 0x12]);
        check(Command::SetComPinsConfig(false, true), &[0xDA, 0x22]);
        check(Command::SetComPinsConfig(true, true), &[0xDA, 0x32]);
    }

    #[test]
    fn set_display_clock() {
        check(Command::SetDisplayClock(1, 8), &[0xD5, 0x80]);
        check(Command::SetDisplayClock(9, 8), &[0xD5, 0x88]);
        check(Command::SetDisplayClock(10, 8), &[0xD5, 0x89]);
        check(Command::SetDisplayClock(16, 15), &[0xD5, 0xFF]);
        assert_eq!(Command::SetDisplayClock(0, 8).encode(), None);
        assert_eq!(Command::SetDisplayClock(17, 8).encode(), None);
        assert_eq!(Command::SetDisplayClock(1, 16).encode(), None);
    }

    #[test]
    fn set_charge_pump() {
        check(Command::SetChargePump(true), &[0x8D, 0x14]);
        check(Command::SetChargePump(false), &[0x8D, 0x10]);
    }
}
