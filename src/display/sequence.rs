//! The step sequences of the multi-step display operations. Each step that talks to the chip
//! maps to exactly one command, so the driver issues one bus transaction per step.

use crate::command::*;
use crate::config::Config;

/// Steps of the init-display operation, in the order they are carried out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InitStep {
    /// Wait for the panel supply to settle. Sends nothing.
    StartupDelay,
    MuxRatio,
    DisplayOffset,
    StartLine,
    SegmentRemap,
    ComScanDirection,
    ComPins,
    Contrast,
    PixelsFromRam,
    NormalDisplay,
    DisplayClock,
    ChargePump,
    MemoryAddressingMode,
    DisplayOn,
    /// Every command was sent; the operation finishes once the last one completes.
    Done,
}

impl InitStep {
    pub(crate) fn next(self) -> Self {
        use self::InitStep::*;
        match self {
            StartupDelay => MuxRatio,
            MuxRatio => DisplayOffset,
            DisplayOffset => StartLine,
            StartLine => SegmentRemap,
            SegmentRemap => ComScanDirection,
            ComScanDirection => ComPins,
            ComPins => Contrast,
            Contrast => PixelsFromRam,
            PixelsFromRam => NormalDisplay,
            NormalDisplay => DisplayClock,
            DisplayClock => ChargePump,
            ChargePump => MemoryAddressingMode,
            MemoryAddressingMode => DisplayOn,
            DisplayOn | Done => Done,
        }
    }

    /// The command sent by this step, taken from `config` where it is configurable.
    pub(crate) fn command(self, config: &Config, mode: AddressingMode) -> Option<Command> {
        use self::InitStep::*;
        match self {
            StartupDelay | Done => None,
            MuxRatio => Some(config.mux_ratio_cmd),
            DisplayOffset => Some(config.display_offset_cmd),
            StartLine => Some(config.start_line_cmd),
            SegmentRemap => Some(config.segment_remap_cmd),
            ComScanDirection => Some(config.com_scan_direction_cmd),
            ComPins => Some(config.com_pins_cmd),
            Contrast => Some(config.contrast_cmd),
            PixelsFromRam => Some(Command::SetEntireDisplayOn(false)),
            NormalDisplay => Some(Command::SetInverted(false)),
            DisplayClock => Some(config.display_clock_cmd),
            ChargePump => Some(config.charge_pump_cmd),
            MemoryAddressingMode => Some(Command::SetMemoryAddressingMode(mode)),
            DisplayOn => Some(Command::SetDisplayOn(true)),
        }
    }
}

/// Steps of the send-graphics-data operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataStep {
    /// Position the column pointer: the column range in horizontal and vertical addressing
    /// mode, the column start in page addressing mode.
    Column,
    /// Position the page pointer, likewise.
    Page,
    /// Write the image data.
    Data,
    Done,
}

/// The RAM window image data is written to, as set with `Ssd1306::set_column_address` and
/// `Ssd1306::set_page_address`. Both ranges are inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Window {
    pub mode: AddressingMode,
    pub columns: (u8, u8),
    pub pages: (u8, u8),
}

impl DataStep {
    pub(crate) fn next(self) -> Self {
        match self {
            DataStep::Column => DataStep::Page,
            DataStep::Page => DataStep::Data,
            DataStep::Data | DataStep::Done => DataStep::Done,
        }
    }

    /// The positioning command sent by this step. `Data` and `Done` send no command.
    pub(crate) fn command(self, window: &Window) -> Option<Command> {
        let page_mode = window.mode == AddressingMode::Page;
        match self {
            DataStep::Column if page_mode => Some(Command::SetColumnStart(window.columns.0)),
            DataStep::Column => Some(Command::SetColumnAddress(window.columns.0, window.columns.1)),
            DataStep::Page if page_mode => Some(Command::SetPageStart(window.pages.0)),
            DataStep::Page => Some(Command::SetPageAddress(window.pages.0, window.pages.1)),
            DataStep::Data | DataStep::Done => None,
        }
    }
}
