//! Defines the table of register values sent to the SSD1306 by the init-display sequence.

use crate::command::*;

/// Number of ticks the init sequence waits for the panel supply to settle before sending the
/// first command.
pub const DEFAULT_STARTUP_DELAY_TICKS: u16 = 100;

/// A configuration for the display. `Config::default()` holds values suitable for the common
/// 128x64 I2C modules; builder methods override individual entries of the init sequence.
///
/// Values are not range checked here. An out-of-range value is caught when its init step is
/// encoded, which fails the init-display operation with `Error::InvalidArgument`.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    pub(crate) mux_ratio_cmd: Command,
    pub(crate) display_offset_cmd: Command,
    pub(crate) start_line_cmd: Command,
    pub(crate) segment_remap_cmd: Command,
    pub(crate) com_scan_direction_cmd: Command,
    pub(crate) com_pins_cmd: Command,
    pub(crate) contrast_cmd: Command,
    pub(crate) display_clock_cmd: Command,
    pub(crate) charge_pump_cmd: Command,
    pub(crate) startup_delay_ticks: u16,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            mux_ratio_cmd: Command::SetMultiplexRatio(64),
            display_offset_cmd: Command::SetDisplayOffset(0),
            start_line_cmd: Command::SetDisplayStartLine(0),
            segment_remap_cmd: Command::SetSegmentRemap(SegmentRemap::Column127),
            com_scan_direction_cmd: Command::SetComScanDirection(ComScanDirection::Remapped),
            com_pins_cmd: Command::SetComPinsConfig(true, false),
            contrast_cmd: Command::SetContrast(0x7F),
            display_clock_cmd: Command::SetDisplayClock(1, 8),
            charge_pump_cmd: Command::SetChargePump(true),
            startup_delay_ticks: DEFAULT_STARTUP_DELAY_TICKS,
        }
    }
}

impl Config {
    /// See `Command::SetMultiplexRatio`.
    pub fn mux_ratio(self, ratio: u8) -> Self {
        Self {
            mux_ratio_cmd: Command::SetMultiplexRatio(ratio),
            ..self
        }
    }

    /// See `Command::SetDisplayOffset`.
    pub fn display_offset(self, offset: u8) -> Self {
        Self {
            display_offset_cmd: Command::SetDisplayOffset(offset),
            ..self
        }
    }

    /// See `Command::SetDisplayStartLine`.
    pub fn start_line(self, line: u8) -> Self {
        Self {
            start_line_cmd: Command::SetDisplayStartLine(line),
            ..self
        }
    }

    /// See `Command::SetSegmentRemap`.
    pub fn segment_remap(self, remap: SegmentRemap) -> Self {
        Self {
            segment_remap_cmd: Command::SetSegmentRemap(remap),
            ..self
        }
    }

    /// See `Command::SetComScanDirection`.
    pub fn com_scan_direction(self, direction: ComScanDirection) -> Self {
        Self {
            com_scan_direction_cmd: Command::SetComScanDirection(direction),
            ..self
        }
    }

    /// See `Command::SetComPinsConfig`.
    pub fn com_pins(self, alternative: bool, left_right_remap: bool) -> Self {
        Self {
            com_pins_cmd: Command::SetComPinsConfig(alternative, left_right_remap),
            ..self
        }
    }

    /// See `Command::SetContrast`.
    pub fn contrast(self, level: u8) -> Self {
        Self {
            contrast_cmd: Command::SetContrast(level),
            ..self
        }
    }

    /// See `Command::SetDisplayClock`.
    pub fn display_clock(self, divide_ratio: u8, oscillator_frequency: u8) -> Self {
        Self {
            display_clock_cmd: Command::SetDisplayClock(divide_ratio, oscillator_frequency),
            ..self
        }
    }

    /// Modules that supply VCC externally must leave the charge pump disabled.
    pub fn charge_pump(self, enabled: bool) -> Self {
        Self {
            charge_pump_cmd: Command::SetChargePump(enabled),
            ..self
        }
    }

    /// Number of ticks to wait before the first init command. Zero skips the wait.
    pub fn startup_delay_ticks(self, ticks: u16) -> Self {
        Self {
            startup_delay_ticks: ticks,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table() {
        let cfg = Config::default();
        assert_eq!(
            cfg.mux_ratio_cmd.encode().unwrap().as_bytes(),
            &[0x00, 0xA8, 0x3F]
        );
        assert_eq!(
            cfg.com_pins_cmd.encode().unwrap().as_bytes(),
            &[0x00, 0xDA, 0x12]
        );
        assert_eq!(
            cfg.display_clock_cmd.encode().unwrap().as_bytes(),
            &[0x00, 0xD5, 0x80]
        );
        assert_eq!(cfg.startup_delay_ticks, DEFAULT_STARTUP_DELAY_TICKS);
    }

    #[test]
    fn builder_overrides() {
        let cfg = Config::default()
            .mux_ratio(32)
            .contrast(0xCF)
            .display_clock(10, 8)
            .charge_pump(false)
            .startup_delay_ticks(0);
        assert_eq!(cfg.mux_ratio_cmd, Command::SetMultiplexRatio(32));
        assert_eq!(cfg.contrast_cmd, Command::SetContrast(0xCF));
        assert_eq!(cfg.display_clock_cmd, Command::SetDisplayClock(10, 8));
        assert_eq!(cfg.charge_pump_cmd, Command::SetChargePump(false));
        assert_eq!(cfg.startup_delay_ticks, 0);
        // Untouched entries keep their defaults.
        assert_eq!(cfg.display_offset_cmd, Command::SetDisplayOffset(0));
    }

    #[test]
    fn out_of_range_values_are_kept_until_encoding() {
        let cfg = Config::default().mux_ratio(8);
        assert_eq!(cfg.mux_ratio_cmd.encode(), None);
    }
}
